//! Record cipher implementations using RustCrypto.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit as BlockKeyInit};
use aes_gcm::aes::{Aes128, Aes256, Block};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key, Nonce};

use crate::buffer::Buf;
use crate::crypto::provider::{CipherMethod, CipherMode, RecordCipher};

const AES_BLOCK: usize = 16;
const GCM_NONCE: usize = 12;
const GCM_TAG: usize = 16;

/// AES in CBC mode. Padding is the caller's business.
enum AesCbc {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl std::fmt::Debug for AesCbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesCbc::Aes128(_) => f.debug_tuple("AesCbc::Aes128").finish(),
            AesCbc::Aes256(_) => f.debug_tuple("AesCbc::Aes256").finish(),
        }
    }
}

impl AesCbc {
    fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => Ok(AesCbc::Aes128(Box::new(
                <Aes128 as BlockKeyInit>::new_from_slice(key).map_err(|_| "Invalid AES key")?,
            ))),
            32 => Ok(AesCbc::Aes256(Box::new(
                <Aes256 as BlockKeyInit>::new_from_slice(key).map_err(|_| "Invalid AES key")?,
            ))),
            _ => Err(format!("Invalid key size for AES-CBC: {}", key.len())),
        }
    }

    fn encrypt_block(&self, block: &mut Block) {
        match self {
            AesCbc::Aes128(c) => c.encrypt_block(block),
            AesCbc::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut Block) {
        match self {
            AesCbc::Aes128(c) => c.decrypt_block(block),
            AesCbc::Aes256(c) => c.decrypt_block(block),
        }
    }
}

fn check_cbc_input(iv: &[u8], data: &[u8]) -> Result<(), String> {
    if iv.len() != AES_BLOCK {
        return Err(format!("Invalid IV length: expected 16, got {}", iv.len()));
    }
    if data.len() % AES_BLOCK != 0 {
        return Err(format!("Data not block aligned: {}", data.len()));
    }
    Ok(())
}

impl RecordCipher for AesCbc {
    fn encrypt(&mut self, iv: &[u8], _aad: &[u8], data: &mut Buf) -> Result<(), String> {
        check_cbc_input(iv, data)?;

        let mut prev = [0u8; AES_BLOCK];
        prev.copy_from_slice(iv);

        for chunk in data.chunks_exact_mut(AES_BLOCK) {
            for (b, p) in chunk.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            self.encrypt_block(Block::from_mut_slice(chunk));
            prev.copy_from_slice(chunk);
        }

        Ok(())
    }

    fn decrypt(&mut self, iv: &[u8], _aad: &[u8], data: &mut Buf) -> Result<(), String> {
        check_cbc_input(iv, data)?;

        let mut prev = [0u8; AES_BLOCK];
        prev.copy_from_slice(iv);

        for chunk in data.chunks_exact_mut(AES_BLOCK) {
            let mut saved = [0u8; AES_BLOCK];
            saved.copy_from_slice(chunk);

            self.decrypt_block(Block::from_mut_slice(chunk));
            for (b, p) in chunk.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            prev = saved;
        }

        Ok(())
    }
}

/// AES-GCM cipher implementation using RustCrypto.
enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl AesGcm {
    fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => {
                let key = Key::<Aes128Gcm>::from_slice(key);
                Ok(AesGcm::Aes128(Box::new(Aes128Gcm::new(key))))
            }
            32 => {
                let key = Key::<Aes256Gcm>::from_slice(key);
                Ok(AesGcm::Aes256(Box::new(Aes256Gcm::new(key))))
            }
            _ => Err(format!("Invalid key size for AES-GCM: {}", key.len())),
        }
    }
}

fn check_nonce(nonce: &[u8]) -> Result<(), String> {
    // AES-GCM nonce is 12 bytes
    if nonce.len() != GCM_NONCE {
        return Err(format!(
            "Invalid nonce length: expected 12, got {}",
            nonce.len()
        ));
    }
    Ok(())
}

impl RecordCipher for AesGcm {
    fn encrypt(&mut self, nonce: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String> {
        check_nonce(nonce)?;
        let nonce = Nonce::from_slice(nonce);

        match self {
            AesGcm::Aes128(cipher) => cipher.encrypt_in_place(nonce, aad, data),
            AesGcm::Aes256(cipher) => cipher.encrypt_in_place(nonce, aad, data),
        }
        .map_err(|_| "AES-GCM encryption failed".to_string())
    }

    fn decrypt(&mut self, nonce: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String> {
        if data.len() < GCM_TAG {
            return Err(format!("Ciphertext too short: {}", data.len()));
        }
        check_nonce(nonce)?;
        let nonce = Nonce::from_slice(nonce);

        // decrypt_in_place removes the tag and shortens the buffer
        match self {
            AesGcm::Aes128(cipher) => cipher.decrypt_in_place(nonce, aad, data),
            AesGcm::Aes256(cipher) => cipher.decrypt_in_place(nonce, aad, data),
        }
        .map_err(|_| "AES-GCM decryption failed".to_string())
    }
}

/// Cipher method table entry.
#[derive(Debug)]
pub(super) struct RustCryptoCipher {
    mode: CipherMode,
    key_len: usize,
}

impl CipherMethod for RustCryptoCipher {
    fn mode(&self) -> CipherMode {
        self.mode
    }

    fn key_len(&self) -> usize {
        self.key_len
    }

    fn iv_len(&self) -> usize {
        match self.mode {
            CipherMode::Null => 0,
            CipherMode::Cbc => AES_BLOCK,
            // Implicit part of the nonce only, the rest travels in the record.
            CipherMode::Aead => 4,
        }
    }

    fn block_len(&self) -> usize {
        match self.mode {
            CipherMode::Cbc => AES_BLOCK,
            _ => 1,
        }
    }

    fn tag_len(&self) -> usize {
        match self.mode {
            CipherMode::Aead => GCM_TAG,
            _ => 0,
        }
    }

    fn create(&self, key: &[u8]) -> Result<Option<Box<dyn RecordCipher>>, String> {
        if key.len() != self.key_len {
            return Err(format!(
                "Invalid key length: expected {}, got {}",
                self.key_len,
                key.len()
            ));
        }
        Ok(match self.mode {
            CipherMode::Null => None,
            CipherMode::Cbc => Some(Box::new(AesCbc::new(key)?)),
            CipherMode::Aead => Some(Box::new(AesGcm::new(key)?)),
        })
    }
}

pub(super) static NULL_CIPHER: RustCryptoCipher = RustCryptoCipher {
    mode: CipherMode::Null,
    key_len: 0,
};

pub(super) static AES_128_CBC: RustCryptoCipher = RustCryptoCipher {
    mode: CipherMode::Cbc,
    key_len: 16,
};

pub(super) static AES_256_CBC: RustCryptoCipher = RustCryptoCipher {
    mode: CipherMode::Cbc,
    key_len: 32,
};

pub(super) static AES_128_GCM: RustCryptoCipher = RustCryptoCipher {
    mode: CipherMode::Aead,
    key_len: 16,
};
