use subtle::{Choice, ConstantTimeEq, ConstantTimeLess};
use zeroize::Zeroizing;

use super::SequenceNumber;
use crate::buffer::Buf;
use crate::ciphersuite::CipherSuiteInfo;
use crate::crypto::provider::{CipherMode, RecordCipher, SecureRandom};
use crate::key_schedule::DirectionKeys;
use crate::types::{ContentType, ProtocolVersion};
use crate::Error;

/// Length of the explicit nonce carried in AEAD records.
const EXPLICIT_NONCE_LEN: usize = 8;

/// Protection state of one direction of a connection.
///
/// Created from freshly derived keys when a ChangeCipherSpec is sent or
/// received. The sequence number starts at zero.
pub struct RecordProtection {
    info: &'static CipherSuiteInfo,
    mac_secret: Zeroizing<Vec<u8>>,
    cipher: Option<Box<dyn RecordCipher>>,
    /// CBC: IV of the next record when the version chains IVs.
    /// AEAD: the implicit part of the nonce.
    iv: Zeroizing<Vec<u8>>,
    seq: SequenceNumber,
}

impl RecordProtection {
    pub fn new(info: &'static CipherSuiteInfo, keys: &DirectionKeys<'_>) -> Result<Self, Error> {
        let cipher = info.cipher.create(keys.key).map_err(Error::CryptoError)?;

        if info.cipher.mode() != CipherMode::Null && cipher.is_none() {
            return Err(Error::CryptoError(format!(
                "No cipher instance for {}",
                info.suite
            )));
        }

        Ok(RecordProtection {
            info,
            mac_secret: Zeroizing::new(keys.mac_secret.to_vec()),
            cipher,
            iv: Zeroizing::new(keys.iv.to_vec()),
            seq: SequenceNumber::new(),
        })
    }

    pub fn suite(&self) -> &'static CipherSuiteInfo {
        self.info
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.seq
    }

    #[cfg(test)]
    pub(crate) fn set_sequence(&mut self, seq: SequenceNumber) {
        self.seq = seq;
    }

    fn mac_len(&self) -> usize {
        self.info.mac.mac_len()
    }

    /// Upper bound on the bytes protection adds to a fragment.
    pub fn overhead(&self) -> usize {
        let c = self.info.cipher;
        match c.mode() {
            CipherMode::Null => self.mac_len(),
            CipherMode::Cbc => c.block_len() + self.mac_len() + c.block_len(),
            CipherMode::Aead => EXPLICIT_NONCE_LEN + c.tag_len(),
        }
    }

    /// HMAC(mac_secret, seq || type || version || length || data)
    fn compute_mac(
        &self,
        content_type: ContentType,
        version: ProtocolVersion,
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), Error> {
        let seq = self.seq.to_bytes();
        let header = [
            content_type.as_u8(),
            (version.as_u16() >> 8) as u8,
            version.as_u16() as u8,
            (data.len() >> 8) as u8,
            data.len() as u8,
        ];

        self.info
            .mac
            .compute(&self.mac_secret, &[&seq, &header, data], out)
            .map_err(Error::CryptoError)
    }

    /// Protect `fragment` in place. On return it holds the record body.
    pub fn protect(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut Buf,
        rng: &dyn SecureRandom,
    ) -> Result<(), Error> {
        match self.info.cipher.mode() {
            CipherMode::Null => {
                let mut mac = Buf::new();
                self.compute_mac(content_type, version, fragment, &mut mac)?;
                fragment.extend_from_slice(&mac);
            }
            CipherMode::Cbc => self.protect_cbc(content_type, version, fragment, rng)?,
            CipherMode::Aead => self.protect_aead(content_type, version, fragment)?,
        }

        self.seq.increment();
        Ok(())
    }

    fn protect_cbc(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut Buf,
        rng: &dyn SecureRandom,
    ) -> Result<(), Error> {
        let block = self.info.cipher.block_len();

        let mut mac = Buf::new();
        self.compute_mac(content_type, version, fragment, &mut mac)?;
        fragment.extend_from_slice(&mac);

        // padding_length + 1 bytes, each holding padding_length
        let pad_len = block - 1 - (fragment.len() % block);
        for _ in 0..=pad_len {
            fragment.push(pad_len as u8);
        }

        let Some(cipher) = self.cipher.as_mut() else {
            return Err(Error::InvalidState);
        };

        if version.has_explicit_iv() {
            let mut iv = [0u8; 16];
            let iv = &mut iv[..block];
            rng.fill(iv).map_err(Error::CryptoError)?;

            cipher
                .encrypt(iv, &[], fragment)
                .map_err(Error::CryptoError)?;

            let body_len = fragment.len();
            fragment.resize(block + body_len, 0);
            fragment.copy_within(0..body_len, block);
            fragment[..block].copy_from_slice(iv);
        } else {
            cipher
                .encrypt(&self.iv, &[], fragment)
                .map_err(Error::CryptoError)?;

            // TLS 1.0 continues the chain from the last ciphertext block.
            let len = fragment.len();
            self.iv.copy_from_slice(&fragment[len - block..]);
        }

        Ok(())
    }

    fn aead_nonce_and_aad(
        &self,
        explicit: &[u8],
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext_len: usize,
    ) -> ([u8; 12], [u8; 13]) {
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&self.iv[..4]);
        nonce[4..].copy_from_slice(explicit);

        let mut aad = [0u8; 13];
        aad[..8].copy_from_slice(&self.seq.to_bytes());
        aad[8] = content_type.as_u8();
        aad[9..11].copy_from_slice(&version.as_u16().to_be_bytes());
        aad[11..].copy_from_slice(&(plaintext_len as u16).to_be_bytes());

        (nonce, aad)
    }

    fn protect_aead(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut Buf,
    ) -> Result<(), Error> {
        // The sequence number doubles as the explicit nonce.
        let explicit = self.seq.to_bytes();
        let (nonce, aad) =
            self.aead_nonce_and_aad(&explicit, content_type, version, fragment.len());

        let Some(cipher) = self.cipher.as_mut() else {
            return Err(Error::InvalidState);
        };
        cipher
            .encrypt(&nonce, &aad, fragment)
            .map_err(Error::CryptoError)?;

        let body_len = fragment.len();
        fragment.resize(EXPLICIT_NONCE_LEN + body_len, 0);
        fragment.copy_within(0..body_len, EXPLICIT_NONCE_LEN);
        fragment[..EXPLICIT_NONCE_LEN].copy_from_slice(&explicit);

        Ok(())
    }

    /// Remove protection from a record body in place. On return `fragment`
    /// holds the plaintext.
    pub fn unprotect(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut Buf,
    ) -> Result<(), Error> {
        match self.info.cipher.mode() {
            CipherMode::Null => {
                let len = fragment.len();
                self.check_mac(content_type, version, fragment, len, Choice::from(1))?;
            }
            CipherMode::Cbc => self.unprotect_cbc(content_type, version, fragment)?,
            CipherMode::Aead => self.unprotect_aead(content_type, version, fragment)?,
        }

        self.seq.increment();
        Ok(())
    }

    fn unprotect_cbc(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut Buf,
    ) -> Result<(), Error> {
        let block = self.info.cipher.block_len();
        let explicit_iv = version.has_explicit_iv();

        let mut iv = [0u8; 16];
        if explicit_iv {
            if fragment.len() < block {
                return Err(Error::IncorrectMessageLength);
            }
            iv[..block].copy_from_slice(&fragment[..block]);
            fragment.drain_front(block);
        } else {
            iv[..block].copy_from_slice(&self.iv);
        }

        let len = fragment.len();
        if len == 0 || len % block != 0 {
            return Err(Error::HashMacVerifyFailure);
        }

        if !explicit_iv {
            self.iv.copy_from_slice(&fragment[len - block..]);
        }

        let Some(cipher) = self.cipher.as_mut() else {
            return Err(Error::InvalidState);
        };
        cipher
            .decrypt(&iv[..block], &[], fragment)
            .map_err(|_| Error::HashMacVerifyFailure)?;

        let (padding_ok, content_and_mac) = check_padding(fragment);

        self.check_mac(content_type, version, fragment, content_and_mac, padding_ok)
    }

    /// Verify the MAC at `fragment[..len]` and truncate to the content.
    ///
    /// `padding_ok` is folded in after the MAC has been computed, so bad
    /// padding costs the same work as a bad MAC.
    fn check_mac(
        &self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut Buf,
        len: usize,
        padding_ok: Choice,
    ) -> Result<(), Error> {
        let mac_len = self.mac_len();

        if bool::from(padding_ok) {
            if len < mac_len {
                return Err(Error::IncorrectMessageLength);
            }

            if len == mac_len {
                // An empty application record, sent ahead of real data
                // as a BEAST countermeasure.
                if content_type == ContentType::ApplicationData {
                    trace!("Empty application data record");
                    fragment.truncate(0);
                    return Ok(());
                }
                return Err(Error::IncorrectMessageLength);
            }
        }

        let content_len = len.saturating_sub(mac_len);
        let mut expected = Buf::new();
        self.compute_mac(content_type, version, &fragment[..content_len], &mut expected)?;

        let received = &fragment[content_len..len];
        let mac_ok = if received.len() == expected.len() {
            received.ct_eq(&expected[..])
        } else {
            Choice::from(0)
        };

        if !bool::from(padding_ok) {
            return Err(Error::PaddingCheckFailed);
        }
        if !bool::from(mac_ok) {
            return Err(Error::HashMacVerifyFailure);
        }

        fragment.truncate(content_len);
        Ok(())
    }

    fn unprotect_aead(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &mut Buf,
    ) -> Result<(), Error> {
        let tag_len = self.info.cipher.tag_len();
        if fragment.len() < EXPLICIT_NONCE_LEN + tag_len {
            return Err(Error::AeadDecryptFailure);
        }

        let plaintext_len = fragment.len() - EXPLICIT_NONCE_LEN - tag_len;
        let mut explicit = [0u8; EXPLICIT_NONCE_LEN];
        explicit.copy_from_slice(&fragment[..EXPLICIT_NONCE_LEN]);
        let (nonce, aad) =
            self.aead_nonce_and_aad(&explicit, content_type, version, plaintext_len);

        fragment.drain_front(EXPLICIT_NONCE_LEN);

        let Some(cipher) = self.cipher.as_mut() else {
            return Err(Error::InvalidState);
        };
        cipher
            .decrypt(&nonce, &aad, fragment)
            .map_err(|_| Error::AeadDecryptFailure)
    }
}

/// Check CBC padding over the last 256 bytes without branching on
/// individual byte values. Returns the verdict and the length of content
/// plus MAC, which falls back to the full length when the padding is bad.
fn check_padding(data: &[u8]) -> (Choice, usize) {
    let len = data.len();
    let pad = data[len - 1];
    let pad_len = pad as usize;

    // Room for the padding plus its length byte
    let mut ok = Choice::from(((pad_len + 1) <= len) as u8);

    let window = len.min(256);
    for i in 0..window {
        let in_padding = (i as u8).ct_lt(&pad) | (i as u8).ct_eq(&pad);
        let matches = data[len - 1 - i].ct_eq(&pad);
        ok &= !in_padding | matches;
    }

    let stripped = if bool::from(ok) {
        len - pad_len - 1
    } else {
        len
    };

    (ok, stripped)
}

impl std::fmt::Debug for RecordProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProtection")
            .field("suite", &self.info.suite)
            .field("seq", &self.seq)
            .finish()
    }
}
