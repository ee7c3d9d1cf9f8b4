//! Key schedule: pre-master secrets, master secret and the key block.
//!
//! The key block is PRF(master_secret, "key expansion", server_random +
//! client_random) sliced as
//!
//! ```text
//! client MAC | server MAC | client key | server key | client IV | server IV
//! ```
//!
//! Freshly derived material lands in a shadow block. A direction switches to
//! it when its ChangeCipherSpec is processed, so records protected under the
//! old keys keep working during a renegotiation until then.

use zeroize::Zeroize;

use crate::ciphersuite::CipherSuiteInfo;
use crate::crypto::provider::{CryptoProvider, PrfMethod, SecureRandom};
use crate::buffer::Buf;
use crate::types::ProtocolVersion;
use crate::Error;

/// Room for an ECDH shared secret up to secp521r1, or a 32 byte PSK.
pub const PRE_MASTER_MAX: usize = 68;

pub const MASTER_SECRET_LEN: usize = 48;

/// `2 × (max hash + max key + max IV)`.
pub const KEY_MATERIAL_MAX: usize = 2 * (48 + 32 + 16);

/// Length of the RSA pre-master secret.
pub const RSA_PRE_MASTER_LEN: usize = 48;

pub const RANDOM_LEN: usize = 32;

/// Finished verify_data length.
pub const VERIFY_DATA_LEN: usize = 12;

/// Which side of the connection a set of keys protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientWrite,
    ServerWrite,
}

/// MAC secret, key and IV for one direction.
#[derive(Debug)]
pub struct DirectionKeys<'a> {
    pub mac_secret: &'a [u8],
    pub key: &'a [u8],
    pub iv: &'a [u8],
}

/// Secret material of one session.
pub struct KeyMaterial {
    pub client_random: [u8; RANDOM_LEN],
    pub server_random: [u8; RANDOM_LEN],
    pre_master: [u8; PRE_MASTER_MAX],
    pre_master_len: usize,
    master: [u8; MASTER_SECRET_LEN],
    /// The block the current keys were taken from.
    key_block: [u8; KEY_MATERIAL_MAX],
    key_block_len: usize,
    /// Newly derived block, not yet in use.
    new_key_block: [u8; KEY_MATERIAL_MAX],
    new_key_block_len: usize,
    /// The suite `new_key_block` was derived for.
    new_suite: Option<&'static CipherSuiteInfo>,
    scratch: Buf,
}

impl Default for KeyMaterial {
    fn default() -> Self {
        KeyMaterial {
            client_random: [0; RANDOM_LEN],
            server_random: [0; RANDOM_LEN],
            pre_master: [0; PRE_MASTER_MAX],
            pre_master_len: 0,
            master: [0; MASTER_SECRET_LEN],
            key_block: [0; KEY_MATERIAL_MAX],
            key_block_len: 0,
            new_key_block: [0; KEY_MATERIAL_MAX],
            new_key_block_len: 0,
            new_suite: None,
            scratch: Buf::new(),
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("pre_master_len", &self.pre_master_len)
            .field("key_block_len", &self.key_block_len)
            .field("new_key_block_len", &self.new_key_block_len)
            .finish_non_exhaustive()
    }
}

/// The PRF for a negotiated version: MD5 + SHA-1 up to TLS 1.1, the suite's
/// PRF from TLS 1.2.
pub fn prf_for(
    version: ProtocolVersion,
    info: &CipherSuiteInfo,
    provider: &CryptoProvider,
) -> &'static dyn PrfMethod {
    if version.is_legacy_prf() {
        provider.prf_1
    } else {
        info.prf
    }
}

impl KeyMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    /// 46 random bytes after the two byte client version offered in ClientHello.
    pub fn generate_rsa_pre_master(
        &mut self,
        client_version: ProtocolVersion,
        rng: &dyn SecureRandom,
    ) -> Result<(), Error> {
        rng.fill(&mut self.pre_master[..RSA_PRE_MASTER_LEN])
            .map_err(Error::CryptoError)?;
        self.pre_master[..2].copy_from_slice(&client_version.as_u16().to_be_bytes());
        self.pre_master_len = RSA_PRE_MASTER_LEN;
        Ok(())
    }

    /// `uint16(N) || 0^N || uint16(N) || psk` (RFC 4279 section 2).
    pub fn generate_psk_pre_master(&mut self, psk: &[u8]) -> Result<(), Error> {
        let n = psk.len();
        let total = 2 + n + 2 + n;
        if total > PRE_MASTER_MAX || n > u16::MAX as usize {
            return Err(Error::NoMorePskSpace);
        }

        let len = (n as u16).to_be_bytes();
        self.pre_master[..2].copy_from_slice(&len);
        self.pre_master[2..2 + n].fill(0);
        self.pre_master[2 + n..4 + n].copy_from_slice(&len);
        self.pre_master[4 + n..total].copy_from_slice(psk);
        self.pre_master_len = total;
        Ok(())
    }

    /// Install a pre-master computed elsewhere (RSA decryption, ECDH).
    pub fn set_pre_master(&mut self, secret: &[u8]) -> Result<(), Error> {
        if secret.len() > PRE_MASTER_MAX {
            return Err(Error::CryptoKeysTooLarge);
        }
        self.pre_master[..secret.len()].copy_from_slice(secret);
        self.pre_master_len = secret.len();
        Ok(())
    }

    pub fn pre_master(&self) -> &[u8] {
        &self.pre_master[..self.pre_master_len]
    }

    /// master_secret = PRF(pre_master_secret, "master secret",
    ///                     client_random + server_random)[0..47]
    ///
    /// The pre-master is wiped afterwards.
    pub fn generate_master_secret(&mut self, prf: &dyn PrfMethod) -> Result<(), Error> {
        if self.pre_master_len == 0 {
            return Err(Error::InvalidState);
        }

        let mut seed = [0u8; 2 * RANDOM_LEN];
        seed[..RANDOM_LEN].copy_from_slice(&self.client_random);
        seed[RANDOM_LEN..].copy_from_slice(&self.server_random);

        let result = prf.prf(
            &self.pre_master[..self.pre_master_len],
            "master secret",
            &seed,
            &mut self.master,
            &mut self.scratch,
        );

        self.pre_master.zeroize();
        self.pre_master_len = 0;
        self.scratch.zeroize();

        result.map_err(Error::CryptoError)
    }

    pub fn master_secret(&self) -> &[u8] {
        &self.master
    }

    /// Expand the master secret into the shadow key block for `info`.
    pub fn generate_key_material(
        &mut self,
        info: &'static CipherSuiteInfo,
        prf: &dyn PrfMethod,
    ) -> Result<(), Error> {
        let len = info.key_block_len();
        if len > KEY_MATERIAL_MAX {
            return Err(Error::CryptoKeysTooLarge);
        }

        let mut seed = [0u8; 2 * RANDOM_LEN];
        seed[..RANDOM_LEN].copy_from_slice(&self.server_random);
        seed[RANDOM_LEN..].copy_from_slice(&self.client_random);

        let result = prf.prf(
            &self.master,
            "key expansion",
            &seed,
            &mut self.new_key_block[..len],
            &mut self.scratch,
        );
        self.scratch.zeroize();
        result.map_err(Error::CryptoError)?;

        self.new_key_block_len = len;
        self.new_suite = Some(info);
        Ok(())
    }

    /// Keys for `direction` from the freshly derived block.
    pub fn pending_keys(&self, direction: Direction) -> Result<DirectionKeys<'_>, Error> {
        let info = self.new_suite.ok_or(Error::InvalidState)?;
        Ok(slice_keys(
            &self.new_key_block[..self.new_key_block_len],
            info,
            direction,
        ))
    }

    /// Both directions switched over: the shadow becomes the current block.
    pub fn promote(&mut self) {
        if self.new_key_block_len == 0 {
            return;
        }
        self.key_block.zeroize();
        self.key_block[..self.new_key_block_len]
            .copy_from_slice(&self.new_key_block[..self.new_key_block_len]);
        self.key_block_len = self.new_key_block_len;
        self.new_key_block.zeroize();
        self.new_key_block_len = 0;
        self.new_suite = None;
    }

    /// Keys for `direction` from the block currently in use.
    pub fn current_keys(
        &self,
        info: &CipherSuiteInfo,
        direction: Direction,
    ) -> Option<DirectionKeys<'_>> {
        if self.key_block_len == 0 {
            return None;
        }
        Some(slice_keys(
            &self.key_block[..self.key_block_len],
            info,
            direction,
        ))
    }

    /// verify_data = PRF(master_secret, finished_label, handshake_hash)[0..11]
    pub fn verify_data(
        &mut self,
        prf: &dyn PrfMethod,
        label: &str,
        handshake_hash: &[u8],
    ) -> Result<[u8; VERIFY_DATA_LEN], Error> {
        let mut out = [0u8; VERIFY_DATA_LEN];
        let result = prf.prf(
            &self.master,
            label,
            handshake_hash,
            &mut out,
            &mut self.scratch,
        );
        self.scratch.zeroize();
        result.map_err(Error::CryptoError)?;
        Ok(out)
    }
}

fn slice_keys<'a>(
    block: &'a [u8],
    info: &CipherSuiteInfo,
    direction: Direction,
) -> DirectionKeys<'a> {
    let h = info.hash_size();
    let k = info.key_size();
    let i = info.iv_size();

    let (mac, key, iv) = match direction {
        Direction::ClientWrite => (0, 2 * h, 2 * h + 2 * k),
        Direction::ServerWrite => (h, 2 * h + k, 2 * h + 2 * k + i),
    };

    DirectionKeys {
        mac_secret: &block[mac..mac + h],
        key: &block[key..key + k],
        iv: &block[iv..iv + i],
    }
}

impl Zeroize for KeyMaterial {
    fn zeroize(&mut self) {
        self.client_random.zeroize();
        self.server_random.zeroize();
        self.pre_master.zeroize();
        self.pre_master_len = 0;
        self.master.zeroize();
        self.key_block.zeroize();
        self.key_block_len = 0;
        self.new_key_block.zeroize();
        self.new_key_block_len = 0;
        self.new_suite = None;
        self.scratch.zeroize();
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.zeroize();
    }
}
