//! HMAC utilities using RustCrypto.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use crate::buffer::Buf;
use crate::crypto::provider::MacMethod;
use crate::types::HashAlgorithm;

/// Compute the P_hash expansion of RFC 5246 section 5 into all of `out`.
///
/// The keyed state is computed once and cloned per block.
pub(super) fn p_hash<M>(secret: &[u8], full_seed: &[u8], out: &mut [u8]) -> Result<(), String>
where
    M: Mac + KeyInit + Clone,
{
    let keyed = <M as Mac>::new_from_slice(secret)
        .map_err(|_| "Invalid HMAC key length".to_string())?;

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a_hmac = keyed.clone();
    a_hmac.update(full_seed);
    let mut a = a_hmac.finalize().into_bytes();

    let mut written = 0;
    while written < out.len() {
        // HMAC_hash(secret, A(i) + seed)
        let mut ctx = keyed.clone();
        ctx.update(&a);
        ctx.update(full_seed);
        let output = ctx.finalize().into_bytes();

        let to_copy = (out.len() - written).min(output.len());
        out[written..written + to_copy].copy_from_slice(&output[..to_copy]);
        written += to_copy;

        if written < out.len() {
            // A(i+1) = HMAC_hash(secret, A(i))
            let mut next_a = keyed.clone();
            next_a.update(&a);
            a = next_a.finalize().into_bytes();
        }
    }

    Ok(())
}

fn hmac_parts<M>(key: &[u8], parts: &[&[u8]], out: &mut Buf) -> Result<(), String>
where
    M: Mac + KeyInit,
{
    let mut mac =
        <M as Mac>::new_from_slice(key).map_err(|_| "Invalid HMAC key".to_string())?;
    for part in parts {
        mac.update(part);
    }
    out.clear();
    out.extend_from_slice(&mac.finalize().into_bytes());
    Ok(())
}

/// HMAC over one of the record MAC hashes.
#[derive(Debug)]
pub(super) struct RustCryptoHmac(HashAlgorithm);

impl MacMethod for RustCryptoHmac {
    fn algorithm(&self) -> HashAlgorithm {
        self.0
    }

    fn mac_len(&self) -> usize {
        self.0.output_len()
    }

    fn compute(&self, key: &[u8], parts: &[&[u8]], out: &mut Buf) -> Result<(), String> {
        match self.0 {
            HashAlgorithm::MD5 => hmac_parts::<Hmac<Md5>>(key, parts, out),
            HashAlgorithm::SHA1 => hmac_parts::<Hmac<Sha1>>(key, parts, out),
            HashAlgorithm::SHA256 => hmac_parts::<Hmac<Sha256>>(key, parts, out),
            other => Err(format!("Unsupported HMAC hash algorithm: {:?}", other)),
        }
    }
}

/// The MAC of AEAD suites: nothing to compute, integrity comes from the cipher.
#[derive(Debug)]
pub(super) struct NullMac;

impl MacMethod for NullMac {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::None
    }

    fn mac_len(&self) -> usize {
        0
    }

    fn compute(&self, _key: &[u8], _parts: &[&[u8]], out: &mut Buf) -> Result<(), String> {
        out.clear();
        Ok(())
    }
}

pub(super) static HMAC_MD5: RustCryptoHmac = RustCryptoHmac(HashAlgorithm::MD5);
pub(super) static HMAC_SHA1: RustCryptoHmac = RustCryptoHmac(HashAlgorithm::SHA1);
pub(super) static HMAC_SHA256: RustCryptoHmac = RustCryptoHmac(HashAlgorithm::SHA256);
pub(super) static NULL_MAC: NullMac = NullMac;
