//! TLS PRFs using RustCrypto.

use ::hmac::Hmac;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::provider::PrfMethod;

use super::hmac::p_hash;

fn full_seed(label: &str, seed: &[u8], scratch: &mut Buf) {
    // Compute full_seed = label + seed using scratch buffer
    scratch.clear();
    scratch.extend_from_slice(label.as_bytes());
    scratch.extend_from_slice(seed);
}

/// TLS 1.2 PRF with P_SHA256.
#[derive(Debug)]
pub(super) struct Tls12PrfSha256;

impl PrfMethod for Tls12PrfSha256 {
    fn prf(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut [u8],
        scratch: &mut Buf,
    ) -> Result<(), String> {
        full_seed(label, seed, scratch);
        p_hash::<Hmac<Sha256>>(secret, scratch, out)
    }
}

/// TLS 1.0/1.1 PRF: P_MD5 over the first half of the secret XOR
/// P_SHA1 over the second half. Odd length secrets share the middle byte.
#[derive(Debug)]
pub(super) struct Tls10Prf;

impl PrfMethod for Tls10Prf {
    fn prf(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut [u8],
        scratch: &mut Buf,
    ) -> Result<(), String> {
        full_seed(label, seed, scratch);

        let half = secret.len().div_ceil(2);
        let s1 = &secret[..half];
        let s2 = &secret[secret.len() - half..];

        p_hash::<Hmac<Md5>>(s1, scratch, out)?;

        let mut sha1_out = Zeroizing::new(vec![0u8; out.len()]);
        p_hash::<Hmac<Sha1>>(s2, scratch, &mut sha1_out)?;

        for (o, s) in out.iter_mut().zip(sha1_out.iter()) {
            *o ^= s;
        }

        Ok(())
    }
}

pub(super) static PRF_SHA256: Tls12PrfSha256 = Tls12PrfSha256;
pub(super) static PRF_TLS10: Tls10Prf = Tls10Prf;
