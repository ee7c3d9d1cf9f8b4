//! Hash implementations using RustCrypto.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashMethod};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
#[derive(Debug, Clone)]
enum RustCryptoHashContext {
    Md5(Md5),
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Md5(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha1(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha224(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha256(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha384(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha512(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self, out: &mut Buf) {
        out.clear();
        match self {
            RustCryptoHashContext::Md5(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha1(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha224(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha256(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha384(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha512(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
        }
    }

    fn box_clone(&self) -> Box<dyn HashContext> {
        Box::new(self.clone())
    }
}

/// A hash method for one fixed algorithm.
#[derive(Debug)]
pub(super) struct RustCryptoHash(HashAlgorithm);

impl HashMethod for RustCryptoHash {
    fn algorithm(&self) -> HashAlgorithm {
        self.0
    }

    fn output_len(&self) -> usize {
        self.0.output_len()
    }

    fn create(&self) -> Box<dyn HashContext> {
        let ctx = match self.0 {
            HashAlgorithm::MD5 => RustCryptoHashContext::Md5(Md5::new()),
            HashAlgorithm::SHA1 => RustCryptoHashContext::Sha1(Sha1::new()),
            HashAlgorithm::SHA224 => RustCryptoHashContext::Sha224(Sha224::new()),
            HashAlgorithm::SHA384 => RustCryptoHashContext::Sha384(Sha384::new()),
            HashAlgorithm::SHA512 => RustCryptoHashContext::Sha512(Sha512::new()),
            // The statics below only name supported algorithms.
            _ => RustCryptoHashContext::Sha256(Sha256::new()),
        };
        Box::new(ctx)
    }
}

pub(super) static MD5: RustCryptoHash = RustCryptoHash(HashAlgorithm::MD5);
pub(super) static SHA1: RustCryptoHash = RustCryptoHash(HashAlgorithm::SHA1);
pub(super) static SHA224: RustCryptoHash = RustCryptoHash(HashAlgorithm::SHA224);
pub(super) static SHA256: RustCryptoHash = RustCryptoHash(HashAlgorithm::SHA256);
pub(super) static SHA384: RustCryptoHash = RustCryptoHash(HashAlgorithm::SHA384);
pub(super) static SHA512: RustCryptoHash = RustCryptoHash(HashAlgorithm::SHA512);

/// All hash methods, for certificate signature checks.
pub(super) static ALL_HASHES: &[&dyn HashMethod] =
    &[&MD5, &SHA1, &SHA224, &SHA256, &SHA384, &SHA512];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snapshot_does_not_disturb_running_hash() {
        let mut ctx = SHA256.create();
        ctx.update(b"abc");

        let mut snap = Buf::new();
        ctx.clone_and_finalize(&mut snap);

        let mut again = Buf::new();
        ctx.clone_and_finalize(&mut again);
        assert_eq!(snap, again);

        ctx.update(b"def");
        let mut full = Buf::new();
        ctx.clone_and_finalize(&mut full);

        let mut direct = Buf::new();
        SHA256.digest(b"abcdef", &mut direct);
        assert_eq!(full, direct);
    }

    #[test]
    fn output_lengths() {
        for h in ALL_HASHES {
            let mut out = Buf::new();
            h.digest(b"x", &mut out);
            assert_eq!(out.len(), h.output_len());
        }
    }
}
