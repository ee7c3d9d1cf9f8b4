//! Running handshake hash.
//!
//! MD5, SHA-1 and SHA-256 run side by side over every handshake message
//! until the version is known, which keeps the code path the same for
//! TLS 1.0 to 1.2. Signatures and Finished are computed on snapshots so
//! the live transcript keeps going.

use crate::buffer::Buf;
use crate::crypto::provider::{CryptoProvider, HashContext, PrfMethod};
use crate::key_schedule::{KeyMaterial, VERIFY_DATA_LEN};
use crate::types::{HashAlgorithm, ProtocolVersion};
use crate::Error;

pub const CLIENT_FINISHED: &str = "client finished";
pub const SERVER_FINISHED: &str = "server finished";

/// Length of the TLS 1.0/1.1 MD5 + SHA-1 concatenation.
pub const MD5_SHA1_LEN: usize = 16 + 20;

pub struct Transcript {
    md5: Box<dyn HashContext>,
    sha1: Box<dyn HashContext>,
    sha256: Box<dyn HashContext>,
    /// Number of bytes hashed so far.
    len: usize,
}

impl Transcript {
    pub fn new(provider: &CryptoProvider) -> Self {
        Transcript {
            md5: provider.md5.create(),
            sha1: provider.sha1.create(),
            sha256: provider.sha256.create(),
            len: 0,
        }
    }

    /// Start over, e.g. after a HelloVerifyRequest or for a renegotiation.
    pub fn reset(&mut self, provider: &CryptoProvider) {
        *self = Transcript::new(provider);
    }

    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
        self.len += data.len();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether [`snapshot`](Self::snapshot) can produce `algorithm`.
    pub fn can_snapshot(algorithm: HashAlgorithm) -> bool {
        matches!(
            algorithm,
            HashAlgorithm::MD5 | HashAlgorithm::SHA1 | HashAlgorithm::SHA256
        )
    }

    /// Digest of the transcript so far with `algorithm`.
    pub fn snapshot(&self, algorithm: HashAlgorithm, out: &mut Buf) -> Result<(), Error> {
        out.clear();
        match algorithm {
            HashAlgorithm::MD5 => self.md5.clone_and_finalize(out),
            HashAlgorithm::SHA1 => self.sha1.clone_and_finalize(out),
            HashAlgorithm::SHA256 => self.sha256.clone_and_finalize(out),
            _ => return Err(Error::UnsupportedSignatureAlgorithm),
        }
        Ok(())
    }

    /// `MD5(transcript) || SHA1(transcript)`.
    pub fn md5_sha1(&self, out: &mut Buf) {
        out.clear();
        let mut tmp = Buf::new();
        self.md5.clone_and_finalize(&mut tmp);
        out.extend_from_slice(&tmp);
        tmp.clear();
        self.sha1.clone_and_finalize(&mut tmp);
        out.extend_from_slice(&tmp);
    }

    /// The hash fed to the Finished PRF for `version`.
    pub fn finished_hash(&self, version: ProtocolVersion, out: &mut Buf) {
        if version.is_tls12() {
            out.clear();
            self.sha256.clone_and_finalize(out);
        } else {
            self.md5_sha1(out);
        }
    }

    /// verify_data for the Finished sent with `label`.
    pub fn verify_data(
        &self,
        version: ProtocolVersion,
        prf: &dyn PrfMethod,
        keys: &mut KeyMaterial,
        label: &str,
    ) -> Result<[u8; VERIFY_DATA_LEN], Error> {
        let mut hash = Buf::new();
        self.finished_hash(version, &mut hash);
        keys.verify_data(prf, label, &hash)
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto;

    #[test]
    fn snapshot_leaves_running_hash() {
        let provider = rust_crypto::default_provider();
        let mut t = Transcript::new(&provider);
        t.update(b"abc");

        let mut first = Buf::new();
        t.snapshot(HashAlgorithm::SHA256, &mut first).unwrap();
        assert_eq!(
            &first[..4],
            &[0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") prefix"
        );

        t.update(b"def");
        let mut second = Buf::new();
        t.snapshot(HashAlgorithm::SHA256, &mut second).unwrap();
        assert_ne!(first, second);

        let mut direct = Buf::new();
        provider.sha256.digest(b"abcdef", &mut direct);
        assert_eq!(second, direct);
    }

    #[test]
    fn legacy_finished_hash_is_md5_sha1() {
        let provider = rust_crypto::default_provider();
        let mut t = Transcript::new(&provider);
        t.update(b"hello");

        let mut out = Buf::new();
        t.finished_hash(ProtocolVersion::TLS1_0, &mut out);
        assert_eq!(out.len(), MD5_SHA1_LEN);

        let mut md5 = Buf::new();
        provider.md5.digest(b"hello", &mut md5);
        assert_eq!(&out[..16], &md5[..]);

        t.finished_hash(ProtocolVersion::TLS1_2, &mut out);
        assert_eq!(out.len(), 32);
    }

    #[test]
    fn reset_clears() {
        let provider = rust_crypto::default_provider();
        let mut t = Transcript::new(&provider);
        t.update(b"x");
        assert_eq!(t.len(), 1);
        t.reset(&provider);
        assert!(t.is_empty());
    }

    #[test]
    fn unsupported_snapshot() {
        let provider = rust_crypto::default_provider();
        let t = Transcript::new(&provider);
        let mut out = Buf::new();
        assert!(matches!(
            t.snapshot(HashAlgorithm::SHA384, &mut out),
            Err(Error::UnsupportedSignatureAlgorithm)
        ));
    }
}
