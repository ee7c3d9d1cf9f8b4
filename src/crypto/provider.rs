//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The engine never calls a cipher, hash or public key primitive directly.
//! Everything goes through a [`CryptoProvider`], a struct of `&'static`
//! trait objects, each covering one capability:
//!
//! - **Hashes** ([`HashMethod`]): factories for [`HashContext`], used by the
//!   handshake transcript and certificate signature checks.
//! - **MACs** ([`MacMethod`]): record HMAC and the DTLS cookie.
//! - **Record ciphers** ([`CipherMethod`]): factories for [`RecordCipher`],
//!   in null, CBC or AEAD mode.
//! - **PRFs** ([`PrfMethod`]): the TLS 1.0/1.1 MD5+SHA-1 PRF and the TLS 1.2
//!   P_SHA256 PRF.
//! - **Curves** ([`CurveMethod`]): ephemeral ECDH and ECDSA verification.
//! - **RSA** ([`RsaMethod`]): PKCS#1 v1.5 encryption and the raw public
//!   operation used to check signatures.
//! - **Keys** ([`KeyProvider`]): loads a [`PrivateKey`] for signing,
//!   RSA decryption and static ECDH.
//! - **Certificates** ([`CertificateParser`]): exposes the public key and
//!   signature fields of an X.509 certificate.
//! - **Randomness** ([`SecureRandom`]).
//!
//! Ciphersuite and X.509 signature tables live on the provider as well, so
//! swapping the provider swaps the registry.
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use crate::buffer::Buf;
use crate::ciphersuite::{CipherSuiteInfo, X509SignatureAlgorithm, X509SignatureInfo};
use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm};

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
///
/// Automatically implemented for all types that satisfy the bounds.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);

    /// Duplicate the running state.
    fn box_clone(&self) -> Box<dyn HashContext>;
}

/// Symmetric cipher keyed for one direction of a connection.
///
/// For CBC ciphers `iv` is the 16 byte block IV and `data` must be a
/// multiple of the block size; `aad` is ignored. For AEAD ciphers `iv` is
/// the full 12 byte nonce, the tag is appended on encrypt and verified and
/// removed on decrypt.
pub trait RecordCipher: CryptoSafe {
    fn encrypt(&mut self, iv: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String>;

    fn decrypt(&mut self, iv: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String>;
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    /// Get the public key for this exchange, as an uncompressed SEC1 point.
    fn pub_key(&self) -> &[u8];

    /// Complete exchange with peer's public key, returning shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Get the named group for this exchange.
    fn group(&self) -> NamedGroup;
}

/// A loaded private key matching a local certificate.
pub trait PrivateKey: CryptoSafe {
    /// Signature algorithm implied by the key type.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Curve of an EC key, `None` for RSA.
    fn group(&self) -> Option<NamedGroup>;

    /// Produce a signature.
    ///
    /// RSA keys apply PKCS#1 v1.5 type 1 padding to `data` as given, so the
    /// caller supplies the DigestInfo (or the raw MD5 + SHA-1 concatenation
    /// for TLS 1.0/1.1). ECDSA keys sign `data` as a prehashed digest and
    /// write a DER signature.
    fn sign(&self, data: &[u8], out: &mut Buf) -> Result<(), String>;

    /// RSA PKCS#1 v1.5 decryption of a ClientKeyExchange.
    fn decrypt(&self, ciphertext: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Static ECDH with the key of an EC certificate.
    fn agree(&self, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// Hash algorithm (factory for HashContext).
pub trait HashMethod: CryptoSafe {
    fn algorithm(&self) -> HashAlgorithm;

    fn output_len(&self) -> usize;

    fn create(&self) -> Box<dyn HashContext>;

    /// One-shot digest of `data` into `out`.
    fn digest(&self, data: &[u8], out: &mut Buf) {
        let mut ctx = self.create();
        ctx.update(data);
        ctx.clone_and_finalize(out);
    }
}

/// Keyed MAC over a sequence of byte slices.
pub trait MacMethod: CryptoSafe {
    /// The hash underlying the HMAC. `HashAlgorithm::None` for the null MAC of AEAD suites.
    fn algorithm(&self) -> HashAlgorithm;

    /// MAC output and MAC key length in bytes.
    fn mac_len(&self) -> usize;

    /// Compute the MAC over the concatenation of `parts`, writing it to `out`.
    fn compute(&self, key: &[u8], parts: &[&[u8]], out: &mut Buf) -> Result<(), String>;
}

/// Record cipher operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// No encryption, MAC only.
    Null,
    /// Block cipher in CBC mode, MAC-then-encrypt.
    Cbc,
    /// Authenticated encryption with a 4 byte implicit and 8 byte explicit nonce.
    Aead,
}

/// Record cipher (factory for RecordCipher).
pub trait CipherMethod: CryptoSafe {
    fn mode(&self) -> CipherMode;

    /// Encryption key length in bytes.
    fn key_len(&self) -> usize;

    /// IV bytes taken from the key block (CBC: block size, AEAD: implicit nonce).
    fn iv_len(&self) -> usize;

    /// Block size for padding. 1 for stream-like modes.
    fn block_len(&self) -> usize;

    /// Authentication tag length of AEAD ciphers.
    fn tag_len(&self) -> usize;

    /// Create a cipher instance with the given key. `None` for the null cipher.
    fn create(&self, key: &[u8]) -> Result<Option<Box<dyn RecordCipher>>, String>;
}

/// TLS pseudo random function.
pub trait PrfMethod: CryptoSafe {
    /// PRF(secret, label, seed) filling all of `out`.
    /// `scratch` holds the label + seed concatenation.
    fn prf(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        out: &mut [u8],
        scratch: &mut Buf,
    ) -> Result<(), String>;
}

/// Elliptic curve support.
pub trait CurveMethod: CryptoSafe {
    fn group(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair.
    /// The provided `buf` will be used to store the public key.
    fn start_exchange(&self, buf: Buf) -> Result<Box<dyn ActiveKeyExchange>, String>;

    /// Verify a DER ECDSA signature over an already computed digest.
    fn verify_prehash(&self, public_key: &[u8], hash: &[u8], signature: &[u8])
        -> Result<(), String>;
}

/// RSA public key operations on a key given as big endian modulus and exponent.
pub trait RsaMethod: CryptoSafe {
    /// PKCS#1 v1.5 type 2 encryption.
    fn encrypt_pkcs1(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;

    /// `input ^ exponent mod modulus`, left padded to the modulus length.
    fn public_raw(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        input: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;
}

/// Private key parser (factory for PrivateKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn PrivateKey>, String>;
}

/// Public key carried by a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },
    Ec { group: NamedGroup, point: Vec<u8> },
    Unsupported,
}

impl PublicKey {
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            PublicKey::Rsa { .. } => SignatureAlgorithm::RSA,
            PublicKey::Ec { .. } => SignatureAlgorithm::ECDSA,
            PublicKey::Unsupported => SignatureAlgorithm::Anonymous,
        }
    }
}

/// The fields of an X.509 certificate the engine needs.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    /// DER encoded subject distinguished name.
    pub subject: Vec<u8>,
    /// DER encoded issuer distinguished name.
    pub issuer: Vec<u8>,
    pub public_key: PublicKey,
    pub signature_algorithm: X509SignatureAlgorithm,
    /// DER encoded TBSCertificate, the signed part.
    pub tbs: Vec<u8>,
    pub signature: Vec<u8>,
    /// Validity as unix seconds.
    pub not_before: u64,
    pub not_after: u64,
}

/// X.509 certificate parser.
pub trait CertificateParser: CryptoSafe {
    fn parse(&self, der: &[u8]) -> Result<ParsedCertificate, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for the TLS engine.
///
/// Holds `&'static` trait objects so dispatch is a plain vtable call and a
/// provider can be copied around freely.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// The ciphersuite registry, in default preference order.
    pub cipher_suites: &'static [CipherSuiteInfo],

    /// X.509 signature algorithm table.
    pub x509_signatures: &'static [X509SignatureInfo],

    /// Supported curves, in default preference order.
    pub curves: &'static [&'static dyn CurveMethod],

    /// All available hash algorithms.
    pub hashes: &'static [&'static dyn HashMethod],

    /// Transcript hashes.
    pub md5: &'static dyn HashMethod,
    pub sha1: &'static dyn HashMethod,
    pub sha256: &'static dyn HashMethod,

    /// PRF for TLS 1.0 and 1.1.
    pub prf_1: &'static dyn PrfMethod,

    /// HMAC-SHA256, used for DTLS cookies.
    pub hmac_sha256: &'static dyn MacMethod,

    pub rsa: &'static dyn RsaMethod,

    pub key_provider: &'static dyn KeyProvider,

    pub certificate_parser: &'static dyn CertificateParser,

    pub secure_random: &'static dyn SecureRandom,
}

impl CryptoProvider {
    /// Find the hash method for an algorithm.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&'static dyn HashMethod> {
        self.hashes
            .iter()
            .copied()
            .find(|h| h.algorithm() == algorithm)
    }

    /// Find a curve by named group.
    pub fn curve(&self, group: NamedGroup) -> Option<&'static dyn CurveMethod> {
        self.curves.iter().copied().find(|c| c.group() == group)
    }
}

/// Static storage for the default crypto provider.
///
/// This is set by `install_default()` and retrieved by `get_default()`.
static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// [`Config::builder()`](crate::Config::builder) uses it when no explicit
    /// provider is given.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn install_default(provider: CryptoProvider) {
        DEFAULT
            .set(provider)
            .expect("CryptoProvider::install_default() called more than once");
    }

    /// Get the default crypto provider, if one has been installed.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }
}
