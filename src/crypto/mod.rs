//! Cryptographic provider traits and the RustCrypto backend.

pub mod provider;
pub mod rust_crypto;

mod validation;

// Re-export all provider traits and types
pub use provider::{ActiveKeyExchange, CertificateParser, CipherMethod, CipherMode};
pub use provider::{CryptoProvider, CryptoSafe, CurveMethod, HashContext, HashMethod};
pub use provider::{KeyProvider, MacMethod, ParsedCertificate, PrfMethod, PrivateKey};
pub use provider::{PublicKey, RecordCipher, RsaMethod, SecureRandom};

// Re-export shared types for provider trait implementations
pub use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm};
