//! Credentials: X.509 certificates and pre-shared keys.

mod certificate;
mod psk;

pub use certificate::{CertificateKey, CertificateLocation, CertificateStore, StoredCertificate};
pub use psk::{PskEntry, PskStore, MAX_PSK_ENTRIES, MAX_PSK_IDENTITY_LEN, MAX_PSK_LEN};
