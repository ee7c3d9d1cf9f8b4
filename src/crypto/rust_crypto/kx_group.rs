//! Elliptic curve implementations using RustCrypto.

use p256::{ecdh::EphemeralSecret, PublicKey as P256PublicKey};
use p384::{ecdh::EphemeralSecret as P384EphemeralSecret, PublicKey as P384PublicKey};
use rand::rngs::OsRng;
use signature::hazmat::PrehashVerifier;

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, CurveMethod};
use crate::types::NamedGroup;

/// ECDHE key exchange implementation.
enum EcdhKeyExchange {
    P256 {
        secret: EphemeralSecret,
        public_key: Buf,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcdhKeyExchange::P256 { public_key, .. } => f
                .debug_struct("EcdhKeyExchange::P256")
                .field("public_key_len", &public_key.len())
                .finish_non_exhaustive(),
            EcdhKeyExchange::P384 { public_key, .. } => f
                .debug_struct("EcdhKeyExchange::P384")
                .field("public_key_len", &public_key.len())
                .finish_non_exhaustive(),
        }
    }
}

impl EcdhKeyExchange {
    fn new(group: NamedGroup, mut buf: Buf) -> Result<Self, String> {
        buf.clear();
        match group {
            NamedGroup::Secp256r1 => {
                let secret = EphemeralSecret::random(&mut OsRng);
                buf.extend_from_slice(&P256PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P256 {
                    secret,
                    public_key: buf,
                })
            }
            NamedGroup::Secp384r1 => {
                let secret = P384EphemeralSecret::random(&mut OsRng);
                buf.extend_from_slice(&P384PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P384 {
                    secret,
                    public_key: buf,
                })
            }
            _ => Err("Unsupported group".to_string()),
        }
    }
}

impl ActiveKeyExchange for EcdhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            EcdhKeyExchange::P256 { public_key, .. } => public_key,
            EcdhKeyExchange::P384 { public_key, .. } => public_key,
        }
    }

    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match *self {
            EcdhKeyExchange::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
        }
        Ok(())
    }

    fn group(&self) -> NamedGroup {
        match self {
            EcdhKeyExchange::P256 { .. } => NamedGroup::Secp256r1,
            EcdhKeyExchange::P384 { .. } => NamedGroup::Secp384r1,
        }
    }
}

/// Left pad a digest shorter than the curve order, e.g. SHA-1 on P-384.
/// The integer value is unchanged.
fn prehash_for(hash: &[u8], field_len: usize) -> Vec<u8> {
    if hash.len() >= field_len {
        return hash.to_vec();
    }
    let mut v = vec![0u8; field_len - hash.len()];
    v.extend_from_slice(hash);
    v
}

/// P-256 (secp256r1).
#[derive(Debug)]
struct P256;

impl CurveMethod for P256 {
    fn group(&self) -> NamedGroup {
        NamedGroup::Secp256r1
    }

    fn start_exchange(&self, buf: Buf) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(EcdhKeyExchange::new(NamedGroup::Secp256r1, buf)?))
    }

    fn verify_prehash(
        &self,
        public_key: &[u8],
        hash: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        use p256::ecdsa::{Signature, VerifyingKey};

        let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|_| "Invalid P-256 public key".to_string())?;
        let sig =
            Signature::from_der(signature).map_err(|_| "Invalid signature format".to_string())?;
        verifying_key
            .verify_prehash(&prehash_for(hash, 32), &sig)
            .map_err(|_| "ECDSA signature verification failed".to_string())
    }
}

/// P-384 (secp384r1).
#[derive(Debug)]
struct P384;

impl CurveMethod for P384 {
    fn group(&self) -> NamedGroup {
        NamedGroup::Secp384r1
    }

    fn start_exchange(&self, buf: Buf) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(EcdhKeyExchange::new(NamedGroup::Secp384r1, buf)?))
    }

    fn verify_prehash(
        &self,
        public_key: &[u8],
        hash: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        use p384::ecdsa::{Signature, VerifyingKey};

        let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|_| "Invalid P-384 public key".to_string())?;
        let sig =
            Signature::from_der(signature).map_err(|_| "Invalid signature format".to_string())?;
        verifying_key
            .verify_prehash(&prehash_for(hash, 48), &sig)
            .map_err(|_| "ECDSA signature verification failed".to_string())
    }
}

/// Static instances of supported curves.
static CURVE_P256: P256 = P256;
static CURVE_P384: P384 = P384;

/// All supported curves, in default preference order.
pub(super) static ALL_CURVES: &[&dyn CurveMethod] = &[&CURVE_P256, &CURVE_P384];
