use std::fmt;
use std::sync::Arc;

use tinyvec::ArrayVec;

use crate::crypto::provider::{CryptoProvider, ParsedCertificate, PrivateKey, PublicKey};
use crate::message::MAX_CHAIN_LEN;
use crate::signature::verify_certificate;
use crate::types::SignatureAlgorithm;
use crate::Error;

/// Which list of the store a certificate lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateLocation {
    /// Our own identity, with its private key, plus intermediates.
    Local,
    /// The chain the peer presented.
    Remote,
    /// Trust anchors.
    Trusted,
}

/// How to look up a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKey<'a> {
    /// Caller assigned numeric id.
    Id(u32),
    /// DER encoded subject name.
    Subject(&'a [u8]),
}

/// A parsed X.509 certificate, optionally with its private key.
pub struct StoredCertificate {
    der: Vec<u8>,
    parsed: ParsedCertificate,
    private_key: Option<Box<dyn PrivateKey>>,
}

impl StoredCertificate {
    pub fn parse(der: &[u8], provider: &CryptoProvider) -> Result<Self, Error> {
        let parsed = provider.certificate_parser.parse(der).map_err(|e| {
            debug!("Certificate parse failed: {}", e);
            Error::InvalidCertificate
        })?;

        Ok(StoredCertificate {
            der: der.to_vec(),
            parsed,
            private_key: None,
        })
    }

    /// Attach the private key of a local certificate.
    ///
    /// The key type must match the certificate's public key.
    pub fn with_private_key(
        mut self,
        key_der: &[u8],
        provider: &CryptoProvider,
    ) -> Result<Self, Error> {
        let key = provider
            .key_provider
            .load_private_key(key_der)
            .map_err(Error::CryptoError)?;
        if key.algorithm() != self.parsed.public_key.algorithm() {
            return Err(Error::InvalidCertificate);
        }
        self.private_key = Some(key);
        Ok(self)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn parsed(&self) -> &ParsedCertificate {
        &self.parsed
    }

    pub fn subject(&self) -> &[u8] {
        &self.parsed.subject
    }

    pub fn issuer(&self) -> &[u8] {
        &self.parsed.issuer
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.parsed.public_key
    }

    pub fn private_key(&self) -> Option<&dyn PrivateKey> {
        self.private_key.as_deref()
    }

    pub fn is_self_signed(&self) -> bool {
        self.parsed.subject == self.parsed.issuer
    }

    /// Check validity against `now` (unix seconds).
    pub fn check_validity(&self, now: u64) -> Result<(), Error> {
        if now < self.parsed.not_before || now > self.parsed.not_after {
            return Err(Error::CertificateExpired);
        }
        Ok(())
    }
}

impl fmt::Debug for StoredCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCertificate")
            .field("der_len", &self.der.len())
            .field("public_key", &self.parsed.public_key.algorithm())
            .field("has_private_key", &self.private_key.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    /// 0 when the certificate was added without an id.
    id: u32,
    cert: Arc<StoredCertificate>,
}

impl Entry {
    fn matches(&self, key: CertificateKey) -> bool {
        match key {
            CertificateKey::Id(id) => self.id == id,
            CertificateKey::Subject(name) => self.cert.subject() == name,
        }
    }
}

/// Local, remote and trusted certificate lists of one session.
///
/// Certificates are shared through `Arc`, so the same trust anchors can be
/// added to many sessions.
#[derive(Debug, Default, Clone)]
pub struct CertificateStore {
    local: Vec<Entry>,
    remote: Vec<Entry>,
    trusted: Vec<Entry>,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, location: CertificateLocation) -> &Vec<Entry> {
        match location {
            CertificateLocation::Local => &self.local,
            CertificateLocation::Remote => &self.remote,
            CertificateLocation::Trusted => &self.trusted,
        }
    }

    fn list_mut(&mut self, location: CertificateLocation) -> &mut Vec<Entry> {
        match location {
            CertificateLocation::Local => &mut self.local,
            CertificateLocation::Remote => &mut self.remote,
            CertificateLocation::Trusted => &mut self.trusted,
        }
    }

    /// Append a certificate to a list.
    ///
    /// An id must be non-zero and unique within the list. Without an id the
    /// subject must be unique instead.
    pub fn add(
        &mut self,
        location: CertificateLocation,
        cert: Arc<StoredCertificate>,
        id: Option<u32>,
    ) -> Result<(), Error> {
        let list = self.list_mut(location);

        match id {
            Some(0) => return Err(Error::CertificateIdInvalid),
            Some(id) => {
                if list.iter().any(|e| e.id == id) {
                    return Err(Error::CertificateIdDuplicate);
                }
            }
            None => {
                if list.iter().any(|e| e.cert.subject() == cert.subject()) {
                    return Err(Error::DuplicateCertificate);
                }
            }
        }

        list.push(Entry {
            id: id.unwrap_or(0),
            cert,
        });
        Ok(())
    }

    /// Look in trusted, then local, then remote.
    pub fn find(
        &self,
        key: CertificateKey,
    ) -> Option<(&Arc<StoredCertificate>, CertificateLocation)> {
        [
            CertificateLocation::Trusted,
            CertificateLocation::Local,
            CertificateLocation::Remote,
        ]
        .into_iter()
        .find_map(|loc| self.find_in(loc, key).map(|c| (c, loc)))
    }

    pub fn find_in(
        &self,
        location: CertificateLocation,
        key: CertificateKey,
    ) -> Option<&Arc<StoredCertificate>> {
        self.list(location)
            .iter()
            .find(|e| e.matches(key))
            .map(|e| &e.cert)
    }

    pub fn remove(
        &mut self,
        location: CertificateLocation,
        key: CertificateKey,
    ) -> Result<Arc<StoredCertificate>, Error> {
        let list = self.list_mut(location);
        let pos = list
            .iter()
            .position(|e| e.matches(key))
            .ok_or(Error::CertificateNotFound)?;
        Ok(list.remove(pos).cert)
    }

    pub fn len(&self, location: CertificateLocation) -> usize {
        self.list(location).len()
    }

    /// Subjects of a list, in order.
    pub fn subjects(&self, location: CertificateLocation) -> impl Iterator<Item = &[u8]> {
        self.list(location).iter().map(|e| e.cert.subject())
    }

    /// First local certificate with a private key of type `key`.
    pub fn local_identity(&self, key: SignatureAlgorithm) -> Option<&Arc<StoredCertificate>> {
        self.local
            .iter()
            .map(|e| &e.cert)
            .find(|c| c.private_key.is_some() && c.public_key().algorithm() == key)
    }

    /// The chain to send for `leaf`: the leaf followed by its issuers as
    /// found among the local certificates. Self signed roots are left out.
    pub fn local_chain<'a>(&'a self, leaf: &'a StoredCertificate) -> ArrayVec<[&'a [u8]; MAX_CHAIN_LEN]> {
        let mut chain: ArrayVec<[&[u8]; MAX_CHAIN_LEN]> = ArrayVec::new();
        chain.push(leaf.der());

        let mut current = leaf;
        while !current.is_self_signed() && chain.len() < MAX_CHAIN_LEN {
            let Some(issuer) = self
                .local
                .iter()
                .map(|e| e.cert.as_ref())
                .find(|c| c.subject() == current.issuer())
            else {
                break;
            };
            if issuer.is_self_signed() {
                break;
            }
            chain.push(issuer.der());
            current = issuer;
        }

        chain
    }

    /// Replace the remote list with the chain the peer sent.
    pub fn set_remote_chain(
        &mut self,
        chain: &[&[u8]],
        provider: &CryptoProvider,
    ) -> Result<(), Error> {
        self.remote.clear();
        for der in chain {
            let cert = StoredCertificate::parse(der, provider)?;
            self.remote.push(Entry {
                id: 0,
                cert: Arc::new(cert),
            });
        }
        Ok(())
    }

    pub fn remote_leaf(&self) -> Option<&Arc<StoredCertificate>> {
        self.remote.first().map(|e| &e.cert)
    }

    /// Drop the peer's certificates once they are no longer needed.
    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }

    /// Walk the remote chain from the leaf until a trust anchor signs it.
    ///
    /// Each certificate must be signed by the next one, or by a trusted
    /// certificate whose subject is its issuer. With `now` set, validity
    /// periods are checked along the way.
    pub fn verify_remote_chain(
        &self,
        provider: &CryptoProvider,
        now: Option<u64>,
    ) -> Result<(), Error> {
        if self.remote.is_empty() {
            return Err(Error::CertificateNotFound);
        }

        for (i, entry) in self.remote.iter().enumerate() {
            let cert = &entry.cert;
            if let Some(now) = now {
                cert.check_validity(now)?;
            }

            if self.trusted.iter().any(|t| t.cert.der() == cert.der()) {
                trace!("Remote certificate {} is trusted", i);
                return Ok(());
            }

            if let Some(anchor) = self
                .trusted
                .iter()
                .map(|t| &t.cert)
                .find(|t| t.subject() == cert.issuer())
            {
                if let Some(now) = now {
                    anchor.check_validity(now)?;
                }
                verify_certificate(cert.parsed(), anchor.public_key(), provider)?;
                trace!("Remote certificate {} signed by trust anchor", i);
                return Ok(());
            }

            match self.remote.get(i + 1) {
                Some(next) if !cert.is_self_signed() && next.cert.subject() == cert.issuer() => {
                    verify_certificate(cert.parsed(), next.cert.public_key(), provider)?;
                }
                _ => break,
            }
        }

        Err(Error::IssuerCertificateNotFound)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto;

    const SERVER_RSA: &[u8] = include_bytes!("../../tests/fixtures/server_rsa.der");
    const SERVER_RSA_KEY: &[u8] = include_bytes!("../../tests/fixtures/server_rsa.key");
    const SERVER_EC: &[u8] = include_bytes!("../../tests/fixtures/server_ec.der");
    const SERVER_EC_KEY: &[u8] = include_bytes!("../../tests/fixtures/server_ec.key");
    const CA_RSA: &[u8] = include_bytes!("../../tests/fixtures/ca_rsa.der");
    const CA_EC: &[u8] = include_bytes!("../../tests/fixtures/ca_ec.der");

    fn cert(der: &[u8]) -> Arc<StoredCertificate> {
        let provider = rust_crypto::default_provider();
        Arc::new(StoredCertificate::parse(der, &provider).unwrap())
    }

    #[test]
    fn id_must_be_non_zero_and_unique() {
        let mut store = CertificateStore::new();
        assert!(matches!(
            store.add(CertificateLocation::Trusted, cert(CA_RSA), Some(0)),
            Err(Error::CertificateIdInvalid)
        ));
        store
            .add(CertificateLocation::Trusted, cert(CA_RSA), Some(7))
            .unwrap();
        assert!(matches!(
            store.add(CertificateLocation::Trusted, cert(CA_EC), Some(7)),
            Err(Error::CertificateIdDuplicate)
        ));
        // Same id in another list is fine.
        store
            .add(CertificateLocation::Local, cert(SERVER_RSA), Some(7))
            .unwrap();
    }

    #[test]
    fn same_subject_needs_an_id() {
        let mut store = CertificateStore::new();
        store
            .add(CertificateLocation::Trusted, cert(CA_RSA), None)
            .unwrap();
        assert!(matches!(
            store.add(CertificateLocation::Trusted, cert(CA_RSA), None),
            Err(Error::DuplicateCertificate)
        ));
        store
            .add(CertificateLocation::Trusted, cert(CA_RSA), Some(2))
            .unwrap();
        assert_eq!(store.len(CertificateLocation::Trusted), 2);
    }

    #[test]
    fn find_and_remove() {
        let mut store = CertificateStore::new();
        let ca = cert(CA_RSA);
        store
            .add(CertificateLocation::Trusted, ca.clone(), Some(3))
            .unwrap();

        let (found, loc) = store.find(CertificateKey::Subject(ca.subject())).unwrap();
        assert_eq!(loc, CertificateLocation::Trusted);
        assert_eq!(found.der(), CA_RSA);
        assert!(store.find(CertificateKey::Id(3)).is_some());

        store
            .remove(CertificateLocation::Trusted, CertificateKey::Id(3))
            .unwrap();
        assert!(matches!(
            store.remove(CertificateLocation::Trusted, CertificateKey::Id(3)),
            Err(Error::CertificateNotFound)
        ));
        assert!(store.find(CertificateKey::Id(3)).is_none());
    }

    #[test]
    fn chain_to_trusted_root() {
        let provider = rust_crypto::default_provider();
        let mut store = CertificateStore::new();
        store
            .add(CertificateLocation::Trusted, cert(CA_RSA), None)
            .unwrap();
        store.set_remote_chain(&[SERVER_RSA], &provider).unwrap();
        store.verify_remote_chain(&provider, Some(1_700_000_000)).unwrap();
    }

    #[test]
    fn chain_including_root() {
        let provider = rust_crypto::default_provider();
        let mut store = CertificateStore::new();
        store
            .add(CertificateLocation::Trusted, cert(CA_EC), None)
            .unwrap();
        store.set_remote_chain(&[SERVER_EC, CA_EC], &provider).unwrap();
        store.verify_remote_chain(&provider, None).unwrap();
    }

    #[test]
    fn untrusted_chain() {
        let provider = rust_crypto::default_provider();
        let mut store = CertificateStore::new();
        store
            .add(CertificateLocation::Trusted, cert(CA_EC), None)
            .unwrap();
        store.set_remote_chain(&[SERVER_RSA, CA_RSA], &provider).unwrap();
        assert!(matches!(
            store.verify_remote_chain(&provider, None),
            Err(Error::IssuerCertificateNotFound)
        ));
    }

    #[test]
    fn expired_by_time_callback() {
        let provider = rust_crypto::default_provider();
        let mut store = CertificateStore::new();
        store
            .add(CertificateLocation::Trusted, cert(CA_RSA), None)
            .unwrap();
        store.set_remote_chain(&[SERVER_RSA], &provider).unwrap();
        // 2010, before the fixtures' not_before.
        assert!(matches!(
            store.verify_remote_chain(&provider, Some(1_262_304_000)),
            Err(Error::CertificateExpired)
        ));
    }

    #[test]
    fn local_identity_by_key_type() {
        let provider = rust_crypto::default_provider();
        let mut store = CertificateStore::new();
        let rsa = StoredCertificate::parse(SERVER_RSA, &provider)
            .unwrap()
            .with_private_key(SERVER_RSA_KEY, &provider)
            .unwrap();
        let ec = StoredCertificate::parse(SERVER_EC, &provider)
            .unwrap()
            .with_private_key(SERVER_EC_KEY, &provider)
            .unwrap();
        store
            .add(CertificateLocation::Local, Arc::new(rsa), Some(1))
            .unwrap();
        store
            .add(CertificateLocation::Local, Arc::new(ec), Some(2))
            .unwrap();

        let leaf = store.local_identity(SignatureAlgorithm::ECDSA).unwrap();
        assert_eq!(leaf.der(), SERVER_EC);
        assert_eq!(store.local_chain(leaf).as_slice(), &[SERVER_EC]);
    }

    #[test]
    fn key_must_match_certificate() {
        let provider = rust_crypto::default_provider();
        let r = StoredCertificate::parse(SERVER_RSA, &provider)
            .unwrap()
            .with_private_key(SERVER_EC_KEY, &provider);
        assert!(matches!(r, Err(Error::InvalidCertificate)));
    }
}
