//! Arena of sessions addressed by generation checked handles.

use crate::session::Session;
use crate::store::{CertificateKey, CertificateLocation};
use crate::Error;

/// Refers to a session in a [`SessionRegistry`].
///
/// A handle goes stale when its session is removed. A stale handle never
/// reaches a session inserted later into the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    session: Option<Session>,
}

/// Owner of the sessions an application created.
///
/// Bulk operations, such as dropping a certificate from every session,
/// run here. Share it behind a `Mutex` when several threads need it.
#[derive(Default)]
pub struct SessionRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) -> SessionHandle {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.session = Some(session);
            return SessionHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            session: Some(session),
        });
        SessionHandle {
            index,
            generation: 0,
        }
    }

    fn slot(&self, handle: SessionHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: SessionHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
    }

    pub fn get(&self, handle: SessionHandle) -> Result<&Session, Error> {
        self.slot(handle)
            .and_then(|s| s.session.as_ref())
            .ok_or(Error::InvalidSessionHandle)
    }

    pub fn get_mut(&mut self, handle: SessionHandle) -> Result<&mut Session, Error> {
        self.slot_mut(handle)
            .and_then(|s| s.session.as_mut())
            .ok_or(Error::InvalidSessionHandle)
    }

    /// Take a session out. Its handle, and every copy of it, goes stale.
    pub fn remove(&mut self, handle: SessionHandle) -> Result<Session, Error> {
        let slot = self.slot_mut(handle).ok_or(Error::InvalidSessionHandle)?;
        let session = slot.session.take().ok_or(Error::InvalidSessionHandle)?;
        slot.generation = slot.generation.wrapping_add(1);

        self.free.push(handle.index);
        self.len -= 1;
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().filter_map(|s| s.session.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.slots.iter_mut().filter_map(|s| s.session.as_mut())
    }

    /// Remove a certificate from every session holding it. Returns how
    /// many sessions had it.
    pub fn remove_certificate(&mut self, location: CertificateLocation, key: CertificateKey) -> usize {
        let removed = self
            .iter_mut()
            .filter_map(|s| s.remove_certificate(location, key).ok())
            .count();
        debug!("Removed certificate {:?} from {} sessions", key, removed);
        removed
    }

    /// Remove the PSK with `identity` from every session holding it.
    pub fn remove_psk(&mut self, identity: &[u8]) -> usize {
        self.iter_mut()
            .filter_map(|s| s.psks_mut().remove(identity).ok())
            .count()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::session::Role;

    fn session() -> Session {
        Session::new(Role::Client, Arc::new(Config::default()))
    }

    #[test]
    fn stale_handle_after_reuse() {
        let mut registry = SessionRegistry::new();
        let a = registry.insert(session());
        let b = registry.insert(session());
        assert_eq!(registry.len(), 2);

        registry.remove(a).unwrap();
        assert!(matches!(registry.get(a), Err(Error::InvalidSessionHandle)));
        assert!(matches!(registry.remove(a), Err(Error::InvalidSessionHandle)));

        // Same slot, new generation.
        let c = registry.insert(session());
        assert_ne!(a, c);
        assert!(matches!(registry.get_mut(a), Err(Error::InvalidSessionHandle)));
        assert!(registry.get(c).is_ok());
        assert!(registry.get(b).is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_psk_everywhere() {
        let mut registry = SessionRegistry::new();
        let a = registry.insert(session());
        let b = registry.insert(session());
        registry.insert(session());

        for h in [a, b] {
            registry
                .get_mut(h)
                .unwrap()
                .add_psk(&[7; 16], b"device", b"")
                .unwrap();
        }

        assert_eq!(registry.remove_psk(b"device"), 2);
        assert!(registry.get(a).unwrap().psks().is_empty());
        assert_eq!(registry.remove_psk(b"device"), 0);
    }

    #[test]
    fn remove_certificate_everywhere() {
        let der = include_bytes!("../tests/fixtures/ca_rsa.der");
        let mut registry = SessionRegistry::new();
        let a = registry.insert(session());
        let b = registry.insert(session());

        registry
            .get_mut(a)
            .unwrap()
            .add_certificate(CertificateLocation::Trusted, der, Some(5))
            .unwrap();

        let removed = registry.remove_certificate(CertificateLocation::Trusted, CertificateKey::Id(5));
        assert_eq!(removed, 1);
        assert_eq!(
            registry
                .get(a)
                .unwrap()
                .certificates()
                .len(CertificateLocation::Trusted),
            0
        );
        assert!(registry.get(b).is_ok());
    }
}
