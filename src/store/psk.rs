use std::fmt;

use zeroize::Zeroizing;

use crate::Error;

/// Most PSKs one session holds.
pub const MAX_PSK_ENTRIES: usize = 8;

/// Longest accepted PSK. The pre-master secret holds `4 + 2 * len` bytes,
/// so keys longer than 32 bytes are only good for storage, not for use.
pub const MAX_PSK_LEN: usize = 64;

/// Longest identity or identity hint.
pub const MAX_PSK_IDENTITY_LEN: usize = 128;

/// A pre-shared key with its identity and the hint a server advertises.
pub struct PskEntry {
    key: Zeroizing<Vec<u8>>,
    identity: Vec<u8>,
    hint: Vec<u8>,
}

impl PskEntry {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    pub fn hint(&self) -> &[u8] {
        &self.hint
    }
}

impl fmt::Debug for PskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskEntry")
            .field("key_len", &self.key.len())
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .field("hint", &String::from_utf8_lossy(&self.hint))
            .finish()
    }
}

/// Pre-shared keys of one session. Keys are zeroized when dropped.
#[derive(Debug, Default)]
pub struct PskStore {
    entries: Vec<PskEntry>,
}

impl PskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &[u8], identity: &[u8], hint: &[u8]) -> Result<(), Error> {
        if self.entries.len() >= MAX_PSK_ENTRIES
            || key.len() > MAX_PSK_LEN
            || identity.len() > MAX_PSK_IDENTITY_LEN
            || hint.len() > MAX_PSK_IDENTITY_LEN
        {
            return Err(Error::NoMorePskSpace);
        }

        self.entries.push(PskEntry {
            key: Zeroizing::new(key.to_vec()),
            identity: identity.to_vec(),
            hint: hint.to_vec(),
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Server side lookup by the identity from ClientKeyExchange.
    pub fn find_by_identity(&self, identity: &[u8]) -> Result<&PskEntry, Error> {
        self.entries
            .iter()
            .find(|e| e.identity == identity)
            .ok_or(Error::NoMatchingPsk)
    }

    /// Client side choice for the hint the server sent, falling back to
    /// the first entry.
    pub fn for_hint(&self, hint: &[u8]) -> Result<&PskEntry, Error> {
        self.entries
            .iter()
            .find(|e| !hint.is_empty() && e.hint == hint)
            .or_else(|| self.entries.first())
            .ok_or(Error::NoMatchingPsk)
    }

    /// Hint a server advertises: the hint of its first entry.
    pub fn server_hint(&self) -> &[u8] {
        self.entries.first().map(|e| e.hint()).unwrap_or(&[])
    }

    pub fn remove(&mut self, identity: &[u8]) -> Result<(), Error> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.identity == identity)
            .ok_or(Error::NoMatchingPsk)?;
        self.entries.remove(pos);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
