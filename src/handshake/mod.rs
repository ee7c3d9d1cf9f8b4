//! Handshake engine.
//!
//! [`Engine`] owns the per-connection record plumbing: input framing,
//! record protection, handshake reassembly, the transcript and the key
//! material. [`Client`] and [`Server`] are state machines on top of it,
//! advanced one received message at a time.
//!
//! Nothing in here does I/O. Bytes go in with `handle_input` and records
//! come out of `poll_output`; [`Session`](crate::Session) moves them over a
//! [`Transport`](crate::Transport).

mod client;
mod engine;
mod server;
pub mod version;

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

pub use client::{Client, ClientState};
pub(crate) use engine::Engine;
pub use server::{Server, ServerState};

use crate::key_schedule::VERIFY_DATA_LEN;
use crate::message::Extension;
use crate::Error;

/// A hello extension as handed to the extension callbacks.
pub type HelloExtension<'a> = Extension<'a>;

/// Unix seconds.
pub type TimeCallback = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Called with the DER leaf certificate of the peer after the chain has
/// verified. An error rejects the peer.
pub type CertificateCallback = Arc<dyn Fn(&[u8]) -> Result<(), Error> + Send + Sync>;

/// Called with the extensions of the peer's hello.
pub type ExtensionCallback = Arc<dyn Fn(&[HelloExtension<'_>]) -> Result<(), Error> + Send + Sync>;

/// Called when the peer asks to renegotiate. An error refuses.
pub type RenegotiationCallback = Arc<dyn Fn() -> Result<(), Error> + Send + Sync>;

/// Application hooks of a session.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub time: Option<TimeCallback>,
    pub certificate: Option<CertificateCallback>,
    pub extensions: Option<ExtensionCallback>,
    pub renegotiation: Option<RenegotiationCallback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("time", &self.time.is_some())
            .field("certificate", &self.certificate.is_some())
            .field("extensions", &self.extensions.is_some())
            .field("renegotiation", &self.renegotiation.is_some())
            .finish()
    }
}

/// RFC 5746 secure renegotiation bookkeeping.
#[derive(Debug, Default, Clone)]
pub(crate) struct SecureRenegotiation {
    /// Both sides indicated support in the initial handshake.
    pub secure: bool,
    /// verify_data of the last Finished we sent.
    pub local_verify_data: [u8; VERIFY_DATA_LEN],
    /// verify_data of the last Finished we received.
    pub remote_verify_data: [u8; VERIFY_DATA_LEN],
    /// A handshake has completed, so the verify_data above is valid.
    pub completed: bool,
}

impl Zeroize for SecureRenegotiation {
    fn zeroize(&mut self) {
        self.secure = false;
        self.local_verify_data.zeroize();
        self.remote_verify_data.zeroize();
        self.completed = false;
    }
}
