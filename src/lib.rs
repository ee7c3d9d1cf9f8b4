//! emtls is a TLS 1.0, 1.1 and 1.2 engine for small devices.
//!
//! The handshake engine is sans-IO: a [`Client`] or [`Server`] takes
//! received bytes with `handle_input` and hands out records with
//! `poll_output`. [`Session`] drives one of them over a blocking
//! [`Transport`], which is what most applications want.
//!
//! ```no_run
//! use std::net::TcpStream;
//! use std::sync::Arc;
//! use emtls::{Config, Role, Session, WaitOption};
//!
//! let config = Arc::new(Config::builder().server_name("device.local").build()?);
//! let mut session = Session::new(Role::Client, config);
//! session.add_certificate(
//!     emtls::store::CertificateLocation::Trusted,
//!     include_bytes!("../tests/fixtures/ca_rsa.der"),
//!     None,
//! )?;
//!
//! let stream = TcpStream::connect("device.local:443")?;
//! session.start(stream, WaitOption::Forever)?;
//! session.send(b"hello", WaitOption::Forever)?;
//!
//! let mut buf = [0u8; 1024];
//! let n = session.receive(&mut buf, WaitOption::Forever)?;
//! session.end(WaitOption::Forever)?;
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! Cryptography comes from a [`CryptoProvider`](crypto::CryptoProvider).
//! The bundled [`rust_crypto`](crypto::rust_crypto) backend is used unless
//! the configuration names another one.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

mod alert;
mod buffer;
pub mod certificate;
pub mod ciphersuite;
mod config;
pub mod crypto;
mod error;
pub mod handshake;
mod key_schedule;
pub mod message;
mod record;
pub mod registry;
mod session;
mod signature;
pub mod store;
mod transcript;
pub mod types;
mod util;

pub use alert::{map_error_to_alert, Alert, AlertDescription, AlertLevel};
pub use buffer::Buf;
pub use ciphersuite::CipherSuite;
pub use config::{Config, ConfigBuilder};
pub use error::{Error, ErrorClass};
pub use handshake::{Callbacks, Client, ClientState, HelloExtension, Server, ServerState};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{Role, Session, SessionState, Transport, WaitOption};
pub use types::ProtocolVersion;
