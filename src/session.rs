//! Blocking sessions over a byte transport.
//!
//! A [`Session`] wraps a [`Client`] or [`Server`] state machine and moves its
//! records over a [`Transport`]. Every call runs on the caller's thread and
//! blocks as the [`WaitOption`] allows.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use zeroize::Zeroize;

use crate::alert::Alert;
use crate::buffer::Buf;
use crate::ciphersuite::CipherSuite;
use crate::config::Config;
use crate::handshake::version::capability_table;
use crate::handshake::{Client, ClientState, Engine, HelloExtension, Server, ServerState};
use crate::record::{RecordHeader, MAX_CIPHERTEXT};
use crate::store::{CertificateKey, CertificateLocation, CertificateStore, PskStore};
use crate::store::StoredCertificate;
use crate::types::ProtocolVersion;
use crate::Error;

/// Which side of the handshake a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// How long a transport call may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOption {
    /// Return at once. A transport with nothing to give fails with
    /// `io::ErrorKind::WouldBlock`.
    NoWait,
    Forever,
    Timeout(Duration),
}

/// The byte stream a session runs over.
pub trait Transport {
    /// Send all of `data`.
    fn send(&mut self, data: &[u8], wait: WaitOption) -> io::Result<()>;

    /// Receive into `buf`. `Ok(0)` means the peer closed the stream.
    fn receive(&mut self, buf: &mut [u8], wait: WaitOption) -> io::Result<usize>;
}

impl Transport for TcpStream {
    fn send(&mut self, data: &[u8], wait: WaitOption) -> io::Result<()> {
        self.set_nonblocking(wait == WaitOption::NoWait)?;
        self.set_write_timeout(match wait {
            WaitOption::Timeout(d) => Some(d),
            _ => None,
        })?;
        self.write_all(data)
    }

    fn receive(&mut self, buf: &mut [u8], wait: WaitOption) -> io::Result<usize> {
        self.set_nonblocking(wait == WaitOption::NoWait)?;
        self.set_read_timeout(match wait {
            WaitOption::Timeout(d) => Some(d),
            _ => None,
        })?;
        self.read(buf)
    }
}

/// Handshake state of either role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Client(ClientState),
    Server(ServerState),
}

impl SessionState {
    pub fn is_handshake_finished(&self) -> bool {
        matches!(
            self,
            SessionState::Client(ClientState::HandshakeFinished)
                | SessionState::Server(ServerState::HandshakeFinished)
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            SessionState::Client(ClientState::Error | ClientState::AlertSent)
                | SessionState::Server(ServerState::Error | ServerState::AlertSent)
        )
    }

    fn is_idle(&self) -> bool {
        matches!(
            self,
            SessionState::Client(ClientState::Idle) | SessionState::Server(ServerState::Idle)
        )
    }
}

enum Machine {
    Client(Client),
    Server(Server),
}

impl Machine {
    fn engine(&self) -> &Engine {
        match self {
            Machine::Client(c) => c.engine(),
            Machine::Server(s) => s.engine(),
        }
    }

    fn engine_mut(&mut self) -> &mut Engine {
        match self {
            Machine::Client(c) => c.engine_mut(),
            Machine::Server(s) => s.engine_mut(),
        }
    }

    fn state(&self) -> SessionState {
        match self {
            Machine::Client(c) => SessionState::Client(c.state()),
            Machine::Server(s) => SessionState::Server(s.state()),
        }
    }

    fn handle_input(&mut self, data: &[u8]) -> Result<(), Error> {
        match self {
            Machine::Client(c) => c.handle_input(data),
            Machine::Server(s) => s.handle_input(data),
        }
    }

    fn poll_output(&mut self) -> Option<Buf> {
        match self {
            Machine::Client(c) => c.poll_output(),
            Machine::Server(s) => s.poll_output(),
        }
    }

    fn renegotiate(&mut self) -> Result<(), Error> {
        match self {
            Machine::Client(c) => c.renegotiate(),
            Machine::Server(s) => s.renegotiate(),
        }
    }

    fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        match self {
            Machine::Client(c) => c.send_application_data(data),
            Machine::Server(s) => s.send_application_data(data),
        }
    }

    fn read_application_data(&mut self, out: &mut [u8]) -> usize {
        match self {
            Machine::Client(c) => c.read_application_data(out),
            Machine::Server(s) => s.read_application_data(out),
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        match self {
            Machine::Client(c) => c.close(),
            Machine::Server(s) => s.close(),
        }
    }

    fn abort(&mut self, error: Error) -> Error {
        match self {
            Machine::Client(c) => c.abort(error),
            Machine::Server(s) => s.abort(error),
        }
    }

    fn reset(&mut self) {
        match self {
            Machine::Client(c) => c.reset(),
            Machine::Server(s) => s.reset(),
        }
    }
}

/// One TLS connection.
///
/// Credentials and callbacks are set up before [`Session::start`] and
/// survive [`Session::reset`]. Dropping a session wipes its secrets.
pub struct Session {
    role: Role,
    machine: Machine,
    transport: Option<Box<dyn Transport + Send>>,
    rx_buf: Vec<u8>,
}

impl Session {
    pub fn new(role: Role, config: Arc<Config>) -> Session {
        let machine = match role {
            Role::Client => Machine::Client(Client::new(config)),
            Role::Server => Machine::Server(Server::new(config)),
        };
        Session {
            role,
            machine,
            transport: None,
            rx_buf: vec![0; RecordHeader::LEN + MAX_CIPHERTEXT],
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn config(&self) -> &Arc<Config> {
        self.machine.engine().config()
    }

    /// The negotiated version, once the peer's hello was accepted.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.machine.engine().version()
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.machine.engine().cipher_suite().map(|i| i.suite)
    }

    /// The last alert the peer sent.
    pub fn received_alert(&self) -> Option<Alert> {
        self.machine.engine().received_alert()
    }

    /// Whether both sides indicated RFC 5746 support.
    pub fn secure_renegotiation(&self) -> bool {
        self.machine.engine().renegotiation.secure
    }

    /// Server: the name the client asked for. Client: the configured name.
    pub fn server_name(&self) -> Option<&str> {
        self.machine.engine().server_name.as_deref()
    }

    pub fn session_id(&self) -> &[u8] {
        &self.machine.engine().session_id
    }

    /// Run the handshake over `transport`.
    ///
    /// Returns when the handshake finished or failed. A failure has already
    /// been reported to the peer with an alert where one applies.
    pub fn start<T>(&mut self, transport: T, wait: WaitOption) -> Result<(), Error>
    where
        T: Transport + Send + 'static,
    {
        if !self.state().is_idle() {
            return Err(Error::InvalidState);
        }
        self.transport = Some(Box::new(transport));

        debug!("Starting {:?} session", self.role);
        if let Machine::Client(client) = &mut self.machine {
            client.start()?;
        }
        self.drive_handshake(wait)
    }

    /// Send application data.
    pub fn send(&mut self, data: &[u8], wait: WaitOption) -> Result<(), Error> {
        self.machine.send_application_data(data)?;
        self.flush(wait)
    }

    /// Receive application data into `buf`, returning the length.
    ///
    /// Handshake traffic arriving meanwhile, such as a renegotiation by the
    /// peer, is handled on the way. A close_notify from the peer ends with
    /// [`Error::ConnectionClosed`] once buffered data is consumed.
    pub fn receive(&mut self, buf: &mut [u8], wait: WaitOption) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let n = self.machine.read_application_data(buf);
            if n > 0 {
                return Ok(n);
            }
            if self.machine.engine().peer_closed() {
                return Err(Error::ConnectionClosed);
            }
            if self.state().is_failed() {
                return Err(Error::InvalidState);
            }

            self.flush(wait)?;
            match self.read_transport(wait) {
                // Data that came in ahead of close_notify is returned first.
                Err(Error::ConnectionClosed) if self.machine.engine().peer_closed() => {}
                r => r?,
            }
        }
    }

    /// Renegotiate an established connection and wait for it to complete.
    pub fn renegotiate(&mut self, wait: WaitOption) -> Result<(), Error> {
        if self.transport.is_none() {
            return Err(Error::RenegotiationSessionInactive);
        }
        self.machine.renegotiate()?;
        self.drive_handshake(wait)
    }

    /// Send close_notify and let go of the transport.
    pub fn end(&mut self, wait: WaitOption) -> Result<(), Error> {
        debug!("Ending {:?} session", self.role);
        self.machine.close()?;
        let result = self.flush(wait);
        self.transport = None;
        result
    }

    /// Wipe connection state so the session can be started again.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.transport = None;
        self.rx_buf.zeroize();
    }

    pub fn certificates(&self) -> &CertificateStore {
        &self.machine.engine().certificates
    }

    pub fn certificates_mut(&mut self) -> &mut CertificateStore {
        &mut self.machine.engine_mut().certificates
    }

    /// Add our own certificate with its DER private key.
    pub fn add_local_certificate(
        &mut self,
        der: &[u8],
        key_der: &[u8],
        id: Option<u32>,
    ) -> Result<(), Error> {
        let provider = self.config().crypto_provider();
        let cert = StoredCertificate::parse(der, provider)?.with_private_key(key_der, provider)?;
        self.certificates_mut()
            .add(CertificateLocation::Local, Arc::new(cert), id)
    }

    /// Add a certificate to the local (intermediates) or trusted list.
    pub fn add_certificate(
        &mut self,
        location: CertificateLocation,
        der: &[u8],
        id: Option<u32>,
    ) -> Result<(), Error> {
        let cert = StoredCertificate::parse(der, self.config().crypto_provider())?;
        self.certificates_mut().add(location, Arc::new(cert), id)
    }

    pub fn find_certificate(
        &self,
        key: CertificateKey,
    ) -> Option<(&Arc<StoredCertificate>, CertificateLocation)> {
        self.certificates().find(key)
    }

    pub fn remove_certificate(
        &mut self,
        location: CertificateLocation,
        key: CertificateKey,
    ) -> Result<Arc<StoredCertificate>, Error> {
        self.certificates_mut().remove(location, key)
    }

    pub fn psks(&self) -> &PskStore {
        &self.machine.engine().psks
    }

    pub fn psks_mut(&mut self) -> &mut PskStore {
        &mut self.machine.engine_mut().psks
    }

    pub fn add_psk(&mut self, key: &[u8], identity: &[u8], hint: &[u8]) -> Result<(), Error> {
        self.psks_mut().add(key, identity, hint)
    }

    /// Pin the protocol version for the next handshake.
    pub fn set_version_override(&mut self, version: ProtocolVersion) -> Result<(), Error> {
        if !self.state().is_idle() {
            return Err(Error::InvalidState);
        }
        let known = capability_table(self.config().dtls())
            .iter()
            .any(|c| c.version == version);
        if !known {
            return Err(Error::UnknownTlsVersion);
        }
        self.machine.engine_mut().version_override = Some(version);
        Ok(())
    }

    pub fn clear_version_override(&mut self) {
        self.machine.engine_mut().version_override = None;
    }

    /// Clock for certificate validity and hello randoms, in unix seconds.
    pub fn set_time_callback<F>(&mut self, f: F)
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.machine.engine_mut().callbacks.time = Some(Arc::new(f));
    }

    /// Veto the peer's leaf certificate after its chain verified.
    pub fn set_certificate_callback<F>(&mut self, f: F)
    where
        F: Fn(&[u8]) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.machine.engine_mut().callbacks.certificate = Some(Arc::new(f));
    }

    /// Inspect the extensions of the peer's hello.
    pub fn set_extension_callback<F>(&mut self, f: F)
    where
        F: Fn(&[HelloExtension<'_>]) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.machine.engine_mut().callbacks.extensions = Some(Arc::new(f));
    }

    /// Accept or refuse a renegotiation the peer asks for.
    pub fn set_renegotiation_callback<F>(&mut self, f: F)
    where
        F: Fn() -> Result<(), Error> + Send + Sync + 'static,
    {
        self.machine.engine_mut().callbacks.renegotiation = Some(Arc::new(f));
    }

    /// Exchange records until the handshake in progress finishes.
    fn drive_handshake(&mut self, wait: WaitOption) -> Result<(), Error> {
        loop {
            self.flush(wait)?;

            let state = self.state();
            if state.is_handshake_finished() {
                debug!(
                    "Handshake done: {:?} {:?}",
                    self.protocol_version(),
                    self.cipher_suite()
                );
                return Ok(());
            }
            if state.is_failed() {
                return Err(Error::InvalidState);
            }

            self.read_transport(wait)?;
        }
    }

    /// Read once from the transport and feed the machine. Records the
    /// machine queues in response are flushed even when it fails.
    fn read_transport(&mut self, wait: WaitOption) -> Result<(), Error> {
        let transport = self.transport.as_mut().ok_or(Error::InvalidState)?;

        let n = match transport.receive(&mut self.rx_buf, wait) {
            Ok(0) => return Err(self.machine.abort(Error::ConnectionClosed)),
            Ok(n) => n,
            // Only a caller polling with NoWait may come back later.
            Err(e) if wait == WaitOption::NoWait && e.kind() == io::ErrorKind::WouldBlock => {
                return Err(Error::Transport(e))
            }
            Err(e) => {
                debug!("Transport receive failed: {}", e);
                return Err(self.machine.abort(Error::Transport(e)));
            }
        };
        trace!("Received {} bytes", n);

        let result = self.machine.handle_input(&self.rx_buf[..n]);
        self.rx_buf[..n].zeroize();
        if let Err(e) = result {
            // Best effort: the alert describing the failure.
            if let Err(flush) = self.flush(wait) {
                debug!("Failed to send alert for {}: {}", e, flush);
            }
            return Err(e);
        }
        Ok(())
    }

    fn flush(&mut self, wait: WaitOption) -> Result<(), Error> {
        let transport = self.transport.as_mut().ok_or(Error::InvalidState)?;

        while let Some(record) = self.machine.poll_output() {
            trace!("Sending record of {} bytes", record.len());
            let result = transport.send(&record, wait);
            self.machine.engine_mut().push_buffer(record);
            if let Err(e) = result {
                return Err(self.machine.abort(Error::Transport(e)));
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.rx_buf.zeroize();
    }
}
