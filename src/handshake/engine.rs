use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use zeroize::Zeroize;

use super::{Callbacks, SecureRenegotiation};
use crate::alert::{map_error_to_alert, Alert, AlertDescription, AlertLevel};
use crate::buffer::{Buf, BufferPool};
use crate::ciphersuite::CipherSuiteInfo;
use crate::config::Config;
use crate::crypto::{CryptoProvider, SecureRandom};
use crate::handshake::version::VersionPolicy;
use crate::key_schedule::{prf_for, Direction, KeyMaterial, VERIFY_DATA_LEN};
use crate::message::{parse_all, HandshakeHeader, MessageType, SessionId};
use crate::record::{RecordHeader, RecordProtection, MAX_CIPHERTEXT, MAX_PLAINTEXT};
use crate::store::{CertificateStore, PskStore};
use crate::transcript::Transcript;
use crate::types::{ContentType, ProtocolVersion};
use crate::Error;

/// Largest handshake message we reassemble.
const MAX_HANDSHAKE_LEN: usize = 65536;

/// A complete handshake message, header included.
pub(crate) struct Handshake {
    pub msg_type: MessageType,
    raw: Buf,
}

impl Handshake {
    pub fn body(&self) -> &[u8] {
        &self.raw[HandshakeHeader::LEN..]
    }
}

/// Per-connection control block shared by the client and server state
/// machines.
pub(crate) struct Engine {
    config: Arc<Config>,

    is_client: bool,

    /// Pool of buffers
    buffers_free: BufferPool,

    /// Received bytes not yet framed into records.
    incoming: Buf,

    /// Handshake bytes waiting for the rest of their message.
    handshake_rx: Buf,

    /// Decrypted application data not yet read by the caller.
    app_rx: Buf,

    /// Serialized records waiting to be sent.
    queue_tx: VecDeque<Buf>,

    /// A ChangeCipherSpec arrived and the state machine has not taken it.
    /// Records after it need the new read keys, so framing stops here.
    pending_ccs: bool,

    /// Negotiated version.
    version: Option<ProtocolVersion>,

    /// Version written into outgoing record headers.
    record_version: ProtocolVersion,

    /// The suite chosen by the current (or last) hello exchange.
    cipher_suite: Option<&'static CipherSuiteInfo>,

    pub keys: KeyMaterial,

    pub transcript: Transcript,

    write: Option<RecordProtection>,
    read: Option<RecordProtection>,

    /// Which directions switched to the shadow keys since the last promote.
    write_switched: bool,
    read_switched: bool,

    /// Application data flows once the first handshake finished, and keeps
    /// flowing during renegotiations.
    app_data_enabled: bool,

    received_alert: Option<Alert>,
    peer_closed: bool,

    pub certificates: CertificateStore,
    pub psks: PskStore,
    pub callbacks: Callbacks,
    pub version_override: Option<ProtocolVersion>,
    pub renegotiation: SecureRenegotiation,

    /// SNI: configured by a client, received by a server.
    pub server_name: Option<String>,

    pub session_id: SessionId,
}

impl Engine {
    pub fn new(config: Arc<Config>, is_client: bool) -> Self {
        let transcript = Transcript::new(config.crypto_provider());
        let record_version = if config.dtls() {
            ProtocolVersion::DTLS1_0
        } else {
            ProtocolVersion::TLS1_0
        };
        let server_name = if is_client {
            config.server_name().map(|s| s.to_string())
        } else {
            None
        };

        Engine {
            config,
            is_client,
            buffers_free: BufferPool::default(),
            incoming: Buf::new(),
            handshake_rx: Buf::new(),
            app_rx: Buf::new(),
            queue_tx: VecDeque::new(),
            pending_ccs: false,
            version: None,
            record_version,
            cipher_suite: None,
            keys: KeyMaterial::new(),
            transcript,
            write: None,
            read: None,
            write_switched: false,
            read_switched: false,
            app_data_enabled: false,
            received_alert: None,
            peer_closed: false,
            certificates: CertificateStore::new(),
            psks: PskStore::new(),
            callbacks: Callbacks::default(),
            version_override: None,
            renegotiation: SecureRenegotiation::default(),
            server_name,
            session_id: SessionId::empty(),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn provider(&self) -> &CryptoProvider {
        self.config.crypto_provider()
    }

    pub fn rng(&self) -> &'static dyn SecureRandom {
        self.config.crypto_provider().secure_random
    }

    pub fn version_policy(&self) -> VersionPolicy<'_> {
        self.config.version_policy(self.version_override)
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = Some(version);
        self.record_version = version;
    }

    pub fn cipher_suite(&self) -> Option<&'static CipherSuiteInfo> {
        self.cipher_suite
    }

    pub fn set_cipher_suite(&mut self, info: &'static CipherSuiteInfo) {
        self.cipher_suite = Some(info);
    }

    /// Negotiated version and suite, both required past the hellos.
    pub fn negotiated(&self) -> Result<(ProtocolVersion, &'static CipherSuiteInfo), Error> {
        match (self.version, self.cipher_suite) {
            (Some(v), Some(s)) => Ok((v, s)),
            _ => Err(Error::InvalidState),
        }
    }

    /// Current time from the time callback, else the system clock.
    pub fn now(&self) -> u64 {
        match &self.callbacks.time {
            Some(time) => time(),
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Time used for certificate validity: only when a callback is set.
    pub fn validity_time(&self) -> Option<u64> {
        self.callbacks.time.as_ref().map(|time| time())
    }

    pub fn received_alert(&self) -> Option<Alert> {
        self.received_alert
    }

    pub fn peer_closed(&self) -> bool {
        self.peer_closed
    }

    pub fn handle_input(&mut self, data: &[u8]) {
        self.incoming.extend_from_slice(data);
    }

    /// Frame and process one record from the input.
    ///
    /// Returns `false` when there is no complete record, or when a
    /// ChangeCipherSpec is waiting to be taken.
    fn read_record(&mut self) -> Result<bool, Error> {
        if self.pending_ccs || self.incoming.len() < RecordHeader::LEN {
            return Ok(false);
        }

        let (_, header) = RecordHeader::parse(&self.incoming)?;
        let length = header.length as usize;
        if length > MAX_CIPHERTEXT {
            return Err(Error::RecordTooLarge(length));
        }
        if self.incoming.len() < header.record_len() {
            return Ok(false);
        }

        let mut fragment = self.buffers_free.pop();
        fragment.extend_from_slice(&self.incoming[RecordHeader::LEN..header.record_len()]);
        self.incoming.drain_front(header.record_len());

        let result = self.process_record(header, &mut fragment);
        self.buffers_free.push(fragment);

        result.map(|_| true)
    }

    fn check_record_version(&self, version: ProtocolVersion) -> Result<(), Error> {
        if let Some(negotiated) = self.version {
            if version != negotiated {
                return Err(Error::ProtocolVersionChanged);
            }
            return Ok(());
        }

        let major = (version.as_u16() >> 8) as u8;
        let expected = if self.config.dtls() { 0xFE } else { 0x03 };
        if major != expected {
            return Err(Error::UnknownTlsVersion);
        }
        Ok(())
    }

    fn process_record(&mut self, header: RecordHeader, fragment: &mut Buf) -> Result<(), Error> {
        self.check_record_version(header.version)?;

        if let Some(read) = self.read.as_mut() {
            read.unprotect(header.content_type, header.version, fragment)?;
        }

        if fragment.len() > MAX_PLAINTEXT {
            return Err(Error::RecordTooLarge(fragment.len()));
        }

        trace!(
            "Received {:?} record ({} bytes)",
            header.content_type,
            fragment.len()
        );

        match header.content_type {
            ContentType::Handshake => {
                if self.handshake_rx.len() + fragment.len() > MAX_HANDSHAKE_LEN + HandshakeHeader::LEN {
                    return Err(Error::BufferTooSmall);
                }
                self.handshake_rx.extend_from_slice(fragment);
            }

            ContentType::ChangeCipherSpec => {
                if fragment[..] != [1] {
                    return Err(Error::BadCipherSpec);
                }
                // A handshake message may not straddle a ChangeCipherSpec.
                if !self.handshake_rx.is_empty() {
                    return Err(Error::UnexpectedMessage);
                }
                self.pending_ccs = true;
            }

            ContentType::Alert => {
                let alert = parse_all(&fragment[..], Alert::parse)?;
                self.received_alert = Some(alert);

                if alert.description == AlertDescription::CloseNotify {
                    debug!("Received close_notify");
                    self.peer_closed = true;
                    return Err(Error::ConnectionClosed);
                }

                warn!("Received alert: {:?} {:?}", alert.level, alert.description);
                if alert.level == AlertLevel::Warning
                    && alert.description == AlertDescription::NoRenegotiation
                {
                    return Err(Error::NoRenegotiation);
                }
                return Err(Error::AlertReceived(alert.level, alert.description));
            }

            ContentType::ApplicationData => {
                if !self.app_data_enabled {
                    return Err(Error::UnexpectedMessage);
                }
                self.app_rx.extend_from_slice(fragment);
            }

            ContentType::Unknown(_) => return Err(Error::UnexpectedMessage),
        }

        Ok(())
    }

    /// Split a complete message off the reassembly buffer.
    fn take_handshake(&mut self) -> Result<Option<Handshake>, Error> {
        if self.handshake_rx.len() < HandshakeHeader::LEN {
            return Ok(None);
        }

        let (_, header) = HandshakeHeader::parse(&self.handshake_rx)?;
        let length = header.length as usize;
        if length > MAX_HANDSHAKE_LEN {
            return Err(Error::BufferTooSmall);
        }

        let total = HandshakeHeader::LEN + length;
        if self.handshake_rx.len() < total {
            return Ok(None);
        }

        let msg_type = header
            .message_type()
            .ok_or(Error::UnrecognizedMessageType(header.msg_type))?;

        let mut raw = self.buffers_free.pop();
        raw.extend_from_slice(&self.handshake_rx[..total]);
        self.handshake_rx.drain_front(total);

        debug!("Received {:?} ({} bytes)", msg_type, length);

        Ok(Some(Handshake { msg_type, raw }))
    }

    /// The next complete handshake message, reading records as needed.
    ///
    /// Application data and alerts met on the way are handled. A
    /// ChangeCipherSpec is [`Error::UnexpectedMessage`] here.
    pub fn next_handshake(&mut self) -> Result<Option<Handshake>, Error> {
        loop {
            if let Some(handshake) = self.take_handshake()? {
                return Ok(Some(handshake));
            }
            if self.pending_ccs {
                return Err(Error::UnexpectedMessage);
            }
            if !self.read_record()? {
                return Ok(None);
            }
        }
    }

    /// Take a received ChangeCipherSpec. Any handshake data arriving first
    /// is [`Error::UnexpectedMessage`].
    pub fn take_change_cipher_spec(&mut self) -> Result<bool, Error> {
        loop {
            if self.pending_ccs {
                self.pending_ccs = false;
                return Ok(true);
            }
            if !self.handshake_rx.is_empty() {
                return Err(Error::UnexpectedMessage);
            }
            if !self.read_record()? {
                return Ok(false);
            }
        }
    }

    /// Add a received message to the transcript.
    pub fn hash_handshake(&mut self, handshake: &Handshake) {
        self.transcript.update(&handshake.raw);
    }

    /// Hand a message buffer back to the pool.
    pub fn recycle(&mut self, handshake: Handshake) {
        self.buffers_free.push(handshake.raw);
    }

    /// Create records of `content_type` from what `f` writes.
    ///
    /// Data longer than the configured record size is split.
    pub fn create_record<F>(&mut self, content_type: ContentType, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Buf),
    {
        let mut plaintext = self.buffers_free.pop();
        f(&mut plaintext);
        let result = self.write_records(content_type, &plaintext);
        self.buffers_free.push(plaintext);
        result
    }

    fn write_records(&mut self, content_type: ContentType, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return self.write_record(content_type, &[]);
        }
        let max = self.config.max_record_size();
        for chunk in data.chunks(max) {
            self.write_record(content_type, chunk)?;
        }
        Ok(())
    }

    fn write_record(&mut self, content_type: ContentType, chunk: &[u8]) -> Result<(), Error> {
        let rng = self.rng();

        let mut fragment = self.buffers_free.pop();
        fragment.extend_from_slice(chunk);

        if let Some(write) = self.write.as_mut() {
            if let Err(e) = write.protect(content_type, self.record_version, &mut fragment, rng) {
                self.buffers_free.push(fragment);
                return Err(e);
            }
        }

        let header = RecordHeader {
            content_type,
            version: self.record_version,
            length: fragment.len() as u16,
        };

        let mut record = self.buffers_free.pop();
        header.serialize(&mut record);
        record.extend_from_slice(&fragment);
        self.buffers_free.push(fragment);

        trace!(
            "Queued {:?} record ({} bytes on the wire)",
            content_type,
            record.len()
        );
        self.queue_tx.push_back(record);

        Ok(())
    }

    /// Create a handshake message and wrap it in records.
    ///
    /// The message joins the transcript, except HelloRequest and
    /// HelloVerifyRequest which never do.
    pub fn create_handshake<F>(&mut self, msg_type: MessageType, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Buf, &mut Self) -> Result<(), Error>,
    {
        let mut body = self.buffers_free.pop();

        if let Err(e) = f(&mut body, self) {
            self.buffers_free.push(body);
            return Err(e);
        }

        let mut message = self.buffers_free.pop();
        HandshakeHeader::new(msg_type, body.len()).serialize(&mut message);
        message.extend_from_slice(&body);
        self.buffers_free.push(body);

        if !matches!(
            msg_type,
            MessageType::HelloRequest | MessageType::HelloVerifyRequest
        ) {
            self.transcript.update(&message);
        }

        debug!(
            "Send {:?} ({} bytes)",
            msg_type,
            message.len() - HandshakeHeader::LEN
        );

        let result = self.write_records(ContentType::Handshake, &message);
        self.buffers_free.push(message);
        result
    }

    fn own_direction(&self) -> Direction {
        if self.is_client {
            Direction::ClientWrite
        } else {
            Direction::ServerWrite
        }
    }

    fn peer_direction(&self) -> Direction {
        if self.is_client {
            Direction::ServerWrite
        } else {
            Direction::ClientWrite
        }
    }

    /// Send ChangeCipherSpec and protect everything after it with the
    /// freshly derived keys.
    pub fn send_change_cipher_spec(&mut self) -> Result<(), Error> {
        let info = self.cipher_suite.ok_or(Error::InvalidState)?;

        self.create_record(ContentType::ChangeCipherSpec, |body| body.push(1))?;

        let keys = self.keys.pending_keys(self.own_direction())?;
        self.write = Some(RecordProtection::new(info, &keys)?);
        self.write_switched = true;
        debug!("Write protection active: {}", info.suite);

        self.promote_if_done();
        Ok(())
    }

    /// The peer's ChangeCipherSpec was taken: switch read keys.
    pub fn enable_peer_encryption(&mut self) -> Result<(), Error> {
        let info = self.cipher_suite.ok_or(Error::InvalidState)?;

        let keys = self.keys.pending_keys(self.peer_direction())?;
        self.read = Some(RecordProtection::new(info, &keys)?);
        self.read_switched = true;
        debug!("Read protection active: {}", info.suite);

        self.promote_if_done();
        Ok(())
    }

    fn promote_if_done(&mut self) {
        if self.write_switched && self.read_switched {
            self.keys.promote();
            self.write_switched = false;
            self.read_switched = false;
        }
    }

    /// verify_data for a Finished with `label` over the transcript so far.
    pub fn verify_data(&mut self, label: &str) -> Result<[u8; VERIFY_DATA_LEN], Error> {
        let (version, info) = self.negotiated()?;
        let prf = prf_for(version, info, self.config.crypto_provider());
        self.transcript
            .verify_data(version, prf, &mut self.keys, label)
    }

    /// Master secret and key block from the pre-master now in place.
    pub fn derive_keys(&mut self) -> Result<(), Error> {
        let (version, info) = self.negotiated()?;
        let prf = prf_for(version, info, self.config.crypto_provider());
        self.keys.generate_master_secret(prf)?;
        self.keys.generate_key_material(info, prf)?;
        trace!("Derived {} bytes of key material", info.key_block_len());
        Ok(())
    }

    pub fn enable_application_data(&mut self) {
        self.app_data_enabled = true;
    }

    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if !self.app_data_enabled || self.write.is_none() {
            return Err(Error::InvalidState);
        }
        self.create_record(ContentType::ApplicationData, |body| {
            body.extend_from_slice(data);
        })
    }

    /// Copy out buffered application data.
    pub fn read_application_data(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.app_rx.len());
        out[..n].copy_from_slice(&self.app_rx[..n]);
        self.app_rx.drain_front(n);
        n
    }

    pub fn send_alert(&mut self, alert: Alert) -> Result<(), Error> {
        self.create_record(ContentType::Alert, |body| alert.serialize(body))
    }

    /// Tell the peer about a failure with the alert `error` maps to.
    ///
    /// Returns `true` if an alert went out. Failures reported by the peer or
    /// the transport get no alert back.
    pub fn fail(&mut self, error: &Error) -> bool {
        if matches!(
            error,
            Error::AlertReceived(..) | Error::ConnectionClosed | Error::Transport(_)
        ) {
            return false;
        }
        let alert = map_error_to_alert(error);
        warn!(
            "Sending alert {:?} {:?} for: {}",
            alert.level, alert.description, error
        );
        self.send_alert(alert).is_ok()
    }

    pub fn poll_output(&mut self) -> Option<Buf> {
        self.queue_tx.pop_front()
    }

    pub fn push_buffer(&mut self, buf: Buf) {
        self.buffers_free.push(buf);
    }

    /// Start a new handshake on this connection.
    pub fn begin_handshake(&mut self) {
        self.transcript.reset(self.config.crypto_provider());
        self.handshake_rx.clear();
    }

    /// Wipe secrets and connection state. Credentials, callbacks and the
    /// version override survive.
    pub fn reset(&mut self) {
        self.keys.zeroize();
        self.transcript.reset(self.config.crypto_provider());
        self.write = None;
        self.read = None;
        self.write_switched = false;
        self.read_switched = false;
        self.incoming.zeroize();
        self.handshake_rx.zeroize();
        self.app_rx.zeroize();
        for mut record in self.queue_tx.drain(..) {
            record.zeroize();
        }
        self.pending_ccs = false;
        self.version = None;
        self.record_version = if self.config.dtls() {
            ProtocolVersion::DTLS1_0
        } else {
            ProtocolVersion::TLS1_0
        };
        self.cipher_suite = None;
        self.app_data_enabled = false;
        self.received_alert = None;
        self.peer_closed = false;
        self.renegotiation.zeroize();
        self.certificates.clear_remote();
        if !self.is_client {
            self.server_name = None;
        }
        self.session_id = SessionId::empty();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.renegotiation.zeroize();
        self.incoming.zeroize();
        self.handshake_rx.zeroize();
        self.app_rx.zeroize();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn engine(is_client: bool) -> Engine {
        Engine::new(Arc::new(Config::default()), is_client)
    }

    fn record(content_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![content_type, 0x03, 0x03];
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn reassembles_across_records() {
        let mut e = engine(false);
        // ServerHelloDone split over two records, then a HelloRequest
        e.handle_input(&record(22, &[0x0E, 0x00]));
        assert!(e.next_handshake().unwrap().is_none());
        e.handle_input(&record(22, &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]));

        let first = e.next_handshake().unwrap().unwrap();
        assert_eq!(first.msg_type, MessageType::ServerHelloDone);
        assert!(first.body().is_empty());

        let second = e.next_handshake().unwrap().unwrap();
        assert_eq!(second.msg_type, MessageType::HelloRequest);
        assert!(e.next_handshake().unwrap().is_none());
    }

    #[test]
    fn unknown_message_type() {
        let mut e = engine(false);
        e.handle_input(&record(22, &[0x63, 0x00, 0x00, 0x00]));
        assert!(matches!(
            e.next_handshake(),
            Err(Error::UnrecognizedMessageType(0x63))
        ));
    }

    #[test]
    fn ccs_where_handshake_expected() {
        let mut e = engine(true);
        e.handle_input(&record(20, &[1]));
        assert!(matches!(e.next_handshake(), Err(Error::UnexpectedMessage)));
    }

    #[test]
    fn bad_ccs_body() {
        let mut e = engine(true);
        e.handle_input(&record(20, &[2]));
        assert!(matches!(
            e.take_change_cipher_spec(),
            Err(Error::BadCipherSpec)
        ));
    }

    #[test]
    fn handshake_where_ccs_expected() {
        let mut e = engine(true);
        e.handle_input(&record(22, &[0x14, 0x00, 0x00, 0x00]));
        assert!(matches!(
            e.take_change_cipher_spec(),
            Err(Error::UnexpectedMessage)
        ));
    }

    #[test]
    fn application_data_before_handshake() {
        let mut e = engine(true);
        e.handle_input(&record(23, b"hello"));
        assert!(matches!(e.next_handshake(), Err(Error::UnexpectedMessage)));
    }

    #[test]
    fn alerts() {
        let mut e = engine(true);
        e.handle_input(&record(21, &[1, 100]));
        assert!(matches!(e.next_handshake(), Err(Error::NoRenegotiation)));

        e.handle_input(&record(21, &[2, 40]));
        assert!(matches!(
            e.next_handshake(),
            Err(Error::AlertReceived(
                AlertLevel::Fatal,
                AlertDescription::HandshakeFailure
            ))
        ));
        assert_eq!(
            e.received_alert(),
            Some(Alert::new(AlertLevel::Fatal, AlertDescription::HandshakeFailure))
        );

        e.handle_input(&record(21, &[1, 0]));
        assert!(matches!(e.next_handshake(), Err(Error::ConnectionClosed)));
        assert!(e.peer_closed());
    }

    #[test]
    fn oversized_record() {
        let mut e = engine(true);
        let len = (MAX_CIPHERTEXT + 1) as u16;
        e.handle_input(&[22, 0x03, 0x03, (len >> 8) as u8, len as u8]);
        assert!(matches!(e.next_handshake(), Err(Error::RecordTooLarge(_))));
    }

    #[test]
    fn record_version_must_be_tls() {
        let mut e = engine(true);
        e.handle_input(&[22, 0x07, 0x01, 0x00, 0x00]);
        assert!(matches!(e.next_handshake(), Err(Error::UnknownTlsVersion)));
    }

    #[test]
    fn negotiated_version_is_pinned() {
        let mut e = engine(true);
        e.set_version(ProtocolVersion::TLS1_2);
        e.handle_input(&[22, 0x03, 0x01, 0x00, 0x00]);
        assert!(matches!(
            e.next_handshake(),
            Err(Error::ProtocolVersionChanged)
        ));
    }

    #[test]
    fn outgoing_handshake_is_hashed_and_split() {
        let config = Config::builder().max_record_size(512).build().unwrap();
        let mut e = Engine::new(Arc::new(config), false);
        e.set_version(ProtocolVersion::TLS1_2);

        e.create_handshake(MessageType::Certificate, |body, _| {
            body.resize(1000, 0xAB);
            Ok(())
        })
        .unwrap();
        assert_eq!(e.transcript.len(), 1004);

        let first = e.poll_output().unwrap();
        assert_eq!(&first[..5], &[22, 0x03, 0x03, 0x02, 0x00]);
        let second = e.poll_output().unwrap();
        assert_eq!(second.len(), 5 + 1004 - 512);
        assert!(e.poll_output().is_none());

        e.create_handshake(MessageType::HelloRequest, |_, _| Ok(()))
            .unwrap();
        assert_eq!(e.transcript.len(), 1004);
    }
}
