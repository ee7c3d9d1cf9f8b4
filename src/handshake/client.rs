// TLS 1.0-1.2 Client Handshake Flow (RFC 5246 section 7.3):
//
// 1. Client sends ClientHello with renegotiation_info (empty on the first
//    handshake) and, when ECC suites are offered, supported_groups and
//    ec_point_formats.
// 2. DTLS only: server may answer HelloVerifyRequest. The client resends the
//    ClientHello, same random, with the cookie.
// 3. Server sends ServerHello. Version, suite and compression are checked and
//    the RFC 5746 indication is validated.
// 4. Server sends Certificate, unless the suite is PSK.
// 5. Server sends ServerKeyExchange: signed ECDHE params, or an optional PSK
//    identity hint.
// 6. Server may send CertificateRequest.
// 7. Server sends ServerHelloDone. The client answers with its whole flight:
//    [Certificate] ClientKeyExchange [CertificateVerify] ChangeCipherSpec Finished
// 8. Server sends ChangeCipherSpec and Finished. Application data flows.
//
// A HelloRequest after the handshake, or `renegotiate()`, restarts at 1 over
// the protected connection.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tinyvec::ArrayVec;
use zeroize::Zeroize;

use super::engine::{Engine, Handshake};
use crate::alert::{Alert, AlertDescription, AlertLevel};
use crate::buffer::Buf;
use crate::ciphersuite::{CipherSuite, CipherSuiteInfo, KeyExchange};
use crate::config::Config;
use crate::crypto::{CurveMethod, PublicKey};
use crate::message::extensions::signature_algorithms::SignatureAlgorithms;
use crate::message::extensions::{
    ECPointFormatsExtension, RenegotiationInfoExtension, ServerNameExtension,
    SignatureAlgorithmsExtension, SupportedGroupsExtension,
};
use crate::message::{
    parse_all, Certificate, CertificateRequest, CertificateVerify, CipherSuites, ClientHello,
    ClientKeyExchange, Cookie, DigitallySigned, Extension, ExtensionType, Finished,
    HelloVerifyRequest, MessageType, Random, ServerHello, ServerKeyExchange,
    ServerKeyExchangeParams, SessionId, MAX_CHAIN_LEN, NAMED_CURVE,
};
use crate::signature::{self, choose_signature_algorithm, SignedHash};
use crate::store::StoredCertificate;
use crate::transcript::{CLIENT_FINISHED, SERVER_FINISHED};
use crate::types::{
    ClientCertificateType, CompressionMethod, ProtocolVersion, SignatureAlgorithm,
};
use crate::Error;

/// Client handshake state. Each state names the last milestone reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Nothing received yet. ClientHello may have been sent.
    Idle,
    /// Failed without telling the peer.
    Error,
    /// Failed and a fatal alert went out.
    AlertSent,
    /// The server asked to renegotiate and a new ClientHello went out.
    HelloRequest,
    /// DTLS: a HelloVerifyRequest was answered.
    HelloVerify,
    ServerHello,
    ServerCertificate,
    ServerKeyExchange,
    CertificateRequest,
    /// ServerHelloDone received and our flight sent. Waiting for the
    /// server's ChangeCipherSpec and Finished.
    ServerHelloDone,
    HandshakeFinished,
    /// We asked to renegotiate and a new ClientHello went out.
    Renegotiating,
}

/// TLS client
pub struct Client {
    /// Current client state.
    state: ClientState,

    /// Engine in common between server and client.
    engine: Engine,

    /// A ClientHello went out for the current handshake.
    hello_sent: bool,

    /// The version in our ClientHello. The RSA pre-master carries it.
    offered_version: Option<ProtocolVersion>,

    /// Random unique data. Used for ClientHello, and kept for a DTLS retry.
    random: Option<Random>,

    /// DTLS cookie from HelloVerifyRequest.
    cookie: Option<Cookie>,

    /// Curve and public point from ServerKeyExchange.
    server_ecdh: Option<(&'static dyn CurveMethod, Buf)>,

    /// PSK identity hint from ServerKeyExchange.
    psk_hint: Buf,

    /// Contents of CertificateRequest, if one was received.
    certificate_requested: bool,
    peer_certificate_types: ArrayVec<[ClientCertificateType; 8]>,
    peer_signature_algorithms: SignatureAlgorithms,

    /// The server's ChangeCipherSpec was taken and read keys switched.
    peer_ccs: bool,
}

impl Client {
    pub fn new(config: Arc<Config>) -> Client {
        Client {
            state: ClientState::Idle,
            engine: Engine::new(config, true),
            hello_sent: false,
            offered_version: None,
            random: None,
            cookie: None,
            server_ecdh: None,
            psk_hint: Buf::new(),
            certificate_requested: false,
            peer_certificate_types: ArrayVec::new(),
            peer_signature_algorithms: SignatureAlgorithms::new(),
            peer_ccs: false,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Send the first ClientHello.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.state != ClientState::Idle || self.hello_sent {
            return Err(Error::InvalidState);
        }
        let random = Random::new(self.engine.now(), self.engine.rng())?;
        self.random = Some(random);
        self.send_client_hello().map_err(|e| self.on_error(e))
    }

    /// Feed received bytes and advance the handshake as far as they allow.
    pub fn handle_input(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.handle_input(data);
        self.make_progress()
    }

    pub fn poll_output(&mut self) -> Option<Buf> {
        self.engine.poll_output()
    }

    /// Start a renegotiation on an established connection.
    pub fn renegotiate(&mut self) -> Result<(), Error> {
        if self.state != ClientState::HandshakeFinished {
            return Err(Error::RenegotiationSessionInactive);
        }
        if !self.engine.config().renegotiation() {
            return Err(Error::NoRenegotiation);
        }
        if !self.engine.renegotiation.secure {
            return Err(Error::RenegotiationFailure);
        }

        debug!("Renegotiating");
        self.begin_renegotiation().map_err(|e| self.on_error(e))?;
        self.transition(ClientState::Renegotiating);
        Ok(())
    }

    /// Send application data when the client is connected.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.send_application_data(data)
    }

    pub fn read_application_data(&mut self, out: &mut [u8]) -> usize {
        self.engine.read_application_data(out)
    }

    /// Queue a close_notify alert.
    pub fn close(&mut self) -> Result<(), Error> {
        self.engine.send_alert(Alert::CLOSE_NOTIFY)
    }

    /// Back to `Idle`, secrets wiped. Credentials and callbacks stay.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.state = ClientState::Idle;
        self.hello_sent = false;
        self.offered_version = None;
        self.random = None;
        self.cookie = None;
        self.server_ecdh = None;
        self.psk_hint.zeroize();
        self.clear_request();
        self.peer_ccs = false;
    }

    fn clear_request(&mut self) {
        self.certificate_requested = false;
        self.peer_certificate_types.clear();
        self.peer_signature_algorithms.clear();
    }

    /// Fail the handshake with an error that happened outside the engine,
    /// such as on the transport.
    pub(crate) fn abort(&mut self, error: Error) -> Error {
        self.on_error(error)
    }

    fn transition(&mut self, next: ClientState) {
        if next != self.state {
            trace!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn make_progress(&mut self) -> Result<(), Error> {
        loop {
            match self.step() {
                Ok(Some(next)) => self.transition(next),
                Ok(None) => return Ok(()),
                Err(e) => return Err(self.on_error(e)),
            }
        }
    }

    /// Decide the state after a failure, alerting the peer if it is fatal.
    fn on_error(&mut self, error: Error) -> Error {
        match &error {
            Error::NoRenegotiation
                if matches!(
                    self.state,
                    ClientState::Renegotiating | ClientState::HelloRequest
                ) =>
            {
                warn!("Server refused renegotiation");
                self.transition(ClientState::HandshakeFinished);
            }
            Error::ConnectionClosed => {}
            e if !e.is_fatal() => {}
            e => {
                let next = if self.engine.fail(e) {
                    ClientState::AlertSent
                } else {
                    ClientState::Error
                };
                self.transition(next);
            }
        }
        error
    }

    /// Process one step. `None` means more input is needed.
    fn step(&mut self) -> Result<Option<ClientState>, Error> {
        match self.state {
            ClientState::Error | ClientState::AlertSent => Err(Error::InvalidState),
            ClientState::ServerHelloDone => self.await_server_finished(),
            _ => {
                let Some(handshake) = self.engine.next_handshake()? else {
                    return Ok(None);
                };
                let result = self.dispatch(&handshake);
                self.engine.recycle(handshake);
                result.map(Some)
            }
        }
    }

    fn dispatch(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        use ClientState as S;
        use MessageType as M;

        let key_exchange = self.engine.cipher_suite().map(|s| s.key_exchange);

        match (self.state, handshake.msg_type) {
            (_, M::HelloRequest) => self.receive_hello_request(handshake),

            (S::Idle, M::HelloVerifyRequest)
                if self.hello_sent && self.engine.config().dtls() && self.cookie.is_none() =>
            {
                self.receive_hello_verify_request(handshake)
            }

            (S::Idle | S::HelloVerify, M::ServerHello) if self.hello_sent => {
                self.receive_server_hello(handshake)
            }
            (S::HelloRequest | S::Renegotiating, M::ServerHello) => {
                self.receive_server_hello(handshake)
            }

            (S::ServerHello, M::Certificate) if key_exchange != Some(KeyExchange::Psk) => {
                self.receive_certificate(handshake)
            }

            (S::ServerCertificate, M::ServerKeyExchange)
                if key_exchange == Some(KeyExchange::Ecdhe) =>
            {
                self.receive_server_key_exchange(handshake)
            }
            (S::ServerHello, M::ServerKeyExchange) if key_exchange == Some(KeyExchange::Psk) => {
                self.receive_server_key_exchange(handshake)
            }

            (S::ServerCertificate, M::CertificateRequest)
                if matches!(key_exchange, Some(KeyExchange::Rsa | KeyExchange::Ecdh)) =>
            {
                self.receive_certificate_request(handshake)
            }
            (S::ServerKeyExchange, M::CertificateRequest)
                if key_exchange == Some(KeyExchange::Ecdhe) =>
            {
                self.receive_certificate_request(handshake)
            }

            (
                S::ServerHello | S::ServerCertificate | S::ServerKeyExchange | S::CertificateRequest,
                M::ServerHelloDone,
            ) => self.receive_server_hello_done(handshake),

            (state, msg_type) => {
                debug!("Unexpected {:?} in {:?}", msg_type, state);
                Err(Error::UnexpectedMessage)
            }
        }
    }

    fn receive_hello_request(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        if !handshake.body().is_empty() {
            return Err(Error::IncorrectMessageLength);
        }

        if self.state != ClientState::HandshakeFinished {
            debug!("Ignoring HelloRequest in {:?}", self.state);
            return Ok(self.state);
        }

        let allowed = self.engine.config().renegotiation()
            && self.engine.renegotiation.secure
            && match &self.engine.callbacks.renegotiation {
                Some(hook) => hook().is_ok(),
                None => true,
            };

        if !allowed {
            warn!("Refusing server renegotiation request");
            self.engine.send_alert(Alert::new(
                AlertLevel::Warning,
                AlertDescription::NoRenegotiation,
            ))?;
            return Ok(self.state);
        }

        debug!("Server requested renegotiation");
        self.begin_renegotiation()?;
        Ok(ClientState::HelloRequest)
    }

    fn begin_renegotiation(&mut self) -> Result<(), Error> {
        self.engine.begin_handshake();
        self.random = Some(Random::new(self.engine.now(), self.engine.rng())?);
        self.send_client_hello()
    }

    fn receive_hello_verify_request(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        let hvr = parse_all(handshake.body(), HelloVerifyRequest::parse)?;
        if !hvr.server_version.is_dtls() {
            return Err(Error::UnknownTlsVersion);
        }
        debug!("HelloVerifyRequest with {} byte cookie", hvr.cookie.len());

        self.cookie = Some(hvr.cookie);
        // The exchange restarts: the first ClientHello is not part of it.
        self.engine.begin_handshake();
        self.send_client_hello()?;

        Ok(ClientState::HelloVerify)
    }

    /// Whether `info` can be offered, and accepted, at `version`.
    fn can_use(&self, info: &CipherSuiteInfo, version: ProtocolVersion) -> bool {
        if !info.usable_at(version) {
            return false;
        }
        match info.key_exchange {
            KeyExchange::Psk => !self.engine.psks.is_empty(),
            KeyExchange::Ecdh | KeyExchange::Ecdhe => {
                !self.engine.config().ecc().supported_groups().is_empty()
            }
            KeyExchange::Rsa => true,
        }
    }

    fn send_client_hello(&mut self) -> Result<(), Error> {
        let config = self.engine.config().clone();
        let version = match self.engine.version() {
            // Renegotiation keeps the negotiated version.
            Some(v) => v,
            None => self.engine.version_policy().client_offer()?,
        };
        let random = self.random.ok_or(Error::InvalidState)?;

        let mut suites = CipherSuites::new();
        let mut offers_ecc = false;
        for info in config.cipher_suites() {
            if self.can_use(info, version) && suites.len() < suites.capacity() - 1 {
                suites.push(info.suite);
                offers_ecc |= info.uses_ecc();
            }
        }
        if suites.is_empty() {
            return Err(Error::NoSupportedCiphers);
        }
        if config.send_fallback_scsv() && !self.engine.renegotiation.completed {
            suites.push(CipherSuite::FALLBACK_SCSV);
        }

        let cookie = if config.dtls() {
            Some(self.cookie.unwrap_or_default())
        } else {
            None
        };

        let mut renegotiation_info = Buf::new();
        let mut server_name = Buf::new();
        let mut groups = Buf::new();
        let mut point_formats = Buf::new();
        let mut signature_algorithms = Buf::new();

        let mut hello = ClientHello::new(version, random, SessionId::empty(), cookie, suites);

        let reneg = &self.engine.renegotiation;
        if reneg.completed {
            RenegotiationInfoExtension::new(&[&reneg.local_verify_data])
                .serialize(&mut renegotiation_info);
        } else {
            RenegotiationInfoExtension::default().serialize(&mut renegotiation_info);
        }
        hello.push_extension(Extension::new(
            ExtensionType::RenegotiationInfo,
            &renegotiation_info,
        ));

        if let Some(name) = config.server_name() {
            ServerNameExtension::new(name).serialize(&mut server_name);
            hello.push_extension(Extension::new(ExtensionType::ServerName, &server_name));
        }

        if offers_ecc {
            SupportedGroupsExtension::new(config.ecc().supported_groups()).serialize(&mut groups);
            ECPointFormatsExtension::default().serialize(&mut point_formats);
            hello.push_extension(Extension::new(ExtensionType::SupportedGroups, &groups));
            hello.push_extension(Extension::new(
                ExtensionType::EcPointFormats,
                &point_formats,
            ));
        }

        if version.is_tls12() && !config.signature_algorithms().is_empty() {
            SignatureAlgorithmsExtension::new(config.signature_algorithms())
                .serialize(&mut signature_algorithms);
            hello.push_extension(Extension::new(
                ExtensionType::SignatureAlgorithms,
                &signature_algorithms,
            ));
        }

        self.engine.keys.client_random = random.to_bytes();
        self.offered_version = Some(version);
        self.server_ecdh = None;
        self.psk_hint.clear();
        self.clear_request();
        self.peer_ccs = false;

        self.engine
            .create_handshake(MessageType::ClientHello, |body, _| {
                hello.serialize(body);
                Ok(())
            })?;
        self.hello_sent = true;

        Ok(())
    }

    fn receive_server_hello(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        let config = self.engine.config().clone();
        let hello = parse_all(handshake.body(), |i| {
            ServerHello::parse(i, config.max_extensions())
        })?;

        let version = hello.server_version;
        self.engine
            .version_policy()
            .check(version, self.engine.version())?;

        if hello.compression_method != CompressionMethod::Null {
            return Err(Error::BadCompressionMethod);
        }

        let info = config
            .cipher_suites()
            .iter()
            .copied()
            .find(|i| i.suite == hello.cipher_suite)
            .ok_or(Error::UnknownCipherSuite)?;
        if !self.can_use(info, version) {
            return Err(Error::UnknownCipherSuite);
        }

        let reneg_ext = hello
            .extension(ExtensionType::RenegotiationInfo)
            .map(RenegotiationInfoExtension::decode)
            .transpose()?;

        let reneg = &mut self.engine.renegotiation;
        if !reneg.completed {
            match reneg_ext {
                Some(ext) if ext.is_empty() => reneg.secure = true,
                Some(_) => return Err(Error::RenegotiationExtensionError),
                None => reneg.secure = false,
            }
        } else {
            let Some(ext) = reneg_ext else {
                return Err(Error::RenegotiationFailure);
            };
            let mut expected: ArrayVec<[u8; 32]> = ArrayVec::new();
            expected.extend_from_slice(&reneg.local_verify_data);
            expected.extend_from_slice(&reneg.remote_verify_data);
            let ok: bool = ext.renegotiated_connection[..].ct_eq(&expected[..]).into();
            if !ok {
                return Err(Error::RenegotiationExtensionError);
            }
        }

        if let Some(data) = hello.extension(ExtensionType::EcPointFormats) {
            let formats = ECPointFormatsExtension::decode(data)?;
            if info.uses_ecc() && !formats.supports_uncompressed() {
                return Err(Error::UnsupportedEccFormat);
            }
        }

        if let Some(hook) = &self.engine.callbacks.extensions {
            hook(&hello.extensions[..])?;
        }

        self.engine.hash_handshake(handshake);
        self.engine.set_version(version);
        self.engine.set_cipher_suite(info);
        self.engine.keys.server_random = hello.random.to_bytes();
        self.engine.session_id = hello.session_id;

        debug!(
            "ServerHello: {} {} (secure renegotiation: {})",
            version, info.suite, self.engine.renegotiation.secure
        );

        Ok(ClientState::ServerHello)
    }

    fn receive_certificate(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        let (_, info) = self.engine.negotiated()?;
        let config = self.engine.config().clone();
        let provider = config.crypto_provider();

        let certificate = parse_all(handshake.body(), Certificate::parse)?;
        if certificate.is_empty() {
            return Err(Error::CertificateNotFound);
        }

        let chain: ArrayVec<[&[u8]; MAX_CHAIN_LEN]> =
            certificate.certificate_list.iter().map(|c| c.0).collect();
        self.engine.certificates.set_remote_chain(&chain, provider)?;

        let now = self.engine.validity_time();
        self.engine.certificates.verify_remote_chain(provider, now)?;

        if let Some(hook) = &self.engine.callbacks.certificate {
            hook(chain[0]).map_err(|e| {
                warn!("Server certificate rejected by callback: {}", e);
                e
            })?;
        }

        let leaf = self
            .engine
            .certificates
            .remote_leaf()
            .ok_or(Error::CertificateNotFound)?;
        if Some(leaf.public_key().algorithm()) != info.authentication.certificate_key() {
            return Err(Error::UnsupportedCertificate);
        }
        if info.key_exchange == KeyExchange::Ecdh {
            if let PublicKey::Ec { group, .. } = leaf.public_key() {
                config
                    .ecc()
                    .find_curve(*group)
                    .map_err(|_| Error::UnsupportedEccCurve)?;
            }
        }

        self.engine.hash_handshake(handshake);
        Ok(ClientState::ServerCertificate)
    }

    fn receive_server_key_exchange(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        let (version, info) = self.engine.negotiated()?;
        let config = self.engine.config().clone();
        let provider = config.crypto_provider();

        let ske = parse_all(handshake.body(), |i| {
            ServerKeyExchange::parse(i, info.key_exchange, version.is_tls12())
        })?;

        match ske.params {
            ServerKeyExchangeParams::Psk { identity_hint } => {
                debug!("PSK identity hint of {} bytes", identity_hint.len());
                self.psk_hint.clear();
                self.psk_hint.extend_from_slice(identity_hint);
            }

            ServerKeyExchangeParams::Ecdhe {
                curve_type,
                group,
                public,
            } => {
                if curve_type != NAMED_CURVE {
                    return Err(Error::UnsupportedEccCurve);
                }
                let curve = config.ecc().find_curve(group).map_err(|e| {
                    debug!("Server picked {:?}: {}", group, e);
                    Error::UnsupportedEccCurve
                })?;

                let signed = ske.signature.ok_or(Error::HandshakeFailure)?;
                if let Some(alg) = signed.algorithm {
                    if !config.signature_algorithms().contains(&alg) {
                        return Err(Error::UnsupportedSignatureAlgorithm);
                    }
                }

                let leaf = self
                    .engine
                    .certificates
                    .remote_leaf()
                    .ok_or(Error::CertificateNotFound)?;
                let hash = SignedHash::for_version(
                    version,
                    signed.algorithm,
                    leaf.public_key().algorithm(),
                    provider,
                )?;

                let mut data = Buf::new();
                data.extend_from_slice(&self.engine.keys.client_random);
                data.extend_from_slice(&self.engine.keys.server_random);
                ske.params.serialize(&mut data);

                let mut digest = Buf::new();
                hash.digest(&data, provider, &mut digest)?;
                signature::verify(leaf.public_key(), hash, &digest, signed.signature, provider)?;

                trace!("ServerKeyExchange signature verified");
                self.server_ecdh = Some((curve, Buf::from_slice(public)));
            }
        }

        self.engine.hash_handshake(handshake);
        Ok(ClientState::ServerKeyExchange)
    }

    fn receive_certificate_request(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        let (version, _) = self.engine.negotiated()?;
        let request = parse_all(handshake.body(), |i| {
            CertificateRequest::parse(i, version.is_tls12())
        })?;

        self.certificate_requested = true;
        self.peer_certificate_types = request.certificate_types;
        self.peer_signature_algorithms = request.supported_signature_algorithms;
        debug!(
            "CertificateRequest for {:?}",
            &self.peer_certificate_types[..]
        );

        self.engine.hash_handshake(handshake);
        Ok(ClientState::CertificateRequest)
    }

    fn receive_server_hello_done(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        if !handshake.body().is_empty() {
            return Err(Error::IncorrectMessageLength);
        }
        let (_, info) = self.engine.negotiated()?;
        if info.authentication.certificate_key().is_some()
            && self.engine.certificates.remote_leaf().is_none()
        {
            return Err(Error::UnexpectedMessage);
        }
        if info.key_exchange == KeyExchange::Ecdhe && self.server_ecdh.is_none() {
            return Err(Error::UnexpectedMessage);
        }

        self.engine.hash_handshake(handshake);
        self.send_flight()?;

        Ok(ClientState::ServerHelloDone)
    }

    /// Our local certificate matching what the server asked for.
    fn client_identity(&self) -> Option<Arc<StoredCertificate>> {
        self.peer_certificate_types.iter().find_map(|t| {
            let key = match t {
                ClientCertificateType::RsaSign => SignatureAlgorithm::RSA,
                ClientCertificateType::EcdsaSign => SignatureAlgorithm::ECDSA,
                _ => return None,
            };
            self.engine.certificates.local_identity(key).cloned()
        })
    }

    fn send_flight(&mut self) -> Result<(), Error> {
        let (version, info) = self.engine.negotiated()?;
        let config = self.engine.config().clone();
        let provider = config.crypto_provider();

        let identity = if self.certificate_requested {
            let identity = self.client_identity();
            let certificates = self.engine.certificates.clone();
            let chain = match &identity {
                Some(leaf) => certificates.local_chain(leaf),
                None => {
                    debug!("No client certificate for the request, sending none");
                    ArrayVec::new()
                }
            };
            let message = Certificate::new(&chain);
            self.engine
                .create_handshake(MessageType::Certificate, |body, _| {
                    message.serialize(body);
                    Ok(())
                })?;
            identity
        } else {
            None
        };

        let mut exchange = Buf::new();
        let kind = match info.key_exchange {
            KeyExchange::Rsa => {
                let leaf = self
                    .engine
                    .certificates
                    .remote_leaf()
                    .cloned()
                    .ok_or(Error::CertificateNotFound)?;
                let PublicKey::Rsa { modulus, exponent } = leaf.public_key() else {
                    return Err(Error::UnsupportedCertificate);
                };
                let offered = self.offered_version.ok_or(Error::InvalidState)?;
                self.engine
                    .keys
                    .generate_rsa_pre_master(offered, provider.secure_random)?;
                provider
                    .rsa
                    .encrypt_pkcs1(modulus, exponent, self.engine.keys.pre_master(), &mut exchange)
                    .map_err(Error::CryptoError)?;
                KeyExchange::Rsa
            }

            KeyExchange::Psk => {
                let entry = self.engine.psks.for_hint(&self.psk_hint)?;
                exchange.extend_from_slice(entry.identity());
                self.engine.keys.generate_psk_pre_master(entry.key())?;
                KeyExchange::Psk
            }

            KeyExchange::Ecdhe => {
                let (curve, server_public) =
                    self.server_ecdh.take().ok_or(Error::InvalidState)?;
                self.ecdh_with(curve, &server_public, &mut exchange)?;
                KeyExchange::Ecdhe
            }

            KeyExchange::Ecdh => {
                let leaf = self
                    .engine
                    .certificates
                    .remote_leaf()
                    .cloned()
                    .ok_or(Error::CertificateNotFound)?;
                let PublicKey::Ec { group, point } = leaf.public_key() else {
                    return Err(Error::UnsupportedCertificate);
                };
                let curve = config
                    .ecc()
                    .find_curve(*group)
                    .map_err(|_| Error::UnsupportedEccCurve)?;
                self.ecdh_with(curve, point, &mut exchange)?;
                KeyExchange::Ecdh
            }
        };

        let message = match kind {
            KeyExchange::Rsa => ClientKeyExchange::Rsa {
                encrypted_pre_master: &exchange,
            },
            KeyExchange::Psk => ClientKeyExchange::Psk {
                identity: &exchange,
            },
            KeyExchange::Ecdh | KeyExchange::Ecdhe => ClientKeyExchange::Ecdh { public: &exchange },
        };
        self.engine
            .create_handshake(MessageType::ClientKeyExchange, |body, _| {
                message.serialize(body);
                Ok(())
            })?;

        self.engine.derive_keys()?;

        if let Some(leaf) = identity {
            self.send_certificate_verify(version, &config, &leaf)?;
        }

        self.engine.send_change_cipher_spec()?;

        let verify_data = self.engine.verify_data(CLIENT_FINISHED)?;
        self.engine.renegotiation.local_verify_data = verify_data;
        self.engine
            .create_handshake(MessageType::Finished, |body, _| {
                Finished::new(verify_data).serialize(body);
                Ok(())
            })?;

        Ok(())
    }

    /// ECDH against `peer_public`, leaving our public point in `public`.
    fn ecdh_with(
        &mut self,
        curve: &'static dyn CurveMethod,
        peer_public: &[u8],
        public: &mut Buf,
    ) -> Result<(), Error> {
        let exchange = curve
            .start_exchange(Buf::new())
            .map_err(Error::CryptoError)?;
        public.extend_from_slice(exchange.pub_key());

        let mut shared = Buf::new();
        let result = exchange
            .complete(peer_public, &mut shared)
            .map_err(Error::CryptoError)
            .and_then(|_| self.engine.keys.set_pre_master(&shared));
        shared.zeroize();
        result
    }

    fn send_certificate_verify(
        &mut self,
        version: ProtocolVersion,
        config: &Config,
        leaf: &StoredCertificate,
    ) -> Result<(), Error> {
        let key = leaf.private_key().ok_or(Error::CertificateNotFound)?;
        let key_alg = key.algorithm();

        let algorithm = if version.is_tls12() {
            Some(choose_signature_algorithm(
                key_alg,
                config.signature_algorithms(),
                &self.peer_signature_algorithms,
            )?)
        } else {
            None
        };
        let hash =
            SignedHash::for_version(version, algorithm, key_alg, config.crypto_provider())?;

        let mut digest = Buf::new();
        hash.digest_transcript(&self.engine.transcript, &mut digest)?;
        let mut signature = Buf::new();
        signature::sign(key, hash, &digest, &mut signature)?;

        let message = CertificateVerify::new(DigitallySigned::new(algorithm, &signature));
        self.engine
            .create_handshake(MessageType::CertificateVerify, |body, _| {
                message.serialize(body);
                Ok(())
            })
    }

    fn await_server_finished(&mut self) -> Result<Option<ClientState>, Error> {
        if !self.peer_ccs {
            if !self.engine.take_change_cipher_spec()? {
                return Ok(None);
            }
            self.engine.enable_peer_encryption()?;
            self.peer_ccs = true;
        }

        let Some(handshake) = self.engine.next_handshake()? else {
            return Ok(None);
        };
        let result = self.receive_finished(&handshake);
        self.engine.recycle(handshake);
        result.map(Some)
    }

    fn receive_finished(&mut self, handshake: &Handshake) -> Result<ClientState, Error> {
        if handshake.msg_type != MessageType::Finished {
            debug!("Unexpected {:?} instead of Finished", handshake.msg_type);
            return Err(Error::UnexpectedMessage);
        }

        let finished = parse_all(handshake.body(), Finished::parse)?;
        let expected = self.engine.verify_data(SERVER_FINISHED)?;
        let ok: bool = expected[..].ct_eq(&finished.verify_data[..]).into();
        if !ok {
            return Err(Error::FinishedHashFailure);
        }
        self.engine.hash_handshake(handshake);

        let reneg = &mut self.engine.renegotiation;
        reneg.remote_verify_data = finished.verify_data;
        reneg.completed = true;

        self.engine.certificates.clear_remote();
        self.engine.enable_application_data();
        self.peer_ccs = false;

        debug!("Handshake complete");
        Ok(ClientState::HandshakeFinished)
    }
}
