// TLS 1.0-1.2 Server Handshake Flow (RFC 5246 section 7.3):
//
// 1. Client sends ClientHello. The server picks the version, the first suite
//    in the client's order it has credentials for, and checks the RFC 5746
//    indication and the RFC 7507 fallback signal.
// 2. DTLS only: a ClientHello without a valid cookie is answered with a
//    HelloVerifyRequest and nothing is remembered.
// 3. Server sends its flight:
//    ServerHello [Certificate] [ServerKeyExchange] [CertificateRequest] ServerHelloDone
// 4. Client sends [Certificate] ClientKeyExchange [CertificateVerify]
//    ChangeCipherSpec Finished.
// 5. Server sends ChangeCipherSpec and Finished. Application data flows.
//
// A ClientHello after the handshake is a renegotiation. `renegotiate()` asks
// the client for one with HelloRequest.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tinyvec::ArrayVec;
use zeroize::Zeroize;

use super::engine::{Engine, Handshake};
use crate::alert::{Alert, AlertDescription, AlertLevel};
use crate::buffer::Buf;
use crate::ciphersuite::{CipherSuite, CipherSuiteInfo, KeyExchange};
use crate::config::Config;
use crate::crypto::{ActiveKeyExchange, CurveMethod, PublicKey};
use crate::key_schedule::RSA_PRE_MASTER_LEN;
use crate::message::extensions::signature_algorithms::SignatureAlgorithms;
use crate::message::extensions::{
    ECPointFormatsExtension, RenegotiationInfoExtension, ServerNameExtension,
    SignatureAlgorithmsExtension, SupportedGroupsExtension,
};
use crate::message::{
    parse_all, Certificate, CertificateRequest, CertificateVerify, ClientHello,
    ClientKeyExchange, Cookie, DigitallySigned, Extension, ExtensionType, Finished,
    HelloVerifyRequest, MessageType, Random, ServerHello, ServerKeyExchange,
    ServerKeyExchangeParams, SessionId, CLIENT_HELLO_MIN_LEN, MAX_CHAIN_LEN, NAMED_CURVE,
};
use crate::signature::{self, choose_signature_algorithm, SignedHash};
use crate::store::{CertificateLocation, StoredCertificate};
use crate::transcript::{CLIENT_FINISHED, SERVER_FINISHED};
use crate::types::{
    ClientCertificateType, CompressionMethod, NamedGroup, ProtocolVersion, SignatureAlgorithm,
};
use crate::Error;

/// Length of the session id we hand out.
const SESSION_ID_LEN: usize = 32;

/// Server handshake state. Each state names the last milestone reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for a ClientHello.
    Idle,
    /// Failed without telling the peer.
    Error,
    /// Failed and a fatal alert went out.
    AlertSent,
    /// ClientHello accepted, our flight is next.
    SendHello,
    /// DTLS: HelloVerifyRequest sent, waiting for the ClientHello with the cookie.
    SendHelloVerify,
    /// Flight up to ServerHelloDone sent.
    HelloSent,
    ClientCertificate,
    KeyExchange,
    CertificateVerify,
    /// Client Finished verified, our ChangeCipherSpec and Finished are next.
    FinishHandshake,
    HandshakeFinished,
    /// HelloRequest sent, waiting for the client to renegotiate.
    HelloRequest,
}

/// What the client offered besides suites, used to pick one.
#[derive(Default)]
struct Offer {
    groups: ArrayVec<[NamedGroup; 16]>,
    /// `None` when the client sent no ec_point_formats.
    uncompressed_points: Option<bool>,
}

/// The suite picked for a ClientHello and what it needs.
struct Choice {
    info: &'static CipherSuiteInfo,
    identity: Option<Arc<StoredCertificate>>,
    curve: Option<&'static dyn CurveMethod>,
}

/// TLS server
pub struct Server {
    /// Current server state.
    state: ServerState,

    /// Engine in common between server and client.
    engine: Engine,

    /// Version field of the ClientHello. The RSA pre-master must carry it.
    client_version: Option<ProtocolVersion>,

    /// Local certificate chosen for the suite.
    identity: Option<Arc<StoredCertificate>>,

    /// Curve for the ECDHE exchange.
    curve: Option<&'static dyn CurveMethod>,

    /// Our half of the ECDHE exchange, completed with ClientKeyExchange.
    key_exchange: Option<Box<dyn ActiveKeyExchange>>,

    /// From the client's signature_algorithms extension.
    peer_signature_algorithms: SignatureAlgorithms,

    /// The client sent ec_point_formats.
    peer_point_formats: bool,

    /// CertificateRequest went out.
    certificate_requested: bool,

    /// The client sent a non-empty Certificate, so CertificateVerify follows.
    client_certified: bool,

    /// The client's ChangeCipherSpec was taken and read keys switched.
    peer_ccs: bool,

    /// Key for stateless DTLS cookies.
    cookie_secret: Option<[u8; 32]>,
}

impl Server {
    pub fn new(config: Arc<Config>) -> Server {
        Server {
            state: ServerState::Idle,
            engine: Engine::new(config, false),
            client_version: None,
            identity: None,
            curve: None,
            key_exchange: None,
            peer_signature_algorithms: SignatureAlgorithms::new(),
            peer_point_formats: false,
            certificate_requested: false,
            client_certified: false,
            peer_ccs: false,
            cookie_secret: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Feed received bytes and advance the handshake as far as they allow.
    pub fn handle_input(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.handle_input(data);
        self.make_progress()
    }

    pub fn poll_output(&mut self) -> Option<Buf> {
        self.engine.poll_output()
    }

    /// Ask the client to renegotiate.
    pub fn renegotiate(&mut self) -> Result<(), Error> {
        if self.state != ServerState::HandshakeFinished {
            return Err(Error::RenegotiationSessionInactive);
        }
        if !self.engine.config().renegotiation() {
            return Err(Error::NoRenegotiation);
        }
        if !self.engine.renegotiation.secure {
            return Err(Error::RenegotiationFailure);
        }

        debug!("Requesting renegotiation");
        self.engine
            .create_handshake(MessageType::HelloRequest, |_, _| Ok(()))?;
        self.transition(ServerState::HelloRequest);
        Ok(())
    }

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
        self.state = ServerState::Idle;
        self.client_version = None;
        self.clear_handshake();
    }

    fn clear_handshake(&mut self) {
        self.identity = None;
        self.curve = None;
        self.key_exchange = None;
        self.peer_signature_algorithms.clear();
        self.peer_point_formats = false;
        self.certificate_requested = false;
        self.client_certified = false;
        self.peer_ccs = false;
    }

    /// Fail the handshake with an error that happened outside the engine,
    /// such as on the transport.
    pub(crate) fn abort(&mut self, error: Error) -> Error {
        self.on_error(error)
    }

    fn transition(&mut self, next: ServerState) {
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

    fn on_error(&mut self, error: Error) -> Error {
        match &error {
            Error::NoRenegotiation if self.state == ServerState::HelloRequest => {
                warn!("Client refused renegotiation");
                self.transition(ServerState::HandshakeFinished);
            }
            Error::ConnectionClosed => {}
            e if !e.is_fatal() => {}
            e => {
                let next = if self.engine.fail(e) {
                    ServerState::AlertSent
                } else {
                    ServerState::Error
                };
                self.transition(next);
            }
        }
        error
    }

    /// Process one step. `None` means more input is needed.
    fn step(&mut self) -> Result<Option<ServerState>, Error> {
        match self.state {
            ServerState::Error | ServerState::AlertSent => Err(Error::InvalidState),
            ServerState::SendHello => {
                self.send_flight()?;
                Ok(Some(ServerState::HelloSent))
            }
            ServerState::FinishHandshake => {
                self.send_finished()?;
                Ok(Some(ServerState::HandshakeFinished))
            }
            ServerState::KeyExchange if !self.client_certified => self.await_client_finished(),
            ServerState::CertificateVerify => self.await_client_finished(),
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

    fn dispatch(&mut self, handshake: &Handshake) -> Result<ServerState, Error> {
        use MessageType as M;
        use ServerState as S;

        match (self.state, handshake.msg_type) {
            (S::Idle | S::SendHelloVerify, M::ClientHello) => self.receive_client_hello(handshake),

            (S::HandshakeFinished | S::HelloRequest, M::ClientHello) => {
                self.receive_renegotiation_hello(handshake)
            }

            (S::HelloSent, M::Certificate) if self.certificate_requested => {
                self.receive_certificate(handshake)
            }

            (S::HelloSent, M::ClientKeyExchange) if !self.certificate_requested => {
                self.receive_client_key_exchange(handshake)
            }
            (S::ClientCertificate, M::ClientKeyExchange) => {
                self.receive_client_key_exchange(handshake)
            }

            (S::KeyExchange, M::CertificateVerify) if self.client_certified => {
                self.receive_certificate_verify(handshake)
            }

            (state, msg_type) => {
                debug!("Unexpected {:?} in {:?}", msg_type, state);
                Err(Error::UnexpectedMessage)
            }
        }
    }

    fn receive_renegotiation_hello(&mut self, handshake: &Handshake) -> Result<ServerState, Error> {
        let allowed = self.engine.config().renegotiation()
            && self.engine.renegotiation.secure
            && match &self.engine.callbacks.renegotiation {
                Some(hook) => hook().is_ok(),
                None => true,
            };

        if !allowed {
            warn!("Refusing client renegotiation");
            self.engine.send_alert(Alert::new(
                AlertLevel::Warning,
                AlertDescription::NoRenegotiation,
            ))?;
            return Ok(ServerState::HandshakeFinished);
        }

        debug!("Client renegotiates");
        self.engine.begin_handshake();
        self.clear_handshake();
        self.receive_client_hello(handshake)
    }

    fn cookie_for(&mut self, random: &Random) -> Result<Cookie, Error> {
        let secret = match self.cookie_secret {
            Some(s) => s,
            None => {
                let mut s = [0u8; 32];
                self.engine.rng().fill(&mut s).map_err(Error::CryptoError)?;
                self.cookie_secret = Some(s);
                s
            }
        };

        let mut mac = Buf::new();
        self.engine
            .provider()
            .hmac_sha256
            .compute(&secret, &[&random.to_bytes()], &mut mac)
            .map_err(Error::CryptoError)?;
        Cookie::try_new(&mac).ok_or(Error::BufferTooSmall)
    }

    fn receive_client_hello(&mut self, handshake: &Handshake) -> Result<ServerState, Error> {
        let config = self.engine.config().clone();

        if handshake.body().len() < CLIENT_HELLO_MIN_LEN {
            return Err(Error::IncorrectMessageLength);
        }
        let hello = parse_all(handshake.body(), |i| {
            ClientHello::parse(i, config.dtls(), config.max_extensions())
        })?;

        let policy = self.engine.version_policy();
        let version = policy.negotiate_server(hello.client_version)?;
        if hello.offers(CipherSuite::FALLBACK_SCSV)
            && policy.is_fallback_inappropriate(hello.client_version)
        {
            warn!("Inappropriate fallback to {}", hello.client_version);
            return Err(Error::InappropriateFallback);
        }
        if let Some(current) = self.engine.version() {
            if current != version {
                return Err(Error::ProtocolVersionChanged);
            }
        }

        if !hello.compression_methods.contains(&CompressionMethod::Null) {
            return Err(Error::BadCompressionMethod);
        }

        if config.dtls() && !self.engine.renegotiation.completed {
            let expected = self.cookie_for(&hello.random)?;
            let valid = match &hello.cookie {
                Some(cookie) if !cookie.is_empty() => bool::from(cookie[..].ct_eq(&expected[..])),
                _ => false,
            };
            if !valid {
                debug!("ClientHello without a valid cookie");
                self.engine
                    .create_handshake(MessageType::HelloVerifyRequest, |body, _| {
                        HelloVerifyRequest::new(ProtocolVersion::DTLS1_0, expected).serialize(body);
                        Ok(())
                    })?;
                self.engine.begin_handshake();
                return Ok(ServerState::SendHelloVerify);
            }
        }

        self.check_renegotiation_info(&hello)?;

        let mut offer = Offer::default();
        if let Some(data) = hello.extension(ExtensionType::ServerName) {
            let sni = ServerNameExtension::decode(data)?;
            debug!("SNI: {}", sni.host_name);
            self.engine.server_name = Some(sni.host_name);
        }
        if let Some(data) = hello.extension(ExtensionType::SupportedGroups) {
            offer.groups = SupportedGroupsExtension::decode(data)?.groups;
        }
        if let Some(data) = hello.extension(ExtensionType::EcPointFormats) {
            let formats = ECPointFormatsExtension::decode(data)?;
            offer.uncompressed_points = Some(formats.supports_uncompressed());
            self.peer_point_formats = true;
        }
        if let Some(data) = hello.extension(ExtensionType::SignatureAlgorithms) {
            self.peer_signature_algorithms =
                SignatureAlgorithmsExtension::decode(data)?.supported_signature_algorithms;
        }

        if let Some(hook) = &self.engine.callbacks.extensions {
            hook(&hello.extensions[..])?;
        }

        let choice = self.choose_suite(&hello, version, &offer)?;

        self.engine.hash_handshake(handshake);
        self.engine.set_version(version);
        self.engine.set_cipher_suite(choice.info);
        self.engine.keys.client_random = hello.random.to_bytes();
        self.client_version = Some(hello.client_version);
        self.identity = choice.identity;
        self.curve = choice.curve;

        debug!(
            "ClientHello: {} {} (secure renegotiation: {})",
            version, choice.info.suite, self.engine.renegotiation.secure
        );

        Ok(ServerState::SendHello)
    }

    fn check_renegotiation_info(&mut self, hello: &ClientHello<'_>) -> Result<(), Error> {
        let scsv = hello.offers(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV);
        let ext = hello
            .extension(ExtensionType::RenegotiationInfo)
            .map(RenegotiationInfoExtension::decode)
            .transpose()?;

        let reneg = &mut self.engine.renegotiation;
        if !reneg.completed {
            match ext {
                Some(e) if !e.is_empty() => return Err(Error::RenegotiationExtensionError),
                Some(_) => reneg.secure = true,
                None => reneg.secure = scsv,
            }
            return Ok(());
        }

        // The signalling suite is not allowed in a renegotiation.
        if scsv {
            return Err(Error::RenegotiationExtensionError);
        }
        let Some(e) = ext else {
            return Err(Error::RenegotiationFailure);
        };
        let ok: bool = e.renegotiated_connection[..]
            .ct_eq(&reneg.remote_verify_data[..])
            .into();
        if !ok {
            return Err(Error::RenegotiationExtensionError);
        }
        Ok(())
    }

    /// First suite in the client's order that we enable and hold the
    /// credentials for.
    fn choose_suite(
        &self,
        hello: &ClientHello<'_>,
        version: ProtocolVersion,
        offer: &Offer,
    ) -> Result<Choice, Error> {
        let config = self.engine.config();

        for suite in hello.cipher_suites.iter().filter(|s| !s.is_signalling()) {
            let Some(info) = config
                .cipher_suites()
                .iter()
                .copied()
                .find(|i| i.suite == *suite)
            else {
                continue;
            };
            if !info.usable_at(version) {
                continue;
            }
            if info.uses_ecc() && offer.uncompressed_points == Some(false) {
                continue;
            }

            let identity = match info.authentication.certificate_key() {
                Some(key) => match self.engine.certificates.local_identity(key) {
                    Some(cert) => Some(cert.clone()),
                    None => continue,
                },
                None => None,
            };

            let curve = match info.key_exchange {
                KeyExchange::Ecdhe => match self.shared_curve(offer) {
                    Some(curve) => Some(curve),
                    None => continue,
                },
                KeyExchange::Ecdh => {
                    let Some(PublicKey::Ec { group, .. }) =
                        identity.as_ref().map(|c| c.public_key())
                    else {
                        continue;
                    };
                    let offered = offer.groups.is_empty() || offer.groups.contains(group);
                    match config.ecc().find_curve(*group) {
                        Ok(curve) if offered => Some(curve),
                        _ => continue,
                    }
                }
                KeyExchange::Psk if self.engine.psks.is_empty() => continue,
                KeyExchange::Psk | KeyExchange::Rsa => None,
            };

            return Ok(Choice {
                info,
                identity,
                curve,
            });
        }

        Err(Error::NoSupportedCiphers)
    }

    /// First client group we support, or our first group if the client
    /// named none.
    fn shared_curve(&self, offer: &Offer) -> Option<&'static dyn CurveMethod> {
        let ecc = self.engine.config().ecc();
        if offer.groups.is_empty() {
            return ecc
                .supported_groups()
                .first()
                .and_then(|g| ecc.find_curve(*g).ok());
        }
        offer.groups.iter().find_map(|g| ecc.find_curve(*g).ok())
    }

    fn send_flight(&mut self) -> Result<(), Error> {
        let (version, info) = self.engine.negotiated()?;
        let config = self.engine.config().clone();

        let random = Random::new(self.engine.now(), self.engine.rng())?;
        let session_id = SessionId::random(SESSION_ID_LEN, self.engine.rng())?;
        self.engine.keys.server_random = random.to_bytes();
        self.engine.session_id = session_id;

        let mut renegotiation_info = Buf::new();
        let mut point_formats = Buf::new();
        let mut hello = ServerHello::new(version, random, session_id, info.suite);

        let reneg = &self.engine.renegotiation;
        if reneg.secure {
            if reneg.completed {
                RenegotiationInfoExtension::new(&[
                    &reneg.remote_verify_data,
                    &reneg.local_verify_data,
                ])
                .serialize(&mut renegotiation_info);
            } else {
                RenegotiationInfoExtension::default().serialize(&mut renegotiation_info);
            }
            hello.push_extension(Extension::new(
                ExtensionType::RenegotiationInfo,
                &renegotiation_info,
            ));
        }
        if info.uses_ecc() && self.peer_point_formats {
            ECPointFormatsExtension::default().serialize(&mut point_formats);
            hello.push_extension(Extension::new(
                ExtensionType::EcPointFormats,
                &point_formats,
            ));
        }

        self.engine
            .create_handshake(MessageType::ServerHello, |body, _| {
                hello.serialize(body);
                Ok(())
            })?;

        if let Some(identity) = self.identity.clone() {
            let certificates = self.engine.certificates.clone();
            let chain = certificates.local_chain(&identity);
            let message = Certificate::new(&chain);
            self.engine
                .create_handshake(MessageType::Certificate, |body, _| {
                    message.serialize(body);
                    Ok(())
                })?;
        }

        match info.key_exchange {
            KeyExchange::Ecdhe => {
                let curve = self.curve.ok_or(Error::InvalidState)?;
                let exchange = curve
                    .start_exchange(Buf::new())
                    .map_err(Error::CryptoError)?;
                self.send_ecdhe_params(version, &config, curve.group(), exchange.pub_key())?;
                self.key_exchange = Some(exchange);
            }
            KeyExchange::Psk => {
                let hint = match config.psk_identity_hint() {
                    Some(hint) => Buf::from_slice(hint),
                    None => Buf::from_slice(self.engine.psks.server_hint()),
                };
                if !hint.is_empty() {
                    let message = ServerKeyExchange::new(
                        ServerKeyExchangeParams::Psk {
                            identity_hint: &hint,
                        },
                        None,
                    );
                    self.engine
                        .create_handshake(MessageType::ServerKeyExchange, |body, _| {
                            message.serialize(body);
                            Ok(())
                        })?;
                }
            }
            KeyExchange::Rsa | KeyExchange::Ecdh => {}
        }

        if config.require_client_certificate() && info.key_exchange != KeyExchange::Psk {
            self.send_certificate_request(version, &config)?;
        }

        self.engine
            .create_handshake(MessageType::ServerHelloDone, |_, _| Ok(()))?;

        Ok(())
    }

    fn send_ecdhe_params(
        &mut self,
        version: ProtocolVersion,
        config: &Config,
        group: NamedGroup,
        public: &[u8],
    ) -> Result<(), Error> {
        let provider = config.crypto_provider();
        let identity = self.identity.clone().ok_or(Error::CertificateNotFound)?;
        let key = identity.private_key().ok_or(Error::CertificateNotFound)?;

        let params = ServerKeyExchangeParams::Ecdhe {
            curve_type: NAMED_CURVE,
            group,
            public,
        };

        let algorithm = if version.is_tls12() {
            Some(choose_signature_algorithm(
                key.algorithm(),
                config.signature_algorithms(),
                &self.peer_signature_algorithms,
            )?)
        } else {
            None
        };
        let hash = SignedHash::for_version(version, algorithm, key.algorithm(), provider)?;

        let mut data = Buf::new();
        data.extend_from_slice(&self.engine.keys.client_random);
        data.extend_from_slice(&self.engine.keys.server_random);
        params.serialize(&mut data);

        let mut digest = Buf::new();
        hash.digest(&data, provider, &mut digest)?;
        let mut signature = Buf::new();
        signature::sign(key, hash, &digest, &mut signature)?;

        let message = ServerKeyExchange::new(params, Some(DigitallySigned::new(algorithm, &signature)));
        self.engine
            .create_handshake(MessageType::ServerKeyExchange, |body, _| {
                message.serialize(body);
                Ok(())
            })
    }

    fn send_certificate_request(&mut self, version: ProtocolVersion, config: &Config) -> Result<(), Error> {
        let algorithms: SignatureAlgorithms = if version.is_tls12() {
            config.signature_algorithms().iter().copied().take(16).collect()
        } else {
            SignatureAlgorithms::new()
        };

        let certificates = self.engine.certificates.clone();
        let names: Vec<&[u8]> = certificates
            .subjects(CertificateLocation::Trusted)
            .take(32)
            .collect();

        let request = CertificateRequest::new(
            &[ClientCertificateType::RsaSign, ClientCertificateType::EcdsaSign],
            algorithms,
            &names,
        );
        self.engine
            .create_handshake(MessageType::CertificateRequest, |body, _| {
                request.serialize(body, version.is_tls12());
                Ok(())
            })?;
        self.certificate_requested = true;
        Ok(())
    }

    fn receive_certificate(&mut self, handshake: &Handshake) -> Result<ServerState, Error> {
        let config = self.engine.config().clone();
        let provider = config.crypto_provider();

        let certificate = parse_all(handshake.body(), Certificate::parse)?;
        if certificate.is_empty() {
            // We only request when the configuration requires it.
            warn!("Client sent no certificate");
            return Err(Error::HandshakeFailure);
        }

        let chain: ArrayVec<[&[u8]; MAX_CHAIN_LEN]> =
            certificate.certificate_list.iter().map(|c| c.0).collect();
        self.engine.certificates.set_remote_chain(&chain, provider)?;

        let now = self.engine.validity_time();
        self.engine.certificates.verify_remote_chain(provider, now)?;

        if let Some(hook) = &self.engine.callbacks.certificate {
            hook(chain[0]).map_err(|e| {
                warn!("Client certificate rejected by callback: {}", e);
                e
            })?;
        }

        let key = self
            .engine
            .certificates
            .remote_leaf()
            .map(|c| c.public_key().algorithm())
            .ok_or(Error::CertificateNotFound)?;
        if !matches!(key, SignatureAlgorithm::RSA | SignatureAlgorithm::ECDSA) {
            return Err(Error::UnsupportedCertificate);
        }

        self.client_certified = true;
        self.engine.hash_handshake(handshake);
        Ok(ServerState::ClientCertificate)
    }

    fn receive_client_key_exchange(&mut self, handshake: &Handshake) -> Result<ServerState, Error> {
        let (_, info) = self.engine.negotiated()?;
        let provider = self.engine.config().crypto_provider();
        let rng = provider.secure_random;

        let message = parse_all(handshake.body(), |i| {
            ClientKeyExchange::parse(i, info.key_exchange)
        })?;

        match message {
            ClientKeyExchange::Rsa {
                encrypted_pre_master,
            } => {
                let identity = self.identity.clone().ok_or(Error::CertificateNotFound)?;
                let key = identity.private_key().ok_or(Error::CertificateNotFound)?;
                let client_version = self.client_version.ok_or(Error::InvalidState)?;

                // A bad ciphertext must look like a good one: continue with a
                // random secret and let Finished fail.
                self.engine
                    .keys
                    .generate_rsa_pre_master(client_version, rng)?;

                let mut decrypted = Buf::new();
                let valid = key.decrypt(encrypted_pre_master, &mut decrypted).is_ok()
                    && decrypted.len() == RSA_PRE_MASTER_LEN
                    && decrypted[..2] == client_version.as_u16().to_be_bytes();
                if valid {
                    self.engine.keys.set_pre_master(&decrypted)?;
                } else {
                    debug!("RSA pre-master rejected");
                }
                decrypted.zeroize();
            }

            ClientKeyExchange::Psk { identity } => {
                let entry = self.engine.psks.find_by_identity(identity)?;
                self.engine.keys.generate_psk_pre_master(entry.key())?;
            }

            ClientKeyExchange::Ecdh { public } => {
                let mut shared = Buf::new();
                let result = if info.key_exchange == KeyExchange::Ecdhe {
                    let exchange = self.key_exchange.take().ok_or(Error::InvalidState)?;
                    exchange.complete(public, &mut shared)
                } else {
                    let identity = self.identity.clone().ok_or(Error::CertificateNotFound)?;
                    let key = identity.private_key().ok_or(Error::CertificateNotFound)?;
                    key.agree(public, &mut shared)
                };
                let result = result
                    .map_err(Error::CryptoError)
                    .and_then(|_| self.engine.keys.set_pre_master(&shared));
                shared.zeroize();
                result?;
            }
        }

        self.engine.hash_handshake(handshake);
        self.engine.derive_keys()?;
        Ok(ServerState::KeyExchange)
    }

    fn receive_certificate_verify(&mut self, handshake: &Handshake) -> Result<ServerState, Error> {
        let (version, _) = self.engine.negotiated()?;
        let config = self.engine.config().clone();
        let provider = config.crypto_provider();

        let verify = parse_all(handshake.body(), |i| {
            CertificateVerify::parse(i, version.is_tls12())
        })?;
        let signed = verify.signed;
        if let Some(alg) = signed.algorithm {
            if !config.signature_algorithms().contains(&alg) {
                return Err(Error::UnsupportedSignatureAlgorithm);
            }
        }

        let leaf = self
            .engine
            .certificates
            .remote_leaf()
            .cloned()
            .ok_or(Error::CertificateNotFound)?;
        let hash = SignedHash::for_version(
            version,
            signed.algorithm,
            leaf.public_key().algorithm(),
            provider,
        )?;

        // The signature covers the transcript up to, not including, this message.
        let mut digest = Buf::new();
        hash.digest_transcript(&self.engine.transcript, &mut digest)?;
        signature::verify(leaf.public_key(), hash, &digest, signed.signature, provider).map_err(
            |e| match e {
                Error::SignatureVerificationError => Error::CertificateVerifyFailure,
                e => e,
            },
        )?;
        trace!("CertificateVerify signature verified");

        self.engine.hash_handshake(handshake);
        Ok(ServerState::CertificateVerify)
    }

    fn await_client_finished(&mut self) -> Result<Option<ServerState>, Error> {
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

    fn receive_finished(&mut self, handshake: &Handshake) -> Result<ServerState, Error> {
        if handshake.msg_type != MessageType::Finished {
            debug!("Unexpected {:?} instead of Finished", handshake.msg_type);
            return Err(Error::UnexpectedMessage);
        }

        let finished = parse_all(handshake.body(), Finished::parse)?;
        let expected = self.engine.verify_data(CLIENT_FINISHED)?;
        let ok: bool = expected[..].ct_eq(&finished.verify_data[..]).into();
        if !ok {
            return Err(Error::FinishedHashFailure);
        }

        // Our Finished covers the client's.
        self.engine.hash_handshake(handshake);
        self.engine.renegotiation.remote_verify_data = finished.verify_data;
        self.peer_ccs = false;

        Ok(ServerState::FinishHandshake)
    }

    fn send_finished(&mut self) -> Result<(), Error> {
        self.engine.send_change_cipher_spec()?;

        let verify_data = self.engine.verify_data(SERVER_FINISHED)?;
        self.engine.renegotiation.local_verify_data = verify_data;
        self.engine
            .create_handshake(MessageType::Finished, |body, _| {
                Finished::new(verify_data).serialize(body);
                Ok(())
            })?;

        self.engine.renegotiation.completed = true;
        self.engine.certificates.clear_remote();
        self.engine.enable_application_data();
        self.key_exchange = None;

        debug!("Handshake complete");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto;
    use crate::message::{CipherSuites, HandshakeHeader};

    const SERVER_RSA: &[u8] = include_bytes!("../../tests/fixtures/server_rsa.der");
    const SERVER_RSA_KEY: &[u8] = include_bytes!("../../tests/fixtures/server_rsa.key");

    fn server() -> Server {
        let mut server = Server::new(Arc::new(Config::default()));
        let provider = rust_crypto::default_provider();
        let cert = StoredCertificate::parse(SERVER_RSA, &provider)
            .and_then(|c| c.with_private_key(SERVER_RSA_KEY, &provider))
            .unwrap();
        server
            .engine_mut()
            .certificates
            .add(CertificateLocation::Local, Arc::new(cert), None)
            .unwrap();
        server
    }

    fn client_hello(
        version: ProtocolVersion,
        suites: &[CipherSuite],
        renegotiation_info: Option<&[u8]>,
    ) -> Vec<u8> {
        let provider = rust_crypto::default_provider();
        let random = Random::new(1_700_000_000, provider.secure_random).unwrap();
        let suites: CipherSuites = suites.iter().copied().collect();
        let mut hello = ClientHello::new(version, random, SessionId::empty(), None, suites);

        let mut ext = Buf::new();
        if let Some(data) = renegotiation_info {
            RenegotiationInfoExtension::new(&[data]).serialize(&mut ext);
            hello.push_extension(Extension::new(ExtensionType::RenegotiationInfo, &ext));
        }

        let mut body = Buf::new();
        hello.serialize(&mut body);
        let mut message = Buf::new();
        HandshakeHeader::new(MessageType::ClientHello, body.len()).serialize(&mut message);
        message.extend_from_slice(&body);
        record(&message)
    }

    fn record(fragment: &[u8]) -> Vec<u8> {
        let mut out = vec![22, 0x03, 0x01];
        out.extend_from_slice(&(fragment.len() as u16).to_be_bytes());
        out.extend_from_slice(fragment);
        out
    }

    fn drain(server: &mut Server) -> Vec<Buf> {
        let mut out = vec![];
        while let Some(r) = server.poll_output() {
            out.push(r);
        }
        out
    }

    #[test]
    fn accepts_client_hello() {
        let mut server = server();
        let input = client_hello(
            ProtocolVersion::TLS1_2,
            &[CipherSuite::RSA_WITH_AES_128_CBC_SHA256],
            Some(&[]),
        );
        server.handle_input(&input).unwrap();
        assert_eq!(server.state(), ServerState::HelloSent);
        assert!(server.engine().renegotiation.secure);

        // ServerHello, Certificate, ServerHelloDone
        let out = drain(&mut server);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0][0], 22);
        assert_eq!(out[0][5], 2);
        assert_eq!(out[1][5], 11);
        assert_eq!(&out[2][..], &[22, 0x03, 0x03, 0x00, 0x04, 14, 0, 0, 0]);
    }

    #[test]
    fn scsv_marks_secure_renegotiation() {
        let mut server = server();
        let input = client_hello(
            ProtocolVersion::TLS1_2,
            &[
                CipherSuite::RSA_WITH_AES_128_CBC_SHA,
                CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV,
            ],
            None,
        );
        server.handle_input(&input).unwrap();
        assert!(server.engine().renegotiation.secure);
    }

    #[test]
    fn only_unknown_suites() {
        let mut server = server();
        let input = client_hello(
            ProtocolVersion::TLS1_2,
            &[CipherSuite::Unknown(0x1234), CipherSuite::Unknown(0xABCD)],
            Some(&[]),
        );
        let r = server.handle_input(&input);
        assert!(matches!(r, Err(Error::NoSupportedCiphers)));
        assert_eq!(server.state(), ServerState::AlertSent);

        // The fatal alert and nothing else: no ServerHello.
        let out = drain(&mut server);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0][0], 21);
        assert_eq!(&out[0][5..], &[2, 40]);
    }

    #[test]
    fn suite_needing_missing_credentials_is_skipped() {
        // No EC certificate, so the ECDHE_ECDSA suite is passed over.
        let mut server = server();
        let input = client_hello(
            ProtocolVersion::TLS1_2,
            &[
                CipherSuite::ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
                CipherSuite::RSA_WITH_AES_256_CBC_SHA,
            ],
            Some(&[]),
        );
        server.handle_input(&input).unwrap();
        assert_eq!(
            server.engine().cipher_suite().unwrap().suite,
            CipherSuite::RSA_WITH_AES_256_CBC_SHA
        );
    }

    #[test]
    fn short_client_hello() {
        let mut server = server();
        let message = [1, 0, 0, 4, 0x03, 0x03, 0, 0];
        let r = server.handle_input(&record(&message));
        assert!(matches!(r, Err(Error::IncorrectMessageLength)));
    }

    #[test]
    fn inappropriate_fallback() {
        let mut server = server();
        let input = client_hello(
            ProtocolVersion::TLS1_1,
            &[
                CipherSuite::RSA_WITH_AES_128_CBC_SHA,
                CipherSuite::FALLBACK_SCSV,
            ],
            Some(&[]),
        );
        let r = server.handle_input(&input);
        assert!(matches!(r, Err(Error::InappropriateFallback)));
        let out = drain(&mut server);
        assert_eq!(&out[0][5..], &[2, 86]);
    }

    #[test]
    fn older_enabled_version_is_accepted() {
        let mut server = server();
        let input = client_hello(
            ProtocolVersion::TLS1_1,
            &[CipherSuite::RSA_WITH_AES_128_CBC_SHA],
            Some(&[]),
        );
        server.handle_input(&input).unwrap();
        assert_eq!(server.engine().version(), Some(ProtocolVersion::TLS1_1));
    }

    #[test]
    fn non_empty_initial_renegotiation_info() {
        let mut server = server();
        let input = client_hello(
            ProtocolVersion::TLS1_2,
            &[CipherSuite::RSA_WITH_AES_128_CBC_SHA],
            Some(&[7; 12]),
        );
        let r = server.handle_input(&input);
        assert!(matches!(r, Err(Error::RenegotiationExtensionError)));
    }

    #[test]
    fn renegotiation_with_wrong_verify_data() {
        let mut server = server();
        server.state = ServerState::HandshakeFinished;
        {
            let reneg = &mut server.engine_mut().renegotiation;
            reneg.secure = true;
            reneg.completed = true;
            reneg.remote_verify_data = [1; 12];
            reneg.local_verify_data = [2; 12];
        }

        let input = client_hello(
            ProtocolVersion::TLS1_2,
            &[CipherSuite::RSA_WITH_AES_128_CBC_SHA],
            Some(&[9; 12]),
        );
        let r = server.handle_input(&input);
        assert!(matches!(r, Err(Error::RenegotiationExtensionError)));
    }

    #[test]
    fn renegotiation_refused_when_disabled() {
        let config = Config::builder().renegotiation(false).build().unwrap();
        let mut server = Server::new(Arc::new(config));
        server.state = ServerState::HandshakeFinished;
        server.engine_mut().renegotiation.secure = true;
        server.engine_mut().renegotiation.completed = true;

        let input = client_hello(
            ProtocolVersion::TLS1_2,
            &[CipherSuite::RSA_WITH_AES_128_CBC_SHA],
            Some(&[0; 12]),
        );
        server.handle_input(&input).unwrap();
        assert_eq!(server.state(), ServerState::HandshakeFinished);

        // Warning level no_renegotiation
        let out = drain(&mut server);
        assert_eq!(&out[0][5..], &[1, 100]);
    }

    #[test]
    fn dtls_cookie_exchange() {
        let config = Config::builder().dtls(true).build().unwrap();
        let mut server = Server::new(Arc::new(config));
        let provider = rust_crypto::default_provider();
        let cert = StoredCertificate::parse(SERVER_RSA, &provider)
            .and_then(|c| c.with_private_key(SERVER_RSA_KEY, &provider))
            .unwrap();
        server
            .engine_mut()
            .certificates
            .add(CertificateLocation::Local, Arc::new(cert), None)
            .unwrap();

        let random = Random::new(1_700_000_000, provider.secure_random).unwrap();
        let hello_with = |cookie: Cookie| {
            let suites: CipherSuites = [CipherSuite::RSA_WITH_AES_128_CBC_SHA256]
                .into_iter()
                .collect();
            let mut hello = ClientHello::new(
                ProtocolVersion::DTLS1_2,
                random,
                SessionId::empty(),
                Some(cookie),
                suites,
            );
            hello.push_extension(Extension::new(ExtensionType::RenegotiationInfo, &[0]));
            let mut body = Buf::new();
            hello.serialize(&mut body);
            let mut message = Buf::new();
            HandshakeHeader::new(MessageType::ClientHello, body.len()).serialize(&mut message);
            message.extend_from_slice(&body);
            let mut out = vec![22, 0xFE, 0xFF];
            out.extend_from_slice(&(message.len() as u16).to_be_bytes());
            out.extend_from_slice(&message);
            out
        };

        server.handle_input(&hello_with(Cookie::empty())).unwrap();
        assert_eq!(server.state(), ServerState::SendHelloVerify);

        let out = drain(&mut server);
        assert_eq!(out.len(), 1);
        let hvr = parse_all(&out[0][9..], HelloVerifyRequest::parse).unwrap();
        assert_eq!(hvr.server_version, ProtocolVersion::DTLS1_0);

        server.handle_input(&hello_with(hvr.cookie)).unwrap();
        assert_eq!(server.state(), ServerState::HelloSent);
        assert_eq!(server.engine().version(), Some(ProtocolVersion::DTLS1_2));
    }
}
