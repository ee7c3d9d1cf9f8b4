use crate::ciphersuite::{lookup, CipherSuite, CipherSuiteInfo, EccState};
use crate::crypto::CryptoProvider;
use crate::handshake::version::{capability_table, VersionPolicy};
use crate::message::MAX_EXTENSIONS;
use crate::record::MAX_PLAINTEXT;
use crate::transcript::Transcript;
use crate::types::{NamedGroup, ProtocolVersion, SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::Error;

/// Smallest plaintext fragment we agree to send.
const MIN_RECORD_SIZE: usize = 512;

/// TLS configuration, shared by all sessions created from it.
#[derive(Debug, Clone)]
pub struct Config {
    dtls: bool,
    versions: Vec<ProtocolVersion>,
    version_override: Option<ProtocolVersion>,
    cipher_suites: Vec<&'static CipherSuiteInfo>,
    ecc: EccState,
    signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    renegotiation: bool,
    require_client_certificate: bool,
    server_name: Option<String>,
    psk_identity_hint: Option<Vec<u8>>,
    send_fallback_scsv: bool,
    max_extensions: usize,
    max_record_size: usize,
    crypto_provider: CryptoProvider,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            dtls: false,
            versions: None,
            version_override: None,
            cipher_suites: None,
            supported_groups: None,
            signature_algorithms: vec![
                SignatureAndHashAlgorithm::ECDSA_SHA256,
                SignatureAndHashAlgorithm::RSA_SHA256,
                SignatureAndHashAlgorithm::ECDSA_SHA1,
                SignatureAndHashAlgorithm::RSA_SHA1,
            ],
            renegotiation: true,
            require_client_certificate: false,
            server_name: None,
            psk_identity_hint: None,
            send_fallback_scsv: false,
            max_extensions: 12,
            max_record_size: MAX_PLAINTEXT,
            crypto_provider: None,
        }
    }

    /// Whether sessions speak DTLS versions and do the cookie exchange.
    #[inline(always)]
    pub fn dtls(&self) -> bool {
        self.dtls
    }

    /// Enabled protocol versions.
    #[inline(always)]
    pub fn versions(&self) -> &[ProtocolVersion] {
        &self.versions
    }

    /// Forced protocol version, if any.
    #[inline(always)]
    pub fn version_override(&self) -> Option<ProtocolVersion> {
        self.version_override
    }

    /// Version rules for a session made from this config.
    pub fn version_policy(&self, override_version: Option<ProtocolVersion>) -> VersionPolicy<'_> {
        VersionPolicy::new(
            capability_table(self.dtls),
            &self.versions,
            override_version.or(self.version_override),
        )
    }

    /// Cipher suites in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[&'static CipherSuiteInfo] {
        &self.cipher_suites
    }

    /// Supported groups and their curves.
    #[inline(always)]
    pub fn ecc(&self) -> &EccState {
        &self.ecc
    }

    /// Signature algorithms advertised and used for TLS 1.2 signatures.
    #[inline(always)]
    pub fn signature_algorithms(&self) -> &[SignatureAndHashAlgorithm] {
        &self.signature_algorithms
    }

    /// Whether secure renegotiation is allowed.
    #[inline(always)]
    pub fn renegotiation(&self) -> bool {
        self.renegotiation
    }

    /// For a server, request and require a client certificate.
    #[inline(always)]
    pub fn require_client_certificate(&self) -> bool {
        self.require_client_certificate
    }

    /// For a client, the host name sent in server_name.
    #[inline(always)]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// For a server, the PSK identity hint sent in ServerKeyExchange.
    #[inline(always)]
    pub fn psk_identity_hint(&self) -> Option<&[u8]> {
        self.psk_identity_hint.as_deref()
    }

    /// For a client, whether to add TLS_FALLBACK_SCSV to ClientHello.
    #[inline(always)]
    pub fn send_fallback_scsv(&self) -> bool {
        self.send_fallback_scsv
    }

    /// Hello extensions parsed per message, the rest are skipped.
    #[inline(always)]
    pub fn max_extensions(&self) -> usize {
        self.max_extensions
    }

    /// Largest plaintext fragment sent in one record.
    #[inline(always)]
    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    dtls: bool,
    versions: Option<Vec<ProtocolVersion>>,
    version_override: Option<ProtocolVersion>,
    cipher_suites: Option<Vec<CipherSuite>>,
    supported_groups: Option<Vec<NamedGroup>>,
    signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    renegotiation: bool,
    require_client_certificate: bool,
    server_name: Option<String>,
    psk_identity_hint: Option<Vec<u8>>,
    send_fallback_scsv: bool,
    max_extensions: usize,
    max_record_size: usize,
    crypto_provider: Option<CryptoProvider>,
}

impl ConfigBuilder {
    /// Use DTLS versions and the HelloVerifyRequest cookie exchange.
    ///
    /// Defaults to false.
    pub fn dtls(mut self, dtls: bool) -> Self {
        self.dtls = dtls;
        self
    }

    /// Set the enabled protocol versions.
    ///
    /// Defaults to TLS 1.0, 1.1 and 1.2 (DTLS 1.0 and 1.2 with `dtls`).
    pub fn versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.versions = Some(versions.to_vec());
        self
    }

    /// Force one protocol version. Offered by clients and the only one
    /// servers accept.
    ///
    /// Defaults to none.
    pub fn version_override(mut self, version: ProtocolVersion) -> Self {
        self.version_override = Some(version);
        self
    }

    /// Restrict and order the cipher suites.
    ///
    /// Defaults to the provider's table in table order.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Set the supported groups, in preference order.
    ///
    /// Defaults to the provider's curves (secp256r1, secp384r1).
    pub fn supported_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.supported_groups = Some(groups.to_vec());
        self
    }

    /// Set the advertised signature algorithms, in preference order.
    ///
    /// Defaults to SHA-256 then SHA-1, ECDSA before RSA.
    pub fn signature_algorithms(mut self, algorithms: &[SignatureAndHashAlgorithm]) -> Self {
        self.signature_algorithms = algorithms.to_vec();
        self
    }

    /// Allow secure renegotiation.
    ///
    /// Defaults to true.
    pub fn renegotiation(mut self, enabled: bool) -> Self {
        self.renegotiation = enabled;
        self
    }

    /// Set whether to require a client certificate (for servers).
    ///
    /// This will cause the server to send a CertificateRequest message.
    /// Defaults to false.
    pub fn require_client_certificate(mut self, require: bool) -> Self {
        self.require_client_certificate = require;
        self
    }

    /// Host name for the server_name extension (for clients).
    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = Some(name.to_string());
        self
    }

    /// PSK identity hint (for servers).
    pub fn psk_identity_hint(mut self, hint: &[u8]) -> Self {
        self.psk_identity_hint = Some(hint.to_vec());
        self
    }

    /// Signal a fallback connection with TLS_FALLBACK_SCSV (for clients).
    ///
    /// Defaults to false.
    pub fn send_fallback_scsv(mut self, send: bool) -> Self {
        self.send_fallback_scsv = send;
        self
    }

    /// Bound the hello extensions parsed per message.
    ///
    /// Defaults to 12.
    pub fn max_extensions(mut self, max: usize) -> Self {
        self.max_extensions = max;
        self
    }

    /// Largest plaintext fragment sent in one record.
    ///
    /// Defaults to 16384.
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the installed default is used, else
    /// [`rust_crypto::default_provider`](crate::crypto::rust_crypto::default_provider).
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Build the configuration.
    ///
    /// Validates the crypto provider and every setting against it. Returns
    /// `Error::ConfigError` if anything does not fit.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(crate::crypto::rust_crypto::default_provider);

        crypto_provider.validate()?;

        let table = capability_table(self.dtls);
        let versions = match self.versions {
            Some(v) => v,
            None => table
                .iter()
                .filter(|c| c.enabled)
                .map(|c| c.version)
                .collect(),
        };
        if versions.is_empty() {
            return Err(config_error("no protocol versions enabled"));
        }
        for v in versions.iter().chain(self.version_override.iter()) {
            if !table.iter().any(|c| c.version == *v && c.enabled) {
                return Err(config_error(&format!("version {} not supported", v)));
            }
        }

        let cipher_suites = match self.cipher_suites {
            Some(suites) => suites
                .iter()
                .map(|s| {
                    lookup(crypto_provider.cipher_suites, *s)
                        .map_err(|_| config_error(&format!("cipher suite {} not in provider", s)))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => crypto_provider.cipher_suites.iter().collect(),
        };
        if cipher_suites.is_empty() {
            return Err(config_error("no cipher suites"));
        }

        let groups = match self.supported_groups {
            Some(g) => g,
            None => crypto_provider.curves.iter().map(|c| c.group()).collect(),
        };
        let ecc = EccState::new(&groups, &crypto_provider)
            .map_err(|_| config_error("supported group without a curve"))?;

        for alg in &self.signature_algorithms {
            let signs = matches!(alg.signature, SignatureAlgorithm::RSA | SignatureAlgorithm::ECDSA);
            if !signs || !Transcript::can_snapshot(alg.hash) {
                return Err(config_error(&format!("signature algorithm {:?} not supported", alg)));
            }
        }

        if self.max_extensions == 0 || self.max_extensions > MAX_EXTENSIONS {
            return Err(config_error("max_extensions out of range"));
        }
        if !(MIN_RECORD_SIZE..=MAX_PLAINTEXT).contains(&self.max_record_size) {
            return Err(config_error("max_record_size out of range"));
        }
        if let Some(name) = &self.server_name {
            if name.is_empty() || name.len() > 255 {
                return Err(config_error("server_name length"));
            }
        }

        Ok(Config {
            dtls: self.dtls,
            versions,
            version_override: self.version_override,
            cipher_suites,
            ecc,
            signature_algorithms: self.signature_algorithms,
            renegotiation: self.renegotiation,
            require_client_certificate: self.require_client_certificate,
            server_name: self.server_name,
            psk_identity_hint: self.psk_identity_hint,
            send_fallback_scsv: self.send_fallback_scsv,
            max_extensions: self.max_extensions,
            max_record_size: self.max_record_size,
            crypto_provider,
        })
    }
}

fn config_error(msg: &str) -> Error {
    Error::ConfigError(msg.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
