//! Protocol version capability table and negotiation.

use crate::types::ProtocolVersion;
use crate::Error;

/// One row of the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCapability {
    pub version: ProtocolVersion,
    pub enabled: bool,
}

const fn row(version: ProtocolVersion, enabled: bool) -> VersionCapability {
    VersionCapability { version, enabled }
}

/// Newest first.
static TLS_VERSIONS: &[VersionCapability] = &[
    row(ProtocolVersion::TLS1_2, true),
    row(ProtocolVersion::TLS1_1, true),
    row(ProtocolVersion::TLS1_0, true),
    row(ProtocolVersion::SSL3_0, false),
];

static DTLS_VERSIONS: &[VersionCapability] = &[
    row(ProtocolVersion::DTLS1_2, true),
    row(ProtocolVersion::DTLS1_0, true),
];

/// The fixed, newest first, list of versions the engine knows about.
pub fn capability_table(dtls: bool) -> &'static [VersionCapability] {
    if dtls {
        DTLS_VERSIONS
    } else {
        TLS_VERSIONS
    }
}

/// Whether `a` is a newer protocol than `b`.
///
/// DTLS counts down from 0xFEFF, so its ordering is reversed.
fn is_newer(a: ProtocolVersion, b: ProtocolVersion, dtls: bool) -> bool {
    if dtls {
        a.as_u16() < b.as_u16()
    } else {
        a.as_u16() > b.as_u16()
    }
}

/// Version decisions for one session: the capability table, the versions
/// the configuration enables, and an optional override which always wins.
#[derive(Debug, Clone, Copy)]
pub struct VersionPolicy<'a> {
    table: &'static [VersionCapability],
    enabled: &'a [ProtocolVersion],
    override_version: Option<ProtocolVersion>,
}

impl<'a> VersionPolicy<'a> {
    pub fn new(
        table: &'static [VersionCapability],
        enabled: &'a [ProtocolVersion],
        override_version: Option<ProtocolVersion>,
    ) -> Self {
        VersionPolicy {
            table,
            enabled,
            override_version,
        }
    }

    fn dtls(&self) -> bool {
        self.table.first().map(|c| c.version.is_dtls()).unwrap_or(false)
    }

    fn is_enabled(&self, version: ProtocolVersion) -> bool {
        self.table
            .iter()
            .any(|c| c.version == version && c.enabled)
            && self.enabled.contains(&version)
    }

    /// The newest version we are willing to speak.
    pub fn newest(&self) -> Option<ProtocolVersion> {
        if let Some(v) = self.override_version {
            return Some(v);
        }
        self.table
            .iter()
            .map(|c| c.version)
            .find(|v| self.is_enabled(*v))
    }

    /// The version a client puts in its ClientHello.
    pub fn client_offer(&self) -> Result<ProtocolVersion, Error> {
        self.newest().ok_or(Error::UnsupportedTlsVersion)
    }

    /// Validate a version seen on the wire.
    ///
    /// Once a version is negotiated nothing else is accepted. With an
    /// override only the override is. Otherwise the version must be a known
    /// and enabled table entry.
    pub fn check(
        &self,
        version: ProtocolVersion,
        negotiated: Option<ProtocolVersion>,
    ) -> Result<(), Error> {
        if let Some(n) = negotiated {
            if n != version {
                return Err(Error::ProtocolVersionChanged);
            }
            return Ok(());
        }

        if let Some(v) = self.override_version {
            if v != version {
                return Err(Error::UnsupportedTlsVersion);
            }
            return Ok(());
        }

        if !self.table.iter().any(|c| c.version == version) {
            return Err(Error::UnknownTlsVersion);
        }
        if !self.is_enabled(version) {
            return Err(Error::UnsupportedTlsVersion);
        }
        Ok(())
    }

    /// Pick the version a server answers `client_version` with.
    ///
    /// An enabled client version is accepted as is. Any other known version,
    /// or one newer than we speak, gets our newest (the override when set)
    /// and the client decides whether it can live with that.
    pub fn negotiate_server(&self, client_version: ProtocolVersion) -> Result<ProtocolVersion, Error> {
        if self.override_version.is_none() && self.is_enabled(client_version) {
            return Ok(client_version);
        }

        let newest = self.newest().ok_or(Error::UnsupportedTlsVersion)?;
        let known = self.table.iter().any(|c| c.version == client_version);
        if known
            || self.override_version.is_some()
            || is_newer(client_version, newest, self.dtls())
        {
            return Ok(newest);
        }

        Err(Error::UnknownTlsVersion)
    }

    /// RFC 7507: a fallback ClientHello below our newest version means the
    /// client was pushed down by an attacker.
    pub fn is_fallback_inappropriate(&self, client_version: ProtocolVersion) -> bool {
        match self.newest() {
            Some(newest) => is_newer(newest, client_version, self.dtls()),
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL_TLS: &[ProtocolVersion] = &[
        ProtocolVersion::TLS1_2,
        ProtocolVersion::TLS1_1,
        ProtocolVersion::TLS1_0,
    ];

    fn policy(enabled: &[ProtocolVersion], o: Option<ProtocolVersion>) -> VersionPolicy<'_> {
        VersionPolicy::new(capability_table(false), enabled, o)
    }

    #[test]
    fn newest_is_first_enabled_row() {
        assert_eq!(policy(ALL_TLS, None).newest(), Some(ProtocolVersion::TLS1_2));
        assert_eq!(
            policy(&[ProtocolVersion::TLS1_0, ProtocolVersion::TLS1_1], None).newest(),
            Some(ProtocolVersion::TLS1_1)
        );
        assert_eq!(
            policy(ALL_TLS, Some(ProtocolVersion::TLS1_0)).newest(),
            Some(ProtocolVersion::TLS1_0)
        );
    }

    #[test]
    fn check_versions() {
        let p = policy(ALL_TLS, None);
        assert!(p.check(ProtocolVersion::TLS1_1, None).is_ok());
        assert!(matches!(
            p.check(ProtocolVersion::SSL3_0, None),
            Err(Error::UnsupportedTlsVersion)
        ));
        assert!(matches!(
            p.check(ProtocolVersion::Unknown(0x0304), None),
            Err(Error::UnknownTlsVersion)
        ));
        assert!(matches!(
            p.check(ProtocolVersion::TLS1_1, Some(ProtocolVersion::TLS1_2)),
            Err(Error::ProtocolVersionChanged)
        ));

        let o = policy(ALL_TLS, Some(ProtocolVersion::TLS1_1));
        assert!(o.check(ProtocolVersion::TLS1_1, None).is_ok());
        assert!(matches!(
            o.check(ProtocolVersion::TLS1_2, None),
            Err(Error::UnsupportedTlsVersion)
        ));
    }

    #[test]
    fn server_negotiation() {
        let p = policy(ALL_TLS, None);
        assert_eq!(
            p.negotiate_server(ProtocolVersion::TLS1_1).unwrap(),
            ProtocolVersion::TLS1_1
        );
        // A TLS 1.3 ClientHello version falls back to our newest.
        assert_eq!(
            p.negotiate_server(ProtocolVersion::Unknown(0x0304)).unwrap(),
            ProtocolVersion::TLS1_2
        );
        // Known but disabled: answer with our newest.
        assert_eq!(
            p.negotiate_server(ProtocolVersion::SSL3_0).unwrap(),
            ProtocolVersion::TLS1_2
        );
        assert!(matches!(
            p.negotiate_server(ProtocolVersion::Unknown(0x0200)),
            Err(Error::UnknownTlsVersion)
        ));

        let newer = policy(&[ProtocolVersion::TLS1_2, ProtocolVersion::TLS1_1], None);
        assert_eq!(
            newer.negotiate_server(ProtocolVersion::TLS1_0).unwrap(),
            ProtocolVersion::TLS1_2
        );

        let o = policy(ALL_TLS, Some(ProtocolVersion::TLS1_1));
        assert_eq!(
            o.negotiate_server(ProtocolVersion::TLS1_2).unwrap(),
            ProtocolVersion::TLS1_1
        );
        assert_eq!(
            o.negotiate_server(ProtocolVersion::TLS1_0).unwrap(),
            ProtocolVersion::TLS1_1
        );
    }

    #[test]
    fn nothing_enabled() {
        let p = policy(&[], None);
        assert!(matches!(
            p.negotiate_server(ProtocolVersion::TLS1_2),
            Err(Error::UnsupportedTlsVersion)
        ));
    }

    #[test]
    fn dtls_ordering_is_reversed() {
        let enabled = [ProtocolVersion::DTLS1_2, ProtocolVersion::DTLS1_0];
        let p = VersionPolicy::new(capability_table(true), &enabled, None);
        assert_eq!(p.newest(), Some(ProtocolVersion::DTLS1_2));
        assert!(p.is_fallback_inappropriate(ProtocolVersion::DTLS1_0));
        assert!(!p.is_fallback_inappropriate(ProtocolVersion::DTLS1_2));
        assert_eq!(
            p.negotiate_server(ProtocolVersion::DTLS1_0).unwrap(),
            ProtocolVersion::DTLS1_0
        );
    }

    #[test]
    fn fallback_detection() {
        let p = policy(ALL_TLS, None);
        assert!(p.is_fallback_inappropriate(ProtocolVersion::TLS1_1));
        assert!(!p.is_fallback_inappropriate(ProtocolVersion::TLS1_2));
    }
}
