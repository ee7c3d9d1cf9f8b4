#![allow(unused)]

use std::io;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use emtls::store::CertificateLocation;
use emtls::{AlertDescription, AlertLevel, CipherSuite, ClientState, Config, Error, ErrorClass};
use emtls::{ProtocolVersion, Role, ServerState, Session, SessionRegistry, SessionState};
use emtls::{Transport, WaitOption};

use crate::common::*;

fn expect_alert(description: AlertDescription) -> impl FnOnce(&mut Session, Pipe) {
    move |session: &mut Session, transport: Pipe| {
        let r = session.start(transport, WAIT);
        match r {
            Err(Error::AlertReceived(AlertLevel::Fatal, d)) => assert_eq!(d, description),
            r => panic!("expected {:?} alert, got {:?}", description, r),
        }
        assert!(session.state().is_failed());
    }
}

#[test]
fn no_shared_cipher_suite() {
    let _ = env_logger::try_init();

    let mut client = Session::new(
        Role::Client,
        config(&[CipherSuite::PSK_WITH_AES_128_CBC_SHA]),
    );
    client.add_psk(PSK, PSK_IDENTITY, b"").unwrap();

    // Knows the suite but has no key for it.
    let server = server(
        config(&[CipherSuite::PSK_WITH_AES_128_CBC_SHA]),
        SERVER_RSA,
    );

    let (_, server) = run(
        client,
        server,
        expect_alert(AlertDescription::HandshakeFailure),
        |session, transport| {
            let r = session.start(transport, WAIT);
            assert!(matches!(r, Err(Error::NoSupportedCiphers)), "{:?}", r);
            assert_eq!(r.unwrap_err().class(), ErrorClass::Protocol);
        },
    );
    assert_eq!(
        server.state(),
        SessionState::Server(ServerState::AlertSent)
    );
}

#[test]
fn fallback_scsv_rejected() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::RSA_WITH_AES_128_CBC_SHA;
    let client_config = Arc::new(
        Config::builder()
            .versions(&[ProtocolVersion::TLS1_1])
            .cipher_suites(&[suite])
            .send_fallback_scsv(true)
            .build()
            .unwrap(),
    );

    run(
        client(client_config, CA_RSA),
        server(config(&[suite]), SERVER_RSA),
        expect_alert(AlertDescription::InappropriateFallback),
        |session, transport| {
            let r = session.start(transport, WAIT);
            assert!(matches!(r, Err(Error::InappropriateFallback)), "{:?}", r);
        },
    );
}

#[test]
fn untrusted_server_certificate() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;

    // Trusts the RSA CA, but the server chains to the EC CA.
    run(
        client(config(&[suite]), CA_RSA),
        server(config(&[suite]), SERVER_EC),
        |session, transport| {
            let r = session.start(transport, WAIT);
            assert!(matches!(r, Err(Error::IssuerCertificateNotFound)), "{:?}", r);
            assert_eq!(
                session.state(),
                SessionState::Client(ClientState::AlertSent)
            );
        },
        expect_alert(AlertDescription::UnknownCa),
    );
}

#[test]
fn certificate_callback_rejects() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    let mut client = client(config(&[suite]), CA_EC);
    client.set_certificate_callback(|_| Err(Error::InvalidCertificate));

    run(
        client,
        server(config(&[suite]), SERVER_EC),
        |session, transport| {
            let r = session.start(transport, WAIT);
            assert!(matches!(r, Err(Error::InvalidCertificate)), "{:?}", r);
        },
        expect_alert(AlertDescription::BadCertificate),
    );
}

#[test]
fn missing_required_client_certificate() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    let server_config = Arc::new(
        Config::builder()
            .cipher_suites(&[suite])
            .require_client_certificate(true)
            .build()
            .unwrap(),
    );
    let mut server = server(server_config, SERVER_EC);
    server
        .add_certificate(CertificateLocation::Trusted, CA_EC, None)
        .unwrap();

    run(
        client(config(&[suite]), CA_EC),
        server,
        expect_alert(AlertDescription::HandshakeFailure),
        |session, transport| {
            let r = session.start(transport, WAIT);
            assert!(matches!(r, Err(Error::HandshakeFailure)), "{:?}", r);
        },
    );
}

#[test]
fn wrong_psk() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::PSK_WITH_AES_128_CBC_SHA256;
    let mut client = Session::new(Role::Client, config(&[suite]));
    client.add_psk(&[0x2e; 16], PSK_IDENTITY, b"").unwrap();
    let mut server = Session::new(Role::Server, config(&[suite]));
    server.add_psk(PSK, PSK_IDENTITY, b"").unwrap();

    // Different keys only show in the Finished check.
    run(
        client,
        server,
        |session, transport| {
            assert!(session.start(transport, WAIT).is_err());
            assert!(session.state().is_failed());
        },
        |session, transport| {
            assert!(session.start(transport, WAIT).is_err());
            assert!(session.state().is_failed());
        },
    );
}

#[test]
fn peer_goes_away() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    run(
        client(config(&[suite]), CA_EC),
        server(config(&[suite]), SERVER_EC),
        |session, transport| {
            let r = session.start(transport, WAIT);
            assert!(matches!(r, Err(Error::ConnectionClosed)), "{:?}", r);
        },
        |_, transport| drop(transport),
    );
}

#[test]
fn data_ahead_of_close_notify_is_delivered() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    // Passed twice: handshake done on both sides, then both records sent.
    let step = Arc::new(Barrier::new(2));
    let step_server = step.clone();

    run(
        client(config(&[suite]), CA_EC),
        server(config(&[suite]), SERVER_EC),
        move |session, transport| {
            session.start(transport.coalescing(), WAIT).unwrap();
            step.wait();
            step.wait();

            // "bye" and close_notify come in the same read.
            let mut buf = [0u8; 64];
            let n = session.receive(&mut buf, WAIT).unwrap();
            assert_eq!(&buf[..n], b"bye");

            let r = session.receive(&mut buf, WAIT);
            assert!(matches!(r, Err(Error::ConnectionClosed)), "{:?}", r);
        },
        move |session, transport| {
            session.start(transport, WAIT).unwrap();
            step_server.wait();
            session.send(b"bye", WAIT).unwrap();
            session.end(WAIT).unwrap();
            step_server.wait();
        },
    );
}

/// Accepts everything, never has anything to read.
struct Silent;

impl Transport for Silent {
    fn send(&mut self, _: &[u8], _: WaitOption) -> io::Result<()> {
        Ok(())
    }

    fn receive(&mut self, _: &mut [u8], _: WaitOption) -> io::Result<usize> {
        Err(io::ErrorKind::WouldBlock.into())
    }
}

#[test]
fn timeout_fails_handshake() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    let mut session = client(config(&[suite]), CA_EC);
    let r = session.start(Silent, WaitOption::Timeout(Duration::from_millis(10)));
    assert!(matches!(r, Err(Error::Transport(_))), "{:?}", r);
    assert!(session.state().is_failed());
}

#[test]
fn no_wait_leaves_handshake_pending() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    let mut session = client(config(&[suite]), CA_EC);
    let r = session.start(Silent, WaitOption::NoWait);
    assert!(matches!(r, Err(Error::Transport(_))), "{:?}", r);
    assert!(!session.state().is_failed());
}

#[test]
fn registry_handles_go_stale() {
    let _ = env_logger::try_init();

    let mut registry = SessionRegistry::new();
    let first = registry.insert(client(Arc::new(Config::default()), CA_EC));
    registry.remove(first).unwrap();

    let second = registry.insert(server(Arc::new(Config::default()), SERVER_EC));
    assert!(matches!(
        registry.get(first),
        Err(Error::InvalidSessionHandle)
    ));
    assert_eq!(registry.get(second).unwrap().role(), Role::Server);

    let removed = registry.remove_certificate(
        CertificateLocation::Local,
        emtls::store::CertificateKey::Subject(&[]),
    );
    assert_eq!(removed, 0);
}
