#![allow(unused)]

use std::sync::Arc;

use emtls::{CipherSuite, ClientState, Config, Error, ServerState, Session, SessionState};

use crate::common::*;

const SUITE: CipherSuite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;

fn sessions(server_config: Arc<Config>) -> (Session, Session) {
    (
        client(config(&[SUITE]), CA_EC),
        server(server_config, SERVER_EC),
    )
}

#[test]
fn client_renegotiates() {
    let _ = env_logger::try_init();

    let (client, server) = sessions(config(&[SUITE]));
    let (client, server) = run(
        client,
        server,
        |session, transport| {
            session.start(transport, WAIT).unwrap();
            session.renegotiate(WAIT).unwrap();
            assert_eq!(
                session.state(),
                SessionState::Client(ClientState::HandshakeFinished)
            );
            ping_after_handshake(session);
        },
        // The server handles the new handshake while waiting for data.
        pong,
    );

    assert_eq!(client.cipher_suite(), Some(SUITE));
    assert!(server.secure_renegotiation());
}

#[test]
fn server_renegotiates() {
    let _ = env_logger::try_init();

    let (client, server) = sessions(config(&[SUITE]));
    run(
        client,
        server,
        |session, transport| {
            session.start(transport, WAIT).unwrap();

            // The HelloRequest shows up while receiving.
            let mut buf = [0u8; 64];
            let n = session.receive(&mut buf, WAIT).unwrap();
            assert_eq!(&buf[..n], b"renegotiated");
            assert_eq!(
                session.state(),
                SessionState::Client(ClientState::HandshakeFinished)
            );
            session.end(WAIT).unwrap();
        },
        |session, transport| {
            session.start(transport, WAIT).unwrap();
            session.renegotiate(WAIT).unwrap();
            session.send(b"renegotiated", WAIT).unwrap();

            let mut buf = [0u8; 64];
            let r = session.receive(&mut buf, WAIT);
            assert!(matches!(r, Err(Error::ConnectionClosed)), "{:?}", r);
        },
    );
}

#[test]
fn server_refuses_renegotiation() {
    let _ = env_logger::try_init();

    let server_config = Arc::new(
        Config::builder()
            .cipher_suites(&[SUITE])
            .renegotiation(false)
            .build()
            .unwrap(),
    );
    let (client, server) = sessions(server_config);

    run(
        client,
        server,
        |session, transport| {
            session.start(transport, WAIT).unwrap();

            let r = session.renegotiate(WAIT);
            assert!(matches!(r, Err(Error::NoRenegotiation)), "{:?}", r);
            assert_eq!(
                session.state(),
                SessionState::Client(ClientState::HandshakeFinished)
            );

            // The connection carries on with the old keys.
            ping_after_handshake(session);
        },
        pong,
    );
}

#[test]
fn renegotiation_callback_refuses() {
    let _ = env_logger::try_init();

    let (client, mut server) = sessions(config(&[SUITE]));
    server.set_renegotiation_callback(|| Err(Error::NoRenegotiation));

    run(
        client,
        server,
        |session, transport| {
            session.start(transport, WAIT).unwrap();
            let r = session.renegotiate(WAIT);
            assert!(matches!(r, Err(Error::NoRenegotiation)), "{:?}", r);
            ping_after_handshake(session);
        },
        pong,
    );
}

#[test]
fn server_renegotiate_disabled_locally() {
    let _ = env_logger::try_init();

    let server_config = Arc::new(
        Config::builder()
            .cipher_suites(&[SUITE])
            .renegotiation(false)
            .build()
            .unwrap(),
    );
    let (client, server) = sessions(server_config);

    run(client, server, ping, |session, transport| {
        session.start(transport, WAIT).unwrap();
        let r = session.renegotiate(WAIT);
        assert!(matches!(r, Err(Error::NoRenegotiation)), "{:?}", r);
        assert_eq!(
            session.state(),
            SessionState::Server(ServerState::HandshakeFinished)
        );

        let mut buf = [0u8; 64];
        let n = session.receive(&mut buf, WAIT).unwrap();
        assert_eq!(&buf[..n], b"ping");
        session.send(b"pong", WAIT).unwrap();
        let r = session.receive(&mut buf, WAIT);
        assert!(matches!(r, Err(Error::ConnectionClosed)), "{:?}", r);
    });
}

fn ping_after_handshake(session: &mut Session) {
    session.send(b"ping", WAIT).unwrap();

    let mut buf = [0u8; 64];
    let n = session.receive(&mut buf, WAIT).unwrap();
    assert_eq!(&buf[..n], b"pong");

    session.end(WAIT).unwrap();
}
