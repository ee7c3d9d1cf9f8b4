#![allow(unused)]

use std::sync::Arc;

use emtls::certificate::{CertificateAuthority, KeyType};
use emtls::store::CertificateLocation;
use emtls::{CipherSuite, Config, ProtocolVersion, Role, Session, SessionState};
use emtls::{ClientState, ServerState};

use crate::common::*;

fn assert_finished(client: &Session, server: &Session, suite: CipherSuite) {
    assert_eq!(
        client.state(),
        SessionState::Client(ClientState::HandshakeFinished)
    );
    assert_eq!(
        server.state(),
        SessionState::Server(ServerState::HandshakeFinished)
    );
    assert_eq!(client.cipher_suite(), Some(suite));
    assert_eq!(server.cipher_suite(), Some(suite));
}

fn rsa_suite(suite: CipherSuite) {
    let _ = env_logger::try_init();

    let (client, server) = ping_pong(
        client(config(&[suite]), CA_RSA),
        server(config(&[suite]), SERVER_RSA),
    );

    assert_finished(&client, &server, suite);
    assert_eq!(client.protocol_version(), Some(ProtocolVersion::TLS1_2));
    assert!(client.secure_renegotiation());
    assert!(server.secure_renegotiation());
}

#[test]
fn rsa_aes_128_cbc_sha() {
    rsa_suite(CipherSuite::RSA_WITH_AES_128_CBC_SHA);
}

#[test]
fn rsa_aes_256_cbc_sha256() {
    rsa_suite(CipherSuite::RSA_WITH_AES_256_CBC_SHA256);
}

#[test]
fn rsa_aes_128_gcm_sha256() {
    rsa_suite(CipherSuite::RSA_WITH_AES_128_GCM_SHA256);
}

#[test]
fn rsa_null_sha() {
    rsa_suite(CipherSuite::RSA_WITH_NULL_SHA);
}

#[test]
fn older_versions_use_cbc_sha() {
    let _ = env_logger::try_init();

    for version in [ProtocolVersion::TLS1_0, ProtocolVersion::TLS1_1] {
        let suite = CipherSuite::RSA_WITH_AES_128_CBC_SHA;
        let client_config = Arc::new(
            Config::builder()
                .versions(&[version])
                .cipher_suites(&[suite])
                .build()
                .unwrap(),
        );

        let (client, server) = ping_pong(
            client(client_config, CA_RSA),
            server(config(&[suite]), SERVER_RSA),
        );

        assert_finished(&client, &server, suite);
        assert_eq!(client.protocol_version(), Some(version));
        assert_eq!(server.protocol_version(), Some(version));
    }
}

#[test]
fn version_override_pins_version() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::RSA_WITH_AES_128_CBC_SHA;
    let mut client = client(config(&[suite]), CA_RSA);
    client.set_version_override(ProtocolVersion::TLS1_1).unwrap();

    let (client, server) = ping_pong(client, server(config(&[suite]), SERVER_RSA));
    assert_eq!(server.protocol_version(), Some(ProtocolVersion::TLS1_1));
}

#[test]
fn psk_with_identity_hint() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::PSK_WITH_AES_128_CBC_SHA256;
    let mut client = Session::new(Role::Client, config(&[suite]));
    client.add_psk(PSK, PSK_IDENTITY, b"").unwrap();

    let server_config = Arc::new(
        Config::builder()
            .cipher_suites(&[suite])
            .psk_identity_hint(b"hint")
            .build()
            .unwrap(),
    );
    let mut server = Session::new(Role::Server, server_config);
    server.add_psk(PSK, PSK_IDENTITY, b"").unwrap();

    let (client, server) = ping_pong(client, server);
    assert_finished(&client, &server, suite);
}

#[test]
fn psk_gcm() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::PSK_WITH_AES_128_GCM_SHA256;
    let mut client = Session::new(Role::Client, config(&[suite]));
    client.add_psk(PSK, PSK_IDENTITY, b"").unwrap();
    let mut server = Session::new(Role::Server, config(&[suite]));
    server.add_psk(PSK, PSK_IDENTITY, b"").unwrap();

    let (client, server) = ping_pong(client, server);
    assert_finished(&client, &server, suite);
}

#[test]
fn ecdhe_ecdsa() {
    let _ = env_logger::try_init();

    for suite in [
        CipherSuite::ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
        CipherSuite::ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
        CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    ] {
        let (client, server) = ping_pong(
            client(config(&[suite]), CA_EC),
            server(config(&[suite]), SERVER_EC),
        );
        assert_finished(&client, &server, suite);
    }
}

#[test]
fn ecdhe_ecdsa_p384_identity() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_256_CBC_SHA;
    let (client, server) = ping_pong(
        client(config(&[suite]), CA_EC),
        server(config(&[suite]), SERVER_EC384),
    );
    assert_finished(&client, &server, suite);
}

#[test]
fn ecdhe_rsa() {
    let _ = env_logger::try_init();

    for suite in [
        CipherSuite::ECDHE_RSA_WITH_AES_128_CBC_SHA,
        CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ] {
        let (client, server) = ping_pong(
            client(config(&[suite]), CA_RSA),
            server(config(&[suite]), SERVER_RSA),
        );
        assert_finished(&client, &server, suite);
    }
}

#[test]
fn static_ecdh_ecdsa() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDH_ECDSA_WITH_AES_128_CBC_SHA256;
    let (client, server) = ping_pong(
        client(config(&[suite]), CA_EC),
        server(config(&[suite]), SERVER_EC),
    );
    assert_finished(&client, &server, suite);
}

#[test]
fn static_ecdh_rsa() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDH_RSA_WITH_AES_128_CBC_SHA;
    let (client, server) = ping_pong(
        client(config(&[suite]), CA_RSA),
        server(config(&[suite]), SERVER_EC_RSA),
    );
    assert_finished(&client, &server, suite);
}

#[test]
fn server_picks_first_usable_client_suite() {
    let _ = env_logger::try_init();

    // The RSA identity cannot serve the ECDSA suite listed first.
    let suites = [
        CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::RSA_WITH_AES_128_CBC_SHA,
    ];
    let (client, server) = ping_pong(
        client(config(&suites), CA_RSA),
        server(config(&suites), SERVER_RSA),
    );
    assert_finished(
        &client,
        &server,
        CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    );
}

#[test]
fn client_certificate() {
    let _ = env_logger::try_init();

    for (suite, server_identity, server_ca) in [
        (
            CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            SERVER_EC,
            CA_EC,
        ),
        (CipherSuite::RSA_WITH_AES_128_CBC_SHA256, SERVER_RSA, CA_RSA),
    ] {
        let mut client = client(config(&[suite]), server_ca);
        client
            .add_local_certificate(CLIENT_EC.0, CLIENT_EC.1, None)
            .unwrap();

        let server_config = Arc::new(
            Config::builder()
                .cipher_suites(&[suite])
                .require_client_certificate(true)
                .build()
                .unwrap(),
        );
        let mut server = server(server_config, server_identity);
        server
            .add_certificate(CertificateLocation::Trusted, CA_EC, None)
            .unwrap();

        let (client, server) = ping_pong(client, server);
        assert_finished(&client, &server, suite);
    }
}

#[test]
fn rsa_client_certificate() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_RSA_WITH_AES_128_CBC_SHA256;
    let mut client = client(config(&[suite]), CA_RSA);
    client
        .add_local_certificate(CLIENT_RSA.0, CLIENT_RSA.1, None)
        .unwrap();

    let server_config = Arc::new(
        Config::builder()
            .cipher_suites(&[suite])
            .require_client_certificate(true)
            .build()
            .unwrap(),
    );
    let mut server = server(server_config, SERVER_RSA);
    server
        .add_certificate(CertificateLocation::Trusted, CA_RSA, None)
        .unwrap();

    let (client, server) = ping_pong(client, server);
    assert_finished(&client, &server, suite);
}

#[test]
fn server_name_reaches_server() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    let client_config = Arc::new(
        Config::builder()
            .cipher_suites(&[suite])
            .server_name("server.emtls.test")
            .build()
            .unwrap(),
    );

    let (client, server) = ping_pong(
        client(client_config, CA_EC),
        server(config(&[suite]), SERVER_EC),
    );
    assert_eq!(server.server_name(), Some("server.emtls.test"));
    assert_eq!(client.server_name(), Some("server.emtls.test"));
}

#[test]
fn generated_certificates() {
    let _ = env_logger::try_init();

    let ca = CertificateAuthority::new("generated ca", KeyType::EcdsaP256).unwrap();
    let leaf = ca.issue("server.generated", KeyType::EcdsaP384).unwrap();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_CBC_SHA256;
    let (client, server) = ping_pong(
        client(config(&[suite]), ca.der()),
        server(
            config(&[suite]),
            (leaf.certificate.as_slice(), leaf.private_key.as_slice()),
        ),
    );
    assert_finished(&client, &server, suite);
}

#[test]
fn default_configuration() {
    let _ = env_logger::try_init();

    let (client, server) = ping_pong(
        client(Arc::new(Config::default()), CA_EC),
        server(Arc::new(Config::default()), SERVER_EC),
    );
    assert_finished(
        &client,
        &server,
        CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    );
}

#[test]
fn reset_and_run_again() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    let (mut client, mut server) = ping_pong(
        client(config(&[suite]), CA_EC),
        server(config(&[suite]), SERVER_EC),
    );

    client.reset();
    server.reset();
    assert_eq!(client.state(), SessionState::Client(ClientState::Idle));

    // Credentials survive a reset.
    let (client, server) = ping_pong(client, server);
    assert_finished(&client, &server, suite);
}
