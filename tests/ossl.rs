//! emtls client against an OpenSSL server over TCP.

#![allow(unused)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use emtls::store::CertificateLocation;
use emtls::{CipherSuite, Config, ProtocolVersion, Role, Session, WaitOption};
use openssl::pkey::PKey;
use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode, SslVersion};
use openssl::x509::X509;

const WAIT: WaitOption = WaitOption::Timeout(Duration::from_secs(10));

const CA_EC: &[u8] = include_bytes!("fixtures/ca_ec.der");
const CA_RSA: &[u8] = include_bytes!("fixtures/ca_rsa.der");
const SERVER_EC: (&[u8], &[u8]) = (
    include_bytes!("fixtures/server_ec.der"),
    include_bytes!("fixtures/server_ec.key"),
);
const SERVER_RSA: (&[u8], &[u8]) = (
    include_bytes!("fixtures/server_rsa.der"),
    include_bytes!("fixtures/server_rsa.key"),
);
const CLIENT_EC: (&[u8], &[u8]) = (
    include_bytes!("fixtures/client_ec.der"),
    include_bytes!("fixtures/client_ec.key"),
);

/// Start an OpenSSL TLS 1.2 server that answers one `ping` with `pong`.
/// With `client_ca` set, the client must present a certificate issued by it.
fn openssl_server(
    identity: (&[u8], &[u8]),
    client_ca: Option<&[u8]>,
) -> (u16, thread::JoinHandle<()>) {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    let cert = X509::from_der(identity.0).unwrap();
    let key = PKey::private_key_from_pkcs8(identity.1).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor
        .set_max_proto_version(Some(SslVersion::TLS1_2))
        .unwrap();
    if let Some(ca) = client_ca {
        acceptor
            .cert_store_mut()
            .add_cert(X509::from_der(ca).unwrap())
            .unwrap();
        acceptor.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
    }
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut stream = acceptor.accept(stream).unwrap();

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        stream.write_all(b"pong").unwrap();

        // close_notify from the client
        let n = stream.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0);
    });

    (port, handle)
}

fn connect(
    port: u16,
    suite: CipherSuite,
    trusted: &[u8],
    identity: Option<(&[u8], &[u8])>,
) -> Session {
    let config = Arc::new(
        Config::builder()
            .cipher_suites(&[suite])
            .server_name("server.emtls.test")
            .build()
            .unwrap(),
    );
    let mut session = Session::new(Role::Client, config);
    session
        .add_certificate(CertificateLocation::Trusted, trusted, None)
        .unwrap();
    if let Some((der, key)) = identity {
        session.add_local_certificate(der, key, None).unwrap();
    }

    let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    session.start(stream, WAIT).unwrap();
    session.send(b"ping", WAIT).unwrap();

    let mut buf = [0u8; 64];
    let n = session.receive(&mut buf, WAIT).unwrap();
    assert_eq!(&buf[..n], b"pong");

    session.end(WAIT).unwrap();
    session
}

#[test]
fn client_ossl_ecdhe_ecdsa() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
    let (port, server) = openssl_server(SERVER_EC, None);
    let session = connect(port, suite, CA_EC, None);
    server.join().unwrap();

    assert_eq!(session.cipher_suite(), Some(suite));
    assert_eq!(session.protocol_version(), Some(ProtocolVersion::TLS1_2));
    assert!(session.secure_renegotiation());
}

#[test]
fn client_ossl_ecdhe_rsa() {
    let _ = env_logger::try_init();

    let suite = CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256;
    let (port, server) = openssl_server(SERVER_RSA, None);
    let session = connect(port, suite, CA_RSA, None);
    server.join().unwrap();

    assert_eq!(session.cipher_suite(), Some(suite));
}

#[test]
fn client_ossl_client_certificate() {
    let _ = env_logger::try_init();

    for (suite, identity, ca) in [
        (
            CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            SERVER_EC,
            CA_EC,
        ),
        (
            CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            SERVER_RSA,
            CA_RSA,
        ),
    ] {
        let (port, server) = openssl_server(identity, Some(CA_EC));
        let session = connect(port, suite, ca, Some(CLIENT_EC));
        server.join().unwrap();

        assert_eq!(session.cipher_suite(), Some(suite));
    }
}
