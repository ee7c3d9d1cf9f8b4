//! Shared helpers for session integration tests.

#![allow(unused)]

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use emtls::store::CertificateLocation;
use emtls::{CipherSuite, Config, Error, Role, Session, Transport, WaitOption};

/// Long enough for a debug build RSA handshake, short enough to fail a
/// stuck test.
pub const WAIT: WaitOption = WaitOption::Timeout(Duration::from_secs(10));

pub const CA_RSA: &[u8] = include_bytes!("../fixtures/ca_rsa.der");
pub const CA_EC: &[u8] = include_bytes!("../fixtures/ca_ec.der");
pub const SERVER_RSA: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/server_rsa.der"),
    include_bytes!("../fixtures/server_rsa.key"),
);
pub const SERVER_EC: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/server_ec.der"),
    include_bytes!("../fixtures/server_ec.key"),
);
pub const SERVER_EC384: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/server_ec384.der"),
    include_bytes!("../fixtures/server_ec384.key"),
);
/// EC key, signed by the RSA CA.
pub const SERVER_EC_RSA: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/server_ec_rsa.der"),
    include_bytes!("../fixtures/server_ec_rsa.key"),
);
pub const CLIENT_RSA: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/client_rsa.der"),
    include_bytes!("../fixtures/client_rsa.key"),
);
pub const CLIENT_EC: (&[u8], &[u8]) = (
    include_bytes!("../fixtures/client_ec.der"),
    include_bytes!("../fixtures/client_ec.key"),
);

pub const PSK: &[u8] = &[0x1f; 16];
pub const PSK_IDENTITY: &[u8] = b"device-17";

/// One end of an in-memory byte stream.
pub struct Pipe {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    coalesce: bool,
}

impl Pipe {
    /// Hand over everything queued so far in one read, so several records
    /// arrive together.
    pub fn coalescing(mut self) -> Pipe {
        self.coalesce = true;
        self
    }
}

/// Two connected ends.
pub fn pipe() -> (Pipe, Pipe) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        Pipe {
            tx: a_tx,
            rx: a_rx,
            pending: VecDeque::new(),
            coalesce: false,
        },
        Pipe {
            tx: b_tx,
            rx: b_rx,
            pending: VecDeque::new(),
            coalesce: false,
        },
    )
}

impl Transport for Pipe {
    fn send(&mut self, data: &[u8], _wait: WaitOption) -> io::Result<()> {
        // A peer that went away reads as closed on our next receive.
        let _ = self.tx.send(data.to_vec());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], wait: WaitOption) -> io::Result<usize> {
        if self.pending.is_empty() {
            let chunk = match wait {
                WaitOption::Forever => self.rx.recv().ok(),
                WaitOption::Timeout(d) => match self.rx.recv_timeout(d) {
                    Ok(c) => Some(c),
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(io::ErrorKind::TimedOut.into());
                    }
                    Err(RecvTimeoutError::Disconnected) => None,
                },
                WaitOption::NoWait => match self.rx.try_recv() {
                    Ok(c) => Some(c),
                    Err(TryRecvError::Empty) => return Err(io::ErrorKind::WouldBlock.into()),
                    Err(TryRecvError::Disconnected) => None,
                },
            };
            match chunk {
                Some(c) => self.pending.extend(c),
                None => return Ok(0),
            }
            if self.coalesce {
                while let Ok(c) = self.rx.try_recv() {
                    self.pending.extend(c);
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        for (b, p) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *b = p;
        }
        Ok(n)
    }
}

pub fn config(suites: &[CipherSuite]) -> Arc<Config> {
    Arc::new(
        Config::builder()
            .cipher_suites(suites)
            .build()
            .expect("Failed to build config"),
    )
}

pub fn client(config: Arc<Config>, trusted: &[u8]) -> Session {
    let mut session = Session::new(Role::Client, config);
    session
        .add_certificate(CertificateLocation::Trusted, trusted, None)
        .expect("trusted certificate");
    session
}

pub fn server(config: Arc<Config>, identity: (&[u8], &[u8])) -> Session {
    let mut session = Session::new(Role::Server, config);
    session
        .add_local_certificate(identity.0, identity.1, None)
        .expect("server certificate");
    session
}

/// Run the server side on its own thread and the client here.
///
/// Each side gets its session and transport and returns the session so
/// the test can look at the final state.
pub fn run<C, S>(client: Session, server: Session, client_fn: C, server_fn: S) -> (Session, Session)
where
    C: FnOnce(&mut Session, Pipe) + Send + 'static,
    S: FnOnce(&mut Session, Pipe) + Send + 'static,
{
    let (client_end, server_end) = pipe();

    let server_thread = thread::spawn(move || {
        let mut server = server;
        server_fn(&mut server, server_end);
        server
    });

    let mut client = client;
    client_fn(&mut client, client_end);

    let server = server_thread.join().expect("server thread panicked");
    (client, server)
}

/// Client: handshake, send `ping`, expect `pong`, close.
pub fn ping(session: &mut Session, transport: Pipe) {
    session.start(transport, WAIT).expect("client handshake");
    session.send(b"ping", WAIT).expect("send ping");

    let mut buf = [0u8; 64];
    let n = session.receive(&mut buf, WAIT).expect("receive pong");
    assert_eq!(&buf[..n], b"pong");

    session.end(WAIT).expect("close");
}

/// Server: handshake, answer `ping` with `pong`, wait for close_notify.
pub fn pong(session: &mut Session, transport: Pipe) {
    session.start(transport, WAIT).expect("server handshake");

    let mut buf = [0u8; 64];
    let n = session.receive(&mut buf, WAIT).expect("receive ping");
    assert_eq!(&buf[..n], b"ping");
    session.send(b"pong", WAIT).expect("send pong");

    let r = session.receive(&mut buf, WAIT);
    assert!(matches!(r, Err(Error::ConnectionClosed)), "{:?}", r);
}

/// Full ping/pong exchange, returning both finished sessions.
pub fn ping_pong(client: Session, server: Session) -> (Session, Session) {
    run(client, server, ping, pong)
}
