mod common;
mod failures;
mod handshake;
mod renegotiation;
