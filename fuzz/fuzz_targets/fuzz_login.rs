#![no_main]

use std::sync::OnceLock;

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use otls::core::packet::InputPacket;
use otls::crypto::RsaDecryptor;
use otls::protocol::handshake::parse_header;
use otls::protocol::{LoginRequest, PacketKind};

static RSA: OnceLock<RsaDecryptor> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let rsa = RSA.get_or_init(|| {
        RsaDecryptor::from_pem(include_str!("../../keys/login.pem")).expect("bundled key")
    });

    let mut packet = InputPacket::new(Bytes::copy_from_slice(data));
    if let Ok(header) = parse_header(&mut packet) {
        if header.kind == PacketKind::Login {
            let _ = LoginRequest::parse(&mut packet, rsa);
        }
    }
});
