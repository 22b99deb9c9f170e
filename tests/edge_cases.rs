#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Boundary conditions and malformed input

mod common;

use bytes::{BufMut, Bytes, BytesMut};
use common::*;
use otls::core::codec::{FrameCodec, MAX_FRAME_SIZE};
use otls::core::packet::{InputPacket, OutputPacket, OUTPUT_CAPACITY};
use otls::crypto::{adler32, RSA_BLOCK_SIZE};
use otls::error::ProtocolError;
use otls::protocol::handshake::parse_header;
use otls::protocol::{LoginRequest, PacketKind};
use otls::utils::AddressKey;
use tokio_util::codec::Decoder;

fn peer() -> AddressKey {
    "203.0.113.9".parse().unwrap()
}

// ============================================================================
// FRAMING
// ============================================================================

#[test]
fn test_frame_at_maximum_size() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    buf.put_u16_le(MAX_FRAME_SIZE as u16);
    buf.put_slice(&vec![0xAB; MAX_FRAME_SIZE]);

    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.len(), MAX_FRAME_SIZE);
    assert!(buf.is_empty());
}

#[test]
fn test_frame_one_over_maximum() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    buf.put_u16_le((MAX_FRAME_SIZE + 1) as u16);

    match codec.decode(&mut buf) {
        Err(ProtocolError::FrameTooLarge(size)) => assert_eq!(size, MAX_FRAME_SIZE + 1),
        other => panic!("expected FrameTooLarge, got {other:?}"),
    }
}

#[test]
fn test_zero_length_frame() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(&[0u8, 0][..]);
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert!(frame.is_empty());
}

#[test]
fn test_partial_size_prefix_waits() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(&[0x05u8][..]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.put_slice(&[0x00, 0xFF, 0xFF]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.put_slice(&[1, 2, 3]);
    assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_ref(), &[0xFF, 0xFF, 1, 2, 3]);
}

// ============================================================================
// HEADER
// ============================================================================

#[test]
fn test_empty_frame_overflows() {
    let mut packet = InputPacket::new(Bytes::new());
    assert!(matches!(
        parse_header(&mut packet),
        Err(ProtocolError::PacketOverflow { needed: 1, remaining: 0 })
    ));
}

#[test]
fn test_three_byte_frame_has_no_checksum() {
    let mut packet = InputPacket::new(Bytes::from_static(&[0xFF, 0xFF, 0x00]));
    let header = parse_header(&mut packet).unwrap();
    assert!(!header.has_checksum);
    assert_eq!(header.kind, PacketKind::Status);
}

#[test]
fn test_checksum_of_empty_remainder() {
    // adler32 of nothing is 1; a frame of exactly [1,0,0,0] is a checksum
    // followed by an empty body.
    assert_eq!(adler32(&[]), 1);
    let mut packet = InputPacket::new(Bytes::from_static(&[1, 0, 0, 0]));
    assert!(packet.starts_with_checksum());
    assert!(parse_header(&mut packet).is_err());
}

#[test]
fn test_wrong_checksum_is_read_as_payload() {
    let mut frame = BytesMut::new();
    frame.put_u32_le(adler32(&[0xFF, 0xFF]) ^ 1);
    frame.put_slice(&[0xFF, 0xFF]);
    let mut packet = InputPacket::new(frame.freeze());

    let header = parse_header(&mut packet);
    assert!(matches!(header, Err(ProtocolError::UnknownPacketType(_))));
}

#[tokio::test]
async fn test_unknown_packet_type_is_an_error() {
    let service = service();
    let result = service.handle_frame(Bytes::from_static(&[0x0A, 1, 2]), peer()).await;
    assert!(matches!(result, Err(ProtocolError::UnknownPacketType(0x0A))));
}

// ============================================================================
// LOGIN BODY
// ============================================================================

#[tokio::test]
async fn test_login_type_without_body() {
    let service = service();
    let result = service.handle_frame(Bytes::from_static(&[0x01]), peer()).await;
    assert!(matches!(result, Err(ProtocolError::PacketOverflow { .. })));
    assert_eq!(service.store().lookups(), 0);
}

#[test]
fn test_every_truncation_of_a_modern_request_fails() {
    let rsa = rsa();
    let body = LoginBuilder::new(1099, "tester", "test")
        .without_checksum()
        .body(&rsa);

    for len in 1..body.len() {
        let mut packet = InputPacket::new(body.slice(..len));
        parse_header(&mut packet).unwrap();
        assert!(
            LoginRequest::parse(&mut packet, &rsa).is_err(),
            "truncated at {len} should fail"
        );
    }
}

#[test]
fn test_short_rsa_block() {
    let rsa = rsa();
    let mut body = BytesMut::new();
    body.put_u16_le(2);
    body.put_u16_le(800);
    body.put_slice(&[0u8; 12]);
    body.put_slice(&[0u8; RSA_BLOCK_SIZE - 1]);

    let mut packet = InputPacket::new(body.freeze());
    assert!(matches!(
        LoginRequest::parse(&mut packet, &rsa),
        Err(ProtocolError::PacketOverflow { .. })
    ));
}

#[test]
fn test_ciphertext_above_modulus() {
    let rsa = rsa();
    let mut body = BytesMut::new();
    body.put_u16_le(2);
    body.put_u16_le(800);
    body.put_slice(&[0u8; 12]);
    body.put_slice(&[0xFFu8; RSA_BLOCK_SIZE]);

    let mut packet = InputPacket::new(body.freeze());
    assert!(matches!(
        LoginRequest::parse(&mut packet, &rsa),
        Err(ProtocolError::RsaDecryption(_))
    ));
}

#[tokio::test]
async fn test_trailing_bytes_are_ignored() {
    let service = service();
    let login = LoginBuilder::new(1099, "tester", "test").without_checksum();
    let mut body = BytesMut::from(login.body(&rsa()).as_ref());
    body.put_slice(&[0xEE; 16]);

    let reply = service.handle_frame(body.freeze(), peer()).await.unwrap();
    let mut reader = open_reply(&reply.frame.unwrap(), true, false);
    assert_eq!(reader.u8(), 0x14);
}

#[tokio::test]
async fn test_empty_account_name_is_rejected_not_fatal() {
    let service = service();
    let login = LoginBuilder::new(1099, "", "");
    let reply = service.handle_frame(login.body(&rsa()), peer()).await.unwrap();
    let (code, message) = expect_error(open_reply(&reply.frame.unwrap(), true, true));
    assert_eq!(code, 0x0B);
    assert_eq!(message, "Invalid account/password");
}

#[tokio::test]
async fn test_unknown_numeric_account() {
    let service = service();
    let login = LoginBuilder::numeric(800, 999_999, "test");
    let reply = service.handle_frame(login.body(&rsa()), peer()).await.unwrap();
    let (code, _) = expect_error(open_reply(&reply.frame.unwrap(), true, true));
    assert_eq!(code, 0x0A);
    assert_eq!(service.limiter().failure_counts(peer()), Some(vec![1, 1]));
}

// ============================================================================
// OUTPUT BUFFER
// ============================================================================

#[test]
fn test_output_packet_refuses_to_overflow() {
    let mut out = OutputPacket::new();
    let chunk = vec![0u8; 1000];
    let mut written = 0;
    loop {
        match out.add_bytes(&chunk) {
            Ok(()) => written += chunk.len(),
            Err(ProtocolError::OutputOverflow { .. }) => break,
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert!(written < OUTPUT_CAPACITY);
    assert_eq!(out.len(), written);
}

#[test]
fn test_long_string_is_refused() {
    let mut out = OutputPacket::new();
    let long = "x".repeat(usize::from(u16::MAX) + 1);
    assert!(out.add_string(&long).is_err());
}
