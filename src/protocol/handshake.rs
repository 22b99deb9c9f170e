//! Login handshake parsing
//!
//! Turns a received frame into either a status query or a fully decoded
//! [`LoginRequest`]. Field order and presence come from
//! [`crate::core::layout::layout_for`]; this module only knows how to read each
//! kind of field.
//!
//! Every failure here is fatal to the connection: truncated fields, an RSA block
//! of the wrong size, or a plaintext without the leading zero byte.

use std::fmt;

use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::core::layout::{layout_for, AccountIdKind, LoginField};
use crate::core::packet::InputPacket;
use crate::crypto::{RsaDecryptor, XteaKey};
use crate::error::{ProtocolError, Result};
use crate::utils::logging::Redacted;

/// Packet type byte of a status query
pub const STATUS_PACKET: u8 = 0xFF;
/// Packet type byte of a login request
pub const LOGIN_PACKET: u8 = 0x01;
/// Status sub-type asking for the XML document
pub const STATUS_INFO_XML: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Status,
    Login,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketKind::Status => write!(f, "status"),
            PacketKind::Login => write!(f, "login"),
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            STATUS_PACKET => Ok(PacketKind::Status),
            LOGIN_PACKET => Ok(PacketKind::Login),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

/// What precedes the packet body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Whether the client prefixed the body with a valid Adler-32
    pub has_checksum: bool,
    pub kind: PacketKind,
}

/// Consume the optional checksum and the packet type byte.
///
/// The checksum is recognised by value: if the first four bytes equal the
/// Adler-32 of everything after them they are taken as a checksum, otherwise
/// they are left in place as payload.
pub fn parse_header(packet: &mut InputPacket) -> Result<FrameHeader> {
    let has_checksum = packet.starts_with_checksum();
    if has_checksum {
        packet.skip(4)?;
    }
    let kind = PacketKind::try_from(packet.get_u8()?)?;
    Ok(FrameHeader { has_checksum, kind })
}

/// Account identifier as sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountId {
    Number(u32),
    Name(String),
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountId::Number(number) => write!(f, "{number}"),
            AccountId::Name(name) => f.write_str(name),
        }
    }
}

/// A decoded login request
pub struct LoginRequest {
    pub os: u16,
    pub version: u16,
    pub client_build: Option<u32>,
    pub content_revision: Option<u16>,
    pub data_signature: Option<u32>,
    pub sprite_signature: u32,
    pub picture_signature: u32,
    pub preview_state: Option<u8>,
    /// Session key for the reply; absent for plaintext clients
    pub xtea: Option<XteaKey>,
    pub account: AccountId,
    pub password: Zeroizing<String>,
    pub token: Option<Zeroizing<String>>,
    pub stay_logged_in: bool,
}

impl LoginRequest {
    /// Decode the body that follows the packet type byte.
    #[instrument(level = "debug", skip_all)]
    pub fn parse(packet: &mut InputPacket, rsa: &RsaDecryptor) -> Result<Self> {
        let os = packet.get_u16()?;
        let version = packet.get_u16()?;

        let mut client_build = None;
        let mut content_revision = None;
        let mut data_signature = None;
        let mut sprite_signature = 0;
        let mut picture_signature = 0;
        let mut preview_state = None;
        let mut xtea = None;
        let mut credentials = None;
        let mut token = None;
        let mut stay_logged_in = false;

        for field in layout_for(version) {
            match field {
                LoginField::ClientBuild => client_build = Some(packet.get_u32()?),
                LoginField::ContentRevision => content_revision = Some(packet.get_u16()?),
                LoginField::Reserved => packet.skip(2)?,
                LoginField::DataSignature => data_signature = Some(packet.get_u32()?),
                LoginField::SpriteSignature => sprite_signature = packet.get_u32()?,
                LoginField::PictureSignature => picture_signature = packet.get_u32()?,
                LoginField::PreviewState => preview_state = Some(packet.get_u8()?),
                LoginField::Credentials { encrypted, account } => {
                    let mut block;
                    let source = if encrypted {
                        block = open_rsa_block(packet, rsa)?;
                        xtea = Some(read_xtea_key(&mut block)?);
                        &mut block
                    } else {
                        &mut *packet
                    };
                    let id = read_account(source, account)?;
                    let password = Zeroizing::new(source.get_string()?);
                    credentials = Some((id, password));
                }
                LoginField::GpuInfo => {
                    packet.skip(2)?;
                    packet.get_string()?;
                    packet.get_string()?;
                }
                LoginField::Token {
                    stay_logged_in: with_flag,
                } => {
                    let mut block = open_rsa_block(packet, rsa)?;
                    token = Some(Zeroizing::new(block.get_string()?));
                    if with_flag {
                        stay_logged_in = block.get_u8()? > 0;
                    }
                }
            }
        }

        let (account, password) = credentials.ok_or(ProtocolError::MissingCredentials)?;
        debug!(os, version, account = %account, "Login request decoded");

        Ok(Self {
            os,
            version,
            client_build,
            content_revision,
            data_signature,
            sprite_signature,
            picture_signature,
            preview_state,
            xtea,
            account,
            password,
            token,
            stay_logged_in,
        })
    }

    /// The supplied token, treating an empty string as absent
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("os", &self.os)
            .field("version", &self.version)
            .field("client_build", &self.client_build)
            .field("account", &self.account)
            .field("password", &Redacted(&self.password))
            .field("encrypted", &self.xtea.is_some())
            .field("token", &self.token().map(Redacted))
            .field("stay_logged_in", &self.stay_logged_in)
            .finish_non_exhaustive()
    }
}

fn open_rsa_block(packet: &mut InputPacket, rsa: &RsaDecryptor) -> Result<InputPacket> {
    let mut block = packet.rsa_decrypt(rsa)?;
    if block.get_u8()? != 0 {
        return Err(ProtocolError::RsaSentinel);
    }
    Ok(block)
}

fn read_xtea_key(block: &mut InputPacket) -> Result<XteaKey> {
    let mut words = [0u32; 4];
    for word in &mut words {
        *word = block.get_u32()?;
    }
    Ok(XteaKey::new(words))
}

fn read_account(source: &mut InputPacket, kind: AccountIdKind) -> Result<AccountId> {
    match kind {
        AccountIdKind::Numeric => Ok(AccountId::Number(source.get_u32()?)),
        AccountIdKind::Name => Ok(AccountId::Name(source.get_string()?)),
    }
}
