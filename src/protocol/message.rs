//! Login replies
//!
//! A reply body is a sequence of sub-packets, each led by a one-byte tag. A
//! login ends either in a [`LoginRejection`] (one error sub-packet) or in a
//! [`CharacterList`] (optional MOTD, two-factor and session key sub-packets,
//! then the character list).

use std::fmt;

use zeroize::Zeroizing;

use crate::config::World;
use crate::core::layout::{
    error_code_for, CLIENT_BUILD_SINCE, EXTENDED_PREMIUM_SINCE, TOKEN_SINCE, WORLD_LIST_SINCE,
};
use crate::core::packet::OutputPacket;
use crate::error::Result;
use crate::store::Character;

pub const TAG_TWO_FACTOR_OK: u8 = 0x0C;
pub const TAG_TWO_FACTOR_FAILED: u8 = 0x0D;
pub const TAG_MOTD: u8 = 0x14;
pub const TAG_SESSION_KEY: u8 = 0x28;
pub const TAG_CHARACTER_LIST: u8 = 0x64;

/// Written in place of a world name when a character's world is not configured
pub const INVALID_WORLD: &str = "INVALID WORLD";

pub const MSG_TOO_MANY_ATTEMPTS: &str =
    "Too many login attempts.\nYou has been blocked for few minutes.";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid account/password";
pub const MSG_TOKEN_REQUIRED: &str = "Two-factor token required for authentication.";
pub const MSG_TOKEN_INVALID: &str = "Invalid two-factor token.";

/// A policy outcome the client is told about before the connection closes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRejection {
    VersionOutOfRange { min: u16, max: u16, version: u16 },
    TooManyAttempts,
    InvalidCredentials,
    TokenRequired,
    TokenInvalid,
}

impl LoginRejection {
    pub fn message(&self) -> String {
        match self {
            LoginRejection::VersionOutOfRange { min, max, version } => {
                format!("Invalid client version (should be: {min}-{max}, is: {version}).")
            }
            LoginRejection::TooManyAttempts => MSG_TOO_MANY_ATTEMPTS.to_string(),
            LoginRejection::InvalidCredentials => MSG_INVALID_CREDENTIALS.to_string(),
            LoginRejection::TokenRequired => MSG_TOKEN_REQUIRED.to_string(),
            LoginRejection::TokenInvalid => MSG_TOKEN_INVALID.to_string(),
        }
    }

    /// Whether this outcome is recorded against the address as a failed login
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            LoginRejection::InvalidCredentials | LoginRejection::TokenInvalid
        )
    }

    /// Token outcomes use the dedicated tag on clients that understand it;
    /// everything else is an error code followed by the message.
    pub fn write(&self, out: &mut OutputPacket, version: u16) -> Result<()> {
        match self {
            LoginRejection::TokenRequired | LoginRejection::TokenInvalid
                if version >= TOKEN_SINCE =>
            {
                out.add_u8(TAG_TWO_FACTOR_FAILED)?;
                out.add_u8(0)
            }
            _ => {
                out.add_u8(error_code_for(version))?;
                out.add_string(&self.message())
            }
        }
    }
}

impl fmt::Display for LoginRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginRejection::VersionOutOfRange { .. } => write!(f, "version out of range"),
            LoginRejection::TooManyAttempts => write!(f, "too many attempts"),
            LoginRejection::InvalidCredentials => write!(f, "invalid credentials"),
            LoginRejection::TokenRequired => write!(f, "token required"),
            LoginRejection::TokenInvalid => write!(f, "token invalid"),
        }
    }
}

/// Successful login reply
pub struct CharacterList<'a> {
    /// `"<id>\n<text>"`, omitted when there is no message of the day
    pub motd: Option<String>,
    /// The account has a two-factor secret and the token checked out
    pub two_factor_ok: bool,
    pub session_key: Option<Zeroizing<String>>,
    pub worlds: &'a [World],
    pub characters: Vec<Character>,
    pub premdays: u32,
}

impl CharacterList<'_> {
    pub fn write(&self, out: &mut OutputPacket, version: u16) -> Result<()> {
        if let Some(motd) = &self.motd {
            out.add_u8(TAG_MOTD)?;
            out.add_string(motd)?;
        }

        if self.two_factor_ok {
            out.add_u8(TAG_TWO_FACTOR_OK)?;
            out.add_u8(0)?;
        }

        if let Some(key) = &self.session_key {
            out.add_u8(TAG_SESSION_KEY)?;
            out.add_string(key)?;
        }

        out.add_u8(TAG_CHARACTER_LIST)?;
        if version >= WORLD_LIST_SINCE {
            self.write_worlds(out)?;
            self.write_characters(out)?;
        } else {
            self.write_legacy_characters(out, version)?;
        }

        self.write_premium(out, version)
    }

    fn write_worlds(&self, out: &mut OutputPacket) -> Result<()> {
        let worlds = capped(self.worlds);
        out.add_u8(count(worlds))?;
        for world in worlds {
            out.add_u8(world.id)?;
            out.add_string(&world.name)?;
            out.add_string(&world.host)?;
            out.add_u16(world.port)?;
            out.add_u8(u8::from(world.preview))?;
        }
        Ok(())
    }

    fn write_characters(&self, out: &mut OutputPacket) -> Result<()> {
        let characters = capped(&self.characters);
        out.add_u8(count(characters))?;
        for character in characters {
            out.add_u8(character.world_id)?;
            out.add_string(&character.name)?;
        }
        Ok(())
    }

    /// Pre-1010 layout: each character carries its world's name and a packed
    /// IPv4 address instead of referencing a world list.
    fn write_legacy_characters(&self, out: &mut OutputPacket, version: u16) -> Result<()> {
        let characters = capped(&self.characters);
        out.add_u8(count(characters))?;
        for character in characters {
            out.add_string(&character.name)?;
            let world = self.worlds.iter().find(|w| w.id == character.world_id);
            match world {
                Some(world) => {
                    out.add_string(&world.name)?;
                    let octets = world.ipv4().map(|ip| ip.octets()).unwrap_or([0; 4]);
                    out.add_bytes(&octets)?;
                    out.add_u16(world.port)?;
                    if version >= CLIENT_BUILD_SINCE {
                        out.add_u8(u8::from(world.preview))?;
                    }
                }
                None => {
                    out.add_string(INVALID_WORLD)?;
                    out.add_u32(0)?;
                    out.add_u16(0)?;
                    if version >= CLIENT_BUILD_SINCE {
                        out.add_u8(0)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_premium(&self, out: &mut OutputPacket, version: u16) -> Result<()> {
        if version >= EXTENDED_PREMIUM_SINCE {
            out.add_u8(0)?;
            out.add_u8(u8::from(self.premdays > 0))?;
            out.add_u32(self.premdays)
        } else {
            out.add_u16(u16::try_from(self.premdays).unwrap_or(u16::MAX))
        }
    }
}

fn capped<T>(items: &[T]) -> &[T] {
    &items[..items.len().min(usize::from(u8::MAX))]
}

fn count<T>(items: &[T]) -> u8 {
    u8::try_from(items.len()).unwrap_or(u8::MAX)
}
