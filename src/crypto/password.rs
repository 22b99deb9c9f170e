//! Password hashing as configured for the account database.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::ProtocolError;

/// Hash algorithm the account store uses for stored passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordHash {
    Plain,
    Md5,
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl PasswordHash {
    /// Hash `password`; hex digests are lowercase and `Plain` returns the input.
    pub fn digest(&self, password: &str) -> String {
        let bytes = password.as_bytes();
        match self {
            PasswordHash::Plain => password.to_string(),
            PasswordHash::Md5 => hex::encode(Md5::digest(bytes)),
            PasswordHash::Sha1 => hex::encode(Sha1::digest(bytes)),
            PasswordHash::Sha256 => hex::encode(Sha256::digest(bytes)),
            PasswordHash::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }

    /// Check `password` against a stored hash.
    ///
    /// The digest is computed even when there is no stored hash, so a missing
    /// account costs the same as a wrong password.
    pub fn verify(&self, password: &str, stored: Option<&str>) -> bool {
        let computed = self.digest(password);
        match (self, stored) {
            (_, None) => false,
            (PasswordHash::Plain, Some(stored)) => computed == stored,
            (_, Some(stored)) => computed.eq_ignore_ascii_case(stored),
        }
    }
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PasswordHash::Plain => "plain",
            PasswordHash::Md5 => "md5",
            PasswordHash::Sha1 => "sha1",
            PasswordHash::Sha256 => "sha256",
            PasswordHash::Sha512 => "sha512",
        };
        f.write_str(name)
    }
}

impl FromStr for PasswordHash {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(PasswordHash::Plain),
            "md5" => Ok(PasswordHash::Md5),
            "sha1" => Ok(PasswordHash::Sha1),
            "sha256" => Ok(PasswordHash::Sha256),
            "sha512" => Ok(PasswordHash::Sha512),
            other => Err(ProtocolError::ConfigError(format!(
                "Unknown password hash '{other}' (expected plain, md5, sha1, sha256 or sha512)"
            ))),
        }
    }
}
