//! Client side of the login protocol, for integration tests and benches.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use otls::config::{LoginConfig, World};
use otls::crypto::{adler32, totp, RsaDecryptor, XteaKey, RSA_BLOCK_SIZE};
use otls::protocol::LoginService;
use otls::store::{Account, Character, MemoryStore};
use otls::utils::time::unix_secs;

pub const PEM: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/keys/login.pem"));
/// sha1("test")
pub const TEST_HASH: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
pub const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
pub const KEY: [u32; 4] = [0xDEAD_BEEF, 0x0BAD_F00D, 0x1234_5678, 0x9ABC_DEF0];

const XTEA_DELTA: u32 = 0x9E37_79B9;

pub fn rsa() -> RsaDecryptor {
    RsaDecryptor::from_pem(PEM).unwrap()
}

pub fn config() -> LoginConfig {
    LoginConfig::default_with_overrides(|config| {
        config.worlds = vec![
            World {
                id: 0,
                name: "Antica".into(),
                host: "127.0.0.1".into(),
                port: 7172,
                preview: false,
            },
            World {
                id: 1,
                name: "Premia".into(),
                host: "10.1.2.3".into(),
                port: 7272,
                preview: true,
            },
        ];
    })
}

pub fn store() -> MemoryStore {
    MemoryStore::new()
        .with_account(
            Account {
                id: 1,
                name: "tester".into(),
                password: TEST_HASH.into(),
                premdays: 30,
                secret: None,
            },
            vec![
                Character {
                    name: "Knight Tester".into(),
                    world_id: 0,
                },
                Character {
                    name: "Druid Tester".into(),
                    world_id: 1,
                },
            ],
        )
        .with_account(
            Account {
                id: 2,
                name: "guarded".into(),
                password: TEST_HASH.into(),
                premdays: 0,
                secret: Some(SECRET.into()),
            },
            Vec::new(),
        )
}

pub fn service() -> LoginService<MemoryStore> {
    service_with(config(), store())
}

pub fn service_with(config: LoginConfig, store: MemoryStore) -> LoginService<MemoryStore> {
    LoginService::new(Arc::new(config), Arc::new(rsa()), Arc::new(store))
}

pub fn current_token() -> String {
    let key = totp::decode_secret(SECRET).unwrap();
    let code = totp::generate(&key, unix_secs() / totp::TIME_STEP_SECS).unwrap();
    format!("{code:06}")
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u16_le(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

fn seal(rsa: &RsaDecryptor, plain: &[u8]) -> Vec<u8> {
    let mut block = vec![0u8; RSA_BLOCK_SIZE];
    block[..plain.len()].copy_from_slice(plain);
    rsa.encrypt(&block).unwrap()
}

/// A login request as a client of `version` would send it
#[derive(Debug, Clone)]
pub struct LoginBuilder {
    pub version: u16,
    pub account_name: String,
    pub account_number: u32,
    pub password: String,
    pub token: String,
    pub checksum: bool,
}

impl LoginBuilder {
    pub fn new(version: u16, account: &str, password: &str) -> Self {
        Self {
            version,
            account_name: account.into(),
            account_number: 1,
            password: password.into(),
            token: String::new(),
            checksum: true,
        }
    }

    pub fn numeric(version: u16, account: u32, password: &str) -> Self {
        Self {
            account_number: account,
            ..Self::new(version, "", password)
        }
    }

    pub fn token(mut self, token: &str) -> Self {
        self.token = token.into();
        self
    }

    pub fn without_checksum(mut self) -> Self {
        self.checksum = false;
        self
    }

    pub fn encrypted(&self) -> bool {
        self.version >= 770
    }

    fn credentials(&self, buf: &mut BytesMut) {
        if self.version >= 840 {
            put_string(buf, &self.account_name);
        } else {
            buf.put_u32_le(self.account_number);
        }
        put_string(buf, &self.password);
    }

    /// Frame body: optional checksum, packet type, payload
    pub fn body(&self, rsa: &RsaDecryptor) -> Bytes {
        let v = self.version;
        let mut body = BytesMut::new();
        body.put_u8(0x01);
        body.put_u16_le(2);
        body.put_u16_le(v);
        if v >= 980 {
            body.put_u32_le(u32::from(v) * 10);
        }
        if v >= 1071 {
            body.put_u16_le(1);
            body.put_u16_le(0);
        } else {
            body.put_u32_le(0x4E11_0001);
        }
        body.put_u32_le(0x5350_5200);
        body.put_u32_le(0x5049_4300);
        if v >= 980 {
            body.put_u8(0);
        }

        if self.encrypted() {
            let mut plain = BytesMut::new();
            plain.put_u8(0);
            for word in KEY {
                plain.put_u32_le(word);
            }
            self.credentials(&mut plain);
            body.put_slice(&seal(rsa, &plain));
        } else {
            self.credentials(&mut body);
        }

        if v >= 1061 {
            body.put_u8(3);
            body.put_u8(4);
            put_string(&mut body, "Mesa Intel");
            put_string(&mut body, "4.5 (Core Profile)");
        }

        if v >= 1072 {
            let mut plain = BytesMut::new();
            plain.put_u8(0);
            put_string(&mut plain, &self.token);
            if v >= 1074 {
                plain.put_u8(0);
            }
            body.put_slice(&seal(rsa, &plain));
        }

        if !self.checksum {
            return body.freeze();
        }
        let mut with_checksum = BytesMut::with_capacity(body.len() + 4);
        with_checksum.put_u32_le(adler32(&body));
        with_checksum.put_slice(&body);
        with_checksum.freeze()
    }

    /// Complete frame including the size prefix
    pub fn frame(&self, rsa: &RsaDecryptor) -> Bytes {
        with_size(&self.body(rsa))
    }
}

pub fn with_size(body: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(body.len() + 2);
    frame.put_u16_le(body.len() as u16);
    frame.put_slice(body);
    frame.freeze()
}

fn xtea_decrypt(key: &XteaKey, data: &mut [u8]) {
    let k = key.words();
    for block in data.chunks_exact_mut(8) {
        let mut v0 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        let mut v1 = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let mut sum = XTEA_DELTA.wrapping_mul(32);
        for _ in 0..32 {
            v1 = v1.wrapping_sub(
                (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                    ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
            );
            sum = sum.wrapping_sub(XTEA_DELTA);
            v0 = v0.wrapping_sub(
                (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1)) ^ sum.wrapping_add(k[(sum & 3) as usize]),
            );
        }
        block[..4].copy_from_slice(&v0.to_le_bytes());
        block[4..].copy_from_slice(&v1.to_le_bytes());
    }
}

/// Plaintext of a reply frame
pub fn open_reply(frame: &[u8], encrypted: bool, checksum: bool) -> Reader {
    let size = usize::from(u16::from_le_bytes([frame[0], frame[1]]));
    assert_eq!(size, frame.len() - 2, "size prefix must cover the frame");
    open_body(&frame[2..], encrypted, checksum)
}

/// Plaintext of a reply body (size prefix already removed)
pub fn open_body(body: &[u8], encrypted: bool, checksum: bool) -> Reader {
    let mut rest = body.to_vec();
    if checksum {
        let declared = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        rest.drain(..4);
        assert_eq!(declared, adler32(&rest), "reply checksum");
    }
    if encrypted {
        assert_eq!(rest.len() % 8, 0, "XTEA payload is whole blocks");
        xtea_decrypt(&XteaKey::new(KEY), &mut rest);
        let inner = usize::from(u16::from_le_bytes([rest[0], rest[1]]));
        rest = rest[2..2 + inner].to_vec();
    }
    Reader(Bytes::from(rest))
}

/// Little-endian reader over a reply
#[derive(Debug, Clone)]
pub struct Reader(pub Bytes);

impl Reader {
    pub fn u8(&mut self) -> u8 {
        self.0.get_u8()
    }

    pub fn u16(&mut self) -> u16 {
        self.0.get_u16_le()
    }

    pub fn u32(&mut self) -> u32 {
        self.0.get_u32_le()
    }

    pub fn bytes(&mut self, len: usize) -> Bytes {
        self.0.split_to(len)
    }

    pub fn string(&mut self) -> String {
        let len = usize::from(self.u16());
        String::from_utf8(self.0.split_to(len).to_vec()).unwrap()
    }

    pub fn remaining(&self) -> usize {
        self.0.len()
    }
}

/// Decoded error reply
pub fn expect_error(mut reply: Reader) -> (u8, String) {
    let code = reply.u8();
    let message = reply.string();
    assert_eq!(reply.remaining(), 0);
    (code, message)
}
