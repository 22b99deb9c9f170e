//! Version-dependent layout of the login request and reply.
//!
//! The request layout is a table of rules in wire order, each naming the client
//! versions it applies to. [`layout_for`] filters the table for one version, so a
//! new protocol revision is a new row rather than a new branch in the parser.

/// How the account is identified inside the credential block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountIdKind {
    /// Raw `u32` account number
    Numeric,
    /// Length-prefixed account name
    Name,
}

/// One field (or fixed group of fields) of a login request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    /// u32 client build number
    ClientBuild,
    /// u16 content revision
    ContentRevision,
    /// u16, always zero in practice
    Reserved,
    /// u32 data file signature
    DataSignature,
    /// u32 sprite file signature
    SpriteSignature,
    /// u32 picture file signature
    PictureSignature,
    /// u8 preview-world flag
    PreviewState,
    /// Account and password. When `encrypted`, the rest of the credential data is
    /// one RSA block: zero sentinel, four XTEA key words, account, password.
    Credentials {
        encrypted: bool,
        account: AccountIdKind,
    },
    /// u8, u8, GPU name, GPU driver version; discarded
    GpuInfo,
    /// Second RSA block: zero sentinel, token string, and optionally a u8
    /// stay-logged-in flag
    Token { stay_logged_in: bool },
}

/// First version that sends an RSA credential block
pub const RSA_SINCE: u16 = 770;
/// First version that identifies accounts by name
pub const ACCOUNT_NAME_SINCE: u16 = 840;
/// First version with client build and preview fields
pub const CLIENT_BUILD_SINCE: u16 = 980;
/// First version that receives a separate world list
pub const WORLD_LIST_SINCE: u16 = 1010;
/// First version that sends GPU information
pub const GPU_INFO_SINCE: u16 = 1061;
/// First version with the content revision field
pub const CONTENT_REVISION_SINCE: u16 = 1071;
/// First version that sends an authenticator token block
pub const TOKEN_SINCE: u16 = 1072;
/// First version with a stay-logged-in flag and a session key in the reply
pub const SESSION_KEY_SINCE: u16 = 1074;
/// First version using error code 0x0B
pub const NEW_ERROR_CODE_SINCE: u16 = 1076;
/// First version with the three-field premium block
pub const EXTENDED_PREMIUM_SINCE: u16 = 1078;

#[derive(Debug, Clone, Copy)]
struct Rule {
    since: u16,
    until: u16,
    field: LoginField,
}

impl Rule {
    const fn always(field: LoginField) -> Self {
        Self::range(0, u16::MAX, field)
    }

    const fn since(since: u16, field: LoginField) -> Self {
        Self::range(since, u16::MAX, field)
    }

    const fn before(until: u16, field: LoginField) -> Self {
        Self::range(0, until, field)
    }

    /// Applies to `since <= version < until`; `until == u16::MAX` is open-ended.
    const fn range(since: u16, until: u16, field: LoginField) -> Self {
        Self {
            since,
            until,
            field,
        }
    }

    fn applies(&self, version: u16) -> bool {
        version >= self.since && (self.until == u16::MAX || version < self.until)
    }
}

const REQUEST_RULES: &[Rule] = &[
    Rule::since(CLIENT_BUILD_SINCE, LoginField::ClientBuild),
    Rule::since(CONTENT_REVISION_SINCE, LoginField::ContentRevision),
    Rule::since(CONTENT_REVISION_SINCE, LoginField::Reserved),
    Rule::before(CONTENT_REVISION_SINCE, LoginField::DataSignature),
    Rule::always(LoginField::SpriteSignature),
    Rule::always(LoginField::PictureSignature),
    Rule::since(CLIENT_BUILD_SINCE, LoginField::PreviewState),
    Rule::before(
        RSA_SINCE,
        LoginField::Credentials {
            encrypted: false,
            account: AccountIdKind::Numeric,
        },
    ),
    Rule::range(
        RSA_SINCE,
        ACCOUNT_NAME_SINCE,
        LoginField::Credentials {
            encrypted: true,
            account: AccountIdKind::Numeric,
        },
    ),
    Rule::since(
        ACCOUNT_NAME_SINCE,
        LoginField::Credentials {
            encrypted: true,
            account: AccountIdKind::Name,
        },
    ),
    Rule::since(GPU_INFO_SINCE, LoginField::GpuInfo),
    Rule::range(
        TOKEN_SINCE,
        SESSION_KEY_SINCE,
        LoginField::Token {
            stay_logged_in: false,
        },
    ),
    Rule::since(
        SESSION_KEY_SINCE,
        LoginField::Token {
            stay_logged_in: true,
        },
    ),
];

/// Ordered fields a client of `version` sends after the os and version words.
pub fn layout_for(version: u16) -> Vec<LoginField> {
    REQUEST_RULES
        .iter()
        .filter(|rule| rule.applies(version))
        .map(|rule| rule.field)
        .collect()
}

/// Login error code understood by `version`
pub fn error_code_for(version: u16) -> u8 {
    if version >= NEW_ERROR_CODE_SINCE {
        0x0B
    } else {
        0x0A
    }
}
