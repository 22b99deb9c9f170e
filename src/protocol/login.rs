//! # Login Service
//!
//! Processes the single frame a client sends on a login connection and
//! produces the single frame sent back.
//!
//! ## Authentication order
//! 1. Client version against the configured range
//! 2. Failed-login windows for the peer address
//! 3. Account lookup and password hash comparison
//! 4. Two-factor token, when the account has a secret
//!
//! Policy outcomes at any step are answered with a [`LoginRejection`].
//! Malformed input and store failures are returned as errors and the
//! connection is dropped without a reply.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::config::LoginConfig;
use crate::core::layout::SESSION_KEY_SINCE;
use crate::core::packet::{InputPacket, OutputPacket};
use crate::crypto::{totp, RsaDecryptor};
use crate::error::Result;
use crate::protocol::handshake::{
    parse_header, AccountId, LoginRequest, PacketKind, STATUS_INFO_XML,
};
use crate::protocol::message::{CharacterList, LoginRejection};
use crate::protocol::status::{StatusCache, StatusSnapshot};
use crate::store::AccountStore;
use crate::utils::metrics::Metrics;
use crate::utils::time::unix_secs;
use crate::utils::{AddressKey, RateLimiter};

/// Result of handling one frame
#[derive(Debug, Clone)]
pub struct Reply {
    pub kind: PacketKind,
    /// Frame to send, or `None` to close silently
    pub frame: Option<Bytes>,
}

enum LoginOutcome<'a> {
    Accepted(CharacterList<'a>),
    Rejected(LoginRejection),
}

/// Shared state for every login connection
pub struct LoginService<S: AccountStore> {
    config: Arc<LoginConfig>,
    rsa: Arc<RsaDecryptor>,
    limiter: Arc<RateLimiter>,
    store: Arc<S>,
    status: StatusCache,
    metrics: Arc<Metrics>,
}

impl<S: AccountStore> LoginService<S> {
    /// Build a service with its own limiter from `config.limits`.
    ///
    /// Use [`LoginService::with_limiter`] to share one limiter between services.
    pub fn new(config: Arc<LoginConfig>, rsa: Arc<RsaDecryptor>, store: Arc<S>) -> Self {
        let limiter = RateLimiter::new(
            config.limits.connections.clone(),
            config.limits.authorizations.clone(),
        );
        Self {
            config,
            rsa,
            limiter: Arc::new(limiter),
            store,
            status: StatusCache::default(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_status_refresh(mut self, refresh: Duration) -> Self {
        self.status = StatusCache::new(refresh);
        self
    }

    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle one complete frame body (size prefix already removed).
    #[instrument(level = "debug", skip_all, fields(peer = %peer))]
    pub async fn handle_frame(&self, frame: Bytes, peer: AddressKey) -> Result<Reply> {
        let mut packet = InputPacket::new(frame);
        let header = parse_header(&mut packet)?;
        debug!(kind = %header.kind, checksum = header.has_checksum, "Frame header parsed");

        let frame = match header.kind {
            PacketKind::Status => self.handle_status(&mut packet).await?,
            PacketKind::Login => Some(
                self.handle_login(&mut packet, header.has_checksum, peer)
                    .await?,
            ),
        };

        Ok(Reply {
            kind: header.kind,
            frame,
        })
    }

    async fn handle_status(&self, packet: &mut InputPacket) -> Result<Option<Bytes>> {
        if packet.remaining() > 0 {
            let request = packet.get_u8()?;
            if request != STATUS_INFO_XML {
                debug!(request, "Unsupported status request, closing");
                return Ok(None);
            }
        }

        self.metrics.status_query();
        let world_id = self.config.status.world_id;
        let document = self
            .status
            .get_or_refresh(world_id, || self.render_status(world_id))
            .await?;

        let mut out = OutputPacket::new();
        out.add_bytes(&document)?;
        out.add_size()?;
        Ok(Some(out.to_bytes()))
    }

    async fn render_status(&self, world_id: u8) -> Result<String> {
        let online = self.store.count_online_players(world_id).await?;
        let snapshot = StatusSnapshot {
            config: &self.config.status,
            uptime_secs: self.metrics.uptime_seconds(),
            players_online: online,
            players_peak: self.status.observe_players(online),
        };
        Ok(snapshot.to_xml())
    }

    async fn handle_login(
        &self,
        packet: &mut InputPacket,
        has_checksum: bool,
        peer: AddressKey,
    ) -> Result<Bytes> {
        let request = LoginRequest::parse(packet, &self.rsa)?;
        self.metrics.login_attempt();

        let mut out = OutputPacket::new();
        match self.authenticate(&request, peer).await? {
            LoginOutcome::Accepted(list) => {
                info!(
                    account = %request.account,
                    version = request.version,
                    characters = list.characters.len(),
                    "Login accepted"
                );
                list.write(&mut out, request.version)?;
                self.metrics.login_success();
            }
            LoginOutcome::Rejected(rejection) => {
                if rejection.counts_as_failure() {
                    self.limiter.record_failure(peer);
                }
                warn!(
                    account = %request.account,
                    version = request.version,
                    reason = %rejection,
                    "Login rejected"
                );
                rejection.write(&mut out, request.version)?;
                self.metrics.login_rejected();
            }
        }

        out.finish(request.xtea.as_ref(), has_checksum)
    }

    async fn authenticate(
        &self,
        request: &LoginRequest,
        peer: AddressKey,
    ) -> Result<LoginOutcome<'_>> {
        let version = request.version;
        if !self.config.version.accepts(version) {
            return Ok(LoginOutcome::Rejected(LoginRejection::VersionOutOfRange {
                min: self.config.version.min,
                max: self.config.version.max,
                version,
            }));
        }

        if !self.limiter.check_auth(peer) {
            return Ok(LoginOutcome::Rejected(LoginRejection::TooManyAttempts));
        }

        let account = match &request.account {
            AccountId::Number(id) => self.store.load_account_by_id(*id).await?,
            AccountId::Name(name) => self.store.load_account_by_name(name).await?,
        };

        // Hashed even when the account is missing.
        let stored = account.as_ref().map(|a| a.password.as_str());
        let password_ok = self
            .config
            .crypto
            .password_hash
            .verify(&request.password, stored);
        let account = match account {
            Some(account) if password_ok => account,
            _ => return Ok(LoginOutcome::Rejected(LoginRejection::InvalidCredentials)),
        };

        let mut two_factor_ok = false;
        if let Some(secret) = account.secret.as_deref().filter(|s| !s.is_empty()) {
            let Some(token) = request.token() else {
                return Ok(LoginOutcome::Rejected(LoginRejection::TokenRequired));
            };
            if !totp::validate_token(token, secret, unix_secs()) {
                return Ok(LoginOutcome::Rejected(LoginRejection::TokenInvalid));
            }
            two_factor_ok = true;
        }

        let characters = self.store.load_characters_by_account_id(account.id).await?;

        let motd = &self.config.motd;
        let session_key = (version >= SESSION_KEY_SINCE).then(|| {
            Zeroizing::new(format!(
                "{}\n{}\n{}\n{}",
                request.account,
                request.password.as_str(),
                request.token().unwrap_or_default(),
                unix_secs()
            ))
        });

        Ok(LoginOutcome::Accepted(CharacterList {
            motd: (!motd.text.is_empty()).then(|| format!("{}\n{}", motd.id, motd.text)),
            two_factor_ok,
            session_key,
            worlds: &self.config.worlds,
            characters,
            premdays: account.premdays,
        }))
    }
}
