//! Guild access check against the identity provider.
//!
//! The caller's `Authorization` header must use the `Bot` scheme. It is
//! forwarded unchanged to the provider's "my guilds" listing, and the request
//! passes only if the guild in the path is in that list.
//!
//! A provider failure (transport, error status, bad body, timeout) is a 500,
//! a successful listing without the guild is a 403.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{Gate, RequestContext, Verdict};
use crate::{constants::AUTH_SCHEME, discord::GuildDirectory, error::AppError};

pub struct GuildAccessGate {
    directory: Arc<dyn GuildDirectory>,
    timeout: Duration,
    cache: Option<GrantCache>,
}

/// Remembers successful (credential, guild) checks for a short while.
struct GrantCache {
    ttl: Duration,
    grants: DashMap<(String, String), Instant>,
}

impl GrantCache {
    fn is_fresh(&self, credential: &str, guild_id: &str) -> bool {
        let key = (credential.to_string(), guild_id.to_string());
        let fresh = self.grants.get(&key).map(|granted| granted.elapsed() < self.ttl);

        match fresh {
            Some(true) => true,
            Some(false) => {
                self.grants.remove(&key);
                false
            }
            None => false,
        }
    }

    fn remember(&self, credential: &str, guild_id: &str) {
        self.grants
            .insert((credential.to_string(), guild_id.to_string()), Instant::now());
    }
}

impl GuildAccessGate {
    pub fn new(directory: Arc<dyn GuildDirectory>, timeout: Duration) -> Self {
        Self {
            directory,
            timeout,
            cache: None,
        }
    }

    /// Skip the provider for `ttl` after a successful check of the same
    /// credential and guild. A zero ttl leaves caching off.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = (!ttl.is_zero()).then(|| GrantCache {
            ttl,
            grants: DashMap::new(),
        });
        self
    }

    fn credential(ctx: &RequestContext) -> Result<&str, AppError> {
        let auth = ctx
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("invalid request, no authorization".to_string()))?
            .to_str()
            .map_err(|_| AppError::BadRequest("invalid request, bad token".to_string()))?;

        match auth.split(' ').next() {
            Some(scheme) if scheme == AUTH_SCHEME => Ok(auth),
            _ => Err(AppError::BadRequest("invalid request, bad token".to_string())),
        }
    }

    /// The guild being asked for and the credential asking, owned so that
    /// nothing borrows the request across the provider call.
    fn target(ctx: &RequestContext) -> Result<(String, String), AppError> {
        let guild_id = ctx.param("guild_id")?;
        let credential = Self::credential(ctx)?;

        Ok((guild_id.to_string(), credential.to_string()))
    }

    async fn has_guild_access(&self, credential: &str, guild_id: &str) -> Result<bool, AppError> {
        let guilds = tokio::time::timeout(self.timeout, self.directory.guilds(credential))
            .await
            .map_err(|_| {
                tracing::error!(timeout = ?self.timeout, "discord guilds request timed out");
                AppError::Internal("guild verification failed".to_string())
            })?
            .map_err(|e| {
                tracing::error!(err = ?e, "discord guilds request failed");
                AppError::Internal("guild verification failed".to_string())
            })?;

        Ok(guilds.iter().any(|guild| guild.id == guild_id))
    }

    async fn verify(&self, credential: &str, guild_id: &str) -> Result<(), AppError> {
        if let Some(cache) = &self.cache {
            if cache.is_fresh(credential, guild_id) {
                return Ok(());
            }
        }

        if !self.has_guild_access(credential, guild_id).await? {
            return Err(AppError::Forbidden(
                "discord token does not have access to that guild".to_string(),
            ));
        }

        if let Some(cache) = &self.cache {
            cache.remember(credential, guild_id);
        }

        Ok(())
    }
}

#[async_trait]
impl Gate for GuildAccessGate {
    fn name(&self) -> &str {
        "guild-access"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Verdict {
        let (guild_id, credential) = match Self::target(ctx) {
            Ok(target) => target,
            Err(err) => return Verdict::Stop(err),
        };

        match self.verify(&credential, &guild_id).await {
            Ok(()) => Verdict::Continue,
            Err(err) => Verdict::Stop(err),
        }
    }
}
