//! Quote storage over an ordered-list backend.
//!
//! Each (guild, user) pair owns one list at `{guild_id}:{user_id}:quotes`,
//! holding the JSON form of every quote in insertion order.
//!
//! Search and random draws materialize the whole partition on every call and
//! removal is a scan on the backend side, so everything here is O(n) in the
//! partition size. That is fine for a handful of quotes per user and is the
//! ceiling of this layout.

use std::{collections::HashMap, sync::Arc};

use rand::Rng;

use crate::{error::StoreError, models::quote::Quote};

pub mod backend;
pub mod redis_backend;

pub use backend::{ListBackend, MemoryBackend};
pub use redis_backend::RedisBackend;

const PARTITION_SUFFIX: &str = ":quotes";

pub fn partition_key(guild_id: &str, user_id: &str) -> String {
    format!("{guild_id}:{user_id}{PARTITION_SUFFIX}")
}

/// Handle to the quote store. Cheap to clone; all clones share one backend.
#[derive(Clone)]
pub struct QuoteStore {
    backend: Arc<dyn ListBackend>,
}

impl QuoteStore {
    pub fn new(backend: Arc<dyn ListBackend>) -> Self {
        Self { backend }
    }

    /// Appends a quote to the end of the partition.
    #[tracing::instrument(skip(self, quote), fields(quote_id = %quote.id))]
    pub async fn push(&self, guild_id: &str, user_id: &str, quote: &Quote) -> Result<(), StoreError> {
        let json = serde_json::to_string(quote)?;

        self.backend
            .append(&partition_key(guild_id, user_id), json)
            .await
    }

    /// Removes every stored quote whose serialized form equals `quote`'s.
    /// Removing nothing is not an error.
    #[tracing::instrument(skip(self, quote), fields(quote_id = %quote.id))]
    pub async fn remove(
        &self,
        guild_id: &str,
        user_id: &str,
        quote: &Quote,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(quote)?;

        let removed = self
            .backend
            .remove(&partition_key(guild_id, user_id), &json)
            .await?;

        if removed == 0 {
            tracing::debug!("no stored quote matched, nothing removed");
        }

        Ok(())
    }

    /// The whole partition in insertion order. An absent or empty partition
    /// is `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn get_all(&self, guild_id: &str, user_id: &str) -> Result<Vec<Quote>, StoreError> {
        let raw = self.backend.range(&partition_key(guild_id, user_id)).await?;

        if raw.is_empty() {
            return Err(StoreError::NotFound {
                guild_id: guild_id.to_string(),
                user_id: user_id.to_string(),
            });
        }

        Ok(decode_quotes(raw))
    }

    /// Quotes whose text contains `pattern`, case-sensitively. Zero matches is
    /// an empty list rather than `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn search(
        &self,
        guild_id: &str,
        user_id: &str,
        pattern: &str,
    ) -> Result<Vec<Quote>, StoreError> {
        let quotes = self.get_all(guild_id, user_id).await?;

        Ok(quotes
            .into_iter()
            .filter(|quote| quote.text.contains(pattern))
            .collect())
    }

    /// One quote drawn uniformly from the partition.
    #[tracing::instrument(skip(self))]
    pub async fn get_random(&self, guild_id: &str, user_id: &str) -> Result<Quote, StoreError> {
        let mut quotes = self.get_all(guild_id, user_id).await?;

        // every stored element may have failed to decode
        if quotes.is_empty() {
            return Err(StoreError::NotFound {
                guild_id: guild_id.to_string(),
                user_id: user_id.to_string(),
            });
        }

        let choice = rand::thread_rng().gen_range(0..quotes.len());
        Ok(quotes.swap_remove(choice))
    }

    /// Replaces each listed partition with the given quotes. Keys are full
    /// partition keys, as produced by [`QuoteStore::export`].
    #[tracing::instrument(skip_all, fields(partitions = data.len()))]
    pub async fn import(&self, data: HashMap<String, Vec<Quote>>) -> Result<(), StoreError> {
        for (key, quotes) in data {
            let values = quotes
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>()?;

            self.backend.replace(&key, values).await.inspect_err(
                |e| tracing::error!(err = ?e, key = %key, "an error occurred when importing partition"),
            )?;
        }

        Ok(())
    }

    /// Every partition, keyed by its partition key.
    #[tracing::instrument(skip_all)]
    pub async fn export(&self) -> Result<HashMap<String, Vec<Quote>>, StoreError> {
        let keys = self.backend.keys(PARTITION_SUFFIX).await?;

        let lists = futures::future::try_join_all(keys.iter().map(|key| self.backend.range(key)))
            .await?;

        Ok(keys
            .into_iter()
            .zip(lists)
            .map(|(key, raw)| (key, decode_quotes(raw)))
            .collect())
    }
}

fn decode_quotes(raw: Vec<String>) -> Vec<Quote> {
    raw.into_iter()
        .filter_map(|json| {
            serde_json::from_str(&json)
                .inspect_err(
                    |e| tracing::warn!(err = ?e, "skipping stored quote that failed to decode"),
                )
                .ok()
        })
        .collect()
}
