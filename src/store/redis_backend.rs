use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};

use super::backend::ListBackend;
use crate::error::StoreError;

/// Redis lists: RPUSH to append, LREM 0 to remove, LRANGE 0 -1 to read.
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own,
/// so cloning it per call is how it is shared between tasks.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl ListBackend for RedisBackend {
    async fn append(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.rpush(key, value).await?;

        Ok(())
    }

    async fn remove(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut connection = self.connection.clone();
        let removed: usize = connection.lrem(key, 0, value).await?;

        Ok(removed)
    }

    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();
        let values: Vec<String> = connection.lrange(key, 0, -1).await?;

        Ok(values)
    }

    async fn keys(&self, suffix: &str) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();
        let mut keys: Vec<String> = connection.keys(format!("*{suffix}")).await?;
        keys.sort();

        Ok(keys)
    }

    async fn replace(&self, key: &str, values: Vec<String>) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();

        // RPUSH with no values is a syntax error
        if !values.is_empty() {
            pipe.rpush(key, values).ignore();
        }

        pipe.query_async::<()>(&mut connection).await?;

        Ok(())
    }
}

/// Builds a `redis://` url from the separate address, password and db index
/// the service is configured with.
pub fn redis_url(addr: &str, password: &str, db: i64) -> String {
    if password.is_empty() {
        format!("redis://{addr}/{db}")
    } else {
        format!("redis://:{}@{addr}/{db}", urlencoding::encode(password))
    }
}
