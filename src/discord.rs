use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};

use crate::{constants::DISCORD_USER_AGENT, models::discord::PartialGuild};

/// Lists the guilds a credential can see.
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    /// `authorization` is the caller's header value, passed through verbatim.
    async fn guilds(&self, authorization: &str) -> anyhow::Result<Vec<PartialGuild>>;
}

#[derive(Clone)]
pub struct DiscordClient {
    pub client: reqwest::Client,
    pub api_base: String,
}

impl DiscordClient {
    pub fn new(api_base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(DISCORD_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(DiscordClient {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GuildDirectory for DiscordClient {
    async fn guilds(&self, authorization: &str) -> anyhow::Result<Vec<PartialGuild>> {
        let resp = self
            .client
            .get(format!("{}/users/@me/guilds", self.api_base))
            .header(AUTHORIZATION, HeaderValue::from_str(authorization)?)
            .send()
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when sending guilds request"),
            )?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            tracing::error!(status = %status, "discord rejected guilds request");
            anyhow::bail!("discord responded with {status}");
        }

        let text = resp.text().await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when receiving response text"),
        )?;

        let guilds = serde_json::from_str(&text).inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when parsing guilds response body"),
        )?;

        Ok(guilds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap as AxumHeaders, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn fake_discord() -> String {
        async fn guilds(headers: AxumHeaders) -> Result<Json<serde_json::Value>, StatusCode> {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bot good") => Ok(Json(json!([
                    { "id": "g1", "name": "one", "owner": true, "permissions": "8" },
                    { "id": "g2", "name": "two" },
                ]))),
                Some("Bot garbage") => Err(StatusCode::OK),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }

        let app = Router::new().route("/api/users/@me/guilds", get(guilds));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{addr}/api/")
    }

    #[tokio::test]
    async fn lists_guilds_with_forwarded_credential() {
        let client = DiscordClient::new(&fake_discord().await, Duration::from_secs(5)).unwrap();

        let guilds = client.guilds("Bot good").await.unwrap();
        let ids: Vec<_> = guilds.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, ["g1", "g2"]);
        assert!(guilds[0].owner);
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let client = DiscordClient::new(&fake_discord().await, Duration::from_secs(5)).unwrap();

        assert!(client.guilds("Bot wrong").await.is_err());
    }

    #[tokio::test]
    async fn unparseable_body_is_an_error() {
        let client = DiscordClient::new(&fake_discord().await, Duration::from_secs(5)).unwrap();

        // 200 with an empty body
        assert!(client.guilds("Bot garbage").await.is_err());
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DiscordClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        assert!(client.guilds("Bot good").await.is_err());
    }
}
