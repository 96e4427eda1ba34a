use async_trait::async_trait;
use axum::http::header::USER_AGENT;

use super::{Gate, RequestContext, Verdict};

/// Writes one access-log line per request. Never stops the chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogGate;

#[async_trait]
impl Gate for LogGate {
    fn name(&self) -> &str {
        "access-log"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Verdict {
        let user_agent = ctx
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info!(
            user_agent = %user_agent,
            peer = ?ctx.peer,
            method = %ctx.method,
            uri = %ctx.uri,
            "inbound request"
        );

        Verdict::Continue
    }
}
