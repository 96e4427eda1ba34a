//! Request gating.
//!
//! A [`Route`] is an ordered list of [`Gate`]s. Each gate looks at the
//! request and either lets it through or stops the chain with an error; the
//! last gate is the handler itself, which writes the response. Nothing after
//! a stopping gate runs.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Query, Request},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::error::AppError;

pub mod auth;
pub mod log;

pub use auth::GuildAccessGate;
pub use log::LogGate;

/// Outcome of a single gate.
#[derive(Debug)]
pub enum Verdict {
    Continue,
    Stop(AppError),
}

#[async_trait]
pub trait Gate: Send + Sync {
    /// Identifies the gate in logs.
    fn name(&self) -> &str;

    async fn check(&self, ctx: &mut RequestContext) -> Verdict;
}

/// Everything a gate can see about an inbound request, plus the response
/// slot the terminal gate fills in.
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub peer: Option<SocketAddr>,
    response: Option<Response>,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
            .map(|Query(query)| query)
            .unwrap_or_default();

        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            query,
            body: Bytes::new(),
            peer: None,
            response: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// A named path parameter, or `BadRequest` if the route has none by that
    /// name.
    pub fn param(&self, name: &str) -> Result<&str, AppError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::BadRequest(format!("missing path parameter {name}")))
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn respond(&mut self, response: impl IntoResponse) {
        self.response = Some(response.into_response());
    }
}

impl<S> FromRequest<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, state)
            .await
            .map(|Path(params)| params)
            .unwrap_or_default();

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .map_err(|e| AppError::BadRequest(format!("invalid query string, {e}")).into_response())?;

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let headers = parts.headers.clone();

        let body = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(IntoResponse::into_response)?;

        Ok(Self {
            method,
            uri,
            headers,
            params,
            query,
            body,
            peer,
            response: None,
        })
    }
}

/// An ordered, cloneable list of gates. Cloning copies the list, so a shared
/// prefix can head several routes without them seeing each other's gates.
#[derive(Clone, Default)]
pub struct Route {
    gates: Vec<Arc<dyn Gate>>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Arc::new(gate));
        self
    }

    /// Appends a [`LogGate`].
    pub fn log(self) -> Self {
        self.gate(LogGate)
    }

    /// Appends the terminal gate and seals the route.
    pub fn finish(self, terminal: impl Gate + 'static) -> RouteHandler {
        let gates = self.gate(terminal).gates;

        RouteHandler {
            gates: gates.into(),
        }
    }
}

/// A sealed route, ready to be mounted on a path.
#[derive(Clone)]
pub struct RouteHandler {
    gates: Arc<[Arc<dyn Gate>]>,
}

impl RouteHandler {
    pub async fn run(&self, mut ctx: RequestContext) -> Response {
        for gate in self.gates.iter() {
            if let Verdict::Stop(err) = gate.check(&mut ctx).await {
                tracing::error!(
                    gate = gate.name(),
                    status = %err.status(),
                    method = %ctx.method,
                    uri = %ctx.uri,
                    err = %err,
                    "request stopped by gate"
                );

                return err.into_response();
            }
        }

        ctx.response
            .take()
            .unwrap_or_else(|| StatusCode::OK.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    struct Recording {
        name: &'static str,
        trace: Trace,
        stop: Option<fn() -> AppError>,
        reply: Option<&'static str>,
    }

    impl Recording {
        fn pass(name: &'static str, trace: &Trace) -> Self {
            Self {
                name,
                trace: trace.clone(),
                stop: None,
                reply: None,
            }
        }

        fn stop(name: &'static str, trace: &Trace, err: fn() -> AppError) -> Self {
            Self {
                stop: Some(err),
                ..Self::pass(name, trace)
            }
        }

        fn reply(name: &'static str, trace: &Trace, body: &'static str) -> Self {
            Self {
                reply: Some(body),
                ..Self::pass(name, trace)
            }
        }
    }

    #[async_trait]
    impl Gate for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn check(&self, ctx: &mut RequestContext) -> Verdict {
            self.trace.lock().unwrap().push(self.name);

            if let Some(err) = self.stop {
                return Verdict::Stop(err());
            }
            if let Some(body) = self.reply {
                ctx.respond((StatusCode::CREATED, body));
            }

            Verdict::Continue
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static("/quotes/g/u"))
    }

    async fn body_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn all_gates_run_in_order_and_terminal_response_stands() {
        let trace = Trace::default();
        let handler = Route::new()
            .gate(Recording::pass("a", &trace))
            .gate(Recording::pass("b", &trace))
            .finish(Recording::reply("c", &trace, "done"));

        let response = handler.run(ctx()).await;

        assert_eq!(*trace.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_of(response).await, "done");
    }

    #[tokio::test]
    async fn stopping_gate_short_circuits() {
        let trace = Trace::default();
        let handler = Route::new()
            .gate(Recording::pass("a", &trace))
            .gate(Recording::stop("b", &trace, || {
                AppError::Forbidden("not yours".to_string())
            }))
            .finish(Recording::reply("c", &trace, "done"));

        let response = handler.run(ctx()).await;

        assert_eq!(*trace.lock().unwrap(), ["a", "b"]);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_of(response).await.contains("not yours"));
    }

    #[tokio::test]
    async fn failing_terminal_is_the_response() {
        let trace = Trace::default();
        let handler = Route::new().finish(Recording::stop("t", &trace, || {
            AppError::NotFound("nothing here".to_string())
        }));

        assert_eq!(handler.run(ctx()).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn terminal_without_response_is_empty_ok() {
        let trace = Trace::default();
        let response = Route::new()
            .finish(Recording::pass("t", &trace))
            .run(ctx())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn cloned_prefixes_do_not_share_gates() {
        let trace = Trace::default();
        let base = Route::new().gate(Recording::pass("shared", &trace));

        let first = base.clone().finish(Recording::reply("first", &trace, "1"));
        let second = base.clone().finish(Recording::reply("second", &trace, "2"));
        let extended = base.gate(Recording::pass("extra", &trace));

        assert_eq!(body_of(first.run(ctx()).await).await, "1");
        assert_eq!(body_of(second.run(ctx()).await).await, "2");
        assert_eq!(*trace.lock().unwrap(), ["shared", "first", "shared", "second"]);
        assert_eq!(extended.gates.len(), 2);
    }

    #[test]
    fn context_parses_query_string() {
        let ctx = RequestContext::new(
            Method::GET,
            Uri::from_static("/quotes/g/u?search=hi%20there&limit=2"),
        );

        assert_eq!(ctx.query("search"), Some("hi there"));
        assert_eq!(ctx.query("limit"), Some("2"));
        assert_eq!(ctx.query("random"), None);
    }

    #[test]
    fn missing_param_is_bad_request() {
        assert!(matches!(ctx().param("guild_id"), Err(AppError::BadRequest(_))));
        assert_eq!(ctx().with_param("guild_id", "g").param("guild_id").unwrap(), "g");
    }
}
