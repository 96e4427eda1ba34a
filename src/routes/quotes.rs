use async_trait::async_trait;
use axum::{
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};

use crate::{
    error::{AppError, StoreError},
    gate::{Gate, RequestContext, Verdict},
    models::quote::Quote,
    store::QuoteStore,
};

/// The (guild, user) pair from the path.
struct Partition {
    guild_id: String,
    user_id: String,
}

impl Partition {
    fn from_context(ctx: &RequestContext) -> Result<Self, AppError> {
        Ok(Self {
            guild_id: ctx.param("guild_id")?.to_string(),
            user_id: ctx.param("user_id")?.to_string(),
        })
    }
}

fn store_error(context: &'static str) -> impl FnOnce(StoreError) -> AppError {
    move |e: StoreError| match e {
        StoreError::NotFound { .. } => AppError::NotFound(e.to_string()),
        e => {
            tracing::error!(err = ?e, "{context}");
            AppError::Internal(context.to_string())
        }
    }
}

fn is_json_content(headers: &HeaderMap) -> bool {
    let mut values = headers.get_all(CONTENT_TYPE).iter().peekable();

    values.peek().is_some()
        && values.all(|value| {
            value
                .to_str()
                .is_ok_and(|v| v.contains("application/json") || v.contains("text/json"))
        })
}

/// Query options of `GET /quotes/{guild_id}/{user_id}`.
#[derive(Debug, PartialEq, Eq)]
struct ListQuery {
    search: Option<String>,
    random: bool,
    limit: Option<usize>,
}

impl ListQuery {
    fn from_context(ctx: &RequestContext) -> Self {
        Self {
            search: ctx
                .query("search")
                .filter(|search| !search.is_empty())
                .map(str::to_string),
            random: ctx
                .query("random")
                .is_some_and(|random| random.eq_ignore_ascii_case("true")),
            // anything that isn't a count means no limit
            limit: ctx.query("limit").and_then(|limit| limit.parse().ok()),
        }
    }
}

/// Lists, searches or samples a partition. Search wins over random when both
/// are given.
pub struct ListQuotes {
    store: QuoteStore,
}

impl ListQuotes {
    pub fn new(store: QuoteStore) -> Self {
        Self { store }
    }

    async fn list(&self, partition: &Partition, query: &ListQuery) -> Result<Vec<Quote>, AppError> {
        let Partition { guild_id, user_id } = partition;

        let mut quotes = if let Some(search) = &query.search {
            self.store.search(guild_id, user_id, search).await
        } else if query.random {
            self.store.get_random(guild_id, user_id).await.map(|quote| vec![quote])
        } else {
            self.store.get_all(guild_id, user_id).await
        }
        .map_err(store_error("get quotes failed"))?;

        if quotes.is_empty() {
            return Err(AppError::NotFound(format!(
                "no quotes for guild {guild_id} user {user_id}"
            )));
        }

        if let Some(limit) = query.limit {
            quotes.truncate(limit);
        }

        Ok(quotes)
    }
}

#[async_trait]
impl Gate for ListQuotes {
    fn name(&self) -> &str {
        "list-quotes"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Verdict {
        let partition = match Partition::from_context(ctx) {
            Ok(partition) => partition,
            Err(err) => return Verdict::Stop(err),
        };
        let query = ListQuery::from_context(ctx);

        match self.list(&partition, &query).await {
            Ok(quotes) => {
                ctx.respond(Json(quotes));
                Verdict::Continue
            }
            Err(err) => Verdict::Stop(err),
        }
    }
}

/// Appends the quote in the JSON body to the partition.
pub struct AddQuote {
    store: QuoteStore,
}

impl AddQuote {
    pub fn new(store: QuoteStore) -> Self {
        Self { store }
    }

    fn parse(ctx: &RequestContext) -> Result<(Partition, Quote), AppError> {
        if !is_json_content(&ctx.headers) {
            return Err(AppError::BadRequest("expected json body".to_string()));
        }

        let partition = Partition::from_context(ctx)?;
        let quote = Quote::from_json(&ctx.body, &partition.user_id)?;

        Ok((partition, quote))
    }
}

#[async_trait]
impl Gate for AddQuote {
    fn name(&self) -> &str {
        "add-quote"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Verdict {
        let (partition, quote) = match Self::parse(ctx) {
            Ok(parsed) => parsed,
            Err(err) => return Verdict::Stop(err),
        };

        let result = self
            .store
            .push(&partition.guild_id, &partition.user_id, &quote)
            .await
            .map_err(store_error("add quote failed"));

        match result {
            Ok(()) => {
                tracing::info!(quote_id = %quote.id, guild_id = %partition.guild_id, "added quote");
                ctx.respond(StatusCode::OK);
                Verdict::Continue
            }
            Err(err) => Verdict::Stop(err),
        }
    }
}

/// Removes every stored quote structurally equal to the JSON body. Matching
/// nothing still succeeds.
pub struct RemoveQuote {
    store: QuoteStore,
}

impl RemoveQuote {
    pub fn new(store: QuoteStore) -> Self {
        Self { store }
    }

    fn parse(ctx: &RequestContext) -> Result<(Partition, Quote), AppError> {
        let partition = Partition::from_context(ctx)?;
        let quote = Quote::from_json(&ctx.body, &partition.user_id)?;

        Ok((partition, quote))
    }
}

#[async_trait]
impl Gate for RemoveQuote {
    fn name(&self) -> &str {
        "remove-quote"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Verdict {
        let (partition, quote) = match Self::parse(ctx) {
            Ok(parsed) => parsed,
            Err(err) => return Verdict::Stop(err),
        };

        let result = self
            .store
            .remove(&partition.guild_id, &partition.user_id, &quote)
            .await
            .map_err(store_error("rm quote failed"));

        match result {
            Ok(()) => {
                ctx.respond(StatusCode::OK);
                Verdict::Continue
            }
            Err(err) => Verdict::Stop(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method, Uri};

    fn get(uri: &'static str) -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static(uri))
    }

    #[test]
    fn list_query_defaults() {
        assert_eq!(
            ListQuery::from_context(&get("/quotes/g/u")),
            ListQuery {
                search: None,
                random: false,
                limit: None,
            }
        );
    }

    #[test]
    fn list_query_parses_options() {
        assert_eq!(
            ListQuery::from_context(&get("/quotes/g/u?search=hi&random=TRUE&limit=3")),
            ListQuery {
                search: Some("hi".to_string()),
                random: true,
                limit: Some(3),
            }
        );
    }

    #[test]
    fn list_query_ignores_junk() {
        assert_eq!(
            ListQuery::from_context(&get("/quotes/g/u?search=&random=yes&limit=-1")),
            ListQuery {
                search: None,
                random: false,
                limit: None,
            }
        );
    }

    #[test]
    fn add_fills_author_from_path() {
        let ctx = RequestContext::new(Method::POST, Uri::from_static("/quotes/g/u"))
            .with_param("guild_id", "g")
            .with_param("user_id", "u")
            .with_header(CONTENT_TYPE, "application/json")
            .with_body(r#"{"str":"hi"}"#);

        let (partition, quote) = AddQuote::parse(&ctx).unwrap();
        assert_eq!(partition.guild_id, "g");
        assert_eq!(quote.author_id, "u");
        assert_eq!(quote.text, "hi");
    }

    #[test]
    fn remove_does_not_need_content_type() {
        let ctx = RequestContext::new(Method::DELETE, Uri::from_static("/quotes/g/u"))
            .with_param("guild_id", "g")
            .with_param("user_id", "u")
            .with_body(r#"{"str":"hi"}"#);

        assert!(RemoveQuote::parse(&ctx).is_ok());
        assert!(matches!(AddQuote::parse(&ctx), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn json_content_types() {
        let mut headers = HeaderMap::new();
        assert!(!is_json_content(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json_content(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/json"));
        assert!(is_json_content(&headers));

        headers.append(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_json_content(&headers));
    }
}
