use axum::{routing::get, Router};

use crate::{
    gate::{GuildAccessGate, RequestContext, Route},
    store::QuoteStore,
};

pub mod quotes;
pub mod status;

/// Every quote route is logged, then checked for guild access, then handled.
pub fn router(store: QuoteStore, access: GuildAccessGate) -> Router {
    let base = Route::new().log().gate(access);

    let list = base.clone().finish(quotes::ListQuotes::new(store.clone()));
    let add = base.clone().finish(quotes::AddQuote::new(store.clone()));
    let remove = base.finish(quotes::RemoveQuote::new(store));

    Router::new().route("/status", get(status::status)).route(
        "/quotes/{guild_id}/{user_id}",
        get(move |ctx: RequestContext| async move { list.run(ctx).await })
            .post(move |ctx: RequestContext| async move { add.run(ctx).await })
            .delete(move |ctx: RequestContext| async move { remove.run(ctx).await }),
    )
}
