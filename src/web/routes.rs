use axum::{routing::post, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::AccountCommandService;
use crate::web::handlers::{close_account, deposit_fund, open_account, withdraw_fund};

pub fn create_router(service: Arc<AccountCommandService>) -> Router {
    Router::new()
        .route("/account", post(open_account))
        .route("/deposit", post(deposit_fund))
        .route("/withdraw", post(withdraw_fund))
        .route("/close", post(close_account))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
