use axum::routing::{delete, get, post};
use axum::Router;

pub mod admin;
pub mod auth;
pub mod error;
pub mod join;
pub mod pages;
pub mod state;

pub use state::AppState;

async fn health() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/service-account-email", get(admin::service_account_email))
        .route("/admin", get(admin::admin_page))
        .route("/spreadsheets", get(admin::list).post(admin::register))
        .route(
            "/spreadsheets/{id}",
            get(admin::get).patch(admin::update).delete(admin::delete),
        )
        .route("/spreadsheets/{id}/rotate", post(admin::rotate))
        .route("/spreadsheets/{id}/bans", post(admin::ban))
        .route("/spreadsheets/{id}/bans/{user_id}", delete(admin::unban))
        .route("/join/{token}", get(join::join_page).post(join::join))
        .with_state(state)
}
