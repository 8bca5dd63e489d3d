//! Web layer - HTML handlers and routing
//!
//! Server-rendered pages for:
//! - Registration, login and logout
//! - The personal dashboard with clock in/out
//! - Time entry create/edit/delete
//! - The staff dashboard and pay report

pub mod error;
pub mod flash;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use error::WebError;
pub use middleware::{AppState, CurrentAccount, StaffAccount, WebSettings};

use handlers::{auth, dashboard, entries, staff};

/// 404 for every unknown path
async fn not_found() -> WebError {
    WebError::NotFound
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/register/", get(auth::register_page).post(auth::register))
        .route("/login/", get(auth::login_page).post(auth::login))
        .route("/logout/", post(auth::logout))
        .route("/clock-in/", post(dashboard::clock_in))
        .route("/clock-out/{entry_id}/", post(dashboard::clock_out))
        .route("/time-entry/create/", get(entries::create_page).post(entries::create))
        .route("/time-entry/{entry_id}/edit/", get(entries::edit_page).post(entries::edit))
        .route("/time-entry/{entry_id}/delete/", get(entries::delete_page).post(entries::delete))
        .route("/admin-dashboard/", get(staff::admin_dashboard))
        .route("/pay-report/", get(staff::pay_report))
        .fallback(not_found)
        // Innermost: needs the account that load_session resolved
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::error_pages))
        .layer(axum_middleware::from_fn(middleware::flash_messages))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::load_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
