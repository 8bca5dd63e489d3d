//! Web middleware and extractors
//!
//! Contains middleware for:
//! - Session loading (cookie token to account)
//! - Flash message delivery
//! - Rendering error pages for handler failures
//!
//! and the `CurrentAccount` / `StaffAccount` extractors that guard handlers.

use axum::{
    body::Body,
    extract::{FromRequestParts, Path, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::error::{ErrorPage, WebError};
use super::flash::{self, IncomingFlash, CLEAR_FLASH_COOKIE};
use crate::models::Account;
use crate::services::{AccountService, ReportService, TimeEntryService};
use crate::views::{CurrentUser, StandardTemplateVars, ViewEngine};

pub const SESSION_COOKIE: &str = "session";

/// Request-independent web settings taken from the configuration
#[derive(Debug, Clone, Default)]
pub struct WebSettings {
    /// Add `Secure` to the session cookie
    pub secure_cookie: bool,
    /// Store the clock-in form's description instead of an empty one
    pub capture_clock_in_description: bool,
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub entries: Arc<TimeEntryService>,
    pub reports: Arc<ReportService>,
    pub views: Arc<ViewEngine>,
    pub settings: Arc<WebSettings>,
}

/// Account resolved from the session cookie
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount(pub Account);

/// Value of cookie `name`, if present
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|c| c.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub const CLEAR_SESSION_COOKIE: &str = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

/// Resolve the session cookie and stash the account in request extensions
pub async fn load_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = cookie_value(request.headers(), SESSION_COOKIE) {
        match state.accounts.validate_session(&token).await {
            Ok(Some(account)) => {
                request.extensions_mut().insert(AuthenticatedAccount(account));
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Hand pending flash messages to the handler and clear the cookie once shown
pub async fn flash_messages(mut request: Request, next: Next) -> Response {
    let incoming = flash::read(request.headers());
    let pending = !incoming.is_empty();
    request.extensions_mut().insert(IncomingFlash(incoming));

    let mut response = next.run(request).await;

    // A redirect keeps the messages for the page it leads to
    if pending && !response.status().is_redirection() && !flash::sets_cookie(response.headers()) {
        response
            .headers_mut()
            .append(header::SET_COOKIE, HeaderValue::from_static(CLEAR_FLASH_COOKIE));
    }
    response
}

/// Replace the body of `WebError` responses with the rendered error page
pub async fn error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let vars = standard_vars(request.uri().path(), request.extensions().get::<AuthenticatedAccount>(), Vec::new());
    let mut response = next.run(request).await;

    if let Some(page) = response.extensions_mut().remove::<ErrorPage>() {
        let html = state
            .views
            .render_error(response.status().as_u16(), page.title, &page.message, &vars);
        let (parts, _) = response.into_parts();
        let mut response = Response::from_parts(parts, Body::from(html));
        response.headers_mut().remove(header::CONTENT_LENGTH);
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        return response;
    }
    response
}

fn standard_vars(path: &str, account: Option<&AuthenticatedAccount>, messages: Vec<flash::FlashMessage>) -> StandardTemplateVars {
    let mut vars = StandardTemplateVars::new(path).with_messages(messages);
    if let Some(AuthenticatedAccount(account)) = account {
        vars = vars.with_user(CurrentUser::from(account));
    }
    vars
}

/// Logged-in account; anonymous requests are sent to the login page
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedAccount>()
            .map(|a| CurrentAccount(a.0.clone()))
            .ok_or_else(|| WebError::LoginRequired {
                next: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string()),
            })
    }
}

/// Logged-in staff account; other accounts get 403
#[derive(Debug, Clone)]
pub struct StaffAccount(pub Account);

impl<S> FromRequestParts<S> for StaffAccount
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentAccount(account) = CurrentAccount::from_request_parts(parts, state).await?;
        if !account.can_view_staff_pages() {
            return Err(WebError::Forbidden);
        }
        Ok(StaffAccount(account))
    }
}

/// Numeric `{entry_id}` path segment; anything else is a 404
#[derive(Debug, Clone, Copy)]
pub struct EntryId(pub i64);

impl<S> FromRequestParts<S> for EntryId
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| WebError::NotFound)?;
        Ok(EntryId(id))
    }
}

/// Standard template variables for the page being rendered
#[derive(Debug, Clone)]
pub struct PageVars(pub StandardTemplateVars);

impl<S> FromRequestParts<S> for PageVars
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let messages = parts
            .extensions
            .get::<IncomingFlash>()
            .map(|f| f.0.clone())
            .unwrap_or_default();
        Ok(PageVars(standard_vars(
            parts.uri.path(),
            parts.extensions.get::<AuthenticatedAccount>(),
            messages,
        )))
    }
}

/// Only same-site paths are followed after login
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}
