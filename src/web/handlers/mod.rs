//! Request handlers
//!
//! - `auth`: registration, login, logout
//! - `dashboard`: personal dashboard, clock in/out
//! - `entries`: time entry create/edit/delete
//! - `staff`: staff dashboard and pay report

pub mod auth;
pub mod dashboard;
pub mod entries;
pub mod staff;

use axum::response::Html;
use tera::Context as TeraContext;

use super::error::WebError;
use super::middleware::AppState;
use crate::views::StandardTemplateVars;

/// Render a page with the standard variables
pub(crate) fn render(
    state: &AppState,
    template: &str,
    context: &TeraContext,
    vars: &StandardTemplateVars,
) -> Result<Html<String>, WebError> {
    let html = state.views.render_page(template, context, vars)?;
    Ok(Html(html))
}
