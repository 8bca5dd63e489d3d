//! Personal dashboard and clocking in/out

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Form,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::Context as TeraContext;

use super::render;
use crate::forms::ClockInForm;
use crate::models::TimeEntry;
use crate::services::TimeEntryServiceError;
use crate::web::error::WebError;
use crate::web::flash::{self, FlashMessage};
use crate::web::middleware::{AppState, CurrentAccount, EntryId, PageVars};

/// Time entry with its hours as of the request
#[derive(Debug, Serialize)]
pub struct EntryRow {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub hours: f64,
}

impl EntryRow {
    pub fn new(entry: TimeEntry, now: DateTime<Utc>) -> Self {
        let hours = entry.hours(now);
        Self { entry, hours }
    }
}

/// GET /
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    vars: PageVars,
) -> Result<Response, WebError> {
    let now = Utc::now();
    let summary = state.entries.dashboard(account.id, now).await?;

    let mut context = TeraContext::new();
    context.insert("active_entry", &summary.active_entry.map(|e| EntryRow::new(e, now)));
    context.insert("week_hours", &summary.week_hours);
    context.insert("month_hours", &summary.month_hours);
    context.insert("week", &summary.week);
    context.insert("month", &summary.month);
    let recent: Vec<EntryRow> = summary
        .recent_entries
        .into_iter()
        .map(|e| EntryRow::new(e, now))
        .collect();
    context.insert("recent_entries", &recent);
    context.insert("capture_description", &state.settings.capture_clock_in_description);

    Ok(render(&state, "dashboard.html", &context, &vars.0)?.into_response())
}

/// POST /clock-in/
pub async fn clock_in(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Form(form): Form<ClockInForm>,
) -> Result<Response, WebError> {
    let description = if state.settings.capture_clock_in_description {
        form.description()
    } else {
        String::new()
    };

    match state.entries.clock_in(account.id, description, Utc::now()).await {
        Ok(_) => Ok(flash::redirect_with("/", FlashMessage::success("Clocked in successfully!"))),
        Err(e @ TimeEntryServiceError::AlreadyClockedIn) => {
            Ok(flash::redirect_with("/", FlashMessage::warning(e.to_string())))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /clock-out/{entry_id}/
pub async fn clock_out(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    EntryId(entry_id): EntryId,
) -> Result<Response, WebError> {
    let now = Utc::now();
    let entry = state.entries.clock_out(account.id, entry_id, now).await?;
    Ok(flash::redirect_with(
        "/",
        FlashMessage::success(format!(
            "Clocked out successfully! Total time: {:.2} hours",
            entry.hours(now)
        )),
    ))
}
