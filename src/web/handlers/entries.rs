//! Time entry create, edit and delete
//!
//! Every lookup is scoped to the requesting account, so foreign entries are
//! indistinguishable from missing ones (404).

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Form,
};
use tera::Context as TeraContext;

use super::render;
use crate::forms::{FormErrors, TimeEntryForm};
use crate::models::TimeEntry;
use crate::services::TimeEntryServiceError;
use crate::web::error::WebError;
use crate::web::flash::{self, FlashMessage};
use crate::web::middleware::{AppState, CurrentAccount, EntryId, PageVars};

fn render_form(
    state: &AppState,
    vars: &PageVars,
    form: &TimeEntryForm,
    errors: &FormErrors,
    entry: Option<&TimeEntry>,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("entry", &entry);
    context.insert("title", if entry.is_some() { "Edit Time Entry" } else { "Create Time Entry" });
    Ok(render(state, "time_entry_form.html", &context, &vars.0)?.into_response())
}

/// Map service rejections of the submitted values back onto the form
fn form_error(e: TimeEntryServiceError) -> Result<FormErrors, WebError> {
    match e {
        err @ (TimeEntryServiceError::InvalidTimes(_) | TimeEntryServiceError::OpenEntryExists) => {
            let mut errors = FormErrors::new();
            errors.add_non_field(err.to_string());
            Ok(errors)
        }
        other => Err(other.into()),
    }
}

/// GET /time-entry/create/
pub async fn create_page(
    State(state): State<AppState>,
    CurrentAccount(_account): CurrentAccount,
    vars: PageVars,
) -> Result<Response, WebError> {
    render_form(&state, &vars, &TimeEntryForm::default(), &FormErrors::new(), None)
}

/// POST /time-entry/create/
pub async fn create(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    vars: PageVars,
    Form(form): Form<TimeEntryForm>,
) -> Result<Response, WebError> {
    let input = match form.validate(state.entries.timezone()) {
        Ok(input) => input,
        Err(errors) => return render_form(&state, &vars, &form, &errors, None),
    };

    match state.entries.create(account.id, input).await {
        Ok(_) => Ok(flash::redirect_with("/", FlashMessage::success("Time entry created successfully!"))),
        Err(e) => {
            let errors = form_error(e)?;
            render_form(&state, &vars, &form, &errors, None)
        }
    }
}

/// GET /time-entry/{entry_id}/edit/
pub async fn edit_page(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    vars: PageVars,
    EntryId(entry_id): EntryId,
) -> Result<Response, WebError> {
    let entry = state.entries.get(account.id, entry_id).await?;
    let form = TimeEntryForm::from_entry(&entry, state.entries.timezone());
    render_form(&state, &vars, &form, &FormErrors::new(), Some(&entry))
}

/// POST /time-entry/{entry_id}/edit/
pub async fn edit(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    vars: PageVars,
    EntryId(entry_id): EntryId,
    Form(form): Form<TimeEntryForm>,
) -> Result<Response, WebError> {
    let entry = state.entries.get(account.id, entry_id).await?;
    let input = match form.validate(state.entries.timezone()) {
        Ok(input) => input,
        Err(errors) => return render_form(&state, &vars, &form, &errors, Some(&entry)),
    };

    match state.entries.update(account.id, entry_id, input).await {
        Ok(_) => Ok(flash::redirect_with("/", FlashMessage::success("Time entry updated successfully!"))),
        Err(e) => {
            let errors = form_error(e)?;
            render_form(&state, &vars, &form, &errors, Some(&entry))
        }
    }
}

/// GET /time-entry/{entry_id}/delete/
///
/// Confirmation page only; nothing is deleted.
pub async fn delete_page(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    vars: PageVars,
    EntryId(entry_id): EntryId,
) -> Result<Response, WebError> {
    let entry = state.entries.get(account.id, entry_id).await?;
    let mut context = TeraContext::new();
    context.insert("entry", &entry);
    Ok(render(&state, "time_entry_confirm_delete.html", &context, &vars.0)?.into_response())
}

/// POST /time-entry/{entry_id}/delete/
pub async fn delete(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    EntryId(entry_id): EntryId,
) -> Result<Response, WebError> {
    state.entries.delete(account.id, entry_id).await?;
    Ok(flash::redirect_with("/", FlashMessage::success("Time entry deleted successfully!")))
}
