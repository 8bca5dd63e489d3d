//! Registration, login and logout

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::render;
use crate::forms::{FormErrors, LoginForm, RegistrationForm};
use crate::models::Session;
use crate::services::AccountServiceError;
use crate::web::error::WebError;
use crate::web::flash::{self, FlashMessage};
use crate::web::middleware::{
    cookie_value, safe_next, session_cookie, AppState, PageVars,
    CLEAR_SESSION_COOKIE, SESSION_COOKIE,
};

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn with_session_cookie(mut response: Response, state: &AppState, session: &Session) -> Result<Response, WebError> {
    let cookie = session_cookie(&session.id, session.max_age_seconds(), state.settings.secure_cookie);
    let value = HeaderValue::from_str(&cookie).map_err(|e| anyhow::anyhow!("Invalid session cookie: {}", e))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

fn render_login(state: &AppState, vars: &PageVars, form: &LoginForm, errors: &FormErrors) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("next", &form.next);
    Ok(render(state, "login.html", &context, &vars.0)?.into_response())
}

/// GET /login/
pub async fn login_page(
    State(state): State<AppState>,
    vars: PageVars,
    Query(query): Query<NextQuery>,
) -> Result<Response, WebError> {
    if vars.0.current_user.is_some() {
        return Ok(Redirect::to(&safe_next(query.next.as_deref())).into_response());
    }
    let form = LoginForm {
        next: query.next,
        ..Default::default()
    };
    render_login(&state, &vars, &form, &FormErrors::new())
}

/// POST /login/
pub async fn login(
    State(state): State<AppState>,
    vars: PageVars,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    if let Err(errors) = form.validate() {
        return render_login(&state, &vars, &form, &errors);
    }

    match state.accounts.login(&form.username, &form.password).await {
        Ok((account, session)) => {
            tracing::info!(username = %account.username, "Login succeeded");
            let response = Redirect::to(&safe_next(form.next.as_deref())).into_response();
            with_session_cookie(response, &state, &session)
        }
        Err(e @ (AccountServiceError::InvalidCredentials | AccountServiceError::Inactive)) => {
            tracing::info!(username = %form.username.trim(), "Login refused: {}", e);
            let mut errors = FormErrors::new();
            errors.add_non_field(e.to_string());
            render_login(&state, &vars, &form, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /logout/
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        state.accounts.logout(&token).await?;
    }
    let mut response = Redirect::to("/login/").into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, HeaderValue::from_static(CLEAR_SESSION_COOKIE));
    Ok(response)
}

fn render_register(
    state: &AppState,
    vars: &PageVars,
    form: &RegistrationForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    Ok(render(state, "register.html", &context, &vars.0)?.into_response())
}

/// GET /register/
pub async fn register_page(State(state): State<AppState>, vars: PageVars) -> Result<Response, WebError> {
    render_register(&state, &vars, &RegistrationForm::default(), &FormErrors::new())
}

/// POST /register/
///
/// A successful registration logs the new account in.
pub async fn register(
    State(state): State<AppState>,
    vars: PageVars,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, WebError> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return render_register(&state, &vars, &form, &errors),
    };

    let account = match state.accounts.create_account(input).await {
        Ok(account) => account,
        Err(e) => {
            let mut errors = FormErrors::new();
            match e {
                AccountServiceError::InvalidUsername(msg) => errors.add("username", msg),
                err @ AccountServiceError::UsernameTaken => errors.add("username", err.to_string()),
                AccountServiceError::InvalidEmail(msg) => errors.add("email", msg),
                err @ AccountServiceError::EmailTaken => errors.add("email", err.to_string()),
                AccountServiceError::WeakPassword(messages) => {
                    for message in messages {
                        errors.add("password2", message);
                    }
                }
                other => return Err(other.into()),
            }
            return render_register(&state, &vars, &form, &errors);
        }
    };

    let session = state.accounts.create_session(account.id).await?;
    tracing::info!(username = %account.username, "Account registered");
    let response = flash::redirect_with("/", FlashMessage::success("Registration successful!"));
    with_session_cookie(response, &state, &session)
}
