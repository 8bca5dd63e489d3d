//! Handler errors
//!
//! Every failure is recovered at the handler boundary: validation problems are
//! re-rendered by the handlers themselves, everything else becomes a
//! `WebError`. Its response carries an [`ErrorPage`] extension that the
//! `error_pages` middleware turns into HTML.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::services::{AccountServiceError, ReportServiceError, TimeEntryServiceError};

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Anonymous request to a protected page
    #[error("Login required")]
    LoginRequired { next: String },

    #[error("Permission denied")]
    Forbidden,

    #[error("Page not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Marker picked up by the error page middleware
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub title: &'static str,
    pub message: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, title, message) = match self {
            WebError::LoginRequired { next } => {
                let location = format!("/login/?next={}", urlencoding::encode(&next));
                return Redirect::to(&location).into_response();
            }
            WebError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                "You do not have permission to view this page.".to_string(),
            ),
            WebError::NotFound => (
                StatusCode::NOT_FOUND,
                "Not Found",
                "The requested page was not found.".to_string(),
            ),
            WebError::BadRequest(message) => (StatusCode::BAD_REQUEST, "Bad Request", message),
            WebError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server Error",
                    "Something went wrong. Please try again later.".to_string(),
                )
            }
        };

        let mut response = (status, message.clone()).into_response();
        response.extensions_mut().insert(ErrorPage { title, message });
        response
    }
}

impl From<TimeEntryServiceError> for WebError {
    fn from(e: TimeEntryServiceError) -> Self {
        match e {
            TimeEntryServiceError::NotFound => WebError::NotFound,
            TimeEntryServiceError::Internal(e) => WebError::Internal(e),
            other => WebError::BadRequest(other.to_string()),
        }
    }
}

impl From<AccountServiceError> for WebError {
    fn from(e: AccountServiceError) -> Self {
        match e {
            AccountServiceError::Internal(e) => WebError::Internal(e),
            AccountServiceError::NotFound(_) => WebError::NotFound,
            other => WebError::BadRequest(other.to_string()),
        }
    }
}

impl From<ReportServiceError> for WebError {
    fn from(e: ReportServiceError) -> Self {
        match e {
            ReportServiceError::Internal(e) => WebError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn test_login_required_redirects_with_next() {
        let response = WebError::LoginRequired {
            next: "/time-entry/create/".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login/?next=%2Ftime-entry%2Fcreate%2F"
        );
    }

    #[test]
    fn test_error_page_marker() {
        let response = WebError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.extensions().get::<ErrorPage>().unwrap().title, "Not Found");
    }

    #[test]
    fn test_service_error_mapping() {
        assert!(matches!(WebError::from(TimeEntryServiceError::NotFound), WebError::NotFound));
        assert!(matches!(
            WebError::from(TimeEntryServiceError::AlreadyClockedIn),
            WebError::BadRequest(_)
        ));
    }
}
