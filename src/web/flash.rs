//! One-shot messages carried across a redirect
//!
//! Messages travel in the `flash` cookie as `level:text` pairs joined by `|`,
//! with the text URL-encoded. The cookie is cleared by the first page that
//! displays them.

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;

use super::middleware::cookie_value;

pub const FLASH_COOKIE: &str = "flash";
pub const CLEAR_FLASH_COOKIE: &str = "flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Warning,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Warning => "warning",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Level::Success),
            "warning" => Some(Level::Warning),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self { level: Level::Success, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: Level::Warning, text: text.into() }
    }
}

/// Messages pending for the current request, set by the flash middleware
#[derive(Debug, Clone, Default)]
pub struct IncomingFlash(pub Vec<FlashMessage>);

pub fn encode(messages: &[FlashMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}:{}", m.level.as_str(), urlencoding::encode(&m.text)))
        .collect::<Vec<_>>()
        .join("|")
}

/// Decode a cookie value; malformed parts are skipped
pub fn decode(raw: &str) -> Vec<FlashMessage> {
    raw.split('|')
        .filter_map(|part| {
            let (level, text) = part.split_once(':')?;
            let level = Level::parse(level)?;
            let text = urlencoding::decode(text).ok()?.into_owned();
            Some(FlashMessage { level, text })
        })
        .collect()
}

/// Messages in the request's flash cookie
pub fn read(headers: &HeaderMap) -> Vec<FlashMessage> {
    cookie_value(headers, FLASH_COOKIE)
        .map(|raw| decode(&raw))
        .unwrap_or_default()
}

/// Whether a response already writes the flash cookie
pub fn sets_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("flash="))
}

/// Redirect to `location`, showing `message` on the next page
pub fn redirect_with(location: &str, message: FlashMessage) -> Response {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=60",
        FLASH_COOKIE,
        encode(std::slice::from_ref(&message))
    );
    let mut response = Redirect::to(location).into_response();
    // The encoded value is ASCII, so this only fails on a bug in `encode`
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let messages = vec![
            FlashMessage::success("Clocked out successfully! Total time: 8.50 hours"),
            FlashMessage::warning("a|b:c"),
        ];
        let raw = encode(&messages);
        assert!(!raw.contains(' '));
        assert_eq!(decode(&raw), messages);
    }

    #[test]
    fn test_decode_skips_garbage() {
        let decoded = decode("bogus|loud:hello|warning:ok");
        assert_eq!(decoded, vec![FlashMessage::warning("ok")]);
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_redirect_sets_cookie() {
        let response = redirect_with("/", FlashMessage::success("Clocked in successfully!"));
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert!(sets_cookie(response.headers()));
        assert_eq!(response.headers()[header::LOCATION], "/");
    }
}
