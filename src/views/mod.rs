//! View engine
//!
//! Server-side HTML rendering using Tera.
//! Features:
//! - Templates embedded in the binary
//! - Optional override directory (same file name replaces the embedded page)
//! - `fixed` and `localtime` filters for hours, money and timestamps
//! - Standard template variables (current user, flash messages)

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera, Value};

use crate::models::Account;
use crate::web::flash::FlashMessage;

mod error;

pub use error::ViewError;

/// Page templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template renderer
pub struct ViewEngine {
    tera: Tera,
}

impl ViewEngine {
    /// Load the embedded templates, then any `.html` files in `override_path`
    pub fn new(override_path: Option<&Path>, tz: Tz) -> Result<Self> {
        let mut templates: Vec<(String, String)> = Vec::new();

        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| ViewError::TemplateError(format!("Missing embedded template {}", name)))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| ViewError::TemplateError(format!("Template {} is not UTF-8", name)))?;
            templates.push((name.to_string(), content));
        }

        if let Some(dir) = override_path {
            let overrides = collect_templates_from_dir(dir, dir)?;
            tracing::info!("Loaded {} template override(s) from {:?}", overrides.len(), dir);
            for (name, content) in overrides {
                templates.retain(|(existing, _)| existing != &name);
                templates.push((name, content));
            }
        }

        let mut tera = Tera::default();
        for (name, content) in &templates {
            tera.add_raw_template(name, content)
                .map_err(|e| ViewError::TemplateError(format!("Failed to add template {}: {}", name, e)))?;
        }
        tera.build_inheritance_chains()
            .map_err(|e| ViewError::TemplateError(format!("Failed to build template inheritance: {}", e)))?;

        tera.register_filter("fixed", fixed_filter);
        tera.register_filter(
            "localtime",
            move |value: &Value, args: &HashMap<String, Value>| localtime_filter(value, args, tz),
        );

        Ok(Self { tera })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ViewError::TemplateError(error_msg).into()
        })
    }

    /// Render a page with the standard variables added to `context`
    pub fn render_page(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("current_user", &standard_vars.current_user);
        full_context.insert("messages", &standard_vars.messages);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        self.render(template, &full_context)
    }

    /// Render `error.html`, falling back to a plain page if that fails too
    pub fn render_error(&self, status: u16, title: &str, message: &str, standard_vars: &StandardTemplateVars) -> String {
        let mut context = TeraContext::new();
        context.insert("status", &status);
        context.insert("title", title);
        context.insert("error_message", message);

        match self.render_page("error.html", &context, standard_vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render error template: {}, returning simple HTML error page", e);
                simple_error_page(status, title)
            }
        }
    }
}

fn collect_templates_from_dir(base_path: &Path, current_path: &Path) -> Result<Vec<(String, String)>> {
    let mut templates = Vec::new();
    if !current_path.exists() {
        return Ok(templates);
    }

    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read template directory: {:?}", current_path))?
    {
        let path = entry?.path();
        if path.is_dir() {
            templates.extend(collect_templates_from_dir(base_path, &path)?);
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ViewError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((template_name, content));
        }
    }

    Ok(templates)
}

/// `{{ hours | fixed }}` -> "8.50"; `{{ pct | fixed(places=1) }}` -> "105.0"
fn fixed_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let number = value
        .as_f64()
        .ok_or_else(|| tera::Error::msg(format!("fixed: expected a number, got {}", value)))?;
    let places = args.get("places").and_then(Value::as_u64).unwrap_or(2) as usize;
    Ok(Value::String(format!("{:.*}", places, number)))
}

/// Format a stored UTC timestamp in the configured zone
fn localtime_filter(value: &Value, args: &HashMap<String, Value>, tz: Tz) -> tera::Result<Value> {
    let raw = match value {
        Value::Null => return Ok(Value::String(String::new())),
        Value::String(s) => s,
        other => return Err(tera::Error::msg(format!("localtime: expected a timestamp, got {}", other))),
    };
    let instant = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| tera::Error::msg(format!("localtime: invalid timestamp {}: {}", raw, e)))?;
    let format = args
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("%Y-%m-%d %H:%M");
    Ok(Value::String(instant.with_timezone(&tz).format(format).to_string()))
}

fn simple_error_page(status: u16, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{status} {title}</title></head>
<body><h1>{status} {title}</h1></body>
</html>"#,
        status = status,
        title = tera::escape_html(title)
    )
}

/// Variables every page receives
#[derive(Debug, Clone, Default)]
pub struct StandardTemplateVars {
    pub current_user: Option<CurrentUser>,
    /// Flash messages to show once
    pub messages: Vec<FlashMessage>,
    pub request_path: String,
    /// Current year (for the footer)
    pub year: i32,
}

/// Logged-in account as seen by templates
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&Account> for CurrentUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            is_staff: account.can_view_staff_pages(),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>) -> Self {
        Self {
            current_user: None,
            messages: Vec::new(),
            request_path: request_path.into(),
            year: Utc::now().year(),
        }
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.current_user = Some(user);
        self
    }

    pub fn with_messages(mut self, messages: Vec<FlashMessage>) -> Self {
        self.messages = messages;
        self
    }
}

#[cfg(test)]
mod tests;
