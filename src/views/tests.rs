//! Tests for the view engine

use super::*;
use crate::web::flash::FlashMessage;
use std::fs;
use tempfile::TempDir;

fn engine() -> ViewEngine {
    ViewEngine::new(None, chrono_tz::UTC).expect("Failed to load embedded templates")
}

#[test]
fn test_embedded_templates_load() {
    let engine = engine();
    for name in [
        "base.html",
        "login.html",
        "register.html",
        "dashboard.html",
        "time_entry_form.html",
        "time_entry_confirm_delete.html",
        "admin_dashboard.html",
        "pay_report.html",
        "error.html",
    ] {
        assert!(
            engine.tera.get_template_names().any(|t| t == name),
            "missing template {}",
            name
        );
    }
}

#[test]
fn test_fixed_filter() {
    let mut args = HashMap::new();
    assert_eq!(fixed_filter(&Value::from(8.5), &args).unwrap(), Value::from("8.50"));

    args.insert("places".to_string(), Value::from(1));
    assert_eq!(fixed_filter(&Value::from(105.0), &args).unwrap(), Value::from("105.0"));

    assert!(fixed_filter(&Value::from("x"), &args).is_err());
}

#[test]
fn test_localtime_filter() {
    let args = HashMap::new();
    let value = Value::from("2024-07-01T13:00:00Z");
    assert_eq!(
        localtime_filter(&value, &args, chrono_tz::America::New_York).unwrap(),
        Value::from("2024-07-01 09:00")
    );
    assert_eq!(
        localtime_filter(&Value::Null, &args, chrono_tz::UTC).unwrap(),
        Value::from("")
    );
}

#[test]
fn test_render_page_includes_user_and_messages() {
    let engine = engine();
    let mut context = TeraContext::new();
    context.insert("status", &404);
    context.insert("title", "Not Found");
    context.insert("error_message", "Gone fishing");

    let vars = StandardTemplateVars::new("/nowhere/")
        .with_user(CurrentUser {
            id: 1,
            username: "erin".to_string(),
            is_staff: true,
        })
        .with_messages(vec![FlashMessage::success("Clocked in successfully!")]);

    let html = engine.render_page("error.html", &context, &vars).unwrap();
    assert!(html.contains("Gone fishing"));
    assert!(html.contains("erin"));
    assert!(html.contains("/admin-dashboard/"));
    assert!(html.contains("Clocked in successfully!"));
}

#[test]
fn test_render_escapes_html() {
    let engine = engine();
    let vars = StandardTemplateVars::new("/");
    let html = engine.render_error(400, "Bad Request", "<script>x</script>", &vars);
    assert!(!html.contains("<script>x</script>"));
    assert!(html.contains("&lt;script&gt;"));
}

#[test]
fn test_override_directory_replaces_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("error.html"),
        "custom {{ status }} {{ error_message }}",
    )
    .unwrap();

    let engine = ViewEngine::new(Some(temp_dir.path()), chrono_tz::UTC).unwrap();
    let html = engine.render_error(404, "Not Found", "missing", &StandardTemplateVars::new("/"));
    assert_eq!(html, "custom 404 missing");
}

#[test]
fn test_render_missing_template_fails() {
    let engine = engine();
    assert!(engine.render("nope.html", &TeraContext::new()).is_err());
}
