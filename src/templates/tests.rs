//! Template engine tests

use super::*;
use crate::models::{Category, Page};
use tempfile::TempDir;

fn category(id: i64, name: &str, slug: &str, likes: i64) -> Category {
    let mut c = Category::new(name.to_string(), slug.to_string());
    c.id = id;
    c.likes = likes;
    c
}

fn standard_vars() -> StandardTemplateVars {
    StandardTemplateVars::new(
        "/rango/",
        vec![
            category(1, "Python", "python", 64),
            category(2, "Django", "django", 32),
        ],
    )
}

#[test]
fn test_embedded_templates_load() {
    let engine = TemplateEngine::new(None).unwrap();
    for name in [
        "rango/base.html",
        "rango/index.html",
        "rango/about.html",
        "rango/category.html",
        "rango/add_category.html",
        "rango/add_page.html",
        "rango/restricted.html",
        "rango/profile.html",
        "rango/list_profiles.html",
        "rango/profile_registration.html",
        "rango/register.html",
        "rango/login.html",
        "rango/search.html",
        "rango/cats.html",
        "rango/error.html",
    ] {
        assert!(engine.has_template(name), "missing {}", name);
    }
}

#[test]
fn test_render_index_with_standard_vars() {
    let engine = TemplateEngine::new(None).unwrap();

    let mut page = Page::new(1, "Official Python Tutorial".to_string(), "http://docs.python.org/3/tutorial/".to_string());
    page.id = 7;
    page.views = 128;

    let mut context = TeraContext::new();
    context.insert("top_categories", &standard_vars().categories);
    context.insert("pages", &vec![page]);
    context.insert("visits", &3);

    let vars = standard_vars().with_user(Some(CurrentUser {
        id: 1,
        username: "leifos".to_string(),
    }));
    let html = engine
        .render_with_standard_vars("rango/index.html", &context, &vars)
        .unwrap();

    assert!(html.contains("howdy leifos!"));
    assert!(html.contains("Python</a> (64 likes)"));
    assert!(html.contains("/rango/goto/?page_id=7"));
    assert!(html.contains("Visits: 3"));
    assert!(html.contains("/accounts/logout/"));
}

#[test]
fn test_anonymous_navigation() {
    let engine = TemplateEngine::new(None).unwrap();
    let mut context = TeraContext::new();
    context.insert("visits", &1);

    let html = engine
        .render_with_standard_vars("rango/about.html", &context, &standard_vars())
        .unwrap();

    assert!(html.contains("/accounts/login/"));
    assert!(!html.contains("/rango/add_category/"));
}

#[test]
fn test_cats_marks_active_category() {
    let engine = TemplateEngine::new(None).unwrap();
    let mut context = TeraContext::new();
    standard_vars()
        .with_active_category("django")
        .insert_into(&mut context);

    let html = engine.render("rango/cats.html", &context).unwrap();
    assert!(html.contains(r#"<li class="active"><a href="/rango/category/django/">Django</a></li>"#));
    assert!(html.contains(r#"<li><a href="/rango/category/python/">Python</a></li>"#));

    let mut empty = TeraContext::new();
    empty.insert("categories", &Vec::<Category>::new());
    empty.insert("act_cat", &None::<String>);
    let html = engine.render("rango/cats.html", &empty).unwrap();
    assert!(html.contains("There are no categories present."));
}

#[test]
fn test_output_is_escaped() {
    let engine = TemplateEngine::new(None).unwrap();
    let mut context = TeraContext::new();
    context.insert("categories", &vec![category(1, "<script>", "script", 0)]);
    context.insert("act_cat", &None::<String>);

    let html = engine.render("rango/cats.html", &context).unwrap();
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script>"));
}

#[test]
fn test_override_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("rango")).unwrap();
    std::fs::write(
        dir.path().join("rango/about.html"),
        r#"{% extends "rango/base.html" %}{% block body_block %}Custom about, {{ visits }} visits{% endblock %}"#,
    )
    .unwrap();

    let engine = TemplateEngine::new(Some(dir.path())).unwrap();
    let mut context = TeraContext::new();
    context.insert("visits", &5);

    let html = engine
        .render_with_standard_vars("rango/about.html", &context, &standard_vars())
        .unwrap();
    assert!(html.contains("Custom about, 5 visits"));
    // Untouched templates still come from the embedded set.
    assert!(engine.has_template("rango/index.html"));
}

#[test]
fn test_missing_override_directory_is_ignored() {
    let dir = TempDir::new().unwrap();
    let engine = TemplateEngine::new(Some(&dir.path().join("nope"))).unwrap();
    assert!(engine.has_template("rango/base.html"));
}

#[test]
fn test_render_missing_template_errors() {
    let engine = TemplateEngine::new(None).unwrap();
    assert!(engine.render("rango/missing.html", &TeraContext::new()).is_err());
}

#[test]
fn test_render_with_fallback_uses_error_template() {
    let engine = TemplateEngine::new(None).unwrap();
    let mut context = TeraContext::new();
    standard_vars().insert_into(&mut context);

    let html = engine.render_with_fallback("rango/missing.html", &context);
    assert!(html.contains("Something went wrong"));
}

#[test]
fn test_render_with_fallback_last_resort() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("rango")).unwrap();
    std::fs::write(dir.path().join("rango/error.html"), "{{ undefined_variable.field }}").unwrap();

    let engine = TemplateEngine::new(Some(dir.path())).unwrap();
    let html = engine.render_with_fallback("rango/missing.html", &TeraContext::new());

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Template Error"));
}

#[test]
fn test_simple_error_page_escapes() {
    let html = simple_error_page("Oops", "<b>bad</b>");
    assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;"));
    assert!(html.contains("Rango - Oops"));
}
