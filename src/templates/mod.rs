//! Template engine
//!
//! Tera templates for the HTML pages. The default set is compiled into the
//! binary; a directory configured under `templates.path` may override any of
//! them file by file.

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::{Category, User};

mod error;

pub use error::TemplateError;

/// Default templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template used when a page fails to render
pub const ERROR_TEMPLATE: &str = "rango/error.html";

pub struct TemplateEngine {
    tera: Tera,
    override_dir: Option<PathBuf>,
}

impl TemplateEngine {
    /// Load the embedded templates, then any overrides from `override_dir`.
    pub fn new(override_dir: Option<&Path>) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_dir: override_dir.map(Path::to_path_buf),
        };
        engine.reload()?;
        Ok(engine)
    }

    /// Rebuild the template set from the embedded files and the override
    /// directory.
    pub fn reload(&mut self) -> Result<()> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in EmbeddedTemplates::iter() {
            let Some(file) = EmbeddedTemplates::get(&name) else {
                continue;
            };
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| TemplateError::InvalidEncoding(name.to_string()))?;
            templates.insert(name.to_string(), content);
        }

        if let Some(dir) = &self.override_dir {
            let mut overrides = Vec::new();
            collect_templates_from_dir(dir, dir, &mut overrides)?;
            for (name, content) in overrides {
                tracing::debug!(template = %name, "Using template override");
                templates.insert(name, content);
            }
        }

        let mut ordered: Vec<(String, String)> = templates.into_iter().collect();
        // Parents before children.
        ordered.sort_by_key(|(name, _)| !is_base_template(name));

        let mut tera = Tera::default();
        for (name, content) in &ordered {
            tera.add_raw_template(name, content)
                .map_err(|e| TemplateError::Parse(format!("{}: {}", name, e)))?;
        }
        tera.build_inheritance_chains()
            .map_err(|e| TemplateError::Parse(format!("inheritance: {}", e)))?;

        tracing::info!(count = ordered.len(), "Templates loaded");
        self.tera = tera;
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template, flattening Tera's error chain into the message
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut message = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                message.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            TemplateError::Render(message).into()
        })
    }

    /// Render with the variables every page expects added to `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        standard_vars.insert_into(&mut full_context);
        self.render(template, &full_context)
    }

    /// Render `template`; on failure render the error template, and if that
    /// fails too, a bare HTML error page. Never fails.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(template, error = %e, "Render failed, trying error template");

                let mut error_context = context.clone();
                error_context.insert("error_message", "Something went wrong rendering this page.");
                error_context.insert("requested_template", template);

                match self.render(ERROR_TEMPLATE, &error_context) {
                    Ok(html) => html,
                    Err(fallback_err) => {
                        tracing::warn!(error = %fallback_err, "Error template failed too");
                        simple_error_page("Template Error", &e.to_string())
                    }
                }
            }
        }
    }
}

fn is_base_template(name: &str) -> bool {
    name == "base.html" || name.ends_with("/base.html")
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    if !current_path.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read template dir {:?}", current_path))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative = path
                .strip_prefix(base_path)
                .map_err(|_| TemplateError::Parse(format!("{:?} is outside {:?}", path, base_path)))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((name, content));
        }
    }

    Ok(())
}

/// Last-resort page when no template can be rendered
pub fn simple_error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Rango - {title}</title>
</head>
<body>
    <h1>{title}</h1>
    <p>{message}</p>
    <p><a href="/rango/">Back to Rango</a></p>
</body>
</html>"#,
        title = escape_html(title),
        message = escape_html(message),
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Variables available to every page
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    /// Signed-in user, if any
    pub user: Option<CurrentUser>,
    pub request_path: String,
    pub year: i32,
    /// Sidebar category list
    pub categories: Vec<Category>,
    /// Slug of the category being viewed, highlighted in the sidebar
    pub act_cat: Option<String>,
}

/// The signed-in user as templates see it
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(request_path: impl Into<String>, categories: Vec<Category>) -> Self {
        Self {
            user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
            categories,
            act_cat: None,
        }
    }

    pub fn with_user(mut self, user: Option<CurrentUser>) -> Self {
        self.user = user;
        self
    }

    pub fn with_active_category(mut self, slug: impl Into<String>) -> Self {
        self.act_cat = Some(slug.into());
        self
    }

    pub fn insert_into(&self, context: &mut TeraContext) {
        context.insert("user", &self.user);
        context.insert("request_path", &self.request_path);
        context.insert("year", &self.year);
        context.insert("categories", &self.categories);
        context.insert("act_cat", &self.act_cat);
    }
}

#[cfg(test)]
mod tests;
