//! Theme engine
//!
//! Server-side rendering with Tera. The page templates are compiled into the
//! binary from `templates/`; a directory given in the configuration may
//! override any of them by relative name (for example `includes/post_item.html`).

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ThemeError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Variables every page receives
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub site_description: String,
    pub request_path: String,
    pub year: i32,
    pub current_user: Option<CurrentUser>,
}

/// The logged-in user as templates see it
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl StandardTemplateVars {
    pub fn new(site_name: &str, site_description: &str, request_path: &str) -> Self {
        Self {
            site_name: site_name.to_string(),
            site_description: site_description.to_string(),
            request_path: request_path.to_string(),
            year: Utc::now().year(),
            current_user: None,
        }
    }

    pub fn with_user(mut self, user: Option<CurrentUser>) -> Self {
        self.current_user = user;
        self
    }
}

pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Load the embedded templates, then apply overrides from `override_dir`
    pub fn new(override_dir: Option<&Path>) -> Result<Self> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in EmbeddedTemplates::iter() {
            let Some(file) = EmbeddedTemplates::get(&name) else {
                continue;
            };
            let content = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("Template {} is not valid UTF-8", name))?;
            templates.insert(name.into_owned(), content);
        }

        if let Some(dir) = override_dir {
            if dir.is_dir() {
                let before = templates.len();
                collect_templates_from_dir(dir, dir, &mut templates)?;
                tracing::info!(
                    "Loaded template overrides from {:?} ({} new)",
                    dir,
                    templates.len() - before
                );
            } else {
                tracing::warn!("Theme directory {:?} does not exist, using built-in templates", dir);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().map(|(name, content)| (name.as_str(), content.as_str())))
            .map_err(|e| ThemeError::TemplateError(error_chain("Failed to load templates", &e)))?;

        tracing::debug!("Theme engine ready with {} templates", templates.len());
        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        if !self.has_template(template) {
            return Err(ThemeError::NotFound(template.to_string()).into());
        }
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(error_chain(&format!("Failed to render '{}'", template), &e))
                .into()
        })
    }

    /// Render with the standard variables merged into `context`
    pub fn render_page(
        &self,
        template: &str,
        context: &TeraContext,
        vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full = context.clone();
        full.insert("site_name", &vars.site_name);
        full.insert("site_description", &vars.site_description);
        full.insert("request_path", &vars.request_path);
        full.insert("year", &vars.year);
        if let Some(user) = &vars.current_user {
            full.insert("current_user", user);
        }
        self.render(template, &full)
    }

    /// Render a page, degrading to a bare HTML error page if rendering fails
    pub fn render_with_fallback(
        &self,
        template: &str,
        context: &TeraContext,
        vars: &StandardTemplateVars,
    ) -> String {
        match self.render_page(template, context, vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {:#}", template, e);
                simple_error_page()
            }
        }
    }
}

fn error_chain(prefix: &str, e: &tera::Error) -> String {
    let mut message = format!("{}: {}", prefix, e);
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn collect_templates_from_dir(
    base: &Path,
    current: &Path,
    templates: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in fs::read_dir(current).map_err(ThemeError::from)? {
        let path = entry.map_err(ThemeError::from)?.path();
        if path.is_dir() {
            collect_templates_from_dir(base, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative = path
                .strip_prefix(base)
                .map_err(|_| ThemeError::TemplateError(format!("Bad template path {:?}", path)))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template {:?}", path))?;
            templates.insert(name, content);
        }
    }
    Ok(())
}

fn simple_error_page() -> String {
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Server error</title></head>\
     <body><h1>Server error</h1><p>Something went wrong. Please try again later.</p></body></html>"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars() -> StandardTemplateVars {
        StandardTemplateVars::new("Yatube", "Posts and people", "/")
    }

    #[test]
    fn test_embedded_templates_load() {
        let engine = ThemeEngine::new(None).expect("Failed to load templates");
        for name in [
            "base.html",
            "index.html",
            "index_feed.html",
            "group.html",
            "profile.html",
            "post.html",
            "post_form.html",
            "follow.html",
            "login.html",
            "signup.html",
            "logged_out.html",
            "404.html",
            "500.html",
            "includes/post_item.html",
            "includes/paginator.html",
        ] {
            assert!(engine.has_template(name), "missing {}", name);
        }
        assert!(!engine.has_template("nope.html"));
    }

    #[test]
    fn test_render_page_injects_standard_vars() {
        let engine = ThemeEngine::new(None).unwrap();
        let mut context = TeraContext::new();
        context.insert("feed_html", "<p>feed</p>");

        let vars = vars().with_user(Some(CurrentUser {
            id: 1,
            username: "leo".to_string(),
            display_name: "Leo".to_string(),
        }));
        let html = engine.render_page("index.html", &context, &vars).unwrap();
        assert!(html.contains("Yatube"));
        assert!(html.contains("<p>feed</p>"));
        assert!(html.contains("/auth/logout/"));
    }

    #[test]
    fn test_render_escapes_html() {
        let engine = ThemeEngine::new(None).unwrap();
        let vars = StandardTemplateVars::new("Yatube", "", "/<b>bold</b>/");
        let html = engine.render_page("404.html", &TeraContext::new(), &vars).unwrap();
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains("&lt;b&gt;bold"));
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let engine = ThemeEngine::new(None).unwrap();
        let err = engine.render("missing.html", &TeraContext::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ThemeError>(),
            Some(ThemeError::NotFound(_))
        ));
    }

    #[test]
    fn test_override_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("404.html"),
            "{% extends \"base.html\" %}{% block content %}custom missing page{% endblock %}",
        )
        .unwrap();
        fs::write(dir.path().join("extra.html"), "extra {{ site_name }}").unwrap();

        let engine = ThemeEngine::new(Some(dir.path())).unwrap();
        let html = engine.render_page("404.html", &TeraContext::new(), &vars()).unwrap();
        assert!(html.contains("custom missing page"));
        assert_eq!(
            engine.render_page("extra.html", &TeraContext::new(), &vars()).unwrap(),
            "extra Yatube"
        );
    }

    #[test]
    fn test_broken_override_reports_chain() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.html"), "{% if %}").unwrap();

        let err = ThemeEngine::new(Some(dir.path())).err().expect("should fail");
        assert!(err.to_string().contains("Failed to load templates"));
    }

    #[test]
    fn test_fallback_page() {
        let engine = ThemeEngine::new(None).unwrap();
        let html = engine.render_with_fallback("missing.html", &TeraContext::new(), &vars());
        assert!(html.contains("Server error"));
    }
}
