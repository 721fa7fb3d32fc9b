//! Template engine
//!
//! HTML pages are Tera templates. The stock set under `templates/` is embedded
//! into the binary; any file with the same relative name in the configured
//! override directory replaces the embedded one.

use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::TemplateError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Tera engine holding every page template
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Embedded templates only
    pub fn embedded() -> Result<Self, TemplateError> {
        Self::build(collect_embedded())
    }

    /// Embedded templates overlaid with files from `override_dir`.
    ///
    /// A missing override directory is not an error.
    pub fn new(override_dir: &Path) -> Result<Self, TemplateError> {
        let mut templates = collect_embedded();
        if override_dir.is_dir() {
            let mut overrides = Vec::new();
            collect_from_dir(override_dir, override_dir, &mut overrides)?;
            for (name, content) in overrides {
                tracing::debug!("Template override: {}", name);
                templates.insert(name, content);
            }
        }
        Self::build(templates)
    }

    fn build(templates: BTreeMap<String, String>) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| TemplateError::Render(describe(&e)))?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, TemplateError> {
        if !self.has_template(template) {
            return Err(TemplateError::NotFound(template.to_string()));
        }
        self.tera
            .render(template, context)
            .map_err(|e| TemplateError::Render(format!("Failed to render '{}': {}", template, describe(&e))))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// Bare HTML page for when the error template itself cannot render
    pub fn simple_error_page(status: u16, title: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"ru\">\n<head><meta charset=\"utf-8\"><title>{status} {title}</title></head>\n\
             <body><h1>{status}</h1><p>{title}</p><a href=\"/\">Home</a></body>\n</html>\n",
            status = status,
            title = tera::escape_html(title),
        )
    }
}

fn collect_embedded() -> BTreeMap<String, String> {
    let mut templates = BTreeMap::new();
    for name in EmbeddedTemplates::iter() {
        if let Some(file) = EmbeddedTemplates::get(&name) {
            templates.insert(
                name.replace('\\', "/"),
                String::from_utf8_lossy(&file.data).into_owned(),
            );
        }
    }
    templates
}

fn collect_from_dir(
    base: &Path,
    current: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<(), TemplateError> {
    for entry in fs::read_dir(current)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_from_dir(base, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative = path
                .strip_prefix(base)
                .map_err(|_| TemplateError::Render(format!("Bad template path {}", path.display())))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            templates.push((name, fs::read_to_string(&path)?));
        }
    }
    Ok(())
}

/// Flatten a Tera error and its causes into one line
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    message
}
