//! Renderer implementations.

use std::path::Path;

use anyhow::{Context, Result};
use tera::Tera;
use tracing::debug;

/// Turns a view name and a context into a response body.
pub trait Renderer: Send + Sync {
    fn render(&self, view: &str, context: &tera::Context) -> Result<String>;
}

/// Tera templates loaded from disk at startup.
pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    /// Load every `*.html` template under `template_dir`.
    pub fn new(template_dir: &Path) -> Result<Self> {
        let pattern = template_dir.join("**/*.html");
        let pattern_str = pattern
            .to_str()
            .context("invalid template directory path")?;

        let mut tera = Tera::new(pattern_str).context("failed to initialize Tera templates")?;
        tera.autoescape_on(vec![".html"]);

        let template_names: Vec<_> = tera.get_template_names().collect();
        debug!(count = template_names.len(), "loaded templates");

        Ok(Self { tera })
    }
}

impl Renderer for TeraRenderer {
    fn render(&self, view: &str, context: &tera::Context) -> Result<String> {
        self.tera
            .render(view, context)
            .with_context(|| format!("failed to render template {view}"))
    }
}

/// Serializes the context as JSON, tagged with the view name.
#[derive(Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, view: &str, context: &tera::Context) -> Result<String> {
        let mut value = context.clone().into_json();
        if let Some(map) = value.as_object_mut() {
            map.insert("view".to_string(), serde_json::Value::String(view.to_string()));
        }
        serde_json::to_string(&value).context("failed to encode render context")
    }
}
