//! Email template rendering with Handlebars.
//!
//! Templates are trusted, authored files under a fixed root directory. The
//! rendered output is used verbatim as the HTML body of the email.
//!
//! Every render receives a `frontendUrl` variable. Its default comes from
//! configuration (per site when the job names one); a `frontendUrl` key in the
//! job's own template data wins over the default.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use handlebars::Handlebars;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{site_frontend_url, Config};
use crate::error::RenderError;

/// Variable injected into every template.
pub const FRONTEND_URL_KEY: &str = "frontendUrl";

/// Template engine bound to a template root.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
    root: PathBuf,
    frontend_url: String,
    site_urls: HashMap<String, String>,
}

impl TemplateRenderer {
    pub fn new(root: impl Into<PathBuf>, frontend_url: impl Into<String>) -> Self {
        Self {
            handlebars: Handlebars::new(),
            root: root.into(),
            frontend_url: frontend_url.into(),
            site_urls: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.template_root, &config.frontend_url).with_site_urls(config.site_urls.clone())
    }

    /// Per-site frontend URLs, keyed by site.
    pub fn with_site_urls(mut self, site_urls: HashMap<String, String>) -> Self {
        self.site_urls = site_urls;
        self
    }

    /// The `frontendUrl` default for `site` (or the global default).
    pub fn frontend_url(&self, site: Option<&str>) -> &str {
        site_frontend_url(&self.frontend_url, &self.site_urls, site)
    }

    /// Render `template_id` with `data` merged over the defaults.
    pub fn render(
        &self,
        template_id: &str,
        data: &Map<String, Value>,
        site: Option<&str>,
    ) -> Result<String, RenderError> {
        let path = self.resolve(template_id, site)?;
        let source = std::fs::read_to_string(&path).map_err(|source| RenderError::Read {
            template: template_id.to_string(),
            source,
        })?;

        debug!(template = %template_id, path = %path.display(), "template_loaded");

        let vars = self.merge_defaults(data, site);

        self.handlebars
            .render_template(&source, &vars)
            .map_err(|e| RenderError::Render {
                template: template_id.to_string(),
                message: e.to_string(),
            })
    }

    fn merge_defaults(&self, data: &Map<String, Value>, site: Option<&str>) -> Value {
        let mut vars = Map::new();
        vars.insert(
            FRONTEND_URL_KEY.to_string(),
            Value::String(self.frontend_url(site).to_string()),
        );
        vars.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(vars)
    }

    /// Map a template id to a file under the root.
    ///
    /// With a site, `<root>/<site>/<id>` is tried before `<root>/<id>`.
    fn resolve(&self, template_id: &str, site: Option<&str>) -> Result<PathBuf, RenderError> {
        if !is_relative_identifier(template_id) {
            return Err(RenderError::TemplateNotFound(template_id.to_string()));
        }

        let site_dir = site.filter(|s| is_relative_identifier(s));
        let candidates = site_dir
            .map(|s| self.root.join(s).join(template_id))
            .into_iter()
            .chain(std::iter::once(self.root.join(template_id)));

        for candidate in candidates {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        Err(RenderError::TemplateNotFound(template_id.to_string()))
    }
}

/// True for non-empty relative paths made only of normal components.
fn is_relative_identifier(id: &str) -> bool {
    !id.is_empty()
        && Path::new(id)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
