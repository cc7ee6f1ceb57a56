//! View rendering over Handlebars.
//!
//! All templates ship embedded in the binary and are registered once at
//! startup; `render` then only ever sees known template names. Strict mode
//! stays off so that absent document fields render as empty strings, which
//! is what a pre-populated form wants.

use handlebars::Handlebars;
use serde::Serialize;

/// Page templates, keyed by the names the handlers use.
const TEMPLATES: &[(&str, &str)] = &[
    ("layout", include_str!("../../templates/layout.hbs")),
    ("tasks/list", include_str!("../../templates/tasks/list.hbs")),
    ("tasks/form", include_str!("../../templates/tasks/form.hbs")),
    ("auth/login", include_str!("../../templates/auth/login.hbs")),
    ("error", include_str!("../../templates/error.hbs")),
];

/// View renderer shared across requests.
pub struct Renderer {
    handlebars: Handlebars<'static>,
}

impl Renderer {
    pub fn new() -> anyhow::Result<Self> {
        let mut handlebars = Handlebars::new();
        for &(name, source) in TEMPLATES {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| anyhow::anyhow!("Failed to register template {}: {}", name, e))?;
        }
        Ok(Self { handlebars })
    }

    /// Render a registered template with the given context.
    pub fn render<T: Serialize>(
        &self,
        name: &str,
        context: &T,
    ) -> Result<String, handlebars::RenderError> {
        self.handlebars.render(name, context)
    }
}
