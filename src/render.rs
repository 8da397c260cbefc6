use crate::context::TemplateContext;
use miette::Diagnostic;
use std::borrow::Cow;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("unable to build render context")]
    #[diagnostic(code(splat::render::context))]
    Context {
        #[source]
        source: tera::Error,
    },

    #[error("unable to render template")]
    #[diagnostic(
        code(splat::render::template),
        help("Check the placeholder syntax and that every referenced field exists")
    )]
    Template {
        #[source]
        source: tera::Error,
    },
}

/// Substitutes the fields of a [`TemplateContext`] into template text.
pub trait Renderer {
    fn render(&self, template: &str, context: &TemplateContext) -> Result<String, RenderError>;
}

/// [`Renderer`] backed by Tera. Output is never HTML-escaped.
///
/// Field placeholders may be written either as Tera variables (`{{ AppName }}`) or with
/// a leading dot (`{{.AppName}}`, `{{- .AppName -}}`), the form used by existing
/// api templates. Both resolve against the same context fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TeraRenderer;

impl Renderer for TeraRenderer {
    fn render(&self, template: &str, context: &TemplateContext) -> Result<String, RenderError> {
        let ctx =
            Context::from_serialize(context).map_err(|error| RenderError::Context { source: error })?;

        Tera::one_off(&dotted_fields_to_tera(template), &ctx, false)
            .map_err(|error| RenderError::Template { source: error })
    }
}

/// Rewrites `{{.Field}}` placeholders into Tera variables, keeping `-` trim markers.
fn dotted_fields_to_tera(template: &str) -> Cow<'_, str> {
    lazy_static::lazy_static! {
        static ref DOTTED_FIELD_REGEX: regex::Regex = regex::Regex::new(
            r"\{\{(-?)\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*(-?)\}\}"
        ).expect("a valid regex pattern");
    }

    DOTTED_FIELD_REGEX.replace_all(template, "{{${1} ${2} ${3}}}")
}
