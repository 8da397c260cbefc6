use chrono::Datelike;
use miette::Diagnostic;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    #[error("package name cannot be empty")]
    #[diagnostic(
        code(splat::context::empty_package),
        help("Pass the fully qualified package name, e.g. github.com/org/my-api")
    )]
    EmptyPackage,

    #[error("destination path cannot be empty")]
    #[diagnostic(code(splat::context::empty_destination))]
    EmptyDestination,
}

/// The values a template can reference while it is rendered.
///
/// Field names are exposed to templates in PascalCase, so a template refers to the
/// project name as `{{.AppName}}` (or `{{ AppName }}`) and to the package as
/// `{{.PkgName}}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateContext {
    pub pkg_name: String,
    pub copyright: String,
    pub docker_name: String,
    pub absolute_path: String,
    pub app_name: String,
    pub template_path: String,
    pub url_base: String,
}
impl TemplateContext {
    /// Builds a context for `pkg_name`, deriving the project and docker names from it.
    ///
    /// # Errors
    ///
    /// Returns a [`ContextError`] if the package name or destination path is empty.
    pub fn new(
        pkg_name: &str,
        absolute_path: &Path,
        template_path: &Path,
        url_base: &str,
        copyright: String,
    ) -> Result<Self, ContextError> {
        if pkg_name.trim().is_empty() {
            return Err(ContextError::EmptyPackage);
        }
        if absolute_path.as_os_str().is_empty() {
            return Err(ContextError::EmptyDestination);
        }

        let app_name = app_name(pkg_name);

        Ok(Self {
            pkg_name: pkg_name.to_string(),
            copyright,
            docker_name: docker_name(&app_name),
            absolute_path: absolute_path.display().to_string(),
            app_name,
            template_path: template_path.display().to_string(),
            url_base: url_base.to_string(),
        })
    }
}

/// Last `/` separated segment of a package name: `github.com/org/my-api` -> `my-api`.
pub fn app_name(pkg_name: &str) -> String {
    pkg_name
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn docker_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .trim_matches(|c: char| c == '-' || c == '_')
        .to_string()
}

pub fn copyright_line(holder: &str) -> String {
    format!("Copyright © {} {}", chrono::Local::now().year(), holder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_derives_names() {
        let ctx = TemplateContext::new(
            "github.com/YaleSpinup/My-Api_",
            Path::new("/work/My-Api_"),
            Path::new("/tmp/template"),
            "/v1/test",
            "Copyright © 2020 Yale University".into(),
        )
        .unwrap();

        assert_eq!(ctx.app_name, "My-Api_");
        assert_eq!(ctx.docker_name, "my-api");
        assert_eq!(ctx.absolute_path, "/work/My-Api_");
    }

    #[test]
    fn test_context_rejects_empty_required_fields() {
        let empty_pkg = TemplateContext::new(
            "  ",
            Path::new("/work/x"),
            Path::new("/tmp"),
            "",
            String::new(),
        );
        assert!(matches!(empty_pkg, Err(ContextError::EmptyPackage)));

        let empty_dest =
            TemplateContext::new("x", Path::new(""), Path::new("/tmp"), "", String::new());
        assert!(matches!(empty_dest, Err(ContextError::EmptyDestination)));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(app_name("demo"), "demo");
        assert_eq!(app_name("github.com/org/demo/"), "demo");
    }

    #[test]
    fn test_copyright_line() {
        let line = copyright_line("Yale University");

        assert!(line.starts_with("Copyright © "));
        assert!(line.ends_with(" Yale University"));
    }

    #[test]
    fn test_context_serializes_pascal_case() {
        let ctx = TemplateContext::new(
            "demo",
            Path::new("/work/demo"),
            Path::new("/tmp/t"),
            "/v1/demo",
            String::new(),
        )
        .unwrap();

        let ctx = tera::Context::from_serialize(&ctx).unwrap();

        assert_eq!(
            ctx.get("AppName").and_then(|v| v.as_str()),
            Some("demo")
        );
        assert_eq!(
            ctx.get("UrlBase").and_then(|v| v.as_str()),
            Some("/v1/demo")
        );
    }
}
