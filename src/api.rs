use crate::{
    config::Config,
    context::{self, ContextError, TemplateContext},
    errors::{FileOperation, IoError},
    render::TeraRenderer,
    source::{self, TemplateSource},
    template,
    utils::normalize_path,
};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SplatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] source::SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] template::TemplateError),
}

/// Everything a single `init` run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
    /// Fully qualified package name, e.g. `github.com/org/my-api`.
    pub package: String,
    pub source: TemplateSource,
    pub url_base: String,
    /// Output directory. Defaults to `./<app name>`.
    pub out_dir: Option<PathBuf>,
    pub copyright_holder: String,
    pub api_url: String,
}
impl InitOptions {
    /// Options for `package` with every other value taken from `config`.
    pub fn new(package: &str, config: &Config) -> Self {
        Self {
            package: package.to_string(),
            source: TemplateSource::GitHub {
                repository: config.repository.clone(),
                tag: None,
            },
            url_base: config.url_base.clone(),
            out_dir: None,
            copyright_holder: config.copyright_holder.clone(),
            api_url: config.api_url.clone(),
        }
    }
}

/// Generates a new project from the template described by `options` and returns the
/// directory it was written to.
///
/// # Errors
///
/// Returns a [`SplatError`] if:
///
/// - The package name is empty.
/// - The template source cannot be found, downloaded or extracted.
/// - A directory or file cannot be created or written to.
/// - Tera fails to render a template.
pub fn initialize_project(options: &InitOptions) -> Result<PathBuf, SplatError> {
    let package = options.package.trim();

    if context::app_name(package).is_empty() {
        return Err(ContextError::EmptyPackage.into());
    }

    let cwd = std::env::current_dir()
        .map_err(|error| IoError::new(FileOperation::CurrentDir, PathBuf::from("."), error))?;

    let destination = destination_path(&cwd, package, options.out_dir.as_deref());

    let template = source::resolve(&options.source, &options.api_url)?;

    log::debug!(
        "rendering template {} into {}",
        template.root().display(),
        destination.display()
    );

    let ctx = TemplateContext::new(
        package,
        &destination,
        template.root(),
        &options.url_base,
        context::copyright_line(&options.copyright_holder),
    )?;

    template::materialize(template.root(), &destination, &ctx, &TeraRenderer)?;

    Ok(destination)
}

fn destination_path(cwd: &Path, package: &str, out_dir: Option<&Path>) -> PathBuf {
    let destination = match out_dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd.join(context::app_name(package)),
    };

    normalize_path(&destination)
}
