use crate::{
    context::TemplateContext,
    errors::{FileOperation, IoError},
    render::{RenderError, Renderer},
};
use colored::Colorize;
use miette::Diagnostic;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("I/O error within template domain")]
    #[diagnostic(code(splat::template::io))]
    Io(#[from] IoError),

    #[error("unable to render template '{path}'")]
    #[diagnostic(code(splat::template::render))]
    Render {
        path: PathBuf,
        #[source]
        #[diagnostic_source]
        source: RenderError,
    },

    #[error("symbolic links are not supported in templates: '{path}'")]
    #[diagnostic(
        code(splat::template::symlink),
        help("Replace the link with a regular file or directory in the template")
    )]
    Symlink { path: PathBuf },
}

/// Files ending with this suffix are rendered and written without it.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";
/// Version control metadata directory that never leaves the template root.
const VCS_DIRECTORY: &str = ".git";

#[cfg(unix)]
const DIR_MODE: u32 = 0o770;
#[cfg(unix)]
const FILE_MODE: u32 = 0o660;

/// Reproduces `template_root` under `destination_root`.
///
/// Directories are created, `*.tmpl` files are rendered through `renderer` with the
/// suffix stripped from their name, and every other file is copied verbatim unless
/// something already exists at its destination. A `.git` directory at the template
/// root is skipped along with its contents.
///
/// The walk stops at the first error. Entries written before it stay on disk.
///
/// # Errors
///
/// Returns a [`TemplateError`] if:
///
/// - A directory or file cannot be read, created or written to.
/// - A template fails to render.
/// - The template tree contains a symbolic link.
pub fn materialize<R: Renderer + ?Sized>(
    template_root: &Path,
    destination_root: &Path,
    context: &TemplateContext,
    renderer: &R,
) -> Result<(), TemplateError> {
    create_directory(destination_root)?;

    let walker = WalkDir::new(template_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_vcs_directory(entry));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(error) => {
                let path = error.path().unwrap_or_else(|| Path::new("")).to_path_buf();

                Err(IoError::new(FileOperation::Read, path, error.into()))?
            }
        };

        // the root maps onto destination_root itself
        if entry.depth() == 0 {
            continue;
        }

        let full_path = entry.path();
        // the last `depth` components name the entry below template_root
        let skip = full_path.components().count() - entry.depth();
        let relative: PathBuf = full_path.components().skip(skip).collect();
        let destination = destination_root.join(relative);

        let file_type = entry.file_type();

        if file_type.is_symlink() {
            return Err(TemplateError::Symlink {
                path: full_path.to_path_buf(),
            });
        }

        if file_type.is_dir() {
            log::debug!("making the directory: {}", destination.display());
            create_directory(&destination)?;
            continue;
        }

        match strip_template_suffix(&destination) {
            Some(rendered_destination) => {
                log::debug!("{} is a template file", full_path.display());
                render_file(full_path, &rendered_destination, context, renderer)?;
            }
            None => {
                log::debug!("{} is a regular file", full_path.display());
                copy_file(full_path, &destination)?;
            }
        }
    }

    Ok(())
}

fn is_vcs_directory(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == VCS_DIRECTORY
}

/// Returns the destination with [`TEMPLATE_SUFFIX`] removed, or `None` for plain files.
fn strip_template_suffix(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(TEMPLATE_SUFFIX)?;

    if stem.is_empty() {
        return None;
    }

    Some(path.with_file_name(stem))
}

fn render_file<R: Renderer + ?Sized>(
    source: &Path,
    destination: &Path,
    context: &TemplateContext,
    renderer: &R,
) -> Result<(), TemplateError> {
    let template = fs::read_to_string(source)
        .map_err(|error| IoError::new(FileOperation::Read, source.to_path_buf(), error))?;

    let rendered =
        renderer
            .render(&template, context)
            .map_err(|error| TemplateError::Render {
                path: source.to_path_buf(),
                source: error,
            })?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    write_file(&options, destination, &mut rendered.as_bytes())?;

    Ok(())
}

/// Copies `source` to `destination` unless the destination already exists.
fn copy_file(source: &Path, destination: &Path) -> Result<(), TemplateError> {
    if destination.symlink_metadata().is_ok() {
        skip_file(destination);
        return Ok(());
    }

    let mut reader = fs::File::open(source)
        .map_err(|error| IoError::new(FileOperation::Read, source.to_path_buf(), error))?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    match write_file(&options, destination, &mut reader) {
        Err(TemplateError::Io(error)) if error.source.kind() == io::ErrorKind::AlreadyExists => {
            skip_file(destination);
            Ok(())
        }
        other => other,
    }
}

/// Creates all directories in the specified path if they do not exist.
///
/// # Errors
///
/// Returns a [`TemplateError`] if any directory creation fails due to I/O issues.
fn create_directory(path: &Path) -> Result<(), TemplateError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);

    builder
        .create(path)
        .map_err(|error| IoError::new(FileOperation::Mkdir, path.into(), error))?;

    Ok(())
}

/// Opens `path` with `options` and streams `contents` into it.
///
/// Prints a message to the console indicating that the file has been created.
///
/// # Errors
///
/// Returns a [`TemplateError`] if opening or writing the file fails due to I/O issues.
fn write_file(
    options: &fs::OpenOptions,
    path: &Path,
    contents: &mut dyn io::Read,
) -> Result<(), TemplateError> {
    let mut file = options
        .open(path)
        .map_err(|error| IoError::new(FileOperation::Write, path.into(), error))?;

    io::copy(contents, &mut file)
        .map_err(|error| IoError::new(FileOperation::Write, path.into(), error))?;

    println!("{} {}", "create".green(), path.display());

    Ok(())
}

fn skip_file(path: &Path) {
    log::info!("file {} already exists, not overwriting", path.display());

    println!("{} {}", "skip".yellow(), path.display());
}
