use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// What was being attempted when an [`IoError`] occurred.
#[derive(Debug, Error)]
pub enum FileOperation {
    #[error("reading a file")]
    Read,
    #[error("writing a file")]
    Write,
    #[error("creating a directory")]
    Mkdir,
    #[error("opening an archive")]
    Open,
    #[error("downloading a file")]
    Download,
    #[error("resolving the working directory")]
    CurrentDir,
}

#[derive(Debug, Error, Diagnostic)]
#[error("I/O error: {operation} on path '{path}'")]
#[diagnostic(
    code(splat::io),
    help("Check file permissions, disk space, or that the path is correct.")
)]
pub struct IoError {
    pub operation: FileOperation,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
impl IoError {
    pub fn new(operation: FileOperation, path: PathBuf, error: std::io::Error) -> Self {
        Self {
            operation,
            path,
            source: error,
        }
    }
}
