use crate::{
    archive::{self, ArchiveError},
    errors::{FileOperation, IoError},
};
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum SourceError {
    #[error("I/O error within source domain")]
    #[diagnostic(code(splat::source::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    #[error("local template directory not found: '{path}'")]
    #[diagnostic(
        code(splat::source::local_not_found),
        help("Pass an existing directory to --local")
    )]
    LocalNotFound { path: PathBuf },

    #[error("badly formatted repository '{repository}'")]
    #[diagnostic(
        code(splat::source::invalid_repository),
        help("Use the form owner/repo, e.g. YaleSpinup/api-tmpl")
    )]
    InvalidRepository { repository: String },

    #[error("request to '{url}' failed")]
    #[diagnostic(
        code(splat::source::http),
        help("Check your network connection and that the repository exists")
    )]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to '{url}' returned {status}")]
    #[diagnostic(
        code(splat::source::status),
        help("Make sure the repository has a published release with that tag")
    )]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Where a template tree comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// A release of a GitHub repository, the latest one when `tag` is `None`.
    GitHub {
        repository: String,
        tag: Option<String>,
    },
}

/// A template tree on disk, ready to be materialized.
///
/// Downloaded templates live in a temporary directory that is removed when this value
/// is dropped.
#[derive(Debug)]
pub struct ResolvedTemplate {
    root: PathBuf,
    _workdir: Option<TempDir>,
}
impl ResolvedTemplate {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}
impl Repository {
    /// Parses `owner/repo`, `github.com/owner/repo` or a full `https://` url.
    pub fn parse(repository: &str) -> Result<Self, SourceError> {
        lazy_static::lazy_static! {
            static ref REPOSITORY_REGEX: regex::Regex = regex::Regex::new(
                r"(?x)        # Enable extended mode
                ^(?:https?://)?
                (?:(?:www\.)?github\.com/)?
                ([A-Za-z0-9_.-]+)   # owner
                /
                ([A-Za-z0-9_.-]+?)  # repo
                (?:\.git)?
                /?$"
            ).expect("a valid regex pattern");
        }

        let captures = REPOSITORY_REGEX.captures(repository.trim()).ok_or_else(|| {
            SourceError::InvalidRepository {
                repository: repository.to_string(),
            }
        })?;

        Ok(Self {
            owner: captures[1].to_string(),
            name: captures[2].to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    zipball_url: String,
}

/// Turns a [`TemplateSource`] into a directory on disk.
///
/// # Errors
///
/// Returns a [`SourceError`] if:
///
/// - A local template directory does not exist.
/// - The repository reference cannot be parsed.
/// - Release metadata or the release archive cannot be downloaded.
/// - The archive cannot be extracted safely.
pub fn resolve(source: &TemplateSource, api_url: &str) -> Result<ResolvedTemplate, SourceError> {
    match source {
        TemplateSource::Local(path) => {
            if !path.is_dir() {
                return Err(SourceError::LocalNotFound { path: path.clone() });
            }

            let root = fs::canonicalize(path)
                .map_err(|error| IoError::new(FileOperation::Read, path.clone(), error))?;

            Ok(ResolvedTemplate {
                root,
                _workdir: None,
            })
        }
        TemplateSource::GitHub { repository, tag } => {
            let repository = Repository::parse(repository)?;

            let workdir = tempfile::Builder::new()
                .prefix("splat")
                .tempdir()
                .map_err(|error| IoError::new(FileOperation::Mkdir, std::env::temp_dir(), error))?;

            let client = http_client()?;
            let zipball_url = release_zipball_url(&client, api_url, &repository, tag.as_deref())?;

            let archive_path = workdir.path().join("template.zip");
            download(&client, &zipball_url, &archive_path)?;

            let root = archive::extract(&archive_path, &workdir.path().join("template"))?;

            Ok(ResolvedTemplate {
                root,
                _workdir: Some(workdir),
            })
        }
    }
}

fn http_client() -> Result<reqwest::blocking::Client, SourceError> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| SourceError::Http {
            url: String::new(),
            source: error,
        })
}

fn release_url(api_url: &str, repository: &Repository, tag: Option<&str>) -> String {
    let base = format!(
        "{}/repos/{}/{}/releases",
        api_url.trim_end_matches('/'),
        repository.owner,
        repository.name
    );

    match tag {
        Some(tag) => format!("{base}/tags/{tag}"),
        None => format!("{base}/latest"),
    }
}

fn get(
    client: &reqwest::blocking::Client,
    url: &str,
) -> Result<reqwest::blocking::Response, SourceError> {
    let response = client.get(url).send().map_err(|error| SourceError::Http {
        url: url.to_string(),
        source: error,
    })?;

    if !response.status().is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    Ok(response)
}

fn release_zipball_url(
    client: &reqwest::blocking::Client,
    api_url: &str,
    repository: &Repository,
    tag: Option<&str>,
) -> Result<String, SourceError> {
    let url = release_url(api_url, repository, tag);

    log::debug!("fetching release metadata from {url}");

    let release: Release = get(client, &url)?
        .json()
        .map_err(|error| SourceError::Http {
            url: url.clone(),
            source: error,
        })?;

    Ok(release.zipball_url)
}

fn download(
    client: &reqwest::blocking::Client,
    url: &str,
    destination: &Path,
) -> Result<(), SourceError> {
    let mut response = get(client, url)?;

    let mut file = fs::File::create(destination)
        .map_err(|error| IoError::new(FileOperation::Download, destination.to_path_buf(), error))?;

    let bytes = response.copy_to(&mut file).map_err(|error| SourceError::Http {
        url: url.to_string(),
        source: error,
    })?;

    log::info!("downloaded {bytes} bytes to {}", destination.display());

    Ok(())
}
