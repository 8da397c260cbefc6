use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Io(#[from] IoError),

    #[error("unable to parse toml file at '{path}': {source}")]
    #[diagnostic(code(splat::config::parse_toml), help("Review toml file"))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Defaults applied when a flag is not passed on the command line.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// GitHub repository holding the template releases.
    pub repository: String,
    /// Base path for url routes, exposed to templates as `UrlBase`.
    pub url_base: String,
    /// Organization named in the generated copyright line.
    pub copyright_holder: String,
    /// GitHub REST API endpoint.
    pub api_url: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            repository: "YaleSpinup/api-tmpl".to_string(),
            url_base: "/v1/test".to_string(),
            copyright_holder: "Yale University".to_string(),
            api_url: "https://api.github.com".to_string(),
        }
    }
}
impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        let parsed: Config = toml::from_str(&content)
            .map_err(|error| ConfigError::Parse {
                path: path.to_path_buf(),
                source: error,
            })?;

        Ok(parsed)
    }
}
