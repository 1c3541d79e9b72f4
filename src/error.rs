use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("missing required configuration value {0}")]
  MissingRequired(&'static str),
  #[error("unable to read config file '{}': {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("invalid config file: {0}")]
  Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
  #[error("AWS_LAMBDA_RUNTIME_API is not set")]
  MissingEndpoint,
  #[error("runtime API request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("runtime API answered with status {0}")]
  Status(StatusCode),
  #[error("invocation is missing the {0} header")]
  MissingHeader(&'static str),
  #[error("malformed invocation event: {0}")]
  Event(#[from] serde_json::Error),
}
