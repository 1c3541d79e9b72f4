use std::fs::File;
use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_GENERAL_ERROR: &str = "AWS Lambda Error";
pub const DEFAULT_APP_NAME: &str = "Sample Application";
pub const DEFAULT_FILTERED_MESSAGE: &str = "Filtered URL.";
pub const DEFAULT_PAYLOAD_QUOTA: usize = 5_000_000;
pub const DEFAULT_REQUEST_TIMEOUT: f64 = 11.0;

const FILTER_SEPARATOR: char = '|';

/// Optional YAML layer. Every key may be omitted; environment variables win.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
  pub remote_url: Option<String>,
  pub filtered_paths: Option<Vec<String>>,
  pub filtered_message: Option<String>,
  pub general_error: Option<String>,
  pub app_name: Option<String>,
  pub payload_quota: Option<usize>,
  pub request_timeout: Option<f64>,
  pub strip_accept_encoding: Option<bool>,
  pub proxy_url: Option<String>,
  pub proxy_auth_user: Option<String>,
  pub proxy_auth_pass: Option<String>,
}

impl ConfigFile {
  pub fn load_from_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    Ok(serde_yaml::from_reader(file)?)
  }
}

/// Process-wide settings, built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
  pub remote_url: Option<String>,
  pub filtered_paths: Vec<String>,
  pub filtered_message: String,
  pub general_error: String,
  pub app_name: String,
  pub payload_quota: usize,
  pub request_timeout: Duration,
  pub strip_accept_encoding: bool,
  pub proxy_url: Option<String>,
  pub proxy_auth_user: Option<String>,
  pub proxy_auth_pass: Option<String>,
}

impl Default for Configuration {
  fn default() -> Self {
    Configuration {
      remote_url: None,
      filtered_paths: Vec::new(),
      filtered_message: DEFAULT_FILTERED_MESSAGE.into(),
      general_error: DEFAULT_GENERAL_ERROR.into(),
      app_name: DEFAULT_APP_NAME.into(),
      payload_quota: DEFAULT_PAYLOAD_QUOTA,
      request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT),
      strip_accept_encoding: false,
      proxy_url: None,
      proxy_auth_user: None,
      proxy_auth_pass: None,
    }
  }
}

impl Configuration {
  pub fn load(config_file: Option<&Path>) -> Result<Configuration, ConfigError> {
    let file = match config_file {
      Some(path) => ConfigFile::load_from_file(path)?,
      None => ConfigFile::default(),
    };

    Ok(Configuration::from_sources(file, |name| std::env::var(name).ok()))
  }

  /// Layers `lookup` (normally the process environment) over `file` over the defaults.
  pub fn from_sources<F>(file: ConfigFile, lookup: F) -> Configuration
  where
    F: Fn(&str) -> Option<String>,
  {
    let defaults = Configuration::default();
    let text = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let remote_url = text("REMOTE_URL").or(file.remote_url.filter(|url| !url.trim().is_empty()));

    let filtered_paths = match text("FILTERED_PATH") {
      Some(raw) => split_filter_list(&raw),
      None => file
        .filtered_paths
        .unwrap_or_default()
        .into_iter()
        .filter(|path| !path.is_empty())
        .collect(),
    };

    let payload_quota = text("PAYLOAD_QUOTA")
      .map(|raw| match raw.trim().parse::<usize>() {
        Ok(quota) if quota > 0 => quota,
        _ => {
          warn!("PAYLOAD_QUOTA '{}' is not a positive integer, using {}.", raw, DEFAULT_PAYLOAD_QUOTA);
          DEFAULT_PAYLOAD_QUOTA
        }
      })
      .or(file.payload_quota.filter(|quota| *quota > 0))
      .unwrap_or(defaults.payload_quota);

    let request_timeout = text("REQUEST_TIMEOUT")
      .map(|raw| match positive_seconds(raw.trim().parse::<f64>().ok()) {
        Some(timeout) => timeout,
        None => {
          warn!("REQUEST_TIMEOUT '{}' is not a positive number, using {}.", raw, DEFAULT_REQUEST_TIMEOUT);
          defaults.request_timeout
        }
      })
      .or_else(|| positive_seconds(file.request_timeout))
      .unwrap_or(defaults.request_timeout);

    let strip_accept_encoding = if flag_enabled(text("NO_HEADERS")) {
      true
    } else {
      file.strip_accept_encoding.unwrap_or(defaults.strip_accept_encoding)
    };

    Configuration {
      remote_url,
      filtered_paths,
      filtered_message: text("FILTERED_URL_MSG")
        .or(file.filtered_message)
        .unwrap_or(defaults.filtered_message),
      general_error: text("GENERAL_ERROR")
        .or(file.general_error)
        .unwrap_or(defaults.general_error),
      app_name: text("APP_NAME").or(file.app_name).unwrap_or(defaults.app_name),
      payload_quota,
      request_timeout,
      strip_accept_encoding,
      proxy_url: text("HTTP_PROXY_URL").or(file.proxy_url),
      proxy_auth_user: text("HTTP_PROXY_USER").or(file.proxy_auth_user),
      proxy_auth_pass: text("HTTP_PROXY_PASS").or(file.proxy_auth_pass),
    }
  }

  pub fn remote_url(&self) -> Result<&str, ConfigError> {
    self
      .remote_url
      .as_deref()
      .ok_or(ConfigError::MissingRequired("REMOTE_URL"))
  }

  pub fn is_filtered(&self, path: &str) -> bool {
    self.filtered_paths.iter().any(|filtered| filtered == path)
  }
}

/// A flag is on when the variable is present and not blank.
pub fn flag_enabled(value: Option<String>) -> bool {
  value.map_or(false, |v| !v.trim().is_empty())
}

fn split_filter_list(raw: &str) -> Vec<String> {
  raw
    .split(FILTER_SEPARATOR)
    .filter(|path| !path.is_empty())
    .map(String::from)
    .collect()
}

fn positive_seconds(value: Option<f64>) -> Option<Duration> {
  value
    .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
    .map(Duration::from_secs_f64)
}
