use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::diagnostic_page;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const ROBOTS_TAG: &str = "X-Robots-Tag";
pub const ROBOTS_NOINDEX: &str = "noindex, nofollow";
const TEXT_HTML: &str = "text/html";
const OCTET_STREAM: &str = "application/octet-stream";

/// What goes back to the gateway.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
  pub status_code: u16,
  pub headers: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cookies: Vec<String>,
  pub body: String,
  pub is_base64_encoded: bool,
}

impl ProxyResponse {
  pub fn html(status_code: u16, body: String) -> ProxyResponse {
    let mut headers = BTreeMap::new();
    headers.insert(CONTENT_TYPE.to_string(), TEXT_HTML.to_string());
    headers.insert(ROBOTS_TAG.to_string(), ROBOTS_NOINDEX.to_string());

    ProxyResponse {
      status_code,
      headers,
      cookies: Vec::new(),
      body,
      is_base64_encoded: false,
    }
  }

  pub fn diagnostic(status_code: u16, url: &str, label: &str, description: &str, app_name: &str) -> ProxyResponse {
    Self::html(status_code, diagnostic_page::render(url, label, description, app_name))
  }

  /// Relays origin bytes untouched; the gateway decodes them.
  pub fn relay(status_code: u16, mut headers: BTreeMap<String, String>, cookies: Vec<String>, body: &[u8]) -> ProxyResponse {
    let has_content_type = headers.keys().any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE));
    if !has_content_type {
      headers.insert(CONTENT_TYPE.to_string(), OCTET_STREAM.to_string());
    }

    ProxyResponse {
      status_code,
      headers,
      cookies,
      body: STANDARD.encode(body),
      is_base64_encoded: true,
    }
  }

  pub fn body_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
    if self.is_base64_encoded {
      STANDARD.decode(&self.body)
    } else {
      Ok(self.body.as_bytes().to_vec())
    }
  }
}

#[cfg(test)]
impl ProxyResponse {
  pub(crate) fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }
}
