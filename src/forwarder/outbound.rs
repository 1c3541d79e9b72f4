use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// Request as it leaves the proxy. Header names are lower-case.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutboundRequest {
  pub method: String,
  pub url: String,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

#[cfg(test)]
impl OutboundRequest {
  pub(crate) fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OriginResponse {
  pub status: u16,
  /// One entry per header name, repeated values joined with ", ". `set-cookie` is kept apart.
  pub headers: BTreeMap<String, String>,
  pub set_cookies: Vec<String>,
  pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
  Timeout(String),
  ConnectionRefused,
  Unreachable(String),
  Other(String),
}

impl TransportFailure {
  /// Text shown on the diagnostic page.
  pub fn description(&self) -> String {
    match self {
      TransportFailure::Unreachable(_) => "Remote server down".into(),
      TransportFailure::ConnectionRefused => "Connection failed".into(),
      TransportFailure::Timeout(detail) | TransportFailure::Other(detail) => {
        format!("Connection error: {}", detail)
      }
    }
  }
}

impl Display for TransportFailure {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      TransportFailure::Timeout(detail) => write!(f, "timeout: {}", detail),
      TransportFailure::ConnectionRefused => f.write_str("connection refused"),
      TransportFailure::Unreachable(detail) => write!(f, "origin unreachable: {}", detail),
      TransportFailure::Other(detail) => f.write_str(detail),
    }
  }
}

pub type OutboundResult = Result<OriginResponse, TransportFailure>;
