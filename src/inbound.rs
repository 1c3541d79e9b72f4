//! Gateway event envelope (HTTP payload format 2.0).

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TRACE_CONNECTION: &str = "trace_connection";
pub const DUMP_REQUEST: &str = "dump_request";
pub const TRACE_REQUEST: &str = "trace_request";

const FUNCTION_URL_LABEL: &str = "lambda-url";

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpDescription {
  pub method: String,
  pub path: String,
  pub protocol: String,
  pub source_ip: String,
  pub user_agent: String,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
  pub domain_name: String,
  pub http: HttpDescription,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundRequest {
  pub version: String,
  pub raw_path: String,
  pub raw_query_string: String,
  pub cookies: Vec<String>,
  pub headers: BTreeMap<String, String>,
  pub query_string_parameters: BTreeMap<String, String>,
  pub request_context: RequestContext,
  pub body: Option<String>,
  pub is_base64_encoded: bool,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl InboundRequest {
  pub fn method(&self) -> &str {
    &self.request_context.http.method
  }

  pub fn domain_name(&self) -> &str {
    &self.request_context.domain_name
  }

  pub fn query_flag(&self, name: &str) -> bool {
    self
      .query_string_parameters
      .get(name)
      .map_or(false, |value| !value.is_empty())
  }

  pub fn wants_connection_trace(&self) -> bool {
    self.query_flag(TRACE_CONNECTION)
  }

  pub fn wants_request_dump(&self) -> bool {
    self.query_flag(DUMP_REQUEST) || self.query_flag(TRACE_REQUEST)
  }

  /// Body bytes to forward. Decoded only when the envelope says it is base64.
  pub fn decoded_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
    match &self.body {
      None => Ok(Vec::new()),
      Some(body) if self.is_base64_encoded => STANDARD.decode(body),
      Some(body) => Ok(body.as_bytes().to_vec()),
    }
  }

  pub fn forwards_cookies(&self) -> bool {
    !self.cookies.is_empty() && !is_function_url_host(self.domain_name())
  }
}

/// `{id}.lambda-url.{region}.on.aws`: function URLs do not support cookie passthrough.
pub fn is_function_url_host(domain: &str) -> bool {
  let labels: Vec<&str> = domain.split('.').collect();

  match labels.as_slice() {
    [id, FUNCTION_URL_LABEL, region, "on", "aws"] => !id.is_empty() && !region.is_empty(),
    _ => false,
  }
}
