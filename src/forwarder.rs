use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{error, info, warn};

use crate::config::Configuration;
use crate::context::InvocationContext;
use crate::diagnostic_page;
use crate::forwarder::dispatcher::Dispatcher;
use crate::forwarder::outbound::{OriginResponse, OutboundRequest};
use crate::inbound::InboundRequest;
use crate::response::ProxyResponse;

pub mod dispatcher;
pub mod outbound;

const ACCEPT_ENCODING: &str = "accept-encoding";
const COOKIE: &str = "cookie";
const MISSING_REMOTE_URL: &str = "Missing REMOTE_URL environment variable";
const NOT_CONFIGURED: &str = "AWS Lambda function not correctly configured";
const TOO_LARGE: &str = "Too much data to return from the remote web site";
const INVALID_BODY: &str = "Invalid base64 request body";

pub fn target_url(base: &str, path: &str, raw_query: &str) -> String {
  let mut url = String::with_capacity(base.len() + path.len() + raw_query.len() + 1);
  url.push_str(base);
  url.push_str(path);

  if !raw_query.trim().is_empty() {
    url.push('?');
    url.push_str(raw_query);
  }

  url
}

pub struct Forwarder<D> {
  config: Arc<Configuration>,
  dispatcher: D,
}

impl<D: Dispatcher> Forwarder<D> {
  pub fn new(config: Arc<Configuration>, dispatcher: D) -> Self {
    Self { config, dispatcher }
  }

  pub fn config(&self) -> &Configuration {
    &self.config
  }

  pub async fn handle(&self, inbound: &InboundRequest, context: &InvocationContext) -> ProxyResponse {
    let response = match self.forward(inbound).await {
      Gate::Final(response) => return response,
      Gate::Relay(response) => response,
    };

    if inbound.wants_request_dump() {
      return ProxyResponse::html(200, diagnostic_page::render_dump(inbound, context));
    }

    response
  }

  async fn forward(&self, inbound: &InboundRequest) -> Gate {
    let base = match self.config.remote_url() {
      Ok(base) => base,
      Err(err) => {
        warn!("{}", err);
        let label = format!("{}: missing REMOTE_URL environment variable", self.config.general_error);
        return Gate::Final(self.page(500, MISSING_REMOTE_URL, &label, NOT_CONFIGURED));
      }
    };

    let url = target_url(base, &inbound.raw_path, &inbound.raw_query_string);

    if self.config.is_filtered(&inbound.raw_path) {
      info!("Rejecting filtered path '{}'.", inbound.raw_path);
      return Gate::Final(self.error_page(500, &url, &self.config.filtered_message));
    }

    let trace = inbound.wants_connection_trace();

    let outbound = match self.outbound_request(inbound, url) {
      Ok(outbound) => outbound,
      Err(url) => return Gate::Final(self.error_page(500, &url, INVALID_BODY)),
    };
    let url = outbound.url.clone();

    if trace {
      info!("remote url = {}", outbound.url);
      info!("local http method = {}", outbound.method);
      info!("headers = {:?}", outbound.headers);
      info!("cookies = {:?}", inbound.cookies);
      info!("body = {}", String::from_utf8_lossy(&outbound.body));
    }

    match self.dispatcher.dispatch(outbound).await {
      Ok(origin) => {
        if trace {
          trace_origin(&origin);
        }

        if origin.body.len() > self.config.payload_quota {
          warn!(
            "Origin returned {} bytes for {}, over the {} byte quota.",
            origin.body.len(),
            url,
            self.config.payload_quota
          );
          let label = format!("{} (Payload Too Large)", self.config.general_error);
          return Gate::Final(self.page(413, &url, &label, TOO_LARGE));
        }

        let OriginResponse {
          status,
          headers,
          set_cookies,
          body,
        } = origin;

        Gate::Relay(ProxyResponse::relay(status, headers, set_cookies, &body))
      }
      Err(failure) => {
        error!("Request to {} failed: {}", url, failure);
        Gate::Relay(self.error_page(500, &url, &failure.description()))
      }
    }
  }

  /// Builds a fresh header set per invocation. A body that does not decode yields `Err(url)`.
  fn outbound_request(&self, inbound: &InboundRequest, url: String) -> Result<OutboundRequest, String> {
    let body = match inbound.decoded_body() {
      Ok(body) => body,
      Err(err) => {
        warn!("Unable to decode request body: {}", err);
        return Err(url);
      }
    };

    let mut headers: BTreeMap<String, String> = inbound
      .headers
      .iter()
      .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
      .collect();

    if inbound.forwards_cookies() {
      headers.insert(COOKIE.to_string(), inbound.cookies.join("; "));
    }

    if self.config.strip_accept_encoding {
      headers.remove(ACCEPT_ENCODING);
    }

    Ok(OutboundRequest {
      method: inbound.method().to_string(),
      url,
      headers,
      body,
    })
  }

  fn error_page(&self, status: u16, url: &str, description: &str) -> ProxyResponse {
    self.page(status, url, &self.config.general_error, description)
  }

  fn page(&self, status: u16, url: &str, label: &str, description: &str) -> ProxyResponse {
    ProxyResponse::diagnostic(status, url, label, description, &self.config.app_name)
  }
}

/// `Final` short-circuits everything, `Relay` may still be replaced by the dump page.
enum Gate {
  Final(ProxyResponse),
  Relay(ProxyResponse),
}

fn trace_origin(origin: &OriginResponse) {
  info!("statusCode returned from remote = {}", origin.status);
  info!("resp cookies = {:?}", origin.set_cookies);
  info!("resp headers = {:?}", origin.headers);
  info!("size of received data = {}", origin.body.len());
  info!("size of encoded data = {}", STANDARD.encode(&origin.body).len());
}
