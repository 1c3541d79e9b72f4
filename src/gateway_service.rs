//! Local stand-in for the HTTP gateway: plain HTTP in, gateway envelope through the forwarder, plain HTTP out.

use std::collections::BTreeMap;

use actix_web::http::header::{HeaderName, HeaderValue, COOKIE, SET_COOKIE, USER_AGENT};
use actix_web::http::StatusCode;
use actix_web::web::Query;
use actix_web::{HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{error, warn};

use crate::inbound::{HttpDescription, InboundRequest, RequestContext};
use crate::response::ProxyResponse;

pub mod gateway_factory;
pub mod gateway_route_service;

const PAYLOAD_VERSION: &str = "2.0";
const HOP_BY_HOP: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

pub fn inbound_from_http(request: &HttpRequest, body: Vec<u8>) -> InboundRequest {
  let mut headers = BTreeMap::new();
  let mut cookies = Vec::new();

  for name in request.headers().keys() {
    let values: Vec<String> = request
      .headers()
      .get_all(name)
      .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
      .collect();

    if *name == COOKIE {
      cookies.extend(
        values
          .iter()
          .flat_map(|value| value.split(';'))
          .map(str::trim)
          .filter(|cookie| !cookie.is_empty())
          .map(String::from),
      );
    } else {
      headers.insert(name.as_str().to_string(), values.join(","));
    }
  }

  let query_string_parameters = match Query::<BTreeMap<String, String>>::from_query(request.query_string()) {
    Ok(query_params) => query_params.0,
    Err(err) => {
      error!("Unable to parse query parameters {}", err);
      BTreeMap::new()
    }
  };

  let (body, is_base64_encoded) = if body.is_empty() {
    (None, false)
  } else {
    match String::from_utf8(body) {
      Ok(text) => (Some(text), false),
      Err(binary) => (Some(STANDARD.encode(binary.into_bytes())), true),
    }
  };

  let connection = request.connection_info();
  let user_agent = request
    .headers()
    .get(USER_AGENT)
    .and_then(|value| value.to_str().ok())
    .unwrap_or_default()
    .to_string();

  InboundRequest {
    version: PAYLOAD_VERSION.into(),
    raw_path: request.path().to_string(),
    raw_query_string: request.query_string().to_string(),
    cookies,
    headers,
    query_string_parameters,
    request_context: RequestContext {
      domain_name: strip_port(connection.host()).to_string(),
      http: HttpDescription {
        method: request.method().to_string(),
        path: request.path().to_string(),
        protocol: format!("{:?}", request.version()),
        source_ip: connection.realip_remote_addr().map(strip_port).unwrap_or_default().to_string(),
        user_agent,
      },
      ..Default::default()
    },
    body,
    is_base64_encoded,
    ..Default::default()
  }
}

pub fn into_http_response(response: ProxyResponse) -> HttpResponse {
  let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
  let mut builder = HttpResponse::build(status);

  for (name, value) in response.headers.iter() {
    if HOP_BY_HOP.iter().any(|hop| name.eq_ignore_ascii_case(hop)) {
      continue;
    }

    match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
      (Ok(name), Ok(value)) => {
        builder.append_header((name, value));
      }
      _ => warn!("Dropping invalid response header '{}'.", name),
    }
  }

  for cookie in response.cookies.iter() {
    match HeaderValue::try_from(cookie.as_str()) {
      Ok(value) => {
        builder.append_header((SET_COOKIE, value));
      }
      Err(_) => warn!("Dropping invalid cookie '{}'.", cookie),
    }
  }

  match response.body_bytes() {
    Ok(bytes) => builder.body(bytes),
    Err(err) => {
      error!("Response body is not valid base64 {}", err);
      HttpResponse::InternalServerError().finish()
    }
  }
}

fn strip_port(host: &str) -> &str {
  match host.rfind(':') {
    Some(index) if !host[index..].contains(']') => &host[..index],
    _ => host,
  }
}
