use std::collections::BTreeMap;
use std::error::Error;
use std::io::ErrorKind;

use futures_core::future::LocalBoxFuture;
use log::warn;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, SET_COOKIE};
use reqwest::{Client, Method};

use crate::forwarder::outbound::{OriginResponse, OutboundRequest, OutboundResult, TransportFailure};

/// Performs the single outbound call of an invocation.
pub trait Dispatcher {
  fn dispatch(&self, request: OutboundRequest) -> LocalBoxFuture<'_, OutboundResult>;
}

pub struct ReqwestDispatcher {
  http_client: Client,
}

impl Dispatcher for ReqwestDispatcher {
  fn dispatch(&self, request: OutboundRequest) -> LocalBoxFuture<'_, OutboundResult> {
    Box::pin(self.send(request))
  }
}

impl ReqwestDispatcher {
  pub fn new(http_client: Client) -> Self {
    Self { http_client }
  }

  async fn send(&self, request: OutboundRequest) -> OutboundResult {
    let OutboundRequest {
      method,
      url,
      headers,
      body,
    } = request;

    let method = Method::from_bytes(method.as_bytes())
      .map_err(|err| TransportFailure::Other(format!("invalid method '{}': {}", method, err)))?;

    let response = self
      .http_client
      .request(method, url.as_str())
      .headers(to_header_map(&headers))
      .body(body)
      .send()
      .await
      .map_err(classify)?;

    let status = response.status().as_u16();
    let (headers, set_cookies) = collapse_headers(response.headers());
    let body = response.bytes().await.map_err(classify)?;

    Ok(OriginResponse {
      status,
      headers,
      set_cookies,
      body,
    })
  }
}

/// Each call gets a fresh map; the client itself holds no per-request state.
fn to_header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
  let mut header_map = HeaderMap::with_capacity(headers.len());

  for (name, value) in headers {
    match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
      (Ok(name), _) if name == CONTENT_LENGTH => {}
      (Ok(name), Ok(value)) => {
        header_map.insert(name, value);
      }
      _ => warn!("Skipping invalid outbound header '{}'.", name),
    }
  }

  header_map
}

fn collapse_headers(headers: &HeaderMap) -> (BTreeMap<String, String>, Vec<String>) {
  let mut collapsed = BTreeMap::new();
  let mut set_cookies = Vec::new();

  for name in headers.keys() {
    let values = headers
      .get_all(name)
      .iter()
      .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    if *name == SET_COOKIE {
      set_cookies.extend(values);
    } else {
      collapsed.insert(name.as_str().to_string(), values.collect::<Vec<_>>().join(", "));
    }
  }

  (collapsed, set_cookies)
}

fn classify(err: reqwest::Error) -> TransportFailure {
  if err.is_timeout() {
    TransportFailure::Timeout(err.to_string())
  } else if err.is_connect() {
    match io_error_kind(&err) {
      Some(ErrorKind::ConnectionRefused) => TransportFailure::ConnectionRefused,
      _ => TransportFailure::Unreachable(err.to_string()),
    }
  } else {
    TransportFailure::Other(err.to_string())
  }
}

fn io_error_kind(err: &(dyn Error + 'static)) -> Option<ErrorKind> {
  let mut source = err.source();

  while let Some(cause) = source {
    if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
      return Some(io_error.kind());
    }
    source = cause.source();
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http_client::HttpClientConfig;
  use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
  use std::time::Duration;

  async fn echo(req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let cookie = req
      .headers()
      .get("cookie")
      .and_then(|v| v.to_str().ok())
      .unwrap_or("")
      .to_string();

    HttpResponse::Ok()
      .insert_header(("x-seen-method", req.method().as_str()))
      .insert_header(("x-seen-cookie", cookie))
      .body(body)
  }

  async fn cookies() -> HttpResponse {
    HttpResponse::Ok()
      .append_header(("set-cookie", "a=1; Path=/"))
      .append_header(("set-cookie", "b=2; HttpOnly"))
      .append_header(("x-multi", "one"))
      .append_header(("x-multi", "two"))
      .finish()
  }

  async fn slow() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_secs(3)).await;
    HttpResponse::Ok().finish()
  }

  fn start_origin() -> String {
    let server = HttpServer::new(|| {
      App::new()
        .route("/echo", web::post().to(echo))
        .route("/cookies", web::get().to(cookies))
        .route("/slow", web::get().to(slow))
        .route(
          "/moved",
          web::get().to(|| async { HttpResponse::Found().insert_header(("location", "/echo")).finish() }),
        )
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let address = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", address)
  }

  fn dispatcher(timeout: Duration) -> ReqwestDispatcher {
    let client = HttpClientConfig {
      http_proxy: None,
      user: None,
      pass: None,
      timeout,
    }
    .to_client()
    .unwrap();

    ReqwestDispatcher::new(client)
  }

  fn request(method: &str, url: String) -> OutboundRequest {
    OutboundRequest {
      method: method.into(),
      url,
      ..Default::default()
    }
  }

  #[actix_web::test]
  async fn forwards_method_headers_and_body() {
    let base = start_origin();
    let mut outbound = request("POST", format!("{}/echo", base));
    outbound.headers.insert("cookie".into(), "a=1; b=2".into());
    outbound.headers.insert("content-length".into(), "999".into());
    outbound.body = b"payload".to_vec();

    let response = dispatcher(Duration::from_secs(5)).dispatch(outbound).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("x-seen-method").map(String::as_str), Some("POST"));
    assert_eq!(response.headers.get("x-seen-cookie").map(String::as_str), Some("a=1; b=2"));
    assert_eq!(&response.body[..], b"payload");
  }

  #[actix_web::test]
  async fn collapses_headers_and_keeps_set_cookie_apart() {
    let base = start_origin();

    let response = dispatcher(Duration::from_secs(5))
      .dispatch(request("GET", format!("{}/cookies", base)))
      .await
      .unwrap();

    assert_eq!(response.set_cookies, vec!["a=1; Path=/", "b=2; HttpOnly"]);
    assert_eq!(response.headers.get("x-multi").map(String::as_str), Some("one, two"));
    assert!(!response.headers.contains_key("set-cookie"));
  }

  #[actix_web::test]
  async fn redirects_are_not_followed() {
    let base = start_origin();

    let response = dispatcher(Duration::from_secs(5))
      .dispatch(request("GET", format!("{}/moved", base)))
      .await
      .unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(response.headers.get("location").map(String::as_str), Some("/echo"));
  }

  #[actix_web::test]
  async fn refused_connection_is_classified() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = dispatcher(Duration::from_secs(5))
      .dispatch(request("GET", format!("http://127.0.0.1:{}/", port)))
      .await;

    assert_eq!(result, Err(TransportFailure::ConnectionRefused));
  }

  #[actix_web::test]
  async fn slow_origin_times_out() {
    let base = start_origin();

    let result = dispatcher(Duration::from_millis(200))
      .dispatch(request("GET", format!("{}/slow", base)))
      .await;

    assert!(matches!(result, Err(TransportFailure::Timeout(_))), "{:?}", result);
  }

  #[actix_web::test]
  async fn invalid_method_is_other() {
    let result = dispatcher(Duration::from_secs(1))
      .dispatch(request("BAD METHOD", "http://127.0.0.1:1/".into()))
      .await;

    assert!(matches!(result, Err(TransportFailure::Other(_))));
  }
}
