use std::sync::Arc;

use actix_web::dev::{self, Payload, Service, ServiceRequest, ServiceResponse};
use actix_web::{HttpRequest, ResponseError};
use futures_core::future::LocalBoxFuture;
use futures_core::Stream;
use futures_util::StreamExt;
use log::debug;

use crate::context::{FunctionMetadata, InvocationContext};
use crate::forwarder::dispatcher::Dispatcher;
use crate::forwarder::Forwarder;
use crate::gateway_service::{inbound_from_http, into_http_response};

pub struct GatewayRouteService<D> {
  pub(super) forwarder: Arc<Forwarder<D>>,
  pub(super) metadata: Arc<FunctionMetadata>,
}

impl<D: Dispatcher + 'static> Service<ServiceRequest> for GatewayRouteService<D> {
  type Response = ServiceResponse;
  type Error = actix_web::Error;
  type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

  dev::always_ready!();

  fn call(&self, req: ServiceRequest) -> Self::Future {
    let (http_request, payload) = req.into_parts();

    Box::pin(GatewayRouteService::exec(
      self.forwarder.clone(),
      self.metadata.clone(),
      http_request,
      payload,
    ))
  }
}

impl<D: Dispatcher + 'static> GatewayRouteService<D> {
  async fn exec(
    forwarder: Arc<Forwarder<D>>,
    metadata: Arc<FunctionMetadata>,
    http: HttpRequest,
    mut payload: Payload,
  ) -> Result<ServiceResponse, actix_web::Error> {
    let (size, _) = payload.size_hint();
    let mut body_buffer: Vec<u8> = Vec::with_capacity(size);

    while let Some(chunk) = payload.next().await {
      match chunk {
        Ok(bytes) => body_buffer.extend_from_slice(&bytes),
        Err(err) => {
          let error_response = err.error_response();
          return Ok(ServiceResponse::new(http, error_response));
        }
      }
    }

    let inbound = inbound_from_http(&http, body_buffer);
    let context = InvocationContext::local(&metadata, forwarder.config().request_timeout);
    debug!("Invocation {} for {} {}", context.aws_request_id, inbound.method(), inbound.raw_path);

    let response = forwarder.handle(&inbound, &context).await;

    Ok(ServiceResponse::new(http, into_http_response(response)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Configuration;
  use crate::forwarder::outbound::{OriginResponse, OutboundRequest, OutboundResult};
  use crate::gateway_service::gateway_factory::GatewayServiceFactory;
  use actix_web::http::header::SET_COOKIE;
  use actix_web::http::StatusCode;
  use actix_web::{test, App};
  use bytes::Bytes;
  use std::cell::RefCell;
  use std::collections::BTreeMap;
  use std::rc::Rc;

  struct RecordingOrigin {
    seen: Rc<RefCell<Vec<OutboundRequest>>>,
  }

  impl Dispatcher for RecordingOrigin {
    fn dispatch(&self, request: OutboundRequest) -> LocalBoxFuture<'_, OutboundResult> {
      self.seen.borrow_mut().push(request);
      let mut headers = BTreeMap::new();
      headers.insert("content-type".to_string(), "text/plain".to_string());

      Box::pin(async move {
        Ok(OriginResponse {
          status: 201,
          headers,
          set_cookies: vec!["token=t1; Path=/".into()],
          body: Bytes::from_static(b"created"),
        })
      })
    }
  }

  fn factory(config: Configuration, seen: Rc<RefCell<Vec<OutboundRequest>>>) -> GatewayServiceFactory<RecordingOrigin> {
    let forwarder = Forwarder::new(Arc::new(config), RecordingOrigin { seen });
    let metadata = FunctionMetadata::from_lookup(|_| None);

    GatewayServiceFactory::create(Arc::new(forwarder), Arc::new(metadata))
  }

  #[actix_web::test]
  async fn proxies_through_the_forwarder() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let config = Configuration {
      remote_url: Some("https://origin.example".into()),
      ..Default::default()
    };
    let app = test::init_service(App::new().default_service(factory(config, seen.clone()))).await;

    let request = test::TestRequest::post()
      .uri("/orders?id=3")
      .insert_header(("cookie", "a=1; b=2"))
      .set_payload("hello")
      .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers().get(SET_COOKIE).unwrap(), "token=t1; Path=/");
    let body = test::read_body(response).await;
    assert_eq!(&body[..], b"created");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "https://origin.example/orders?id=3");
    assert_eq!(seen[0].header("cookie"), Some("a=1; b=2"));
    assert_eq!(seen[0].body, b"hello");
  }

  #[actix_web::test]
  async fn renders_dump_page_locally() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let config = Configuration {
      remote_url: Some("https://origin.example".into()),
      ..Default::default()
    };
    let app = test::init_service(App::new().default_service(factory(config, seen))).await;

    let request = test::TestRequest::get().uri("/?dump_request=1").to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-robots-tag").unwrap(), "noindex, nofollow");
    let body = String::from_utf8(test::read_body(response).await.to_vec()).unwrap();
    assert!(body.contains("Lambda function name: &quot;function_url_proxy&quot;"));
    assert!(body.contains("Lambda Request ID: &quot;local-"));
  }

  #[actix_web::test]
  async fn missing_remote_url_yields_error_page() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let app = test::init_service(App::new().default_service(factory(Configuration::default(), seen.clone()))).await;

    let response = test::call_service(&app, test::TestRequest::get().uri("/x").to_request()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(seen.borrow().is_empty());
  }
}
