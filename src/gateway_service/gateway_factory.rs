use std::sync::Arc;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use futures_core::future::LocalBoxFuture;

use crate::context::FunctionMetadata;
use crate::forwarder::dispatcher::Dispatcher;
use crate::forwarder::Forwarder;
use crate::gateway_service::gateway_route_service::GatewayRouteService;

pub struct GatewayServiceFactory<D> {
  pub forwarder: Arc<Forwarder<D>>,
  pub metadata: Arc<FunctionMetadata>,
}

impl<D: Dispatcher + 'static> ServiceFactory<ServiceRequest> for GatewayServiceFactory<D> {
  type Response = ServiceResponse;
  type Error = actix_web::Error;
  type Config = ();
  type Service = GatewayRouteService<D>;
  type InitError = ();
  type Future = LocalBoxFuture<'static, Result<Self::Service, Self::InitError>>;

  fn new_service(&self, _: Self::Config) -> Self::Future {
    let service = GatewayRouteService {
      forwarder: self.forwarder.clone(),
      metadata: self.metadata.clone(),
    };

    Box::pin(async move { Ok(service) })
  }
}

impl<D> GatewayServiceFactory<D> {
  pub fn create(forwarder: Arc<Forwarder<D>>, metadata: Arc<FunctionMetadata>) -> Self {
    Self { forwarder, metadata }
  }
}
