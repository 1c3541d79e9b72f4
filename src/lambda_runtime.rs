//! Client for the host runtime API: pull one invocation, answer it, repeat.

use bytes::Bytes;
use chrono::Utc;
use log::{debug, error, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde_json::json;

use crate::context::{FunctionMetadata, InvocationContext};
use crate::error::RuntimeError;
use crate::forwarder::dispatcher::Dispatcher;
use crate::forwarder::Forwarder;
use crate::http_client;
use crate::inbound::InboundRequest;
use crate::response::ProxyResponse;

const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
const RUNTIME_API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "lambda-runtime-aws-request-id";
const DEADLINE_HEADER: &str = "lambda-runtime-deadline-ms";
const FUNCTION_ARN_HEADER: &str = "lambda-runtime-invoked-function-arn";
const ERROR_TYPE_HEADER: &str = "lambda-runtime-function-error-type";
const INVALID_EVENT: &str = "InvalidEvent";
const APPLICATION_JSON: &str = "application/json";

pub struct Invocation {
  pub context: InvocationContext,
  pub payload: Bytes,
}

pub struct RuntimeClient {
  http_client: Client,
  endpoint: String,
  metadata: FunctionMetadata,
}

impl RuntimeClient {
  pub fn new(http_client: Client, runtime_api: &str, metadata: FunctionMetadata) -> Self {
    RuntimeClient {
      http_client,
      endpoint: format!("http://{}/{}/runtime", runtime_api, RUNTIME_API_VERSION),
      metadata,
    }
  }

  pub fn from_env(metadata: FunctionMetadata) -> Result<Self, RuntimeError> {
    let runtime_api = std::env::var(RUNTIME_API_ENV).map_err(|_| RuntimeError::MissingEndpoint)?;
    let http_client = http_client::runtime_client()?;

    Ok(Self::new(http_client, &runtime_api, metadata))
  }

  pub fn is_available() -> bool {
    std::env::var_os(RUNTIME_API_ENV).is_some()
  }

  pub async fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
    let response = self
      .http_client
      .get(format!("{}/invocation/next", self.endpoint))
      .send()
      .await?;
    let response = ensure_success(response)?;

    let request_id = header(&response, REQUEST_ID_HEADER)
      .ok_or(RuntimeError::MissingHeader("Lambda-Runtime-Aws-Request-Id"))?
      .to_string();
    let function_arn = header(&response, FUNCTION_ARN_HEADER).unwrap_or_default().to_string();
    let deadline = header(&response, DEADLINE_HEADER)
      .and_then(|millis| millis.parse::<i64>().ok())
      .and_then(InvocationContext::deadline_from_millis)
      .unwrap_or_else(Utc::now);

    let context = InvocationContext::new(&self.metadata, &request_id, &function_arn, deadline);
    let payload = response.bytes().await?;

    Ok(Invocation { context, payload })
  }

  pub async fn post_response(&self, request_id: &str, response: &ProxyResponse) -> Result<(), RuntimeError> {
    let body = serde_json::to_vec(response)?;
    let posted = self
      .http_client
      .post(format!("{}/invocation/{}/response", self.endpoint, request_id))
      .header(CONTENT_TYPE, APPLICATION_JSON)
      .body(body)
      .send()
      .await?;

    ensure_success(posted).map(|_| ())
  }

  pub async fn post_error(&self, request_id: &str, error_type: &str, message: &str) -> Result<(), RuntimeError> {
    let body = json!({ "errorMessage": message, "errorType": error_type });
    let posted = self
      .http_client
      .post(format!("{}/invocation/{}/error", self.endpoint, request_id))
      .header(CONTENT_TYPE, APPLICATION_JSON)
      .header(ERROR_TYPE_HEADER, error_type)
      .body(body.to_string())
      .send()
      .await?;

    ensure_success(posted).map(|_| ())
  }
}

/// Serves invocations one after another. Only a failure to fetch the next invocation ends the loop.
pub async fn run<D: Dispatcher>(forwarder: &Forwarder<D>, runtime: &RuntimeClient) -> Result<(), RuntimeError> {
  loop {
    let invocation = runtime.next_invocation().await?;
    let request_id = invocation.context.aws_request_id.clone();

    if let Err(err) = process(forwarder, runtime, invocation).await {
      error!("Invocation {} could not be answered: {}", request_id, err);
    }
  }
}

pub async fn process<D: Dispatcher>(
  forwarder: &Forwarder<D>,
  runtime: &RuntimeClient,
  invocation: Invocation,
) -> Result<(), RuntimeError> {
  let Invocation { context, payload } = invocation;
  debug!("Invocation {} received ({} bytes).", context.aws_request_id, payload.len());

  match serde_json::from_slice::<InboundRequest>(&payload) {
    Ok(inbound) => {
      let response = forwarder.handle(&inbound, &context).await;
      runtime.post_response(&context.aws_request_id, &response).await
    }
    Err(err) => {
      warn!("Invocation {} carried an unreadable event: {}", context.aws_request_id, err);
      runtime
        .post_error(&context.aws_request_id, INVALID_EVENT, &err.to_string())
        .await
    }
  }
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
  response.headers().get(name).and_then(|value| value.to_str().ok())
}

fn ensure_success(response: Response) -> Result<Response, RuntimeError> {
  if response.status().is_success() {
    Ok(response)
  } else {
    Err(RuntimeError::Status(response.status()))
  }
}
