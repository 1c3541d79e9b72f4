use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

const DEFAULT_FUNCTION_NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_FUNCTION_VERSION: &str = "$LATEST";
const DEFAULT_MEMORY_MB: u32 = 128;

static LOCAL_REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Static part of the invocation context, read from the runtime environment once.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionMetadata {
  pub function_name: String,
  pub function_version: String,
  pub log_stream_name: String,
  pub log_group_name: String,
  pub memory_limit_in_mb: u32,
}

impl FunctionMetadata {
  pub fn from_env() -> Self {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  pub fn from_lookup<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    FunctionMetadata {
      function_name: lookup("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_else(|| DEFAULT_FUNCTION_NAME.into()),
      function_version: lookup("AWS_LAMBDA_FUNCTION_VERSION").unwrap_or_else(|| DEFAULT_FUNCTION_VERSION.into()),
      log_stream_name: lookup("AWS_LAMBDA_LOG_STREAM_NAME").unwrap_or_default(),
      log_group_name: lookup("AWS_LAMBDA_LOG_GROUP_NAME").unwrap_or_default(),
      memory_limit_in_mb: lookup("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")
        .and_then(|mb| mb.parse().ok())
        .unwrap_or(DEFAULT_MEMORY_MB),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationContext {
  pub function_name: String,
  pub function_version: String,
  pub invoked_function_arn: String,
  pub log_stream_name: String,
  pub log_group_name: String,
  pub aws_request_id: String,
  pub memory_limit_in_mb: u32,
  pub deadline: DateTime<Utc>,
}

impl InvocationContext {
  pub fn new(metadata: &FunctionMetadata, aws_request_id: &str, invoked_function_arn: &str, deadline: DateTime<Utc>) -> Self {
    InvocationContext {
      function_name: metadata.function_name.clone(),
      function_version: metadata.function_version.clone(),
      invoked_function_arn: invoked_function_arn.into(),
      log_stream_name: metadata.log_stream_name.clone(),
      log_group_name: metadata.log_group_name.clone(),
      aws_request_id: aws_request_id.into(),
      memory_limit_in_mb: metadata.memory_limit_in_mb,
      deadline,
    }
  }

  /// Context for requests served by the local gateway, where no runtime supplies one.
  pub fn local(metadata: &FunctionMetadata, budget: Duration) -> Self {
    let seq = LOCAL_REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    let request_id = format!("local-{:012x}", seq);
    let budget = chrono::Duration::from_std(budget).unwrap_or_else(|_| chrono::Duration::zero());
    let arn = format!("arn:aws:lambda:local:000000000000:function:{}", metadata.function_name);

    Self::new(metadata, &request_id, &arn, Utc::now() + budget)
  }

  pub fn deadline_from_millis(epoch_millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(epoch_millis).single()
  }

  pub fn remaining_time_millis(&self) -> i64 {
    (self.deadline - Utc::now()).num_milliseconds().max(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn metadata_reads_runtime_variables() {
    let env: HashMap<&str, &str> = [
      ("AWS_LAMBDA_FUNCTION_NAME", "forwarder"),
      ("AWS_LAMBDA_FUNCTION_VERSION", "7"),
      ("AWS_LAMBDA_LOG_GROUP_NAME", "/aws/lambda/forwarder"),
      ("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "512"),
    ]
    .into_iter()
    .collect();

    let metadata = FunctionMetadata::from_lookup(|name| env.get(name).map(|v| v.to_string()));

    assert_eq!(metadata.function_name, "forwarder");
    assert_eq!(metadata.function_version, "7");
    assert_eq!(metadata.log_group_name, "/aws/lambda/forwarder");
    assert_eq!(metadata.log_stream_name, "");
    assert_eq!(metadata.memory_limit_in_mb, 512);
  }

  #[test]
  fn remaining_time_never_goes_negative() {
    let metadata = FunctionMetadata::from_lookup(|_| None);
    let expired = InvocationContext::new(&metadata, "id", "arn", Utc::now() - chrono::Duration::seconds(5));
    assert_eq!(expired.remaining_time_millis(), 0);

    let fresh = InvocationContext::local(&metadata, Duration::from_secs(30));
    let remaining = fresh.remaining_time_millis();
    assert!(remaining > 25_000 && remaining <= 30_000);
  }

  #[test]
  fn local_contexts_get_distinct_ids() {
    let metadata = FunctionMetadata::from_lookup(|_| None);
    let first = InvocationContext::local(&metadata, Duration::from_secs(1));
    let second = InvocationContext::local(&metadata, Duration::from_secs(1));

    assert_ne!(first.aws_request_id, second.aws_request_id);
    assert_eq!(first.function_name, "function_url_proxy");
  }

  #[test]
  fn deadline_header_is_epoch_millis() {
    let deadline = InvocationContext::deadline_from_millis(1_700_000_000_123).unwrap();
    assert_eq!(deadline.timestamp_millis(), 1_700_000_000_123);
  }
}
