use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;

use crate::config::Configuration;

pub struct HttpClientConfig {
  pub http_proxy: Option<String>,
  pub user: Option<String>,
  pub pass: Option<String>,
  pub timeout: Duration,
}

impl From<&Configuration> for HttpClientConfig {
  fn from(config: &Configuration) -> Self {
    HttpClientConfig {
      http_proxy: config.proxy_url.clone(),
      user: config.proxy_auth_user.clone(),
      pass: config.proxy_auth_pass.clone(),
      timeout: config.request_timeout,
    }
  }
}

impl HttpClientConfig {
  /// Client for origin traffic: redirects surface to the caller, certificates are not checked
  /// and nothing (cookies included) is remembered between requests.
  pub fn to_client(self) -> Result<Client, reqwest::Error> {
    let HttpClientConfig {
      http_proxy,
      user,
      pass,
      timeout,
    } = self;
    let mut client_builder = reqwest::ClientBuilder::new();

    if let Some(proxy_url) = http_proxy {
      let mut proxy = reqwest::Proxy::all(proxy_url)?;

      if let (Some(user_name), Some(password)) = (user, pass) {
        proxy = proxy.basic_auth(&user_name, &password);
      }

      client_builder = client_builder.proxy(proxy);
    }

    let client = client_builder
      .redirect(Policy::none())
      .danger_accept_invalid_certs(true)
      .timeout(timeout)
      .build()?;

    Ok(client)
  }
}

/// Client for the runtime API. Long-polls, so no timeout.
pub fn runtime_client() -> Result<Client, reqwest::Error> {
  reqwest::ClientBuilder::new().no_proxy().build()
}
