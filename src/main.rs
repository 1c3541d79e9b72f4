mod config;
mod context;
mod diagnostic_page;
mod error;
mod forwarder;
mod gateway_service;
mod http_client;
mod inbound;
mod lambda_runtime;
mod response;
mod std_logger;

use std::env;
use std::io::{ErrorKind, Result};
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use crate::config::Configuration;
use crate::context::FunctionMetadata;
use crate::forwarder::dispatcher::ReqwestDispatcher;
use crate::forwarder::Forwarder;
use crate::gateway_service::gateway_factory::GatewayServiceFactory;
use crate::http_client::HttpClientConfig;
use crate::lambda_runtime::RuntimeClient;

#[derive(Parser, Debug)]
#[command(version, about = "Forwards gateway HTTP events to a remote web site")]
struct Cli {
  /// Optional YAML file with defaults; environment variables override it.
  #[arg(long, env = "PROXY_CONFIG_FILE", global = true)]
  config: Option<PathBuf>,

  #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
  log_level: String,

  #[command(subcommand)]
  mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone)]
enum Mode {
  /// Pull invocations from the runtime API.
  Lambda,
  /// Accept plain HTTP and act as the gateway locally.
  Serve {
    #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0")]
    bind: String,
    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, env = "HTTP_WORKER_COUNT", default_value_t = 4)]
    workers: usize,
  },
}

#[actix_web::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  std_logger::init(std_logger::parse_level(&cli.log_level))
    .map_err(|err| std::io::Error::new(ErrorKind::Other, err.to_string()))?;

  let config = Configuration::load(cli.config.as_deref()).map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;

  if let Err(err) = config.remote_url() {
    warn!("{}; every request will be answered with an error page.", err);
  }

  let http_client = HttpClientConfig::from(&config)
    .to_client()
    .map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;

  let config = Arc::new(config);
  let forwarder = Forwarder::new(config, ReqwestDispatcher::new(http_client));
  let metadata = FunctionMetadata::from_env();

  let mode = cli.mode.unwrap_or_else(|| {
    if RuntimeClient::is_available() {
      Mode::Lambda
    } else {
      serve_from_env()
    }
  });

  match mode {
    Mode::Lambda => {
      let runtime = RuntimeClient::from_env(metadata).map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;
      info!("Serving runtime invocations for '{}'.", forwarder.config().app_name);

      lambda_runtime::run(&forwarder, &runtime).await.map_err(|err| {
        error!("Runtime loop stopped: {}", err);
        std::io::Error::new(ErrorKind::Other, err)
      })
    }
    Mode::Serve { bind, port, workers } => {
      let forwarder = Arc::new(forwarder);
      let metadata = Arc::new(metadata);
      info!("Listening on {}:{} with {} workers.", bind, port, workers);

      HttpServer::new(move || {
        App::new().default_service(GatewayServiceFactory::create(forwarder.clone(), metadata.clone()))
      })
      .workers(workers)
      .bind((bind, port))?
      .run()
      .await
    }
  }
}

fn serve_from_env() -> Mode {
  const DEFAULT_PORT: u16 = 8080;
  const DEFAULT_WORKER_COUNT: usize = 4;
  const DEFAULT_BIND: &str = "0.0.0.0";

  let bind: String = env::var("HTTP_BIND").map_or(DEFAULT_BIND.into(), |e| e);
  let port = env::var("HTTP_PORT").map_or(DEFAULT_PORT, |e| e.parse::<u16>().unwrap_or(DEFAULT_PORT));
  let workers = env::var("HTTP_WORKER_COUNT").map_or(DEFAULT_WORKER_COUNT, |e| {
    e.parse::<usize>().unwrap_or(DEFAULT_WORKER_COUNT)
  });

  Mode::Serve { bind, port, workers }
}
