//! rackhost CLI entry point.
//!
//! Builds the application described by the deployment's descriptor, serves a
//! single request through it, and writes the HTTP response to stdout.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rackhost_common::ConfigFile;
use rackhost_core::{HttpWriter, RackRequest, RackResponse};
use rackhost_factory::{DefaultApplicationFactory, RackApplicationFactory};
use rackhost_host::{ConfigContext, WasmRuntimeEngine};

/// Serve one request through a WebAssembly Rack-style application.
#[derive(Debug, Parser)]
#[command(name = "rackhost", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(long, short, env = "RACKHOST_CONFIG")]
    config: Option<PathBuf>,

    /// Application descriptor: a module path or inline WAT. Overrides the
    /// configured init parameter.
    #[arg(long, env = "RACKHOST_RACKUP")]
    rackup: Option<String>,

    /// Request method.
    #[arg(long, short = 'X', default_value = "GET")]
    method: String,

    /// Request header as `Name: value`. May be repeated.
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// Request body.
    #[arg(long, short = 'd')]
    data: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, env = "RACKHOST_LOG_JSON")]
    log_json: bool,

    /// Request target, e.g. `/items?page=2`.
    #[arg(default_value = "/")]
    path: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let file = match &args.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let mut context = ConfigContext::from_config(&file.context);
    if let Some(rackup) = &args.rackup {
        context = context.with_param(&file.runtime.factory.descriptor_parameter, rackup);
    }
    let context = Arc::new(context);

    let request = build_request(&args)?;

    let engine =
        WasmRuntimeEngine::new(&file.runtime).context("Failed to create the WebAssembly engine")?;
    let mut factory = DefaultApplicationFactory::new(engine, file.runtime.factory.clone());
    factory.init(context.clone());

    let response = serve(&factory, &request)?;

    let mut writer = HttpWriter::new(io::stdout().lock());
    response.respond(&mut writer, context.as_ref());

    factory.destroy();
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,rackhost=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the response
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn build_request(args: &Args) -> anyhow::Result<RackRequest> {
    let mut request = RackRequest::new(&args.method, &args.path);
    for header in &args.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("Invalid header '{header}': expected 'Name: value'");
        };
        request = request.with_header(name.trim(), value.trim());
    }
    if let Some(data) = &args.data {
        request = request.with_body(data.as_bytes());
    }
    Ok(request)
}

/// Run the request through a fresh application, or through the error
/// application when the primary one cannot be built or fails.
fn serve(
    factory: &DefaultApplicationFactory<WasmRuntimeEngine>,
    request: &RackRequest,
) -> anyhow::Result<RackResponse> {
    match factory.get_application() {
        Ok(app) => {
            let result = app.call(request);
            factory.finished_with_application(app);
            match result {
                Ok(response) => {
                    info!(status = response.status(), "Request served");
                    return Ok(response);
                }
                Err(e) => error!(error = %e, "Application failed to handle the request"),
            }
        }
        Err(e) => error!(error = %e, "Application could not be initialized"),
    }

    let error_app = factory
        .error_application()
        .context("Factory has no error application")?;
    let response = error_app.call(request).unwrap_or_else(|e| {
        error!(error = %e, "Error application failed");
        RackResponse::text(500, "Internal Server Error")
    });
    Ok(response)
}
