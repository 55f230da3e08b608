//! Service kernel demo.
//!
//! Assembles the config, logging and HTTP modules with a greeting service
//! and runs until SIGINT/SIGTERM.
//!
//! ```text
//! config.toml + env ─▶ ConfigSource ─▶ TracingLogger (dyn Logger)
//!                                   │           │
//!                                   │           ▼
//!                                   │     GreetingService
//!                                   │           │
//!                                   │           ▼
//!                                   │   GreetingHandler ─▶ group "http.handlers"
//!                                   │                               │
//!                                   └──────────────▶ HttpServer ◀───┘
//! ```

mod greeting;

use std::path::PathBuf;

use clap::Parser;

use service_kernel::config::{
    self, load_config, validation::validate_all, ConfigError, LifecycleConfig, ObservabilityConfig,
};
use service_kernel::observability::{logging, metrics};
use service_kernel::{http, AppBuilder};

#[derive(Parser)]
#[command(name = "service-kernel")]
#[command(about = "Greeting service on the service kernel", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Missing is fine; env vars still apply.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Resolve the application, print the construction order and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let source = load_config(&cli.config)?;
    if let Err(errors) = validate_all(&source) {
        for error in &errors {
            eprintln!("config error: {}", error);
        }
        return Err(ConfigError::Validation(errors).into());
    }
    let lifecycle: LifecycleConfig = source.section()?;
    let observability: ObservabilityConfig = source.section()?;

    let app = AppBuilder::with_lifecycle(lifecycle);
    app.module("config", config::module(source))?;
    app.module("logging", logging::module)?;
    app.module("http", http::module)?;
    app.module("greeting", greeting::module)?;

    if cli.check {
        let resolved = app.resolve()?;
        for (position, label) in resolved.graph().labels().iter().enumerate() {
            println!("{:>3}. {}", position + 1, label);
        }
        return Ok(());
    }

    if observability.metrics_enabled {
        if let Ok(addr) = observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    app.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
