//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

/// Filter used when `RUST_LOG` is unset.
///
/// Outbound HTTP internals (`hyper`, `reqwest`) stay at `warn`: every relayed
/// call would otherwise log twice.
pub fn default_filter(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "alora_relay=debug,tower_http=debug,hyper=warn,reqwest=warn,info",
        Environment::Staging => "alora_relay=debug,tower_http=info,hyper=warn,reqwest=warn,info",
        Environment::Prod => "alora_relay=info,tower_http=info,hyper=warn,reqwest=warn,warn",
    }
}

pub fn init_logging(env: &Environment) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // One JSON object per line in production, for the log shipper
    if env.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    }

    tracing::info!(environment = ?env, "Logging initialized");
}
