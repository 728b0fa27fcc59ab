//! Tracing subscriber setup

use crate::states::Data;
use tracing_subscriber::{
	fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "ocelot=debug,image_worker=debug,songbird=warn,info";

/// Build the env filter of the output layer
fn env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global tracing subscriber
///
/// Production logs are emitted as `JSON`, development logs are human readable and
/// also sent to `tokio-console`.
pub(crate) fn setup_logging(data: &Data) -> anyhow::Result<()> {
	let output: Box<dyn Layer<Registry> + Send + Sync> = if data.config.production {
		fmt::layer().json().with_filter(env_filter()).boxed()
	} else {
		fmt::layer().pretty().with_filter(env_filter()).boxed()
	};

	let registry = tracing_subscriber::registry().with(output);

	if data.config.production {
		registry.try_init()?;
	} else {
		registry.with(console_subscriber::spawn()).try_init()?;
	}

	Ok(())
}
