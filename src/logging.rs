//! Tracing setup.
//!
//! The subscriber is installed before the config file is read, so messages
//! logged while loading config are kept. The level from config is applied
//! afterwards through a reload handle.

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

const DEFAULT_LEVEL: &str = "info";

pub type LogHandle = reload::Handle<EnvFilter, Registry>;

/// Reloadable `EnvFilter` plus a fmt layer writing to `writer`.
pub fn subscriber<W>(writer: W) -> (impl Subscriber + Send + Sync + 'static, LogHandle)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(EnvFilter::new(DEFAULT_LEVEL));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer));
    (subscriber, handle)
}

/// Swap in the configured level. An unparseable level keeps `info`.
pub fn apply_level(handle: &LogHandle, level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|err| {
        tracing::warn!(level, error = %err, "invalid log level, using {DEFAULT_LEVEL}");
        EnvFilter::new(DEFAULT_LEVEL)
    });
    handle.reload(filter).context("failed to apply log level")
}
