// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use notification_config::Config;
use tracing::{
    level_filters::LevelFilter,
    subscriber::{set_global_default, SetGlobalDefaultError},
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file.
    /// Values missing from the file can be set with `NOTIFICATIONS_` prefixed
    /// environment variables, e.g. `NOTIFICATIONS_ENDPOINT__BASE_URL`.
    #[arg(long, value_name = "FILE", verbatim_doc_comment)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Full,
    Compact,
    Json,
}

/// Sets up tracing, allows log level to be set from the environment variables
fn init_tracing(format: LogFormat) -> Result<(), SetGlobalDefaultError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let subscriber_builder: tracing_subscriber::fmt::SubscriberBuilder<
        tracing_subscriber::fmt::format::DefaultFields,
        tracing_subscriber::fmt::format::Format,
        EnvFilter,
    > = FmtSubscriber::builder().with_env_filter(filter);
    match format {
        LogFormat::Json => set_global_default(subscriber_builder.json().finish()),
        LogFormat::Full => set_global_default(subscriber_builder.finish()),
        LogFormat::Compact => set_global_default(subscriber_builder.compact().finish()),
        LogFormat::Pretty => set_global_default(subscriber_builder.with_ansi(true).pretty().finish()),
    }
}

pub fn get_config() -> anyhow::Result<Config> {
    let cli = Cli::parse();
    // Before parsing so configuration errors reach the log.
    init_tracing(cli.log_format)?;

    let config = Config::parse(cli.config.as_ref()).map_err(|e| {
        tracing::error!(
            "Invalid configuration file `{}`: {}, if a value is missing you can also use \
                --config to fill the rest of the values",
            cli.config.clone().unwrap_or_default().display(),
            e
        );
        anyhow::anyhow!(e)
    })?;

    Ok(config)
}
