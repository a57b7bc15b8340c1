pub mod config;
pub mod error;
pub mod field;
pub mod geom;
#[cfg(feature = "visualization")]
pub mod helpers;
pub mod output;
pub mod rect;
pub mod row;
pub mod settings;
pub mod shape;
pub mod sweep;

/// Installs the global `tracing` subscriber.
///
/// The level defaults to INFO and can be changed through `RUST_LOG`.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
