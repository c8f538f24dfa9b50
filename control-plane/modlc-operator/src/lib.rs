pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod events;
pub mod labels;
pub mod module;
pub mod release;
pub mod runtime;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{
    EnvFilter,
    filter::{Directive, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub fn init_tracing(default_env: &str) {
    let default_directive: Directive = default_env
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .from_env_lossy()
        .add_directive(default_directive);

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}
