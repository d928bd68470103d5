#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use mesh_authz_api as api;
pub use mesh_authz_core as core;
pub use mesh_authz_index as index;

mod args;
pub mod bundle;
pub mod engine;
pub mod extension;
mod log;
pub mod metrics;
mod serve;
pub mod validation;

pub use self::{
    args::Args,
    bundle::load_bundle,
    engine::Engine,
    extension::{Provider, ProviderDefaults, Providers, StaticProvider},
    log::{LogFilter, LogFormat},
    metrics::DecisionMetrics,
    serve::serve,
};
