pub mod app_context;
pub mod config;
pub mod error;
pub mod liveness;
pub mod masking;
pub mod metrics_consts;
pub mod pipeline;
pub mod queue;
pub mod server;
pub mod types;
pub mod writer;
