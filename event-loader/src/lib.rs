pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod loader;
pub mod metrics_consts;
pub mod pipeline;
pub mod tokenizer;
pub mod warehouse;
