pub mod codec;
pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod service;
pub mod store;
pub mod vision;
