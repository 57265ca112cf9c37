pub mod content;
pub mod datasets;
pub mod error;
pub mod metrics;
pub mod mf_model;
pub mod recommenders;
pub mod server;
pub mod trainer;
pub mod types;
