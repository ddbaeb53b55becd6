pub mod config;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod model;
pub mod occurrence;
pub mod partition;
pub mod pipeline;
pub mod reconstruct;
pub mod reward;
pub mod store;
pub mod synthetic;
pub mod weighted;
