//! Configuration types and loading for taskflow

mod api;
mod loader;

pub use api::ApiConfig;
pub use loader::TaskflowConfig;
