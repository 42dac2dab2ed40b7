// Core utilities: configuration and numeric helpers

pub mod config;
pub mod math;

pub use config::LoaderOptions;
