//! Configuration module for procrun
//!
//! Provides XDG-compliant layered configuration loading: run defaults,
//! a global environment, and named profiles.

pub mod interpolate;
pub mod loader;
pub mod model;

pub use interpolate::interpolate_config;
pub use loader::{config_paths, default_config_file, find_config_files, load_config};
pub use model::*;
