//! Container engine command layer for nanowhale
//!
//! This crate builds and runs commands against the container engine (by
//! default `docker` reached through `wsl`): bounded request/response calls,
//! the engine-side clock query, resource listing, and the management
//! commands run against containers, images and volumes.

mod client;
mod config;
mod error;
mod resource;

pub use client::{EngineClient, parse_json_lines};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use resource::ResourceCommand;

// Re-export types that are used in our public API
pub use nanowhale_types::{ContainerInfo, ImageInfo, ResourceKind, Timestamp, VolumeInfo};
