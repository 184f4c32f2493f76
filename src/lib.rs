//! Image Sync Library
//!
//! Mirrors every repository and tag of an owner from a source registry to a destination
//! registry. Discovery goes through a [`registry::RegistryClient`] (hub, v1 or v2 dialect) and
//! every image is moved by an [`executor::ImageExecutor`] through the pull → retag → push
//! [`pipeline`].

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod image;
pub mod logging;
pub mod pipeline;
pub mod registry;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use image::ImageRef;
pub use logging::Logger;
pub use pipeline::{SyncPipeline, SyncReport};
