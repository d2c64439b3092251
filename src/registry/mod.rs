//! # Registry
//!
//! Start-up registries for pluggable components. Currently holds the
//! platform uploader registry the lifecycle manager dispatches through.

pub mod uploader_registry;

pub use uploader_registry::{RegistryError, UploaderRegistry, UploaderRegistryBuilder};
