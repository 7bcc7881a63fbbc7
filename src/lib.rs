//! Filesystem-shaped access to an S3-compatible object storage bucket.
//!
//! [`fs::ObjectFS`] maps hierarchical logical paths onto flat object keys
//! under an optional prefix, emulates directories with marker objects,
//! and maps a public/private [`model::fs::Visibility`] onto backend ACLs.
//! The storage client itself is any [`adapters::ObjectClient`].

pub mod adapters;
pub mod config;
pub mod filesystem;
pub mod fs;
pub mod model;
pub mod util;

pub use adapters::ObjectClient;
pub use config::AdapterConfig;
pub use filesystem::Filesystem;
pub use fs::ObjectFS;
