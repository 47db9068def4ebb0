//! verity/crates/vr-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Verity.

pub mod badges;
pub mod error;
pub mod events;
pub mod explore;
pub mod models;
pub mod services;
pub mod traits;
pub mod voting;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
