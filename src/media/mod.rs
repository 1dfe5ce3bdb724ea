//! Media handling: container sniffing and materialization.
//!
//! - Sniffer: pure header inspection, payload bytes → container format
//! - Materializer: moves matched captures to `{library_id}.{ext}`

pub mod materializer;
pub mod sniffer;

// Re-export commonly used types
pub use materializer::{MaterializeError, MediaMaterializer};
pub use sniffer::{detect, ContainerKind};
