//! Producer components feeding the correlator.
//!
//! Two independent producers run over the session lifetime:
//!
//! 1. **Scanner**: DOM snapshot → ordered card observations, once per
//!    scroll pass
//! 2. **Interceptor**: network responses → staged video captures, as
//!    bodies finish downloading
//!
//! # Architecture
//!
//! ```text
//! browser adapter ──(DOM snapshot)──▶ Scanner ─────┐
//!                                                  ▼
//!                                             Correlator
//!                                                  ▲
//! browser adapter ──(responses)──▶ Interceptor ────┘
//! ```

pub mod interceptor;
pub mod scanner;

// Re-export key types
pub use interceptor::{looks_like_video, CaptureOutcome, InterceptorError, NetworkInterceptor};
pub use scanner::{default_detectors, CardScanner, ThumbnailDetector};
