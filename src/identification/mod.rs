//! Identification orchestration.
//!
//! # Data Flow
//! ```text
//! IdentificationService::identify(image, options)
//!     → read both breaker states
//!     → both open: CombinedResult::unavailable (no provider touched)
//!     → otherwise spawn each available provider:
//!           cache hit → result (breaker untouched)
//!           cache miss → breaker.call(client.identify)
//!     → await each task within its own deadline
//!     → merge.rs (keyed by provider, not arrival order)
//! ```
//!
//! # Design Decisions
//! - A request never fails because one provider failed
//! - Late provider results are dropped, not cancelled
//! - The primary slot is chosen by `MergeStrategy`

pub mod merge;
pub mod service;

pub use merge::{CombinedResult, ALL_SOURCES_FAILED, NO_SOURCES_AVAILABLE};
pub use service::{provider_breaker, IdentificationService, ProviderSlot};
