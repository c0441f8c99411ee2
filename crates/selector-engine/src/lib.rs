//! Record-time selector ranking.
//!
//! Replay-time resolution lives in `action-executor`'s `resolver` module,
//! which resolves selectors through a single in-page script evaluation
//! rather than a per-candidate CDP round trip; this crate only produces and
//! ranks the selector candidates recorded for an element.

pub mod rank;

pub use rank::{rank_selectors, RawElementInfo};
