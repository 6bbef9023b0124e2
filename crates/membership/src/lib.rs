//! View-change aggregation core for the cohort membership service.
//!
//! Nodes in a cohort cluster continuously exchange reports about the
//! health of the edges they monitor. This crate turns that stream of
//! per-edge observations into batched view-change proposals via the
//! [`WatermarkBuffer`], a two-threshold filter: a destination becomes
//! *interesting* once `L` distinct monitors have reported it and *stable*
//! once `H` have. A proposal is emitted only when every interesting
//! destination has stabilized, so concurrent failures observed by
//! overlapping monitor sets coalesce into a single view change instead of
//! a cascade of singleton reconfigurations.
//!
//! The crate performs no I/O and decides nothing about membership itself;
//! it is driven by the transport layer and its proposals are consumed by
//! an external consensus protocol.

pub mod config;
pub mod watermark;

// Re-export main types for convenience
pub use config::{ConfigError, MembershipConfig, K_MIN};
pub use watermark::{LinkStatus, LinkUpdate, Node, Proposal, WatermarkBuffer};
