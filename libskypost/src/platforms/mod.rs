//! Remote platform clients
//!
//! Skypost mirrors content to a single network, Bluesky, through its
//! XRPC API.

pub mod bluesky;

pub use bluesky::{BlueskyClient, CreatedRecord};
