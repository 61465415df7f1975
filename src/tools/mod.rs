//! Outbound tools
//!
//! Helpers the call initiator uses to find who to call.

pub mod search;

pub use search::{SearchClient, SearchError};
