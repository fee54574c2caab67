//! MCP tool implementations.
//!
//! This module contains all tools exposed by the pantry-sw server. Each tool
//! maps onto one hosting-runtime action: page fetches, client messages,
//! version updates and inspection.

pub mod sw_fetch;
pub mod sw_message;
pub mod sw_status;
pub mod sw_update;

pub use sw_fetch::{SwFetchOutput, SwFetchParams, fetch_impl};
pub use sw_message::{SwMessageParams, message_impl};
pub use sw_status::{SwStatusOutput, SwStatusParams, status_impl};
pub use sw_update::{SwUpdateParams, update_impl};
