//! Adapters for the admission gateway.
//!
//! In-memory infrastructure: the prepared-transaction buffers and the
//! conversions of infrastructure errors into client responses.

pub mod buffer;
pub mod error_conversions;

pub use buffer::{
    sweep_task, BufferError, BufferStats, MultiRequestBuffer, RequestBuffer, Sweepable,
};
pub use error_conversions::status_for;
