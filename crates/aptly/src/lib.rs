//! Work queue for the aptly repository backend.
//!
//! Graph and lifecycle operations enqueue [`AptlyTask`]s fire-and-forget;
//! a background [`dispatcher`](queue::run_dispatcher) drains the queue and
//! posts each task to the aptly daemon. Delivery is at-least-once and
//! unordered across tasks; callers never block on or observe delivery.

pub mod client;
pub mod queue;
pub mod task;

pub use client::{AptlyClient, AptlyClientError};
pub use queue::{run_dispatcher, AptlyQueue};
pub use task::AptlyTask;
