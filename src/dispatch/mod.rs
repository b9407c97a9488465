// src/dispatch/mod.rs

//! Handler registry and event publishing.
//!
//! - [`handler`] defines the `Handler` trait and its error type.
//! - [`registry`] keeps handlers in registration order with their retry
//!   policies.
//! - [`retry`] holds `RetryPolicy` and the `ProblemList`.
//! - [`publisher`] runs handlers behind a failure boundary.
//! - [`dispatcher_loop`] fans records out to one lane per handler;
//!   [`backend`] connects the runtime to it.

pub mod backend;
pub mod dispatcher_loop;
pub mod handler;
pub mod publisher;
pub mod registry;
pub mod retry;

pub use backend::{DispatchBackend, RealDispatchBackend};
pub use dispatcher_loop::spawn_dispatcher;
pub use handler::{Handler, HandlerError, HandlerFuture};
pub use publisher::{Delivery, EventPublisher, PublishSummary};
pub use registry::{HandlerRegistration, HandlerRegistry};
pub use retry::{ProblemKey, ProblemList, RetryPolicy};
