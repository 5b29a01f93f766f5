//! Domain events module.
//!
//! Provides the lifecycle event types for categories and associations, and
//! the sink trait the services emit them through.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;
