//! Dispatcher Module
//!
//! The resilient cached call façade and its per-call options.

#[allow(clippy::module_inception)]
mod dispatcher;
mod options;

pub use dispatcher::CallDispatcher;
pub use options::CallOptions;
