//! Public extension contracts implemented by the host application.
//!
//! Launching another application is platform specific, so the crate only defines the contract
//! and leaves the transport to the embedding app.

pub mod invoker;

pub use invoker::*;
