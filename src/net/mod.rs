// net/mod.rs
//! Networking layer: protocol-agnostic plumbing between sockets.

pub mod pipe;

pub use pipe::{PipeOutcome, relay};
