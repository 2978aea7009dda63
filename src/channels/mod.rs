//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod router;

pub use channel::*;
pub use cli::CliChannel;
pub use router::{MessageRouter, RETRY_APOLOGY};
