//! OBD-II Protocol Implementation
//!
//! This crate turns the ELM327's half-duplex AT-command dialect into typed
//! vehicle data: the adapter initialization sequence, prompt-terminated
//! response framing, and the Mode 01 PID decode table.

mod elm;
mod error;
mod framer;
mod pid;
mod snapshot;

pub use elm::{initialize, AdapterProfile};
pub use error::InitError;
pub use framer::FrameAssembler;
pub use pid::{decode_response, Decoded, Pid};
pub use snapshot::VehicleSnapshot;

/// Request prefix for Mode 01 "current data" queries
pub const MODE_CURRENT_DATA: &str = "01";

/// Prefix carried by every Mode 01 response
pub const RESPONSE_PREFIX: &str = "41";

/// Prompt character the adapter prints when it is ready for the next command
pub const PROMPT: char = '>';

/// Terminator appended to every outgoing command
pub const COMMAND_TERMINATOR: &str = "\r";
