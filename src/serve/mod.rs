//! JSON-lines stdio front end
//!
//! Exposes the orchestrator to a parent process (an agent host, an editor plugin) over stdin/stdout.
//! Logging goes to stderr so stdout carries protocol lines only.

pub mod protocol;
pub mod server;

pub use server::StdioServer;
