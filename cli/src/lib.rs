//! Command-line host for the TripShare client core.
//!
//! Supplies the pieces the core leaves to its host: an HTTP transport, a
//! shell that stands in for the browser page, and the `tripshare` command.

pub mod cli;
pub mod shell;
pub mod transport;

pub use shell::TerminalShell;
pub use transport::ReqwestTransport;
