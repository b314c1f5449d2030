//! Model Context Protocol front-end: exposes the review workflow as tools.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
