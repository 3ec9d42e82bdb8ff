// MCP (Model Context Protocol) server exposing Apollo config lookups as tools

pub mod framing;
pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{McpServer, Termination};
