// Core types and functionality for the Apollo config lookup tool

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use cache::{Clock, ConfigCache, ManualClock, SystemClock, DEFAULT_CACHE_TTL};
pub use client::ApolloClient;
pub use config::ApolloSettings;
pub use error::{ToolError, ToolResult};
pub use types::*;
