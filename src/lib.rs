//! MCP server for a read-only student roster.
//!
//! Exposes `get_student_list` and `get_student_info` tools over the MCP
//! Streamable HTTP transport (JSON response mode), plus a `/health` liveness
//! route. The roster is built once at startup and never mutated.

pub mod config;
pub mod handlers;
pub mod protocol;
pub mod query;
pub mod roster;
pub mod server;

pub mod schema;
