//! Procedure names with a fixed meaning on every connection.

/// Identity exchange performed before any other traffic.
pub const HANDSHAKE: &str = "__handshake__";
/// Answers with the responder's wall-clock time in milliseconds.
pub const PING: &str = "__ping__";
/// `enable_stream(uri, enable)`: ask the remote to start sending a resource.
pub const ENABLE_STREAM: &str = "enable_stream";
/// `disable_stream(uri)`: ask the remote to stop sending a resource.
pub const DISABLE_STREAM: &str = "disable_stream";

/// Names bound by the connection itself.
pub fn is_reserved(name: &str) -> bool {
    matches!(name, HANDSHAKE | PING)
}
