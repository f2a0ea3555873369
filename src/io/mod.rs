//! I/O module
//!
//! Handles the wire protocol and the transports it travels over.
//!
//! # Components
//!
//! - `message` - The `AppMessage` envelope, internal metadata and error payloads
//! - `channel` - Duplex message channel abstraction and in-memory pairs
//! - `stdio` - Line-framed connection over stdin/stdout or a file

pub mod channel;
pub mod message;
pub mod stdio;

pub use channel::{duplex, ChannelEvent, ChannelSender, ClientEnd, Connection, MessageChannel};
pub use message::{
    compare_api_versions, error_codes, AppMessage, ErrorPayload, InternalData, MessageType,
    VersionCheck, API_VERSION,
};
pub use stdio::{framed_connection, stdio_connection, FramedTasks};
