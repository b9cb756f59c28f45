//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Exchange (one action per connection)
//!
//! ```text
//! client                                   server
//!   │ [token]                                │
//!   │ [path] ([selector] for GET)            │
//!   │ [content]            (WRITE only)      │
//!   │                         [status+body]  │
//!   │                  [status+text] (GET)   │
//!   ▼                                        ▼
//! ```
//!
//! ### Tokens
//! - `WRITE` - args: path, content
//! - `GET`   - args: path, i64 selector (negative = latest)
//! - `RM`    - args: path
//! - `LS`    - args: path
//! - `EXIT`  - no args
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: BUSY
//! - 0x03: ERROR

mod command;
mod frame;
mod response;

pub use command::{read_request, write_request, Action, Request, VersionSelector};
pub use frame::{
    copy_exact, decode_frame, encode_frame, read_frame, read_frame_header, read_frame_into,
    write_frame, write_frame_from, write_frame_header, CHUNK_SIZE, LEN_PREFIX_SIZE,
    MAX_MESSAGE_SIZE,
};
pub use response::{
    decode_reply, encode_reply, read_reply, read_reply_header, write_reply, write_reply_from,
    Reply, Status, ERROR_PREFIX,
};
