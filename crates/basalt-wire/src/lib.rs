//! # basalt-wire: Binary wire protocol for the Basalt data plane
//!
//! The engine talks to each replica over a reliable, ordered byte stream
//! (TCP or a UNIX-domain socket) carrying fixed-header frames:
//!
//! ```text
//! [magic:u16][seq:u32][type:u32][offset:i64][size:u32][data_len:u32][payload:data_len bytes]
//!    2B         4B       4B         8B         4B          4B            variable
//! ```
//!
//! All integers are little-endian. The header is 26 bytes; there is no
//! framing beyond it. `size` names the logical operation length, `data_len`
//! the payload byte count (zero on reads and payload-free responses).

mod codec;
mod error;
mod message;

pub use codec::{WireReader, WireWriter};
pub use error::WireError;
pub use message::{
    HEADER_SIZE, MAGIC_VERSION, MAX_DATA_LEN, Message, MessageKind, RESPONSE_FLAG,
};
