//! Uniform opcode streams and the per-handle storage they replay from.
//!
//! - `opcode` packs a uniform update header into one `u32`.
//! - `stream` records updates into a byte buffer and walks them back as
//!   records without copying payloads.
//! - `storage` owns the uniform slots referenced by handle and replays a
//!   stream into a [`crate::sink::UniformSink`].

mod opcode;
mod storage;
mod stream;

pub use opcode::{
    Opcode, ShaderStage, UniformHandle, UniformTag, UniformType, END_MARKER, FRAGMENT_BIT,
    MAX_COUNT,
};
pub use storage::{ReplayOptions, ReplayStats, UniformStorage};
pub use stream::{Payload, Record, StreamReader, UniformStream, HANDLE_SIZE, OPCODE_SIZE};
