//! Error types shared by the codec, uniform storage, and resolver.

use crate::uniforms::UniformHandle;

/// A replay pass could not decode its own stream; nothing after `offset` can
/// be trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown uniform opcode 0x{opcode:08x} at byte {offset}")]
    UnknownOpcode { offset: usize, opcode: u32 },
    #[error("stream truncated at byte {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("opcode at byte {offset} references unallocated uniform handle {handle}")]
    InvalidHandle { offset: usize, handle: UniformHandle },
    #[error(
        "opcode at byte {offset} reads {needed} bytes from uniform handle {handle} which holds {available}"
    )]
    SlotTooSmall {
        offset: usize,
        handle: UniformHandle,
        needed: usize,
        available: usize,
    },
}

impl DecodeError {
    /// Byte offset of the opcode that failed to decode.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::UnknownOpcode { offset, .. }
            | DecodeError::Truncated { offset, .. }
            | DecodeError::InvalidHandle { offset, .. }
            | DecodeError::SlotTooSmall { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("uniform location {0} does not fit in 16 bits")]
    LocationOutOfRange(u32),
    #[error("uniform count {0} is outside the 10-bit opcode field range 1..=1023")]
    CountOutOfRange(u16),
    #[error("payload of {actual} bytes does not match {expected} bytes declared by the opcode")]
    PayloadSize { expected: usize, actual: usize },
    #[error("uniform type End cannot carry a payload")]
    InvalidType,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("uniform handle {handle} exceeds the configured limit of {limit}")]
    HandleOutOfRange { handle: u16, limit: u16 },
    #[error("uniform handle {0} has not been created")]
    NotCreated(u16),
    #[error("update of {actual} bytes exceeds the {capacity} byte slot of uniform handle {handle}")]
    Oversize {
        handle: u16,
        capacity: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("predefined uniform type 0x{raw:02x} is not handled by this resolver")]
    UnhandledPredefined { raw: u8 },
    #[error("view {view} is outside the {available} views of the frame")]
    ViewOutOfRange { view: u16, available: usize },
    #[error("draw matrices {start}..{end} exceed the frame matrix cache of {available}")]
    MatrixOutOfRange {
        start: usize,
        end: usize,
        available: usize,
    },
}
