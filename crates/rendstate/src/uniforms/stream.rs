use crate::error::{DecodeError, EncodeError};

use super::opcode::{Opcode, UniformHandle, UniformTag, UniformType, END_MARKER};

/// Bytes taken by one opcode word.
pub const OPCODE_SIZE: usize = 4;
/// Bytes taken by a handle reference following a non-copy opcode.
pub const HANDLE_SIZE: usize = 2;

/// Recording side of the uniform opcode stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniformStream {
    data: Vec<u8>,
}

impl UniformStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Appends an update whose values travel inline with the opcode.
    pub fn write_uniform(
        &mut self,
        tag: UniformTag,
        location: u32,
        data: &[u8],
        count: u16,
    ) -> Result<(), EncodeError> {
        if tag.ty == UniformType::End {
            return Err(EncodeError::InvalidType);
        }
        let opcode = Opcode::new(tag, location, count, true)?;
        let expected = tag.ty.element_size() * usize::from(count);
        if data.len() != expected {
            return Err(EncodeError::PayloadSize {
                expected,
                actual: data.len(),
            });
        }
        self.data.extend_from_slice(&opcode.encode().to_le_bytes());
        self.data.extend_from_slice(data);
        Ok(())
    }

    pub fn write_floats(
        &mut self,
        tag: UniformTag,
        location: u32,
        values: &[f32],
        count: u16,
    ) -> Result<(), EncodeError> {
        self.write_uniform(tag, location, bytemuck::cast_slice(values), count)
    }

    /// Appends an update that reads its values from uniform storage at replay time.
    pub fn write_uniform_handle(
        &mut self,
        tag: UniformTag,
        location: u32,
        handle: UniformHandle,
        count: u16,
    ) -> Result<(), EncodeError> {
        if tag.ty == UniformType::End {
            return Err(EncodeError::InvalidType);
        }
        let opcode = Opcode::new(tag, location, count, false)?;
        self.data.extend_from_slice(&opcode.encode().to_le_bytes());
        self.data.extend_from_slice(&handle.index().to_le_bytes());
        Ok(())
    }

    pub fn finish(&mut self) {
        self.data.extend_from_slice(&END_MARKER.to_le_bytes());
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn reader(&self) -> StreamReader<'_> {
        StreamReader::new(&self.data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload<'a> {
    Inline(&'a [u8]),
    Handle(UniformHandle),
}

/// One decoded update, borrowing its inline payload from the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub offset: usize,
    pub opcode: Opcode,
    pub tag: UniformTag,
    pub payload: Payload<'a>,
}

impl Record<'_> {
    /// Bytes of uniform data the update covers, wherever they live.
    pub fn data_len(&self) -> usize {
        self.tag.ty.element_size() * usize::from(self.opcode.count)
    }

    /// Bytes the record occupies in the stream.
    pub fn encoded_len(&self) -> usize {
        match self.payload {
            Payload::Inline(bytes) => OPCODE_SIZE + bytes.len(),
            Payload::Handle(_) => OPCODE_SIZE + HANDLE_SIZE,
        }
    }
}

/// Walks a stream between `begin` and `end`, yielding records until End.
///
/// Iteration stops after the first error; the cursor is left at the failing
/// opcode.
#[derive(Clone, Debug)]
pub struct StreamReader<'a> {
    data: &'a [u8],
    begin: usize,
    pos: usize,
    end: usize,
    done: bool,
    reached_end: bool,
}

impl<'a> StreamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_range(data, 0, usize::MAX)
    }

    pub fn with_range(data: &'a [u8], begin: usize, end: usize) -> Self {
        let end = end.min(data.len());
        let begin = begin.min(end);
        Self {
            data,
            begin,
            pos: begin,
            end,
            done: false,
            reached_end: false,
        }
    }

    /// Current cursor as an absolute byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn bytes_consumed(&self) -> usize {
        self.pos - self.begin
    }

    /// Whether iteration stopped on an End opcode rather than the range limit.
    pub fn reached_end(&self) -> bool {
        self.reached_end
    }

    fn take(&mut self, offset: usize, needed: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.end - self.pos;
        if available < needed {
            return Err(DecodeError::Truncated {
                offset,
                needed,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn read_record(&mut self) -> Result<Option<Record<'a>>, DecodeError> {
        let offset = self.pos;
        let mut word = [0u8; OPCODE_SIZE];
        word.copy_from_slice(self.take(offset, OPCODE_SIZE)?);
        let raw = u32::from_le_bytes(word);

        let opcode = Opcode::decode(raw);
        let tag = match opcode.tag() {
            Some(tag) => tag,
            None => {
                self.pos = offset;
                return Err(DecodeError::UnknownOpcode { offset, opcode: raw });
            }
        };
        if raw == END_MARKER || tag.ty == UniformType::End {
            self.reached_end = true;
            return Ok(None);
        }

        let payload = if opcode.copy {
            let len = tag.ty.element_size() * usize::from(opcode.count);
            match self.take(offset, len) {
                Ok(bytes) => Payload::Inline(bytes),
                Err(err) => {
                    self.pos = offset;
                    return Err(err);
                }
            }
        } else {
            let mut index = [0u8; HANDLE_SIZE];
            match self.take(offset, HANDLE_SIZE) {
                Ok(bytes) => index.copy_from_slice(bytes),
                Err(err) => {
                    self.pos = offset;
                    return Err(err);
                }
            }
            Payload::Handle(UniformHandle::new(u16::from_le_bytes(index)))
        };

        Ok(Some(Record {
            offset,
            opcode,
            tag,
            payload,
        }))
    }
}

impl<'a> Iterator for StreamReader<'a> {
    type Item = Result<Record<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.end {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
