use stateconfig::StateConfig;

use crate::error::{DecodeError, StorageError};
use crate::sink::{UniformSink, REGISTER_SIZE};

use super::opcode::{UniformHandle, UniformTag, UniformType};
use super::stream::{Payload, Record, StreamReader};

const SLOT_ALIGN: usize = 16;

/// Controls one replay pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Write sampler uniforms; backends that bind samplers separately turn this off.
    pub samplers: bool,
    pub begin: usize,
    pub end: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            samplers: true,
            begin: 0,
            end: usize::MAX,
        }
    }
}

impl ReplayOptions {
    pub fn from_config(config: &StateConfig) -> Self {
        Self {
            samplers: config.replay.samplers,
            ..Self::default()
        }
    }

    pub fn with_range(self, begin: usize, end: usize) -> Self {
        Self { begin, end, ..self }
    }

    pub fn without_samplers(self) -> Self {
        Self {
            samplers: false,
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Update records applied, End excluded.
    pub records: usize,
    /// Stream bytes read from `begin`, including a consumed End marker.
    pub bytes_consumed: usize,
    pub reached_end: bool,
}

/// Backing store for uniforms referenced by handle from opcode streams.
#[derive(Clone, Debug)]
pub struct UniformStorage {
    slots: Vec<Option<Box<[u8]>>>,
}

impl UniformStorage {
    pub fn new(max_uniforms: u16) -> Self {
        Self {
            slots: vec![None; usize::from(max_uniforms)],
        }
    }

    pub fn from_config(config: &StateConfig) -> Self {
        Self::new(config.uniforms.max_uniforms)
    }

    pub fn limit(&self) -> u16 {
        self.slots.len() as u16
    }

    fn slot_index(&self, handle: UniformHandle) -> Result<usize, StorageError> {
        let index = usize::from(handle.index());
        if index >= self.slots.len() {
            return Err(StorageError::HandleOutOfRange {
                handle: handle.index(),
                limit: self.limit(),
            });
        }
        Ok(index)
    }

    /// Allocates a zeroed slot for `count` elements, replacing any previous slot.
    pub fn create(
        &mut self,
        handle: UniformHandle,
        ty: UniformType,
        count: u16,
    ) -> Result<(), StorageError> {
        let index = self.slot_index(handle)?;
        let size = (ty.element_size() * usize::from(count)).next_multiple_of(SLOT_ALIGN);
        if self.slots[index].is_some() {
            tracing::debug!(handle = handle.index(), "recreating uniform slot");
        }
        self.slots[index] = Some(vec![0; size].into_boxed_slice());
        Ok(())
    }

    pub fn destroy(&mut self, handle: UniformHandle) -> Result<(), StorageError> {
        let index = self.slot_index(handle)?;
        self.slots[index] = None;
        Ok(())
    }

    pub fn get(&self, handle: UniformHandle) -> Option<&[u8]> {
        self.slots
            .get(usize::from(handle.index()))
            .and_then(|slot| slot.as_deref())
    }

    pub fn is_created(&self, handle: UniformHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Overwrites the start of a slot in place.
    pub fn update(&mut self, handle: UniformHandle, data: &[u8]) -> Result<(), StorageError> {
        let index = self.slot_index(handle)?;
        let slot = self.slots[index]
            .as_deref_mut()
            .ok_or(StorageError::NotCreated(handle.index()))?;
        if data.len() > slot.len() {
            return Err(StorageError::Oversize {
                handle: handle.index(),
                capacity: slot.len(),
                actual: data.len(),
            });
        }
        slot[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Replays `stream` into `dest`.
    ///
    /// The pass aborts on the first decode error; writes already issued for
    /// earlier records stay in `dest`.
    pub fn commit<S: UniformSink + ?Sized>(
        &self,
        dest: &mut S,
        stream: &[u8],
        options: ReplayOptions,
    ) -> Result<ReplayStats, DecodeError> {
        let mut reader = StreamReader::with_range(stream, options.begin, options.end);
        let mut records = 0;

        for record in reader.by_ref() {
            let applied = record.and_then(|record| {
                let data = self.payload_data(&record)?;
                tracing::trace!(
                    offset = record.offset,
                    ty = record.tag.ty.name(),
                    location = record.opcode.location,
                    count = record.opcode.count,
                    copy = record.opcode.copy,
                    "replaying uniform"
                );
                apply(
                    &mut *dest,
                    record.tag,
                    u32::from(record.opcode.location),
                    record.opcode.count,
                    data,
                    options.samplers,
                );
                Ok(())
            });
            if let Err(err) = applied {
                tracing::error!(%err, offset = err.offset(), "uniform replay aborted");
                return Err(err);
            }
            records += 1;
        }

        Ok(ReplayStats {
            records,
            bytes_consumed: reader.bytes_consumed(),
            reached_end: reader.reached_end(),
        })
    }

    fn payload_data<'a>(&'a self, record: &Record<'a>) -> Result<&'a [u8], DecodeError> {
        let handle = match record.payload {
            Payload::Inline(bytes) => return Ok(bytes),
            Payload::Handle(handle) => handle,
        };
        let slot = self.get(handle).ok_or(DecodeError::InvalidHandle {
            offset: record.offset,
            handle,
        })?;
        let needed = record.data_len();
        if slot.len() < needed {
            return Err(DecodeError::SlotTooSmall {
                offset: record.offset,
                handle,
                needed,
                available: slot.len(),
            });
        }
        Ok(&slot[..needed])
    }
}

fn apply<S: UniformSink + ?Sized>(
    dest: &mut S,
    tag: UniformTag,
    location: u32,
    count: u16,
    data: &[u8],
    samplers: bool,
) {
    match tag.ty {
        UniformType::Mat3 => {
            let matrices = usize::from(count / 3);
            let mut location = location;
            for packed in data.chunks_exact(UniformType::Mat3.element_size()).take(matrices) {
                let v: [f32; 9] = bytemuck::pod_read_unaligned(packed);
                let rows: [f32; 12] = [
                    v[0], v[1], v[2], 0.0, //
                    v[3], v[4], v[5], 0.0, //
                    v[6], v[7], v[8], 0.0,
                ];
                dest.set_uniform(tag, location, bytemuck::cast_slice(&rows), 3);
                location += (3 * REGISTER_SIZE) as u32;
            }
        }
        UniformType::Sampler => {
            if samplers {
                dest.set_uniform(tag, location, data, count);
            }
        }
        UniformType::Vec4 | UniformType::Mat4 => {
            dest.set_uniform(tag, location, data, count);
        }
        UniformType::End => {}
    }
}
