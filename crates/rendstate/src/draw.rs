//! Per-draw inputs shared by the resolver and backend submission.

/// Vertex streams a draw can bind at once.
pub const MAX_VERTEX_STREAMS: usize = 4;

/// Invalid buffer handle.
pub const INVALID_HANDLE: u16 = u16::MAX;

/// Range of model matrices a draw uses from the frame matrix cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawMatrices {
    pub start_matrix: u32,
    pub num_matrices: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexStream {
    pub handle: u16,
    pub start_vertex: u32,
}

impl Default for VertexStream {
    fn default() -> Self {
        Self {
            handle: INVALID_HANDLE,
            start_vertex: 0,
        }
    }
}

/// Vertex input bindings of a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexStreams {
    /// Bit `n` set when `streams[n]` is bound.
    pub stream_mask: u8,
    pub streams: [VertexStream; MAX_VERTEX_STREAMS],
    pub instance_data_buffer: u16,
    pub instance_data_offset: u32,
    pub instance_data_stride: u16,
}

impl Default for VertexStreams {
    fn default() -> Self {
        Self {
            stream_mask: 0,
            streams: [VertexStream::default(); MAX_VERTEX_STREAMS],
            instance_data_buffer: INVALID_HANDLE,
            instance_data_offset: 0,
            instance_data_stride: 0,
        }
    }
}

impl VertexStreams {
    /// Binds `stream` at `index`, returning false past the last slot.
    pub fn bind(&mut self, index: usize, handle: u16, start_vertex: u32) -> bool {
        let Some(slot) = self.streams.get_mut(index) else {
            return false;
        };
        *slot = VertexStream {
            handle,
            start_vertex,
        };
        self.stream_mask |= 1 << index;
        true
    }

    pub fn is_bound(&self, index: usize) -> bool {
        index < MAX_VERTEX_STREAMS && self.stream_mask & (1 << index) != 0
    }

    pub fn bound(&self) -> impl Iterator<Item = (usize, &VertexStream)> {
        self.streams
            .iter()
            .enumerate()
            .filter(|(index, _)| self.is_bound(*index))
    }
}

/// Whether switching from `current` to `new` requires rebinding vertex input.
///
/// Streams disabled in the mask are ignored, so stale handles in unused
/// slots never force a rebind.
pub fn has_vertex_stream_changed(current: &VertexStreams, new: &VertexStreams) -> bool {
    if current.stream_mask != new.stream_mask
        || current.instance_data_buffer != new.instance_data_buffer
        || current.instance_data_offset != new.instance_data_offset
        || current.instance_data_stride != new.instance_data_stride
    {
        return true;
    }

    new.bound()
        .any(|(index, stream)| current.streams[index] != *stream)
}
