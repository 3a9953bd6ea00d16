//! Destination side of uniform replay and predefined resolution.

use stateconfig::StateConfig;

use crate::uniforms::{ShaderStage, UniformTag};

/// Bytes in one shader constant register.
pub const REGISTER_SIZE: usize = 16;

/// The two write primitives a backend exposes to the resolver and replay.
///
/// `location` is a byte offset into the stage's constant space. `data` may be
/// unaligned when it points into an opcode stream.
pub trait UniformSink {
    fn set_uniform(&mut self, tag: UniformTag, location: u32, data: &[u8], count: u16);

    fn set_uniform_mat4(&mut self, stage: ShaderStage, location: u32, data: &[f32], registers: u16);
}

impl<S: UniformSink + ?Sized> UniformSink for &mut S {
    fn set_uniform(&mut self, tag: UniformTag, location: u32, data: &[u8], count: u16) {
        (**self).set_uniform(tag, location, data, count);
    }

    fn set_uniform_mat4(
        &mut self,
        stage: ShaderStage,
        location: u32,
        data: &[f32],
        registers: u16,
    ) {
        (**self).set_uniform_mat4(stage, location, data, registers);
    }
}

/// CPU staging copy of one constant buffer per stage.
///
/// Registers are 16 bytes wide, so a 4x4 matrix takes four registers. Writes
/// that run past the block are clipped.
#[derive(Clone, Debug)]
pub struct ConstantBlock {
    vertex: Vec<u8>,
    fragment: Vec<u8>,
    high_water: [usize; 2],
}

impl ConstantBlock {
    pub fn new(block_size: usize) -> Self {
        Self {
            vertex: vec![0; block_size],
            fragment: vec![0; block_size],
            high_water: [0; 2],
        }
    }

    pub fn from_config(config: &StateConfig) -> Self {
        Self::new(config.constants.block_size as usize)
    }

    pub fn block_size(&self) -> usize {
        self.vertex.len()
    }

    pub fn stage(&self, stage: ShaderStage) -> &[u8] {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    /// Bytes written so far in `stage`, rounded up to whole registers.
    pub fn used(&self, stage: ShaderStage) -> &[u8] {
        let block = self.stage(stage);
        let used = self.high_water[stage_index(stage)]
            .div_ceil(REGISTER_SIZE)
            .saturating_mul(REGISTER_SIZE)
            .min(block.len());
        &block[..used]
    }

    pub fn register(&self, stage: ShaderStage, index: usize) -> Option<[f32; 4]> {
        let start = index.checked_mul(REGISTER_SIZE)?;
        let bytes = self.stage(stage).get(start..start + REGISTER_SIZE)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn clear(&mut self) {
        self.vertex.fill(0);
        self.fragment.fill(0);
        self.high_water = [0; 2];
    }

    fn write(&mut self, stage: ShaderStage, location: u32, bytes: &[u8]) {
        let block = match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        };
        let start = location as usize;
        if start >= block.len() {
            tracing::warn!(
                ?stage,
                location,
                len = bytes.len(),
                block = block.len(),
                "uniform write starts past the constant block; dropped"
            );
            return;
        }
        let end = start.saturating_add(bytes.len());
        let clipped_end = end.min(block.len());
        if clipped_end < end {
            tracing::warn!(
                ?stage,
                location,
                len = bytes.len(),
                block = block.len(),
                "uniform write clipped at the end of the constant block"
            );
        }
        block[start..clipped_end].copy_from_slice(&bytes[..clipped_end - start]);
        let mark = &mut self.high_water[stage_index(stage)];
        *mark = (*mark).max(clipped_end);
    }

    /// Copies the used part of a stage block into `buffer` at offset zero.
    #[cfg(feature = "wgpu")]
    pub fn upload(&self, queue: &wgpu::Queue, stage: ShaderStage, buffer: &wgpu::Buffer) {
        let used = self.used(stage);
        if used.is_empty() {
            return;
        }
        tracing::trace!(?stage, bytes = used.len(), "uploading constant block");
        queue.write_buffer(buffer, 0, used);
    }
}

fn stage_index(stage: ShaderStage) -> usize {
    match stage {
        ShaderStage::Vertex => 0,
        ShaderStage::Fragment => 1,
    }
}

impl UniformSink for ConstantBlock {
    fn set_uniform(&mut self, tag: UniformTag, location: u32, data: &[u8], _count: u16) {
        self.write(tag.stage, location, data);
    }

    fn set_uniform_mat4(
        &mut self,
        stage: ShaderStage,
        location: u32,
        data: &[f32],
        registers: u16,
    ) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let len = (usize::from(registers) * REGISTER_SIZE).min(bytes.len());
        self.write(stage, location, &bytes[..len]);
    }
}
