//! Per-frame view state and the predefined-uniform resolver.

use stateconfig::StateConfig;

use crate::draw::DrawMatrices;
use crate::error::ResolveError;
use crate::math::{Matrix4, MatrixOps, StandardMath};
use crate::predefined::{PredefinedKind, PredefinedUniform};
use crate::sink::UniformSink;
use crate::uniforms::{ShaderStage, UniformTag, UniformType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewTransform {
    pub view: Matrix4,
    pub proj: Matrix4,
}

/// What the resolver reads from a recorded frame.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    pub views: Vec<ViewTransform>,
    /// Model matrices referenced by draws through [`DrawMatrices`].
    pub matrix_cache: Vec<Matrix4>,
}

/// Last inverse computed, tagged with the view it belongs to.
#[derive(Clone, Copy, Debug, Default)]
struct InverseMemo {
    view: Option<u16>,
    matrix: Matrix4,
}

impl InverseMemo {
    fn get<M: MatrixOps>(&mut self, math: &M, view: u16, source: &Matrix4) -> &Matrix4 {
        if self.view != Some(view) {
            self.matrix = math.inverse(source);
            self.view = Some(view);
        }
        &self.matrix
    }

    fn clear(&mut self) {
        self.view = None;
    }
}

/// Resolves engine-known uniforms for each draw of a frame.
///
/// Call [`ViewState::reset`] once per frame, update the rect and alpha
/// reference while walking views, then [`ViewState::resolve`] per draw.
#[derive(Debug)]
pub struct ViewState<M: MatrixOps = StandardMath> {
    math: M,
    matrix_registers: u16,
    view: Vec<Matrix4>,
    proj: Vec<Matrix4>,
    view_proj: Vec<Matrix4>,
    rect: Rect,
    alpha_ref: f32,
    inv_view: InverseMemo,
    inv_proj: InverseMemo,
    inv_view_proj: InverseMemo,
}

impl<M: MatrixOps> ViewState<M> {
    pub fn new(math: M, matrix_registers: u16) -> Self {
        Self {
            math,
            matrix_registers,
            view: Vec::new(),
            proj: Vec::new(),
            view_proj: Vec::new(),
            rect: Rect::default(),
            alpha_ref: 0.0,
            inv_view: InverseMemo::default(),
            inv_proj: InverseMemo::default(),
            inv_view_proj: InverseMemo::default(),
        }
    }

    pub fn from_config(math: M, config: &StateConfig) -> Self {
        Self::new(math, config.views.matrix_registers)
    }

    pub fn matrix_registers(&self) -> u16 {
        self.matrix_registers
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn alpha_ref(&self) -> f32 {
        self.alpha_ref
    }

    pub fn view_proj(&self, view: u16) -> Option<&Matrix4> {
        self.view_proj.get(usize::from(view))
    }

    pub fn reset(&mut self, frame: &Frame) {
        self.alpha_ref = 0.0;
        self.inv_view.clear();
        self.inv_proj.clear();
        self.inv_view_proj.clear();

        self.view.clear();
        self.proj.clear();
        self.view_proj.clear();
        for transform in &frame.views {
            self.view.push(transform.view);
            self.proj.push(transform.proj);
            self.view_proj.push(self.math.mul(&transform.view, &transform.proj));
        }
        tracing::debug!(views = frame.views.len(), "view state reset");
    }

    pub fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    pub fn set_alpha_ref(&mut self, value: f32) {
        self.alpha_ref = value;
    }

    /// Writes every predefined uniform of `program` for one draw.
    ///
    /// Stops at the first uniform it cannot resolve; writes already issued
    /// for earlier uniforms stay in the sink.
    pub fn resolve<S: UniformSink + ?Sized>(
        &mut self,
        sink: &mut S,
        view: u16,
        program: &[PredefinedUniform],
        frame: &Frame,
        draw: &DrawMatrices,
    ) -> Result<(), ResolveError> {
        let index = usize::from(view);
        if index >= self.view.len() {
            let err = ResolveError::ViewOutOfRange {
                view,
                available: self.view.len(),
            };
            tracing::error!(%err, "predefined uniform resolution failed");
            return Err(err);
        }

        for uniform in program {
            if let Err(err) = self.resolve_one(&mut *sink, index, uniform, frame, draw) {
                tracing::error!(
                    %err,
                    location = uniform.location,
                    "predefined uniform resolution failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    fn resolve_one<S: UniformSink + ?Sized>(
        &mut self,
        sink: &mut S,
        index: usize,
        uniform: &PredefinedUniform,
        frame: &Frame,
        draw: &DrawMatrices,
    ) -> Result<(), ResolveError> {
        let kind = uniform
            .kind()
            .ok_or(ResolveError::UnhandledPredefined { raw: uniform.raw })?;
        let stage = uniform.stage();
        let location = uniform.location;
        let registers = self.matrix_registers.min(uniform.count);
        // `index` was checked against the view count by the caller.
        let view = index as u16;

        match kind {
            PredefinedKind::ViewRect => {
                let rect = self.rect;
                let value = [
                    f32::from(rect.x),
                    f32::from(rect.y),
                    f32::from(rect.width),
                    f32::from(rect.height),
                ];
                write_vec4(sink, stage, location, &value);
            }
            PredefinedKind::ViewTexel => {
                let rect = self.rect;
                let value = [
                    1.0 / f32::from(rect.width),
                    1.0 / f32::from(rect.height),
                    0.0,
                    0.0,
                ];
                write_vec4(sink, stage, location, &value);
            }
            PredefinedKind::View => {
                sink.set_uniform_mat4(stage, location, self.view[index].as_slice(), registers);
            }
            PredefinedKind::InvView => {
                let inv = self.inv_view.get(&self.math, view, &self.view[index]);
                sink.set_uniform_mat4(stage, location, inv.as_slice(), registers);
            }
            PredefinedKind::Proj => {
                sink.set_uniform_mat4(stage, location, self.proj[index].as_slice(), registers);
            }
            PredefinedKind::InvProj => {
                let inv = self.inv_proj.get(&self.math, view, &self.proj[index]);
                sink.set_uniform_mat4(stage, location, inv.as_slice(), registers);
            }
            PredefinedKind::ViewProj => {
                sink.set_uniform_mat4(stage, location, self.view_proj[index].as_slice(), registers);
            }
            PredefinedKind::InvViewProj => {
                let inv = self
                    .inv_view_proj
                    .get(&self.math, view, &self.view_proj[index]);
                sink.set_uniform_mat4(stage, location, inv.as_slice(), registers);
            }
            PredefinedKind::Model => {
                let models = model_matrices(frame, draw)?;
                let wanted = u32::from(draw.num_matrices) * u32::from(self.matrix_registers);
                let registers = wanted.min(u32::from(uniform.count)) as u16;
                sink.set_uniform_mat4(
                    stage,
                    location,
                    bytemuck::cast_slice(models),
                    registers,
                );
            }
            PredefinedKind::ModelView => {
                let model = first_model(frame, draw)?;
                let model_view = self.math.mul(model, &self.view[index]);
                sink.set_uniform_mat4(stage, location, model_view.as_slice(), registers);
            }
            PredefinedKind::ModelViewProj => {
                let model = first_model(frame, draw)?;
                let model_view_proj = self.math.mul(model, &self.view_proj[index]);
                sink.set_uniform_mat4(stage, location, model_view_proj.as_slice(), registers);
            }
            PredefinedKind::AlphaRef => {
                write_vec4(sink, stage, location, &[self.alpha_ref, 0.0, 0.0, 0.0]);
            }
        }
        Ok(())
    }
}

impl Default for ViewState<StandardMath> {
    fn default() -> Self {
        Self::new(StandardMath, stateconfig::DEFAULT_MATRIX_REGISTERS)
    }
}

fn write_vec4<S: UniformSink + ?Sized>(
    sink: &mut S,
    stage: ShaderStage,
    location: u32,
    value: &[f32; 4],
) {
    let tag = UniformTag {
        ty: UniformType::Vec4,
        stage,
    };
    sink.set_uniform(tag, location, bytemuck::bytes_of(value), 1);
}

fn model_matrices<'a>(
    frame: &'a Frame,
    draw: &DrawMatrices,
) -> Result<&'a [Matrix4], ResolveError> {
    let start = draw.start_matrix as usize;
    let end = start + usize::from(draw.num_matrices);
    frame
        .matrix_cache
        .get(start..end)
        .ok_or(ResolveError::MatrixOutOfRange {
            start,
            end,
            available: frame.matrix_cache.len(),
        })
}

fn first_model<'a>(frame: &'a Frame, draw: &DrawMatrices) -> Result<&'a Matrix4, ResolveError> {
    let start = draw.start_matrix as usize;
    frame
        .matrix_cache
        .get(start)
        .ok_or(ResolveError::MatrixOutOfRange {
            start,
            end: start + 1,
            available: frame.matrix_cache.len(),
        })
}
