//! Render-state resolution for a cross-platform GPU layer.
//!
//! The crate turns a frame's recorded, backend-agnostic uniform commands into
//! the writes a concrete backend needs, and keeps backend objects alive across
//! frames so identical state is not created twice. The per-frame flow is:
//!
//! ```text
//!   recorded frame
//!        │
//!        ├─▶ ViewState::reset ──▶ per-view view / view-proj matrices
//!        │
//!        └─▶ for each draw
//!               ├─▶ ViewState::resolve ────────┐  predefined uniforms
//!               ├─▶ UniformStorage::commit ────┤  explicit uniforms (opcode replay)
//!               │                              ▼
//!               │                        UniformSink (backend constants)
//!               └─▶ StateCacheLru / StateCache  ──▶ reuse or create backend objects
//! ```
//!
//! Everything here runs on the single submission thread and holds no locks.
//! The backend owns the [`sink::UniformSink`] implementation; the crate ships a
//! CPU staging implementation, [`sink::ConstantBlock`], for backends that
//! upload whole constant buffers per draw.

pub mod cache;
pub mod draw;
pub mod error;
pub mod math;
pub mod predefined;
pub mod sink;
pub mod uniforms;
pub mod view_state;

pub use cache::{LruHandle, Release, StateCache, StateCacheLru};
pub use draw::{has_vertex_stream_changed, DrawMatrices, VertexStreams};
pub use error::{DecodeError, EncodeError, ResolveError, StorageError};
pub use math::{Matrix4, MatrixOps, StandardMath};
pub use predefined::{PredefinedKind, PredefinedUniform, ProgramUniforms};
pub use sink::{ConstantBlock, UniformSink};
pub use uniforms::{
    Opcode, ReplayOptions, ReplayStats, ShaderStage, StreamReader, UniformHandle, UniformStorage,
    UniformStream, UniformTag, UniformType,
};
pub use view_state::{Frame, Rect, ViewState, ViewTransform};

pub use stateconfig::StateConfig;
