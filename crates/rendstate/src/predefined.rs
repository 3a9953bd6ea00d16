//! Engine-computed uniforms a program may declare by name.

use crate::uniforms::{ShaderStage, UniformType, FRAGMENT_BIT};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PredefinedKind {
    ViewRect = 0,
    ViewTexel = 1,
    View = 2,
    InvView = 3,
    Proj = 4,
    InvProj = 5,
    ViewProj = 6,
    InvViewProj = 7,
    Model = 8,
    ModelView = 9,
    ModelViewProj = 10,
    AlphaRef = 11,
}

impl PredefinedKind {
    pub const ALL: [PredefinedKind; 12] = [
        PredefinedKind::ViewRect,
        PredefinedKind::ViewTexel,
        PredefinedKind::View,
        PredefinedKind::InvView,
        PredefinedKind::Proj,
        PredefinedKind::InvProj,
        PredefinedKind::ViewProj,
        PredefinedKind::InvViewProj,
        PredefinedKind::Model,
        PredefinedKind::ModelView,
        PredefinedKind::ModelViewProj,
        PredefinedKind::AlphaRef,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Uniform name a shader uses to request this value.
    pub fn name(self) -> &'static str {
        match self {
            PredefinedKind::ViewRect => "u_viewRect",
            PredefinedKind::ViewTexel => "u_viewTexel",
            PredefinedKind::View => "u_view",
            PredefinedKind::InvView => "u_invView",
            PredefinedKind::Proj => "u_proj",
            PredefinedKind::InvProj => "u_invProj",
            PredefinedKind::ViewProj => "u_viewProj",
            PredefinedKind::InvViewProj => "u_invViewProj",
            PredefinedKind::Model => "u_model",
            PredefinedKind::ModelView => "u_modelView",
            PredefinedKind::ModelViewProj => "u_modelViewProj",
            PredefinedKind::AlphaRef => "u_alphaRef4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn uniform_type(self) -> UniformType {
        match self {
            PredefinedKind::ViewRect | PredefinedKind::ViewTexel | PredefinedKind::AlphaRef => {
                UniformType::Vec4
            }
            _ => UniformType::Mat4,
        }
    }
}

/// A predefined uniform as declared by a program.
///
/// `raw` keeps the type byte as read from the shader: the kind in the low
/// bits and [`FRAGMENT_BIT`] for fragment-stage uniforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredefinedUniform {
    pub raw: u8,
    pub location: u32,
    pub count: u16,
}

impl PredefinedUniform {
    pub fn new(kind: PredefinedKind, stage: ShaderStage, location: u32, count: u16) -> Self {
        Self {
            raw: kind as u8 | stage.bits(),
            location,
            count,
        }
    }

    pub fn kind(&self) -> Option<PredefinedKind> {
        PredefinedKind::from_raw(self.raw & !FRAGMENT_BIT)
    }

    pub fn stage(&self) -> ShaderStage {
        ShaderStage::from_bits(self.raw)
    }
}

/// A uniform the application sets itself through the opcode stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplicitUniform {
    pub name: String,
    pub stage: ShaderStage,
    pub location: u32,
    pub count: u16,
}

/// Uniform table of a linked program, split by who supplies the values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramUniforms {
    predefined: Vec<PredefinedUniform>,
    explicit: Vec<ExplicitUniform>,
}

impl ProgramUniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a uniform, routing engine-known names into the predefined set.
    pub fn add(&mut self, name: &str, stage: ShaderStage, location: u32, count: u16) {
        match PredefinedKind::from_name(name) {
            Some(kind) => {
                self.predefined.push(PredefinedUniform::new(kind, stage, location, count));
            }
            None => self.explicit.push(ExplicitUniform {
                name: name.to_string(),
                stage,
                location,
                count,
            }),
        }
    }

    pub fn push_predefined(&mut self, uniform: PredefinedUniform) {
        self.predefined.push(uniform);
    }

    pub fn predefined(&self) -> &[PredefinedUniform] {
        &self.predefined
    }

    pub fn explicit(&self) -> &[ExplicitUniform] {
        &self.explicit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_for_every_kind() {
        for kind in PredefinedKind::ALL {
            assert_eq!(PredefinedKind::from_name(kind.name()), Some(kind));
            assert_eq!(PredefinedKind::from_raw(kind as u8), Some(kind));
        }
        assert_eq!(PredefinedKind::from_name("u_time"), None);
        assert_eq!(PredefinedKind::from_raw(12), None);
    }

    #[test]
    fn descriptor_keeps_stage_in_type_byte() {
        let uniform =
            PredefinedUniform::new(PredefinedKind::InvProj, ShaderStage::Fragment, 64, 4);
        assert_eq!(uniform.raw, 5 | FRAGMENT_BIT);
        assert_eq!(uniform.kind(), Some(PredefinedKind::InvProj));
        assert_eq!(uniform.stage(), ShaderStage::Fragment);
    }

    #[test]
    fn program_splits_predefined_from_explicit() {
        let mut program = ProgramUniforms::new();
        program.add("u_modelViewProj", ShaderStage::Vertex, 0, 4);
        program.add("u_tint", ShaderStage::Fragment, 0, 1);
        program.add("u_viewRect", ShaderStage::Fragment, 16, 1);

        assert_eq!(program.predefined().len(), 2);
        assert_eq!(
            program.predefined()[0].kind(),
            Some(PredefinedKind::ModelViewProj)
        );
        assert_eq!(program.explicit().len(), 1);
        assert_eq!(program.explicit()[0].name, "u_tint");
    }
}
