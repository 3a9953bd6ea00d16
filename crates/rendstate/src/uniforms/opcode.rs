use std::fmt;

use crate::error::EncodeError;

/// Type-code bit marking a uniform as consumed by the fragment stage.
pub const FRAGMENT_BIT: u8 = 0x10;

/// Raw word that terminates a stream.
pub const END_MARKER: u32 = UniformType::End as u32;

/// Largest element count the 10-bit count field can carry.
pub const MAX_COUNT: u16 = 0x3ff;

const TYPE_SHIFT: u32 = 27;
const TYPE_MASK: u32 = 0xf800_0000;
const LOC_SHIFT: u32 = 11;
const LOC_MASK: u32 = 0x07ff_f800;
const NUM_SHIFT: u32 = 1;
const NUM_MASK: u32 = 0x0000_07fe;
const COPY_MASK: u32 = 0x0000_0001;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformType {
    Sampler = 0,
    End = 1,
    Vec4 = 2,
    Mat3 = 3,
    Mat4 = 4,
}

impl UniformType {
    /// Size in bytes of one element as stored in a stream or uniform slot.
    pub const fn element_size(self) -> usize {
        match self {
            UniformType::Sampler => 4,
            UniformType::End => 0,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 36,
            UniformType::Mat4 => 64,
        }
    }

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(UniformType::Sampler),
            1 => Some(UniformType::End),
            2 => Some(UniformType::Vec4),
            3 => Some(UniformType::Mat3),
            4 => Some(UniformType::Mat4),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UniformType::Sampler => "sampler",
            UniformType::End => "end",
            UniformType::Vec4 => "vec4",
            UniformType::Mat3 => "mat3",
            UniformType::Mat4 => "mat4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sampler" | "int1" => Some(UniformType::Sampler),
            "vec4" => Some(UniformType::Vec4),
            "mat3" => Some(UniformType::Mat3),
            "mat4" => Some(UniformType::Mat4),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    #[default]
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const fn bits(self) -> u8 {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => FRAGMENT_BIT,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        if bits & FRAGMENT_BIT != 0 {
            ShaderStage::Fragment
        } else {
            ShaderStage::Vertex
        }
    }
}

/// Uniform type plus the stage it is destined for; five bits on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformTag {
    pub ty: UniformType,
    pub stage: ShaderStage,
}

impl UniformTag {
    pub const fn vertex(ty: UniformType) -> Self {
        Self {
            ty,
            stage: ShaderStage::Vertex,
        }
    }

    pub const fn fragment(ty: UniformType) -> Self {
        Self {
            ty,
            stage: ShaderStage::Fragment,
        }
    }

    pub const fn bits(self) -> u8 {
        self.ty as u8 | self.stage.bits()
    }

    /// Returns `None` for codes outside the closed type set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits > (FRAGMENT_BIT | 0x0f) {
            return None;
        }
        let ty = UniformType::from_raw(bits & !FRAGMENT_BIT)?;
        Some(Self {
            ty,
            stage: ShaderStage::from_bits(bits),
        })
    }
}

/// Index into the uniform-handle space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformHandle(u16);

impl UniformHandle {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Display for UniformHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded uniform update header.
///
/// The type code is kept raw so that decoding never fails; [`Opcode::tag`]
/// rejects codes outside the known set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcode {
    pub type_bits: u8,
    pub location: u16,
    pub count: u16,
    pub copy: bool,
}

impl Opcode {
    pub fn new(
        tag: UniformTag,
        location: u32,
        count: u16,
        copy: bool,
    ) -> Result<Self, EncodeError> {
        let location =
            u16::try_from(location).map_err(|_| EncodeError::LocationOutOfRange(location))?;
        // A zero-count copy at location 0 would encode as the End marker.
        if count == 0 || count > MAX_COUNT {
            return Err(EncodeError::CountOutOfRange(count));
        }
        Ok(Self {
            type_bits: tag.bits(),
            location,
            count,
            copy,
        })
    }

    pub fn encode(self) -> u32 {
        let ty = (u32::from(self.type_bits) << TYPE_SHIFT) & TYPE_MASK;
        let loc = (u32::from(self.location) << LOC_SHIFT) & LOC_MASK;
        let num = (u32::from(self.count) << NUM_SHIFT) & NUM_MASK;
        let copy = u32::from(self.copy) & COPY_MASK;
        ty | loc | num | copy
    }

    pub fn decode(raw: u32) -> Self {
        Self {
            type_bits: ((raw & TYPE_MASK) >> TYPE_SHIFT) as u8,
            location: ((raw & LOC_MASK) >> LOC_SHIFT) as u16,
            count: ((raw & NUM_MASK) >> NUM_SHIFT) as u16,
            copy: raw & COPY_MASK != 0,
        }
    }

    pub fn tag(self) -> Option<UniformTag> {
        UniformTag::from_bits(self.type_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_fields_survive_packing() {
        let tag = UniformTag::fragment(UniformType::Mat4);
        let opcode = Opcode::new(tag, 0xbeef, 1023, true).unwrap();
        let decoded = Opcode::decode(opcode.encode());
        assert_eq!(decoded, opcode);
        assert_eq!(decoded.tag(), Some(tag));
    }

    #[test]
    fn field_layout_matches_wire_format() {
        let opcode = Opcode::new(UniformTag::vertex(UniformType::Vec4), 1, 2, false).unwrap();
        assert_eq!(opcode.encode(), (2 << 27) | (1 << 11) | (2 << 1));
        let copied = Opcode::new(UniformTag::fragment(UniformType::Sampler), 0, 1, true).unwrap();
        assert_eq!(copied.encode(), (0x10 << 27) | (1 << 1) | 1);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let tag = UniformTag::vertex(UniformType::Vec4);
        assert_eq!(
            Opcode::new(tag, 0x1_0000, 1, true),
            Err(EncodeError::LocationOutOfRange(0x1_0000))
        );
        assert_eq!(
            Opcode::new(tag, 0, 1024, true),
            Err(EncodeError::CountOutOfRange(1024))
        );
        assert_eq!(
            Opcode::new(tag, 0, 0, true),
            Err(EncodeError::CountOutOfRange(0))
        );
    }

    #[test]
    fn unknown_type_codes_have_no_tag() {
        assert!(UniformTag::from_bits(5).is_none());
        assert!(UniformTag::from_bits(0x1f).is_none());
        assert!(UniformTag::from_bits(0x20).is_none());
        assert_eq!(
            UniformTag::from_bits(0x13),
            Some(UniformTag::fragment(UniformType::Mat3))
        );
    }

    #[test]
    fn end_marker_is_the_raw_end_type() {
        assert_eq!(END_MARKER, 1);
        assert_eq!(UniformType::End.element_size(), 0);
    }
}
