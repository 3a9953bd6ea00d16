use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_UNIFORMS: u16 = 512;
pub const DEFAULT_MATRIX_REGISTERS: u16 = 4;
pub const DEFAULT_PIPELINE_CAPACITY: u16 = 1024;
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// Largest per-stage constant block the staging sink accepts (64 KiB, the
/// common D3D11/Vulkan uniform buffer binding limit).
pub const MAX_BLOCK_SIZE: u32 = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StateConfig {
    pub version: u32,
    #[serde(default)]
    pub uniforms: UniformLimits,
    #[serde(default)]
    pub views: ViewSettings,
    #[serde(default)]
    pub replay: ReplaySettings,
    #[serde(default)]
    pub caches: CacheSettings,
    #[serde(default)]
    pub constants: ConstantSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct UniformLimits {
    #[serde(default = "default_max_uniforms")]
    pub max_uniforms: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewSettings {
    /// Registers occupied by one 4x4 matrix on the target backend.
    #[serde(default = "default_matrix_registers")]
    pub matrix_registers: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReplaySettings {
    /// Set to `false` for backends that bind samplers outside the constant path.
    #[serde(default = "default_true")]
    pub samplers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default = "default_pipeline_capacity")]
    pub pipeline_capacity: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConstantSettings {
    #[serde(
        default = "default_block_size",
        deserialize_with = "deserialize_byte_size"
    )]
    pub block_size: u32,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            version: 1,
            uniforms: UniformLimits::default(),
            views: ViewSettings::default(),
            replay: ReplaySettings::default(),
            caches: CacheSettings::default(),
            constants: ConstantSettings::default(),
        }
    }
}

impl Default for UniformLimits {
    fn default() -> Self {
        Self {
            max_uniforms: DEFAULT_MAX_UNIFORMS,
        }
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            matrix_registers: DEFAULT_MATRIX_REGISTERS,
        }
    }
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self { samplers: true }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            pipeline_capacity: DEFAULT_PIPELINE_CAPACITY,
        }
    }
}

impl Default for ConstantSettings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

fn default_max_uniforms() -> u16 {
    DEFAULT_MAX_UNIFORMS
}

fn default_matrix_registers() -> u16 {
    DEFAULT_MATRIX_REGISTERS
}

fn default_pipeline_capacity() -> u16 {
    DEFAULT_PIPELINE_CAPACITY
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

fn default_true() -> bool {
    true
}

fn deserialize_byte_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a byte size as a number or a string such as \"4KiB\"")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_byte_size(v).map_err(|err| E::custom(format!("invalid size '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(|_| E::custom("size does not fit in 32 bits"))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("size must be non-negative"));
            }
            self.visit_u64(v as u64)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn parse_byte_size(raw: &str) -> Result<u32, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    let split = normalized
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(normalized.len());
    let (digits, unit) = normalized.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| "expected a leading integer".to_string())?;
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        other => return Err(format!("unknown unit '{other}'")),
    };
    let bytes = value
        .checked_mul(multiplier)
        .ok_or_else(|| "size overflows".to_string())?;
    u32::try_from(bytes).map_err(|_| "size does not fit in 32 bits".to_string())
}

impl StateConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: StateConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.uniforms.max_uniforms == 0 {
            return Err(ConfigError::Invalid(
                "uniforms.max_uniforms must be greater than zero".into(),
            ));
        }

        let registers = self.views.matrix_registers;
        if registers == 0 || registers > 16 {
            return Err(ConfigError::Invalid(format!(
                "views.matrix_registers must be within 1..=16, got {registers}"
            )));
        }

        if self.caches.pipeline_capacity == 0 {
            return Err(ConfigError::Invalid(
                "caches.pipeline_capacity must be greater than zero".into(),
            ));
        }

        let block_size = self.constants.block_size;
        if block_size == 0 || block_size % 16 != 0 {
            return Err(ConfigError::Invalid(format!(
                "constants.block_size must be a non-zero multiple of 16, got {block_size}"
            )));
        }
        if block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "constants.block_size {block_size} exceeds the {MAX_BLOCK_SIZE} byte limit"
            )));
        }

        Ok(())
    }
}
