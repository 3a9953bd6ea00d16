//! JSON shapes read and written by the CLI.

use anyhow::{anyhow, bail, Context, Result};
use rendstate::uniforms::{Payload, Record};
use rendstate::{UniformHandle, UniformStorage, UniformStream, UniformTag, UniformType};
use serde::{Deserialize, Serialize};

use crate::cli::parse_stage;

/// One update in an `encode` input file.
///
/// Inline updates carry `values`; an update naming a `handle` is encoded as a
/// reference into uniform storage instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSpec {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default = "default_stage")]
    pub stage: String,
    pub location: u32,
    pub count: u16,
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default)]
    pub handle: Option<u16>,
}

/// A uniform storage slot created before `replay`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    pub handle: u16,
    #[serde(rename = "type")]
    pub ty: String,
    pub count: u16,
    #[serde(default)]
    pub values: Vec<f64>,
}

fn default_stage() -> String {
    "vertex".to_string()
}

fn uniform_type(name: &str) -> Result<UniformType> {
    UniformType::from_name(name).ok_or_else(|| {
        anyhow!("unknown uniform type '{name}'; expected sampler, vec4, mat3, or mat4")
    })
}

/// Packs JSON numbers the way the stream stores them: `i32` texture units for
/// samplers, `f32` for everything else.
fn pack_values(ty: UniformType, values: &[f64]) -> Result<Vec<u8>> {
    match ty {
        UniformType::Sampler => {
            let mut units = Vec::with_capacity(values.len());
            for &value in values {
                if value.fract() != 0.0
                    || value < f64::from(i32::MIN)
                    || value > f64::from(i32::MAX)
                {
                    bail!("sampler values must be integer texture units, got {value}");
                }
                units.push(value as i32);
            }
            Ok(bytemuck::cast_slice(&units).to_vec())
        }
        _ => {
            let floats: Vec<f32> = values.iter().map(|&value| value as f32).collect();
            Ok(bytemuck::cast_slice(&floats).to_vec())
        }
    }
}

pub fn encode_updates(updates: &[UpdateSpec]) -> Result<UniformStream> {
    let mut stream = UniformStream::new();
    for (index, update) in updates.iter().enumerate() {
        let ty = uniform_type(&update.ty).with_context(|| format!("update {index}"))?;
        let stage = parse_stage(&update.stage)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("update {index}"))?;
        let tag = UniformTag { ty, stage };

        let written = match update.handle {
            Some(handle) => {
                if !update.values.is_empty() {
                    bail!("update {index} names a handle and also carries values");
                }
                stream.write_uniform_handle(
                    tag,
                    update.location,
                    UniformHandle::new(handle),
                    update.count,
                )
            }
            None => {
                let payload = pack_values(ty, &update.values)
                    .with_context(|| format!("update {index}"))?;
                stream.write_uniform(tag, update.location, &payload, update.count)
            }
        };
        written.with_context(|| format!("failed to encode update {index} ({})", update.ty))?;
    }
    stream.finish();
    Ok(stream)
}

pub fn fill_storage(storage: &mut UniformStorage, slots: &[SlotSpec]) -> Result<()> {
    for slot in slots {
        let ty = uniform_type(&slot.ty)?;
        let handle = UniformHandle::new(slot.handle);
        storage
            .create(handle, ty, slot.count)
            .with_context(|| format!("failed to create uniform slot {}", slot.handle))?;
        if !slot.values.is_empty() {
            let payload = pack_values(ty, &slot.values)?;
            storage
                .update(handle, &payload)
                .with_context(|| format!("failed to fill uniform slot {}", slot.handle))?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Values {
    Units(Vec<i32>),
    Floats(Vec<f32>),
}

/// `decode --json` output for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRecord {
    pub offset: usize,
    #[serde(rename = "type")]
    pub ty: String,
    pub stage: String,
    pub location: u16,
    pub count: u16,
    pub copy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Values>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<u16>,
}

impl DecodedRecord {
    pub fn from_record(record: &Record<'_>) -> Self {
        let (values, handle) = match record.payload {
            Payload::Inline(bytes) => {
                let values = match record.tag.ty {
                    UniformType::Sampler => Values::Units(bytemuck::pod_collect_to_vec(bytes)),
                    _ => Values::Floats(bytemuck::pod_collect_to_vec(bytes)),
                };
                (Some(values), None)
            }
            Payload::Handle(handle) => (None, Some(handle.index())),
        };
        Self {
            offset: record.offset,
            ty: record.tag.ty.name().to_string(),
            stage: stage_name(record.tag.stage).to_string(),
            location: record.opcode.location,
            count: record.opcode.count,
            copy: record.opcode.copy,
            values,
            handle,
        }
    }
}

pub fn stage_name(stage: rendstate::ShaderStage) -> &'static str {
    match stage {
        rendstate::ShaderStage::Vertex => "vertex",
        rendstate::ShaderStage::Fragment => "fragment",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> UpdateSpec {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn inline_and_handle_updates_encode() {
        let updates = vec![
            update(r#"{"type": "vec4", "location": 0, "count": 1, "values": [1, 2, 3, 4]}"#),
            update(
                r#"{"type": "mat4", "stage": "fragment", "location": 64, "count": 1, "handle": 7}"#,
            ),
        ];
        let stream = encode_updates(&updates).unwrap();
        assert_eq!(stream.len(), (4 + 16) + (4 + 2) + 4);

        let records: Vec<DecodedRecord> = stream
            .reader()
            .map(|record| DecodedRecord::from_record(&record.unwrap()))
            .collect();
        assert_eq!(records[0].values, Some(Values::Floats(vec![1.0, 2.0, 3.0, 4.0])));
        assert_eq!(records[1].handle, Some(7));
        assert_eq!(records[1].stage, "fragment");
    }

    #[test]
    fn sampler_units_decode_as_integers() {
        let updates = vec![update(
            r#"{"type": "sampler", "location": 4, "count": 2, "values": [3, -1]}"#,
        )];
        let stream = encode_updates(&updates).unwrap();
        let record = stream.reader().next().unwrap().unwrap();
        let decoded = DecodedRecord::from_record(&record);
        assert_eq!(decoded.values, Some(Values::Units(vec![3, -1])));
        assert_eq!(decoded.ty, "sampler");
    }

    #[test]
    fn sampler_values_must_be_integers() {
        let updates = vec![update(
            r#"{"type": "sampler", "location": 0, "count": 1, "values": [1.5]}"#,
        )];
        let err = encode_updates(&updates).unwrap_err();
        assert!(format!("{err:#}").contains("integer texture units"));
    }

    #[test]
    fn payload_length_mismatch_is_reported() {
        let updates = vec![update(
            r#"{"type": "vec4", "location": 0, "count": 2, "values": [1, 2, 3, 4]}"#,
        )];
        let err = encode_updates(&updates).unwrap_err();
        assert!(format!("{err:#}").contains("update 0"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<UpdateSpec, _> =
            serde_json::from_str(r#"{"type": "vec4", "location": 0, "count": 1, "colour": 1}"#);
        assert!(result.is_err());
    }
}
