use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rendstate::{ConstantBlock, ReplayOptions, ShaderStage, StreamReader, UniformStorage};
use stateconfig::StateConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, DecodeArgs, EncodeArgs, ReplayArgs};
use crate::input::{self, DecodedRecord, SlotSpec, UpdateSpec};

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    match args.command {
        Command::Encode(args) => encode(&args),
        Command::Decode(args) => decode(&args),
        Command::Replay(args) => replay(&args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_stream(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read stream {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<StateConfig> {
    let Some(path) = path else {
        return Ok(StateConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = StateConfig::from_toml_str(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "loaded state config");
    Ok(config)
}

fn encode(args: &EncodeArgs) -> Result<()> {
    let updates: Vec<UpdateSpec> = read_json(&args.input)?;
    let stream = input::encode_updates(&updates)
        .with_context(|| format!("failed to encode {}", args.input.display()))?;
    fs::write(&args.output, stream.as_bytes())
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(
        updates = updates.len(),
        bytes = stream.len(),
        output = %args.output.display(),
        "encoded uniform stream"
    );
    Ok(())
}

fn decode(args: &DecodeArgs) -> Result<()> {
    let data = read_stream(&args.stream)?;
    let mut reader = StreamReader::new(&data);
    let mut records = Vec::new();
    for record in reader.by_ref() {
        let record = record.with_context(|| format!("failed to decode {}", args.stream.display()))?;
        records.push(DecodedRecord::from_record(&record));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!("{}", format_record(record));
        }
        println!(
            "{} records, {} bytes{}",
            records.len(),
            reader.bytes_consumed(),
            if reader.reached_end() { "" } else { " (no end marker)" }
        );
    }
    Ok(())
}

fn format_record(record: &DecodedRecord) -> String {
    let payload = match (&record.values, record.handle) {
        (Some(input::Values::Units(units)), _) => format!("{units:?}"),
        (Some(input::Values::Floats(floats)), _) => format!("{floats:?}"),
        (None, Some(handle)) => format!("handle {handle}"),
        (None, None) => String::new(),
    };
    format!(
        "{:#06x} {:<7} {:<8} loc={:<5} count={:<4} {}",
        record.offset, record.ty, record.stage, record.location, record.count, payload
    )
}

fn replay(args: &ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let data = read_stream(&args.stream)?;

    let mut storage = UniformStorage::from_config(&config);
    if let Some(path) = args.slots.as_deref() {
        let slots: Vec<SlotSpec> = read_json(path)?;
        input::fill_storage(&mut storage, &slots)
            .with_context(|| format!("failed to load slots from {}", path.display()))?;
    }

    let mut options = ReplayOptions::from_config(&config)
        .with_range(args.begin, args.end.unwrap_or(usize::MAX));
    if args.no_samplers {
        options = options.without_samplers();
    }

    let mut block = ConstantBlock::from_config(&config);
    let stats = storage
        .commit(&mut block, &data, options)
        .with_context(|| format!("failed to replay {}", args.stream.display()))?;
    tracing::info!(
        records = stats.records,
        bytes = stats.bytes_consumed,
        reached_end = stats.reached_end,
        "replayed uniform stream"
    );

    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        print_registers(&block, stage);
    }
    Ok(())
}

fn print_registers(block: &ConstantBlock, stage: ShaderStage) {
    let registers = block.used(stage).len() / rendstate::sink::REGISTER_SIZE;
    for index in 0..registers {
        let Some(value) = block.register(stage, index) else {
            continue;
        };
        if value.iter().all(|component| *component == 0.0) {
            continue;
        }
        println!("{} c{index}: {value:?}", input::stage_name(stage));
    }
}
