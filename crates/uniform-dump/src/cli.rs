use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "uniform-dump",
    author,
    version,
    about = "Inspect and replay uniform opcode streams"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a JSON list of uniform updates into a binary opcode stream.
    Encode(EncodeArgs),
    /// List the records of a binary opcode stream.
    Decode(DecodeArgs),
    /// Replay a stream into CPU constant blocks and print the written registers.
    Replay(ReplayArgs),
}

#[derive(Parser, Debug)]
pub struct EncodeArgs {
    /// JSON file holding the list of updates.
    #[arg(value_name = "INPUT.json")]
    pub input: PathBuf,

    /// Destination of the encoded stream.
    #[arg(short, long, value_name = "OUT")]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct DecodeArgs {
    #[arg(value_name = "STREAM")]
    pub stream: PathBuf,

    /// Emit records as a JSON array instead of text lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    #[arg(value_name = "STREAM")]
    pub stream: PathBuf,

    /// Skip sampler uniforms, as backends with separate sampler binding do.
    #[arg(long)]
    pub no_samplers: bool,

    /// State configuration TOML (uniform limits, register width, block size).
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// JSON list of uniform slots to create before replay, for handle references.
    #[arg(long, value_name = "JSON")]
    pub slots: Option<PathBuf>,

    /// First byte of the stream to replay.
    #[arg(long, value_name = "OFFSET", default_value_t = 0)]
    pub begin: usize,

    /// Byte offset to stop at; defaults to the end of the file.
    #[arg(long, value_name = "OFFSET")]
    pub end: Option<usize>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_stage(value: &str) -> Result<rendstate::ShaderStage, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("shader stage must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "vertex" | "vs" | "vert" => Ok(rendstate::ShaderStage::Vertex),
        "fragment" | "fs" | "frag" | "pixel" => Ok(rendstate::ShaderStage::Fragment),
        other => Err(format!(
            "unknown shader stage '{other}'; expected vertex or fragment"
        )),
    }
}
