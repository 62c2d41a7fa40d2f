use clap::{Args, Subcommand};
use std::path::PathBuf;

use pairlink_link::DEFAULT_PAYLOAD_BUFFER;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod loopback;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one packet across an in-memory link pair and print what arrives.
    Loopback(LoopbackArgs),
    /// Decode a capture of newline-framed packets.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Loopback(args) => loopback::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Packet type.
    #[arg(long = "type", value_name = "TYPE")]
    pub packet_type: String,
    /// Packet body as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub body: Option<String>,
    /// Stream this file as the packet's payload.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Payload chunk size in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_PAYLOAD_BUFFER)]
    pub buffer_size: usize,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted.
    pub path: Option<PathBuf>,
    /// Maximum frame size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
