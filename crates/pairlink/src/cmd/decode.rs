use std::fs::File;
use std::io::{self, Read};

use pairlink_frame::{FrameConfig, FrameError, FrameReader};
use pairlink_link::Packet;
use tracing::{debug, info, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = FrameConfig::default();
    if let Some(max) = args.max_frame_size {
        if max == 0 {
            return Err(CliError::new(USAGE, "--max-frame-size must be greater than zero"));
        }
        config.max_frame_size = max;
    }

    let input: Box<dyn Read> = match &args.path {
        Some(path) => Box::new(File::open(path).map_err(|err| {
            io_error(&format!("failed opening {}", path.display()), err)
        })?),
        None => Box::new(io::stdin().lock()),
    };

    let summary = decode_stream(input, config, |packet| print_packet(&packet, None, format))?;
    info!(
        decoded = summary.decoded,
        skipped = summary.skipped,
        "decode finished"
    );
    Ok(SUCCESS)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DecodeSummary {
    decoded: usize,
    skipped: usize,
}

/// Feed every complete frame of `input` through the packet decoder.
///
/// Malformed frames are skipped; a trailing unterminated frame is dropped.
fn decode_stream<R: Read>(
    input: R,
    config: FrameConfig,
    mut emit: impl FnMut(Packet),
) -> CliResult<DecodeSummary> {
    let mut reader = FrameReader::with_config(input, config);
    let mut summary = DecodeSummary::default();

    for frame in reader.frames() {
        let frame = match frame {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("read failed", err)),
        };
        match Packet::decode(&frame) {
            Ok(packet) => {
                summary.decoded += 1;
                emit(packet);
            }
            Err(err) => {
                summary.skipped += 1;
                warn!(error = %err, bytes = frame.len(), "unable to parse frame, skipping");
            }
        }
    }

    if !reader.pending().is_empty() {
        debug!(bytes = reader.pending().len(), "dropping unterminated trailing frame");
    }
    Ok(summary)
}
