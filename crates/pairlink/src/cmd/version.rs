use pairlink_frame::{DEFAULT_MAX_FRAME, DEFAULT_READ_CHUNK};
use pairlink_link::{Link, DEFAULT_PAYLOAD_BUFFER};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pairlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    for (key, value) in provenance() {
        println!("{key}: {value}");
    }
    Ok(SUCCESS)
}

/// Build facts plus the link defaults this binary was compiled with.
fn provenance() -> Vec<(&'static str, String)> {
    let built = |value: Option<&str>| value.unwrap_or("unknown").to_string();
    vec![
        ("name", "pairlink".to_string()),
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        ("build_target", built(option_env!("PAIRLINK_BUILD_TARGET"))),
        ("build_profile", built(option_env!("PAIRLINK_BUILD_PROFILE"))),
        ("link_name", Link::NAME.to_string()),
        ("max_frame_size", DEFAULT_MAX_FRAME.to_string()),
        ("read_chunk_size", DEFAULT_READ_CHUNK.to_string()),
        ("payload_buffer_size", DEFAULT_PAYLOAD_BUFFER.to_string()),
    ]
}
