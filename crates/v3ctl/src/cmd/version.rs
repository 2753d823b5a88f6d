use v3ctl_client::{CORE_EXECUTABLE, CORE_SUBDIR};
use v3ctl_frame::{MAX_FRAME_SIZE, VERSION};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("v3ctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: v3ctl");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol_version: {VERSION}");
    println!("max_frame_size: {MAX_FRAME_SIZE}");
    println!("core_executable: {CORE_SUBDIR}/{CORE_EXECUTABLE}");
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("V3CTL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("V3CTL_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));

    Ok(SUCCESS)
}
