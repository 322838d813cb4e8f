use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ftlnet {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ftlnet");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FTLNET_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "protocol: magic={:#018x} version={}",
        ftlnet_peer::HANDSHAKE_MAGIC,
        ftlnet_peer::PROTOCOL_VERSION
    );
    println!(
        "features: peer={}, stream={}, websocket={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "stream"),
        cfg!(feature = "websocket")
    );

    Ok(SUCCESS)
}
