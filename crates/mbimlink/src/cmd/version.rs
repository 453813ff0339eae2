use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    default_capacity: usize,
    reply_deadline_secs: u64,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput {
        name: "mbimlink",
        version: env!("CARGO_PKG_VERSION"),
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
        default_capacity: mbimlink_device::DEFAULT_CAPACITY,
        reply_deadline_secs: mbimlink_session::REPLY_DEADLINE.as_secs(),
    };

    if let OutputFormat::Json = format {
        println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(SUCCESS);
    }

    if !args.extended {
        println!("{} {}", out.name, out.version);
        return Ok(SUCCESS);
    }

    println!("name: {}", out.name);
    println!("version: {}", out.version);
    println!("target_os: {}", out.target_os);
    println!("target_arch: {}", out.target_arch);
    println!("default_capacity: {} bytes", out.default_capacity);
    println!("reply_deadline: {}s", out.reply_deadline_secs);

    Ok(SUCCESS)
}
