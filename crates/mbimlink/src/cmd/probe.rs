use mbimlink_device::Device;
use serde::Serialize;

use crate::cmd::ProbeArgs;
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct ProbeOutput {
    device: String,
    capacity: usize,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let device =
        Device::open(&args.device).map_err(|err| device_error("failed to open device", err))?;

    let out = ProbeOutput {
        device: args.device.to_string_lossy().into_owned(),
        capacity: device.capacity(),
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            println!("device:   {}", out.device);
            println!("capacity: {} bytes", out.capacity);
        }
        OutputFormat::Raw => {
            println!("{}", out.capacity);
        }
    }

    Ok(SUCCESS)
}
