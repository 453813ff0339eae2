use std::fs;

use mbimlink_device::Device;
use mbimlink_frame::{MessageHeader, HEADER_SIZE, MESSAGE_COMMAND};
use mbimlink_session::{
    CommandHandler, HandlerError, Session, SessionConfig, StopSignal,
};
use serde::Serialize;
use tracing::warn;

use crate::cmd::{parse_duration, RawArgs};
use crate::exit::{
    device_error, result_exit_code, session_error, CliError, CliResult, USAGE,
};
use crate::output::{hex_string, print_raw, OutputFormat};

/// Handler that passes one caller-supplied command frame through untouched
/// and keeps the reply payload for printing.
struct PassthroughCommand {
    frame: Vec<u8>,
    reply: Option<Vec<u8>>,
}

impl PassthroughCommand {
    fn new(frame: Vec<u8>) -> Self {
        Self { frame, reply: None }
    }
}

impl CommandHandler for PassthroughCommand {
    fn request(&mut self, buf: &mut [u8]) -> Result<usize, HandlerError> {
        if self.frame.len() > buf.len() {
            return Err(HandlerError::new(format!(
                "command frame larger than negotiated capacity ({} > {})",
                self.frame.len(),
                buf.len()
            )));
        }
        buf[..self.frame.len()].copy_from_slice(&self.frame);
        Ok(self.frame.len())
    }

    fn response(&mut self, payload: &[u8]) -> i32 {
        self.reply = Some(payload.to_vec());
        0
    }
}

#[derive(Serialize)]
struct RawOutput<'a> {
    device: &'a str,
    result_code: i32,
    payload_len: usize,
    payload: String,
}

pub fn run(args: RawArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = parse_duration(&args.timeout)?;
    let frame = resolve_frame(&args)?;
    validate_frame(&frame)?;

    let device =
        Device::open(&args.device).map_err(|err| device_error("failed to open device", err))?;
    let capacity = device.capacity();

    let mut handler = PassthroughCommand::new(frame);
    let mut session = Session::new(
        device,
        capacity,
        &mut handler,
        SessionConfig {
            reply_deadline: deadline,
        },
    )
    .map_err(|err| session_error("session setup failed", err))?;
    session
        .start()
        .map_err(|err| session_error("open request failed", err))?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_stop.request_stop()) {
        warn!(%err, "could not install interrupt handler");
    }

    let result = mbimlink_session::run(&mut session, &stop);
    drop(session);

    print_result(&args.device.to_string_lossy(), result, &handler, format);
    Ok(result_exit_code(result))
}

fn resolve_frame(args: &RawArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Err(CliError::new(USAGE, "one of --hex or --file is required"))
}

fn validate_frame(frame: &[u8]) -> CliResult<()> {
    if frame.len() < HEADER_SIZE {
        return Err(CliError::new(
            USAGE,
            format!(
                "command frame too short ({} bytes, header is {})",
                frame.len(),
                HEADER_SIZE
            ),
        ));
    }

    let header = MessageHeader::decode(frame)
        .map_err(|err| CliError::new(USAGE, format!("invalid command frame: {err}")))?;
    if header.total_length as usize != frame.len() {
        return Err(CliError::new(
            USAGE,
            format!(
                "frame declares {} bytes but {} were supplied",
                header.total_length,
                frame.len()
            ),
        ));
    }
    if header.message_type != MESSAGE_COMMAND {
        return Err(CliError::new(
            USAGE,
            format!(
                "frame type {:#010x} is not a command request ({:#010x})",
                header.message_type, MESSAGE_COMMAND
            ),
        ));
    }

    Ok(())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let cleaned: Vec<char> = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if cleaned.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }

    let mut out = Vec::with_capacity(cleaned.len() / 2);
    for pair in cleaned.chunks(2) {
        let digit = |c: char| {
            c.to_digit(16)
                .ok_or_else(|| CliError::new(USAGE, format!("--hex has invalid digit: {c}")))
        };
        out.push((digit(pair[0])? * 16 + digit(pair[1])?) as u8);
    }
    Ok(out)
}

fn print_result(device: &str, result: i32, handler: &PassthroughCommand, format: OutputFormat) {
    let payload = handler.reply.as_deref().unwrap_or(&[]);
    match format {
        OutputFormat::Json => {
            let out = RawOutput {
                device,
                result_code: result,
                payload_len: payload.len(),
                payload: hex_string(payload),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            println!("result: {result}");
            if payload.is_empty() {
                println!("payload: (none)");
            } else {
                println!("payload ({} bytes): {}", payload.len(), hex_string(payload));
            }
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}
