//! End-to-end session runs over a socket pair, with a scripted thread
//! playing the device side.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::Duration;

use mbimlink_frame::{
    MessageHeader, COMMAND_DONE_FIXED, HEADER_SIZE, MESSAGE_CLOSE, MESSAGE_CLOSE_DONE,
    MESSAGE_COMMAND, MESSAGE_COMMAND_DONE, MESSAGE_OPEN, MESSAGE_OPEN_DONE,
};
use mbimlink_session::{
    run, CommandHandler, HandlerError, Session, SessionConfig, StopSignal, RESULT_ABORTED,
    RESULT_FAILURE, RESULT_TIMEOUT,
};

const CAPACITY: usize = 512;

struct PassthroughHandler {
    command: Vec<u8>,
    reply: Option<Vec<u8>>,
}

impl PassthroughHandler {
    fn new(command: Vec<u8>) -> Self {
        Self {
            command,
            reply: None,
        }
    }
}

impl CommandHandler for PassthroughHandler {
    fn request(&mut self, buf: &mut [u8]) -> Result<usize, HandlerError> {
        buf[..self.command.len()].copy_from_slice(&self.command);
        Ok(self.command.len())
    }

    fn response(&mut self, payload: &[u8]) -> i32 {
        self.reply = Some(payload.to_vec());
        0
    }
}

fn header_frame(message_type: u32, total_length: usize, transaction_id: u32) -> Vec<u8> {
    let mut buf = vec![0u8; total_length];
    MessageHeader {
        message_type,
        total_length: total_length as u32,
        transaction_id,
    }
    .encode(&mut buf)
    .unwrap();
    buf
}

fn command_done_frame(status: u32, payload: &[u8], transaction_id: u32) -> Vec<u8> {
    let total = HEADER_SIZE + COMMAND_DONE_FIXED + payload.len();
    let mut buf = header_frame(MESSAGE_COMMAND_DONE, total, transaction_id);
    let body = &mut buf[HEADER_SIZE..];
    body[0..4].copy_from_slice(&1u32.to_le_bytes());
    body[4..8].copy_from_slice(&status.to_le_bytes());
    body[8..12].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    body[12..].copy_from_slice(payload);
    buf
}

fn read_frame(stream: &mut UnixStream) -> Vec<u8> {
    let mut buf = [0u8; CAPACITY];
    let n = stream.read(&mut buf).unwrap();
    buf[..n].to_vec()
}

#[test]
fn full_lifecycle_over_socketpair() {
    let (wire, mut device_side) = UnixStream::pair().unwrap();

    let device = thread::spawn(move || {
        let open = read_frame(&mut device_side);
        let open_header = MessageHeader::decode(&open).unwrap();
        assert_eq!(open_header.message_type, MESSAGE_OPEN);
        device_side
            .write_all(&header_frame(
                MESSAGE_OPEN_DONE,
                16,
                open_header.transaction_id,
            ))
            .unwrap();

        let command = read_frame(&mut device_side);
        let command_header = MessageHeader::decode(&command).unwrap();
        assert_eq!(command_header.message_type, MESSAGE_COMMAND);
        device_side
            .write_all(&command_done_frame(
                0,
                b"device-result",
                command_header.transaction_id,
            ))
            .unwrap();

        let close = read_frame(&mut device_side);
        let close_header = MessageHeader::decode(&close).unwrap();
        assert_eq!(close_header.message_type, MESSAGE_CLOSE);
        device_side
            .write_all(&header_frame(
                MESSAGE_CLOSE_DONE,
                12,
                close_header.transaction_id,
            ))
            .unwrap();
    });

    let mut handler = PassthroughHandler::new(header_frame(MESSAGE_COMMAND, 24, 9));
    let mut session =
        Session::new(wire, CAPACITY, &mut handler, SessionConfig::default()).unwrap();
    session.start().unwrap();

    let result = run(&mut session, &StopSignal::new());

    assert_eq!(result, 0);
    assert!(session.is_terminated());

    device.join().unwrap();
    drop(session);
    assert_eq!(handler.reply.as_deref(), Some(b"device-result".as_ref()));
}

#[test]
fn silent_device_times_out() {
    let (wire, mut device_side) = UnixStream::pair().unwrap();

    let device = thread::spawn(move || {
        // Swallow the open request and go quiet.
        let _ = read_frame(&mut device_side);
        thread::sleep(Duration::from_millis(500));
    });

    let mut handler = PassthroughHandler::new(header_frame(MESSAGE_COMMAND, 24, 9));
    let config = SessionConfig {
        reply_deadline: Duration::from_millis(50),
    };
    let mut session = Session::new(wire, CAPACITY, &mut handler, config).unwrap();
    session.start().unwrap();

    let result = run(&mut session, &StopSignal::new());

    assert_eq!(result, RESULT_TIMEOUT);
    assert!(session.is_terminated());
    device.join().unwrap();
}

#[test]
fn device_hangup_fails_the_session() {
    let (wire, mut device_side) = UnixStream::pair().unwrap();

    let device = thread::spawn(move || {
        // Swallow the open request, then drop the stream without replying.
        let _ = read_frame(&mut device_side);
    });

    let mut handler = PassthroughHandler::new(header_frame(MESSAGE_COMMAND, 24, 9));
    let mut session =
        Session::new(wire, CAPACITY, &mut handler, SessionConfig::default()).unwrap();
    session.start().unwrap();

    let result = run(&mut session, &StopSignal::new());

    assert_eq!(result, RESULT_FAILURE);
    assert!(session.is_terminated());
    device.join().unwrap();
}

#[test]
fn stop_signal_aborts_the_run() {
    let (wire, _device_side) = UnixStream::pair().unwrap();

    let mut handler = PassthroughHandler::new(header_frame(MESSAGE_COMMAND, 24, 9));
    let mut session =
        Session::new(wire, CAPACITY, &mut handler, SessionConfig::default()).unwrap();
    session.start().unwrap();

    let stop = StopSignal::new();
    stop.request_stop();
    let result = run(&mut session, &stop);

    assert_eq!(result, RESULT_ABORTED);
    assert!(session.is_terminated());
}
