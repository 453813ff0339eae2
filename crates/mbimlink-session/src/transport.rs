use std::io::{ErrorKind, Read, Write};

use mbimlink_frame::{reply_tag, MessageHeader, HEADER_SIZE};
use tracing::{debug, trace, warn};

use crate::error::TransportError;

/// Framed send/receive over the raw device stream.
///
/// Every frame is validated against the capacity negotiated at open time
/// before it touches the wire. The transport itself is stateless beyond
/// that capacity; reply expectations and deadlines live in the session.
pub struct Transport<T> {
    wire: T,
    capacity: usize,
}

impl<T: Read + Write> Transport<T> {
    pub fn new(wire: T, capacity: usize) -> Self {
        Self { wire, capacity }
    }

    /// The negotiated maximum frame size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.wire
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.wire
    }

    /// Send one complete frame, returning the done-reply tag expected for it.
    ///
    /// The frame's declared length must equal the slice length and fit the
    /// negotiated capacity; violations are refused with no I/O. A zero-byte
    /// write is a failure, not progress.
    pub fn send(&mut self, frame: &[u8]) -> Result<u32, TransportError> {
        let header =
            MessageHeader::decode(frame).map_err(|_| TransportError::MalformedFrame {
                len: frame.len(),
                need: HEADER_SIZE,
            })?;
        let declared = header.total_length as usize;

        if declared > self.capacity {
            warn!(
                "refusing oversized frame (type {:#010x}, {} > {} bytes)",
                header.message_type, declared, self.capacity
            );
            return Err(TransportError::FrameTooLarge {
                size: declared,
                max: self.capacity,
            });
        }
        if declared != frame.len() {
            return Err(TransportError::LengthMismatch {
                declared,
                actual: frame.len(),
            });
        }

        dump_frame("sending", &header, frame);

        let mut offset = 0usize;
        while offset < frame.len() {
            match self.wire.write(&frame[offset..]) {
                Ok(0) => return Err(TransportError::WriteFailed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        Ok(reply_tag(header.message_type))
    }

    /// Read one frame into `buf`.
    ///
    /// Returns `Ok(None)` when no data is available yet; read errors are
    /// transient here, the loop will try again on the next readiness event.
    /// A zero-byte read is end of file — the device side is gone — and
    /// reported as [`TransportError::Disconnected`], never retried. A read
    /// shorter than the header is a [`TransportError::MalformedFrame`].
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        let n = match self.wire.read(buf) {
            Ok(0) => return Err(TransportError::Disconnected),
            Ok(n) => n,
            Err(err) => {
                debug!(%err, "device read yielded no data");
                return Ok(None);
            }
        };

        if n < HEADER_SIZE {
            return Err(TransportError::MalformedFrame {
                len: n,
                need: HEADER_SIZE,
            });
        }

        // Header decode cannot fail past the length check above.
        if let Ok(header) = MessageHeader::decode(&buf[..n]) {
            dump_frame("reading", &header, &buf[..n]);
            if header.total_length as usize > n {
                warn!(
                    declared = header.total_length,
                    read = n,
                    "frame declares more bytes than were read"
                );
            }
        }

        Ok(Some(n))
    }
}

fn dump_frame(direction: &str, header: &MessageHeader, frame: &[u8]) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    trace!(
        "{} ({}): {}",
        direction,
        frame.len(),
        hex(frame)
    );
    trace!(
        "  header_type: {:#010x}  header_length: {}  header_transaction: {}",
        header.message_type,
        header.total_length,
        header.transaction_id
    );
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};

    use mbimlink_frame::{MESSAGE_COMMAND, MESSAGE_COMMAND_DONE, MESSAGE_OPEN};

    use super::*;

    /// In-memory stream: scripted inbound reads, recorded outbound writes.
    #[derive(Default)]
    struct FakeWire {
        inbound: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
        write_result: Option<usize>,
    }

    impl Read for FakeWire {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.inbound.pop_front() {
                Some(frame) => {
                    let n = frame.len().min(buf.len());
                    buf[..n].copy_from_slice(&frame[..n]);
                    Ok(n)
                }
                None => Err(io::Error::from(ErrorKind::WouldBlock)),
            }
        }
    }

    impl Write for FakeWire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(n) = self.write_result {
                return Ok(n);
            }
            self.sent.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(message_type: u32, total_length: u32, transaction_id: u32) -> Vec<u8> {
        let mut buf = vec![0u8; total_length as usize];
        MessageHeader {
            message_type,
            total_length,
            transaction_id,
        }
        .encode(&mut buf)
        .unwrap();
        buf
    }

    #[test]
    fn send_returns_expected_reply_tag() {
        let mut transport = Transport::new(FakeWire::default(), 512);
        let outbound = frame(MESSAGE_OPEN, 16, 1);

        let expected = transport.send(&outbound).unwrap();

        assert_eq!(expected, 0x8000_0001);
        assert_eq!(transport.get_ref().sent, vec![outbound]);
    }

    #[test]
    fn oversized_frame_refused_without_io() {
        let mut transport = Transport::new(FakeWire::default(), 1024);
        let outbound = frame(MESSAGE_COMMAND, 2000, 1);

        let err = transport.send(&outbound).unwrap_err();

        assert!(matches!(
            err,
            TransportError::FrameTooLarge {
                size: 2000,
                max: 1024
            }
        ));
        assert!(transport.get_ref().sent.is_empty());
    }

    #[test]
    fn declared_length_must_match_slice() {
        let mut transport = Transport::new(FakeWire::default(), 512);
        let mut outbound = frame(MESSAGE_COMMAND, 64, 1);
        outbound.truncate(32);

        let err = transport.send(&outbound).unwrap_err();

        assert!(matches!(
            err,
            TransportError::LengthMismatch {
                declared: 64,
                actual: 32
            }
        ));
        assert!(transport.get_ref().sent.is_empty());
    }

    #[test]
    fn zero_byte_write_is_a_failure() {
        let wire = FakeWire {
            write_result: Some(0),
            ..FakeWire::default()
        };
        let mut transport = Transport::new(wire, 512);
        let outbound = frame(MESSAGE_OPEN, 16, 1);

        let err = transport.send(&outbound).unwrap_err();
        assert!(matches!(err, TransportError::WriteFailed));
    }

    #[test]
    fn zero_byte_read_reports_disconnect() {
        let wire = FakeWire {
            inbound: VecDeque::from([vec![]]),
            ..FakeWire::default()
        };
        let mut transport = Transport::new(wire, 512);
        let mut buf = [0u8; 512];

        let err = transport.recv(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
    }

    #[test]
    fn recv_absorbs_would_block() {
        let mut transport = Transport::new(FakeWire::default(), 512);
        let mut buf = [0u8; 512];

        assert!(matches!(transport.recv(&mut buf), Ok(None)));
    }

    #[test]
    fn recv_flags_short_reads() {
        let wire = FakeWire {
            inbound: VecDeque::from([vec![0u8; 5]]),
            ..FakeWire::default()
        };
        let mut transport = Transport::new(wire, 512);
        let mut buf = [0u8; 512];

        let err = transport.recv(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MalformedFrame { len: 5, need: 12 }
        ));
    }

    #[test]
    fn recv_returns_full_frames() {
        let inbound = frame(MESSAGE_COMMAND_DONE, 24, 3);
        let wire = FakeWire {
            inbound: VecDeque::from([inbound.clone()]),
            ..FakeWire::default()
        };
        let mut transport = Transport::new(wire, 512);
        let mut buf = [0u8; 512];

        let n = transport.recv(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..n], inbound.as_slice());
    }
}
