use log::{debug, warn};
use serialport::{DataBits, Parity, StopBits};
use std::io::{self, BufRead, BufReader};

use crate::config::EngineConfig;
use crate::error::ScaleError;

/// Line terminator of the scale's frames
const LINE_TERMINATOR: u8 = b'\n';

/// Longest partial frame kept across read timeouts
pub const MAX_FRAME_LEN: usize = 256;

/// An open byte channel to the scale, yielding one frame per call
pub trait Transport: Send {
    /// Read the next newline-terminated line
    ///
    /// Returns `Ok(None)` when the read timeout expires before a full line
    /// arrives. Any error means the transport is no longer usable.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, ScaleError>;

    /// Whether the underlying handle still reports itself open
    fn is_open(&self) -> bool {
        true
    }
}

/// Opens transports for the reader loop
pub trait Connector: Send + Sync {
    fn connect(&self, config: &EngineConfig) -> Result<Box<dyn Transport>, ScaleError>;
}

/// Opens the configured serial port as 8N1 with the configured baud rate and timeout
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn connect(&self, config: &EngineConfig) -> Result<Box<dyn Transport>, ScaleError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| ScaleError::Open {
                port: config.port.clone(),
                source,
            })?;

        debug!(
            "Opened {} at {} baud (timeout {:?})",
            config.port, config.baud_rate, config.read_timeout
        );
        Ok(Box::new(LineTransport::new(port)))
    }
}

/// Splits a blocking byte stream into lines
///
/// Bytes of a line cut off by a read timeout are kept and completed on the
/// next call, unless they pile up past `MAX_FRAME_LEN` without a terminator.
pub struct LineTransport<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: io::Read> LineTransport<R> {
    pub fn new(inner: R) -> Self {
        LineTransport {
            reader: BufReader::new(inner),
            pending: Vec::new(),
        }
    }
}

impl<R: io::Read + Send> Transport for LineTransport<R> {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, ScaleError> {
        match self.reader.read_until(LINE_TERMINATOR, &mut self.pending) {
            Ok(0) => Err(ScaleError::Closed),
            Ok(_) if self.pending.last() == Some(&LINE_TERMINATOR) => {
                Ok(Some(std::mem::take(&mut self.pending)))
            }
            // EOF in the middle of a line
            Ok(_) => Err(ScaleError::Closed),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                self.discard_oversized();
                Ok(None)
            }
            Err(e) => Err(ScaleError::Read(e)),
        }
    }
}

impl<R> LineTransport<R> {
    /// Drop a partial frame that grew too long to be a weight frame
    fn discard_oversized(&mut self) {
        if self.pending.len() > MAX_FRAME_LEN {
            warn!(
                "Discarding {} bytes without a line terminator",
                self.pending.len()
            );
            self.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted read results, one per `read` call
    struct ScriptedReader {
        chunks: VecDeque<io::Result<Vec<u8>>>,
    }

    impl io::Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    fn transport(chunks: Vec<io::Result<Vec<u8>>>) -> LineTransport<ScriptedReader> {
        LineTransport::new(ScriptedReader {
            chunks: chunks.into(),
        })
    }

    fn timeout() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "timed out")
    }

    #[test]
    fn yields_complete_lines() {
        let mut t = transport(vec![Ok(b"+0012.45kg\n+0013.00kg\n".to_vec())]);
        assert_eq!(t.read_line().unwrap(), Some(b"+0012.45kg\n".to_vec()));
        assert_eq!(t.read_line().unwrap(), Some(b"+0013.00kg\n".to_vec()));
    }

    #[test]
    fn timeout_without_data_is_not_an_error() {
        let mut t = transport(vec![Err(timeout())]);
        assert_eq!(t.read_line().unwrap(), None);
    }

    #[test]
    fn partial_line_survives_timeout() {
        let mut t = transport(vec![
            Ok(b"+0012".to_vec()),
            Err(timeout()),
            Ok(b".45kg\n".to_vec()),
        ]);
        assert_eq!(t.read_line().unwrap(), None);
        assert_eq!(t.read_line().unwrap(), Some(b"+0012.45kg\n".to_vec()));
    }

    #[test]
    fn unterminated_input_stays_bounded() {
        let mut chunks = Vec::new();
        for _ in 0..100 {
            chunks.push(Ok(b"+0012.45kg\r".to_vec()));
            chunks.push(Err(timeout()));
        }
        chunks.push(Ok(b"+0001.00kg\n".to_vec()));
        let mut t = transport(chunks);

        for _ in 0..100 {
            assert_eq!(t.read_line().unwrap(), None);
            assert!(t.pending.len() <= MAX_FRAME_LEN);
        }
        let line = t.read_line().unwrap().unwrap();
        assert!(line.ends_with(b"+0001.00kg\n"));
        assert!(line.len() <= MAX_FRAME_LEN + 11);
    }

    #[test]
    fn end_of_stream_is_closed() {
        let mut t = transport(vec![]);
        assert!(matches!(t.read_line(), Err(ScaleError::Closed)));
    }

    #[test]
    fn io_error_is_read_error() {
        let mut t = transport(vec![Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "unplugged",
        ))]);
        assert!(matches!(t.read_line(), Err(ScaleError::Read(_))));
    }
}
