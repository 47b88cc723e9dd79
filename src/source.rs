use crate::cancel::CancelToken;
use crate::console::Console;
use crate::error::{PipelineError, Result};
use crate::stage::forward;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Keyword that ends the session, matched case-insensitively
pub const EXIT_KEYWORD: &str = "exit";

/// One line of runtime input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Value(i64),
    Exit,
}

/// Classify a line of input. Surrounding whitespace is ignored.
pub fn parse_token(line: &str) -> Result<Token> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case(EXIT_KEYWORD) {
        return Ok(Token::Exit);
    }
    trimmed
        .parse::<i64>()
        .map(Token::Value)
        .map_err(|_| PipelineError::InvalidToken(trimmed.to_string()))
}

/// Read one line, decoding invalid UTF-8 lossily so that a garbled line
/// parses as an invalid token instead of failing the read.
///
/// Returns `Ok(None)` at end of input.
pub(crate) fn read_line_lossy<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Counts reported by a finished source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSummary {
    pub accepted: u64,
    pub rejected: u64,
    /// Whether the source stopped on the exit keyword rather than end of input
    pub exited: bool,
}

/// Turns a line-oriented reader into a sequence of integers.
///
/// On the exit keyword it fires the cancellation token; on end of input it
/// just closes its output so the pipeline can drain.
pub struct LineSource<R> {
    reader: R,
    cancel: CancelToken,
    console: Console,
}

impl<R> LineSource<R>
where
    R: BufRead + Send + 'static,
{
    pub fn new(reader: R, cancel: CancelToken, console: Console) -> Self {
        Self {
            reader,
            cancel,
            console,
        }
    }

    /// Start reading on a dedicated thread
    pub fn spawn(self) -> Result<(Receiver<i64>, JoinHandle<SourceSummary>)> {
        let (output, values) = bounded(0);
        let name = "source".to_string();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run(output))
            .map_err(|source| PipelineError::Spawn { name, source })?;
        Ok((values, handle))
    }

    fn run(mut self, output: Sender<i64>) -> SourceSummary {
        let mut summary = SourceSummary::default();
        let mut buf = Vec::new();

        loop {
            let line = match read_line_lossy(&mut self.reader, &mut buf) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read input, closing source");
                    break;
                }
            };

            match parse_token(&line) {
                Ok(Token::Exit) => {
                    info!("exit keyword received");
                    summary.exited = true;
                    self.cancel.cancel();
                    break;
                }
                Ok(Token::Value(value)) => {
                    debug!(value, "read value");
                    if !forward(&self.cancel, &output, value) {
                        break;
                    }
                    summary.accepted += 1;
                }
                Err(e) => {
                    warn!(error = %e, "skipping input");
                    summary.rejected += 1;
                    self.console.invalid_input(line.trim());
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::SharedBuffer;
    use std::io::Cursor;

    #[test]
    fn test_parse_token() {
        assert_eq!(parse_token("42\n").unwrap(), Token::Value(42));
        assert_eq!(parse_token(" -7 ").unwrap(), Token::Value(-7));
        assert_eq!(parse_token("EXIT").unwrap(), Token::Exit);
        assert_eq!(parse_token("Exit\r\n").unwrap(), Token::Exit);
        assert!(matches!(parse_token("4x"), Err(PipelineError::InvalidToken(t)) if t == "4x"));
        assert!(parse_token("").is_err());
    }

    #[test]
    fn test_source_closes_on_eof() {
        let out = SharedBuffer::new();
        let cancel = CancelToken::new();
        let source = LineSource::new(
            Cursor::new("1\nabc\n-2\n"),
            cancel.clone(),
            Console::new(out.clone()),
        );
        let (values, handle) = source.spawn().unwrap();

        let received: Vec<i64> = values.iter().collect();
        assert_eq!(received, vec![1, -2]);

        let summary = handle.join().unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.rejected, 1);
        assert!(!summary.exited);
        assert!(!cancel.is_cancelled());
        assert_eq!(out.lines().len(), 1);
    }

    #[test]
    fn test_source_cancels_on_exit() {
        let cancel = CancelToken::new();
        let source = LineSource::new(
            Cursor::new("5\nexit\n6\n"),
            cancel.clone(),
            Console::new(SharedBuffer::new()),
        );
        let (values, handle) = source.spawn().unwrap();

        assert_eq!(values.recv().unwrap(), 5);
        let summary = handle.join().unwrap();
        assert!(summary.exited);
        assert!(cancel.is_cancelled());
        assert!(values.recv().is_err());
    }

    #[test]
    fn test_source_skips_non_utf8_line() {
        let out = SharedBuffer::new();
        let source = LineSource::new(
            Cursor::new(b"3\n\xff\xfe\n6\n9\n".to_vec()),
            CancelToken::new(),
            Console::new(out.clone()),
        );
        let (values, handle) = source.spawn().unwrap();

        let received: Vec<i64> = values.iter().collect();
        assert_eq!(received, vec![3, 6, 9]);

        let summary = handle.join().unwrap();
        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.rejected, 1);
        assert_eq!(out.lines().len(), 1);
        assert!(out.contents().starts_with("Only integers can be processed"));
    }
}
