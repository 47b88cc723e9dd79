use crate::buffer::{OverflowPolicy, DEFAULT_CAPACITY};
use crate::console::Console;
use crate::error::{PipelineError, Result};
use crate::source::read_line_lossy;
use std::io::BufRead;
use std::time::Duration;

/// Settings for the batching stage, fixed before the pipeline starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How often the batching stage flushes. `None` means ask interactively.
    pub clear_interval: Option<Duration>,
    pub buffer_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self {
            clear_interval: None,
            buffer_capacity: DEFAULT_CAPACITY,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }

    pub fn with_clear_interval(mut self, interval: Duration) -> Self {
        self.clear_interval = Some(interval);
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(PipelineError::ConfigError(
                "buffer capacity must be at least 1".into(),
            ));
        }
        if self.clear_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(PipelineError::ConfigError(
                "clear interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a clear interval given as a positive number of whole seconds
pub fn parse_interval(token: &str) -> Result<Duration> {
    let trimmed = token.trim();
    match trimmed.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(PipelineError::ConfigError(format!(
            "invalid clear interval {trimmed:?}: expected a positive whole number of seconds"
        ))),
    }
}

/// Read lines until one holds a valid clear interval.
///
/// Each rejected line is reported on the console. Running out of input
/// first is an error.
pub fn read_interval<R: BufRead>(reader: &mut R, console: &Console) -> Result<Duration> {
    let mut buf = Vec::new();
    loop {
        let Some(line) = read_line_lossy(reader, &mut buf)? else {
            return Err(PipelineError::ConfigError(
                "input closed before a clear interval was entered".into(),
            ));
        };
        match parse_interval(&line) {
            Ok(interval) => return Ok(interval),
            Err(e) => {
                tracing::warn!(error = %e, "rejected clear interval");
                console.invalid_interval(line.trim());
                console.prompt_interval();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::SharedBuffer;
    use std::io::Cursor;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_capacity, 10);
        assert_eq!(config.clear_interval, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(PipelineConfig::new().with_buffer_capacity(0).validate().is_err());
        assert!(PipelineConfig::new()
            .with_clear_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("5\n").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_interval("  2 ").unwrap(), Duration::from_secs(2));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("1.5").is_err());
        assert!(parse_interval("").is_err());
    }

    #[test]
    fn test_read_interval_reprompts() {
        let out = SharedBuffer::new();
        let console = Console::new(out.clone());
        let mut input = Cursor::new("soon\n0\n3\n");

        let interval = read_interval(&mut input, &console).unwrap();
        assert_eq!(interval, Duration::from_secs(3));
        assert_eq!(out.lines().len(), 4);
    }

    #[test]
    fn test_read_interval_eof() {
        let console = Console::new(SharedBuffer::new());
        let mut input = Cursor::new("nope\n");
        assert!(matches!(
            read_interval(&mut input, &console),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_read_interval_skips_non_utf8_line() {
        let out = SharedBuffer::new();
        let console = Console::new(out.clone());
        let mut input = Cursor::new(b"\xff\n3\n".to_vec());

        let interval = read_interval(&mut input, &console).unwrap();
        assert_eq!(interval, Duration::from_secs(3));
        // notice plus re-prompt for the rejected line
        assert_eq!(out.lines().len(), 2);
    }
}
