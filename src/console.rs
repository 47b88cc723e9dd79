use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// The user-facing side of the program: prompts, notices and processed
/// values, one line each.
///
/// Clones share the same writer, so lines from the source and the consumer
/// never interleave mid-line.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn banner(&self) {
        self.line(format_args!("Welcome to the batch pipeline!"));
    }

    pub fn prompt_interval(&self) {
        self.line(format_args!("Please enter the clear interval (in seconds):"));
    }

    pub fn invalid_interval(&self, token: &str) {
        self.line(format_args!(
            "The clear interval must be a positive whole number of seconds, got {token:?}"
        ));
    }

    pub fn prompt_data(&self) {
        self.line(format_args!(
            "Please enter your data, one integer per line (\"exit\" to quit):"
        ));
    }

    pub fn invalid_input(&self, token: &str) {
        self.line(format_args!(
            "Only integers can be processed, skipping {token:?}"
        ));
    }

    pub fn processed(&self, value: i64) {
        self.line(format_args!("processed value: {value}"));
    }

    pub fn farewell(&self) {
        self.line(format_args!("The program has finished. Goodbye!"));
    }

    fn line(&self, args: fmt::Arguments<'_>) {
        let mut out = self.out.lock();
        let mut result = writeln!(out, "{args}");
        if result.is_ok() {
            result = out.flush();
        }
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to write console output");
        }
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

/// In-memory writer whose contents stay readable after being handed to a
/// [`Console`]
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
