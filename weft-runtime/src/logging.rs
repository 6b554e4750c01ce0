// Logging bridge to the native log table.

use std::io;
use std::sync::Arc;

use weft_ffi::{LogFn, LogUtilsTable};

/// Native verbosity levels, most severe first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Fatal,
    Error,
    Warning,
    Display,
    Log,
    Verbose,
    VeryVerbose,
}

/// Destination for log text.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, text: &str);
}

/// `LogSink` over a bound native log table. Unset entries drop the message.
pub struct NativeLogUtils {
    table: LogUtilsTable,
}

impl NativeLogUtils {
    /// # Safety
    /// Every non-null entry in `table` must be callable with a UTF-8 pointer and
    /// length for as long as this value lives.
    pub unsafe fn new(table: LogUtilsTable) -> Self {
        NativeLogUtils { table }
    }

    fn entry(&self, level: LogLevel) -> Option<LogFn> {
        match level {
            LogLevel::Fatal => self.table.fatal,
            LogLevel::Error => self.table.error,
            LogLevel::Warning => self.table.warning,
            LogLevel::Display => self.table.display,
            LogLevel::Log => self.table.log,
            LogLevel::Verbose => self.table.verbose,
            LogLevel::VeryVerbose => self.table.very_verbose,
        }
    }
}

impl LogSink for NativeLogUtils {
    fn write(&self, level: LogLevel, text: &str) {
        if let Some(f) = self.entry(level) {
            // SAFETY: guaranteed by `NativeLogUtils::new`.
            unsafe { f(text.as_ptr(), text.len() as u32) };
        }
        if level == LogLevel::Fatal {
            // The native fatal entry does not return; if it did, stop here.
            std::process::abort();
        }
    }
}

struct NullSink;

impl LogSink for NullSink {
    fn write(&self, _level: LogLevel, _text: &str) {}
}

/// Cheap, cloneable handle to a log sink.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Logger { sink }
    }

    /// Discards everything. Used before any native log table is known.
    pub fn null() -> Self {
        Logger { sink: Arc::new(NullSink) }
    }

    #[inline]
    pub fn log(&self, level: LogLevel, text: &str) {
        self.sink.write(level, text);
    }

    pub fn error(&self, text: &str) {
        self.log(LogLevel::Error, text);
    }

    pub fn warning(&self, text: &str) {
        self.log(LogLevel::Warning, text);
    }

    pub fn display(&self, text: &str) {
        self.log(LogLevel::Display, text);
    }

    pub fn verbose(&self, text: &str) {
        self.log(LogLevel::Verbose, text);
    }

    /// Line-buffered text stream that lands in the `Display` level.
    pub fn writer(&self) -> LogWriter {
        LogWriter {
            logger: self.clone(),
            buf: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Logger")
    }
}

/// Buffers written bytes until they end in a line terminator, then forwards the
/// buffered text (terminator stripped) as one `Display` message.
pub struct LogWriter {
    logger: Logger,
    buf: Vec<u8>,
}

impl LogWriter {
    fn emit(&mut self, end: usize) {
        let text = String::from_utf8_lossy(&self.buf[..end]);
        self.logger.display(&text);
        self.buf.clear();
    }

    fn flush_on_newline(&mut self) {
        if self.buf.ends_with(b"\r\n") {
            self.emit(self.buf.len() - 2);
        } else if self.buf.ends_with(b"\n") {
            self.emit(self.buf.len() - 1);
        }
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        self.flush_on_newline();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let end = self.buf.len();
            self.emit(end);
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

/// Format and log a message through a [`Logger`].
///
/// ```ignore
/// wlog!(logger, LogLevel::Display, "loaded {} classes", n);
/// wlog!(logger, LogLevel::Error, "fatal: {err}");
/// ```
#[macro_export]
macro_rules! wlog {
    ($logger:expr, $level:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::Logger::log(&$logger, $level, &msg);
    }};
}
