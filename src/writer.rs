//! Message sinks for validator and publisher output.
//!
//! Every user-facing line goes through one of four severities. A caller may
//! inject its own [`Writer`]; anything it does not override falls back to the
//! process-wide [`ConsoleWriter`].

use std::fmt;
use std::io::Write as _;
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};

/// Severity of a line of output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Message,
    Warning,
    Success,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Message => "message",
            Severity::Warning => "warning",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How output text is decorated before it reaches a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintMode {
    #[default]
    Default,
    Html,
}

impl FromStr for PrintMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "" => Ok(PrintMode::Default),
            "html" => Ok(PrintMode::Html),
            other => Err(format!("Unknown print mode: {}", other)),
        }
    }
}

/// A four-severity output sink.
///
/// Methods that an implementation does not override are forwarded to the
/// process-wide default writer.
pub trait Writer: Send + Sync {
    fn message(&self, text: &str) {
        default_writer().message(text);
    }

    fn warning(&self, text: &str) {
        default_writer().warning(text);
    }

    fn success(&self, text: &str) {
        default_writer().success(text);
    }

    fn error(&self, text: &str) {
        default_writer().error(text);
    }
}

fn dispatch(writer: &dyn Writer, severity: Severity, text: &str) {
    match severity {
        Severity::Message => writer.message(text),
        Severity::Warning => writer.warning(text),
        Severity::Success => writer.success(text),
        Severity::Error => writer.error(text),
    }
}

static DEFAULT_WRITER: OnceLock<Arc<dyn Writer>> = OnceLock::new();

/// Process-wide default writer (console)
pub fn default_writer() -> &'static Arc<dyn Writer> {
    DEFAULT_WRITER.get_or_init(|| Arc::new(ConsoleWriter::new()))
}

/// Console writer: message/success on stdout, warning/error on stderr
pub struct ConsoleWriter {
    show_colors: bool,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self {
            show_colors: atty::is(atty::Stream::Stdout) && atty::is(atty::Stream::Stderr),
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for ConsoleWriter {
    fn message(&self, text: &str) {
        let _ = writeln!(std::io::stdout(), "{}", text);
    }

    fn warning(&self, text: &str) {
        let _ = writeln!(std::io::stderr(), "{}", self.colorize(text, "33"));
    }

    fn success(&self, text: &str) {
        let _ = writeln!(std::io::stdout(), "{}", self.colorize(text, "32"));
    }

    fn error(&self, text: &str) {
        let _ = writeln!(std::io::stderr(), "{}", self.colorize(text, "31"));
    }
}

/// Writer that keeps every line in memory
#[derive(Default)]
pub struct RecordingWriter {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, severity: Severity, text: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((severity, text.to_string()));
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn lines(&self, severity: Severity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lines(severity).len()
    }
}

impl Writer for RecordingWriter {
    fn message(&self, text: &str) {
        self.push(Severity::Message, text);
    }

    fn warning(&self, text: &str) {
        self.push(Severity::Warning, text);
    }

    fn success(&self, text: &str) {
        self.push(Severity::Success, text);
    }

    fn error(&self, text: &str) {
        self.push(Severity::Error, text);
    }
}

/// Drops everything but errors, which go to the default writer
pub struct QuietWriter;

impl Writer for QuietWriter {
    fn message(&self, _text: &str) {}

    fn warning(&self, _text: &str) {}

    fn success(&self, _text: &str) {}
}

/// Drops every line
pub struct NullWriter;

impl Writer for NullWriter {
    fn message(&self, _text: &str) {}

    fn warning(&self, _text: &str) {}

    fn success(&self, _text: &str) {}

    fn error(&self, _text: &str) {}
}

/// Routes text to the injected logger (or the default writer) and applies
/// the print mode.
#[derive(Clone)]
pub struct WriterHub {
    logger: Option<Arc<dyn Writer>>,
    print_mode: PrintMode,
}

impl WriterHub {
    pub fn new(logger: Option<Arc<dyn Writer>>, print_mode: PrintMode) -> Self {
        Self { logger, print_mode }
    }

    pub fn print_mode(&self) -> PrintMode {
        self.print_mode
    }

    pub fn write(&self, severity: Severity, text: &str) {
        let decorated;
        let text = match self.print_mode {
            PrintMode::Html => {
                decorated = format!("<div class=\"{}\">{}</div>", severity.as_str(), text);
                decorated.as_str()
            }
            PrintMode::Default => text,
        };

        match &self.logger {
            Some(logger) => dispatch(logger.as_ref(), severity, text),
            None => dispatch(default_writer().as_ref(), severity, text),
        }
    }

    pub fn message(&self, text: &str) {
        self.write(Severity::Message, text);
    }

    pub fn warning(&self, text: &str) {
        self.write(Severity::Warning, text);
    }

    pub fn success(&self, text: &str) {
        self.write(Severity::Success, text);
    }

    pub fn error(&self, text: &str) {
        self.write(Severity::Error, text);
    }
}

impl Default for WriterHub {
    fn default() -> Self {
        Self::new(None, PrintMode::Default)
    }
}

impl fmt::Debug for WriterHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterHub")
            .field("has_logger", &self.logger.is_some())
            .field("print_mode", &self.print_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_forwards_to_logger() {
        let recorder = Arc::new(RecordingWriter::new());
        let hub = WriterHub::new(Some(recorder.clone()), PrintMode::Default);

        hub.message("hello");
        hub.warning("careful");
        hub.success("done");
        hub.error("boom");

        assert_eq!(
            recorder.entries(),
            vec![
                (Severity::Message, "hello".to_string()),
                (Severity::Warning, "careful".to_string()),
                (Severity::Success, "done".to_string()),
                (Severity::Error, "boom".to_string()),
            ]
        );
    }

    #[test]
    fn test_html_mode_wraps_text() {
        let recorder = Arc::new(RecordingWriter::new());
        let hub = WriterHub::new(Some(recorder.clone()), PrintMode::Html);

        hub.warning("Untrusted file extension");
        hub.error("boom");

        assert_eq!(
            recorder.lines(Severity::Warning),
            vec!["<div class=\"warning\">Untrusted file extension</div>".to_string()]
        );
        assert_eq!(
            recorder.lines(Severity::Error),
            vec!["<div class=\"error\">boom</div>".to_string()]
        );
    }

    #[test]
    fn test_partial_logger_only_receives_overridden_severity() {
        struct ErrorsOnly(Mutex<Vec<String>>);

        impl Writer for ErrorsOnly {
            fn error(&self, text: &str) {
                self.0.lock().unwrap().push(text.to_string());
            }
        }

        let logger = Arc::new(ErrorsOnly(Mutex::new(Vec::new())));
        let hub = WriterHub::new(Some(logger.clone()), PrintMode::Default);

        // Falls through to the console writer
        hub.message("not captured");
        hub.error("captured");

        assert_eq!(*logger.0.lock().unwrap(), vec!["captured".to_string()]);
    }

    #[test]
    fn test_print_mode_from_str() {
        assert_eq!("html".parse::<PrintMode>().unwrap(), PrintMode::Html);
        assert_eq!("HTML".parse::<PrintMode>().unwrap(), PrintMode::Html);
        assert_eq!("default".parse::<PrintMode>().unwrap(), PrintMode::Default);
        assert!("pdf".parse::<PrintMode>().is_err());
    }

    #[test]
    fn test_recording_writer_counts() {
        let recorder = RecordingWriter::new();
        recorder.warning("a");
        recorder.warning("b");
        recorder.success("c");
        assert_eq!(recorder.count(Severity::Warning), 2);
        assert_eq!(recorder.count(Severity::Success), 1);
        assert_eq!(recorder.count(Severity::Error), 0);
    }
}
