//! Diagnostic sink — the operator-facing repair log.
//!
//! Append-only, ordered text lines. Never parsed back. A failing sink
//! must not abort a repair pass, so writes are infallible here and
//! errors are reported through `tracing`.

use std::io::Write;

use tracing::warn;

pub trait DiagnosticSink {
    fn line(&mut self, line: &str);

    fn blank(&mut self) {
        self.line("");
    }
}

/// Sink over any writer: stdout, a log file, a buffer.
pub struct WriterSink<W: Write> {
    writer: W,
    failed: bool,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DiagnosticSink for WriterSink<W> {
    fn line(&mut self, line: &str) {
        let result = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush());
        if let Err(e) = result {
            // Warn once, keep trying: the next line may succeed.
            if !self.failed {
                warn!(error = %e, "diagnostic log write failed");
            }
            self.failed = true;
        }
    }
}

/// Collects lines in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

impl DiagnosticSink for MemorySink {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn line(&mut self, line: &str) {
        (**self).line(line);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Box<S> {
    fn line(&mut self, line: &str) {
        (**self).line(line);
    }
}
