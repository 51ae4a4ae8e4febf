//! Bounded output capture for one execution.
//!
//! Each stream keeps text in arrival order until it holds `max_lines` lines
//! or `max_bytes` bytes. A line is a `\n`-terminated segment; a trailing
//! partial line counts as a line and may still be continued by later writes.
//! Once a stream hits either cap, everything after the cut is dropped and the
//! stream is flagged truncated. Truncation never fails the execution.

use std::fmt;

use crate::options::ExecutionOptions;

/// Output stream of executed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        })
    }
}

/// Captured output at the end of an execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub stdout: String,
    pub stderr: String,
    /// Either stream was truncated.
    pub truncated: bool,
}

#[derive(Debug)]
struct StreamBuffer {
    text: String,
    lines: usize,
    truncated: bool,
}

impl StreamBuffer {
    fn new() -> Self {
        Self {
            text: String::new(),
            lines: 0,
            truncated: false,
        }
    }

    fn in_partial_line(&self) -> bool {
        !self.text.is_empty() && !self.text.ends_with('\n')
    }

    fn write(&mut self, text: &str, max_lines: usize, max_bytes: usize) {
        if self.truncated {
            return;
        }
        for segment in text.split_inclusive('\n') {
            if !self.in_partial_line() {
                if self.lines >= max_lines {
                    self.truncated = true;
                    return;
                }
                self.lines += 1;
            }

            let room = max_bytes.saturating_sub(self.text.len());
            if segment.len() > room {
                self.text.push_str(&segment[..floor_char_boundary(segment, room)]);
                self.truncated = true;
                return;
            }
            self.text.push_str(segment);
        }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Per-execution stdout/stderr accumulator.
#[derive(Debug)]
pub struct OutputCapture {
    stdout: StreamBuffer,
    stderr: StreamBuffer,
    max_lines: usize,
    max_bytes: usize,
}

impl OutputCapture {
    pub fn new(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            stdout: StreamBuffer::new(),
            stderr: StreamBuffer::new(),
            max_lines,
            max_bytes,
        }
    }

    pub fn from_options(options: &ExecutionOptions) -> Self {
        Self::new(options.max_output_lines, options.max_output_bytes)
    }

    pub fn write(&mut self, stream: Stream, text: &str) {
        let (max_lines, max_bytes) = (self.max_lines, self.max_bytes);
        self.buffer_mut(stream).write(text, max_lines, max_bytes);
    }

    pub fn is_truncated(&self, stream: Stream) -> bool {
        self.buffer(stream).truncated
    }

    /// Lines held for `stream`, counting a trailing partial line.
    pub fn line_count(&self, stream: Stream) -> usize {
        self.buffer(stream).lines
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            stdout: self.stdout.text.clone(),
            stderr: self.stderr.text.clone(),
            truncated: self.stdout.truncated || self.stderr.truncated,
        }
    }

    pub fn into_snapshot(self) -> CaptureSnapshot {
        CaptureSnapshot {
            truncated: self.stdout.truncated || self.stderr.truncated,
            stdout: self.stdout.text,
            stderr: self.stderr.text,
        }
    }

    fn buffer(&self, stream: Stream) -> &StreamBuffer {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    fn buffer_mut(&mut self, stream: Stream) -> &mut StreamBuffer {
        match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        }
    }
}
