use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use super::Event;

/// Streams events from a JSON-lines source, one event per line.
///
/// Blank lines are skipped. A line that fails to parse yields an error
/// carrying its line number; iteration can continue past it. A read error
/// is yielded once and ends the stream.
pub struct EventReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    failed: bool,
}

impl EventReader<BufReader<File>> {
    /// Opens a JSON-lines event file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening event file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(
                        Err(e).with_context(|| format!("reading event line {}", self.line_no)),
                    )
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str(&line)
                    .with_context(|| format!("parsing event line {}", self.line_no)),
            );
        }
    }
}
