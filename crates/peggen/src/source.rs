use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;

/// One-based line and column of a byte offset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// A grammar file: its name, contents, and a precomputed table of
/// line-start byte offsets used to project offsets to line/column pairs.
pub struct Source {
    pub file_name: String,
    pub contents: String,
    line_starts: Vec<u32>,
}

impl Source {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Source {
        let contents = contents.into();
        assert!(contents.len() <= u32::MAX as usize);
        Source {
            file_name: file_name.into(),
            line_starts: calculate_line_starts(&contents),
            contents,
        }
    }

    /// Reads the grammar from `path`, or from stdin when `path` is `-`.
    /// The contents are interpreted as UTF-8; invalid sequences are replaced.
    pub fn load(path: &Path) -> std::io::Result<Source> {
        let mut bytes = Vec::new();
        if path.as_os_str() == "-" {
            std::io::stdin().lock().read_to_end(&mut bytes)?;
        } else {
            bytes = std::fs::read(path)?;
        }
        let contents = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Ok(Source::new(path.display().to_string(), contents))
    }

    pub fn line_col(&self, offset: u32) -> LineCol {
        let line_index = self.line_starts.partition_point(|&start| start <= offset) - 1;
        LineCol {
            line: line_index as u32 + 1,
            column: offset - self.line_starts[line_index] + 1,
        }
    }

    /// `<file>:<line>:<column>` for diagnostics.
    pub fn location_string(&self, offset: u32) -> String {
        let LineCol { line, column } = self.line_col(offset);
        let mut out = String::new();
        _ = write!(out, "{}:{}:{}", self.file_name, line, column);
        out
    }
}

/// Byte offsets at which each line begins. CR, LF, and CR+LF all
/// terminate a line; CR+LF counts once.
fn calculate_line_starts(text: &str) -> Vec<u32> {
    let mut starts = vec![0];
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                starts.push(i as u32 + 1);
            }
            b'\n' => starts.push(i as u32 + 1),
            _ => {}
        }
        i += 1;
    }
    starts
}
