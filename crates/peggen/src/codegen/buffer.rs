//! Structured output buffer. The emitter writes logical lines with an
//! explicit indent level; spliced user code bypasses indentation and is
//! bracketed by `#line` directives, first pointing into the grammar
//! file and afterwards re-syncing to the generated file. The final
//! rendering uses a fixed four-space indent.

use super::escape::escape_string;

const INDENT: &str = "    ";

enum Line {
    Code { indent: u32, text: String },
    Verbatim(String),
    /// `#line <line> "<grammar file>"`
    Directive { line: u32, file: String },
    /// `#line` back to the generated file; the number is only known
    /// when rendering.
    Resync,
}

pub struct CodeBuf {
    lines: Vec<Line>,
    level: u32,
}

impl CodeBuf {
    pub fn new() -> CodeBuf {
        CodeBuf {
            lines: Vec::new(),
            level: 0,
        }
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        assert!(self.level > 0);
        self.level -= 1;
    }

    /// Appends one or more lines at the current level. Leading
    /// four-space groups on each line add one level each, so nested
    /// templates can be written the way they will read.
    pub fn push(&mut self, text: &str) {
        for mut line in text.split('\n') {
            let mut extra = 0;
            while let Some(rest) = line.strip_prefix(INDENT) {
                line = rest;
                extra += 1;
            }
            self.lines.push(Line::Code {
                indent: if line.is_empty() { 0 } else { self.level + extra },
                text: line.to_owned(),
            });
        }
    }

    pub fn blank(&mut self) {
        self.lines.push(Line::Code {
            indent: 0,
            text: String::new(),
        });
    }

    /// Lines emitted exactly as given, untouched by indentation.
    pub fn verbatim(&mut self, text: &str) {
        for line in text.split('\n') {
            self.lines.push(Line::Verbatim(line.to_owned()));
        }
    }

    /// Splices user code: a `#line` directive pointing at its position
    /// in the grammar, the code itself shifted to its original column,
    /// then a directive re-syncing diagnostics to the generated file.
    pub fn user_code(&mut self, code: &str, file: &str, line: u32, column: u32) {
        self.lines.push(Line::Directive {
            line,
            file: file.to_owned(),
        });
        let mut shifted = String::new();
        for _ in 1..column {
            shifted.push(' ');
        }
        shifted.push_str(code);
        self.verbatim(&shifted);
        self.lines.push(Line::Resync);
    }

    pub fn render(&self, output_file: &str) -> String {
        let mut out = String::new();
        let mut line_number = 1u32;
        for line in &self.lines {
            match line {
                Line::Code { indent, text } => {
                    for _ in 0..*indent {
                        out.push_str(INDENT);
                    }
                    out.push_str(text);
                }
                Line::Verbatim(text) => out.push_str(text),
                Line::Directive { line, file } => {
                    out.push_str(&format!("#line {} \"{}\"", line, escape_string(file)));
                }
                Line::Resync => {
                    out.push_str(&format!(
                        "#line {} \"{}\"",
                        line_number + 1,
                        escape_string(output_file)
                    ));
                }
            }
            out.push('\n');
            line_number += 1;
        }
        out
    }
}
