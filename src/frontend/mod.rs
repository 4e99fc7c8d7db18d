use std::path::PathBuf;

use colored::Colorize;

use self::lexer::Span;

pub mod intern;
pub mod lexer;
pub mod parser;
pub mod routine;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

/// A 1-based line and column inside of a [`SourceFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const START: Self = Self { line: 1, column: 1 };
}

impl SourceFile {
    pub fn in_memory(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            origin: SourceFileOrigin::Memory,
        }
    }

    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// Columns count characters, not bytes
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = self.clamp_offset(offset);
        let before = &self.contents[..offset];

        let line = before.bytes().filter(|b| *b == b'\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);

        Position {
            line: line as _,
            column: (before[line_start..].chars().count() + 1) as _,
        }
    }

    /// Rounds an offset down onto a character boundary inside the file
    fn clamp_offset(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.contents.len());
        while !self.contents.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }

    /// The line containing the span, followed by a line underlining the
    /// offending characters
    pub fn render_highlight(&self, span: Span) -> String {
        let start = self.clamp_offset(span.start);
        let line_start = self.contents[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = self.contents[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(self.contents.len());
        let end = self.clamp_offset(span.end).clamp(start, line_end);

        let line = &self.contents[line_start..line_end];
        let padding = self.contents[line_start..start].chars().count();
        let width = self.contents[start..end].chars().count().max(1);
        let gutter = self.position_of(start).line.to_string();

        format!(
            "{} {}\n{} {}{}",
            format!("{gutter} |").blue(),
            line,
            format!("{} |", " ".repeat(gutter.len())).blue(),
            " ".repeat(padding),
            "^".repeat(width).red()
        )
    }

    pub fn highlight_span(&self, span: Span) {
        eprintln!("{}", self.render_highlight(span));
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}
