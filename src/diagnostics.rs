//! User facing errors. Malformed input never aborts compilation: every
//! problem is recorded as a [`Diagnostic`] and parsing carries on so that as
//! many errors as possible are reported in one run. Defects inside the
//! optimizer itself are panics, not diagnostics.

use colored::Colorize;
use thiserror::Error;

use crate::frontend::{lexer::Span, Position, SourceFile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("expected {expected} but found `{found}`")]
    UnexpectedToken { expected: String, found: String },

    #[error("expected {expected} but reached end of file")]
    UnexpectedEof { expected: String },

    #[error("unexpected character `{0}` in stream")]
    UnexpectedCharacter(char),

    #[error("reached end of line while reading string literal")]
    UnterminatedString,

    #[error("invalid expression starting at `{0}`")]
    InvalidExpression(String),

    #[error("undeclared variable `{0}`")]
    UndeclaredVariable(String),

    #[error("redeclaration of variable `{0}`")]
    Redeclaration(String),

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("integer literal `{0}` does not fit in s32")]
    IntegerOutOfRange(String),

    #[error("division by constant zero")]
    DivisionByZero,

    #[error("routine `{0}` is defined more than once")]
    DuplicateRoutine(String),

    #[error("no entry point: routine `Main` is not defined")]
    MissingEntryPoint,

    #[error("string literals are not supported yet")]
    StringsUnsupported,

    #[error("compilation limit exceeded: more than {limit} {what}")]
    CompilationLimitExceeded { what: &'static str, limit: usize },
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub error: CompileError,
    pub span: Span,
    /// Compiler location which raised the error, only recorded with the
    /// `error-backtrace` feature
    pub raised_at: Option<String>,
}

impl Diagnostic {
    pub fn position(&self, source: &SourceFile) -> Position {
        source.position_of(self.span.start)
    }
}

macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .unwrap_or("<unknown>")
    }};
}

pub(crate) use function;

macro_rules! report_error {
    ($diagnostics:expr, $span:expr, $error:expr $(,)?) => {{
        #[cfg(feature = "error-backtrace")]
        let raised_at = Some(format!(
            "{}::{} (at {}:{}:{})",
            module_path!(),
            $crate::diagnostics::function!(),
            file!(),
            line!(),
            column!()
        ));
        #[cfg(not(feature = "error-backtrace"))]
        let raised_at: Option<String> = None;

        $diagnostics.push($crate::diagnostics::Diagnostic {
            error: $error,
            span: $span,
            raised_at,
        })
    }};
}

pub(crate) use report_error;

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::debug!("diagnostic: {}", diagnostic.error);
        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &CompileError> {
        self.entries.iter().map(|d| &d.error)
    }

    /// Prints every diagnostic to stderr with its source coordinates
    pub fn report(&self, source: &SourceFile) {
        for diagnostic in &self.entries {
            let position = diagnostic.position(source);

            if let Some(raised_at) = &diagnostic.raised_at {
                eprintln!("{}: {}", "backtrace".blue(), raised_at);
            }

            eprintln!(
                "{}: {} {}",
                "error".red(),
                diagnostic.error,
                format!(
                    "(at {}:{}:{})",
                    source.origin, position.line, position.column
                )
                .white()
            );
            source.highlight_span(diagnostic.span);
        }
    }
}
