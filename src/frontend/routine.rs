//! First pass over a source file: finds every top level routine and where
//! its body starts, without looking inside the bodies.

use hashbrown::HashMap;

use crate::{
    diagnostics::{report_error, CompileError, Diagnostics},
    frontend::{
        intern::{Interner, Symbol},
        lexer::{Lexer, Span, Token, TokenKind},
        SourceFile,
    },
    index::{simple_index, IndexVec},
};

simple_index! {
    pub struct RoutineId;
}

#[derive(Debug, Clone, Copy)]
pub struct RoutineDefinition<'source> {
    /// Declared return type, if any: `s32 Main() {}`
    pub type_span: Option<Span>,
    pub name: Symbol,
    pub name_span: Span,
    /// Lexer positioned on the opening brace of the body
    pub body: Option<Lexer<'source>>,
}

#[derive(Debug, Default)]
pub struct RoutineTable<'source> {
    definitions: IndexVec<RoutineId, RoutineDefinition<'source>>,
    by_name: HashMap<Symbol, RoutineId>,
}

impl<'source> RoutineTable<'source> {
    pub fn new() -> Self {
        Self {
            definitions: IndexVec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn lookup(&self, name: Symbol) -> Option<RoutineId> {
        self.by_name.get(&name).copied()
    }

    pub fn get(&self, id: RoutineId) -> &RoutineDefinition<'source> {
        &self.definitions[id]
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in source order
    pub fn iter(&self) -> impl Iterator<Item = (RoutineId, &RoutineDefinition<'source>)> {
        self.definitions.enumerate()
    }
}

/// Consumes tokens up to and including the `close` matching the already
/// consumed `open`. Returns false if the stream ended first.
fn skip_balanced(lexer: &mut Lexer, open: TokenKind, close: TokenKind) -> bool {
    let mut depth = 1usize;

    loop {
        let token = lexer.next();

        match token.kind {
            TokenKind::EndOfStream => return false,
            kind if kind == open => depth += 1,
            kind if kind == close => {
                depth -= 1;

                if depth == 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
}

fn describe(source: &SourceFile, token: Token) -> String {
    source.value_of_span(token.span).to_owned()
}

/// Scans `[type] name ( ... ) { ... }` signatures. Bodies are skipped with
/// brace matching only; they are parsed later, one routine at a time.
pub fn collect_routines<'source>(
    source: &'source SourceFile,
    interner: &mut Interner,
    diagnostics: &mut Diagnostics,
    max_routines: usize,
) -> RoutineTable<'source> {
    let mut table = RoutineTable::new();
    let mut lexer = Lexer::new(source);
    let mut limit_reported = false;

    loop {
        let token = lexer.next();

        match token.kind {
            TokenKind::EndOfStream => break,
            TokenKind::Identifier => {}
            _ => {
                report_error!(
                    diagnostics,
                    token.span,
                    CompileError::UnexpectedToken {
                        expected: "routine definition".into(),
                        found: describe(source, token),
                    }
                );
                continue;
            }
        }

        let mut type_span = None;
        let mut name_token = token;

        if lexer.peek().kind == TokenKind::Identifier {
            type_span = Some(name_token.span);
            name_token = lexer.next();
        }

        let mut has_parameters = false;
        if lexer.peek().kind == TokenKind::OpenParen {
            let open = lexer.next();
            has_parameters = skip_balanced(&mut lexer, TokenKind::OpenParen, TokenKind::CloseParen);

            if !has_parameters {
                report_error!(
                    diagnostics,
                    open.span,
                    CompileError::UnexpectedEof {
                        expected: "closing paren".into()
                    }
                );
            }
        }

        let mut body = None;
        if has_parameters && lexer.peek().kind == TokenKind::OpenBrace {
            body = Some(lexer);

            let open = lexer.next();
            if !skip_balanced(&mut lexer, TokenKind::OpenBrace, TokenKind::CloseBrace) {
                report_error!(
                    diagnostics,
                    open.span,
                    CompileError::UnexpectedEof {
                        expected: "closing brace".into()
                    }
                );
            }
        }

        let name = interner.intern(source.value_of_span(name_token.span));

        if table.lookup(name).is_some() {
            report_error!(
                diagnostics,
                name_token.span,
                CompileError::DuplicateRoutine(describe(source, name_token))
            );
            continue;
        }

        if table.len() >= max_routines {
            if !limit_reported {
                report_error!(
                    diagnostics,
                    name_token.span,
                    CompileError::CompilationLimitExceeded {
                        what: "routines",
                        limit: max_routines,
                    }
                );
                limit_reported = true;
            }
            continue;
        }

        log::debug!("found routine `{}`", interner.resolve(name));

        let id = table.definitions.push(RoutineDefinition {
            type_span,
            name,
            name_span: name_token.span,
            body,
        });
        table.by_name.insert(name, id);
    }

    table
}
