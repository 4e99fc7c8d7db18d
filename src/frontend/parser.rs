//! Builds the node graph directly from tokens. There is no syntax tree: each
//! statement and expression is turned into nodes as soon as it is read, and
//! every new node is peepholed on the spot.

use crate::{
    diagnostics::{report_error, CompileError, Diagnostics},
    driver::{CompileOptions, Limits},
    frontend::{
        intern::Interner,
        lexer::{Keyword, Lexer, Span, Token, TokenKind},
        routine::collect_routines,
        SourceFile,
    },
    middle::{
        graph::{
            BinaryOperator, Graph, NodeId, NodeKind, UnaryOperator, ARG_PROJECTION,
            CONTROL_PROJECTION, FALSE_PROJECTION, TRUE_PROJECTION,
        },
        pretty_print::render_bindings,
        scope::{Scope, ScopeError},
    },
};

/// The only type a declaration accepts for now
const INTEGER_TYPE_NAME: &str = "s32";
const ENTRY_POINT_NAME: &str = "Main";

/// The graph of one routine body. `start`, `end` and `arg` are held alive by
/// the body itself.
#[derive(Debug)]
pub struct RoutineBody {
    pub graph: Graph,
    pub start: NodeId,
    pub end: NodeId,
    pub arg: NodeId,
}

#[derive(Debug)]
pub struct Routine {
    pub name: String,
    pub body: RoutineBody,
}

#[derive(Debug, Default)]
pub struct Program {
    /// Routines with a body, in source order
    pub routines: Vec<Routine>,
}

impl Program {
    pub fn entry_point(&self) -> Option<&Routine> {
        self.routines
            .iter()
            .find(|routine| routine.name == ENTRY_POINT_NAME)
    }
}

/// Result of [`parse_statements`]: the top level bindings are kept (each
/// holding a reference) so their final values can be inspected.
#[derive(Debug)]
pub struct Statements {
    pub body: RoutineBody,
    pub bindings: Vec<(String, NodeId)>,
}

impl Statements {
    pub fn binding(&self, name: &str) -> Option<NodeId> {
        self.bindings
            .iter()
            .rev()
            .find(|(binding, _)| binding == name)
            .map(|&(_, value)| value)
    }
}

pub struct Parser<'source, 'ctx> {
    lexer: Lexer<'source>,
    interner: &'ctx mut Interner,
    diagnostics: &'ctx mut Diagnostics,
    graph: Graph,
    scope: Scope,
    start: NodeId,
    end: NodeId,
    arg: NodeId,
    /// Last control node, holding one reference
    control: NodeId,
    dump_ir: bool,
    node_limit_reported: bool,
    binding_limit_reported: bool,
}

/// Parses every routine in `source` into its own graph
pub fn parse_program(source: &SourceFile, options: &CompileOptions) -> (Program, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut interner = Interner::new();

    let table = collect_routines(
        source,
        &mut interner,
        &mut diagnostics,
        options.limits.max_routines,
    );

    let mut program = Program::default();

    for (_, definition) in table.iter() {
        if let Some(type_span) = definition.type_span {
            let type_name = source.value_of_span(type_span);

            if type_name != INTEGER_TYPE_NAME {
                report_error!(
                    diagnostics,
                    type_span,
                    CompileError::UnknownType(type_name.to_owned())
                );
            }
        }

        let Some(lexer) = definition.body else {
            continue;
        };

        let name = interner.resolve(definition.name).to_owned();
        log::debug!("parsing routine `{name}`");

        let mut parser = Parser::new(lexer, &mut interner, &mut diagnostics, options);
        parser.parse_block();
        let (body, _) = parser.finish(false);

        program.routines.push(Routine { name, body });
    }

    if program.entry_point().is_none() {
        report_error!(
            diagnostics,
            Span::new(0, 0),
            CompileError::MissingEntryPoint
        );
    }

    (program, diagnostics)
}

/// Parses a bare list of statements, as if it were the body of a routine
pub fn parse_statements(source: &SourceFile, options: &CompileOptions) -> (Statements, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut interner = Interner::new();

    let mut parser = Parser::new(Lexer::new(source), &mut interner, &mut diagnostics, options);

    while parser.lexer.has_more() {
        if parser.peek().kind == TokenKind::CloseBrace {
            let token = parser.lexer.next();
            parser.unexpected(token, "statement");
            continue;
        }

        parser.parse_statement();
    }

    let (body, bindings) = parser.finish(true);

    (Statements { body, bindings }, diagnostics)
}

impl<'source, 'ctx> Parser<'source, 'ctx> {
    pub fn new(
        lexer: Lexer<'source>,
        interner: &'ctx mut Interner,
        diagnostics: &'ctx mut Diagnostics,
        options: &CompileOptions,
    ) -> Self {
        let Limits {
            max_nodes,
            max_bindings,
            ..
        } = options.limits;

        let mut graph = Graph::with_limit(max_nodes);

        let start = graph.create(NodeKind::Start);
        graph.add_reference(start);

        let end = graph.create(NodeKind::End { control: None });
        graph.add_reference(end);

        let control = graph.create_labeled(
            NodeKind::Projection {
                source: start,
                index: CONTROL_PROJECTION,
            },
            "ctrl",
        );
        let control = graph.peephole(control);
        graph.add_reference(control);

        let arg = graph.create_labeled(
            NodeKind::Projection {
                source: start,
                index: ARG_PROJECTION,
            },
            "arg",
        );
        let arg = graph.peephole(arg);
        graph.add_reference(arg);

        let mut parser = Self {
            lexer,
            interner,
            diagnostics,
            graph,
            scope: Scope::new(max_bindings),
            start,
            end,
            arg,
            control,
            dump_ir: options.dump_ir,
            node_limit_reported: false,
            binding_limit_reported: false,
        };

        parser.scope.enter_block();
        let name = parser.interner.intern("arg");
        if let Err(error) = parser.scope.declare(&mut parser.graph, name, arg) {
            parser.scope_error(error, Span::new(0, 0), "arg");
        }

        parser
    }

    /// Wires the last control node into `End` and releases everything not
    /// reachable from it
    fn finish(mut self, keep_bindings: bool) -> (RoutineBody, Vec<(String, NodeId)>) {
        self.graph.set_control(self.end, self.control);
        self.graph.remove_reference(self.control);

        if self.dump_ir {
            println!(
                "{}",
                render_bindings(&self.graph, self.scope.bindings(), self.interner)
            );
        }

        let mut bindings = Vec::new();
        if keep_bindings {
            for binding in self.scope.bindings() {
                self.graph.add_reference(binding.value);
                bindings.push((
                    self.interner.resolve(binding.name).to_owned(),
                    binding.value,
                ));
            }
        }

        self.scope.clear(&mut self.graph);

        let reachable = self.graph.reachable_from([self.end]);
        let garbage = self
            .graph
            .iter()
            .filter(|(id, node)| node.refs == 0 && !reachable.contains(id))
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        for id in garbage {
            self.graph.kill_if_unused(id);
        }

        let body = RoutineBody {
            graph: self.graph,
            start: self.start,
            end: self.end,
            arg: self.arg,
        };

        (body, bindings)
    }

    fn peek(&self) -> Token {
        self.lexer.peek()
    }

    fn text(&self, token: Token) -> &'source str {
        self.lexer.source().value_of_span(token.span)
    }

    fn unexpected(&mut self, token: Token, expected: &str) {
        let error = match token.kind {
            TokenKind::EndOfStream => CompileError::UnexpectedEof {
                expected: expected.into(),
            },
            _ => CompileError::UnexpectedToken {
                expected: expected.into(),
                found: self.text(token).to_owned(),
            },
        };

        report_error!(self.diagnostics, token.span, error);
    }

    /// Consumes the next token if it is `kind`. Otherwise the error is
    /// reported, nothing is consumed and an `Error` token is returned in its
    /// place.
    fn require(&mut self, kind: TokenKind, expected: &str) -> Token {
        let token = self.peek();

        if token.kind == kind {
            return self.lexer.next();
        }

        self.unexpected(token, expected);

        Token {
            kind: TokenKind::Error,
            span: token.span,
            position: token.position,
        }
    }

    fn scope_error(&mut self, error: ScopeError, span: Span, name: &str) {
        let error = match error {
            ScopeError::Redeclaration => CompileError::Redeclaration(name.to_owned()),
            ScopeError::Undeclared => CompileError::UndeclaredVariable(name.to_owned()),
            ScopeError::LimitExceeded { limit } => {
                if self.binding_limit_reported {
                    return;
                }
                self.binding_limit_reported = true;

                CompileError::CompilationLimitExceeded {
                    what: "bindings",
                    limit,
                }
            }
        };

        report_error!(self.diagnostics, span, error);
    }

    fn peephole(&mut self, id: NodeId, span: Span) -> NodeId {
        let id = self.graph.peephole(id);

        if self.graph.limit_exceeded() && !self.node_limit_reported {
            self.node_limit_reported = true;

            report_error!(
                self.diagnostics,
                span,
                CompileError::CompilationLimitExceeded {
                    what: "nodes",
                    limit: self.graph.max_nodes(),
                }
            );
        }

        id
    }

    fn set_control(&mut self, control: NodeId) {
        self.graph.add_reference(control);
        let old = core::mem::replace(&mut self.control, control);
        self.graph.remove_reference(old);
    }

    // "{" statement* "}"
    fn parse_block(&mut self) {
        self.require(TokenKind::OpenBrace, "opening brace");
        self.scope.enter_block();

        while !matches!(
            self.peek().kind,
            TokenKind::CloseBrace | TokenKind::EndOfStream
        ) {
            self.parse_statement();
        }

        self.require(TokenKind::CloseBrace, "closing brace");
        self.scope.exit_block(&mut self.graph);
    }

    fn parse_statement(&mut self) {
        let token = self.peek();

        match token.kind {
            TokenKind::OpenBrace => self.parse_block(),
            TokenKind::Semicolon => {
                self.lexer.next();
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::Else) => {
                self.lexer.next();
                self.unexpected(token, "statement");
            }
            TokenKind::Keyword(Keyword::Print) => {
                self.lexer.next();
                self.parse_print(token.span);
            }
            TokenKind::Identifier => {
                let mut ahead = self.lexer;
                ahead.next();

                match ahead.peek().kind {
                    TokenKind::Identifier => self.parse_declaration(),
                    TokenKind::Equals => self.parse_assignment(),
                    _ => self.parse_print(token.span),
                }
            }
            _ => self.parse_print(token.span),
        }
    }

    // "print"? expression ";"
    fn parse_print(&mut self, span: Span) {
        let value = self.parse_expression();
        self.require(TokenKind::Semicolon, "semicolon");

        let print = self.graph.create(NodeKind::Print {
            control: self.control,
            value,
        });
        let print = self.peephole(print, span);
        self.set_control(print);
    }

    // type name ( "=" expression )? ";"
    fn parse_declaration(&mut self) {
        let type_token = self.lexer.next();
        let name_token = self.lexer.next();

        let type_name = self.text(type_token);
        if type_name != INTEGER_TYPE_NAME {
            report_error!(
                self.diagnostics,
                type_token.span,
                CompileError::UnknownType(type_name.to_owned())
            );
        }

        let value = match self.peek().kind {
            TokenKind::Equals => {
                self.lexer.next();
                self.parse_expression()
            }
            _ => self.graph.integer(0),
        };

        self.require(TokenKind::Semicolon, "semicolon");

        let name = self.text(name_token);
        let symbol = self.interner.intern(name);

        if let Err(error) = self.scope.declare(&mut self.graph, symbol, value) {
            self.scope_error(error, name_token.span, name);
        }

        self.graph.kill_if_unused(value);
    }

    // name "=" expression ";"
    fn parse_assignment(&mut self) {
        let name_token = self.lexer.next();
        self.lexer.next();

        let value = self.parse_expression();
        self.require(TokenKind::Semicolon, "semicolon");

        let name = self.text(name_token);
        let symbol = self.interner.intern(name);

        if let Err(error) = self.scope.assign(&mut self.graph, symbol, value) {
            self.scope_error(error, name_token.span, name);
        }

        self.graph.kill_if_unused(value);
    }

    // "if" expression block ( "else" ( block | if ) )?
    fn parse_if(&mut self) {
        let keyword = self.lexer.next();
        let predicate = self.parse_expression();

        let branch = self.graph.create(NodeKind::If {
            control: self.control,
            predicate,
        });
        let branch = self.peephole(branch, keyword.span);

        let on_true = self.graph.create_labeled(
            NodeKind::Projection {
                source: branch,
                index: TRUE_PROJECTION,
            },
            "true",
        );
        let on_true = self.peephole(on_true, keyword.span);

        let on_false = self.graph.create_labeled(
            NodeKind::Projection {
                source: branch,
                index: FALSE_PROJECTION,
            },
            "false",
        );
        let on_false = self.peephole(on_false, keyword.span);
        self.graph.add_reference(on_false);

        let before = self.scope.snapshot(&mut self.graph);

        self.set_control(on_true);
        self.parse_block();

        let after_true = self.scope.snapshot(&mut self.graph);
        let true_control = self.control;
        self.graph.add_reference(true_control);

        self.scope.restore(&mut self.graph, &before);
        self.set_control(on_false);
        self.graph.remove_reference(on_false);

        if self.peek().kind == TokenKind::Keyword(Keyword::Else) {
            self.lexer.next();

            match self.peek().kind {
                TokenKind::Keyword(Keyword::If) => self.parse_if(),
                _ => self.parse_block(),
            }
        }

        let region = self.graph.create(NodeKind::Region {
            control: branch,
            on_true: true_control,
            on_false: self.control,
        });
        let region = self.peephole(region, keyword.span);

        // the region must be held before merging: a phi that folds away
        // would otherwise take it down with it
        self.set_control(region);
        self.graph.remove_reference(true_control);

        self.scope.merge(&mut self.graph, region, &after_true);
        self.scope.release_snapshot(&mut self.graph, before);
        self.scope.release_snapshot(&mut self.graph, after_true);
    }

    fn parse_expression(&mut self) -> NodeId {
        self.parse_comparison()
    }

    // additive ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" ) comparison )?
    fn parse_comparison(&mut self) -> NodeId {
        let lhs = self.parse_additive();

        let operator = self.peek();
        if !operator.kind.is_comparison_operator() {
            return lhs;
        }
        self.lexer.next();

        self.graph.keep(lhs);
        let rhs = self.parse_comparison();
        self.graph.unkeep(lhs);

        let node = match operator.kind {
            TokenKind::DoubleEquals => self.graph.equal(lhs, rhs),
            TokenKind::NotEquals => self.graph.not_equal(lhs, rhs),
            TokenKind::LessThan => self.graph.less_than(lhs, rhs),
            TokenKind::LessThanOrEqualTo => self.graph.less_equal(lhs, rhs),
            TokenKind::GreaterThan => self.graph.less_than(rhs, lhs),
            TokenKind::GreaterThanOrEqualTo => self.graph.less_equal(rhs, lhs),
            _ => unreachable!("not a comparison operator: {:?}", operator.kind),
        };

        self.peephole(node, operator.span)
    }

    // multiplicative ( ( "+" | "-" ) multiplicative )*
    fn parse_additive(&mut self) -> NodeId {
        let mut lhs = self.parse_multiplicative();

        while self.peek().kind.is_term_operator() {
            let operator = self.lexer.next();

            self.graph.keep(lhs);
            let rhs = self.parse_multiplicative();
            self.graph.unkeep(lhs);

            let operator_kind = match operator.kind {
                TokenKind::Plus => BinaryOperator::Add,
                _ => BinaryOperator::Sub,
            };

            let node = self.graph.binary(operator_kind, lhs, rhs);
            lhs = self.peephole(node, operator.span);
        }

        lhs
    }

    // unary ( ( "*" | "/" ) unary )*
    fn parse_multiplicative(&mut self) -> NodeId {
        let mut lhs = self.parse_unary();

        while self.peek().kind.is_factor_operator() {
            let operator = self.lexer.next();

            self.graph.keep(lhs);
            let rhs = self.parse_unary();
            self.graph.unkeep(lhs);

            let operator_kind = match operator.kind {
                TokenKind::Asterisk => BinaryOperator::Mul,
                _ => BinaryOperator::Div,
            };

            if operator_kind == BinaryOperator::Div && self.graph.ty(rhs).as_constant() == Some(0) {
                report_error!(
                    self.diagnostics,
                    operator.span,
                    CompileError::DivisionByZero
                );
            }

            let node = self.graph.binary(operator_kind, lhs, rhs);
            lhs = self.peephole(node, operator.span);
        }

        lhs
    }

    // ( "-" | "!" ) unary | primary
    fn parse_unary(&mut self) -> NodeId {
        let token = self.peek();

        if !token.kind.is_unary_operator() {
            return self.parse_primary();
        }
        self.lexer.next();

        let operand = self.parse_unary();
        let operator = match token.kind {
            TokenKind::Minus => UnaryOperator::Negate,
            _ => UnaryOperator::Not,
        };

        let node = self.graph.unary(operator, operand);
        self.peephole(node, token.span)
    }

    // NUMBER | IDENT | "(" expression ")"
    fn parse_primary(&mut self) -> NodeId {
        let token = self.peek();

        let error = match token.kind {
            TokenKind::Number => {
                self.lexer.next();

                let text = self.text(token);
                match text.parse::<i32>() {
                    Ok(value) => return self.graph.integer(value),
                    Err(_) => CompileError::IntegerOutOfRange(text.to_owned()),
                }
            }
            TokenKind::Identifier => {
                self.lexer.next();

                let name = self.text(token);
                let value = self
                    .interner
                    .get(name)
                    .and_then(|symbol| self.scope.lookup(symbol));

                match value {
                    Some(value) => return value,
                    None => CompileError::UndeclaredVariable(name.to_owned()),
                }
            }
            TokenKind::OpenParen => {
                self.lexer.next();

                let value = self.parse_expression();
                self.require(TokenKind::CloseParen, "closing paren");
                return value;
            }
            TokenKind::String => {
                self.lexer.next();
                CompileError::StringsUnsupported
            }
            TokenKind::UnterminatedString => {
                self.lexer.next();
                CompileError::UnterminatedString
            }
            TokenKind::Unknown => {
                self.lexer.next();
                CompileError::UnexpectedCharacter(self.text(token).chars().next().unwrap_or('?'))
            }
            TokenKind::EndOfStream => CompileError::UnexpectedEof {
                expected: "expression".into(),
            },
            // Leave terminators for the enclosing statement or block
            TokenKind::Semicolon | TokenKind::CloseBrace => {
                CompileError::InvalidExpression(self.text(token).to_owned())
            }
            _ => {
                self.lexer.next();
                CompileError::InvalidExpression(self.text(token).to_owned())
            }
        };

        report_error!(self.diagnostics, token.span, error);

        // stand-in so building can carry on
        self.graph.integer(0)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::middle::ty::Type;

    fn statements(source: &str) -> (Statements, Diagnostics) {
        parse_statements(&SourceFile::in_memory(source), &CompileOptions::default())
    }

    fn errors(diagnostics: &Diagnostics) -> Vec<CompileError> {
        diagnostics.errors().cloned().collect()
    }

    #[test]
    fn comparisons_are_right_recursive_and_flip_greater() {
        let (parsed, diagnostics) = statements("s32 a = arg > 3;");
        let graph = &parsed.body.graph;

        assert!(diagnostics.is_empty());

        let a = parsed.binding("a").unwrap();
        let NodeKind::Binary { operator, lhs, rhs } = graph.kind(a) else {
            panic!("expected a comparison");
        };
        assert_eq!(operator, BinaryOperator::LessThan);
        assert_eq!(graph.ty(lhs), Type::integer(3));
        assert_eq!(rhs, parsed.body.arg);
    }

    #[test]
    fn arithmetic_is_left_associative() {
        let (parsed, _) = statements("s32 a = 10 - 4 - 3; s32 b = 100 / 10 / 5;");
        let graph = &parsed.body.graph;

        assert_eq!(graph.ty(parsed.binding("a").unwrap()), Type::integer(3));
        assert_eq!(graph.ty(parsed.binding("b").unwrap()), Type::integer(2));
    }

    #[test]
    fn precedence() {
        let (parsed, _) = statements("s32 a = 1 + 2 * 3 == 7; s32 b = -(1 + 2) * !0;");
        let graph = &parsed.body.graph;

        assert_eq!(graph.ty(parsed.binding("a").unwrap()), Type::integer(1));
        assert_eq!(graph.ty(parsed.binding("b").unwrap()), Type::integer(-3));
    }

    #[test]
    fn declarations_default_to_zero() {
        let (parsed, diagnostics) = statements("s32 a;");

        assert!(diagnostics.is_empty());
        assert_eq!(
            parsed.body.graph.ty(parsed.binding("a").unwrap()),
            Type::integer(0)
        );
    }

    #[test]
    fn statements_chain_control() {
        let (parsed, diagnostics) = statements("print 1; 2;");
        let graph = &parsed.body.graph;

        assert!(diagnostics.is_empty());

        let NodeKind::End {
            control: Some(last),
        } = graph.kind(parsed.body.end)
        else {
            panic!("end is not wired");
        };
        let NodeKind::Print { control, value } = graph.kind(last) else {
            panic!("expected a print");
        };
        assert_eq!(graph.ty(value), Type::integer(2));
        assert!(matches!(graph.kind(control), NodeKind::Print { .. }));
    }

    #[test]
    fn errors_are_collected_and_parsing_continues() {
        let (parsed, diagnostics) = statements(indoc! {"
            s32 a = y;
            u8 b = 1;
            s32 c = 99999999999;
            s32 d = 1 / 0;
            s32 e = 4
            s32 f = 5;
        "});

        assert_eq!(
            errors(&diagnostics),
            vec![
                CompileError::UndeclaredVariable("y".into()),
                CompileError::UnknownType("u8".into()),
                CompileError::IntegerOutOfRange("99999999999".into()),
                CompileError::DivisionByZero,
                CompileError::UnexpectedToken {
                    expected: "semicolon".into(),
                    found: "s32".into(),
                },
            ]
        );
        assert!(parsed.binding("f").is_some());
    }

    #[test]
    fn assignment_to_undeclared_names_is_reported() {
        let (_, diagnostics) = statements("x = 1;");

        assert_eq!(
            errors(&diagnostics),
            vec![CompileError::UndeclaredVariable("x".into())]
        );
    }

    #[test]
    fn block_bindings_do_not_escape() {
        let (parsed, diagnostics) = statements("s32 a = 1; { s32 a = 2; a = 3; } print a;");
        let graph = &parsed.body.graph;

        assert!(diagnostics.is_empty());
        assert_eq!(graph.ty(parsed.binding("a").unwrap()), Type::integer(1));
        assert!(!graph.iter().any(|(_, node)| node.ty == Type::integer(3)));
    }

    #[test]
    fn one_armed_if_merges_with_the_old_value() {
        let (parsed, diagnostics) = statements("s32 x = 1; if (arg) { x = 2; } print x;");
        let graph = &parsed.body.graph;

        assert!(diagnostics.is_empty());

        let x = parsed.binding("x").unwrap();
        let NodeKind::Phi {
            region,
            on_true,
            on_false,
        } = graph.kind(x)
        else {
            panic!("expected a phi");
        };
        assert!(matches!(graph.kind(region), NodeKind::Region { .. }));
        assert_eq!(graph.ty(on_true), Type::integer(2));
        assert_eq!(graph.ty(on_false), Type::integer(1));
    }

    #[test]
    fn else_if_chains_nest_regions() {
        let (parsed, diagnostics) = statements(indoc! {"
            s32 x = 0;
            if (arg == 1) { x = 10; } else if (arg == 2) { x = 20; } else { x = 30; }
            print x;
        "});
        let graph = &parsed.body.graph;

        assert!(diagnostics.is_empty());

        let x = parsed.binding("x").unwrap();
        let NodeKind::Phi { on_false, .. } = graph.kind(x) else {
            panic!("expected a phi");
        };
        assert!(matches!(graph.kind(on_false), NodeKind::Phi { .. }));
    }

    #[test]
    fn stray_tokens_do_not_stall_the_parser() {
        let (parsed, diagnostics) = statements("} else ) print 1;");

        // `)` is both an invalid expression and a missing semicolon
        assert_eq!(diagnostics.len(), 4);
        assert!(matches!(
            parsed.body.graph.kind(parsed.body.end),
            NodeKind::End { control: Some(_) }
        ));
    }

    #[test]
    fn program_routines_get_their_own_graphs() {
        let source = SourceFile::in_memory(indoc! {"
            s32 Main() { print 1; }
            Helper() { s32 a = arg * 2; print a; }
        "});
        let (program, diagnostics) = parse_program(&source, &CompileOptions::default());

        assert!(diagnostics.is_empty());
        assert_eq!(program.routines.len(), 2);
        assert_eq!(program.entry_point().unwrap().name, "Main");
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let source = SourceFile::in_memory("Helper() { print 1; }");
        let (_, diagnostics) = parse_program(&source, &CompileOptions::default());

        assert_eq!(errors(&diagnostics), vec![CompileError::MissingEntryPoint]);
    }

    #[test]
    fn node_limit_is_reported_once() {
        let mut options = CompileOptions::default();
        options.limits.max_nodes = 8;

        let (_, diagnostics) = parse_statements(
            &SourceFile::in_memory("print arg + 1; print arg + 2; print arg + 3; print arg + 4;"),
            &options,
        );

        assert_eq!(
            errors(&diagnostics),
            vec![CompileError::CompilationLimitExceeded {
                what: "nodes",
                limit: 8
            }]
        );
    }
}
