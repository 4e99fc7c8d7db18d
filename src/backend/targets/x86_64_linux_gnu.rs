use hashbrown::HashSet;
use itertools::Itertools;

use crate::{
    backend::{
        assemblers::x86_64::{stack_frame_size, Assembler, X86FullRegister},
        targets::CodeGenerator,
        CodegenOptions,
    },
    frontend::parser::{Program, Routine},
    index::Index,
    middle::{
        graph::{BinaryOperator, Graph, NodeId, NodeKind, UnaryOperator},
        pretty_print::render_node,
    },
};

pub struct CodeGeneratorX86_64LinuxGnu;

impl CodeGenerator for CodeGeneratorX86_64LinuxGnu {
    fn translate_to_asm(&self, program: &Program, options: &CodegenOptions) -> String {
        let routine_bodies = program
            .routines
            .iter()
            .map(|routine| codegen_routine(routine, options))
            .join("\n");

        format!(
            indoc::indoc! {r#"
            global _start

            bits 64
            section .text

            ; program entrypoint
            _start:
                xor edi, edi
                call {0}

                ; exit syscall using code passed in rax
                mov rdi, rax
                mov rax, 60
                syscall

            ; user code
            {1}
            ; built-in functions
            {2}"#
            },
            routine_label("Main"),
            routine_bodies,
            include_str!("./x86_64-linux-gnu_core.s"),
        )
    }
}

/// `$` keeps routine names from being read as register names or keywords
fn routine_label(name: &str) -> String {
    format!("${name}")
}

fn codegen_routine(routine: &Routine, options: &CodegenOptions) -> String {
    let body = &routine.body;

    let mut emitter = RoutineEmitter {
        assembler: Assembler::new(),
        graph: &body.graph,
        options,
        computed: HashSet::new(),
    };

    emitter
        .assembler
        .global_label(&routine_label(&routine.name));
    emitter
        .assembler
        .function_prologue(stack_frame_size(body.graph.capacity()));

    emitter.comment(body.arg);
    emitter.assembler.store_slot(body.arg, X86FullRegister::Rdi);

    if let NodeKind::End {
        control: Some(last),
    } = body.graph.kind(body.end)
    {
        emitter.emit_sequence(last);
    }

    emitter.assembler.function_epilogue();
    emitter.assembler.into_output()
}

struct RoutineEmitter<'a> {
    assembler: Assembler,
    graph: &'a Graph,
    options: &'a CodegenOptions,
    /// Shared values already stored to their slot in the current straight
    /// line of code
    computed: HashSet<NodeId>,
}

impl RoutineEmitter<'_> {
    fn comment(&mut self, id: NodeId) {
        if self.options.emit_comments {
            self.assembler
                .comment(strip_ansi_escapes::strip_str(render_node(self.graph, id)));
        }
    }

    /// Emits every statement on the control chain ending at `last`. The
    /// chain is walked backwards up to the projection it starts from.
    fn emit_sequence(&mut self, last: NodeId) {
        let mut chain = Vec::new();
        let mut current = last;

        loop {
            current = match self.graph.kind(current) {
                NodeKind::Print { control, .. } => {
                    chain.push(current);
                    control
                }
                NodeKind::Region { control, .. } => {
                    chain.push(current);

                    let NodeKind::If { control, .. } = self.graph.kind(control) else {
                        unreachable!("region {current} is not owned by an if");
                    };
                    control
                }
                _ => break,
            };
        }

        for statement in chain.into_iter().rev() {
            self.computed.clear();

            match self.graph.kind(statement) {
                NodeKind::Print { value, .. } => {
                    self.comment(statement);
                    self.evaluate(value);
                    self.assembler.emit("mov edi, eax");
                    self.assembler.emit("call print_integer");
                    self.assembler.load_immediate(X86FullRegister::Rdi, '\n' as i32);
                    self.assembler.emit("call print_char");
                }
                NodeKind::Region { .. } => self.emit_if(statement),
                kind => unreachable!("{kind:?} is not a statement"),
            }
        }
    }

    fn emit_if(&mut self, region: NodeId) {
        let NodeKind::Region {
            control: branch,
            on_true,
            on_false,
        } = self.graph.kind(region)
        else {
            unreachable!();
        };
        let NodeKind::If { predicate, .. } = self.graph.kind(branch) else {
            unreachable!("region {region} is not owned by an if");
        };

        let phis = self
            .graph
            .iter()
            .filter(|(_, node)| matches!(node.kind, NodeKind::Phi { region: r, .. } if r == region))
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        let label = region.slot().index();

        self.comment(branch);
        self.evaluate(predicate);
        self.assembler.emit("test eax, eax");
        self.assembler.emit(format!("jz .else_{label}"));

        self.emit_sequence(on_true);
        self.emit_phi_moves(&phis, true);
        self.assembler.emit(format!("jmp .end_if_{label}"));

        self.assembler.label(format!(".else_{label}"));
        self.emit_sequence(on_false);
        self.emit_phi_moves(&phis, false);

        self.assembler.label(format!(".end_if_{label}"));
        self.comment(region);
    }

    fn emit_phi_moves(&mut self, phis: &[NodeId], true_side: bool) {
        self.computed.clear();

        for &phi in phis {
            let NodeKind::Phi {
                on_true, on_false, ..
            } = self.graph.kind(phi)
            else {
                unreachable!();
            };

            self.comment(phi);
            self.evaluate(if true_side { on_true } else { on_false });
            self.assembler.store_slot(phi, X86FullRegister::Rax);
        }
    }

    /// Leaves the value of `id` in eax
    fn evaluate(&mut self, id: NodeId) {
        if self.computed.contains(&id) {
            self.assembler.load_slot(X86FullRegister::Rax, id);
            return;
        }

        match self.graph.kind(id) {
            NodeKind::Constant => {
                let value = self.graph.ty(id).as_constant().unwrap_or_default();
                self.assembler.load_immediate(X86FullRegister::Rax, value);
                return;
            }
            NodeKind::Projection { .. } | NodeKind::Phi { .. } => {
                self.assembler.load_slot(X86FullRegister::Rax, id);
                return;
            }
            NodeKind::Unary { operator, operand } => {
                self.evaluate(operand);

                match operator {
                    UnaryOperator::Negate => self.assembler.emit("neg eax"),
                    UnaryOperator::Not => {
                        self.assembler.emit("test eax, eax");
                        self.assembler.emit("sete al");
                        self.assembler.emit("movzx eax, al");
                    }
                }
            }
            NodeKind::Binary { operator, lhs, rhs } => {
                self.evaluate(lhs);
                self.assembler.emit("push rax");
                self.evaluate(rhs);
                self.assembler.emit("mov ecx, eax");
                self.assembler.emit("pop rax");

                let condition = match operator {
                    BinaryOperator::Add => {
                        self.assembler.emit("add eax, ecx");
                        None
                    }
                    BinaryOperator::Sub => {
                        self.assembler.emit("sub eax, ecx");
                        None
                    }
                    BinaryOperator::Mul => {
                        self.assembler.emit("imul eax, ecx");
                        None
                    }
                    BinaryOperator::Div => {
                        self.assembler.emit("cdq");
                        self.assembler.emit("idiv ecx");
                        None
                    }
                    BinaryOperator::Equal => Some("e"),
                    BinaryOperator::NotEqual => Some("ne"),
                    BinaryOperator::LessThan => Some("l"),
                    BinaryOperator::LessEqual => Some("le"),
                };

                if let Some(condition) = condition {
                    self.assembler.emit("cmp eax, ecx");
                    self.assembler.emit(format!("set{condition} al"));
                    self.assembler.emit("movzx eax, al");
                }
            }
            kind => unreachable!("{kind:?} does not produce a value"),
        }

        if self.graph.refs(id) > 1 {
            self.assembler.store_slot(id, X86FullRegister::Rax);
            self.computed.insert(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::CompileOptions,
        frontend::{parser::parse_program, SourceFile},
    };

    fn compile(source: &str) -> String {
        let options = CompileOptions::default();
        let (program, diagnostics) = parse_program(&SourceFile::in_memory(source), &options);
        assert!(diagnostics.is_empty());

        CodeGeneratorX86_64LinuxGnu.translate_to_asm(&program, &options.codegen)
    }

    #[test]
    fn entry_point_and_runtime() {
        let asm = compile("Main() {}");

        assert!(asm.contains("call $Main"));
        assert!(asm.contains("global $Main\n$Main:\n"));
        assert!(asm.contains("print_integer:"));
        assert!(asm.contains("print_string:"));
        assert!(asm.contains("print_char:"));
    }

    #[test]
    fn prints_folded_constants() {
        let asm = compile("Main() { print 2 + 3; }");

        assert!(asm.contains("    mov eax, 5\n    mov edi, eax\n    call print_integer\n"));
        assert!(!asm.contains("add eax, ecx"));
    }

    #[test]
    fn branches_are_structured() {
        let asm = compile("Main() { s32 x = 1; if (arg < 3) { x = 2; } print x; }");

        let jump = asm.find("jz .else_").unwrap();
        let else_label = asm.find("\n.else_").unwrap();
        let end_label = asm.find("\n.end_if_").unwrap();
        let print = asm.find("call print_integer").unwrap();

        assert!(jump < else_label && else_label < end_label && end_label < print);
        assert!(asm.contains("setl al"));
        // one phi move per arm
        assert_eq!(asm.matches("phi(").count(), 2);
    }

    #[test]
    fn comments_can_be_disabled() {
        let mut options = CompileOptions::default();
        options.codegen.emit_comments = false;

        let (program, _) = parse_program(&SourceFile::in_memory("Main() { print arg; }"), &options);
        let asm = CodeGeneratorX86_64LinuxGnu.translate_to_asm(&program, &options.codegen);

        assert!(!asm.contains("; %"));
        assert!(!asm.contains('\u{1b}'));
    }
}
