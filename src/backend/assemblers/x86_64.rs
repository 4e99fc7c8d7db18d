use crate::{index::Index, middle::graph::NodeId};

/// Every value is an `s32` and gets one dword of the stack frame, addressed
/// by the slot of the node that produces it
const SLOT_SIZE: usize = 4;

pub fn slot_offset(node: NodeId) -> usize {
    SLOT_SIZE * (node.slot().index() + 1)
}

/// Frame size covering `slot_count` node slots, kept 16 byte aligned
pub fn stack_frame_size(slot_count: usize) -> usize {
    (SLOT_SIZE * slot_count).next_multiple_of(16)
}

#[derive(Debug, Default)]
pub struct Assembler {
    output: String,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_output(self) -> String {
        self.output
    }

    fn push_line(&mut self, string: impl AsRef<str>) {
        self.output.push_str(string.as_ref());
        self.output.push('\n');
    }

    pub fn emit(&mut self, string: impl AsRef<str>) {
        self.output.push_str("    ");
        self.push_line(string);
    }

    pub fn global_label(&mut self, name: &str) {
        self.push_line(format!("global {name}"));
        self.push_line(format!("{name}:"));
    }

    pub fn label(&mut self, name: impl AsRef<str>) {
        self.push_line(format!("{}:", name.as_ref()));
    }

    pub fn comment(&mut self, comment: impl AsRef<str>) {
        self.emit(format!("; {}", comment.as_ref()));
    }

    pub fn function_prologue(&mut self, stack_frame_size: usize) {
        self.emit("push rbp");
        self.emit("mov rbp, rsp");
        self.emit(format!("sub rsp, {stack_frame_size}"));
    }

    pub fn function_epilogue(&mut self) {
        self.push_line(".exit:");
        self.emit("xor eax, eax");
        self.emit("mov rsp, rbp");
        self.emit("pop rbp");
        self.emit("ret");
    }

    pub fn load_immediate(&mut self, destination: X86FullRegister, value: i32) {
        self.emit(format!("mov {}, {value}", destination.as_32_bit()));
    }

    pub fn load_slot(&mut self, destination: X86FullRegister, node: NodeId) {
        self.emit(format!(
            "mov {}, dword [rbp - {}]",
            destination.as_32_bit(),
            slot_offset(node)
        ));
    }

    pub fn store_slot(&mut self, node: NodeId, source: X86FullRegister) {
        self.emit(format!(
            "mov dword [rbp - {}], {}",
            slot_offset(node),
            source.as_32_bit()
        ));
    }
}

/// General Purpose Register 64-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum X86FullRegister {
    Rax,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
}

impl X86FullRegister {
    pub fn as_32_bit(self) -> X86Register {
        match self {
            Self::Rax => X86Register::Eax,
            Self::Rcx => X86Register::Ecx,
            Self::Rdx => X86Register::Edx,
            Self::Rsi => X86Register::Esi,
            Self::Rdi => X86Register::Edi,
            Self::Rbp => X86Register::Ebp,
            Self::Rsp => X86Register::Esp,
        }
    }

    pub fn as_8_bit(self) -> X86Register {
        match self {
            Self::Rax => X86Register::Al,
            Self::Rcx => X86Register::Cl,
            Self::Rdx => X86Register::Dl,
            Self::Rsi => X86Register::Sil,
            Self::Rdi => X86Register::Dil,
            Self::Rbp => X86Register::Bpl,
            Self::Rsp => X86Register::Spl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[rustfmt::skip]
pub enum X86Register {
    // 32-bit
    Eax, Ecx, Edx,
    Esi, Edi, Ebp, Esp,

    // 8-bit low
    Al, Cl, Dl,
    Sil, Dil, Bpl, Spl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_render_lowercase() {
        assert_eq!(X86FullRegister::Rax.to_string(), "rax");
        assert_eq!(X86FullRegister::Rdi.as_32_bit().to_string(), "edi");
        assert_eq!(X86FullRegister::Rax.as_8_bit().to_string(), "al");
    }

    #[test]
    fn frames_are_aligned() {
        assert_eq!(stack_frame_size(0), 0);
        assert_eq!(stack_frame_size(1), 16);
        assert_eq!(stack_frame_size(5), 32);
    }

    #[test]
    fn prologue_and_epilogue() {
        let mut assembler = Assembler::new();

        assembler.function_prologue(16);
        assembler.function_epilogue();

        assert_eq!(
            assembler.into_output(),
            "    push rbp\n    mov rbp, rsp\n    sub rsp, 16\n.exit:\n    xor eax, eax\n    mov rsp, rbp\n    pop rbp\n    ret\n"
        );
    }
}
