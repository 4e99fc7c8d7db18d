//! `metac` compiles a small imperative language to x86-64 assembly. Source
//! is parsed straight into a sea-of-nodes graph which is optimized while it
//! is being built, then lowered to NASM.

pub mod backend;
pub mod diagnostics;
pub mod driver;
pub mod frontend;
pub mod index;
pub mod middle;
