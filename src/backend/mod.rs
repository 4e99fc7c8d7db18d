//! The backend lowers finished routine graphs to textual assembly. It only
//! reads the graph: every optimization has already happened while parsing.
//!
//! Control nodes are walked backwards from `End` to recover the statement
//! order, and `If`/`Region` pairs are emitted as structured branches. Data
//! nodes are evaluated on demand where a statement needs them.

pub mod assemblers;
pub mod targets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Precede every emitted statement with a comment describing its node
    pub emit_comments: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            emit_comments: true,
        }
    }
}
