//! The optimizing middle of the compiler: the type lattice, the node graph
//! and the rewrites applied to it while it is being built.

pub mod graph;
pub mod peephole;
pub mod pretty_print;
pub mod scope;
pub mod ty;
