//! Name bindings while a routine body is being built. The scope owns one
//! reference on every value it binds, so a value stays alive exactly as long
//! as some binding (or some other node) still points at it.

use thiserror::Error;

use crate::{
    frontend::intern::Symbol,
    middle::graph::{Graph, NodeId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub name: Symbol,
    pub value: NodeId,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    #[error("name is already declared in this block")]
    Redeclaration,

    #[error("name is not declared")]
    Undeclared,

    #[error("more than {limit} live bindings")]
    LimitExceeded { limit: usize },
}

/// Values of every visible binding at one point in time, each holding a
/// reference until released
#[derive(Debug)]
#[must_use = "snapshots hold references and must be released"]
pub struct Snapshot {
    values: Vec<NodeId>,
}

impl Snapshot {
    pub fn values(&self) -> &[NodeId] {
        &self.values
    }
}

#[derive(Debug)]
pub struct Scope {
    bindings: Vec<Binding>,
    /// Length of `bindings` when each open block was entered
    blocks: Vec<usize>,
    max_bindings: usize,
}

impl Scope {
    pub fn new(max_bindings: usize) -> Self {
        Self {
            bindings: Vec::new(),
            blocks: Vec::new(),
            max_bindings,
        }
    }

    pub fn enter_block(&mut self) {
        self.blocks.push(self.bindings.len());
    }

    /// Drops every binding made since the matching [`Scope::enter_block`]
    pub fn exit_block(&mut self, graph: &mut Graph) {
        let depth = self.blocks.pop().unwrap_or(0);

        for binding in self.bindings.drain(depth..) {
            graph.remove_reference(binding.value);
        }
    }

    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn block_start(&self) -> usize {
        self.blocks.last().copied().unwrap_or(0)
    }

    /// Binds `name` in the innermost block. A redeclaration is still bound
    /// (shadowing the earlier one) but reported.
    pub fn declare(
        &mut self,
        graph: &mut Graph,
        name: Symbol,
        value: NodeId,
    ) -> Result<(), ScopeError> {
        if self.bindings.len() >= self.max_bindings {
            return Err(ScopeError::LimitExceeded {
                limit: self.max_bindings,
            });
        }

        let redeclared = self.bindings[self.block_start()..]
            .iter()
            .any(|binding| binding.name == name);

        graph.add_reference(value);
        self.bindings.push(Binding { name, value });

        match redeclared {
            true => Err(ScopeError::Redeclaration),
            false => Ok(()),
        }
    }

    fn position(&self, name: Symbol) -> Option<usize> {
        self.bindings.iter().rposition(|binding| binding.name == name)
    }

    pub fn lookup(&self, name: Symbol) -> Option<NodeId> {
        self.position(name).map(|position| self.bindings[position].value)
    }

    pub fn assign(
        &mut self,
        graph: &mut Graph,
        name: Symbol,
        value: NodeId,
    ) -> Result<(), ScopeError> {
        let position = self.position(name).ok_or(ScopeError::Undeclared)?;
        self.rebind(graph, position, value);

        Ok(())
    }

    fn rebind(&mut self, graph: &mut Graph, position: usize, value: NodeId) {
        graph.add_reference(value);
        let old = core::mem::replace(&mut self.bindings[position].value, value);
        graph.remove_reference(old);
    }

    pub fn snapshot(&self, graph: &mut Graph) -> Snapshot {
        let values = self
            .bindings
            .iter()
            .map(|binding| {
                graph.add_reference(binding.value);
                binding.value
            })
            .collect();

        Snapshot { values }
    }

    /// Rebinds every binding covered by `snapshot` to its recorded value
    pub fn restore(&mut self, graph: &mut Graph, snapshot: &Snapshot) {
        debug_assert!(snapshot.values.len() <= self.bindings.len());

        for (position, &value) in snapshot.values.iter().enumerate() {
            if self.bindings[position].value != value {
                self.rebind(graph, position, value);
            }
        }
    }

    pub fn release_snapshot(&self, graph: &mut Graph, snapshot: Snapshot) {
        for value in snapshot.values {
            graph.remove_reference(value);
        }
    }

    /// Joins the values left by the true arm (`on_true`) with the current
    /// ones, which were left by the false arm. Every binding whose two values
    /// differ is rebound to a `Phi` at `region`.
    pub fn merge(&mut self, graph: &mut Graph, region: NodeId, on_true: &Snapshot) {
        graph.keep(region);

        for (position, &true_value) in on_true.values.iter().enumerate() {
            let false_value = self.bindings[position].value;

            if true_value == false_value {
                continue;
            }

            let phi = graph.phi(region, true_value, false_value);
            let phi = graph.peephole(phi);
            self.rebind(graph, position, phi);
        }

        graph.unkeep(region);
    }

    /// Releases every binding
    pub fn clear(&mut self, graph: &mut Graph) {
        for binding in self.bindings.drain(..) {
            graph.remove_reference(binding.value);
        }

        self.blocks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frontend::intern::Interner,
        middle::{
            graph::{NodeKind, ARG_PROJECTION, CONTROL_PROJECTION, FALSE_PROJECTION, TRUE_PROJECTION},
            ty::Type,
        },
    };

    #[test]
    fn bindings_hold_references() {
        let mut graph = Graph::new();
        let mut interner = Interner::new();
        let mut scope = Scope::new(16);

        let x = interner.intern("x");
        let five = graph.integer(5);

        scope.enter_block();
        scope.declare(&mut graph, x, five).unwrap();
        assert_eq!(graph.refs(five), 1);
        assert_eq!(scope.lookup(x), Some(five));

        scope.exit_block(&mut graph);
        assert_eq!(scope.lookup(x), None);
        assert!(!graph.is_live(five));
    }

    #[test]
    fn redeclaration_is_reported_and_shadows() {
        let mut graph = Graph::new();
        let mut interner = Interner::new();
        let mut scope = Scope::new(16);

        let y = interner.intern("y");
        let one = graph.integer(1);
        let two = graph.integer(2);

        scope.enter_block();
        assert_eq!(scope.declare(&mut graph, y, one), Ok(()));
        assert_eq!(
            scope.declare(&mut graph, y, two),
            Err(ScopeError::Redeclaration)
        );
        assert_eq!(scope.lookup(y), Some(two));

        // shadowing in a nested block is fine
        scope.enter_block();
        let three = graph.integer(3);
        assert_eq!(scope.declare(&mut graph, y, three), Ok(()));
        scope.exit_block(&mut graph);

        assert_eq!(scope.lookup(y), Some(two));
    }

    #[test]
    fn assign_moves_the_reference() {
        let mut graph = Graph::new();
        let mut interner = Interner::new();
        let mut scope = Scope::new(16);

        let x = interner.intern("x");
        let one = graph.integer(1);
        let two = graph.integer(2);

        scope.declare(&mut graph, x, one).unwrap();
        scope.assign(&mut graph, x, two).unwrap();

        assert!(!graph.is_live(one));
        assert_eq!(graph.refs(two), 1);

        let missing = interner.intern("missing");
        assert_eq!(
            scope.assign(&mut graph, missing, two),
            Err(ScopeError::Undeclared)
        );
    }

    #[test]
    fn binding_limit() {
        let mut graph = Graph::new();
        let mut interner = Interner::new();
        let mut scope = Scope::new(1);

        let a = interner.intern("a");
        let b = interner.intern("b");
        let value = graph.integer(0);

        scope.declare(&mut graph, a, value).unwrap();
        assert_eq!(
            scope.declare(&mut graph, b, value),
            Err(ScopeError::LimitExceeded { limit: 1 })
        );
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn merge_builds_phis_only_for_changed_values() {
        let mut graph = Graph::new();
        let mut interner = Interner::new();
        let mut scope = Scope::new(16);

        let start = graph.create(NodeKind::Start);
        graph.add_reference(start);
        let arg = graph.create(NodeKind::Projection {
            source: start,
            index: ARG_PROJECTION,
        });
        let control = graph.create(NodeKind::Projection {
            source: start,
            index: CONTROL_PROJECTION,
        });

        let x = interner.intern("x");
        let y = interner.intern("y");
        let zero = graph.integer(0);
        scope.declare(&mut graph, x, zero).unwrap();
        scope.declare(&mut graph, y, arg).unwrap();

        let branch = graph.create(NodeKind::If {
            control,
            predicate: arg,
        });
        let on_true = graph.create(NodeKind::Projection {
            source: branch,
            index: TRUE_PROJECTION,
        });
        let on_false = graph.create(NodeKind::Projection {
            source: branch,
            index: FALSE_PROJECTION,
        });

        let before = scope.snapshot(&mut graph);

        // true arm: x = 1
        let one = graph.integer(1);
        scope.assign(&mut graph, x, one).unwrap();
        let after_true = scope.snapshot(&mut graph);
        scope.restore(&mut graph, &before);

        // false arm leaves everything alone
        let region = graph.create(NodeKind::Region {
            control: branch,
            on_true,
            on_false,
        });
        graph.add_reference(region);
        scope.merge(&mut graph, region, &after_true);

        scope.release_snapshot(&mut graph, before);
        scope.release_snapshot(&mut graph, after_true);

        let merged = scope.lookup(x).unwrap();
        assert_eq!(
            graph.kind(merged),
            NodeKind::Phi {
                region,
                on_true: one,
                on_false: zero,
            }
        );
        assert_eq!(graph.ty(merged), Type::INTEGER_BOTTOM);
        assert_eq!(scope.lookup(y), Some(arg));
        assert_eq!(graph.refs(merged), 1);
    }

    #[test]
    fn merge_survives_phis_that_fold() {
        let mut graph = Graph::new();
        let mut interner = Interner::new();
        let mut scope = Scope::new(16);

        let start = graph.create(NodeKind::Start);
        graph.add_reference(start);
        let arg = graph.create(NodeKind::Projection {
            source: start,
            index: ARG_PROJECTION,
        });
        let control = graph.create(NodeKind::Projection {
            source: start,
            index: CONTROL_PROJECTION,
        });

        let x = interner.intern("x");
        let y = interner.intern("y");
        let zero = graph.integer(0);
        let seven = graph.integer(7);
        scope.declare(&mut graph, x, zero).unwrap();
        scope.declare(&mut graph, y, seven).unwrap();

        let branch = graph.create(NodeKind::If {
            control,
            predicate: arg,
        });
        let on_true = graph.create(NodeKind::Projection {
            source: branch,
            index: TRUE_PROJECTION,
        });
        let on_false = graph.create(NodeKind::Projection {
            source: branch,
            index: FALSE_PROJECTION,
        });

        let before = scope.snapshot(&mut graph);

        // true arm stores equal values under fresh nodes
        let other_zero = graph.integer(0);
        scope.assign(&mut graph, x, other_zero).unwrap();
        let other_seven = graph.integer(7);
        scope.assign(&mut graph, y, other_seven).unwrap();
        let after_true = scope.snapshot(&mut graph);
        scope.restore(&mut graph, &before);

        // nothing holds the region yet
        let region = graph.create(NodeKind::Region {
            control: branch,
            on_true,
            on_false,
        });
        scope.merge(&mut graph, region, &after_true);

        assert!(graph.is_live(region));
        assert_eq!(graph.refs(region), 0);

        scope.release_snapshot(&mut graph, before);
        scope.release_snapshot(&mut graph, after_true);

        let merged_x = scope.lookup(x).unwrap();
        let merged_y = scope.lookup(y).unwrap();
        assert_eq!(graph.kind(merged_x), NodeKind::Constant);
        assert_eq!(graph.ty(merged_x), Type::integer(0));
        assert_eq!(graph.ty(merged_y), Type::integer(7));
    }

    #[test]
    fn clear_releases_everything() {
        let mut graph = Graph::new();
        let mut interner = Interner::new();
        let mut scope = Scope::new(16);

        let a = graph.integer(1);
        let b = graph.integer(2);
        let sum = graph.add(a, b);

        scope.declare(&mut graph, interner.intern("sum"), sum).unwrap();
        scope.enter_block();
        scope.declare(&mut graph, interner.intern("a"), a).unwrap();

        scope.clear(&mut graph);

        assert!(scope.is_empty());
        assert_eq!(scope.depth(), 0);
        assert_eq!(graph.live_count(), 0);
    }
}
