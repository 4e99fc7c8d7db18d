//! The sea-of-nodes graph. Nodes live in an arena of slots and are owned by
//! reference counts: every input edge and every scope binding holds one
//! reference. When a count drops to zero the node is freed on the spot, its
//! slot goes back on the free-list and its own inputs are released in turn.

use hashbrown::HashSet;
use strum::EnumIter;

use crate::{
    index::{simple_index, Index, IndexVec},
    middle::ty::Type,
};

simple_index! {
    /// Position of a node inside the graph arena
    pub struct SlotIndex;
}

/// Handle to a node. The generation changes every time the slot is freed, so
/// a handle to a freed node never aliases whatever reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    slot: SlotIndex,
    generation: u32,
}

impl NodeId {
    pub fn slot(self) -> SlotIndex {
        self.slot
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.slot.index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOperator {
    Negate,
    Not,
}

/// Most inputs any node kind has
pub const MAX_INPUTS: usize = 3;

/// Projection indices off `Start`
pub const CONTROL_PROJECTION: u32 = 0;
pub const ARG_PROJECTION: u32 = 1;

/// Projection indices off `If`
pub const TRUE_PROJECTION: u32 = 0;
pub const FALSE_PROJECTION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Start,
    End {
        control: Option<NodeId>,
    },
    Print {
        control: NodeId,
        value: NodeId,
    },
    If {
        control: NodeId,
        predicate: NodeId,
    },
    /// Joins the two arms of `control`, which is always an `If`
    Region {
        control: NodeId,
        on_true: NodeId,
        on_false: NodeId,
    },
    Constant,
    Projection {
        source: NodeId,
        index: u32,
    },
    Phi {
        region: NodeId,
        on_true: NodeId,
        on_false: NodeId,
    },
    Binary {
        operator: BinaryOperator,
        lhs: NodeId,
        rhs: NodeId,
    },
    Unary {
        operator: UnaryOperator,
        operand: NodeId,
    },
}

impl NodeKind {
    pub fn inputs(&self) -> [Option<NodeId>; MAX_INPUTS] {
        match *self {
            Self::Start | Self::Constant => [None, None, None],
            Self::End { control } => [control, None, None],
            Self::Print { control, value } => [Some(control), Some(value), None],
            Self::If { control, predicate } => [Some(control), Some(predicate), None],
            Self::Region {
                control,
                on_true,
                on_false,
            } => [Some(control), Some(on_true), Some(on_false)],
            Self::Projection { source, .. } => [Some(source), None, None],
            Self::Phi {
                region,
                on_true,
                on_false,
            } => [Some(region), Some(on_true), Some(on_false)],
            Self::Binary { lhs, rhs, .. } => [Some(lhs), Some(rhs), None],
            Self::Unary { operand, .. } => [Some(operand), None, None],
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Self::Start | Self::End { .. } | Self::Print { .. } | Self::If { .. } | Self::Region { .. }
        )
    }

    pub fn name(&self) -> String {
        match self {
            Self::Start => "start".into(),
            Self::End { .. } => "end".into(),
            Self::Print { .. } => "print".into(),
            Self::If { .. } => "if".into(),
            Self::Region { .. } => "region".into(),
            Self::Constant => "constant".into(),
            Self::Projection { .. } => "proj".into(),
            Self::Phi { .. } => "phi".into(),
            Self::Binary { operator, .. } => operator.to_string(),
            Self::Unary { operator, .. } => operator.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Allocation order, strictly increasing over the life of a graph
    pub uid: u32,
    pub kind: NodeKind,
    pub ty: Type,
    pub refs: u32,
    pub label: Option<&'static str>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
pub struct Graph {
    slots: IndexVec<SlotIndex, Slot>,
    free: Vec<SlotIndex>,
    next_uid: u32,
    live: usize,
    max_nodes: usize,
    limit_exceeded: bool,
}

macro_rules! binary_constructors {
    ($($operator:ident),* $(,)?) => {
        paste::paste! {
            $(
                pub fn [<$operator:snake>](&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
                    self.create(NodeKind::Binary {
                        operator: BinaryOperator::$operator,
                        lhs,
                        rhs,
                    })
                }
            )*
        }
    };
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    pub fn with_limit(max_nodes: usize) -> Self {
        Self {
            slots: IndexVec::new(),
            free: Vec::new(),
            next_uid: 0,
            live: 0,
            max_nodes,
            limit_exceeded: false,
        }
    }

    binary_constructors!(Add, Sub, Mul, Div, Equal, NotEqual, LessThan, LessEqual);

    /// Vends a node from the free-list (or a fresh slot) and takes a
    /// reference on each of its inputs. The new node itself starts out
    /// unreferenced.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            uid: self.next_uid,
            kind,
            ty: Type::Any,
            refs: 0,
            label: None,
        };
        self.next_uid += 1;

        let id = match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot];
                debug_assert!(entry.node.is_none());
                entry.node = Some(node);

                NodeId {
                    slot,
                    generation: entry.generation,
                }
            }
            None => NodeId {
                slot: self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                }),
                generation: 0,
            },
        };

        for input in kind.inputs().into_iter().flatten() {
            self.add_reference(input);
        }

        self.live += 1;
        if self.live > self.max_nodes {
            self.limit_exceeded = true;
        }

        if !matches!(kind, NodeKind::Constant) {
            let ty = self.compute_type(id);
            self.node_mut(id).ty = ty;
        }

        log::trace!("allocate {id} ({})", kind.name());

        id
    }

    pub fn create_labeled(&mut self, kind: NodeKind, label: &'static str) -> NodeId {
        let id = self.create(kind);
        self.node_mut(id).label = Some(label);
        id
    }

    pub fn constant(&mut self, ty: Type) -> NodeId {
        let id = self.create(NodeKind::Constant);
        self.node_mut(id).ty = ty;
        id
    }

    pub fn integer(&mut self, value: i32) -> NodeId {
        self.constant(Type::integer(value))
    }

    pub fn unary(&mut self, operator: UnaryOperator, operand: NodeId) -> NodeId {
        self.create(NodeKind::Unary { operator, operand })
    }

    pub fn binary(&mut self, operator: BinaryOperator, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.create(NodeKind::Binary { operator, lhs, rhs })
    }

    /// Merges two values at `region`. Identical values need no Phi at all.
    pub fn phi(&mut self, region: NodeId, on_true: NodeId, on_false: NodeId) -> NodeId {
        if on_true == on_false {
            return on_true;
        }

        self.create(NodeKind::Phi {
            region,
            on_true,
            on_false,
        })
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.slots
            .get(id.slot)
            .is_some_and(|slot| slot.generation == id.generation && slot.node.is_some())
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.slot)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    #[track_caller]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots
            .get_mut(id.slot)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .unwrap_or_else(|| panic!("use of freed node {id}"))
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self[id].kind
    }

    pub fn ty(&self, id: NodeId) -> Type {
        self[id].ty
    }

    pub fn refs(&self, id: NodeId) -> u32 {
        self[id].refs
    }

    pub(crate) fn set_type(&mut self, id: NodeId, ty: Type) {
        self.node_mut(id).ty = ty;
    }

    pub fn add_reference(&mut self, id: NodeId) {
        log::trace!("reference {id}");
        self.node_mut(id).refs += 1;
    }

    /// Drops one reference. Nodes reaching zero are freed immediately and
    /// release their own inputs, cascading through everything that becomes
    /// unreachable.
    pub fn remove_reference(&mut self, id: NodeId) {
        let mut worklist = vec![id];

        while let Some(id) = worklist.pop() {
            log::trace!("unreference {id}");

            let node = self.node_mut(id);
            assert!(node.refs > 0, "unreferencing {id} which has no references");
            node.refs -= 1;

            if node.refs == 0 {
                let inputs = node.kind.inputs();
                self.free_node(id);
                worklist.extend(inputs.into_iter().flatten());
            }
        }
    }

    /// Returns an unreferenced node's slot to the free-list
    pub fn free_node(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        assert_eq!(node.refs, 0, "freeing {id} while it is still referenced");

        log::trace!("free {id} ({})", node.kind.name());

        let slot = &mut self.slots[id.slot];
        slot.node = None;
        slot.generation += 1;
        self.free.push(id.slot);
        self.live -= 1;
    }

    /// Frees an unreferenced node and releases its inputs
    pub fn kill(&mut self, id: NodeId) {
        let inputs = self[id].kind.inputs();
        self.free_node(id);

        for input in inputs.into_iter().flatten() {
            self.remove_reference(input);
        }
    }

    /// Pins a node while something it may depend on is being torn down
    pub fn keep(&mut self, id: NodeId) {
        self.node_mut(id).refs += 1;
    }

    /// Undoes [`Graph::keep`] without freeing the node if the count hits zero
    pub fn unkeep(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        assert!(node.refs > 0, "unkeeping {id} which was never kept");
        node.refs -= 1;
    }

    /// Frees `id` if nobody holds a reference to it
    pub fn kill_if_unused(&mut self, id: NodeId) {
        if self.is_live(id) && self.refs(id) == 0 {
            self.kill(id);
        }
    }

    /// After `old` was rewritten into `new`: frees `old` if it is not
    /// referenced anywhere else, making sure `new` survives the cascade
    pub fn dead_code_eliminate(&mut self, old: NodeId, new: NodeId) -> NodeId {
        if old != new && self.refs(old) == 0 {
            self.keep(new);
            self.kill(old);
            self.unkeep(new);
        }

        new
    }

    /// Points an `End` node at the last control node of its routine
    pub fn set_control(&mut self, end: NodeId, control: NodeId) {
        let NodeKind::End { control: old } = self.kind(end) else {
            panic!("set_control on {end} which is not an end node");
        };

        self.add_reference(control);
        self.node_mut(end).kind = NodeKind::End {
            control: Some(control),
        };

        if let Some(old) = old {
            self.remove_reference(old);
        }
    }

    /// Swaps the operands of a binary node in place
    pub(crate) fn swap_operands(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        let NodeKind::Binary { operator, lhs, rhs } = node.kind else {
            panic!("swap_operands on {id} which is not a binary node");
        };

        node.kind = NodeKind::Binary {
            operator,
            lhs: rhs,
            rhs: lhs,
        };
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Total number of slots ever carved out of the arena
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn limit_exceeded(&self) -> bool {
        self.limit_exceeded
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots.enumerate().filter_map(|(slot, entry)| {
            entry.node.as_ref().map(|node| {
                (
                    NodeId {
                        slot,
                        generation: entry.generation,
                    },
                    node,
                )
            })
        })
    }

    /// Every node reachable from `roots` by following input edges
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = NodeId>) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut worklist = roots.into_iter().collect::<Vec<_>>();

        while let Some(id) = worklist.pop() {
            if !visited.insert(id) {
                continue;
            }

            worklist.extend(self[id].kind.inputs().into_iter().flatten());
        }

        visited
    }
}

impl core::ops::Index<NodeId> for Graph {
    type Output = Node;

    #[track_caller]
    fn index(&self, id: NodeId) -> &Self::Output {
        self.get(id)
            .unwrap_or_else(|| panic!("use of freed node {id}"))
    }
}
