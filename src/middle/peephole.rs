//! Eager optimization. Every node the parser builds goes through
//! [`Graph::peephole`] right away: its type is recomputed, constant types are
//! materialized as `Constant` nodes, and local rewrites are applied until the
//! node is in normal form.

use crate::middle::{
    graph::{BinaryOperator, Graph, NodeId, NodeKind, UnaryOperator, ARG_PROJECTION},
    ty::Type,
};

/// Each rewrite strictly moves a node towards normal form (constants fold
/// away, constants drift right, Add chains lean left and are sorted by uid),
/// so only a handful of rewrites apply to any single node. Sub-terms built by
/// a rewrite are normalized by their own `peephole` call and do not count.
/// Hitting this means a rule is undoing another.
pub const MAX_REWRITES_PER_NODE: u32 = 64;

impl BinaryOperator {
    /// Exact 32-bit evaluation, `None` when the result is undefined
    pub fn evaluate(self, lhs: i32, rhs: i32) -> Option<i32> {
        Some(match self {
            Self::Add => lhs.wrapping_add(rhs),
            Self::Sub => lhs.wrapping_sub(rhs),
            Self::Mul => lhs.wrapping_mul(rhs),
            Self::Div if rhs == 0 => return None,
            Self::Div => lhs.wrapping_div(rhs),
            Self::Equal => (lhs == rhs) as i32,
            Self::NotEqual => (lhs != rhs) as i32,
            Self::LessThan => (lhs < rhs) as i32,
            Self::LessEqual => (lhs <= rhs) as i32,
        })
    }

    /// Result of `x op x`, known without knowing `x`
    pub fn evaluate_on_itself(self) -> Option<i32> {
        match self {
            Self::Sub | Self::NotEqual | Self::LessThan => Some(0),
            Self::Equal | Self::LessEqual => Some(1),
            Self::Add | Self::Mul | Self::Div => None,
        }
    }
}

impl UnaryOperator {
    pub fn evaluate(self, operand: i32) -> i32 {
        match self {
            Self::Negate => operand.wrapping_neg(),
            Self::Not => (operand == 0) as i32,
        }
    }
}

impl Graph {
    pub fn compute_type(&self, id: NodeId) -> Type {
        let node = &self[id];

        match node.kind {
            NodeKind::Start | NodeKind::If { .. } => Type::Tuple,
            NodeKind::End { .. } | NodeKind::Print { .. } | NodeKind::Region { .. } => {
                Type::Control
            }
            NodeKind::Constant => node.ty,
            NodeKind::Projection { source, index } => match self[source].kind {
                NodeKind::Start if index == ARG_PROJECTION => Type::INTEGER_BOTTOM,
                _ => Type::Control,
            },
            NodeKind::Phi {
                on_true, on_false, ..
            } => self.ty(on_true).meet(self.ty(on_false)),
            NodeKind::Unary { operator, operand } => {
                let operand = self.ty(operand);

                match operand.as_constant() {
                    Some(value) => Type::integer(operator.evaluate(value)),
                    None if operand.is_integer() => Type::INTEGER_BOTTOM,
                    None => operand,
                }
            }
            NodeKind::Binary { operator, lhs, rhs } => {
                let (lhs_ty, rhs_ty) = (self.ty(lhs), self.ty(rhs));

                if lhs == rhs && lhs_ty.is_integer() {
                    if let Some(value) = operator.evaluate_on_itself() {
                        return Type::integer(value);
                    }
                }

                match (lhs_ty.as_constant(), rhs_ty.as_constant()) {
                    (Some(a), Some(b)) => operator
                        .evaluate(a, b)
                        .map_or(Type::INTEGER_BOTTOM, Type::integer),
                    _ if lhs_ty.is_integer() && rhs_ty.is_integer() => Type::INTEGER_BOTTOM,
                    _ => lhs_ty.meet(rhs_ty),
                }
            }
        }
    }

    fn is_constant(&self, id: NodeId) -> bool {
        self.ty(id).is_constant()
    }

    fn as_add(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        match self.kind(id) {
            NodeKind::Binary {
                operator: BinaryOperator::Add,
                lhs,
                rhs,
            } => Some((lhs, rhs)),
            _ => None,
        }
    }

    /// Whether `lhs` and `rhs` are out of canonical order: constants sort
    /// after everything else, other nodes sort by allocation order.
    pub fn spline_compare(&self, lhs: NodeId, rhs: NodeId) -> bool {
        if self.is_constant(rhs) {
            return false;
        }

        if self.is_constant(lhs) {
            return true;
        }

        self[lhs].uid > self[rhs].uid
    }

    /// Looks for a simpler equivalent of `id`. Returns `id` itself when the
    /// node was canonicalized in place.
    pub fn idealize(&mut self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::Binary { operator, lhs, rhs } => {
                // only a division by zero survives folding with constant operands
                debug_assert!(
                    !(self.is_constant(lhs) && self.is_constant(rhs))
                        || operator == BinaryOperator::Div,
                    "{id} should have been folded"
                );

                match operator {
                    BinaryOperator::Add => self.idealize_add(id, lhs, rhs),
                    BinaryOperator::Mul => {
                        if self.ty(rhs).as_constant() == Some(1) {
                            Some(lhs)
                        } else if self.is_constant(lhs) && !self.is_constant(rhs) {
                            self.swap_operands(id);
                            Some(id)
                        } else {
                            None
                        }
                    }
                    BinaryOperator::Div => (self.ty(rhs).as_constant() == Some(1)).then_some(lhs),
                    _ => None,
                }
            }
            NodeKind::Unary {
                operator: UnaryOperator::Not,
                operand,
            } => {
                let NodeKind::Binary { operator, lhs, rhs } = self.kind(operand) else {
                    return None;
                };

                match operator {
                    BinaryOperator::Equal => Some(self.not_equal(lhs, rhs)),
                    BinaryOperator::NotEqual => Some(self.equal(lhs, rhs)),
                    BinaryOperator::LessThan => Some(self.less_equal(rhs, lhs)),
                    BinaryOperator::LessEqual => Some(self.less_than(rhs, lhs)),
                    _ => None,
                }
            }
            NodeKind::Phi {
                region,
                on_true,
                on_false,
            } => {
                if on_true == on_false {
                    return Some(on_true);
                }

                let (
                    NodeKind::Binary {
                        operator,
                        lhs: true_lhs,
                        rhs: true_rhs,
                    },
                    NodeKind::Binary {
                        operator: false_operator,
                        lhs: false_lhs,
                        rhs: false_rhs,
                    },
                ) = (self.kind(on_true), self.kind(on_false))
                else {
                    return None;
                };

                if operator != false_operator {
                    return None;
                }

                let lhs = self.phi(region, true_lhs, false_lhs);
                let lhs = self.peephole(lhs);

                self.keep(lhs);
                let rhs = self.phi(region, true_rhs, false_rhs);
                let rhs = self.peephole(rhs);
                self.unkeep(lhs);

                Some(self.binary(operator, lhs, rhs))
            }
            _ => None,
        }
    }

    fn idealize_add(&mut self, id: NodeId, lhs: NodeId, rhs: NodeId) -> Option<NodeId> {
        if self.ty(rhs).as_constant() == Some(0) {
            return Some(lhs);
        }

        if lhs == rhs {
            let two = self.integer(2);
            return Some(self.mul(lhs, two));
        }

        match (self.as_add(lhs), self.as_add(rhs)) {
            // keep chains left-leaning
            (None, Some(_)) => {
                self.swap_operands(id);
                Some(id)
            }
            // x + (y + z) => (x + y) + z
            (Some(_), Some((y, z))) => {
                let xy = self.add(lhs, y);
                let xy = self.peephole(xy);
                Some(self.add(xy, z))
            }
            (None, None) => self.spline_compare(lhs, rhs).then(|| {
                self.swap_operands(id);
                id
            }),
            (Some((x, y)), None) => {
                if self.is_constant(y) && self.is_constant(rhs) {
                    // (x + c1) + c2 => x + (c1 + c2)
                    let yz = self.add(y, rhs);
                    let yz = self.peephole(yz);
                    Some(self.add(x, yz))
                } else if self.spline_compare(y, rhs) {
                    // (x + y) + z => (x + z) + y
                    Some(self.insert_into_chain(x, y, rhs))
                } else {
                    None
                }
            }
        }
    }

    /// Sorts `term` into the chain `head + first`, which is already in normal
    /// form. The terms that sort after `term` are peeled off in one walk and
    /// re-added on top, so the work does not recurse once per chain element.
    /// The outermost Add is returned unnormalized.
    fn insert_into_chain(&mut self, head: NodeId, first: NodeId, term: NodeId) -> NodeId {
        let mut head = head;
        let mut peeled = vec![first];

        while let Some((rest, last)) = self.as_add(head) {
            if !self.spline_compare(last, term) {
                break;
            }

            peeled.push(last);
            head = rest;
        }

        let sum = self.add(head, term);
        let mut sum = self.peephole(sum);

        while let Some(next) = peeled.pop() {
            sum = self.add(sum, next);

            if !peeled.is_empty() {
                sum = self.peephole(sum);
            }
        }

        sum
    }

    /// Brings a freshly built node into normal form. The returned node may be
    /// `id` itself, an older node, or a new one; `id` is freed if it was
    /// replaced and nothing else refers to it.
    pub fn peephole(&mut self, id: NodeId) -> NodeId {
        let mut current = id;
        let mut rewrites = 0;

        loop {
            let ty = self.compute_type(current);
            self.set_type(current, ty);

            if !matches!(self.kind(current), NodeKind::Constant) && ty.is_constant() {
                let constant = self.constant(ty);
                log::trace!("fold {current} into {constant}");

                return self.dead_code_eliminate(current, constant);
            }

            let Some(replacement) = self.idealize(current) else {
                return current;
            };

            log::trace!("rewrite {current} into {replacement}");
            current = self.dead_code_eliminate(current, replacement);

            rewrites += 1;
            debug_assert!(
                rewrites <= MAX_REWRITES_PER_NODE,
                "runaway rewriting while normalizing {id}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::middle::graph::{CONTROL_PROJECTION, FALSE_PROJECTION, TRUE_PROJECTION};

    struct Fixture {
        graph: Graph,
        start: NodeId,
        arg: NodeId,
    }

    fn fixture() -> Fixture {
        let mut graph = Graph::new();

        let start = graph.create(NodeKind::Start);
        graph.add_reference(start);
        let arg = graph.create_labeled(
            NodeKind::Projection {
                source: start,
                index: ARG_PROJECTION,
            },
            "arg",
        );
        graph.add_reference(arg);

        Fixture { graph, start, arg }
    }

    fn expect_binary(graph: &Graph, id: NodeId) -> (BinaryOperator, NodeId, NodeId) {
        match graph.kind(id) {
            NodeKind::Binary { operator, lhs, rhs } => (operator, lhs, rhs),
            other => panic!("expected a binary node, got {other:?}"),
        }
    }

    #[test]
    fn constants_fold() {
        let Fixture { mut graph, .. } = fixture();
        let before = graph.live_count();

        let two = graph.integer(2);
        let three = graph.integer(3);
        let sum = graph.add(two, three);
        let result = graph.peephole(sum);

        assert_eq!(graph.ty(result), Type::integer(5));
        assert!(matches!(graph.kind(result), NodeKind::Constant));
        assert!(!graph.is_live(sum));
        assert!(!graph.is_live(two));
        assert_eq!(graph.live_count(), before + 1);
    }

    #[test]
    fn every_operator_folds() {
        for operator in BinaryOperator::iter() {
            let mut graph = Graph::new();

            let seven = graph.integer(7);
            let three = graph.integer(-3);
            let node = graph.binary(operator, seven, three);
            let result = graph.peephole(node);

            assert_eq!(
                graph.ty(result).as_constant(),
                operator.evaluate(7, -3),
                "{operator}"
            );
        }
    }

    #[test]
    fn arithmetic_wraps() {
        let mut graph = Graph::new();

        let max = graph.integer(i32::MAX);
        let one = graph.integer(1);
        let sum = graph.add(max, one);

        let result = graph.peephole(sum);

        assert_eq!(graph.ty(result), Type::integer(i32::MIN));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let mut graph = Graph::new();

        let four = graph.integer(4);
        let zero = graph.integer(0);
        let quotient = graph.div(four, zero);
        let result = graph.peephole(quotient);

        assert_eq!(result, quotient);
        assert_eq!(graph.ty(result), Type::INTEGER_BOTTOM);
    }

    #[test]
    fn self_operations_fold() {
        let cases = [
            (BinaryOperator::Sub, 0),
            (BinaryOperator::Equal, 1),
            (BinaryOperator::NotEqual, 0),
            (BinaryOperator::LessThan, 0),
            (BinaryOperator::LessEqual, 1),
        ];

        for (operator, expected) in cases {
            let Fixture { mut graph, arg, .. } = fixture();

            let node = graph.binary(operator, arg, arg);
            let result = graph.peephole(node);

            assert_eq!(graph.ty(result), Type::integer(expected), "{operator}");
            assert!(!graph.is_live(node));
            assert!(graph.is_live(arg));
        }
    }

    #[test]
    fn add_zero_is_identity() {
        let Fixture { mut graph, arg, .. } = fixture();

        let zero = graph.integer(0);
        let sum = graph.add(arg, zero);

        assert_eq!(graph.peephole(sum), arg);
        assert!(!graph.is_live(sum));
        assert!(!graph.is_live(zero));
    }

    #[test]
    fn add_to_itself_doubles() {
        let Fixture { mut graph, arg, .. } = fixture();

        let sum = graph.add(arg, arg);
        let result = graph.peephole(sum);

        let (operator, lhs, rhs) = expect_binary(&graph, result);
        assert_eq!(operator, BinaryOperator::Mul);
        assert_eq!(lhs, arg);
        assert_eq!(graph.ty(rhs), Type::integer(2));
    }

    #[test]
    fn constants_move_right() {
        let Fixture { mut graph, arg, .. } = fixture();

        let one = graph.integer(1);
        let sum = graph.add(one, arg);
        let result = graph.peephole(sum);

        assert_eq!(result, sum);
        assert_eq!(expect_binary(&graph, result), (BinaryOperator::Add, arg, one));
    }

    #[test]
    fn constant_tails_combine() {
        let Fixture { mut graph, arg, .. } = fixture();

        let one = graph.integer(1);
        let inner = graph.add(arg, one);
        let inner = graph.peephole(inner);
        let two = graph.integer(2);
        let outer = graph.add(inner, two);
        let result = graph.peephole(outer);

        let (operator, lhs, rhs) = expect_binary(&graph, result);
        assert_eq!(operator, BinaryOperator::Add);
        assert_eq!(lhs, arg);
        assert_eq!(graph.ty(rhs), Type::integer(3));
        assert!(!graph.is_live(inner));
    }

    #[test]
    fn right_leaning_chains_reassociate() {
        let Fixture { mut graph, arg, .. } = fixture();

        let negated = graph.unary(UnaryOperator::Negate, arg);
        let negated = graph.peephole(negated);
        let one = graph.integer(1);
        let inner = graph.add(negated, one);
        let inner = graph.peephole(inner);

        // arg + (-arg + 1) => (arg + -arg) + 1
        let outer = graph.add(arg, inner);
        let result = graph.peephole(outer);

        let (operator, lhs, rhs) = expect_binary(&graph, result);
        assert_eq!(operator, BinaryOperator::Add);
        assert_eq!(graph.ty(rhs), Type::integer(1));
        assert_eq!(expect_binary(&graph, lhs), (BinaryOperator::Add, arg, negated));
    }

    #[test]
    fn multiplication_identities() {
        let Fixture { mut graph, arg, .. } = fixture();

        let one = graph.integer(1);
        let product = graph.mul(one, arg);
        assert_eq!(graph.peephole(product), arg);

        let one = graph.integer(1);
        let quotient = graph.div(arg, one);
        assert_eq!(graph.peephole(quotient), arg);
    }

    #[test]
    fn not_flips_comparisons() {
        let Fixture { mut graph, arg, .. } = fixture();

        let five = graph.integer(5);
        let less = graph.less_than(arg, five);
        let less = graph.peephole(less);
        let not = graph.unary(UnaryOperator::Not, less);
        let result = graph.peephole(not);

        assert_eq!(expect_binary(&graph, result), (BinaryOperator::LessEqual, five, arg));

        let equal = graph.equal(arg, five);
        let equal = graph.peephole(equal);
        let not = graph.unary(UnaryOperator::Not, equal);
        let result = graph.peephole(not);

        assert_eq!(expect_binary(&graph, result), (BinaryOperator::NotEqual, arg, five));
    }

    #[test]
    fn unary_constants_fold() {
        let mut graph = Graph::new();

        let zero = graph.integer(0);
        let not = graph.unary(UnaryOperator::Not, zero);
        let result = graph.peephole(not);
        assert_eq!(graph.ty(result), Type::integer(1));

        let seven = graph.integer(7);
        let negated = graph.unary(UnaryOperator::Negate, seven);
        let result = graph.peephole(negated);
        assert_eq!(graph.ty(result), Type::integer(-7));
    }

    #[test]
    fn normal_forms_are_stable() {
        let Fixture { mut graph, arg, .. } = fixture();

        let three = graph.integer(3);
        let product = graph.mul(arg, three);
        let product = graph.peephole(product);
        let one = graph.integer(1);
        let sum = graph.add(product, one);
        let sum = graph.peephole(sum);
        graph.add_reference(sum);

        let live = graph.live_count();

        assert_eq!(graph.peephole(sum), sum);
        assert_eq!(graph.peephole(product), product);
        assert_eq!(graph.live_count(), live);
    }

    #[test]
    fn spline_compare_orders_constants_last() {
        let Fixture { mut graph, arg, .. } = fixture();

        let one = graph.integer(1);
        let negated = graph.unary(UnaryOperator::Negate, arg);

        assert!(graph.spline_compare(one, arg));
        assert!(!graph.spline_compare(arg, one));
        assert!(!graph.spline_compare(arg, negated));
        assert!(graph.spline_compare(negated, arg));
    }

    fn region(graph: &mut Graph, start: NodeId, predicate: NodeId) -> NodeId {
        let control = graph.create(NodeKind::Projection {
            source: start,
            index: CONTROL_PROJECTION,
        });
        let branch = graph.create(NodeKind::If { control, predicate });
        let on_true = graph.create(NodeKind::Projection {
            source: branch,
            index: TRUE_PROJECTION,
        });
        let on_false = graph.create(NodeKind::Projection {
            source: branch,
            index: FALSE_PROJECTION,
        });
        let region = graph.create(NodeKind::Region {
            control: branch,
            on_true,
            on_false,
        });
        graph.add_reference(region);

        region
    }

    #[test]
    fn phi_of_identical_values_collapses() {
        let Fixture {
            mut graph,
            start,
            arg,
        } = fixture();

        let region = region(&mut graph, start, arg);
        let live = graph.live_count();

        assert_eq!(graph.phi(region, arg, arg), arg);
        assert_eq!(graph.live_count(), live);
    }

    #[test]
    fn phi_pushes_through_matching_operators() {
        let Fixture {
            mut graph,
            start,
            arg,
        } = fixture();

        let region = region(&mut graph, start, arg);

        let one = graph.integer(1);
        let on_true = graph.add(arg, one);
        let on_true = graph.peephole(on_true);
        graph.add_reference(on_true);

        let two = graph.integer(2);
        let doubled = graph.mul(arg, two);
        let doubled = graph.peephole(doubled);
        let one = graph.integer(1);
        let on_false = graph.add(doubled, one);
        let on_false = graph.peephole(on_false);
        graph.add_reference(on_false);

        let phi = graph.phi(region, on_true, on_false);
        let result = graph.peephole(phi);

        let (operator, lhs, rhs) = expect_binary(&graph, result);
        assert_eq!(operator, BinaryOperator::Add);
        assert_eq!(graph.ty(rhs), Type::integer(1));
        assert_eq!(
            graph.kind(lhs),
            NodeKind::Phi {
                region,
                on_true: arg,
                on_false: doubled,
            }
        );
    }

    #[test]
    fn phi_of_differing_constants_is_bottom() {
        let Fixture {
            mut graph,
            start,
            arg,
        } = fixture();

        let region = region(&mut graph, start, arg);
        let one = graph.integer(1);
        let two = graph.integer(2);
        let phi = graph.phi(region, one, two);
        let result = graph.peephole(phi);

        assert_eq!(result, phi);
        assert_eq!(graph.ty(result), Type::INTEGER_BOTTOM);
    }
}
