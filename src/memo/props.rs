//! Logical properties derived for every interned group.
//!
//! Properties are a pure function of the (immutable) subtree, computed once
//! when a node is interned and cached beside it. The derivation covers the
//! operators the decorrelation rewrites manipulate; it makes no attempt at
//! the precision a full optimizer property derivation would have.

#![allow(clippy::wildcard_enum_match_arm)]

use super::expr::{ExprNode, GroupId, Memo, Payload};
use super::metadata::ColSet;
use super::ops::Op;

/// Row-count bounds for a relational expression. `max` of `None` means
/// unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u64,
    pub max: Option<u64>,
}

impl Cardinality {
    pub const fn exactly(n: u64) -> Self {
        Cardinality { min: n, max: Some(n) }
    }

    pub const fn at_most(n: u64) -> Self {
        Cardinality { min: 0, max: Some(n) }
    }

    pub const fn unbounded() -> Self {
        Cardinality { min: 0, max: None }
    }

    pub fn can_be_zero(&self) -> bool {
        self.min == 0
    }

    pub fn is_zero_or_one(&self) -> bool {
        matches!(self.max, Some(max) if max <= 1)
    }
}

/// Cached logical properties of one group.
#[derive(Debug, Clone)]
pub struct LogicalProps {
    /// Columns the group produces. Empty for scalar operators.
    pub output_cols: ColSet,
    /// Columns referenced but not produced within the subtree: non-empty
    /// means the expression is correlated.
    pub outer_cols: ColSet,
    /// Output columns known to never be null.
    pub not_null_cols: ColSet,
    pub cardinality: Cardinality,
    /// Minimal column set guaranteed unique across rows, when one is known.
    /// A relation bounded to at most one row has the empty set as its key.
    pub candidate_key: Option<ColSet>,
    pub can_have_side_effects: bool,
    /// Write-once cache for the hoistability analysis. `None` until latched.
    pub(crate) has_hoistable_subquery: Option<bool>,
}

impl LogicalProps {
    fn scalar(outer_cols: ColSet, can_have_side_effects: bool) -> Self {
        LogicalProps {
            output_cols: ColSet::new(),
            outer_cols,
            not_null_cols: ColSet::new(),
            cardinality: Cardinality::exactly(1),
            candidate_key: None,
            can_have_side_effects,
            has_hoistable_subquery: None,
        }
    }
}

fn mul(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    a.zip(b).map(|(a, b)| a.saturating_mul(b))
}

fn union_outer(memo: &Memo, node: &ExprNode) -> ColSet {
    node.children
        .iter()
        .fold(ColSet::new(), |acc, &c| acc.union(&memo.props(c).outer_cols))
}

fn any_side_effects(memo: &Memo, node: &ExprNode) -> bool {
    node.children
        .iter()
        .any(|&c| memo.props(c).can_have_side_effects)
}

/// Whether a projection element is known to produce a non-null value.
fn elem_not_null(memo: &Memo, elem: GroupId) -> bool {
    let node = memo.node(elem);
    match node.op {
        Op::True | Op::False | Op::Is | Op::IsNot => true,
        Op::Const => matches!(&node.payload, Some(Payload::Value(v)) if !v.is_null()),
        _ => false,
    }
}

/// Derive the logical properties of a node whose children are already
/// interned in `memo`.
pub(crate) fn derive(memo: &Memo, node: &ExprNode) -> LogicalProps {
    let side_effects = any_side_effects(memo, node);
    match node.op {
        Op::Scan => {
            let Some(Payload::Scan(def)) = &node.payload else {
                unreachable!("Scan without ScanDef payload");
            };
            LogicalProps {
                output_cols: ColSet::from(&def.cols),
                outer_cols: ColSet::new(),
                not_null_cols: def.not_null.clone(),
                cardinality: Cardinality::unbounded(),
                candidate_key: def.key.as_ref().map(ColSet::from),
                can_have_side_effects: false,
                has_hoistable_subquery: None,
            }
        }

        Op::Values => {
            let Some(Payload::Cols(cols)) = &node.payload else {
                unreachable!("Values without column list payload");
            };
            let rows = node.children.len() as u64;
            LogicalProps {
                output_cols: ColSet::from(cols),
                outer_cols: union_outer(memo, node),
                not_null_cols: ColSet::new(),
                cardinality: Cardinality::exactly(rows),
                candidate_key: (rows <= 1).then(ColSet::new),
                can_have_side_effects: side_effects,
                has_hoistable_subquery: None,
            }
        }

        Op::Zip => {
            let Some(Payload::Cols(cols)) = &node.payload else {
                unreachable!("Zip without column list payload");
            };
            LogicalProps {
                output_cols: ColSet::from(cols),
                outer_cols: union_outer(memo, node),
                not_null_cols: ColSet::new(),
                cardinality: Cardinality::unbounded(),
                candidate_key: None,
                can_have_side_effects: side_effects,
                has_hoistable_subquery: None,
            }
        }

        Op::Select => {
            let input = memo.props(node.children[0]);
            let filter = memo.props(node.children[1]);
            LogicalProps {
                output_cols: input.output_cols.clone(),
                outer_cols: input
                    .outer_cols
                    .union(&filter.outer_cols.difference(&input.output_cols)),
                not_null_cols: input.not_null_cols.clone(),
                cardinality: Cardinality { min: 0, max: input.cardinality.max },
                candidate_key: input.candidate_key.clone(),
                can_have_side_effects: side_effects,
                has_hoistable_subquery: None,
            }
        }

        Op::Project => {
            let input = memo.props(node.children[0]);
            let projections = memo.node(node.children[1]);
            let Some(Payload::Projections(def)) = &projections.payload else {
                unreachable!("Project without Projections child");
            };
            let output_cols = ColSet::from(&def.synthesized).union(&def.passthrough);

            let mut not_null_cols =
                input.not_null_cols.iter().filter(|c| def.passthrough.contains(*c)).collect::<ColSet>();
            for (elem, col) in projections.children.iter().zip(&def.synthesized) {
                if elem_not_null(memo, *elem) {
                    not_null_cols.insert(*col);
                }
            }

            let proj_outer = memo.props(node.children[1]).outer_cols.clone();
            let candidate_key = match &input.candidate_key {
                Some(key) if key.is_subset(&output_cols) => Some(key.clone()),
                _ if input.cardinality.is_zero_or_one() => Some(ColSet::new()),
                _ => None,
            };
            LogicalProps {
                output_cols,
                outer_cols: input
                    .outer_cols
                    .union(&proj_outer.difference(&input.output_cols)),
                not_null_cols,
                cardinality: input.cardinality,
                candidate_key,
                can_have_side_effects: side_effects,
                has_hoistable_subquery: None,
            }
        }

        Op::Limit => {
            let input = memo.props(node.children[0]);
            let Some(Payload::Limit(fetch)) = &node.payload else {
                unreachable!("Limit without fetch payload");
            };
            let max = match input.cardinality.max {
                Some(max) => Some(max.min(*fetch)),
                None => Some(*fetch),
            };
            LogicalProps {
                output_cols: input.output_cols.clone(),
                outer_cols: input.outer_cols.clone(),
                not_null_cols: input.not_null_cols.clone(),
                cardinality: Cardinality { min: input.cardinality.min.min(*fetch), max },
                candidate_key: input.candidate_key.clone(),
                can_have_side_effects: side_effects,
                has_hoistable_subquery: None,
            }
        }

        op if op.is_join() => derive_join(memo, node),

        Op::ScalarGroupBy => {
            let input = memo.props(node.children[0]);
            let aggs_node = memo.node(node.children[1]);
            let Some(Payload::Cols(agg_cols)) = &aggs_node.payload else {
                unreachable!("ScalarGroupBy without Aggregations child");
            };
            let aggs_outer = memo.props(node.children[1]).outer_cols.clone();
            LogicalProps {
                output_cols: ColSet::from(agg_cols),
                outer_cols: input
                    .outer_cols
                    .union(&aggs_outer.difference(&input.output_cols)),
                not_null_cols: ColSet::new(),
                cardinality: Cardinality::exactly(1),
                candidate_key: Some(ColSet::new()),
                can_have_side_effects: side_effects,
                has_hoistable_subquery: None,
            }
        }

        Op::RowNumber => {
            let input = memo.props(node.children[0]);
            let Some(Payload::RowNumber(def)) = &node.payload else {
                unreachable!("RowNumber without definition payload");
            };
            let mut output_cols = input.output_cols.clone();
            output_cols.insert(def.col_id);
            let mut not_null_cols = input.not_null_cols.clone();
            not_null_cols.insert(def.col_id);
            LogicalProps {
                output_cols,
                outer_cols: input.outer_cols.clone(),
                not_null_cols,
                cardinality: input.cardinality,
                candidate_key: Some(ColSet::single(def.col_id)),
                can_have_side_effects: side_effects,
                has_hoistable_subquery: None,
            }
        }

        Op::Variable => {
            let Some(Payload::Column(col)) = &node.payload else {
                unreachable!("Variable without column payload");
            };
            LogicalProps::scalar(ColSet::single(*col), false)
        }

        Op::Projections => {
            let Some(Payload::Projections(def)) = &node.payload else {
                unreachable!("Projections without definition payload");
            };
            // Passthrough columns are references into the projection input,
            // resolved (or reported outer) by the enclosing Project.
            let outer = union_outer(memo, node).union(&def.passthrough);
            LogicalProps::scalar(outer, side_effects)
        }

        Op::Function => {
            let Some(Payload::Function(def)) = &node.payload else {
                unreachable!("Function without definition payload");
            };
            LogicalProps::scalar(union_outer(memo, node), def.has_side_effects || side_effects)
        }

        // Remaining scalar operators, including Subquery/Exists/Any whose
        // relational child's correlations propagate up as outer columns.
        _ => LogicalProps::scalar(union_outer(memo, node), side_effects),
    }
}

fn derive_join(memo: &Memo, node: &ExprNode) -> LogicalProps {
    let left = memo.props(node.children[0]).clone();
    let right = memo.props(node.children[1]).clone();
    let on_outer = memo.props(node.children[2]).outer_cols.clone();
    let side_effects = any_side_effects(memo, node);

    let both = left.output_cols.union(&right.output_cols);
    let output_cols = match node.op {
        Op::SemiJoin | Op::SemiJoinApply | Op::AntiJoin | Op::AntiJoinApply => {
            left.output_cols.clone()
        }
        _ => both.clone(),
    };

    let not_null_cols = match node.op {
        Op::InnerJoin | Op::InnerJoinApply => left.not_null_cols.union(&right.not_null_cols),
        Op::LeftJoin | Op::LeftJoinApply => left.not_null_cols.clone(),
        Op::RightJoin | Op::RightJoinApply => right.not_null_cols.clone(),
        Op::FullJoin | Op::FullJoinApply => ColSet::new(),
        _ => left.not_null_cols.clone(),
    };

    // The right side of an apply join may reference left columns; those
    // references are satisfied per-row by the join itself.
    let right_outer = if node.op.is_apply_join() {
        right.outer_cols.difference(&left.output_cols)
    } else {
        right.outer_cols.clone()
    };
    let outer_cols = left
        .outer_cols
        .union(&right_outer)
        .union(&on_outer.difference(&both));

    let lcard = left.cardinality;
    let rcard = right.cardinality;
    let cardinality = match node.op {
        Op::InnerJoin | Op::InnerJoinApply => Cardinality { min: 0, max: mul(lcard.max, rcard.max) },
        Op::LeftJoin | Op::LeftJoinApply => Cardinality {
            min: lcard.min,
            max: mul(lcard.max, rcard.max.map(|m| m.max(1))),
        },
        Op::RightJoin | Op::RightJoinApply => Cardinality {
            min: rcard.min,
            max: mul(lcard.max.map(|m| m.max(1)), rcard.max),
        },
        Op::FullJoin | Op::FullJoinApply => Cardinality {
            min: lcard.min.max(rcard.min),
            max: mul(lcard.max.map(|m| m.max(1)), rcard.max.map(|m| m.max(1))),
        },
        _ => Cardinality { min: 0, max: lcard.max },
    };

    let candidate_key = match node.op {
        Op::SemiJoin | Op::SemiJoinApply | Op::AntiJoin | Op::AntiJoinApply => {
            left.candidate_key.clone()
        }
        Op::InnerJoin | Op::InnerJoinApply | Op::LeftJoin | Op::LeftJoinApply
            if rcard.is_zero_or_one() =>
        {
            left.candidate_key.clone()
        }
        _ if cardinality.is_zero_or_one() => Some(ColSet::new()),
        _ => None,
    };

    LogicalProps {
        output_cols,
        outer_cols,
        not_null_cols,
        cardinality,
        candidate_key,
        can_have_side_effects: side_effects,
        has_hoistable_subquery: None,
    }
}
