//! The interned expression graph.
//!
//! Expressions form a DAG of immutable nodes addressed by `GroupId`. Nodes are
//! hash-consed: interning a node that is structurally identical to an existing
//! one returns the existing group id. Logical properties are derived bottom-up
//! once, when a node is first interned, and cached beside it.

use std::collections::HashMap;

use ecow::EcoString;
use ordered_float::NotNan;

use super::metadata::{ColList, ColSet, ColumnId, Metadata, ScalarType};
use super::ops::Op;
use super::props::{self, LogicalProps};

/// Addresses one interned expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u32);

/// A constant scalar value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datum {
    Bool(bool),
    Int(i64),
    Float(NotNan<f64>),
    String(EcoString),
    Null,
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }
}

/// Grouping definition for group-by operators. An empty grouping column set
/// is a scalar group-by: exactly one output row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupByDef {
    pub grouping_cols: ColSet,
    pub ordering: Option<ColList>,
}

/// Private payload of a RowNumber operator: the column that receives the
/// generated ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowNumberDef {
    pub col_id: ColumnId,
}

/// Private payload of a Projections operator. Synthesized columns pair
/// positionally with the node's scalar children; passthrough columns are
/// forwarded from the projection input unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProjectionsDef {
    pub synthesized: ColList,
    pub passthrough: ColSet,
}

/// Private payload of a Scan: the leaf relation's declared properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanDef {
    pub cols: ColList,
    pub key: Option<ColList>,
    pub not_null: ColSet,
}

/// Private payload of a scalar function call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDef {
    pub name: EcoString,
    pub has_side_effects: bool,
}

/// Operator-specific private payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    Column(ColumnId),
    Cols(ColList),
    Value(Datum),
    /// An operator tag used as data: the comparison operator of an Any.
    CmpOp(Op),
    GroupBy(GroupByDef),
    RowNumber(RowNumberDef),
    Projections(ProjectionsDef),
    Scan(ScanDef),
    Function(FunctionDef),
    Limit(u64),
}

/// One node of the expression DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExprNode {
    pub op: Op,
    pub children: Vec<GroupId>,
    pub payload: Option<Payload>,
}

/// The interned expression store: node arena, hash-cons index, column
/// metadata, and per-group logical properties.
#[derive(Default)]
pub struct Memo {
    nodes: Vec<ExprNode>,
    index: HashMap<ExprNode, GroupId>,
    props: Vec<LogicalProps>,
    metadata: Metadata,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a node, returning the existing group when a structurally
    /// identical node is already present.
    fn intern(&mut self, node: ExprNode) -> GroupId {
        if let Some(&id) = self.index.get(&node) {
            return id;
        }
        let derived = props::derive(self, &node);
        let id = GroupId(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.props.push(derived);
        self.index.insert(node, id);
        id
    }

    pub fn node(&self, group: GroupId) -> &ExprNode {
        &self.nodes[group.0 as usize]
    }

    pub fn op(&self, group: GroupId) -> Op {
        self.node(group).op
    }

    pub fn child(&self, group: GroupId, n: usize) -> GroupId {
        self.node(group).children[n]
    }

    pub fn props(&self, group: GroupId) -> &LogicalProps {
        &self.props[group.0 as usize]
    }

    /// Latch the cached hoistability flag for a scalar group. The slot is
    /// write-once: later writes must agree with the first.
    pub(crate) fn set_has_hoistable_subquery(&mut self, group: GroupId, value: bool) {
        let slot = &mut self.props[group.0 as usize].has_hoistable_subquery;
        debug_assert!(slot.is_none() || *slot == Some(value));
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Register a new metadata column, returning its fresh id.
    pub fn add_column(&mut self, name: &str, data_type: ScalarType) -> ColumnId {
        self.metadata.add_column(name, data_type)
    }

    /// Rebuild a node with new children, keeping its operator and payload.
    /// Interning makes this the identity when no child changed.
    pub fn reconstruct(&mut self, group: GroupId, children: Vec<GroupId>) -> GroupId {
        let node = self.node(group);
        debug_assert_eq!(node.children.len(), children.len());
        let rebuilt = ExprNode {
            op: node.op,
            children,
            payload: node.payload.clone(),
        };
        self.intern(rebuilt)
    }

    // ==================== Relational constructors ====================

    pub fn construct_scan(&mut self, def: ScanDef) -> GroupId {
        self.intern(ExprNode {
            op: Op::Scan,
            children: Vec::new(),
            payload: Some(Payload::Scan(def)),
        })
    }

    /// Rows must be Tuple nodes with arity matching `cols`.
    pub fn construct_values(&mut self, rows: Vec<GroupId>, cols: ColList) -> GroupId {
        debug_assert!(rows.iter().all(|&r| self.op(r) == Op::Tuple));
        self.intern(ExprNode {
            op: Op::Values,
            children: rows,
            payload: Some(Payload::Cols(cols)),
        })
    }

    pub fn construct_zip(&mut self, funcs: Vec<GroupId>, cols: ColList) -> GroupId {
        self.intern(ExprNode {
            op: Op::Zip,
            children: funcs,
            payload: Some(Payload::Cols(cols)),
        })
    }

    /// A Values with a single empty tuple: one row, no columns. The seed
    /// input for hoisting out of Values and Zip operators.
    pub fn construct_no_cols_row(&mut self) -> GroupId {
        let empty = self.construct_tuple(Vec::new());
        self.construct_values(vec![empty], ColList::new())
    }

    pub fn construct_select(&mut self, input: GroupId, filter: GroupId) -> GroupId {
        self.intern(ExprNode {
            op: Op::Select,
            children: vec![input, filter],
            payload: None,
        })
    }

    /// `projections` must be a Projections node.
    pub fn construct_project(&mut self, input: GroupId, projections: GroupId) -> GroupId {
        debug_assert_eq!(self.op(projections), Op::Projections);
        self.intern(ExprNode {
            op: Op::Project,
            children: vec![input, projections],
            payload: None,
        })
    }

    /// Project the input to the given columns, hiding everything else.
    pub fn construct_simple_project(&mut self, input: GroupId, cols: ColSet) -> GroupId {
        let projections = self.construct_projections(
            Vec::new(),
            ProjectionsDef {
                synthesized: ColList::new(),
                passthrough: cols,
            },
        );
        self.construct_project(input, projections)
    }

    /// Pass the input through and add one synthesized column computed by
    /// `scalar`.
    pub fn project_extra_col(&mut self, input: GroupId, scalar: GroupId, col: ColumnId) -> GroupId {
        let passthrough = self.props(input).output_cols.clone();
        let projections = self.construct_projections(
            vec![scalar],
            ProjectionsDef {
                synthesized: vec![col],
                passthrough,
            },
        );
        self.construct_project(input, projections)
    }

    pub fn construct_limit(&mut self, input: GroupId, fetch: u64) -> GroupId {
        self.intern(ExprNode {
            op: Op::Limit,
            children: vec![input],
            payload: Some(Payload::Limit(fetch)),
        })
    }

    /// Construct any join variant. `op` must be a join operator.
    pub fn construct_join(&mut self, op: Op, left: GroupId, right: GroupId, on: GroupId) -> GroupId {
        debug_assert!(op.is_join());
        self.intern(ExprNode {
            op,
            children: vec![left, right, on],
            payload: None,
        })
    }

    pub fn construct_inner_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        on: GroupId,
    ) -> GroupId {
        self.construct_join(Op::InnerJoinApply, left, right, on)
    }

    pub fn construct_left_join_apply(
        &mut self,
        left: GroupId,
        right: GroupId,
        on: GroupId,
    ) -> GroupId {
        self.construct_join(Op::LeftJoinApply, left, right, on)
    }

    /// `aggs` must be an Aggregations node.
    pub fn construct_scalar_group_by(
        &mut self,
        input: GroupId,
        aggs: GroupId,
        def: GroupByDef,
    ) -> GroupId {
        debug_assert_eq!(self.op(aggs), Op::Aggregations);
        debug_assert!(def.grouping_cols.is_empty());
        self.intern(ExprNode {
            op: Op::ScalarGroupBy,
            children: vec![input, aggs],
            payload: Some(Payload::GroupBy(def)),
        })
    }

    pub fn construct_row_number(&mut self, input: GroupId, def: RowNumberDef) -> GroupId {
        self.intern(ExprNode {
            op: Op::RowNumber,
            children: vec![input],
            payload: Some(Payload::RowNumber(def)),
        })
    }

    // ==================== Scalar constructors ====================

    pub fn construct_variable(&mut self, col: ColumnId) -> GroupId {
        self.intern(ExprNode {
            op: Op::Variable,
            children: Vec::new(),
            payload: Some(Payload::Column(col)),
        })
    }

    pub fn construct_const(&mut self, value: Datum) -> GroupId {
        self.intern(ExprNode {
            op: Op::Const,
            children: Vec::new(),
            payload: Some(Payload::Value(value)),
        })
    }

    pub fn construct_true(&mut self) -> GroupId {
        self.intern(ExprNode {
            op: Op::True,
            children: Vec::new(),
            payload: None,
        })
    }

    pub fn construct_false(&mut self) -> GroupId {
        self.intern(ExprNode {
            op: Op::False,
            children: Vec::new(),
            payload: None,
        })
    }

    pub fn construct_null(&mut self) -> GroupId {
        self.intern(ExprNode {
            op: Op::Null,
            children: Vec::new(),
            payload: None,
        })
    }

    /// Dynamic binary construction: the operator is chosen at runtime.
    /// `op` must be a binary scalar operator.
    pub fn construct_binary(&mut self, op: Op, left: GroupId, right: GroupId) -> GroupId {
        debug_assert!(op.is_binary_scalar());
        self.intern(ExprNode {
            op,
            children: vec![left, right],
            payload: None,
        })
    }

    pub fn construct_is(&mut self, left: GroupId, right: GroupId) -> GroupId {
        self.construct_binary(Op::Is, left, right)
    }

    pub fn construct_is_not(&mut self, left: GroupId, right: GroupId) -> GroupId {
        self.construct_binary(Op::IsNot, left, right)
    }

    pub fn construct_and(&mut self, left: GroupId, right: GroupId) -> GroupId {
        self.construct_binary(Op::And, left, right)
    }

    pub fn construct_or(&mut self, left: GroupId, right: GroupId) -> GroupId {
        self.construct_binary(Op::Or, left, right)
    }

    pub fn construct_not(&mut self, input: GroupId) -> GroupId {
        self.intern(ExprNode {
            op: Op::Not,
            children: vec![input],
            payload: None,
        })
    }

    pub fn construct_tuple(&mut self, elems: Vec<GroupId>) -> GroupId {
        self.intern(ExprNode {
            op: Op::Tuple,
            children: elems,
            payload: None,
        })
    }

    pub fn construct_function(&mut self, args: Vec<GroupId>, def: FunctionDef) -> GroupId {
        self.intern(ExprNode {
            op: Op::Function,
            children: args,
            payload: Some(Payload::Function(def)),
        })
    }

    /// `branches` are When nodes, optionally followed by one trailing
    /// else expression.
    pub fn construct_case(&mut self, input: GroupId, branches: Vec<GroupId>) -> GroupId {
        let mut children = Vec::with_capacity(branches.len() + 1);
        children.push(input);
        children.extend(branches);
        self.intern(ExprNode {
            op: Op::Case,
            children,
            payload: None,
        })
    }

    pub fn construct_when(&mut self, condition: GroupId, value: GroupId) -> GroupId {
        self.intern(ExprNode {
            op: Op::When,
            children: vec![condition, value],
            payload: None,
        })
    }

    pub fn construct_subquery(&mut self, input: GroupId) -> GroupId {
        self.intern(ExprNode {
            op: Op::Subquery,
            children: vec![input],
            payload: None,
        })
    }

    pub fn construct_exists(&mut self, input: GroupId) -> GroupId {
        self.intern(ExprNode {
            op: Op::Exists,
            children: vec![input],
            payload: None,
        })
    }

    /// `cmp` must be a comparison operator; it is carried as data and applied
    /// between the left operand and the subquery column during rewriting.
    pub fn construct_any(&mut self, input: GroupId, scalar: GroupId, cmp: Op) -> GroupId {
        debug_assert!(cmp.is_comparison());
        self.intern(ExprNode {
            op: Op::Any,
            children: vec![input, scalar],
            payload: Some(Payload::CmpOp(cmp)),
        })
    }

    pub fn construct_projections(&mut self, elems: Vec<GroupId>, def: ProjectionsDef) -> GroupId {
        debug_assert_eq!(elems.len(), def.synthesized.len());
        self.intern(ExprNode {
            op: Op::Projections,
            children: elems,
            payload: Some(Payload::Projections(def)),
        })
    }

    /// Aggregate expressions paired positionally with their output columns.
    pub fn construct_aggregations(&mut self, aggs: Vec<GroupId>, cols: ColList) -> GroupId {
        debug_assert_eq!(aggs.len(), cols.len());
        debug_assert!(aggs.iter().all(|&a| self.op(a).is_aggregate()));
        self.intern(ExprNode {
            op: Op::Aggregations,
            children: aggs,
            payload: Some(Payload::Cols(cols)),
        })
    }

    /// Dynamic unary aggregate construction. `op` must be a unary aggregate
    /// (CountRows is nullary and has its own constructor).
    pub fn construct_aggregate(&mut self, op: Op, arg: GroupId) -> GroupId {
        debug_assert!(op.is_aggregate() && op != Op::CountRows);
        self.intern(ExprNode {
            op,
            children: vec![arg],
            payload: None,
        })
    }

    pub fn construct_count(&mut self, arg: GroupId) -> GroupId {
        self.construct_aggregate(Op::Count, arg)
    }

    pub fn construct_count_rows(&mut self) -> GroupId {
        self.intern(ExprNode {
            op: Op::CountRows,
            children: Vec::new(),
            payload: None,
        })
    }

    pub fn construct_const_agg(&mut self, arg: GroupId) -> GroupId {
        self.construct_aggregate(Op::ConstAgg, arg)
    }

    pub fn construct_const_not_null_agg(&mut self, arg: GroupId) -> GroupId {
        self.construct_aggregate(Op::ConstNotNullAgg, arg)
    }

    pub fn construct_bool_or(&mut self, arg: GroupId) -> GroupId {
        self.construct_aggregate(Op::BoolOr, arg)
    }
}
