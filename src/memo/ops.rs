use strum_macros::AsRefStr;

/// Operator tags for expression nodes.
///
/// The set is closed: every node in the expression graph carries exactly one
/// of these tags, and transformations dispatch on it with exhaustive matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
pub enum Op {
    // Relational
    Scan,
    Values,
    Zip,
    Select,
    Project,
    Limit,
    InnerJoin,
    LeftJoin,
    RightJoin,
    FullJoin,
    SemiJoin,
    AntiJoin,
    InnerJoinApply,
    LeftJoinApply,
    RightJoinApply,
    FullJoinApply,
    SemiJoinApply,
    AntiJoinApply,
    ScalarGroupBy,
    RowNumber,

    // Scalar
    Variable,
    Const,
    True,
    False,
    Null,
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "IS")]
    Is,
    #[strum(serialize = "IS NOT")]
    IsNot,
    And,
    Or,
    Not,
    Tuple,
    Function,
    Case,
    When,
    Subquery,
    Exists,
    Any,
    Projections,
    Aggregations,

    // Aggregate
    Count,
    CountRows,
    ConstAgg,
    ConstNotNullAgg,
    BoolOr,
    Min,
    Max,
    Sum,
    ArrayAgg,
}

impl Op {
    /// True for every join operator, apply or not.
    pub fn is_join(self) -> bool {
        self.is_non_apply_join() || self.is_apply_join()
    }

    pub fn is_non_apply_join(self) -> bool {
        matches!(
            self,
            Op::InnerJoin | Op::LeftJoin | Op::RightJoin | Op::FullJoin | Op::SemiJoin | Op::AntiJoin
        )
    }

    /// Apply (lateral) joins evaluate their right side once per left row,
    /// with the left row's columns in scope.
    pub fn is_apply_join(self) -> bool {
        matches!(
            self,
            Op::InnerJoinApply
                | Op::LeftJoinApply
                | Op::RightJoinApply
                | Op::FullJoinApply
                | Op::SemiJoinApply
                | Op::AntiJoinApply
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge)
    }

    /// Scalar operators that take exactly two operands. These are the tags
    /// accepted by the dynamic binary constructor.
    pub fn is_binary_scalar(self) -> bool {
        self.is_comparison() || matches!(self, Op::Is | Op::IsNot | Op::And | Op::Or)
    }

    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            Op::Count
                | Op::CountRows
                | Op::ConstAgg
                | Op::ConstNotNullAgg
                | Op::BoolOr
                | Op::Min
                | Op::Max
                | Op::Sum
                | Op::ArrayAgg
        )
    }

    /// True if the aggregate's result is invariant under adding or removing
    /// all-null input rows.
    ///
    /// CountRows and ConstAgg are NOT null-ignoring on their own; they have
    /// null-ignoring remappings (Count over a not-null column, ConstNotNullAgg)
    /// applied by `ensure_aggs_ignore_nulls`.
    pub fn aggregate_ignores_nulls(self) -> bool {
        matches!(
            self,
            Op::Count | Op::ConstNotNullAgg | Op::BoolOr | Op::Min | Op::Max | Op::Sum
        )
    }

    /// Constant scalar values: literals and the boolean/null keywords.
    pub fn is_const_value(self) -> bool {
        matches!(self, Op::Const | Op::True | Op::False | Op::Null)
    }
}
