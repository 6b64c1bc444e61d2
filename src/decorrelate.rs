//! Subquery decorrelation building blocks.
//!
//! Correlated subqueries (subqueries referencing columns of an enclosing
//! query) cannot be executed as ordinary joins. The hoister in this module
//! lifts each correlated `Subquery`/`Exists`/`Any` operator out of its scalar
//! context, re-expresses it as a one-row one-column relation, and chains it
//! onto the enclosing relational input with a lateral apply join. The scalar
//! tree is left holding a plain `Variable` reference to the hoisted column,
//! so a later pass can turn the apply joins into hash/merge-joinable plans.
//!
//! The module also carries the helper transformations that pass needs:
//! rewriting aggregate lists so they ignore nulls (outer joins introduced by
//! decorrelation pad with nulls), synthesizing key columns for relations that
//! lack one, and constructing apply/non-apply join variants uniformly.

#![allow(clippy::wildcard_enum_match_arm)]

use error_set::error_set;
use rootcause::Report;
use tracing::{debug, trace};

use crate::memo::expr::{
    GroupByDef, GroupId, Memo, Payload, ProjectionsDef, RowNumberDef,
};
use crate::memo::metadata::{ColList, ColSet, ColumnId, ScalarType};
use crate::memo::ops::Op;
use crate::result::ReportExt;

error_set! {
    HoistError := {
        #[display("unexpected join operator: {op}")]
        UnexpectedJoinOperator { op: String },
        #[display("unexpected binary operator: {op}")]
        UnexpectedBinaryOperator { op: String },
        #[display("expected expression to have exactly one output column, found {count}")]
        NotSingleColumn { count: usize },
        #[display("expected relation to have a candidate key")]
        MissingCandidateKey,
        #[display("expected input to have a not-null column for CountRows remapping")]
        MissingNotNullColumn,
    }
}

/// All `HoistError`s are programming errors: they indicate a malformed input
/// graph or a broken rewrite invariant, and the enclosing pass must abort.
pub type HoistResult<T> = Result<T, Report<HoistError>>;

/// Reports whether the scalar subtree rooted at `group` contains at least one
/// correlated `Subquery`/`Exists`/`Any` operator that can legally be lifted
/// into the parent query.
///
/// The result is latched in the group's cached properties, so repeated calls
/// over a shared subtree cost one traversal total.
///
/// A subquery inside a conditional branch can only be hoisted if the branch
/// cannot have side effects: hoisting evaluates the branch unconditionally,
/// which would make the side effects observable.
pub fn has_hoistable_subquery(memo: &mut Memo, group: GroupId) -> bool {
    if let Some(cached) = memo.props(group).has_hoistable_subquery {
        return cached;
    }
    let result = compute_has_hoistable_subquery(memo, group);
    memo.set_has_hoistable_subquery(group, result);
    result
}

fn compute_has_hoistable_subquery(memo: &mut Memo, group: GroupId) -> bool {
    let op = memo.op(group);
    match op {
        Op::Subquery | Op::Exists | Op::Any => !memo.props(group).outer_cols.is_empty(),
        _ => {
            let children = memo.node(group).children.clone();
            for (i, child) in children.into_iter().enumerate() {
                if !has_hoistable_subquery(memo, child) {
                    continue;
                }
                let eligible = match op {
                    // The Else child is any non-When child at index > 0.
                    Op::Case if i > 0 && memo.op(child) != Op::When => {
                        !memo.props(child).can_have_side_effects
                    }
                    // Child 1 of a When is the branch value.
                    Op::When if i == 1 => !memo.props(child).can_have_side_effects,
                    _ => true,
                };
                if eligible {
                    return true;
                }
            }
            false
        }
    }
}

/// Searches a Select's filter for correlated subqueries and hoists them into
/// apply joins on the Select's input:
///
/// ```text
///   SELECT * FROM xy WHERE (SELECT u FROM uv WHERE u=x LIMIT 1) IS NULL
///   =>
///   SELECT xy.*
///   FROM xy
///   LEFT JOIN LATERAL (SELECT u FROM uv WHERE u=x LIMIT 1) ON True
///   WHERE u IS NULL
/// ```
///
/// The result is projected back to the input's output columns so the hoisted
/// columns stay hidden from callers.
pub fn hoist_select_subquery(memo: &mut Memo, input: GroupId, filter: GroupId) -> HoistResult<GroupId> {
    debug!("hoisting subqueries from select filter");
    let mut hoister = SubqueryHoister::new(memo, input);
    let replaced = hoister.hoist_all(filter).attach_loc("hoisting select filter")?;
    let hoisted = hoister.input();
    let select = memo.construct_select(hoisted, replaced);
    let out_cols = memo.props(input).output_cols.clone();
    Ok(memo.construct_simple_project(select, out_cols))
}

/// Searches a Project's projections for correlated subqueries:
///
/// ```text
///   SELECT (SELECT max(u) FROM uv WHERE u=x) FROM xy
///   =>
///   SELECT u
///   FROM xy
///   INNER JOIN LATERAL (SELECT max(u) FROM uv WHERE u=x) ON True
/// ```
pub fn hoist_project_subquery(
    memo: &mut Memo,
    input: GroupId,
    projections: GroupId,
) -> HoistResult<GroupId> {
    debug!("hoisting subqueries from projections");
    let mut hoister = SubqueryHoister::new(memo, input);
    let replaced = hoister.hoist_all(projections).attach_loc("hoisting projections")?;
    let hoisted = hoister.input();
    Ok(memo.construct_project(hoisted, replaced))
}

/// Searches a join's on-condition for correlated subqueries. Hoisted
/// subqueries chain onto the right input, and the join becomes the apply
/// variant of `op` since its right side now references left columns. The
/// result is projected to the visible columns of both original inputs.
pub fn hoist_join_subquery(
    memo: &mut Memo,
    op: Op,
    left: GroupId,
    right: GroupId,
    on: GroupId,
) -> HoistResult<GroupId> {
    debug!(op = op.as_ref(), "hoisting subqueries from join filter");
    let mut hoister = SubqueryHoister::new(memo, right);
    let replaced = hoister.hoist_all(on).attach_loc("hoisting join filter")?;
    let hoisted = hoister.input();
    let join = construct_apply_join(memo, op, left, hoisted, replaced)?;
    let cols = memo
        .props(left)
        .output_cols
        .union(&memo.props(right).output_cols);
    Ok(memo.construct_simple_project(join, cols))
}

/// Searches Values rows for correlated subqueries. The hoister is seeded
/// with a one-row zero-column relation, since it requires an initial input:
///
/// ```text
///   (VALUES ((SELECT u FROM uv WHERE u=x LIMIT 1)))
///   =>
///   SELECT vals.*
///   FROM (VALUES ())
///   LEFT JOIN LATERAL (SELECT u FROM uv WHERE u=x LIMIT 1) ON True
///   INNER JOIN LATERAL (VALUES (u)) vals ON True
/// ```
pub fn hoist_values_subquery(
    memo: &mut Memo,
    rows: &[GroupId],
    cols: ColList,
) -> HoistResult<GroupId> {
    debug!(rows = rows.len(), "hoisting subqueries from values rows");
    let seed = memo.construct_no_cols_row();
    let mut hoister = SubqueryHoister::new(memo, seed);
    let mut replaced = Vec::with_capacity(rows.len());
    for &row in rows {
        replaced.push(hoister.hoist_all(row).attach_loc("hoisting values row")?);
    }
    let hoisted = hoister.input();
    let values = memo.construct_values(replaced, cols);
    let proj_cols = memo.props(values).output_cols.clone();
    let on = memo.construct_true();
    let join = memo.construct_inner_join_apply(hoisted, values, on);
    Ok(memo.construct_simple_project(join, proj_cols))
}

/// Searches a Zip's function calls for correlated subqueries. Symmetric to
/// `hoist_values_subquery`, with a Zip in place of the Values.
pub fn hoist_zip_subquery(
    memo: &mut Memo,
    funcs: &[GroupId],
    cols: ColList,
) -> HoistResult<GroupId> {
    debug!(funcs = funcs.len(), "hoisting subqueries from zip functions");
    let seed = memo.construct_no_cols_row();
    let mut hoister = SubqueryHoister::new(memo, seed);
    let mut replaced = Vec::with_capacity(funcs.len());
    for &func in funcs {
        replaced.push(hoister.hoist_all(func).attach_loc("hoisting zip function")?);
    }
    let hoisted = hoister.input();
    let zip = memo.construct_zip(replaced, cols);
    let proj_cols = memo.props(zip).output_cols.clone();
    let on = memo.construct_true();
    let join = memo.construct_inner_join_apply(hoisted, zip, on);
    Ok(memo.construct_simple_project(join, proj_cols))
}

/// Constructs the non-apply join variant corresponding to the given join
/// operator.
pub fn construct_non_apply_join(
    memo: &mut Memo,
    op: Op,
    left: GroupId,
    right: GroupId,
    on: GroupId,
) -> HoistResult<GroupId> {
    let kind = match op {
        Op::InnerJoin | Op::InnerJoinApply => Op::InnerJoin,
        Op::LeftJoin | Op::LeftJoinApply => Op::LeftJoin,
        Op::RightJoin | Op::RightJoinApply => Op::RightJoin,
        Op::FullJoin | Op::FullJoinApply => Op::FullJoin,
        Op::SemiJoin | Op::SemiJoinApply => Op::SemiJoin,
        Op::AntiJoin | Op::AntiJoinApply => Op::AntiJoin,
        other => {
            return Err(HoistError::UnexpectedJoinOperator { op: other.as_ref().to_owned() }.into());
        }
    };
    Ok(memo.construct_join(kind, left, right, on))
}

/// Constructs the apply join variant corresponding to the given join
/// operator.
pub fn construct_apply_join(
    memo: &mut Memo,
    op: Op,
    left: GroupId,
    right: GroupId,
    on: GroupId,
) -> HoistResult<GroupId> {
    let kind = match op {
        Op::InnerJoin | Op::InnerJoinApply => Op::InnerJoinApply,
        Op::LeftJoin | Op::LeftJoinApply => Op::LeftJoinApply,
        Op::RightJoin | Op::RightJoinApply => Op::RightJoinApply,
        Op::FullJoin | Op::FullJoinApply => Op::FullJoinApply,
        Op::SemiJoin | Op::SemiJoinApply => Op::SemiJoinApply,
        Op::AntiJoin | Op::AntiJoinApply => Op::AntiJoinApply,
        other => {
            return Err(HoistError::UnexpectedJoinOperator { op: other.as_ref().to_owned() }.into());
        }
    };
    Ok(memo.construct_join(kind, left, right, on))
}

/// True if every aggregate in the Aggregations node either ignores nulls or
/// can be remapped to a null-ignoring form by `ensure_aggs_ignore_nulls`:
/// CountRows becomes Count over a not-null column, ConstAgg becomes
/// ConstNotNullAgg.
pub fn can_aggs_ignore_nulls(memo: &Memo, aggs: GroupId) -> bool {
    memo.node(aggs).children.iter().all(|&agg| {
        let op = memo.op(agg);
        op == Op::CountRows || op == Op::ConstAgg || op.aggregate_ignores_nulls()
    })
}

/// Returns `input`, wrapped in a Project that synthesizes a True-valued
/// column when the aggregate list contains a CountRows and the input has no
/// not-null column. The synthesized column gives `ensure_aggs_ignore_nulls`
/// a non-null witness to count.
pub fn ensure_not_null_if_count_rows(memo: &mut Memo, input: GroupId, aggs: GroupId) -> GroupId {
    if memo.props(input).not_null_cols.first().is_some() {
        return input;
    }
    let has_count_rows = memo
        .node(aggs)
        .children
        .iter()
        .any(|&agg| memo.op(agg) == Op::CountRows);
    if !has_count_rows {
        return input;
    }
    let witness = memo.add_column("notnull", ScalarType::Bool);
    let t = memo.construct_true();
    memo.project_extra_col(input, t, witness)
}

/// Rewrites the aggregate list so that every aggregate ignores nulls:
/// ConstAgg becomes ConstNotNullAgg, CountRows becomes Count over the
/// input's first not-null column. `ensure_not_null_if_count_rows` must have
/// been applied to `input` beforehand so that such a column exists.
///
/// The rewritten list is invariant under padding the grouping set with
/// all-null rows, which is what makes it safe to push an outer apply join
/// below the group-by.
pub fn ensure_aggs_ignore_nulls(memo: &mut Memo, input: GroupId, aggs: GroupId) -> HoistResult<GroupId> {
    let elems = memo.node(aggs).children.clone();
    let Some(Payload::Cols(cols)) = memo.node(aggs).payload.clone() else {
        unreachable!("Aggregations without column list payload");
    };

    let mut replaced = Vec::with_capacity(elems.len());
    let mut changed = false;
    for elem in elems {
        match memo.op(elem) {
            Op::ConstAgg => {
                let arg = memo.child(elem, 0);
                replaced.push(memo.construct_const_not_null_agg(arg));
                changed = true;
            }
            Op::CountRows => {
                let witness = memo
                    .props(input)
                    .not_null_cols
                    .first()
                    .ok_or(HoistError::MissingNotNullColumn)?;
                let var = memo.construct_variable(witness);
                replaced.push(memo.construct_count(var));
                changed = true;
            }
            _ => replaced.push(elem),
        }
    }
    if !changed {
        return Ok(aggs);
    }
    Ok(memo.construct_aggregations(replaced, cols))
}

/// Returns `input` if it has a candidate key; otherwise wraps it in a
/// RowNumber operator, which numbers the rows and thereby provides one.
pub fn ensure_key(memo: &mut Memo, input: GroupId) -> GroupId {
    if memo.props(input).candidate_key.is_some() {
        return input;
    }
    let col_id = memo.add_column("rownum", ScalarType::Int);
    memo.construct_row_number(input, RowNumberDef { col_id })
}

/// The columns making up the group's candidate key, which must exist.
pub fn key_cols(memo: &Memo, group: GroupId) -> HoistResult<ColSet> {
    memo.props(group)
        .candidate_key
        .clone()
        .ok_or_else(|| HoistError::MissingCandidateKey.into())
}

/// The group's output columns minus its candidate key, which must exist.
pub fn non_key_cols(memo: &Memo, group: GroupId) -> HoistResult<ColSet> {
    let key = key_cols(memo, group)?;
    Ok(memo.props(group).output_cols.difference(&key))
}

/// Builds an Aggregations node with one aggregate of kind `agg_op` per
/// column, aggregating that column into itself:
///
/// ```text
///   (Aggregations [(ConstAgg (Variable 1)) (ConstAgg (Variable 2))] [1,2])
/// ```
pub fn make_agg_cols(memo: &mut Memo, agg_op: Op, cols: &ColSet) -> GroupId {
    let col_list = cols.to_list();
    let elems: Vec<_> = col_list
        .iter()
        .map(|&col| {
            let var = memo.construct_variable(col);
            memo.construct_aggregate(agg_op, var)
        })
        .collect();
    memo.construct_aggregations(elems, col_list)
}

/// Like `make_agg_cols`, except two aggregate kinds over two column sets,
/// with the second list appended to the first.
pub fn make_agg_cols2(
    memo: &mut Memo,
    agg_op1: Op,
    cols1: &ColSet,
    agg_op2: Op,
    cols2: &ColSet,
) -> GroupId {
    let mut col_list = cols1.to_list();
    col_list.extend(cols2.iter());
    let elems: Vec<_> = cols1
        .iter()
        .map(|col| (agg_op1, col))
        .chain(cols2.iter().map(|col| (agg_op2, col)))
        .map(|(op, col)| {
            let var = memo.construct_variable(col);
            memo.construct_aggregate(op, var)
        })
        .collect();
    memo.construct_aggregations(elems, col_list)
}

/// An unordered grouping definition over the given columns.
pub fn make_group_by_def(grouping_cols: ColSet) -> GroupByDef {
    GroupByDef { grouping_cols, ordering: None }
}

/// A grouping definition with a required internal ordering.
pub fn make_ordered_group_by_def(grouping_cols: ColSet, ordering: ColList) -> GroupByDef {
    GroupByDef { grouping_cols, ordering: Some(ordering) }
}

/// A copy of `def` with `cols` unioned into its grouping columns.
pub fn add_cols_to_group_by_def(def: &GroupByDef, cols: &ColSet) -> GroupByDef {
    GroupByDef {
        grouping_cols: def.grouping_cols.union(cols),
        ordering: def.ordering.clone(),
    }
}

/// Builds `cmp(scalar, col)` where `col` is the one and only column produced
/// by `input`.
pub fn construct_any_condition(
    memo: &mut Memo,
    input: GroupId,
    scalar: GroupId,
    cmp: Op,
) -> HoistResult<GroupId> {
    let input_var = reference_single_column(memo, input)?;
    construct_binary(memo, cmp, scalar, input_var)
}

/// Dynamic binary construction: the operator tag is data. Non-binary tags
/// are rejected.
pub fn construct_binary(memo: &mut Memo, op: Op, left: GroupId, right: GroupId) -> HoistResult<GroupId> {
    if !op.is_binary_scalar() {
        return Err(HoistError::UnexpectedBinaryOperator { op: op.as_ref().to_owned() }.into());
    }
    Ok(memo.construct_binary(op, left, right))
}

fn single_output_column(memo: &Memo, group: GroupId) -> HoistResult<ColumnId> {
    let cols = &memo.props(group).output_cols;
    match (cols.first(), cols.len()) {
        (Some(col), 1) => Ok(col),
        (_, count) => Err(HoistError::NotSingleColumn { count }.into()),
    }
}

/// A Variable referring to the one and only column projected by `group`.
fn reference_single_column(memo: &mut Memo, group: GroupId) -> HoistResult<GroupId> {
    let col = single_output_column(memo, group)?;
    Ok(memo.construct_variable(col))
}

/// Walks scalar expression trees looking for correlated subqueries, pulling
/// each up into a lateral join on a growing relational input.
///
/// Each hoisted subquery wraps the previous input, with the caller-supplied
/// relation at the base, so subqueries found earlier sit deeper in the join
/// chain. Every hoisted relation adds exactly one column and at most one row
/// per input row, so the chain never changes the input's cardinality.
struct SubqueryHoister<'a> {
    memo: &'a mut Memo,
    input: GroupId,
}

impl<'a> SubqueryHoister<'a> {
    fn new(memo: &'a mut Memo, input: GroupId) -> Self {
        SubqueryHoister { memo, input }
    }

    /// The original input wrapped with all joins hoisted so far.
    fn input(&self) -> GroupId {
        self.input
    }

    /// Replaces every correlated `Subquery`/`Exists`/`Any` in the subtree
    /// with a Variable referring to the first (and only) column of its
    /// hoisted relation, accumulating the relations onto `self.input`.
    ///
    /// The join kind follows the subquery's cardinality: a subquery that can
    /// produce zero rows is attached with LeftJoinApply so the outer row
    /// survives (padded with nulls); otherwise InnerJoinApply, which handles
    /// nulls more simply and leaves the downstream optimizer more choices.
    fn hoist_all(&mut self, root: GroupId) -> HoistResult<GroupId> {
        let op = self.memo.op(root);
        match op {
            Op::Subquery | Op::Exists | Op::Any => {
                if self.memo.props(root).outer_cols.is_empty() {
                    // An uncorrelated subquery nested inside a correlated
                    // scalar is left in place; the nested-subquery pass owns
                    // it.
                    return Ok(root);
                }
                let sub = match op {
                    Op::Exists => {
                        let input = self.memo.child(root, 0);
                        self.construct_group_by_exists(input)
                    }
                    Op::Any => {
                        let input = self.memo.child(root, 0);
                        let scalar = self.memo.child(root, 1);
                        let cmp = match &self.memo.node(root).payload {
                            Some(Payload::CmpOp(cmp)) => *cmp,
                            _ => unreachable!("Any without comparison payload"),
                        };
                        self.construct_group_by_any(scalar, cmp, input)?
                    }
                    _ => self.memo.child(root, 0),
                };

                let col = single_output_column(self.memo, sub)?;
                let on = self.memo.construct_true();
                if self.memo.props(sub).cardinality.can_be_zero() {
                    trace!("hoisting subquery with left join apply");
                    self.input = self.memo.construct_left_join_apply(self.input, sub, on);
                } else {
                    trace!("hoisting subquery with inner join apply");
                    self.input = self.memo.construct_inner_join_apply(self.input, sub, on);
                }
                Ok(self.memo.construct_variable(col))
            }
            _ => {
                let children = self.memo.node(root).children.clone();
                let mut replaced = Vec::with_capacity(children.len());
                for child in children {
                    if has_hoistable_subquery(self.memo, child) {
                        replaced.push(self.hoist_all(child)?);
                    } else {
                        replaced.push(child);
                    }
                }
                Ok(self.memo.reconstruct(root, replaced))
            }
        }
    }

    /// Rewrites `EXISTS(<subquery>)` into a one-row one-column relation:
    ///
    /// ```text
    ///   SELECT (CONST_AGG(True) IS NOT NULL) AS exists
    ///   FROM (SELECT True AS true FROM <subquery>)
    /// ```
    ///
    /// The scalar group-by always yields exactly one row. ConstAgg returns
    /// its first input value, or null over the empty set, so the IS NOT NULL
    /// maps non-empty to true and empty to false. ConstAgg rather than
    /// COUNT(*) > 0: a later decorrelation step may push a left join into
    /// the group-by, and ConstAgg has a null-ignoring remapping
    /// (ConstNotNullAgg) that keeps the padded rows invisible.
    fn construct_group_by_exists(&mut self, subquery: GroupId) -> GroupId {
        let memo = &mut *self.memo;

        let true_col = memo.add_column("true", ScalarType::Bool);
        let agg_col = memo.add_column("true_agg", ScalarType::Bool);
        let exists_col = memo.add_column("exists", ScalarType::Bool);

        let t = memo.construct_true();
        let true_projections = memo.construct_projections(
            vec![t],
            ProjectionsDef { synthesized: vec![true_col], passthrough: ColSet::new() },
        );
        let true_project = memo.construct_project(subquery, true_projections);

        let true_var = memo.construct_variable(true_col);
        let const_agg = memo.construct_const_agg(true_var);
        let aggs = memo.construct_aggregations(vec![const_agg], vec![agg_col]);
        let group_by = memo.construct_scalar_group_by(true_project, aggs, GroupByDef::default());

        let agg_var = memo.construct_variable(agg_col);
        let null = memo.construct_null();
        let exists = memo.construct_is_not(agg_var, null);
        let exists_projections = memo.construct_projections(
            vec![exists],
            ProjectionsDef { synthesized: vec![exists_col], passthrough: ColSet::new() },
        );
        memo.construct_project(group_by, exists_projections)
    }

    /// Rewrites `scalar cmp ANY(<input>)` into a one-row one-column relation
    /// with ANY's three-valued-logic semantics:
    ///
    /// ```text
    ///   SELECT CASE
    ///            WHEN bool_or(notnull) AND scalar IS NOT NULL THEN True
    ///            WHEN bool_or(notnull) IS NULL THEN False
    ///            ELSE Null
    ///          END AS case
    ///   FROM (
    ///     SELECT col IS NOT NULL AS notnull
    ///     FROM <input>
    ///     WHERE (scalar cmp col) IS NOT False
    ///   )
    /// ```
    ///
    /// BOOL_OR returns true if any input is true, else false if any input is
    /// false, else null; ANY returns true if any comparison is true, else
    /// null if any comparison is null, else false. Reconciling the two while
    /// keeping the outer reference out of any projection (projections are
    /// hard to hoist above left joins):
    ///
    ///   1. The filter drops rows whose comparison is unambiguously false;
    ///      removing false rows cannot change ANY's answer, and an all-false
    ///      input becomes empty.
    ///   2. Remaining rows compare true or null. The projection emits
    ///      `col IS NOT NULL`, collapsing nulls from the subquery side to
    ///      false while true rows stay true; a null left operand is handled
    ///      in step 4.
    ///   3. BOOL_OR over those true/false values yields true if any row
    ///      compared true, and null only for the empty set, which after step
    ///      1 means the original input was empty or all-false.
    ///   4. The CASE reclassifies: a true BOOL_OR only counts when the left
    ///      operand is not null (otherwise the comparisons were null, so the
    ///      answer is null); a null BOOL_OR becomes false; everything else
    ///      becomes null.
    ///
    /// No null ever reaches the BOOL_OR input; its null slot stays reserved
    /// for left-join padding introduced by later decorrelation.
    fn construct_group_by_any(
        &mut self,
        scalar: GroupId,
        cmp: Op,
        input: GroupId,
    ) -> HoistResult<GroupId> {
        // A scalar that is not a simple variable or constant gets cached in
        // a projected column on the hoisted input, since it is referenced
        // multiple times below.
        let mut scalar = scalar;
        let scalar_op = self.memo.op(scalar);
        if scalar_op != Op::Variable && !scalar_op.is_const_value() {
            let scalar_col = self.memo.add_column("scalar", ScalarType::Unknown);
            self.input = self.memo.project_extra_col(self.input, scalar, scalar_col);
            scalar = self.memo.construct_variable(scalar_col);
        }

        let input_var = reference_single_column(self.memo, input)?;
        let memo = &mut *self.memo;

        let notnull_col = memo.add_column("notnull", ScalarType::Bool);
        let agg_col = memo.add_column("bool_or", ScalarType::Bool);
        let case_col = memo.add_column("case", ScalarType::Bool);

        let t = memo.construct_true();
        let f = memo.construct_false();
        let null = memo.construct_null();

        let cmp_expr = memo.construct_binary(cmp, scalar, input_var);
        let keep = memo.construct_is_not(cmp_expr, f);
        let select = memo.construct_select(input, keep);

        let notnull = memo.construct_is_not(input_var, null);
        let notnull_projections = memo.construct_projections(
            vec![notnull],
            ProjectionsDef { synthesized: vec![notnull_col], passthrough: ColSet::new() },
        );
        let notnull_project = memo.construct_project(select, notnull_projections);

        let notnull_var = memo.construct_variable(notnull_col);
        let bool_or = memo.construct_bool_or(notnull_var);
        let aggs = memo.construct_aggregations(vec![bool_or], vec![agg_col]);
        let group_by = memo.construct_scalar_group_by(notnull_project, aggs, GroupByDef::default());

        let agg_var = memo.construct_variable(agg_col);
        let scalar_not_null = memo.construct_is_not(scalar, null);
        let true_cond = memo.construct_and(agg_var, scalar_not_null);
        let when_true = memo.construct_when(true_cond, t);
        let empty_cond = memo.construct_is(agg_var, null);
        let when_false = memo.construct_when(empty_cond, f);
        let case = memo.construct_case(t, vec![when_true, when_false, null]);
        let case_projections = memo.construct_projections(
            vec![case],
            ProjectionsDef { synthesized: vec![case_col], passthrough: ColSet::new() },
        );
        Ok(memo.construct_project(group_by, case_projections))
    }
}
