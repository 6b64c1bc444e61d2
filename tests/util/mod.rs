//! Shared test harness: a row-at-a-time interpreter for expression graphs.
//!
//! Evaluates Values-backed relational plans with SQL three-valued logic so
//! behavior-level tests can execute rewritten plans and compare results
//! against the originals. Only the operators the decorrelation rewrites
//! produce are supported; anything else is a test bug and panics.

#![allow(clippy::wildcard_enum_match_arm)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use decorrelate::memo::expr::{Datum, GroupId, Memo, Payload};
use decorrelate::memo::metadata::ColumnId;
use decorrelate::memo::ops::Op;

/// Column bindings for one row. Also serves as the evaluation environment:
/// apply joins and subqueries extend it with the current outer row.
pub type Row = BTreeMap<ColumnId, Datum>;

fn merged(env: &Row, row: &Row) -> Row {
    let mut out = env.clone();
    out.extend(row.iter().map(|(k, v)| (*k, v.clone())));
    out
}

/// Evaluate a relational expression to its rows, with outer columns resolved
/// from `env`.
pub fn eval_rel(memo: &Memo, group: GroupId, env: &Row) -> Vec<Row> {
    let node = memo.node(group);
    match node.op {
        Op::Values => {
            let Some(Payload::Cols(cols)) = &node.payload else {
                panic!("Values without column list");
            };
            node.children
                .iter()
                .map(|&tuple| {
                    let elems = &memo.node(tuple).children;
                    assert_eq!(elems.len(), cols.len());
                    cols.iter()
                        .zip(elems)
                        .map(|(col, &elem)| (*col, eval_scalar(memo, elem, env)))
                        .collect()
                })
                .collect()
        }

        Op::Select => {
            let filter = node.children[1];
            eval_rel(memo, node.children[0], env)
                .into_iter()
                .filter(|row| eval_scalar(memo, filter, &merged(env, row)) == Datum::Bool(true))
                .collect()
        }

        Op::Project => {
            let projections = memo.node(node.children[1]);
            let Some(Payload::Projections(def)) = &projections.payload else {
                panic!("Project without Projections child");
            };
            let elems = projections.children.clone();
            eval_rel(memo, node.children[0], env)
                .into_iter()
                .map(|row| {
                    let scope = merged(env, &row);
                    let mut out: Row = def
                        .passthrough
                        .iter()
                        .map(|col| (col, scope[&col].clone()))
                        .collect();
                    for (col, &elem) in def.synthesized.iter().zip(&elems) {
                        out.insert(*col, eval_scalar(memo, elem, &scope));
                    }
                    out
                })
                .collect()
        }

        Op::Limit => {
            let Some(Payload::Limit(fetch)) = &node.payload else {
                panic!("Limit without fetch");
            };
            let mut rows = eval_rel(memo, node.children[0], env);
            rows.truncate(*fetch as usize);
            rows
        }

        Op::ScalarGroupBy => {
            let input_rows = eval_rel(memo, node.children[0], env);
            let aggs_node = memo.node(node.children[1]);
            let Some(Payload::Cols(cols)) = &aggs_node.payload else {
                panic!("Aggregations without column list");
            };
            let row: Row = cols
                .iter()
                .zip(aggs_node.children.clone())
                .map(|(col, agg)| (*col, eval_aggregate(memo, agg, &input_rows, env)))
                .collect();
            vec![row]
        }

        Op::RowNumber => {
            let Some(Payload::RowNumber(def)) = &node.payload else {
                panic!("RowNumber without definition");
            };
            eval_rel(memo, node.children[0], env)
                .into_iter()
                .enumerate()
                .map(|(i, mut row)| {
                    row.insert(def.col_id, Datum::Int(i as i64 + 1));
                    row
                })
                .collect()
        }

        op if op.is_join() => eval_join(memo, group, env),

        other => panic!("relational operator not supported by test evaluator: {other:?}"),
    }
}

fn null_row(memo: &Memo, group: GroupId) -> Row {
    memo.props(group)
        .output_cols
        .iter()
        .map(|col| (col, Datum::Null))
        .collect()
}

fn eval_join(memo: &Memo, group: GroupId, env: &Row) -> Vec<Row> {
    let node = memo.node(group);
    let (left, right, on) = (node.children[0], node.children[1], node.children[2]);
    let apply = node.op.is_apply_join();

    let mut out = Vec::new();
    for lrow in eval_rel(memo, left, env) {
        let right_env = if apply { merged(env, &lrow) } else { env.clone() };
        let matches: Vec<Row> = eval_rel(memo, right, &right_env)
            .into_iter()
            .filter(|rrow| {
                let scope = merged(&merged(env, &lrow), rrow);
                eval_scalar(memo, on, &scope) == Datum::Bool(true)
            })
            .collect();

        match node.op {
            Op::InnerJoin | Op::InnerJoinApply => {
                for rrow in matches {
                    out.push(merged(&lrow, &rrow));
                }
            }
            Op::LeftJoin | Op::LeftJoinApply => {
                if matches.is_empty() {
                    out.push(merged(&lrow, &null_row(memo, right)));
                } else {
                    for rrow in matches {
                        out.push(merged(&lrow, &rrow));
                    }
                }
            }
            Op::SemiJoin | Op::SemiJoinApply => {
                if !matches.is_empty() {
                    out.push(lrow);
                }
            }
            Op::AntiJoin | Op::AntiJoinApply => {
                if matches.is_empty() {
                    out.push(lrow);
                }
            }
            other => panic!("join kind not supported by test evaluator: {other:?}"),
        }
    }
    out
}

/// Evaluate a scalar expression under the given bindings, with SQL
/// three-valued logic.
pub fn eval_scalar(memo: &Memo, group: GroupId, env: &Row) -> Datum {
    let node = memo.node(group);
    match node.op {
        Op::Variable => {
            let Some(Payload::Column(col)) = &node.payload else {
                panic!("Variable without column");
            };
            env.get(col)
                .cloned()
                .unwrap_or_else(|| panic!("no binding for column {col:?}"))
        }
        Op::Const => {
            let Some(Payload::Value(value)) = &node.payload else {
                panic!("Const without value");
            };
            value.clone()
        }
        Op::True => Datum::Bool(true),
        Op::False => Datum::Bool(false),
        Op::Null => Datum::Null,

        op if op.is_comparison() => {
            let left = eval_scalar(memo, node.children[0], env);
            let right = eval_scalar(memo, node.children[1], env);
            eval_comparison(op, &left, &right)
        }

        // IS / IS NOT are null-aware and always return a boolean.
        Op::Is => {
            let left = eval_scalar(memo, node.children[0], env);
            let right = eval_scalar(memo, node.children[1], env);
            Datum::Bool(left == right)
        }
        Op::IsNot => {
            let left = eval_scalar(memo, node.children[0], env);
            let right = eval_scalar(memo, node.children[1], env);
            Datum::Bool(left != right)
        }

        Op::And => {
            let left = eval_scalar(memo, node.children[0], env);
            let right = eval_scalar(memo, node.children[1], env);
            match (left, right) {
                (Datum::Bool(false), _) | (_, Datum::Bool(false)) => Datum::Bool(false),
                (Datum::Bool(true), Datum::Bool(true)) => Datum::Bool(true),
                _ => Datum::Null,
            }
        }
        Op::Or => {
            let left = eval_scalar(memo, node.children[0], env);
            let right = eval_scalar(memo, node.children[1], env);
            match (left, right) {
                (Datum::Bool(true), _) | (_, Datum::Bool(true)) => Datum::Bool(true),
                (Datum::Bool(false), Datum::Bool(false)) => Datum::Bool(false),
                _ => Datum::Null,
            }
        }
        Op::Not => match eval_scalar(memo, node.children[0], env) {
            Datum::Bool(b) => Datum::Bool(!b),
            _ => Datum::Null,
        },

        // Simple CASE: the first When whose condition equals the input value
        // wins; a trailing non-When child is the else.
        Op::Case => {
            let input = eval_scalar(memo, node.children[0], env);
            for &branch in &node.children[1..] {
                let branch_node = memo.node(branch);
                if branch_node.op == Op::When {
                    if eval_scalar(memo, branch_node.children[0], env) == input {
                        return eval_scalar(memo, branch_node.children[1], env);
                    }
                } else {
                    return eval_scalar(memo, branch, env);
                }
            }
            Datum::Null
        }

        Op::Subquery => {
            let rows = eval_rel(memo, node.children[0], env);
            assert!(rows.len() <= 1, "scalar subquery produced multiple rows");
            let col = memo
                .props(node.children[0])
                .output_cols
                .first()
                .expect("scalar subquery without output column");
            rows.into_iter()
                .next()
                .map_or(Datum::Null, |row| row[&col].clone())
        }
        Op::Exists => {
            let rows = eval_rel(memo, node.children[0], env);
            Datum::Bool(!rows.is_empty())
        }
        Op::Any => {
            let input = node.children[0];
            let scalar = eval_scalar(memo, node.children[1], env);
            let Some(Payload::CmpOp(cmp)) = &node.payload else {
                panic!("Any without comparison operator");
            };
            let col = memo
                .props(input)
                .output_cols
                .first()
                .expect("Any input without output column");
            let mut saw_null = false;
            for row in eval_rel(memo, input, env) {
                match eval_comparison(*cmp, &scalar, &row[&col]) {
                    Datum::Bool(true) => return Datum::Bool(true),
                    Datum::Null => saw_null = true,
                    _ => {}
                }
            }
            if saw_null { Datum::Null } else { Datum::Bool(false) }
        }

        other => panic!("scalar operator not supported by test evaluator: {other:?}"),
    }
}

fn eval_comparison(op: Op, left: &Datum, right: &Datum) -> Datum {
    if left.is_null() || right.is_null() {
        return Datum::Null;
    }
    let ord = compare(left, right);
    let result = match op {
        Op::Eq => ord == Ordering::Equal,
        Op::Ne => ord != Ordering::Equal,
        Op::Lt => ord == Ordering::Less,
        Op::Le => ord != Ordering::Greater,
        Op::Gt => ord == Ordering::Greater,
        Op::Ge => ord != Ordering::Less,
        other => panic!("not a comparison operator: {other:?}"),
    };
    Datum::Bool(result)
}

fn compare(left: &Datum, right: &Datum) -> Ordering {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
        (Datum::Float(a), Datum::Float(b)) => a.cmp(b),
        (Datum::String(a), Datum::String(b)) => a.cmp(b),
        (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
        (a, b) => panic!("cannot compare {a:?} with {b:?}"),
    }
}

fn eval_aggregate(memo: &Memo, agg: GroupId, input_rows: &[Row], env: &Row) -> Datum {
    let node = memo.node(agg);
    if node.op == Op::CountRows {
        return Datum::Int(input_rows.len() as i64);
    }
    let arg = node.children[0];
    let values: Vec<Datum> = input_rows
        .iter()
        .map(|row| eval_scalar(memo, arg, &merged(env, row)))
        .collect();
    let non_null = || values.iter().filter(|v| !v.is_null());

    match node.op {
        Op::ConstAgg => values.first().cloned().unwrap_or(Datum::Null),
        Op::ConstNotNullAgg => non_null().next().cloned().unwrap_or(Datum::Null),
        Op::Count => Datum::Int(non_null().count() as i64),
        Op::BoolOr => {
            let mut saw_false = false;
            for value in non_null() {
                match value {
                    Datum::Bool(true) => return Datum::Bool(true),
                    Datum::Bool(false) => saw_false = true,
                    other => panic!("BOOL_OR over non-boolean {other:?}"),
                }
            }
            if saw_false { Datum::Bool(false) } else { Datum::Null }
        }
        Op::Min => non_null()
            .min_by(|a, b| compare(a, b))
            .cloned()
            .unwrap_or(Datum::Null),
        Op::Max => non_null()
            .max_by(|a, b| compare(a, b))
            .cloned()
            .unwrap_or(Datum::Null),
        Op::Sum => {
            let mut sum = None;
            for value in non_null() {
                let Datum::Int(i) = value else {
                    panic!("SUM over non-integer {value:?}");
                };
                sum = Some(sum.unwrap_or(0) + i);
            }
            sum.map_or(Datum::Null, Datum::Int)
        }
        other => panic!("aggregate not supported by test evaluator: {other:?}"),
    }
}
