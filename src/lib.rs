//! Subquery decorrelation building blocks for a cost-based SQL optimizer.
//!
//! The `decorrelate` module hoists correlated subqueries out of scalar
//! expressions into lateral apply joins; the `memo` module carries the
//! interned expression graph and per-group logical properties the
//! transformations operate on.

pub mod decorrelate;
pub mod memo;
pub mod result;
