//! Column metadata and column collections.
//!
//! Every column in the expression graph is identified by a `ColumnId` minted
//! by the `Metadata` table. Transformations synthesize columns (aggregate
//! outputs, not-null witnesses, row numbers) by registering a name and type
//! here and receiving a fresh id.

use std::collections::BTreeSet;

use ecow::EcoString;
use iddqd::{IdOrdItem, IdOrdMap, id_upcast};

/// Identifies a column across the expression graph. Ids are 1-based and
/// unique within a `Metadata` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(pub u32);

/// Type descriptor for a column or scalar expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    String,
    /// Type not derived; nothing in the decorrelation rewrites depends on it.
    Unknown,
}

/// Metadata about a single column.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub id: ColumnId,
    pub name: EcoString,
    pub data_type: ScalarType,
}

impl IdOrdItem for ColumnMetadata {
    type Key<'a> = ColumnId;

    fn key(&self) -> Self::Key<'_> {
        self.id
    }

    id_upcast!();
}

/// The column table shared by all expressions in a memo.
#[derive(Debug, Default)]
pub struct Metadata {
    columns: IdOrdMap<ColumnMetadata>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new column and return its fresh id. Names are labels only
    /// and need not be unique; synthesized columns reuse names like "notnull".
    pub fn add_column(&mut self, name: &str, data_type: ScalarType) -> ColumnId {
        let id = ColumnId(self.columns.len() as u32 + 1);
        self.columns.insert_overwrite(ColumnMetadata {
            id,
            name: EcoString::from(name),
            data_type,
        });
        id
    }

    pub fn column(&self, id: ColumnId) -> Option<&ColumnMetadata> {
        self.columns.get(&id)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// An ordered list of column ids. Order is meaningful: it pairs positionally
/// with node children (e.g. aggregate expressions with their output columns).
pub type ColList = Vec<ColumnId>;

/// A set of column ids with deterministic (ascending) iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColSet(BTreeSet<ColumnId>);

impl ColSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(col: ColumnId) -> Self {
        let mut set = BTreeSet::new();
        set.insert(col);
        ColSet(set)
    }

    pub fn insert(&mut self, col: ColumnId) {
        self.0.insert(col);
    }

    pub fn contains(&self, col: ColumnId) -> bool {
        self.0.contains(&col)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The smallest column id in the set.
    pub fn first(&self) -> Option<ColumnId> {
        self.0.iter().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.0.iter().copied()
    }

    pub fn union(&self, other: &ColSet) -> ColSet {
        ColSet(self.0.union(&other.0).copied().collect())
    }

    pub fn difference(&self, other: &ColSet) -> ColSet {
        ColSet(self.0.difference(&other.0).copied().collect())
    }

    pub fn is_subset(&self, other: &ColSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn to_list(&self) -> ColList {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<ColumnId> for ColSet {
    fn from_iter<I: IntoIterator<Item = ColumnId>>(iter: I) -> Self {
        ColSet(iter.into_iter().collect())
    }
}

impl From<&ColList> for ColSet {
    fn from(list: &ColList) -> Self {
        list.iter().copied().collect()
    }
}
