//! Multi-column stable sorting.
//!
//! A [`SortSpec`] is an ordered list of `(property, direction)` keys; the
//! first key is the primary one. Clicking a column header cycles that column
//! through `none -> asc -> desc -> none` without disturbing the other keys.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::data::datavalue_compare::compare_datavalues;
use crate::data::row::{DataValue, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Arrow shown next to a sorted column header
    pub fn indicator(&self) -> &'static str {
        match self {
            SortDirection::Asc => "↑",
            SortDirection::Desc => "↓",
        }
    }

    /// Value for an `aria-sort` attribute
    pub fn aria(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ascending",
            SortDirection::Desc => "descending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub property: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(property: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

/// Ordered sort keys. A property appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec(Vec<SortKey>);

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a spec from keys, dropping repeated properties (first one wins)
    pub fn from_keys(keys: Vec<SortKey>) -> Self {
        let mut spec = Self::new();
        for key in keys {
            if spec.position(&key.property).is_none() {
                spec.0.push(key);
            }
        }
        spec
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn position(&self, property: &str) -> Option<usize> {
        self.0.iter().position(|k| k.property == property)
    }

    pub fn direction_of(&self, property: &str) -> Option<SortDirection> {
        self.position(property).map(|idx| self.0[idx].direction)
    }

    /// Cycle `property` one step: absent -> asc (appended), asc -> desc in
    /// place, desc -> removed
    pub fn toggle(&self, property: &str) -> SortSpec {
        let mut keys = self.0.clone();
        match self.position(property) {
            None => keys.push(SortKey::new(property, SortDirection::Asc)),
            Some(idx) => match keys[idx].direction {
                SortDirection::Asc => keys[idx].direction = SortDirection::Desc,
                SortDirection::Desc => {
                    keys.remove(idx);
                }
            },
        }
        SortSpec(keys)
    }
}

/// Free-function form of [`SortSpec::toggle`]
pub fn toggle(sorts: &SortSpec, property: &str) -> SortSpec {
    sorts.toggle(property)
}

/// Compare two values for one key. Nulls go last whatever the direction.
fn compare_for_key(a: &DataValue, b: &DataValue, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let cmp = compare_datavalues(a, b);
            match direction {
                SortDirection::Asc => cmp,
                SortDirection::Desc => cmp.reverse(),
            }
        }
    }
}

pub fn compare_rows(a: &Row, b: &Row, sorts: &SortSpec) -> Ordering {
    sorts
        .keys()
        .iter()
        .map(|key| compare_for_key(a.get(&key.property), b.get(&key.property), key.direction))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Stable sort of row indices. An empty spec leaves the order untouched.
pub fn sort_indices(rows: &[Row], indices: &mut [usize], sorts: &SortSpec) {
    if sorts.is_empty() {
        return;
    }
    indices.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], sorts));
}

/// Sorted copy of `rows`
pub fn sort(rows: &[Row], sorts: &SortSpec) -> Vec<Row> {
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    sort_indices(rows, &mut indices, sorts);
    indices.into_iter().map(|idx| rows[idx].clone()).collect()
}
