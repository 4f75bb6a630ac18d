//! Admin-chosen subset of record ids for a bulk action.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::RecordId;

/// Set of selected record ids. Only positive integers are ever members;
/// anything else offered on insert is dropped without error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSet(BTreeSet<RecordId>);

impl SelectionSet {
    pub fn new() -> Self { Self::default() }

    /// Parse raw checkbox values ("3", " 7 ", "9.0"); invalid entries are skipped.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter().filter_map(|s| parse_id(s.as_ref())).collect()
    }

    /// Parse a comma or whitespace separated list such as `"3,7, 9"`.
    pub fn parse_list(list: &str) -> Self {
        Self::from_raw(list.split(|c: char| c == ',' || c.is_whitespace()))
    }

    /// Accept numeric input values (form fields hand over floats).
    pub fn from_numbers<I: IntoIterator<Item = f64>>(raw: I) -> Self {
        raw.into_iter().filter_map(positive_integer).collect()
    }

    pub fn insert(&mut self, id: RecordId) -> bool {
        id > 0 && self.0.insert(id)
    }

    pub fn insert_raw(&mut self, raw: &str) -> bool {
        parse_id(raw).map(|id| self.0.insert(id)).unwrap_or(false)
    }

    pub fn remove(&mut self, id: RecordId) -> bool { self.0.remove(&id) }
    pub fn contains(&self, id: RecordId) -> bool { self.0.contains(&id) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ { self.0.iter().copied() }
}

impl FromIterator<RecordId> for SelectionSet {
    fn from_iter<T: IntoIterator<Item = RecordId>>(iter: T) -> Self {
        Self(iter.into_iter().filter(|id| *id > 0).collect())
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = RecordId;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, RecordId>>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter().copied() }
}

pub(crate) fn parse_id(raw: &str) -> Option<RecordId> {
    let s = raw.trim();
    if s.is_empty() { return None; }
    match s.parse::<u64>() {
        Ok(id) => (id > 0).then_some(id),
        Err(_) => s.parse::<f64>().ok().and_then(positive_integer),
    }
}

// 2^53: beyond this a float no longer names a single integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

pub(crate) fn positive_integer(v: f64) -> Option<RecordId> {
    if v.is_finite() && v >= 1.0 && v.fract() == 0.0 && v <= MAX_EXACT_FLOAT {
        Some(v as RecordId)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_raw_values_are_dropped() {
        let sel = SelectionSet::from_raw(["3", " 7 ", "x", "", "-1", "0", "2.5", "9.0", "NaN", "inf"]);
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![3, 7, 9]);
    }

    #[test]
    fn parse_list_handles_commas_and_spaces() {
        let sel = SelectionSet::parse_list("3,7, 9 ,,7");
        assert_eq!(sel.len(), 3);
        assert!(sel.contains(7));
    }

    #[test]
    fn numbers_must_be_positive_finite_integers() {
        let sel = SelectionSet::from_numbers([1.0, 0.0, -3.0, f64::NAN, f64::INFINITY, 4.2, 12.0]);
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![1, 12]);
    }

    #[test]
    fn insert_rejects_zero() {
        let mut sel = SelectionSet::new();
        assert!(!sel.insert(0));
        assert!(sel.insert(5));
        assert!(!sel.insert(5));
        assert!(!sel.insert_raw("abc"));
        assert!(sel.insert_raw("6"));
        assert_eq!(sel.len(), 2);
        let collected: SelectionSet = vec![0, 2, 2].into_iter().collect();
        assert_eq!(collected.len(), 1);
    }
}
