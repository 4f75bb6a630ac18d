use smallvec::SmallVec;
use warden_core::Record;

/// Case-insensitive substring filter over a configured list of record fields.
/// A record is visible when any configured field contains the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFilter {
    fields: SmallVec<[String; 4]>,
}

impl LiveFilter {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fields: fields.into_iter().map(Into::into).collect() }
    }

    /// Visible subset of `items` for `term`. Always returns a fresh vector:
    /// a blank term yields a copy of `items` in the same order.
    pub fn filter(&self, items: &[Record], term: &str) -> Vec<Record> {
        let needle = term.trim().to_lowercase();
        let out: Vec<Record> = if needle.is_empty() {
            items.to_vec()
        } else {
            items.iter().filter(|r| self.matches_lowered(r, &needle)).cloned().collect()
        };
        metrics::gauge!("filter_visible_rows", out.len() as f64);
        out
    }

    pub fn matches(&self, record: &Record, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty() || self.matches_lowered(record, &needle)
    }

    fn matches_lowered(&self, record: &Record, needle: &str) -> bool {
        self.fields
            .iter()
            .filter_map(|f| record.field_text(f))
            .any(|text| text.to_lowercase().contains(needle))
    }
}
