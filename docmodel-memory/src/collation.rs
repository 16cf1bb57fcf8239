//! Ordering of view keys.
//!
//! Keys of different types sort by type rank first: null, booleans, numbers,
//! dates, strings, arrays, then documents. Values of the same rank compare
//! naturally; arrays and documents compare element by element.

use bson::Bson;
use std::cmp::Ordering;

pub(crate) enum Collated<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(bson::DateTime),
    String(&'a str),
    Array(Vec<Collated<'a>>),
    Document(Vec<(&'a str, Collated<'a>)>),
}

impl Collated<'_> {
    fn rank(&self) -> u8 {
        match self {
            Collated::Null => 0,
            Collated::Bool(_) => 1,
            Collated::Number(_) => 2,
            Collated::DateTime(_) => 3,
            Collated::String(_) => 4,
            Collated::Array(_) => 5,
            Collated::Document(_) => 6,
        }
    }
}

impl<'a> From<&'a Bson> for Collated<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Collated::Bool(*value),
            Bson::Int32(value) => Collated::Number(f64::from(*value)),
            Bson::Int64(value) => Collated::Number(*value as f64),
            Bson::Double(value) => Collated::Number(*value),
            Bson::DateTime(value) => Collated::DateTime(*value),
            Bson::String(value) => Collated::String(value),
            Bson::Array(items) => Collated::Array(items.iter().map(Collated::from).collect()),
            Bson::Document(doc) => Collated::Document(
                doc.iter()
                    .map(|(key, value)| (key.as_str(), Collated::from(value)))
                    .collect(),
            ),
            // Remaining types have no meaningful order as keys
            _ => Collated::Null,
        }
    }
}

impl PartialEq for Collated<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Collated<'_> {}

impl PartialOrd for Collated<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Collated<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Collated::Null, Collated::Null) => Ordering::Equal,
            (Collated::Bool(a), Collated::Bool(b)) => a.cmp(b),
            (Collated::Number(a), Collated::Number(b)) => a.total_cmp(b),
            (Collated::DateTime(a), Collated::DateTime(b)) => a.cmp(b),
            (Collated::String(a), Collated::String(b)) => a.cmp(b),
            (Collated::Array(a), Collated::Array(b)) => a.cmp(b),
            (Collated::Document(a), Collated::Document(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Compares two view keys.
pub(crate) fn collate(left: &Bson, right: &Bson) -> Ordering {
    Collated::from(left).cmp(&Collated::from(right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    #[test]
    fn ranks_types_before_values() {
        let mut keys = vec![
            bson!("a"),
            bson!([1]),
            bson!(10),
            Bson::Null,
            bson!(true),
            bson!({ "k": 1 }),
        ];
        keys.sort_by(collate);

        assert_eq!(keys, vec![
            Bson::Null,
            bson!(true),
            bson!(10),
            bson!("a"),
            bson!([1]),
            Bson::Document(doc! { "k": 1 }),
        ]);
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert_eq!(collate(&Bson::Int32(2), &Bson::Int64(2)), Ordering::Equal);
        assert_eq!(collate(&Bson::Double(1.5), &Bson::Int64(2)), Ordering::Less);
    }

    #[test]
    fn arrays_compare_element_wise() {
        assert_eq!(collate(&bson!(["a", 2]), &bson!(["a", 10])), Ordering::Less);
        assert_eq!(collate(&bson!(["b"]), &bson!(["a", 10])), Ordering::Greater);
    }
}
