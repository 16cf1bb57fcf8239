//! Raw records exchanged with the backend.
//!
//! A [`Record`] is an untyped BSON document. The backend-assigned identifier is
//! stored under [`ID_FIELD`] and the revision token under [`REV_FIELD`].

use bson::Bson;

/// An untyped key/value structure as stored by the backend.
pub type Record = bson::Document;

/// Key holding the backend-assigned primary key.
pub const ID_FIELD: &str = "_id";

/// Key holding the backend-assigned revision token.
pub const REV_FIELD: &str = "_rev";

/// Normalizes an identifier value to the string form used for comparisons.
///
/// Strings are taken verbatim, object ids use their hex form and everything
/// else falls back to its display representation. `Null` yields `"null"`.
pub fn stringify_id(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Returns the stringified identifier stored under `id_field`, if any.
pub fn record_id(record: &Record, id_field: &str) -> Option<String> {
    match record.get(id_field) {
        None | Some(Bson::Null) => None,
        Some(value) => Some(stringify_id(value)),
    }
}

/// Returns the revision token of a record, if any.
pub fn record_rev(record: &Record) -> Option<String> {
    match record.get(REV_FIELD) {
        Some(Bson::String(rev)) => Some(rev.clone()),
        _ => None,
    }
}

/// Reads a dotted path (`profile.name`, `tags.0`) from a record.
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(doc) => doc.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Writes `value` at a dotted path, creating intermediate documents as needed.
///
/// Returns `false` when an intermediate segment exists but is not a document.
pub fn set_path(record: &mut Record, path: &str, value: Bson) -> bool {
    match path.split_once('.') {
        None => {
            record.insert(path, value);
            true
        }
        Some((head, rest)) => {
            let entry = record
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Record::new()));

            match entry {
                Bson::Document(child) => set_path(child, rest, value),
                _ => false,
            }
        }
    }
}
