//! Reassembly of multi-id lookups into the caller's requested shape.
//!
//! Backends answer `get_by_ids` in whatever order they like. [`reorder`] puts
//! the found records back where the caller asked for them, recursing into
//! nested id lists so fan-out lookups keep their structure.

use bson::{Bson, Document as BsonDocument};

use crate::record::{ID_FIELD, Record, stringify_id};

/// One position in a requested-id structure.
///
/// Before reassembly a structure holds only [`Slot::Id`] and [`Slot::Nested`];
/// afterwards found positions hold [`Slot::Found`] and find-one misses hold
/// [`Slot::Missing`].
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T = Record> {
    /// A requested identifier (possibly `Null`), or an unmatched one passed through.
    Id(Bson),
    /// The record matching the requested identifier.
    Found(T),
    /// Explicit absent marker for a find-one miss.
    Missing,
    /// A nested list of slots, reassembled in find-many mode.
    Nested(Vec<Slot<T>>),
}

impl<T> Slot<T> {
    /// Shorthand for a requested identifier.
    pub fn id(id: impl Into<Bson>) -> Self {
        Slot::Id(id.into())
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Slot::Found(item) => Some(item),
            _ => None,
        }
    }

    /// Every requested non-null identifier, depth first.
    pub fn requested_ids(slots: &[Slot<T>]) -> Vec<String> {
        let mut ids = Vec::new();
        collect_ids(slots, &mut ids);
        ids
    }

    /// Every found item, depth first.
    pub fn found_items(slots: &[Slot<T>]) -> Vec<&T> {
        let mut items = Vec::new();
        collect_found(slots, &mut items);
        items
    }

    /// Converts found items with `f`, keeping the structure intact.
    pub fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<Slot<U>, E> {
        Ok(match self {
            Slot::Id(id) => Slot::Id(id),
            Slot::Found(item) => Slot::Found(f(item)?),
            Slot::Missing => Slot::Missing,
            Slot::Nested(slots) => Slot::Nested(
                slots
                    .into_iter()
                    .map(|slot| slot.try_map(f))
                    .collect::<Result<Vec<_>, E>>()?,
            ),
        })
    }
}

fn collect_ids<T>(slots: &[Slot<T>], ids: &mut Vec<String>) {
    for slot in slots {
        match slot {
            Slot::Id(Bson::Null) => {}
            Slot::Id(id) => {
                let id = stringify_id(id);
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Slot::Nested(inner) => collect_ids(inner, ids),
            Slot::Found(_) | Slot::Missing => {}
        }
    }
}

fn collect_found<'a, T>(slots: &'a [Slot<T>], items: &mut Vec<&'a T>) {
    for slot in slots {
        match slot {
            Slot::Found(item) => items.push(item),
            Slot::Nested(inner) => collect_found(inner, items),
            Slot::Id(_) | Slot::Missing => {}
        }
    }
}

/// Whether the caller asked for a single value or an array value per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderMode {
    /// Each slot becomes the matching record or [`Slot::Missing`].
    FindOne,
    /// Matches are gathered; see [`reorder`] for the sorted/unsorted split.
    FindMany,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReorderOptions {
    /// Explicit sort order requested by the caller, if any.
    pub sort: Option<BsonDocument>,
    /// Field holding the identifier on found records.
    pub id_field: String,
}

impl Default for ReorderOptions {
    fn default() -> Self {
        Self { sort: None, id_field: ID_FIELD.to_string() }
    }
}

impl ReorderOptions {
    pub fn sort(mut self, sort: BsonDocument) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Reassembles `found` into the shape of `requested`.
///
/// Identifiers are compared as normalized strings and the first matching
/// record wins. Sorting is in effect when `options.sort` is set and more than
/// one id was requested at this level.
///
/// * Nested lists are reassembled in [`ReorderMode::FindMany`] and stay at
///   their requested position.
/// * `Null` ids pass through unchanged unless sorting.
/// * Find-one: each slot holds its match or [`Slot::Missing`].
/// * Find-many, sorting: matches take the position of their requested id and
///   unmatched ids are dropped.
/// * Find-many, not sorting: matches are appended in order and unmatched ids
///   are appended as-is so callers can spot them.
pub fn reorder(
    requested: Vec<Slot>,
    found: &[Record],
    options: &ReorderOptions,
    mode: ReorderMode,
) -> Vec<Slot> {
    let sorting = options.sort.is_some() && requested.len() > 1;
    let mut placed: Vec<Option<Slot>> = Vec::with_capacity(requested.len());

    for (index, slot) in requested.into_iter().enumerate() {
        let id = match slot {
            Slot::Nested(inner) => {
                placed.push(Some(Slot::Nested(reorder(inner, found, options, ReorderMode::FindMany))));
                continue;
            }
            Slot::Id(Bson::Null) if !sorting => {
                placed.push(Some(Slot::Id(Bson::Null)));
                continue;
            }
            Slot::Id(id) => id,
            settled @ (Slot::Found(_) | Slot::Missing) => {
                placed.push(Some(settled));
                continue;
            }
        };

        let matched = first_match(&id, found, &options.id_field);

        match mode {
            ReorderMode::FindOne => place_at(
                &mut placed,
                index,
                matched.map_or(Slot::Missing, |record| Slot::Found(record.clone())),
            ),
            ReorderMode::FindMany if sorting => {
                if let Some(record) = matched {
                    place_at(&mut placed, index, Slot::Found(record.clone()));
                }
            }
            ReorderMode::FindMany => placed.push(Some(
                matched.map_or(Slot::Id(id), |record| Slot::Found(record.clone())),
            )),
        }
    }

    placed.into_iter().flatten().collect()
}

fn first_match<'a>(id: &Bson, found: &'a [Record], id_field: &str) -> Option<&'a Record> {
    let wanted = stringify_id(id);

    found.iter().find(|record| {
        record
            .get(id_field)
            .is_some_and(|candidate| stringify_id(candidate) == wanted)
    })
}

fn place_at(placed: &mut Vec<Option<Slot>>, index: usize, slot: Slot) {
    if placed.len() <= index {
        placed.resize_with(index + 1, || None);
    }
    placed[index] = Some(slot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn ids(values: &[Option<&str>]) -> Vec<Slot> {
        values
            .iter()
            .map(|v| match v {
                Some(id) => Slot::id(*id),
                None => Slot::Id(Bson::Null),
            })
            .collect()
    }

    #[test]
    fn find_one_keeps_nulls_and_fills_matches() {
        let found = vec![doc! { "_id": "a" }, doc! { "_id": "c" }];
        let result = reorder(
            ids(&[Some("a"), None, Some("c")]),
            &found,
            &ReorderOptions::default(),
            ReorderMode::FindOne,
        );

        assert_eq!(result, vec![
            Slot::Found(doc! { "_id": "a" }),
            Slot::Id(Bson::Null),
            Slot::Found(doc! { "_id": "c" }),
        ]);
    }

    #[test]
    fn find_one_marks_misses() {
        let found = vec![doc! { "_id": "b" }];
        let result = reorder(
            ids(&[Some("a"), Some("b")]),
            &found,
            &ReorderOptions::default(),
            ReorderMode::FindOne,
        );

        assert_eq!(result, vec![Slot::Missing, Slot::Found(doc! { "_id": "b" })]);
    }

    #[test]
    fn find_one_with_sort_normalizes_nulls() {
        let found = vec![doc! { "_id": "a" }];
        let result = reorder(
            ids(&[None, Some("a")]),
            &found,
            &ReorderOptions::default().sort(doc! { "name": 1 }),
            ReorderMode::FindOne,
        );

        assert_eq!(result, vec![Slot::Missing, Slot::Found(doc! { "_id": "a" })]);
    }

    #[test]
    fn find_many_sorted_follows_requested_order() {
        let found = vec![doc! { "_id": "y" }, doc! { "_id": "x" }];
        let result = reorder(
            ids(&[Some("x"), Some("y")]),
            &found,
            &ReorderOptions::default().sort(doc! { "name": 1 }),
            ReorderMode::FindMany,
        );

        assert_eq!(result, vec![
            Slot::Found(doc! { "_id": "x" }),
            Slot::Found(doc! { "_id": "y" }),
        ]);
    }

    #[test]
    fn find_many_sorted_drops_unmatched() {
        let found = vec![doc! { "_id": "z" }];
        let result = reorder(
            ids(&[Some("x"), None, Some("z")]),
            &found,
            &ReorderOptions::default().sort(doc! { "name": -1 }),
            ReorderMode::FindMany,
        );

        assert_eq!(result, vec![Slot::Found(doc! { "_id": "z" })]);
    }

    #[test]
    fn find_many_unsorted_passes_unmatched_ids_through() {
        let found = vec![doc! { "_id": "b" }];
        let result = reorder(
            ids(&[Some("a"), Some("b")]),
            &found,
            &ReorderOptions::default(),
            ReorderMode::FindMany,
        );

        assert_eq!(result, vec![Slot::id("a"), Slot::Found(doc! { "_id": "b" })]);
    }

    #[test]
    fn nested_lists_are_reassembled_in_place() {
        let found = vec![doc! { "_id": "a" }, doc! { "_id": "b" }, doc! { "_id": "c" }];
        let requested = vec![
            Slot::Nested(ids(&[Some("b"), Some("missing")])),
            Slot::id("c"),
            Slot::Nested(ids(&[Some("a")])),
        ];

        let result = reorder(requested, &found, &ReorderOptions::default(), ReorderMode::FindOne);

        assert_eq!(result, vec![
            Slot::Nested(vec![Slot::Found(doc! { "_id": "b" }), Slot::id("missing")]),
            Slot::Found(doc! { "_id": "c" }),
            Slot::Nested(vec![Slot::Found(doc! { "_id": "a" })]),
        ]);
    }

    #[test]
    fn compares_identifiers_as_strings_and_first_match_wins() {
        let found = vec![
            doc! { "_id": 7, "n": 1 },
            doc! { "_id": "7", "n": 2 },
        ];
        let result = reorder(
            vec![Slot::id("7")],
            &found,
            &ReorderOptions::default(),
            ReorderMode::FindOne,
        );

        assert_eq!(result, vec![Slot::Found(doc! { "_id": 7, "n": 1 })]);
    }

    #[test]
    fn collects_requested_ids_depth_first_without_duplicates() {
        let requested: Vec<Slot> = vec![
            Slot::id("a"),
            Slot::Id(Bson::Null),
            Slot::Nested(vec![Slot::id("b"), Slot::id("a")]),
        ];

        assert_eq!(Slot::requested_ids(&requested), vec!["a".to_string(), "b".to_string()]);
    }
}
