//! Resolution of dotted, possibly positional, field paths to casting rules.
//!
//! Literal paths (`profile.name`) hit the schema's flat table directly.
//! Paths that walk into arrays of embedded documents (`comments.$.title`,
//! `comments.$.replies.$.title`) are resolved by matching the longest known
//! prefix and descending into the array's element schema.

use crate::schema::{CastingRule, Schema};

/// Segment denoting "any element of the enclosing array".
pub const POSITIONAL: &str = "$";

/// Resolves `path` against `schema`.
///
/// An exact entry in the flat table always wins, so a literal `a.b` takes
/// precedence over an array rule bound to the shorter prefix `a`.
pub fn resolve<'s>(schema: &'s Schema, path: &str) -> Option<&'s CastingRule> {
    if let Some(rule) = schema.path(path) {
        return Some(rule);
    }

    let parts = path.split('.').collect::<Vec<_>>();
    search(schema, &parts)
}

/// Tries prefixes of `parts` from longest to shortest; the first match wins.
fn search<'s>(schema: &'s Schema, parts: &[&str]) -> Option<&'s CastingRule> {
    for p in (1..=parts.len()).rev() {
        let Some(rule) = schema.path(&parts[..p].join(".")) else {
            continue;
        };

        let Some(array) = rule.array() else {
            return Some(rule);
        };

        if array.is_mixed() {
            return Some(rule);
        }

        if p == parts.len() {
            return Some(rule);
        }

        return match array.schema() {
            Some(element) if parts[p] == POSITIONAL => descend_past_wildcard(element, &parts[p..]),
            Some(element) => descend_from_element_root(element, &parts[p..]),
            None => Some(rule),
        };
    }

    None
}

/// `comments.$.title`: the tail starts with the wildcard, which selects any
/// element and is skipped before searching the element schema.
fn descend_past_wildcard<'s>(element: &'s Schema, tail: &[&str]) -> Option<&'s CastingRule> {
    debug_assert_eq!(tail.first(), Some(&POSITIONAL));
    let rest = &tail[1..];

    if rest.is_empty() {
        return None;
    }

    search(element, rest)
}

/// `comments.title`: the tail names a path inside the element schema directly.
fn descend_from_element_root<'s>(element: &'s Schema, tail: &[&str]) -> Option<&'s CastingRule> {
    search(element, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RuleKind, SchemaType};

    fn blog() -> Schema {
        let reply = Schema::builder()
            .field("title", SchemaType::String)
            .field("votes", SchemaType::Number)
            .build();
        let comment = Schema::builder()
            .field("title", SchemaType::String)
            .array_of("replies", reply)
            .build();

        Schema::builder()
            .field("title", SchemaType::String)
            .nested("author", Schema::builder().field("name", SchemaType::String).build())
            .array_of("comments", comment)
            .array("tags", SchemaType::String)
            .array("extra", SchemaType::Mixed)
            .build()
    }

    fn caster_name(rule: &CastingRule) -> String {
        match &rule.kind {
            RuleKind::Scalar(caster) => caster.name().to_string(),
            RuleKind::Ref { model } => format!("Ref<{model}>"),
            RuleKind::Array(_) => "Array".to_string(),
        }
    }

    #[test]
    fn resolves_literal_paths() {
        let schema = blog();

        assert_eq!(resolve(&schema, "title").map(|r| r.path.as_str()), Some("title"));
        assert_eq!(resolve(&schema, "author.name").map(|r| r.path.as_str()), Some("author.name"));
        assert!(resolve(&schema, "missing").is_none());
        assert!(resolve(&schema, "author.missing").is_none());
    }

    #[test]
    fn exact_match_beats_array_prefix() {
        let schema = Schema::builder()
            .array_of("a", Schema::builder().field("b", SchemaType::Number).build())
            .field("a.b", SchemaType::String)
            .build();

        let rule = resolve(&schema, "a.b").unwrap();
        assert_eq!(rule.path, "a.b");
        assert_eq!(caster_name(rule), "String");
    }

    #[test]
    fn resolves_one_level_of_wildcard() {
        let schema = blog();
        let rule = resolve(&schema, "comments.$.title").unwrap();

        assert_eq!(rule.path, "title");
        assert_eq!(caster_name(rule), "String");
    }

    #[test]
    fn resolves_two_levels_of_wildcard() {
        let schema = blog();
        let rule = resolve(&schema, "comments.$.replies.$.title").unwrap();

        assert_eq!(rule.path, "title");
        let votes = resolve(&schema, "comments.$.replies.$.votes").unwrap();
        assert_eq!(caster_name(votes), "Number");
    }

    #[test]
    fn resolves_three_levels_of_wildcard() {
        let leaf = Schema::builder().field("name", SchemaType::Boolean).build();
        let middle = Schema::builder().array_of("c", leaf).build();
        let outer = Schema::builder().array_of("b", middle).build();
        let schema = Schema::builder().array_of("a", outer).build();

        let rule = resolve(&schema, "a.$.b.$.c.$.name").unwrap();
        assert_eq!(caster_name(rule), "Boolean");
        assert!(resolve(&schema, "a.$.b.$.c.$.missing").is_none());
    }

    #[test]
    fn descends_from_element_root_without_wildcard() {
        let schema = blog();

        let rule = resolve(&schema, "comments.title").unwrap();
        assert_eq!(rule.path, "title");
        let rule = resolve(&schema, "comments.replies.votes").unwrap();
        assert_eq!(caster_name(rule), "Number");
    }

    #[test]
    fn full_match_on_array_returns_array_rule() {
        let schema = blog();

        assert!(resolve(&schema, "comments").unwrap().array().is_some());
        assert!(resolve(&schema, "comments.$.replies").unwrap().array().is_some());
    }

    #[test]
    fn mixed_arrays_stop_descent() {
        let schema = blog();
        let rule = resolve(&schema, "extra.$.anything.goes").unwrap();

        assert_eq!(rule.path, "extra");
        assert!(rule.array().unwrap().is_mixed());
    }

    #[test]
    fn scalar_arrays_return_array_rule_for_positional_tail() {
        let schema = blog();
        assert_eq!(resolve(&schema, "tags.$").unwrap().path, "tags");
    }

    #[test]
    fn trailing_wildcard_without_field_is_not_found() {
        let schema = blog();
        assert!(resolve(&schema, "comments.$").is_none());
    }
}
