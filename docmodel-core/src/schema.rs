//! Schema definitions: the path → casting-rule table that governs a model.
//!
//! A [`Schema`] is immutable once built. Nested sub-schemas declared with
//! [`SchemaBuilder::nested`] are flattened into the path table (`profile.name`),
//! while arrays keep their element schema behind an [`ArrayCaster`] so that
//! positional paths (`comments.$.title`) can be resolved recursively by
//! [`crate::path::resolve`].
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::schema::{Schema, SchemaType};
//!
//! let reply = Schema::builder()
//!     .field("title", SchemaType::String)
//!     .build();
//!
//! let post = Schema::builder()
//!     .field("title", SchemaType::String)
//!     .array_of("comments", reply)
//!     .build();
//! ```

use bson::{Bson, DateTime};
use std::{
    collections::{BTreeSet, HashMap},
    fmt::Debug,
    sync::Arc,
};

use crate::record::Record;

/// A per-field casting function supplied by schema authors.
///
/// Casters validate and coerce a raw value into the field's declared type. The
/// core never defines field semantics itself; it only looks casters up and
/// feeds them values.
pub trait Caster: Send + Sync + Debug {
    /// Name used in schema fingerprints and error messages.
    ///
    /// Schemas are compared by caster name only, so two casters with
    /// different behavior must not share a name. A model re-registered with
    /// a same-named caster is treated as compatible and keeps the caster it
    /// was first registered with.
    fn name(&self) -> &str;

    /// Coerces `value`, returning a human readable reason on rejection.
    fn cast(&self, value: Bson) -> Result<Bson, String>;
}

/// Casts to `Bson::String`. Numbers and booleans are stringified.
#[derive(Debug, Default)]
pub struct StringCaster;

impl Caster for StringCaster {
    fn name(&self) -> &str {
        "String"
    }

    fn cast(&self, value: Bson) -> Result<Bson, String> {
        match value {
            Bson::String(_) | Bson::Null => Ok(value),
            Bson::Int32(n) => Ok(Bson::String(n.to_string())),
            Bson::Int64(n) => Ok(Bson::String(n.to_string())),
            Bson::Double(n) => Ok(Bson::String(n.to_string())),
            Bson::Boolean(b) => Ok(Bson::String(b.to_string())),
            Bson::ObjectId(oid) => Ok(Bson::String(oid.to_hex())),
            other => Err(format!("cannot cast {other} to String")),
        }
    }
}

/// Casts to a numeric BSON value. Numeric strings are parsed.
#[derive(Debug, Default)]
pub struct NumberCaster;

impl Caster for NumberCaster {
    fn name(&self) -> &str {
        "Number"
    }

    fn cast(&self, value: Bson) -> Result<Bson, String> {
        match value {
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Null => Ok(value),
            Bson::Boolean(b) => Ok(Bson::Int32(b as i32)),
            Bson::String(s) => {
                let trimmed = s.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    Ok(Bson::Int64(n))
                } else {
                    trimmed
                        .parse::<f64>()
                        .map(Bson::Double)
                        .map_err(|_| format!("cannot cast \"{s}\" to Number"))
                }
            }
            other => Err(format!("cannot cast {other} to Number")),
        }
    }
}

/// Casts to `Bson::Boolean`, accepting `"true"`/`"false"`, `0` and `1`.
#[derive(Debug, Default)]
pub struct BooleanCaster;

impl Caster for BooleanCaster {
    fn name(&self) -> &str {
        "Boolean"
    }

    fn cast(&self, value: Bson) -> Result<Bson, String> {
        match value {
            Bson::Boolean(_) | Bson::Null => Ok(value),
            Bson::Int32(n @ (0 | 1)) => Ok(Bson::Boolean(n == 1)),
            Bson::Int64(n @ (0 | 1)) => Ok(Bson::Boolean(n == 1)),
            Bson::String(ref s) if s == "true" || s == "1" => Ok(Bson::Boolean(true)),
            Bson::String(ref s) if s == "false" || s == "0" => Ok(Bson::Boolean(false)),
            other => Err(format!("cannot cast {other} to Boolean")),
        }
    }
}

/// Casts to `Bson::DateTime` from RFC 3339 strings or epoch milliseconds.
#[derive(Debug, Default)]
pub struct DateCaster;

impl Caster for DateCaster {
    fn name(&self) -> &str {
        "Date"
    }

    fn cast(&self, value: Bson) -> Result<Bson, String> {
        match value {
            Bson::DateTime(_) | Bson::Null => Ok(value),
            Bson::Int64(millis) => Ok(Bson::DateTime(DateTime::from_millis(millis))),
            Bson::String(s) => chrono::DateTime::parse_from_rfc3339(&s)
                .map(|parsed| Bson::DateTime(DateTime::from_chrono(parsed.to_utc())))
                .map_err(|e| format!("cannot cast \"{s}\" to Date: {e}")),
            other => Err(format!("cannot cast {other} to Date")),
        }
    }
}

/// Accepts any value unchanged.
#[derive(Debug, Default)]
pub struct MixedCaster;

impl Caster for MixedCaster {
    fn name(&self) -> &str {
        "Mixed"
    }

    fn cast(&self, value: Bson) -> Result<Bson, String> {
        Ok(value)
    }
}

/// Convenience constructors for the built-in field types.
#[derive(Debug, Clone)]
pub enum SchemaType {
    String,
    Number,
    Boolean,
    Date,
    Mixed,
    /// A reference to a document of another model, stored as its identifier.
    Ref(String),
    /// A caster supplied by the schema author.
    Custom(Arc<dyn Caster>),
}

impl SchemaType {
    fn into_kind(self) -> RuleKind {
        match self {
            SchemaType::String => RuleKind::Scalar(Arc::new(StringCaster)),
            SchemaType::Number => RuleKind::Scalar(Arc::new(NumberCaster)),
            SchemaType::Boolean => RuleKind::Scalar(Arc::new(BooleanCaster)),
            SchemaType::Date => RuleKind::Scalar(Arc::new(DateCaster)),
            SchemaType::Mixed => RuleKind::Scalar(Arc::new(MixedCaster)),
            SchemaType::Ref(model) => RuleKind::Ref { model },
            SchemaType::Custom(caster) => RuleKind::Scalar(caster),
        }
    }

    fn into_element(self) -> ElementType {
        match self {
            SchemaType::Mixed => ElementType::Mixed,
            other => match other.into_kind() {
                RuleKind::Scalar(caster) => ElementType::Scalar(caster),
                RuleKind::Ref { model } => ElementType::Ref { model },
                RuleKind::Array(array) => array.element,
            },
        }
    }
}

/// The element type of an array field.
#[derive(Debug, Clone)]
pub enum ElementType {
    /// Untyped elements; any shape is accepted and path lookups stop here.
    Mixed,
    /// Scalar elements cast by the given caster.
    Scalar(Arc<dyn Caster>),
    /// References to documents of another model.
    Ref { model: String },
    /// Embedded documents governed by their own schema.
    Embedded(Arc<Schema>),
}

/// Casting rule for an array field.
#[derive(Debug, Clone)]
pub struct ArrayCaster {
    pub element: ElementType,
}

impl ArrayCaster {
    /// Returns `true` when the elements are untyped.
    pub fn is_mixed(&self) -> bool {
        matches!(self.element, ElementType::Mixed)
    }

    /// Returns the embedded element schema, if the elements are documents.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match &self.element {
            ElementType::Embedded(schema) => Some(schema),
            _ => None,
        }
    }
}

/// What a casting rule does with a value.
#[derive(Debug, Clone)]
pub enum RuleKind {
    Scalar(Arc<dyn Caster>),
    Ref { model: String },
    Array(ArrayCaster),
}

/// A single path → casting binding.
#[derive(Debug, Clone)]
pub struct CastingRule {
    pub path: String,
    pub kind: RuleKind,
    pub required: bool,
}

impl CastingRule {
    /// Returns the array caster when this rule governs an array field.
    pub fn array(&self) -> Option<&ArrayCaster> {
        match &self.kind {
            RuleKind::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Short structural description used to compare schemas.
    pub fn describe(&self) -> String {
        let kind = match &self.kind {
            RuleKind::Scalar(caster) => caster.name().to_string(),
            RuleKind::Ref { model } => format!("Ref<{model}>"),
            RuleKind::Array(array) => match &array.element {
                ElementType::Mixed => "[Mixed]".to_string(),
                ElementType::Scalar(caster) => format!("[{}]", caster.name()),
                ElementType::Ref { model } => format!("[Ref<{model}>]"),
                ElementType::Embedded(schema) => format!("[{{{}}}]", schema.fingerprint().join(",")),
            },
        };

        if self.required {
            format!("{}:{kind}!", self.path)
        } else {
            format!("{}:{kind}", self.path)
        }
    }
}

/// A derived field computed from the stored values.
pub type VirtualFn = Arc<dyn Fn(&Record) -> Bson + Send + Sync>;

/// An index to provision on the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Indexed keys and their direction.
    pub keys: bson::Document,
    /// Backend-specific index options (`unique`, `name`, ...).
    pub options: bson::Document,
}

impl IndexSpec {
    pub fn new(keys: bson::Document, options: bson::Document) -> Self {
        Self { keys, options }
    }
}

/// Schema-level options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaOptions {
    /// Collection name; defaults to the model name when absent.
    pub collection: Option<String>,
    /// Write acknowledgment option passed verbatim to every backend write.
    pub safe: Option<Bson>,
    /// Drop record values for paths the schema does not declare.
    pub strict: bool,
    /// Include virtual fields in the record sent on update.
    pub virtuals_on_update: bool,
}

/// An immutable description of a model's fields.
#[derive(Clone)]
pub struct Schema {
    paths: HashMap<String, CastingRule>,
    nested: BTreeSet<String>,
    virtuals: Vec<(String, VirtualFn)>,
    indexes: Vec<IndexSpec>,
    options: SchemaOptions,
}

impl Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("paths", &self.fingerprint())
            .field("virtuals", &self.virtuals.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .field("indexes", &self.indexes)
            .field("options", &self.options)
            .finish()
    }
}

impl Schema {
    /// Creates a builder for a new schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Looks up the rule bound to exactly `path`.
    pub fn path(&self, path: &str) -> Option<&CastingRule> {
        self.paths.get(path)
    }

    /// Returns `true` when `path` is the root of a flattened sub-schema.
    pub fn is_nested(&self, path: &str) -> bool {
        self.nested.contains(path)
    }

    /// Iterates all rules in the flat path table.
    pub fn rules(&self) -> impl Iterator<Item = &CastingRule> {
        self.paths.values()
    }

    pub fn virtuals(&self) -> impl Iterator<Item = (&str, &VirtualFn)> {
        self.virtuals.iter().map(|(name, f)| (name.as_str(), f))
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Sorted structural description of every path, used to detect
    /// incompatible re-registration of a model.
    pub fn fingerprint(&self) -> Vec<String> {
        let mut described = self
            .paths
            .values()
            .map(CastingRule::describe)
            .collect::<Vec<_>>();
        described.sort();
        described
    }

    /// Returns `true` when both schemas declare the same paths and casters.
    pub fn is_compatible_with(&self, other: &Schema) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

/// Builder for [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    paths: HashMap<String, CastingRule>,
    nested: BTreeSet<String>,
    virtuals: Vec<(String, VirtualFn)>,
    indexes: Vec<IndexSpec>,
    options: SchemaOptions,
}

impl SchemaBuilder {
    fn bind(mut self, path: impl Into<String>, kind: RuleKind, required: bool) -> Self {
        let path = path.into();
        self.paths.insert(path.clone(), CastingRule { path, kind, required });
        self
    }

    /// Declares an optional scalar field.
    pub fn field(self, path: impl Into<String>, ty: SchemaType) -> Self {
        self.bind(path, ty.into_kind(), false)
    }

    /// Declares a field that must be present before the document is saved.
    pub fn required(self, path: impl Into<String>, ty: SchemaType) -> Self {
        self.bind(path, ty.into_kind(), true)
    }

    /// Declares an array of scalars (or of `Mixed` values).
    pub fn array(self, path: impl Into<String>, element: SchemaType) -> Self {
        let kind = RuleKind::Array(ArrayCaster { element: element.into_element() });
        self.bind(path, kind, false)
    }

    /// Declares an array of embedded documents.
    pub fn array_of(self, path: impl Into<String>, schema: Schema) -> Self {
        let kind = RuleKind::Array(ArrayCaster {
            element: ElementType::Embedded(Arc::new(schema)),
        });
        self.bind(path, kind, false)
    }

    /// Flattens `schema` under `prefix` so its paths become `prefix.<path>`.
    pub fn nested(mut self, prefix: impl Into<String>, schema: Schema) -> Self {
        let prefix = prefix.into();

        for (path, rule) in schema.paths {
            let full = format!("{prefix}.{path}");
            self.paths.insert(full.clone(), CastingRule { path: full, ..rule });
        }

        self.nested.insert(prefix.clone());
        for inner in schema.nested {
            self.nested.insert(format!("{prefix}.{inner}"));
        }

        self
    }

    /// Declares a derived field.
    pub fn virtual_field<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Record) -> Bson + Send + Sync + 'static,
    {
        self.virtuals.push((name.into(), Arc::new(f)));
        self
    }

    /// Declares an index to be provisioned by [`crate::index::ensure_indexes`].
    pub fn index(mut self, keys: bson::Document, options: bson::Document) -> Self {
        self.indexes.push(IndexSpec::new(keys, options));
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.options.collection = Some(name.into());
        self
    }

    pub fn safe(mut self, safe: impl Into<Bson>) -> Self {
        self.options.safe = Some(safe.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn virtuals_on_update(mut self, enabled: bool) -> Self {
        self.options.virtuals_on_update = enabled;
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            paths: self.paths,
            nested: self.nested,
            virtuals: self.virtuals,
            indexes: self.indexes,
            options: self.options,
        }
    }
}
