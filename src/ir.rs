//! The resolved, frozen intermediate representation.
//!
//! An [`Api`] is what the resolver hands to code generators: namespaces in
//! name order, each holding its definitions in declaration order, routes,
//! and a dependency-ordered linearization. All user-defined definitions
//! live in a single arena owned by the `Api`; cross references (including
//! references across namespaces) are [`TypeId`] indices into that arena,
//! so lookups are O(1) and the graph needs no owning pointers.
//!
//! Nothing in this module mutates after resolution. The resolver builds an
//! `Api` privately and returns it by value; the public surface is
//! read-only.

use crate::serialization::Value;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Index of a definition (alias, struct, or union) in the [`Api`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

/// A user-defined definition.
#[derive(Debug)]
pub enum TypeDef {
    Alias(Alias),
    Struct(Struct),
    Union(Union),
}

impl TypeDef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Alias(d) => &d.name,
            TypeDef::Struct(d) => &d.name,
            TypeDef::Union(d) => &d.name,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            TypeDef::Alias(d) => &d.namespace,
            TypeDef::Struct(d) => &d.namespace,
            TypeDef::Union(d) => &d.namespace,
        }
    }
}

/// A named shorthand for a type reference.
#[derive(Debug)]
pub struct Alias {
    pub name: String,
    pub namespace: String,
    pub doc: Option<String>,
    pub target: TypeRef,
}

/// A product type with ordered named fields.
#[derive(Debug)]
pub struct Struct {
    pub name: String,
    pub namespace: String,
    pub doc: Option<String>,
    /// Supertype whose fields precede this struct's own.
    pub parent: Option<TypeId>,
    /// Fields declared by this struct only; see [`Api::all_fields`] for the
    /// inherited view.
    pub fields: Vec<StructField>,
    /// Direct subtypes (structs declaring `extends` on this one).
    pub subtypes: Vec<TypeId>,
    /// Present when the struct's body enumerated its subtypes.
    pub enumerated_subtypes: Option<SubtypeEnumeration>,
    pub examples: BTreeMap<String, Example>,
}

#[derive(Debug)]
pub struct StructField {
    pub name: String,
    pub ty: TypeRef,
    pub doc: Option<String>,
    pub default: Option<FieldDefault>,
}

impl StructField {
    /// A field is required when it is neither nullable nor defaulted.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !matches!(self.ty, TypeRef::Nullable(_)) && self.default.is_none()
    }
}

/// An evaluated field default: a literal value, or the name of a Void tag
/// for union-typed fields.
#[derive(Debug)]
pub enum FieldDefault {
    Value(Value),
    Tag(String),
}

/// The subtype table of a struct that enumerates its subtypes.
#[derive(Debug)]
pub struct SubtypeEnumeration {
    pub catch_all: bool,
    pub tags: Vec<SubtypeTag>,
}

#[derive(Debug)]
pub struct SubtypeTag {
    pub tag: String,
    pub subtype: TypeId,
}

/// A tagged sum type.
#[derive(Debug)]
pub struct Union {
    pub name: String,
    pub namespace: String,
    pub doc: Option<String>,
    /// The union this one declared `extends` on; its tags (recursively)
    /// precede this union's own tags.
    pub parent: Option<TypeId>,
    pub tags: Vec<UnionTag>,
    pub examples: BTreeMap<String, Example>,
}

#[derive(Debug)]
pub struct UnionTag {
    pub name: String,
    /// [`TypeRef::Void`] for a bare tag.
    pub ty: TypeRef,
    pub doc: Option<String>,
    pub catch_all: bool,
}

/// An API endpoint: a name, a request/response/error type triple, and a
/// bag of literal-valued attributes.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub doc: Option<String>,
    pub request: TypeRef,
    pub response: TypeRef,
    pub error: TypeRef,
    pub attrs: BTreeMap<String, Value>,
}

/// A labeled, fully evaluated sample value of a user-defined type.
#[derive(Debug)]
pub struct Example {
    pub label: String,
    pub text: Option<String>,
    pub value: Value,
}

/// A resolved type reference.
#[derive(Debug, Clone)]
pub enum TypeRef {
    Primitive(Primitive),
    List(Box<ListType>),
    Named(TypeId),
    Nullable(Box<TypeRef>),
    Void,
    Any,
}

impl TypeRef {
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Nullable(_))
    }
}

#[derive(Debug, Clone)]
pub struct ListType {
    pub element: TypeRef,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

/// A built-in scalar type together with its validated attribute
/// constraints.
#[derive(Debug, Clone)]
pub enum Primitive {
    Binary,
    Boolean,
    Int32(IntConstraints),
    Int64(IntConstraints),
    UInt32(IntConstraints),
    UInt64(IntConstraints),
    Float32(FloatConstraints),
    Float64(FloatConstraints),
    String(StringConstraints),
    Timestamp(TimestampConstraints),
}

impl Primitive {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Binary => "Binary",
            Primitive::Boolean => "Boolean",
            Primitive::Int32(_) => "Int32",
            Primitive::Int64(_) => "Int64",
            Primitive::UInt32(_) => "UInt32",
            Primitive::UInt64(_) => "UInt64",
            Primitive::Float32(_) => "Float32",
            Primitive::Float64(_) => "Float64",
            Primitive::String(_) => "String",
            Primitive::Timestamp(_) => "Timestamp",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntConstraints {
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct FloatConstraints {
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct StringConstraints {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Pattern>,
}

#[derive(Debug, Clone)]
pub struct TimestampConstraints {
    pub format: String,
}

/// A compiled `pattern=` attribute. Matching is anchored at the start of
/// the value.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles `source`. The caller surfaces compile failures as
    /// diagnostics.
    pub(crate) fn compile(source: &str) -> Result<Pattern, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})"))?;
        Ok(Pattern {
            source: source.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// A logical group of definitions contributed by one or more source files.
#[derive(Debug)]
pub struct Namespace {
    pub name: String,
    pub doc: Option<String>,
    /// Definitions in declaration order across contributing files.
    pub definitions: Vec<TypeId>,
    pub(crate) def_by_name: HashMap<String, TypeId>,
    /// Routes in declaration order.
    pub routes: Vec<Route>,
    /// Names of namespaces this one imports.
    pub imports: BTreeSet<String>,
    pub(crate) linearized: Vec<TypeId>,
}

impl Namespace {
    #[must_use]
    pub fn def_id(&self, name: &str) -> Option<TypeId> {
        self.def_by_name.get(name).copied()
    }

    #[must_use]
    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Definitions of this namespace ordered so that every type appears
    /// after the types it depends on by inheritance or by value.
    #[must_use]
    pub fn linearized(&self) -> &[TypeId] {
        &self.linearized
    }
}

/// The frozen root of the IR: every namespace of the compiled spec set.
#[derive(Debug, Default)]
pub struct Api {
    pub(crate) types: Vec<TypeDef>,
    pub(crate) namespaces: BTreeMap<String, Namespace>,
}

impl Api {
    /// Namespaces in name order.
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    #[must_use]
    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    #[must_use]
    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0]
    }

    /// Looks up a definition by namespace and name.
    #[must_use]
    pub fn find(&self, namespace: &str, name: &str) -> Option<&TypeDef> {
        let id = self.namespaces.get(namespace)?.def_id(name)?;
        Some(self.type_def(id))
    }

    #[must_use]
    pub fn struct_def(&self, id: TypeId) -> Option<&Struct> {
        match self.type_def(id) {
            TypeDef::Struct(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn union_def(&self, id: TypeId) -> Option<&Union> {
        match self.type_def(id) {
            TypeDef::Union(u) => Some(u),
            _ => None,
        }
    }

    /// Follows alias links until a non-alias type reference is reached.
    #[must_use]
    pub fn unwrap_aliases<'a>(&'a self, ty: &'a TypeRef) -> &'a TypeRef {
        let mut current = ty;
        // The hop limit guards against alias cycles that are still being
        // diagnosed mid-resolution.
        for _ in 0..=self.types.len() {
            match current {
                TypeRef::Named(id) => match self.type_def(*id) {
                    TypeDef::Alias(alias) => current = &alias.target,
                    _ => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// All fields of a struct: supertype fields first, declaration order
    /// within each level.
    #[must_use]
    pub fn all_fields<'a>(&'a self, struct_def: &'a Struct) -> Vec<&'a StructField> {
        let mut chain = vec![struct_def];
        let mut parent = struct_def.parent;
        while let Some(id) = parent {
            match self.struct_def(id) {
                Some(p) => {
                    chain.push(p);
                    parent = p.parent;
                }
                None => break,
            }
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|s| s.fields.iter())
            .collect()
    }

    /// All tags of a union: tags of the extends chain first, declaration
    /// order within each level.
    #[must_use]
    pub fn all_tags<'a>(&'a self, union_def: &'a Union) -> Vec<&'a UnionTag> {
        let mut chain = vec![union_def];
        let mut parent = union_def.parent;
        while let Some(id) = parent {
            match self.union_def(id) {
                Some(p) => {
                    chain.push(p);
                    parent = p.parent;
                }
                None => break,
            }
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|u| u.tags.iter())
            .collect()
    }

    /// The catch-all tag of a union, searching its whole chain.
    #[must_use]
    pub fn catch_all_tag<'a>(&'a self, union_def: &'a Union) -> Option<&'a UnionTag> {
        self.all_tags(union_def).into_iter().find(|t| t.catch_all)
    }

    /// User-defined types referenced as the request, response, or error of
    /// any route in the namespace. List and nullable wrappers are unwrapped
    /// to their inner type. The result is ordered by type name.
    #[must_use]
    pub fn route_io_types(&self, namespace: &Namespace) -> Vec<TypeId> {
        let mut seen = BTreeSet::new();
        for route in &namespace.routes {
            for ty in [&route.request, &route.response, &route.error] {
                let mut current = ty;
                loop {
                    match current {
                        TypeRef::List(list) => current = &list.element,
                        TypeRef::Nullable(inner) => current = inner,
                        _ => break,
                    }
                }
                if let TypeRef::Named(id) = current {
                    seen.insert(*id);
                }
            }
        }
        let mut ids: Vec<TypeId> = seen.into_iter().collect();
        ids.sort_by(|a, b| self.type_def(*a).name().cmp(self.type_def(*b).name()));
        ids
    }
}
