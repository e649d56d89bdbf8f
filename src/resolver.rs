//! The semantic analyzer: turns parsed spec files into the frozen IR.
//!
//! Resolution runs in explicit phases. Each phase accumulates diagnostics
//! into a shared list and the driver stops after any phase that recorded an
//! error, so a later phase never sees a partially-resolved artifact of an
//! earlier one.
//!
//! 1. Namespace aggregation: group files, check imports.
//! 2. Name registration: symbol tables, arena placeholders.
//! 3. Type reference resolution: aliases, fields, tags, routes, subtype
//!    entries; primitive attribute validation.
//! 4. Inheritance wiring: `extends` links and cycle checks.
//! 5. Enumerated-subtype validation.
//! 6. Field and tag validation: uniqueness, defaults, catch-alls.
//! 7. Example resolution and bottom-up evaluation.
//! 8. Routes.
//! 9. Acyclicity of value containment.
//! 10. Linearization.

use crate::ast;
use crate::ast::{Def, DefaultNode, ExampleValue, Literal, QualIdent, TypeArg, TypeRefNode};
use crate::error::{ResolveError, StoneError};
use crate::ir::{
    Alias, Api, Example, FieldDefault, FloatConstraints, IntConstraints, ListType, Namespace,
    Pattern, Primitive, Route, StringConstraints, Struct, StructField, SubtypeEnumeration,
    SubtypeTag, TimestampConstraints, TypeDef, TypeId, TypeRef, Union, UnionTag,
};
use crate::serialization::{literal_to_value, Value};
use log::debug;
use miette::NamedSource;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A successfully parsed source file, ready for resolution.
#[derive(Debug)]
pub struct ParsedFile {
    pub name: String,
    pub text: String,
    pub spec: ast::SpecFile,
}

/// The result of successful resolution: the frozen IR plus any warnings.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub api: Api,
    pub warnings: Vec<StoneError>,
}

/// Resolves a set of parsed files into a frozen [`Api`].
///
/// # Errors
///
/// Returns every diagnostic collected up to and including the first phase
/// that failed; the IR is not produced in that case.
pub fn resolve(files: Vec<ParsedFile>) -> Result<ResolveOutcome, Vec<StoneError>> {
    let mut resolver = Resolver::new(files);

    resolver.aggregate_namespaces();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.register_names();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.resolve_type_refs();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.wire_inheritance();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.validate_enumerated_subtypes();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.validate_fields_and_tags();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.resolve_examples();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.resolve_routes();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.check_value_containment();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.linearize();
    if resolver.failed() {
        return Err(resolver.into_diagnostics());
    }
    resolver.flag_unused_imports();

    Ok(resolver.freeze())
}

struct FileCtx {
    name: String,
    text: String,
}

enum Symbol {
    Type(TypeId),
    Route,
}

struct ImportSlot {
    file: usize,
    ast: ast::Import,
}

struct AliasSlot {
    file: usize,
    ast: ast::AliasDef,
    id: TypeId,
}

struct StructSlot {
    file: usize,
    ast: ast::StructDef,
    id: TypeId,
    /// Resolved ids of the subtype-enumeration entries, parallel to
    /// `ast.subtypes.entries`.
    subtype_ids: Vec<Option<TypeId>>,
}

struct UnionSlot {
    file: usize,
    ast: ast::UnionDef,
    id: TypeId,
}

struct RouteSlot {
    file: usize,
    ast: ast::RouteDef,
    io: Option<[TypeRef; 3]>,
}

#[derive(Default)]
struct NsBuild {
    name: String,
    docs: Vec<String>,
    imports: Vec<ImportSlot>,
    raw_defs: Vec<(usize, Def)>,
    aliases: Vec<AliasSlot>,
    structs: Vec<StructSlot>,
    unions: Vec<UnionSlot>,
    routes: Vec<RouteSlot>,
    symbols: HashMap<String, Symbol>,
    /// Declaration order of type definitions.
    order: Vec<TypeId>,
    used_imports: HashSet<String>,
    built_routes: Vec<Route>,
    linearized_out: Vec<TypeId>,
}

struct Resolver {
    files: Vec<FileCtx>,
    ns: Vec<NsBuild>,
    ns_by_name: HashMap<String, usize>,
    types: Vec<TypeDef>,
    /// Where each definition was declared, for diagnostics.
    def_site: HashMap<TypeId, (usize, (usize, usize))>,
    errors: Vec<StoneError>,
    warnings: Vec<StoneError>,
    pending_files: Vec<(String, String, ast::SpecFile)>,
}

impl Resolver {
    fn new(files: Vec<ParsedFile>) -> Self {
        let pending_files = files
            .into_iter()
            .map(|f| (f.name, f.text, f.spec))
            .collect();
        Resolver {
            files: Vec::new(),
            ns: Vec::new(),
            ns_by_name: HashMap::new(),
            types: Vec::new(),
            def_site: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            pending_files,
        }
    }

    fn failed(&self) -> bool {
        !self.errors.is_empty()
    }

    fn into_diagnostics(mut self) -> Vec<StoneError> {
        self.errors.append(&mut self.warnings);
        self.errors
    }

    fn src(&self, file: usize) -> NamedSource<String> {
        NamedSource::new(&self.files[file].name, self.files[file].text.clone())
    }

    fn err(&mut self, error: ResolveError) {
        self.errors.push(error.into());
    }

    // === Phase 1: namespace aggregation ===

    fn aggregate_namespaces(&mut self) {
        let pending = std::mem::take(&mut self.pending_files);
        for (name, text, spec) in pending {
            let file = self.files.len();
            self.files.push(FileCtx { name, text });

            let ns_name = spec.namespace.name.clone();
            let ns_idx = match self.ns_by_name.get(&ns_name) {
                Some(idx) => *idx,
                None => {
                    let idx = self.ns.len();
                    self.ns.push(NsBuild {
                        name: ns_name.clone(),
                        ..NsBuild::default()
                    });
                    self.ns_by_name.insert(ns_name, idx);
                    idx
                }
            };
            let ns = &mut self.ns[ns_idx];
            if let Some(doc) = spec.namespace.doc {
                ns.docs.push(doc);
            }
            for import in spec.imports {
                ns.imports.push(ImportSlot { file, ast: import });
            }
            for def in spec.defs {
                ns.raw_defs.push((file, def));
            }
        }
        debug!(
            "aggregated {} file(s) into {} namespace(s)",
            self.files.len(),
            self.ns.len()
        );

        // Import targets must name known namespaces, and never the
        // importing namespace itself.
        for ns_idx in 0..self.ns.len() {
            for imp_idx in 0..self.ns[ns_idx].imports.len() {
                let (file, target, span) = {
                    let slot = &self.ns[ns_idx].imports[imp_idx];
                    (
                        slot.file,
                        slot.ast.target.clone(),
                        (slot.ast.pos_start, slot.ast.pos_end),
                    )
                };
                if target == self.ns[ns_idx].name {
                    let src = self.src(file);
                    self.err(ResolveError::SelfImport {
                        src,
                        span: span_of(span),
                    });
                } else if !self.ns_by_name.contains_key(&target) {
                    let src = self.src(file);
                    self.err(ResolveError::UnknownImport {
                        src,
                        span: span_of(span),
                        name: target,
                    });
                }
            }
        }
    }

    // === Phase 2: name registration ===

    fn register_names(&mut self) {
        for ns_idx in 0..self.ns.len() {
            let raw_defs = std::mem::take(&mut self.ns[ns_idx].raw_defs);
            let ns_name = self.ns[ns_idx].name.clone();
            for (file, def) in raw_defs {
                let name = def.name().to_string();
                let span = def.span();
                if self.ns[ns_idx].symbols.contains_key(&name) {
                    let src = self.src(file);
                    self.err(ResolveError::DuplicateDefinition {
                        src,
                        span: span_of(span),
                        name,
                        namespace: ns_name.clone(),
                    });
                    continue;
                }
                match def {
                    Def::Alias(ast) => {
                        let id = self.push_type(TypeDef::Alias(Alias {
                            name: name.clone(),
                            namespace: ns_name.clone(),
                            doc: None,
                            target: TypeRef::Any,
                        }));
                        self.def_site.insert(id, (file, span));
                        self.ns[ns_idx].symbols.insert(name, Symbol::Type(id));
                        self.ns[ns_idx].order.push(id);
                        self.ns[ns_idx].aliases.push(AliasSlot { file, ast, id });
                    }
                    Def::Struct(ast) => {
                        let id = self.push_type(TypeDef::Struct(Struct {
                            name: name.clone(),
                            namespace: ns_name.clone(),
                            doc: ast.doc.clone(),
                            parent: None,
                            fields: Vec::new(),
                            subtypes: Vec::new(),
                            enumerated_subtypes: None,
                            examples: BTreeMap::new(),
                        }));
                        self.def_site.insert(id, (file, span));
                        self.ns[ns_idx].symbols.insert(name, Symbol::Type(id));
                        self.ns[ns_idx].order.push(id);
                        self.ns[ns_idx].structs.push(StructSlot {
                            file,
                            ast,
                            id,
                            subtype_ids: Vec::new(),
                        });
                    }
                    Def::Union(ast) => {
                        let id = self.push_type(TypeDef::Union(Union {
                            name: name.clone(),
                            namespace: ns_name.clone(),
                            doc: ast.doc.clone(),
                            parent: None,
                            tags: Vec::new(),
                            examples: BTreeMap::new(),
                        }));
                        self.def_site.insert(id, (file, span));
                        self.ns[ns_idx].symbols.insert(name, Symbol::Type(id));
                        self.ns[ns_idx].order.push(id);
                        self.ns[ns_idx].unions.push(UnionSlot { file, ast, id });
                    }
                    Def::Route(ast) => {
                        self.ns[ns_idx].symbols.insert(name, Symbol::Route);
                        self.ns[ns_idx].routes.push(RouteSlot {
                            file,
                            ast,
                            io: None,
                        });
                    }
                }
            }
        }
        debug!("registered {} definition(s)", self.types.len());
    }

    fn push_type(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(def);
        id
    }

    // === Phase 3: type reference resolution ===

    fn resolve_type_refs(&mut self) {
        // Aliases first, so that later references through them can be
        // unwrapped for nullability checks.
        for ns_idx in 0..self.ns.len() {
            for slot_idx in 0..self.ns[ns_idx].aliases.len() {
                let (file, node, id) = {
                    let slot = &self.ns[ns_idx].aliases[slot_idx];
                    (slot.file, slot.ast.target.clone(), slot.id)
                };
                if let Some(ty) = self.resolve_type_ref(ns_idx, file, &node) {
                    if let TypeDef::Alias(alias) = &mut self.types[id.0] {
                        alias.target = ty;
                    }
                }
            }
        }
        self.check_alias_cycles();

        for ns_idx in 0..self.ns.len() {
            self.resolve_struct_fields(ns_idx);
            self.resolve_union_tags(ns_idx);
            self.resolve_subtype_entries(ns_idx);
            self.resolve_route_io(ns_idx);
        }
        debug!("resolved type references");
    }

    fn check_alias_cycles(&mut self) {
        let alias_ids: Vec<(usize, usize, TypeId)> = self
            .ns
            .iter()
            .enumerate()
            .flat_map(|(ns_idx, ns)| {
                ns.aliases
                    .iter()
                    .enumerate()
                    .map(move |(slot_idx, slot)| (ns_idx, slot_idx, slot.id))
            })
            .collect();
        let mut reported = HashSet::new();
        for (ns_idx, slot_idx, start) in alias_ids {
            if reported.contains(&start) {
                continue;
            }
            let mut seen = HashSet::from([start]);
            let mut current = start;
            loop {
                let target = {
                    let TypeDef::Alias(alias) = &self.types[current.0] else {
                        break;
                    };
                    let mut target_ref = &alias.target;
                    if let TypeRef::Nullable(inner) = target_ref {
                        target_ref = inner;
                    }
                    let TypeRef::Named(id) = target_ref else { break };
                    *id
                };
                if !matches!(self.types[target.0], TypeDef::Alias(_)) {
                    break;
                }
                if !seen.insert(target) {
                    for member in &seen {
                        reported.insert(*member);
                    }
                    let slot = &self.ns[ns_idx].aliases[slot_idx];
                    let (file, name, span) = (
                        slot.file,
                        slot.ast.name.clone(),
                        (slot.ast.pos_start, slot.ast.pos_end),
                    );
                    let src = self.src(file);
                    self.err(ResolveError::AliasCycle {
                        src,
                        span: span_of(span),
                        name,
                    });
                    break;
                }
                current = target;
            }
        }
    }

    fn resolve_struct_fields(&mut self, ns_idx: usize) {
        for slot_idx in 0..self.ns[ns_idx].structs.len() {
            let (file, id, field_nodes) = {
                let slot = &self.ns[ns_idx].structs[slot_idx];
                (slot.file, slot.id, slot.ast.fields.clone())
            };
            let mut fields = Vec::new();
            for node in &field_nodes {
                let Some(ty) = self.resolve_type_ref(ns_idx, file, &node.type_ref) else {
                    continue;
                };
                if matches!(unwrap_aliases(&self.types, &ty), TypeRef::Void) {
                    let src = self.src(file);
                    self.err(ResolveError::VoidStructField {
                        src,
                        span: span_of((node.pos_start, node.pos_end)),
                        field: node.name.clone(),
                    });
                    continue;
                }
                fields.push(StructField {
                    name: node.name.clone(),
                    ty,
                    doc: node.doc.clone(),
                    default: None,
                });
            }
            if let TypeDef::Struct(s) = &mut self.types[id.0] {
                s.fields = fields;
            }
        }
    }

    fn resolve_union_tags(&mut self, ns_idx: usize) {
        for slot_idx in 0..self.ns[ns_idx].unions.len() {
            let (file, id, tag_nodes) = {
                let slot = &self.ns[ns_idx].unions[slot_idx];
                (slot.file, slot.id, slot.ast.tags.clone())
            };
            let mut tags = Vec::new();
            for node in &tag_nodes {
                let ty = match &node.type_ref {
                    None => TypeRef::Void,
                    Some(type_ref) => {
                        let Some(ty) = self.resolve_type_ref(ns_idx, file, type_ref) else {
                            continue;
                        };
                        if matches!(ty, TypeRef::Void) {
                            let src = self.src(file);
                            self.err(ResolveError::ExplicitVoidTag {
                                src,
                                span: span_of((node.pos_start, node.pos_end)),
                                tag: node.name.clone(),
                            });
                            continue;
                        }
                        ty
                    }
                };
                tags.push(UnionTag {
                    name: node.name.clone(),
                    ty,
                    doc: node.doc.clone(),
                    catch_all: node.catch_all,
                });
            }
            if let TypeDef::Union(u) = &mut self.types[id.0] {
                u.tags = tags;
            }
        }
    }

    fn resolve_subtype_entries(&mut self, ns_idx: usize) {
        for slot_idx in 0..self.ns[ns_idx].structs.len() {
            let (file, entries) = {
                let slot = &self.ns[ns_idx].structs[slot_idx];
                match &slot.ast.subtypes {
                    None => continue,
                    Some(block) => (slot.file, block.entries.clone()),
                }
            };
            let mut ids = Vec::new();
            for entry in &entries {
                match self.resolve_type_ref(ns_idx, file, &entry.type_ref) {
                    Some(TypeRef::Named(id)) => ids.push(Some(id)),
                    Some(_) => {
                        let src = self.src(file);
                        self.err(ResolveError::SubtypeNotStruct {
                            src,
                            span: span_of((entry.pos_start, entry.pos_end)),
                            subtype: entry.type_ref.name.clone(),
                        });
                        ids.push(None);
                    }
                    None => ids.push(None),
                }
            }
            self.ns[ns_idx].structs[slot_idx].subtype_ids = ids;
        }
    }

    fn resolve_route_io(&mut self, ns_idx: usize) {
        for slot_idx in 0..self.ns[ns_idx].routes.len() {
            let (file, request, response, error) = {
                let slot = &self.ns[ns_idx].routes[slot_idx];
                (
                    slot.file,
                    slot.ast.request.clone(),
                    slot.ast.response.clone(),
                    slot.ast.error.clone(),
                )
            };
            let request = self.resolve_type_ref(ns_idx, file, &request);
            let response = self.resolve_type_ref(ns_idx, file, &response);
            let error = self.resolve_type_ref(ns_idx, file, &error);
            if let (Some(a), Some(b), Some(c)) = (request, response, error) {
                self.ns[ns_idx].routes[slot_idx].io = Some([a, b, c]);
            }
        }
    }

    /// Resolves one syntactic type reference. Lookup order: the built-in
    /// table (shadowed by nothing), then the local symbol table, then the
    /// named import for qualified references, or each import in declaration
    /// order for unqualified ones.
    fn resolve_type_ref(
        &mut self,
        ns_idx: usize,
        file: usize,
        node: &TypeRefNode,
    ) -> Option<TypeRef> {
        let span = (node.pos_start, node.pos_end);
        let base = if let Some(qualifier) = &node.ns {
            let imported = self.ns[ns_idx]
                .imports
                .iter()
                .any(|slot| slot.ast.target == *qualifier);
            if !imported {
                let src = self.src(file);
                self.err(ResolveError::NamespaceNotImported {
                    src,
                    span: span_of(span),
                    name: qualifier.clone(),
                });
                return None;
            }
            self.ns[ns_idx].used_imports.insert(qualifier.clone());
            let target_ns = self.ns_by_name[qualifier];
            match self.ns[target_ns].symbols.get(&node.name) {
                Some(Symbol::Type(id)) => {
                    let id = *id;
                    if !node.args.is_empty() {
                        let src = self.src(file);
                        self.err(ResolveError::ArgsOnUserType {
                            src,
                            span: span_of(span),
                            name: node.name.clone(),
                        });
                        return None;
                    }
                    TypeRef::Named(id)
                }
                Some(Symbol::Route) => {
                    let src = self.src(file);
                    self.err(ResolveError::RouteInTypePosition {
                        src,
                        span: span_of(span),
                        name: node.name.clone(),
                    });
                    return None;
                }
                None => {
                    let src = self.src(file);
                    self.err(ResolveError::UnresolvedReference {
                        src,
                        span: span_of(span),
                        name: format!("{}.{}", qualifier, node.name),
                    });
                    return None;
                }
            }
        } else if is_builtin(&node.name) {
            self.instantiate_builtin(ns_idx, file, node)?
        } else if let Some(symbol) = self.ns[ns_idx].symbols.get(&node.name) {
            match symbol {
                Symbol::Type(id) => {
                    let id = *id;
                    if !node.args.is_empty() {
                        let src = self.src(file);
                        self.err(ResolveError::ArgsOnUserType {
                            src,
                            span: span_of(span),
                            name: node.name.clone(),
                        });
                        return None;
                    }
                    TypeRef::Named(id)
                }
                Symbol::Route => {
                    let src = self.src(file);
                    self.err(ResolveError::RouteInTypePosition {
                        src,
                        span: span_of(span),
                        name: node.name.clone(),
                    });
                    return None;
                }
            }
        } else {
            let mut found = None;
            let import_targets: Vec<String> = self.ns[ns_idx]
                .imports
                .iter()
                .map(|slot| slot.ast.target.clone())
                .collect();
            for target in import_targets {
                let Some(target_ns) = self.ns_by_name.get(&target) else {
                    continue;
                };
                if let Some(Symbol::Type(id)) = self.ns[*target_ns].symbols.get(&node.name) {
                    found = Some((target, *id));
                    break;
                }
            }
            match found {
                Some((target, id)) => {
                    self.ns[ns_idx].used_imports.insert(target);
                    if !node.args.is_empty() {
                        let src = self.src(file);
                        self.err(ResolveError::ArgsOnUserType {
                            src,
                            span: span_of(span),
                            name: node.name.clone(),
                        });
                        return None;
                    }
                    TypeRef::Named(id)
                }
                None => {
                    let src = self.src(file);
                    self.err(ResolveError::UnresolvedReference {
                        src,
                        span: span_of(span),
                        name: node.name.clone(),
                    });
                    return None;
                }
            }
        };

        if !node.nullable {
            return Some(base);
        }
        if matches!(unwrap_aliases(&self.types, &base), TypeRef::Void) {
            let src = self.src(file);
            self.err(ResolveError::NullableVoid {
                src,
                span: span_of(span),
            });
            return None;
        }
        if unwrap_aliases(&self.types, &base).is_nullable() {
            let src = self.src(file);
            self.err(ResolveError::DoubleNullable {
                src,
                span: span_of(span),
            });
            return None;
        }
        Some(TypeRef::Nullable(Box::new(base)))
    }

    /// Instantiates a built-in type with its attribute arguments, checking
    /// every constraint the type imposes on them.
    fn instantiate_builtin(
        &mut self,
        ns_idx: usize,
        file: usize,
        node: &TypeRefNode,
    ) -> Option<TypeRef> {
        let span = (node.pos_start, node.pos_end);
        let name = node.name.as_str();

        if name == "List" {
            return self.instantiate_list(ns_idx, file, node);
        }

        // Every other built-in takes only literal arguments.
        let params: &[&str] = match name {
            "Int32" | "Int64" | "UInt32" | "UInt64" | "Float32" | "Float64" => {
                &["min_value", "max_value"]
            }
            "String" => &["min_length", "max_length", "pattern"],
            "Timestamp" => &["format"],
            _ => &[],
        };
        let bound = self.bind_args(file, span, name, params, &node.args)?;
        let slot = |param: &str| -> Option<&Literal> {
            params
                .iter()
                .position(|p| p == &param)
                .and_then(|i| bound[i].as_ref())
        };

        let primitive = match name {
            "Binary" => Primitive::Binary,
            "Boolean" => Primitive::Boolean,
            "Void" => return Some(TypeRef::Void),
            "Any" => return Some(TypeRef::Any),
            "Int32" | "Int64" | "UInt32" | "UInt64" => {
                let (kind_min, kind_max) = match name {
                    "Int32" => (i64::from(i32::MIN), i64::from(i32::MAX)),
                    "UInt32" => (0, i64::from(u32::MAX)),
                    "UInt64" => (0, i64::MAX),
                    _ => (i64::MIN, i64::MAX),
                };
                let min_value = self.int_attr(file, span, name, "min_value", slot("min_value"))?;
                let max_value = self.int_attr(file, span, name, "max_value", slot("max_value"))?;
                for value in [min_value, max_value].into_iter().flatten() {
                    if value < kind_min || value > kind_max {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            format!("{value} is outside the range of {name}"),
                        );
                    }
                }
                if let (Some(lo), Some(hi)) = (min_value, max_value) {
                    if lo > hi {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            "min_value must be <= max_value".to_string(),
                        );
                    }
                }
                let constraints = IntConstraints {
                    min_value,
                    max_value,
                };
                match name {
                    "Int32" => Primitive::Int32(constraints),
                    "UInt32" => Primitive::UInt32(constraints),
                    "UInt64" => Primitive::UInt64(constraints),
                    _ => Primitive::Int64(constraints),
                }
            }
            "Float32" | "Float64" => {
                let min_value = self.float_attr(file, span, name, "min_value", slot("min_value"))?;
                let max_value = self.float_attr(file, span, name, "max_value", slot("max_value"))?;
                if name == "Float32" {
                    for value in [min_value, max_value].into_iter().flatten() {
                        if value.abs() > f64::from(f32::MAX) {
                            return self.attr_error(
                                file,
                                span,
                                name,
                                format!("{value} does not fit in a single-precision float"),
                            );
                        }
                    }
                }
                if let (Some(lo), Some(hi)) = (min_value, max_value) {
                    if lo > hi {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            "min_value must be <= max_value".to_string(),
                        );
                    }
                }
                let constraints = FloatConstraints {
                    min_value,
                    max_value,
                };
                if name == "Float32" {
                    Primitive::Float32(constraints)
                } else {
                    Primitive::Float64(constraints)
                }
            }
            "String" => {
                let min_length =
                    self.length_attr(file, span, name, "min_length", slot("min_length"), 0)?;
                let max_length =
                    self.length_attr(file, span, name, "max_length", slot("max_length"), 1)?;
                if let (Some(lo), Some(hi)) = (min_length, max_length) {
                    if lo > hi {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            "max_length must be >= min_length".to_string(),
                        );
                    }
                }
                let pattern = match slot("pattern") {
                    None => None,
                    Some(Literal::Str(source)) => match Pattern::compile(source) {
                        Ok(pattern) => Some(pattern),
                        Err(error) => {
                            let src = self.src(file);
                            self.err(ResolveError::BadPattern {
                                src,
                                span: span_of(span),
                                pattern: source.clone(),
                                detail: error.to_string(),
                            });
                            return None;
                        }
                    },
                    Some(_) => {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            "pattern must be a string".to_string(),
                        )
                    }
                };
                Primitive::String(StringConstraints {
                    min_length,
                    max_length,
                    pattern,
                })
            }
            "Timestamp" => {
                let format = match slot("format") {
                    Some(Literal::Str(s)) if !s.is_empty() => s.clone(),
                    Some(Literal::Str(_)) => {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            "format must not be empty".to_string(),
                        )
                    }
                    Some(_) => {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            "format must be a string".to_string(),
                        )
                    }
                    None => {
                        return self.attr_error(
                            file,
                            span,
                            name,
                            "missing positional argument 'format'".to_string(),
                        )
                    }
                };
                Primitive::Timestamp(TimestampConstraints { format })
            }
            other => unreachable!("not a builtin: {other}"),
        };
        Some(TypeRef::Primitive(primitive))
    }

    fn instantiate_list(
        &mut self,
        ns_idx: usize,
        file: usize,
        node: &TypeRefNode,
    ) -> Option<TypeRef> {
        let span = (node.pos_start, node.pos_end);
        let mut positional = node.args.positional.iter();
        let element = match positional.next() {
            Some(TypeArg::Type(inner)) => self.resolve_type_ref(ns_idx, file, inner)?,
            _ => {
                let src = self.src(file);
                self.err(ResolveError::ListMissingElement {
                    src,
                    span: span_of(span),
                });
                return None;
            }
        };
        let rest = ast::Args {
            positional: positional.cloned().collect(),
            keyword: node.args.keyword.clone(),
        };
        let params = &["min_items", "max_items"];
        let bound = self.bind_args(file, span, "List", params, &rest)?;
        let min_items = self.length_attr(file, span, "List", "min_items", bound[0].as_ref(), 0)?;
        let max_items = self.length_attr(file, span, "List", "max_items", bound[1].as_ref(), 1)?;
        if let (Some(lo), Some(hi)) = (min_items, max_items) {
            if lo > hi {
                return self.attr_error(
                    file,
                    span,
                    "List",
                    "max_items must be >= min_items".to_string(),
                );
            }
        }
        Some(TypeRef::List(Box::new(ListType {
            element,
            min_items,
            max_items,
        })))
    }

    /// Binds positional and keyword arguments to the parameter list of a
    /// built-in type. Returns one optional literal per parameter.
    fn bind_args(
        &mut self,
        file: usize,
        span: (usize, usize),
        type_name: &str,
        params: &[&str],
        args: &ast::Args,
    ) -> Option<Vec<Option<Literal>>> {
        let mut bound: Vec<Option<Literal>> = vec![None; params.len()];
        if args.positional.len() > params.len() {
            return self.attr_error(
                file,
                span,
                type_name,
                "too many positional arguments".to_string(),
            );
        }
        for (i, arg) in args.positional.iter().enumerate() {
            match arg {
                TypeArg::Literal(literal) => bound[i] = Some(literal.clone()),
                TypeArg::Type(_) => {
                    return self.attr_error(
                        file,
                        span,
                        type_name,
                        format!("argument '{}' must be a literal", params[i]),
                    );
                }
            }
        }
        for (key, value) in &args.keyword {
            let Some(position) = params.iter().position(|p| p == key) else {
                return self.attr_error(file, span, type_name, format!("unknown argument '{key}'"));
            };
            if bound[position].is_some() {
                return self.attr_error(
                    file,
                    span,
                    type_name,
                    format!("argument '{key}' specified twice"),
                );
            }
            bound[position] = Some(value.clone());
        }
        Some(bound)
    }

    fn int_attr(
        &mut self,
        file: usize,
        span: (usize, usize),
        type_name: &str,
        param: &str,
        literal: Option<&Literal>,
    ) -> Option<Option<i64>> {
        match literal {
            None => Some(None),
            Some(Literal::Int(n)) => Some(Some(*n)),
            Some(_) => self
                .attr_error(
                    file,
                    span,
                    type_name,
                    format!("{param} must be an integral number"),
                )
                .map(|()| None),
        }
    }

    fn float_attr(
        &mut self,
        file: usize,
        span: (usize, usize),
        type_name: &str,
        param: &str,
        literal: Option<&Literal>,
    ) -> Option<Option<f64>> {
        match literal {
            None => Some(None),
            Some(Literal::Int(n)) => Some(Some(*n as f64)),
            Some(Literal::Float(n)) => Some(Some(*n)),
            Some(_) => self
                .attr_error(
                    file,
                    span,
                    type_name,
                    format!("{param} must be a real number"),
                )
                .map(|()| None),
        }
    }

    fn length_attr(
        &mut self,
        file: usize,
        span: (usize, usize),
        type_name: &str,
        param: &str,
        literal: Option<&Literal>,
        minimum: u64,
    ) -> Option<Option<u64>> {
        match literal {
            None => Some(None),
            Some(Literal::Int(n)) if *n >= 0 && *n as u64 >= minimum => Some(Some(*n as u64)),
            Some(Literal::Int(_)) => self
                .attr_error(file, span, type_name, format!("{param} must be >= {minimum}"))
                .map(|()| None),
            Some(_) => self
                .attr_error(
                    file,
                    span,
                    type_name,
                    format!("{param} must be an integral number"),
                )
                .map(|()| None),
        }
    }

    /// Records an attribute error and yields `None` in every `Option`
    /// context it is used from.
    fn attr_error<T>(
        &mut self,
        file: usize,
        span: (usize, usize),
        type_name: &str,
        reason: String,
    ) -> Option<T> {
        let src = self.src(file);
        self.err(ResolveError::InvalidAttribute {
            src,
            span: span_of(span),
            type_name: type_name.to_string(),
            reason,
        });
        None
    }

    // === Phase 4: inheritance wiring ===

    fn wire_inheritance(&mut self) {
        for ns_idx in 0..self.ns.len() {
            for slot_idx in 0..self.ns[ns_idx].structs.len() {
                let (file, id, extends) = {
                    let slot = &self.ns[ns_idx].structs[slot_idx];
                    (slot.file, slot.id, slot.ast.extends.clone())
                };
                let Some(target) = extends else { continue };
                let Some(parent_id) = self.resolve_extends_target(ns_idx, file, &target) else {
                    continue;
                };
                match &self.types[parent_id.0] {
                    TypeDef::Struct(_) => {
                        if let TypeDef::Struct(s) = &mut self.types[id.0] {
                            s.parent = Some(parent_id);
                        }
                    }
                    TypeDef::Alias(_) => {
                        let src = self.src(file);
                        self.err(ResolveError::ExtendsAlias {
                            src,
                            span: span_of((target.pos_start, target.pos_end)),
                            name: target.name.clone(),
                        });
                    }
                    TypeDef::Union(_) => {
                        let src = self.src(file);
                        self.err(ResolveError::ExtendsNotStruct {
                            src,
                            span: span_of((target.pos_start, target.pos_end)),
                            name: target.name.clone(),
                        });
                    }
                }
            }
            for slot_idx in 0..self.ns[ns_idx].unions.len() {
                let (file, id, extends) = {
                    let slot = &self.ns[ns_idx].unions[slot_idx];
                    (slot.file, slot.id, slot.ast.extends.clone())
                };
                let Some(target) = extends else { continue };
                let Some(parent_id) = self.resolve_extends_target(ns_idx, file, &target) else {
                    continue;
                };
                match &self.types[parent_id.0] {
                    TypeDef::Union(_) => {
                        if let TypeDef::Union(u) = &mut self.types[id.0] {
                            u.parent = Some(parent_id);
                        }
                    }
                    TypeDef::Alias(_) => {
                        let src = self.src(file);
                        self.err(ResolveError::ExtendsAlias {
                            src,
                            span: span_of((target.pos_start, target.pos_end)),
                            name: target.name.clone(),
                        });
                    }
                    TypeDef::Struct(_) => {
                        let src = self.src(file);
                        self.err(ResolveError::ExtendsNotUnion {
                            src,
                            span: span_of((target.pos_start, target.pos_end)),
                            name: target.name.clone(),
                        });
                    }
                }
            }
        }

        self.check_inheritance_cycles();

        // Record direct subtypes on each parent, in declaration order.
        let mut links = Vec::new();
        for ns in &self.ns {
            for slot in &ns.structs {
                if let TypeDef::Struct(s) = &self.types[slot.id.0] {
                    if let Some(parent) = s.parent {
                        links.push((parent, slot.id));
                    }
                }
            }
        }
        for (parent, child) in links {
            if let TypeDef::Struct(p) = &mut self.types[parent.0] {
                p.subtypes.push(child);
            }
        }
        debug!("wired inheritance");
    }

    fn resolve_extends_target(
        &mut self,
        ns_idx: usize,
        file: usize,
        target: &QualIdent,
    ) -> Option<TypeId> {
        let span = (target.pos_start, target.pos_end);
        if let Some(qualifier) = &target.ns {
            let imported = self.ns[ns_idx]
                .imports
                .iter()
                .any(|slot| slot.ast.target == *qualifier);
            if !imported {
                let src = self.src(file);
                self.err(ResolveError::NamespaceNotImported {
                    src,
                    span: span_of(span),
                    name: qualifier.clone(),
                });
                return None;
            }
            self.ns[ns_idx].used_imports.insert(qualifier.clone());
            let target_ns = self.ns_by_name[qualifier];
            return match self.ns[target_ns].symbols.get(&target.name) {
                Some(Symbol::Type(id)) => Some(*id),
                _ => {
                    let src = self.src(file);
                    self.err(ResolveError::UnresolvedReference {
                        src,
                        span: span_of(span),
                        name: format!("{}.{}", qualifier, target.name),
                    });
                    None
                }
            };
        }
        if is_builtin(&target.name) {
            let src = self.src(file);
            self.err(ResolveError::ExtendsNotStruct {
                src,
                span: span_of(span),
                name: target.name.clone(),
            });
            return None;
        }
        if let Some(Symbol::Type(id)) = self.ns[ns_idx].symbols.get(&target.name) {
            return Some(*id);
        }
        let import_targets: Vec<String> = self.ns[ns_idx]
            .imports
            .iter()
            .map(|slot| slot.ast.target.clone())
            .collect();
        for import in import_targets {
            let Some(target_ns) = self.ns_by_name.get(&import) else {
                continue;
            };
            if let Some(Symbol::Type(id)) = self.ns[*target_ns].symbols.get(&target.name) {
                let id = *id;
                self.ns[ns_idx].used_imports.insert(import);
                return Some(id);
            }
        }
        let src = self.src(file);
        self.err(ResolveError::UnresolvedReference {
            src,
            span: span_of(span),
            name: target.name.clone(),
        });
        None
    }

    fn check_inheritance_cycles(&mut self) {
        let ids: Vec<TypeId> = (0..self.types.len()).map(TypeId).collect();
        for start in ids {
            let mut seen = HashSet::from([start]);
            let mut current = start;
            loop {
                let parent = match &self.types[current.0] {
                    TypeDef::Struct(s) => s.parent,
                    TypeDef::Union(u) => u.parent,
                    TypeDef::Alias(_) => None,
                };
                let Some(parent) = parent else { break };
                if !seen.insert(parent) {
                    // Sever the back edge so later traversals terminate.
                    let name = self.types[parent.0].name().to_string();
                    match &mut self.types[parent.0] {
                        TypeDef::Struct(s) => s.parent = None,
                        TypeDef::Union(u) => u.parent = None,
                        TypeDef::Alias(_) => {}
                    }
                    let (file, span) = self.def_site[&parent];
                    let src = self.src(file);
                    self.err(ResolveError::InheritanceCycle {
                        src,
                        span: span_of(span),
                        name,
                    });
                    break;
                }
                current = parent;
            }
        }
    }

    // === Phase 5: enumerated subtypes ===

    fn validate_enumerated_subtypes(&mut self) {
        // First assign each enumeration table, checking the entries
        // themselves.
        for ns_idx in 0..self.ns.len() {
            for slot_idx in 0..self.ns[ns_idx].structs.len() {
                let (file, id, block, subtype_ids) = {
                    let slot = &self.ns[ns_idx].structs[slot_idx];
                    match &slot.ast.subtypes {
                        None => continue,
                        Some(block) => (
                            slot.file,
                            slot.id,
                            block.clone(),
                            slot.subtype_ids.clone(),
                        ),
                    }
                };
                let mut tags = Vec::new();
                let mut listed = HashSet::new();
                let mut tag_names = HashSet::new();
                let field_names = self.inherited_and_own_field_names(id);
                let ancestor_tags = self.ancestor_enumeration_tags(id);
                let struct_name = self.types[id.0].name().to_string();
                for (entry, subtype_id) in block.entries.iter().zip(subtype_ids) {
                    let Some(subtype_id) = subtype_id else { continue };
                    let entry_span = (entry.pos_start, entry.pos_end);
                    if !matches!(self.types[subtype_id.0], TypeDef::Struct(_)) {
                        let src = self.src(file);
                        self.err(ResolveError::SubtypeNotStruct {
                            src,
                            span: span_of(entry_span),
                            subtype: entry.type_ref.name.clone(),
                        });
                        continue;
                    }
                    if !listed.insert(subtype_id) {
                        let src = self.src(file);
                        self.err(ResolveError::DuplicateSubtype {
                            src,
                            span: span_of(entry_span),
                            subtype: entry.type_ref.name.clone(),
                        });
                        continue;
                    }
                    if !self.parent_chain(subtype_id).contains(&id) {
                        let src = self.src(file);
                        self.err(ResolveError::SubtypeNotChild {
                            src,
                            span: span_of(entry_span),
                            subtype: entry.type_ref.name.clone(),
                            name: struct_name.clone(),
                        });
                        continue;
                    }
                    if !tag_names.insert(entry.tag.clone()) {
                        let src = self.src(file);
                        self.err(ResolveError::DuplicateTag {
                            src,
                            span: span_of(entry_span),
                            tag: entry.tag.clone(),
                            union_name: struct_name.clone(),
                        });
                        continue;
                    }
                    if field_names.contains(&entry.tag) || ancestor_tags.contains(&entry.tag) {
                        let src = self.src(file);
                        self.err(ResolveError::TagCollidesWithField {
                            src,
                            span: span_of(entry_span),
                            tag: entry.tag.clone(),
                        });
                        continue;
                    }
                    tags.push(SubtypeTag {
                        tag: entry.tag.clone(),
                        subtype: subtype_id,
                    });
                }
                if let TypeDef::Struct(s) = &mut self.types[id.0] {
                    s.enumerated_subtypes = Some(SubtypeEnumeration {
                        catch_all: block.catch_all,
                        tags,
                    });
                }
            }
        }

        // Then the tree-structural rules, now that every table exists.
        let struct_ids: Vec<TypeId> = self
            .ns
            .iter()
            .flat_map(|ns| ns.structs.iter().map(|slot| slot.id))
            .collect();
        for id in &struct_ids {
            let Some(s) = self.struct_ref(*id) else { continue };
            let Some(enumeration) = &s.enumerated_subtypes else {
                continue;
            };
            let name = s.name.clone();
            let parent = s.parent;
            let subtypes = s.subtypes.clone();
            let listed: HashSet<TypeId> = enumeration.tags.iter().map(|t| t.subtype).collect();
            let entries: Vec<TypeId> = enumeration.tags.iter().map(|t| t.subtype).collect();

            // The pattern cannot start mid-chain.
            if let Some(parent_id) = parent {
                let parent_enumerates = self
                    .struct_ref(parent_id)
                    .map_or(false, |p| p.enumerated_subtypes.is_some());
                if !parent_enumerates {
                    let parent_name = self.types[parent_id.0].name().to_string();
                    let (file, span) = self.def_site[id];
                    let src = self.src(file);
                    self.err(ResolveError::EnumerationStartsMidChain {
                        src,
                        span: span_of(span),
                        name: name.clone(),
                        parent: parent_name,
                    });
                }
            }

            // Every known subtype must be listed.
            for subtype in &subtypes {
                if !listed.contains(subtype) {
                    let missing = self.types[subtype.0].name().to_string();
                    let (file, span) = self.def_site[id];
                    let src = self.src(file);
                    self.err(ResolveError::EnumerationIncomplete {
                        src,
                        span: span_of(span),
                        name: name.clone(),
                        missing,
                    });
                }
            }

            // A listed subtype that is itself extended must enumerate.
            for entry in entries {
                let Some(sub) = self.struct_ref(entry) else { continue };
                if sub.enumerated_subtypes.is_none() && !sub.subtypes.is_empty() {
                    let sub_name = sub.name.clone();
                    let (file, span) = self.def_site[&entry];
                    let src = self.src(file);
                    self.err(ResolveError::UnenumeratedInteriorSubtype {
                        src,
                        span: span_of(span),
                        name: sub_name,
                    });
                }
            }
        }

        // At most one catch-all per enumeration tree.
        for id in &struct_ids {
            let Some(s) = self.struct_ref(*id) else { continue };
            if s.enumerated_subtypes.is_none() {
                continue;
            }
            let is_root = match s.parent {
                None => true,
                Some(parent_id) => self
                    .struct_ref(parent_id)
                    .map_or(true, |p| p.enumerated_subtypes.is_none()),
            };
            if !is_root {
                continue;
            }
            let mut catch_alls = 0usize;
            let mut stack = vec![*id];
            while let Some(current) = stack.pop() {
                let Some(current_struct) = self.struct_ref(current) else {
                    continue;
                };
                if let Some(enumeration) = &current_struct.enumerated_subtypes {
                    if enumeration.catch_all {
                        catch_alls += 1;
                    }
                    stack.extend(enumeration.tags.iter().map(|t| t.subtype));
                }
            }
            if catch_alls > 1 {
                let name = self.types[id.0].name().to_string();
                let (file, span) = self.def_site[id];
                let src = self.src(file);
                self.err(ResolveError::CatchAllConflict {
                    src,
                    span: span_of(span),
                    name,
                });
            }
        }
        debug!("validated enumerated subtypes");
    }

    fn struct_ref(&self, id: TypeId) -> Option<&Struct> {
        match &self.types[id.0] {
            TypeDef::Struct(s) => Some(s),
            _ => None,
        }
    }

    fn parent_chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = id;
        loop {
            let parent = match &self.types[current.0] {
                TypeDef::Struct(s) => s.parent,
                TypeDef::Union(u) => u.parent,
                TypeDef::Alias(_) => None,
            };
            match parent {
                Some(p) if seen.insert(p) => {
                    chain.push(p);
                    current = p;
                }
                _ => return chain,
            }
        }
    }

    /// Field names declared by this struct or inherited from any ancestor.
    fn inherited_and_own_field_names(&self, id: TypeId) -> HashSet<String> {
        let mut names = HashSet::new();
        if let Some(s) = self.struct_ref(id) {
            names.extend(s.fields.iter().map(|f| f.name.clone()));
        }
        for ancestor in self.parent_chain(id) {
            if let Some(s) = self.struct_ref(ancestor) {
                names.extend(s.fields.iter().map(|f| f.name.clone()));
            }
        }
        names
    }

    fn ancestor_enumeration_tags(&self, id: TypeId) -> HashSet<String> {
        let mut tags = HashSet::new();
        for ancestor in self.parent_chain(id) {
            if let Some(s) = self.struct_ref(ancestor) {
                if let Some(enumeration) = &s.enumerated_subtypes {
                    tags.extend(enumeration.tags.iter().map(|t| t.tag.clone()));
                }
            }
        }
        tags
    }

    // === Phase 6: field and tag validation ===

    fn validate_fields_and_tags(&mut self) {
        for ns_idx in 0..self.ns.len() {
            for slot_idx in 0..self.ns[ns_idx].structs.len() {
                let (file, id, field_nodes, struct_name) = {
                    let slot = &self.ns[ns_idx].structs[slot_idx];
                    (
                        slot.file,
                        slot.id,
                        slot.ast.fields.clone(),
                        slot.ast.name.clone(),
                    )
                };

                // Uniqueness among the struct's own fields.
                let mut own = HashSet::new();
                for node in &field_nodes {
                    if !own.insert(node.name.clone()) {
                        let src = self.src(file);
                        self.err(ResolveError::DuplicateField {
                            src,
                            span: span_of((node.pos_start, node.pos_end)),
                            field: node.name.clone(),
                            type_name: struct_name.clone(),
                        });
                    }
                }

                // An inherited name may not be shadowed.
                let mut inherited: HashMap<String, String> = HashMap::new();
                for ancestor in self.parent_chain(id) {
                    if let Some(s) = self.struct_ref(ancestor) {
                        for field in &s.fields {
                            inherited
                                .entry(field.name.clone())
                                .or_insert_with(|| s.name.clone());
                        }
                    }
                }
                for node in &field_nodes {
                    if let Some(parent) = inherited.get(&node.name) {
                        let parent = parent.clone();
                        let src = self.src(file);
                        self.err(ResolveError::FieldShadowsInherited {
                            src,
                            span: span_of((node.pos_start, node.pos_end)),
                            field: node.name.clone(),
                            parent,
                        });
                    }
                }

                self.resolve_field_defaults(file, id, &field_nodes);
            }

            for slot_idx in 0..self.ns[ns_idx].unions.len() {
                let (file, id, union_name) = {
                    let slot = &self.ns[ns_idx].unions[slot_idx];
                    (slot.file, slot.id, slot.ast.name.clone())
                };
                let (own_tags, tag_sites): (Vec<UnionTagSummary>, Vec<(usize, usize)>) = {
                    let TypeDef::Union(u) = &self.types[id.0] else {
                        continue;
                    };
                    let slot = &self.ns[ns_idx].unions[slot_idx];
                    (
                        u.tags
                            .iter()
                            .map(|t| UnionTagSummary {
                                name: t.name.clone(),
                                catch_all: t.catch_all,
                            })
                            .collect(),
                        slot.ast
                            .tags
                            .iter()
                            .map(|t| (t.pos_start, t.pos_end))
                            .collect(),
                    )
                };

                let mut chain_tags = HashSet::new();
                let mut chain_has_catch_all = false;
                for ancestor in self.parent_chain(id) {
                    if let TypeDef::Union(u) = &self.types[ancestor.0] {
                        for tag in &u.tags {
                            chain_tags.insert(tag.name.clone());
                            chain_has_catch_all |= tag.catch_all;
                        }
                    }
                }

                let mut seen = HashSet::new();
                let mut catch_all_seen = chain_has_catch_all;
                for (i, tag) in own_tags.iter().enumerate() {
                    let span = tag_sites.get(i).copied().unwrap_or((0, 0));
                    if !seen.insert(tag.name.clone()) || chain_tags.contains(&tag.name) {
                        let src = self.src(file);
                        self.err(ResolveError::DuplicateTag {
                            src,
                            span: span_of(span),
                            tag: tag.name.clone(),
                            union_name: union_name.clone(),
                        });
                    }
                    if tag.catch_all {
                        if catch_all_seen {
                            let src = self.src(file);
                            self.err(ResolveError::CatchAllConflict {
                                src,
                                span: span_of(span),
                                name: union_name.clone(),
                            });
                        }
                        catch_all_seen = true;
                    }
                }
            }
        }
        debug!("validated fields and tags");
    }

    fn resolve_field_defaults(&mut self, file: usize, id: TypeId, field_nodes: &[ast::FieldNode]) {
        for node in field_nodes {
            let Some(default) = &node.default else {
                continue;
            };
            let span = (node.pos_start, node.pos_end);
            let Some(field_ty) = self.field_type(id, &node.name) else {
                continue;
            };

            if field_ty.is_nullable() {
                let src = self.src(file);
                self.err(ResolveError::DefaultOnNullable {
                    src,
                    span: span_of(span),
                    field: node.name.clone(),
                });
                continue;
            }

            let resolved = match default {
                DefaultNode::TagRef(tag_name) => {
                    match self.void_tag_of(&field_ty, tag_name) {
                        Some(true) => Some(FieldDefault::Tag(tag_name.clone())),
                        _ => {
                            let src = self.src(file);
                            self.err(ResolveError::DefaultNotVoidTag {
                                src,
                                span: span_of(span),
                                field: node.name.clone(),
                            });
                            None
                        }
                    }
                }
                DefaultNode::Literal(literal) => {
                    let targets_union = {
                        match unwrap_aliases(&self.types, &field_ty) {
                            TypeRef::Named(target) => {
                                matches!(self.types[target.0], TypeDef::Union(_))
                            }
                            _ => false,
                        }
                    };
                    if targets_union {
                        let src = self.src(file);
                        self.err(ResolveError::DefaultNotVoidTag {
                            src,
                            span: span_of(span),
                            field: node.name.clone(),
                        });
                        continue;
                    }
                    match check_literal(&self.types, &field_ty, literal) {
                        Ok(value) => Some(FieldDefault::Value(value)),
                        Err(reason) => {
                            let src = self.src(file);
                            self.err(ResolveError::DefaultNotAssignable {
                                src,
                                span: span_of(span),
                                field: node.name.clone(),
                                reason,
                            });
                            None
                        }
                    }
                }
            };

            if let Some(resolved) = resolved {
                if let TypeDef::Struct(s) = &mut self.types[id.0] {
                    if let Some(field) = s.fields.iter_mut().find(|f| f.name == node.name) {
                        field.default = Some(resolved);
                    }
                }
            }
        }
    }

    fn field_type(&self, id: TypeId, field_name: &str) -> Option<TypeRef> {
        let TypeDef::Struct(s) = &self.types[id.0] else {
            return None;
        };
        s.fields
            .iter()
            .find(|f| f.name == field_name)
            .map(|f| f.ty.clone())
    }

    /// Whether `tag_name` is a Void tag of the union behind `ty` (walking
    /// aliases and the union's extends chain).
    fn void_tag_of(&self, ty: &TypeRef, tag_name: &str) -> Option<bool> {
        let TypeRef::Named(id) = unwrap_aliases(&self.types, ty) else {
            return None;
        };
        let mut current = *id;
        let mut seen = HashSet::new();
        loop {
            let TypeDef::Union(u) = &self.types[current.0] else {
                return None;
            };
            if let Some(tag) = u.tags.iter().find(|t| t.name == tag_name) {
                return Some(matches!(tag.ty, TypeRef::Void));
            }
            match u.parent {
                Some(parent) if seen.insert(parent) => current = parent,
                _ => return Some(false),
            }
        }
    }

    // === Phase 7: examples ===

    fn resolve_examples(&mut self) {
        let mut nodes: Vec<ExampleNode> = Vec::new();
        let mut registry: HashMap<(TypeId, String), usize> = HashMap::new();

        // First pass: collect, typecheck bindings, and record references.
        for ns_idx in 0..self.ns.len() {
            for slot_idx in 0..self.ns[ns_idx].structs.len() {
                let (file, id, examples) = {
                    let slot = &self.ns[ns_idx].structs[slot_idx];
                    (slot.file, slot.id, slot.ast.examples.clone())
                };
                for example in &examples {
                    self.collect_struct_example(
                        file,
                        id,
                        example,
                        &mut nodes,
                        &mut registry,
                    );
                }
            }
            for slot_idx in 0..self.ns[ns_idx].unions.len() {
                let (file, id, examples) = {
                    let slot = &self.ns[ns_idx].unions[slot_idx];
                    (slot.file, slot.id, slot.ast.examples.clone())
                };
                for example in &examples {
                    self.collect_union_example(file, id, example, &mut nodes, &mut registry);
                }
            }
        }

        // Second pass: cross-references must land on known examples.
        for node in &nodes {
            for binding in &node.bindings {
                let ResolvedBinding::Ref { target, span, .. } = binding else {
                    continue;
                };
                if !registry.contains_key(target) {
                    let type_name = self.types[target.0 .0].name().to_string();
                    let src = self.src(node.file);
                    self.errors.push(
                        ResolveError::DanglingExampleReference {
                            src,
                            span: span_of(*span),
                            label: target.1.clone(),
                            type_name,
                        }
                        .into(),
                    );
                }
            }
        }
        if self.failed() {
            return;
        }

        // Third pass: topological order over the reference DAG.
        let order = match self.example_topo_order(&nodes, &registry) {
            Some(order) => order,
            None => return, // cycle reported
        };

        // Fourth pass: bottom-up evaluation into literal trees.
        let mut values: HashMap<usize, Value> = HashMap::new();
        for node_idx in order {
            let value = self.evaluate_example(&nodes[node_idx], &registry, &values);
            values.insert(node_idx, value);
        }
        for (node_idx, value) in values {
            let node = &nodes[node_idx];
            let example = Example {
                label: node.label.clone(),
                text: node.text.clone(),
                value,
            };
            match &mut self.types[node.type_id.0] {
                TypeDef::Struct(s) => {
                    s.examples.insert(node.label.clone(), example);
                }
                TypeDef::Union(u) => {
                    u.examples.insert(node.label.clone(), example);
                }
                TypeDef::Alias(_) => {}
            }
        }
        debug!("evaluated examples");
    }

    fn collect_struct_example(
        &mut self,
        file: usize,
        id: TypeId,
        example: &ast::ExampleDef,
        nodes: &mut Vec<ExampleNode>,
        registry: &mut HashMap<(TypeId, String), usize>,
    ) {
        let type_name = self.types[id.0].name().to_string();
        let example_span = (example.pos_start, example.pos_end);
        if registry.contains_key(&(id, example.label.clone())) {
            let src = self.src(file);
            self.err(ResolveError::DuplicateExampleLabel {
                src,
                span: span_of(example_span),
                label: example.label.clone(),
                type_name,
            });
            return;
        }

        let enumerated = self
            .struct_ref(id)
            .and_then(|s| s.enumerated_subtypes.as_ref())
            .map(|e| {
                e.tags
                    .iter()
                    .map(|t| (t.tag.clone(), t.subtype))
                    .collect::<Vec<_>>()
            });

        let mut bindings = Vec::new();
        if let Some(subtype_tags) = enumerated {
            // A struct with enumerated subtypes is exemplified through one
            // of its subtype tags.
            if example.bindings.len() != 1 {
                let src = self.src(file);
                self.err(ResolveError::ExampleSubtypeTag {
                    src,
                    span: span_of(example_span),
                    type_name,
                });
                return;
            }
            let binding = &example.bindings[0];
            let Some((_, subtype)) = subtype_tags.iter().find(|(tag, _)| *tag == binding.name)
            else {
                let src = self.src(file);
                self.err(ResolveError::ExampleUnknownField {
                    src,
                    span: span_of((binding.pos_start, binding.pos_end)),
                    field: binding.name.clone(),
                    type_name,
                });
                return;
            };
            match &binding.value {
                ExampleValue::Reference(label) => bindings.push(ResolvedBinding::Ref {
                    name: binding.name.clone(),
                    target: (*subtype, label.clone()),
                    list_wrap: false,
                    span: (binding.pos_start, binding.pos_end),
                }),
                ExampleValue::Literal(_) => {
                    let src = self.src(file);
                    self.err(ResolveError::ExampleSubtypeTag {
                        src,
                        span: span_of((binding.pos_start, binding.pos_end)),
                        type_name,
                    });
                    return;
                }
            }
        } else {
            let fields: Vec<(String, TypeRef, bool)> = {
                let Some(s) = self.struct_ref(id) else { return };
                all_struct_fields(&self.types, s)
                    .into_iter()
                    .map(|f| (f.name.clone(), f.ty.clone(), f.default.is_some()))
                    .collect()
            };
            let field_names: HashSet<&String> = fields.iter().map(|(name, _, _)| name).collect();
            for binding in &example.bindings {
                if !field_names.contains(&binding.name) {
                    let src = self.src(file);
                    self.err(ResolveError::ExampleUnknownField {
                        src,
                        span: span_of((binding.pos_start, binding.pos_end)),
                        field: binding.name.clone(),
                        type_name: type_name.clone(),
                    });
                }
            }
            for (field_name, ty, has_default) in &fields {
                let binding = example.bindings.iter().find(|b| b.name == *field_name);
                match binding {
                    Some(binding) => {
                        if let Some(resolved) = self.resolve_example_binding(
                            file,
                            binding,
                            ty,
                        ) {
                            bindings.push(resolved);
                        }
                    }
                    None => {
                        let required = !ty.is_nullable() && !has_default;
                        let unwrapped = unwrap_aliases(&self.types, ty);
                        // List-typed fields materialize as [] when unbound;
                        // the example grammar has no list literals.
                        let exempt = matches!(unwrapped, TypeRef::List(_));
                        if required && !exempt {
                            let src = self.src(file);
                            self.err(ResolveError::ExampleMissingField {
                                src,
                                span: span_of(example_span),
                                label: example.label.clone(),
                                type_name: type_name.clone(),
                                field: field_name.clone(),
                            });
                        }
                    }
                }
            }
        }

        let node_idx = nodes.len();
        registry.insert((id, example.label.clone()), node_idx);
        nodes.push(ExampleNode {
            type_id: id,
            label: example.label.clone(),
            text: example.text.clone(),
            file,
            span: example_span,
            bindings,
            kind: ExampleKind::Struct,
        });
    }

    fn collect_union_example(
        &mut self,
        file: usize,
        id: TypeId,
        example: &ast::ExampleDef,
        nodes: &mut Vec<ExampleNode>,
        registry: &mut HashMap<(TypeId, String), usize>,
    ) {
        let type_name = self.types[id.0].name().to_string();
        let example_span = (example.pos_start, example.pos_end);
        if registry.contains_key(&(id, example.label.clone())) {
            let src = self.src(file);
            self.err(ResolveError::DuplicateExampleLabel {
                src,
                span: span_of(example_span),
                label: example.label.clone(),
                type_name,
            });
            return;
        }
        if example.bindings.len() != 1 {
            let src = self.src(file);
            self.err(ResolveError::ExampleTagCount {
                src,
                span: span_of(example_span),
                label: example.label.clone(),
                count: example.bindings.len(),
            });
            return;
        }
        let binding = &example.bindings[0];
        let binding_span = (binding.pos_start, binding.pos_end);

        let tag_ty: Option<TypeRef> = {
            let TypeDef::Union(u) = &self.types[id.0] else {
                return;
            };
            all_union_tags(&self.types, u)
                .into_iter()
                .find(|t| t.name == binding.name)
                .map(|t| t.ty.clone())
        };
        let Some(tag_ty) = tag_ty else {
            let src = self.src(file);
            self.err(ResolveError::ExampleUnknownField {
                src,
                span: span_of(binding_span),
                field: binding.name.clone(),
                type_name,
            });
            return;
        };

        let mut bindings = Vec::new();
        if matches!(tag_ty, TypeRef::Void) {
            match &binding.value {
                ExampleValue::Literal(Literal::Null) => {
                    bindings.push(ResolvedBinding::Literal {
                        name: binding.name.clone(),
                        value: Value::Null,
                    });
                }
                _ => {
                    let src = self.src(file);
                    self.err(ResolveError::ExampleValueMismatch {
                        src,
                        span: span_of(binding_span),
                        field: binding.name.clone(),
                        reason: "a Void tag is written as '= null'".to_string(),
                    });
                    return;
                }
            }
        } else if let Some(resolved) = self.resolve_example_binding(file, binding, &tag_ty) {
            bindings.push(resolved);
        } else {
            return;
        }

        let node_idx = nodes.len();
        registry.insert((id, example.label.clone()), node_idx);
        nodes.push(ExampleNode {
            type_id: id,
            label: example.label.clone(),
            text: example.text.clone(),
            file,
            span: example_span,
            bindings,
            kind: ExampleKind::Union,
        });
    }

    /// Resolves one `field = value` binding against the field's type,
    /// producing either a checked literal or a cross-example reference.
    fn resolve_example_binding(
        &mut self,
        file: usize,
        binding: &ast::ExampleBinding,
        ty: &TypeRef,
    ) -> Option<ResolvedBinding> {
        let span = (binding.pos_start, binding.pos_end);
        let nullable = ty.is_nullable();
        let unwrapped = unwrap_aliases(&self.types, ty);
        let inner = match unwrapped {
            TypeRef::Nullable(inner) => unwrap_aliases(&self.types, inner),
            other => other,
        };

        if nullable {
            if let ExampleValue::Literal(Literal::Null) = &binding.value {
                return Some(ResolvedBinding::Literal {
                    name: binding.name.clone(),
                    value: Value::Null,
                });
            }
        }

        match inner {
            TypeRef::Named(target) => {
                let target = *target;
                match &binding.value {
                    ExampleValue::Reference(label) => {
                        // For a union-typed field, a bare identifier naming
                        // a Void tag of the union selects that tag; any
                        // other identifier is an example label.
                        if self.void_tag_of(&TypeRef::Named(target), label) == Some(true) {
                            return Some(ResolvedBinding::Literal {
                                name: binding.name.clone(),
                                value: Value::String(label.clone()),
                            });
                        }
                        Some(ResolvedBinding::Ref {
                            name: binding.name.clone(),
                            target: (target, label.clone()),
                            list_wrap: false,
                            span,
                        })
                    }
                    ExampleValue::Literal(_) => {
                        let src = self.src(file);
                        self.err(ResolveError::ExampleValueMismatch {
                            src,
                            span: span_of(span),
                            field: binding.name.clone(),
                            reason: "composite fields are bound to an example label".to_string(),
                        });
                        None
                    }
                }
            }
            TypeRef::List(list) => {
                let element = unwrap_aliases(&self.types, &list.element);
                match (&binding.value, element) {
                    (ExampleValue::Reference(label), TypeRef::Named(target)) => {
                        Some(ResolvedBinding::Ref {
                            name: binding.name.clone(),
                            target: (*target, label.clone()),
                            list_wrap: true,
                            span,
                        })
                    }
                    _ => {
                        let src = self.src(file);
                        self.err(ResolveError::ExampleValueMismatch {
                            src,
                            span: span_of(span),
                            field: binding.name.clone(),
                            reason: "only a list of composites can be bound, by example label"
                                .to_string(),
                        });
                        None
                    }
                }
            }
            _ => match &binding.value {
                ExampleValue::Literal(literal) => {
                    match check_literal(&self.types, ty, literal) {
                        Ok(value) => Some(ResolvedBinding::Literal {
                            name: binding.name.clone(),
                            value,
                        }),
                        Err(reason) => {
                            let src = self.src(file);
                            self.err(ResolveError::ExampleValueMismatch {
                                src,
                                span: span_of(span),
                                field: binding.name.clone(),
                                reason,
                            });
                            None
                        }
                    }
                }
                ExampleValue::Reference(_) => {
                    let src = self.src(file);
                    self.err(ResolveError::ExampleValueMismatch {
                        src,
                        span: span_of(span),
                        field: binding.name.clone(),
                        reason: "example labels only bind composite fields".to_string(),
                    });
                    None
                }
            },
        }
    }

    /// Kahn's algorithm over the cross-example reference graph. Reports a
    /// cycle and returns `None` if one exists.
    fn example_topo_order(
        &mut self,
        nodes: &[ExampleNode],
        registry: &HashMap<(TypeId, String), usize>,
    ) -> Option<Vec<usize>> {
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut pending: Vec<usize> = vec![0; nodes.len()];
        for (idx, node) in nodes.iter().enumerate() {
            for binding in &node.bindings {
                if let ResolvedBinding::Ref { target, .. } = binding {
                    let target_idx = registry[target];
                    dependents[target_idx].push(idx);
                    pending[idx] += 1;
                }
            }
        }
        let mut ready: Vec<usize> = (0..nodes.len()).filter(|i| pending[*i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(idx) = ready.pop() {
            order.push(idx);
            for dependent in &dependents[idx] {
                pending[*dependent] -= 1;
                if pending[*dependent] == 0 {
                    ready.push(*dependent);
                }
            }
        }
        if order.len() == nodes.len() {
            return Some(order);
        }
        let stuck = (0..nodes.len()).find(|i| pending[*i] > 0).unwrap_or(0);
        let node = &nodes[stuck];
        let type_name = self.types[node.type_id.0].name().to_string();
        let src = self.src(node.file);
        self.err(ResolveError::ExampleCycle {
            src,
            span: span_of(node.span),
            label: node.label.clone(),
            type_name,
        });
        None
    }

    fn evaluate_example(
        &self,
        node: &ExampleNode,
        registry: &HashMap<(TypeId, String), usize>,
        values: &HashMap<usize, Value>,
    ) -> Value {
        let resolve_ref = |target: &(TypeId, String), list_wrap: bool| -> Value {
            let value = values
                .get(&registry[target])
                .cloned()
                .unwrap_or(Value::Null);
            if list_wrap {
                Value::List(vec![value])
            } else {
                value
            }
        };

        match node.kind {
            ExampleKind::Union => match node.bindings.first() {
                Some(ResolvedBinding::Literal {
                    name,
                    value: Value::Null,
                }) => Value::String(name.clone()),
                Some(ResolvedBinding::Literal { name, value }) => Value::Object(BTreeMap::from([
                    (name.clone(), value.clone()),
                ])),
                Some(ResolvedBinding::Ref {
                    name,
                    target,
                    list_wrap,
                    ..
                }) => Value::Object(BTreeMap::from([(
                    name.clone(),
                    resolve_ref(target, *list_wrap),
                )])),
                None => Value::Null,
            },
            ExampleKind::Struct => {
                if let Some(s) = self.struct_ref(node.type_id) {
                    if s.enumerated_subtypes.is_some() {
                        // One tag bound to the subtype's example tree.
                        if let Some(ResolvedBinding::Ref { name, target, .. }) =
                            node.bindings.first()
                        {
                            return Value::Object(BTreeMap::from([(
                                name.clone(),
                                resolve_ref(target, false),
                            )]));
                        }
                        return Value::Object(BTreeMap::new());
                    }
                }
                let mut object = BTreeMap::new();
                for binding in &node.bindings {
                    match binding {
                        ResolvedBinding::Literal { name, value } => {
                            object.insert(name.clone(), value.clone());
                        }
                        ResolvedBinding::Ref {
                            name,
                            target,
                            list_wrap,
                            ..
                        } => {
                            object.insert(name.clone(), resolve_ref(target, *list_wrap));
                        }
                    }
                }
                // Unbound fields: defaults materialize, lists become [],
                // nullable fields stay absent.
                if let Some(s) = self.struct_ref(node.type_id) {
                    for field in all_struct_fields(&self.types, s) {
                        if object.contains_key(&field.name) {
                            continue;
                        }
                        match &field.default {
                            Some(FieldDefault::Value(value)) => {
                                object.insert(field.name.clone(), value.clone());
                            }
                            Some(FieldDefault::Tag(tag)) => {
                                object.insert(field.name.clone(), Value::String(tag.clone()));
                            }
                            None => {
                                let unwrapped = unwrap_aliases(&self.types, &field.ty);
                                if matches!(unwrapped, TypeRef::List(_)) {
                                    object.insert(field.name.clone(), Value::List(Vec::new()));
                                }
                            }
                        }
                    }
                }
                Value::Object(object)
            }
        }
    }

    // === Phase 8: routes ===

    fn resolve_routes(&mut self) {
        for ns_idx in 0..self.ns.len() {
            let mut built = Vec::new();
            for slot_idx in 0..self.ns[ns_idx].routes.len() {
                let (file, name, doc, attr_nodes, io) = {
                    let slot = &mut self.ns[ns_idx].routes[slot_idx];
                    (
                        slot.file,
                        slot.ast.name.clone(),
                        slot.ast.doc.clone(),
                        slot.ast.attrs.clone(),
                        slot.io.take(),
                    )
                };
                let Some([request, response, error]) = io else {
                    continue;
                };
                let mut attrs = BTreeMap::new();
                for attr in &attr_nodes {
                    if attrs.contains_key(&attr.name) {
                        let src = self.src(file);
                        self.err(ResolveError::DuplicateRouteAttribute {
                            src,
                            span: span_of((attr.pos_start, attr.pos_end)),
                            name: attr.name.clone(),
                        });
                        continue;
                    }
                    attrs.insert(attr.name.clone(), literal_to_value(&attr.value));
                }
                built.push(Route {
                    name,
                    doc,
                    request,
                    response,
                    error,
                    attrs,
                });
            }
            self.ns[ns_idx].built_routes = built;
        }
        debug!("resolved routes");
    }

    // === Phase 9: value containment ===

    fn check_value_containment(&mut self) {
        // Edges: struct -> struct through required non-nullable fields.
        // Nullable, union, and list references terminate a value and are
        // not edges.
        let struct_ids: Vec<TypeId> = self
            .ns
            .iter()
            .flat_map(|ns| ns.structs.iter().map(|slot| slot.id))
            .collect();
        let mut edges: HashMap<TypeId, Vec<TypeId>> = HashMap::new();
        for id in &struct_ids {
            let Some(s) = self.struct_ref(*id) else { continue };
            let mut out = Vec::new();
            for field in all_struct_fields(&self.types, s) {
                let unwrapped = unwrap_aliases(&self.types, &field.ty);
                if let TypeRef::Named(target) = unwrapped {
                    if matches!(self.types[target.0], TypeDef::Struct(_)) {
                        out.push(*target);
                    }
                }
            }
            edges.insert(*id, out);
        }

        let mut done: HashSet<TypeId> = HashSet::new();
        for start in &struct_ids {
            if done.contains(start) {
                continue;
            }
            let mut stack = vec![(*start, 0usize)];
            let mut path = vec![*start];
            let mut on_path: HashSet<TypeId> = HashSet::from([*start]);
            while let Some((current, next_edge)) = stack.last().copied() {
                let out = edges.get(&current).cloned().unwrap_or_default();
                if next_edge >= out.len() {
                    stack.pop();
                    path.pop();
                    on_path.remove(&current);
                    done.insert(current);
                    continue;
                }
                stack.last_mut().unwrap().1 += 1;
                let target = out[next_edge];
                if on_path.contains(&target) {
                    let cycle_start = path.iter().position(|id| *id == target).unwrap_or(0);
                    let names: Vec<&str> = path[cycle_start..]
                        .iter()
                        .map(|id| self.types[id.0].name())
                        .chain(std::iter::once(self.types[target.0].name()))
                        .collect();
                    let cycle = names.join(" -> ");
                    let name = self.types[target.0].name().to_string();
                    let (file, span) = self.def_site[&target];
                    let src = self.src(file);
                    self.err(ResolveError::ContainmentCycle {
                        src,
                        span: span_of(span),
                        name,
                        cycle,
                    });
                    // Mark the whole path done so the cycle is reported once.
                    for id in &path {
                        done.insert(*id);
                    }
                    break;
                }
                if !done.contains(&target) {
                    stack.push((target, 0));
                    path.push(target);
                    on_path.insert(target);
                }
            }
        }
        debug!("checked value containment");
    }

    // === Phase 10: linearization ===

    fn linearize(&mut self) {
        for ns_idx in 0..self.ns.len() {
            let ns_name = self.ns[ns_idx].name.clone();
            let order = self.ns[ns_idx].order.clone();
            let mut linearized = Vec::with_capacity(order.len());
            let mut visited = HashSet::new();
            let mut in_progress = HashSet::new();
            for id in &order {
                self.linearize_visit(*id, &ns_name, &mut visited, &mut in_progress, &mut linearized);
            }
            self.ns[ns_idx].linearized_out = linearized;
        }
        debug!("linearized namespaces");
    }

    fn linearize_visit(
        &self,
        id: TypeId,
        ns_name: &str,
        visited: &mut HashSet<TypeId>,
        in_progress: &mut HashSet<TypeId>,
        out: &mut Vec<TypeId>,
    ) {
        if visited.contains(&id) || !in_progress.insert(id) {
            return;
        }
        if self.types[id.0].namespace() != ns_name {
            in_progress.remove(&id);
            return;
        }
        let mut deps: Vec<TypeId> = Vec::new();
        match &self.types[id.0] {
            TypeDef::Alias(alias) => {
                if let TypeRef::Named(target) = &alias.target {
                    deps.push(*target);
                }
            }
            TypeDef::Struct(s) => {
                if let Some(parent) = s.parent {
                    deps.push(parent);
                }
                for field in &s.fields {
                    if let TypeRef::Named(target) = &field.ty {
                        deps.push(*target);
                    }
                }
            }
            TypeDef::Union(u) => {
                if let Some(parent) = u.parent {
                    deps.push(parent);
                }
            }
        }
        for dep in deps {
            self.linearize_visit(dep, ns_name, visited, in_progress, out);
        }
        in_progress.remove(&id);
        visited.insert(id);
        out.push(id);
    }

    // === Warnings ===

    fn flag_unused_imports(&mut self) {
        for ns_idx in 0..self.ns.len() {
            let unused: Vec<(usize, String, (usize, usize))> = self.ns[ns_idx]
                .imports
                .iter()
                .filter(|slot| !self.ns[ns_idx].used_imports.contains(&slot.ast.target))
                .map(|slot| {
                    (
                        slot.file,
                        slot.ast.target.clone(),
                        (slot.ast.pos_start, slot.ast.pos_end),
                    )
                })
                .collect();
            for (file, name, span) in unused {
                let src = self.src(file);
                self.warnings.push(
                    ResolveError::UnusedImport {
                        src,
                        span: span_of(span),
                        name,
                    }
                    .into(),
                );
            }
        }
    }

    // === Freeze ===

    fn freeze(self) -> ResolveOutcome {
        let mut namespaces = BTreeMap::new();
        for ns in self.ns {
            let def_by_name = ns
                .symbols
                .into_iter()
                .filter_map(|(name, symbol)| match symbol {
                    Symbol::Type(id) => Some((name, id)),
                    Symbol::Route => None,
                })
                .collect();
            let doc = if ns.docs.is_empty() {
                None
            } else {
                Some(ns.docs.join("\n\n"))
            };
            namespaces.insert(
                ns.name.clone(),
                Namespace {
                    name: ns.name,
                    doc,
                    definitions: ns.order,
                    def_by_name,
                    routes: ns.built_routes,
                    imports: ns
                        .imports
                        .iter()
                        .map(|slot| slot.ast.target.clone())
                        .collect::<BTreeSet<String>>(),
                    linearized: ns.linearized_out,
                },
            );
        }
        ResolveOutcome {
            api: Api {
                types: self.types,
                namespaces,
            },
            warnings: self.warnings,
        }
    }
}

struct UnionTagSummary {
    name: String,
    catch_all: bool,
}

enum ExampleKind {
    Struct,
    Union,
}

struct ExampleNode {
    type_id: TypeId,
    label: String,
    text: Option<String>,
    file: usize,
    span: (usize, usize),
    bindings: Vec<ResolvedBinding>,
    kind: ExampleKind,
}

enum ResolvedBinding {
    Literal {
        name: String,
        value: Value,
    },
    Ref {
        name: String,
        target: (TypeId, String),
        list_wrap: bool,
        span: (usize, usize),
    },
}

fn span_of(span: (usize, usize)) -> miette::SourceSpan {
    (span.0, span.1.saturating_sub(span.0)).into()
}

const BUILTINS: &[&str] = &[
    "Binary",
    "Boolean",
    "Float32",
    "Float64",
    "Int32",
    "Int64",
    "UInt32",
    "UInt64",
    "String",
    "Timestamp",
    "List",
    "Void",
    "Any",
];

fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Follows alias links until a non-alias type reference is reached. The hop
/// limit guards against alias cycles that are still being diagnosed.
fn unwrap_aliases<'a>(types: &'a [TypeDef], ty: &'a TypeRef) -> &'a TypeRef {
    let mut current = ty;
    for _ in 0..=types.len() {
        match current {
            TypeRef::Named(id) => match &types[id.0] {
                TypeDef::Alias(alias) => current = &alias.target,
                _ => return current,
            },
            _ => return current,
        }
    }
    current
}

fn all_struct_fields<'a>(types: &'a [TypeDef], s: &'a Struct) -> Vec<&'a StructField> {
    let mut chain = vec![s];
    let mut parent = s.parent;
    let mut seen = HashSet::new();
    while let Some(id) = parent {
        if !seen.insert(id) {
            break;
        }
        match &types[id.0] {
            TypeDef::Struct(p) => {
                chain.push(p);
                parent = p.parent;
            }
            _ => break,
        }
    }
    chain.into_iter().rev().flat_map(|s| s.fields.iter()).collect()
}

fn all_union_tags<'a>(types: &'a [TypeDef], u: &'a Union) -> Vec<&'a UnionTag> {
    let mut chain = vec![u];
    let mut parent = u.parent;
    let mut seen = HashSet::new();
    while let Some(id) = parent {
        if !seen.insert(id) {
            break;
        }
        match &types[id.0] {
            TypeDef::Union(p) => {
                chain.push(p);
                parent = p.parent;
            }
            _ => break,
        }
    }
    chain.into_iter().rev().flat_map(|u| u.tags.iter()).collect()
}

/// Checks a literal against a resolved type, including every attribute
/// constraint, and converts it to a [`Value`] on success.
fn check_literal(types: &[TypeDef], ty: &TypeRef, literal: &Literal) -> Result<Value, String> {
    let unwrapped = unwrap_aliases(types, ty);
    match unwrapped {
        TypeRef::Nullable(inner) => {
            if matches!(literal, Literal::Null) {
                Ok(Value::Null)
            } else {
                check_literal(types, inner, literal)
            }
        }
        TypeRef::Any => Ok(literal_to_value(literal)),
        TypeRef::Void => match literal {
            Literal::Null => Ok(Value::Null),
            _ => Err("expected null for a Void value".to_string()),
        },
        TypeRef::List(_) => Err("a list value cannot be written as a literal".to_string()),
        TypeRef::Named(_) => Err("a composite value cannot be written as a literal".to_string()),
        TypeRef::Primitive(primitive) => check_primitive(primitive, literal),
    }
}

fn check_primitive(primitive: &Primitive, literal: &Literal) -> Result<Value, String> {
    match primitive {
        Primitive::Binary => match literal {
            Literal::Str(s) => Ok(Value::String(s.clone())),
            other => Err(format!("{} is not valid binary data", describe(other))),
        },
        Primitive::Boolean => match literal {
            Literal::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(format!("{} is not a valid boolean", describe(other))),
        },
        Primitive::Int32(c) => check_int(literal, i64::from(i32::MIN), i64::from(i32::MAX), c),
        Primitive::Int64(c) => check_int(literal, i64::MIN, i64::MAX, c),
        Primitive::UInt32(c) => check_int(literal, 0, i64::from(u32::MAX), c),
        Primitive::UInt64(c) => check_int(literal, 0, i64::MAX, c),
        Primitive::Float32(c) => {
            let value = check_float(literal, c)?;
            if value.abs() > f64::from(f32::MAX) {
                return Err(format!("{value} does not fit in a single-precision float"));
            }
            Ok(Value::Float(value))
        }
        Primitive::Float64(c) => check_float(literal, c).map(Value::Float),
        Primitive::String(c) => match literal {
            Literal::Str(s) => {
                let length = s.chars().count() as u64;
                if let Some(min) = c.min_length {
                    if length < min {
                        return Err(format!("{s:?} has fewer than {min} characters"));
                    }
                }
                if let Some(max) = c.max_length {
                    if length > max {
                        return Err(format!("{s:?} has more than {max} characters"));
                    }
                }
                if let Some(pattern) = &c.pattern {
                    if !pattern.matches(s) {
                        return Err(format!("{s:?} did not match pattern {:?}", pattern.source));
                    }
                }
                Ok(Value::String(s.clone()))
            }
            other => Err(format!("{} is not a valid string", describe(other))),
        },
        Primitive::Timestamp(_) => match literal {
            Literal::Str(s) => Ok(Value::String(s.clone())),
            other => Err(format!("{} is not a valid timestamp string", describe(other))),
        },
    }
}

fn check_int(
    literal: &Literal,
    kind_min: i64,
    kind_max: i64,
    constraints: &IntConstraints,
) -> Result<Value, String> {
    let Literal::Int(value) = literal else {
        return Err(format!("{} is not a valid integer", describe(literal)));
    };
    let value = *value;
    if value < kind_min || value > kind_max {
        return Err(format!("{value} is not within range [{kind_min}, {kind_max}]"));
    }
    if let Some(min) = constraints.min_value {
        if value < min {
            return Err(format!("{value} is less than {min}"));
        }
    }
    if let Some(max) = constraints.max_value {
        if value > max {
            return Err(format!("{value} is greater than {max}"));
        }
    }
    Ok(Value::Int(value))
}

fn check_float(literal: &Literal, constraints: &FloatConstraints) -> Result<f64, String> {
    let value = match literal {
        Literal::Int(n) => *n as f64,
        Literal::Float(n) => *n,
        other => return Err(format!("{} is not a valid real number", describe(other))),
    };
    if !value.is_finite() {
        return Err(format!("{value} values are not supported"));
    }
    if let Some(min) = constraints.min_value {
        if value < min {
            return Err(format!("{value} is less than {min}"));
        }
    }
    if let Some(max) = constraints.max_value {
        if value > max {
            return Err(format!("{value} is greater than {max}"));
        }
    }
    Ok(value)
}

fn describe(literal: &Literal) -> String {
    match literal {
        Literal::Int(n) => format!("integer {n}"),
        Literal::Float(n) => format!("float {n}"),
        Literal::Str(s) => format!("string {s:?}"),
        Literal::Bool(b) => format!("boolean {b}"),
        Literal::Null => "null".to_string(),
    }
}
