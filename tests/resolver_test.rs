use stone_core::error::ResolveError;
use stone_core::ir::{TypeDef, TypeRef};
use stone_core::serialization::Value;
use stone_core::{compile, Compilation, CompileFailure, SourceSpec, StoneError};

fn compile_ok(source: &str) -> Compilation {
    match compile(&[SourceSpec::new("test.stone", source)]) {
        Ok(compilation) => compilation,
        Err(failure) => {
            let rendered: Vec<String> = failure
                .records()
                .iter()
                .map(|r| format!("{}:{}:{}: {}", r.file, r.line, r.column, r.message))
                .collect();
            panic!("expected success, got:\n{}", rendered.join("\n"));
        }
    }
}

fn compile_err(source: &str) -> CompileFailure {
    compile(&[SourceSpec::new("test.stone", source)])
        .expect_err("expected the spec to be rejected")
}

fn struct_def<'a>(compilation: &'a Compilation, ns: &str, name: &str) -> &'a stone_core::ir::Struct {
    match compilation.api.find(ns, name) {
        Some(TypeDef::Struct(s)) => s,
        other => panic!("expected struct {name}, got {other:?}"),
    }
}

fn union_def<'a>(compilation: &'a Compilation, ns: &str, name: &str) -> &'a stone_core::ir::Union {
    match compilation.api.find(ns, name) {
        Some(TypeDef::Union(u)) => u,
        other => panic!("expected union {name}, got {other:?}"),
    }
}

fn linearized_names(compilation: &Compilation, ns: &str) -> Vec<String> {
    let namespace = compilation.api.namespace(ns).unwrap();
    namespace
        .linearized()
        .iter()
        .map(|id| compilation.api.type_def(*id).name().to_string())
        .collect()
}

// === Minimal struct ===

#[test]
fn test_minimal_struct() {
    let c = compile_ok("namespace x\nstruct P\n    a Int64\n    b String\n");
    let p = struct_def(&c, "x", "P");
    let fields = c.api.all_fields(p);
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(fields.iter().all(|f| f.is_required()));
    assert!(matches!(
        fields[0].ty,
        TypeRef::Primitive(stone_core::ir::Primitive::Int64(_))
    ));
    assert!(matches!(
        fields[1].ty,
        TypeRef::Primitive(stone_core::ir::Primitive::String(_))
    ));
    assert_eq!(linearized_names(&c, "x"), vec!["P"]);
}

// === Inheritance and examples ===

const ACCOUNT_SPEC: &str = r#"namespace acct

struct Basic
    id String(min_length=10, max_length=10)
    email String(pattern="[^@]+@[^@]+")

struct Account extends Basic
    name String(min_length=1)?
    status Status

union Status
    active
    inactive Timestamp("%a, %d %b %Y")

"#;

#[test]
fn test_inheritance_and_example() {
    let source = r#"namespace acct

struct Basic
    id String(min_length=10, max_length=10)
    email String(pattern="[^@]+@[^@]+")

struct Account extends Basic
    name String(min_length=1)?
    status Status

    example default "A typical account"
        id = "id-48sa2f0"
        email = "alex@example.org"
        name = "Alexander the Great"
        status = active

union Status
    active
    inactive Timestamp("%a, %d %b %Y")

struct Holder
    account Account

    example default
        account = default
"#;
    let c = compile_ok(source);

    let account = struct_def(&c, "acct", "Account");
    let names: Vec<&str> = c
        .api
        .all_fields(account)
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["id", "email", "name", "status"]);

    let example = c.example("acct", "Account", "default").unwrap();
    let Value::Object(map) = example else {
        panic!("expected an object, got {example:?}");
    };
    assert_eq!(map["id"], Value::String("id-48sa2f0".to_string()));
    assert_eq!(map["email"], Value::String("alex@example.org".to_string()));
    assert_eq!(map["name"], Value::String("Alexander the Great".to_string()));
    // A bare Void tag of the field's union materializes as the tag name.
    assert_eq!(map["status"], Value::String("active".to_string()));

    // The cross-referencing example sees the same tree.
    let holder = c.example("acct", "Holder", "default").unwrap();
    let Value::Object(holder_map) = holder else {
        panic!("expected an object");
    };
    assert_eq!(holder_map["account"], example.clone());
}

#[test]
fn test_string_constraint_violations_in_examples() {
    let source = format!(
        "{ACCOUNT_SPEC}struct Probe extends Basic\n    example default\n        id = \"short\"\n        email = \"alex@example.org\"\n"
    );
    let failure = compile_err(&source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ExampleValueMismatch { field, .. }) if field == "id"
    )));
}

// === Union catch-all ===

#[test]
fn test_union_catch_all() {
    let c = compile_ok("namespace x\nunion E\n    no_account\n    perm_denied\n    unknown*\n");
    let e = union_def(&c, "x", "E");
    let tags = c.api.all_tags(e);
    assert_eq!(tags.len(), 3);
    let catch_all = c.api.catch_all_tag(e).unwrap();
    assert_eq!(catch_all.name, "unknown");
    assert!(matches!(catch_all.ty, TypeRef::Void));
}

#[test]
fn test_union_inherits_tags_from_extends_target() {
    let source = "namespace x\nunion Base\n    a\n    b\nunion Extended extends Base\n    c String\n";
    let c = compile_ok(source);
    let extended = union_def(&c, "x", "Extended");
    let names: Vec<&str> = c
        .api
        .all_tags(extended)
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_catch_all_conflict_in_union_chain() {
    let source = "namespace x\nunion Base\n    a\n    unknown*\nunion Extended extends Base\n    other*\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::CatchAllConflict { .. })
    )));
}

#[test]
fn test_duplicate_tag_across_chain() {
    let source = "namespace x\nunion Base\n    a\nunion Extended extends Base\n    a\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DuplicateTag { tag, .. }) if tag == "a"
    )));
}

// === Enumerated subtypes ===

const SHAPE_TREE: &str = "namespace fs\n\
struct A\n    union\n        b B\n        c C\n    w Int64\n\
struct B extends A\n    x Int64\n\
struct C extends A\n    union*\n        c1 C1\n        c2 C2\n    y Int64\n\
struct C1 extends C\n    z Int64\n\
struct C2 extends C\n";

#[test]
fn test_enumerated_subtype_tree() {
    let c = compile_ok(SHAPE_TREE);
    let a = struct_def(&c, "fs", "A");
    let enumeration = a.enumerated_subtypes.as_ref().unwrap();
    assert!(!enumeration.catch_all);
    let tags: Vec<(&str, &str)> = enumeration
        .tags
        .iter()
        .map(|t| (t.tag.as_str(), c.api.type_def(t.subtype).name()))
        .collect();
    assert_eq!(tags, vec![("b", "B"), ("c", "C")]);

    let c_struct = struct_def(&c, "fs", "C");
    assert!(c_struct.enumerated_subtypes.as_ref().unwrap().catch_all);
    assert!(struct_def(&c, "fs", "C1").enumerated_subtypes.is_none());
    assert!(struct_def(&c, "fs", "C2").enumerated_subtypes.is_none());
}

#[test]
fn test_single_subtype_catch_all_enumeration() {
    let source = "namespace x\nstruct A\n    union*\n        b B\n    w Int64\nstruct B extends A\n";
    let c = compile_ok(source);
    let a = struct_def(&c, "x", "A");
    let enumeration = a.enumerated_subtypes.as_ref().unwrap();
    assert!(enumeration.catch_all);
    assert_eq!(enumeration.tags.len(), 1);
}

#[test]
fn test_subtype_tag_collides_with_field() {
    let source = "namespace x\n\
struct Resource\n    union\n        file File\n        folder Folder\n    file String\n\
struct File extends Resource\n\
struct Folder extends Resource\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::TagCollidesWithField { tag, .. }) if tag == "file"
    )));
}

#[test]
fn test_enumeration_must_list_every_subtype() {
    let source = "namespace x\n\
struct A\n    union\n        b B\n    w Int64\n\
struct B extends A\n\
struct D extends A\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::EnumerationIncomplete { missing, .. }) if missing == "D"
    )));
}

#[test]
fn test_enumeration_cannot_start_mid_chain() {
    let source = "namespace x\n\
struct A\n    w Int64\n\
struct B extends A\n    union\n        c C\n\
struct C extends B\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::EnumerationStartsMidChain { name, .. }) if name == "B"
    )));
}

#[test]
fn test_subtype_must_extend_the_enumerating_struct() {
    let source = "namespace x\n\
struct A\n    union\n        b B\n    w Int64\n\
struct B\n    x Int64\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::SubtypeNotChild { subtype, .. }) if subtype == "B"
    )));
}

#[test]
fn test_enumerated_subtype_example() {
    let source = "namespace x\n\
struct Resource\n    union\n        file File\n    path String\n\
    example default\n        file = default\n\
struct File extends Resource\n    size UInt64\n\
    example default\n        path = \"/a.txt\"\n        size = 4\n";
    let c = compile_ok(source);
    let value = c.example("x", "Resource", "default").unwrap();
    let Value::Object(map) = value else { panic!() };
    let Value::Object(file) = &map["file"] else {
        panic!("expected subtype tree")
    };
    assert_eq!(file["path"], Value::String("/a.txt".to_string()));
    assert_eq!(file["size"], Value::Int(4));
}

// === Defaults and nullability ===

#[test]
fn test_default_on_nullable_rejected() {
    let failure = compile_err("namespace x\nstruct S\n    name String? = \"x\"\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DefaultOnNullable { field, .. }) if field == "name"
    )));
}

#[test]
fn test_null_default_on_nullable_rejected() {
    let failure = compile_err("namespace x\nstruct S\n    name String? = null\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DefaultOnNullable { .. })
    )));
}

#[test]
fn test_default_must_fit_constraints() {
    let failure = compile_err("namespace x\nstruct S\n    n UInt32 = -4\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DefaultNotAssignable { field, .. }) if field == "n"
    )));
}

#[test]
fn test_union_field_default_must_be_void_tag() {
    let base = "namespace x\nunion Status\n    active\n    inactive Timestamp(\"%Y\")\n";

    let ok = format!("{base}struct S\n    status Status = active\n");
    let c = compile_ok(&ok);
    let s = struct_def(&c, "x", "S");
    assert!(matches!(
        s.fields[0].default,
        Some(stone_core::ir::FieldDefault::Tag(ref tag)) if tag == "active"
    ));

    let typed_tag = format!("{base}struct S\n    status Status = inactive\n");
    let failure = compile_err(&typed_tag);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DefaultNotVoidTag { .. })
    )));

    let literal = format!("{base}struct S\n    status Status = \"active\"\n");
    let failure = compile_err(&literal);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DefaultNotVoidTag { .. })
    )));
}

#[test]
fn test_defaults_materialize_in_examples() {
    let source = "namespace x\nstruct S\n    a Int64\n    retries Int64 = 3\n    note String?\n\
    example default\n        a = 1\n";
    let c = compile_ok(source);
    let Value::Object(map) = c.example("x", "S", "default").unwrap() else {
        panic!()
    };
    assert_eq!(map["a"], Value::Int(1));
    assert_eq!(map["retries"], Value::Int(3));
    assert!(!map.contains_key("note"));
}

// === Aliases ===

#[test]
fn test_alias_resolves_transitively() {
    let source = "namespace x\nalias Name = ShortString\nalias ShortString = String(max_length=5)\n\
struct S\n    name Name = \"ok\"\n";
    let c = compile_ok(source);
    let s = struct_def(&c, "x", "S");
    assert!(matches!(
        c.api.unwrap_aliases(&s.fields[0].ty),
        TypeRef::Primitive(stone_core::ir::Primitive::String(_))
    ));

    let too_long = source.replace("\"ok\"", "\"much too long\"");
    let failure = compile_err(&too_long);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DefaultNotAssignable { .. })
    )));
}

#[test]
fn test_alias_cycle_rejected() {
    let failure = compile_err("namespace x\nalias A = B\nalias B = A\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::AliasCycle { .. })
    )));
}

#[test]
fn test_struct_cannot_extend_alias() {
    let source = "namespace x\nstruct Base\n    a Int64\nalias AliasedBase = Base\nstruct S extends AliasedBase\n    b Int64\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ExtendsAlias { .. })
    )));
}

// === Value containment ===

#[test]
fn test_nullable_self_reference_accepted() {
    let c = compile_ok("namespace x\nstruct Node\n    value Int64\n    next Node?\n");
    let node = struct_def(&c, "x", "Node");
    assert!(node.fields[1].ty.is_nullable());
}

#[test]
fn test_required_self_reference_rejected() {
    let failure = compile_err("namespace x\nstruct Node\n    value Int64\n    next Node\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ContainmentCycle { name, .. }) if name == "Node"
    )));
}

#[test]
fn test_mutual_containment_cycle_rejected() {
    let source = "namespace x\nstruct A\n    b B\nstruct B\n    a A\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ContainmentCycle { .. })
    )));
}

#[test]
fn test_union_breaks_containment_cycle() {
    let source = "namespace x\nstruct A\n    which Choice\nunion Choice\n    a A\n    none\n";
    compile_ok(source);
}

#[test]
fn test_list_breaks_containment_cycle() {
    compile_ok("namespace x\nstruct Tree\n    children List(Tree)\n");
}

// === Inheritance errors ===

#[test]
fn test_inheritance_cycle_rejected() {
    let source = "namespace x\nstruct A extends B\n    a Int64\nstruct B extends A\n    b Int64\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::InheritanceCycle { .. })
    )));
}

#[test]
fn test_struct_extending_union_rejected() {
    let source = "namespace x\nunion U\n    a\nstruct S extends U\n    b Int64\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ExtendsNotStruct { name, .. }) if name == "U"
    )));
}

#[test]
fn test_inherited_field_cannot_be_shadowed() {
    let source = "namespace x\nstruct Base\n    a Int64\nstruct S extends Base\n    a String\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::FieldShadowsInherited { field, .. }) if field == "a"
    )));
}

// === Type attributes ===

#[test]
fn test_min_greater_than_max_rejected() {
    let failure = compile_err("namespace x\nstruct S\n    a Int64(min_value=5, max_value=1)\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::InvalidAttribute { .. })
    )));
}

#[test]
fn test_bad_pattern_rejected() {
    let failure = compile_err("namespace x\nstruct S\n    a String(pattern=\"[unclosed\")\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::BadPattern { .. })
    )));
}

#[test]
fn test_timestamp_requires_format() {
    let failure = compile_err("namespace x\nstruct S\n    t Timestamp\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::InvalidAttribute { type_name, .. }) if type_name == "Timestamp"
    )));
}

#[test]
fn test_list_requires_element_type() {
    let failure = compile_err("namespace x\nstruct S\n    xs List\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ListMissingElement { .. })
    )));
}

#[test]
fn test_nested_list_with_bounds() {
    let c = compile_ok("namespace x\nstruct S\n    xs List(List(Int32), min_items=1, max_items=8)\n");
    let s = struct_def(&c, "x", "S");
    let TypeRef::List(outer) = &s.fields[0].ty else {
        panic!("expected a list")
    };
    assert_eq!(outer.min_items, Some(1));
    assert_eq!(outer.max_items, Some(8));
    assert!(matches!(outer.element, TypeRef::List(_)));
}

#[test]
fn test_void_struct_field_rejected() {
    let failure = compile_err("namespace x\nstruct S\n    v Void\n");
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::VoidStructField { .. })
    )));
}

// === Examples: structure and references ===

#[test]
fn test_example_missing_required_field() {
    let source = "namespace x\nstruct S\n    a Int64\n    b String\n    example default\n        a = 1\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ExampleMissingField { field, .. }) if field == "b"
    )));
}

#[test]
fn test_example_unknown_field() {
    let source = "namespace x\nstruct S\n    a Int64\n    example default\n        a = 1\n        zz = 2\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ExampleUnknownField { field, .. }) if field == "zz"
    )));
}

#[test]
fn test_dangling_example_reference() {
    let source = "namespace x\nstruct Outer\n    inner Inner\n    example default\n        inner = nonexistent\n\
struct Inner\n    a Int64\n    example default\n        a = 1\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DanglingExampleReference { label, .. }) if label == "nonexistent"
    )));
}

#[test]
fn test_example_reference_cycle() {
    let source = "namespace x\n\
struct A\n    b B?\n    example default\n        b = default\n\
struct B\n    a A?\n    example default\n        a = default\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ExampleCycle { .. })
    )));
}

#[test]
fn test_union_example_binds_exactly_one_tag() {
    let source = "namespace x\nunion U\n    a\n    b\n    example default\n        a = null\n        b = null\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::ExampleTagCount { count: 2, .. })
    )));
}

#[test]
fn test_union_example_evaluation() {
    let source = "namespace x\nunion U\n    a\n    n Int64\n\
    example default\n        a = null\n\
    example numbered\n        n = 7\n";
    let c = compile_ok(source);
    assert_eq!(
        c.example("x", "U", "default").unwrap(),
        &Value::String("a".to_string())
    );
    let Value::Object(map) = c.example("x", "U", "numbered").unwrap() else {
        panic!()
    };
    assert_eq!(map["n"], Value::Int(7));
}

#[test]
fn test_duplicate_example_label() {
    let source = "namespace x\nstruct S\n    a Int64\n\
    example default\n        a = 1\n\
    example default\n        a = 2\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DuplicateExampleLabel { .. })
    )));
}

#[test]
fn test_list_of_composites_bound_by_label() {
    let source = "namespace x\n\
struct Outer\n    entries List(Inner)\n    example default\n        entries = default\n\
struct Inner\n    a Int64\n    example default\n        a = 3\n";
    let c = compile_ok(source);
    let Value::Object(map) = c.example("x", "Outer", "default").unwrap() else {
        panic!()
    };
    let Value::List(items) = &map["entries"] else {
        panic!("expected a list")
    };
    assert_eq!(items.len(), 1);
}

#[test]
fn test_unbound_list_field_materializes_empty() {
    let source = "namespace x\nstruct S\n    xs List(Int64)\n    a Int64\n    example default\n        a = 1\n";
    let c = compile_ok(source);
    let Value::Object(map) = c.example("x", "S", "default").unwrap() else {
        panic!()
    };
    assert_eq!(map["xs"], Value::List(vec![]));
}

// === Error accumulation ===

#[test]
fn test_multiple_errors_reported_in_one_phase() {
    let source = "namespace x\nstruct S\n    a Missing1\n    b Missing2\n";
    let failure = compile_err(source);
    let unresolved = failure
        .diagnostics
        .iter()
        .filter(|d| {
            matches!(
                d,
                StoneError::Resolve(ResolveError::UnresolvedReference { .. })
            )
        })
        .count();
    assert_eq!(unresolved, 2);
}

#[test]
fn test_duplicate_definition_rejected() {
    let source = "namespace x\nstruct S\n    a Int64\nunion S\n    t\n";
    let failure = compile_err(source);
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DuplicateDefinition { name, .. }) if name == "S"
    )));
}

// === Linearization ===

#[test]
fn test_linearization_orders_value_dependencies() {
    let source = "namespace x\nstruct U\n    v V\nstruct V\n    n Int64\n";
    let c = compile_ok(source);
    assert_eq!(linearized_names(&c, "x"), vec!["V", "U"]);
    // Declaration order is preserved separately.
    let ns = c.api.namespace("x").unwrap();
    let declared: Vec<&str> = ns
        .definitions
        .iter()
        .map(|id| c.api.type_def(*id).name())
        .collect();
    assert_eq!(declared, vec!["U", "V"]);
}

#[test]
fn test_linearization_orders_inheritance() {
    let c = compile_ok(SHAPE_TREE);
    let order = linearized_names(&c, "fs");
    let position =
        |name: &str| order.iter().position(|n| n == name).unwrap_or(usize::MAX);
    assert!(position("A") < position("B"));
    assert!(position("A") < position("C"));
    assert!(position("C") < position("C1"));
    assert!(position("C") < position("C2"));
}
