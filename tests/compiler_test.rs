// Pipeline-level tests: multiple files, imports across namespaces, routes,
// and the diagnostic record stream.

use stone_core::error::ResolveError;
use stone_core::ir::{TypeDef, TypeRef};
use stone_core::serialization::Value;
use stone_core::{compile, Severity, SourceSpec, StoneError};

#[test]
fn test_namespace_merged_across_files() {
    let sources = [
        SourceSpec::new(
            "files_a.stone",
            "namespace files\n\"File types.\"\nstruct File\n    path String\n",
        ),
        SourceSpec::new(
            "files_b.stone",
            "namespace files\nstruct Folder\n    path String\n",
        ),
    ];
    let c = compile(&sources).unwrap();
    let ns = c.api.namespace("files").unwrap();
    assert_eq!(ns.definitions.len(), 2);
    assert_eq!(ns.doc.as_deref(), Some("File types."));
    assert!(c.api.find("files", "File").is_some());
    assert!(c.api.find("files", "Folder").is_some());
}

#[test]
fn test_namespaces_are_ordered_by_name() {
    let sources = [
        SourceSpec::new("z.stone", "namespace zebra\nstruct Z\n    a Int64\n"),
        SourceSpec::new("a.stone", "namespace aardvark\nstruct A\n    a Int64\n"),
    ];
    let c = compile(&sources).unwrap();
    let names: Vec<&str> = c.api.namespaces().map(|ns| ns.name.as_str()).collect();
    assert_eq!(names, vec!["aardvark", "zebra"]);
}

#[test]
fn test_cross_namespace_reference_via_import() {
    let sources = [
        SourceSpec::new(
            "users.stone",
            "namespace users\nstruct Account\n    account_id String\n",
        ),
        SourceSpec::new(
            "sharing.stone",
            "namespace sharing\nimport users\nstruct Membership\n    member users.Account\n    role String\n",
        ),
    ];
    let c = compile(&sources).unwrap();
    let TypeDef::Struct(membership) = c.api.find("sharing", "Membership").unwrap() else {
        panic!()
    };
    let TypeRef::Named(id) = &membership.fields[0].ty else {
        panic!("expected a resolved cross-namespace reference")
    };
    assert_eq!(c.api.type_def(*id).name(), "Account");
    assert_eq!(c.api.type_def(*id).namespace(), "users");
    assert!(c.warnings.is_empty());
}

#[test]
fn test_unqualified_reference_found_through_import() {
    let sources = [
        SourceSpec::new(
            "users.stone",
            "namespace users\nstruct Account\n    account_id String\n",
        ),
        SourceSpec::new(
            "sharing.stone",
            "namespace sharing\nimport users\nstruct Membership\n    member Account\n",
        ),
    ];
    let c = compile(&sources).unwrap();
    let TypeDef::Struct(membership) = c.api.find("sharing", "Membership").unwrap() else {
        panic!()
    };
    assert!(matches!(membership.fields[0].ty, TypeRef::Named(_)));
}

#[test]
fn test_unknown_import_rejected() {
    let sources = [SourceSpec::new(
        "a.stone",
        "namespace a\nimport nonexistent\nstruct S\n    x Int64\n",
    )];
    let failure = compile(&sources).unwrap_err();
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::UnknownImport { name, .. }) if name == "nonexistent"
    )));
}

#[test]
fn test_qualified_reference_requires_import() {
    let sources = [
        SourceSpec::new("users.stone", "namespace users\nstruct Account\n    a Int64\n"),
        SourceSpec::new(
            "sharing.stone",
            "namespace sharing\nstruct S\n    who users.Account\n",
        ),
    ];
    let failure = compile(&sources).unwrap_err();
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::NamespaceNotImported { name, .. }) if name == "users"
    )));
}

#[test]
fn test_unused_import_warns_but_compiles() {
    let sources = [
        SourceSpec::new("users.stone", "namespace users\nstruct Account\n    a Int64\n"),
        SourceSpec::new(
            "sharing.stone",
            "namespace sharing\nimport users\nstruct S\n    a Int64\n",
        ),
    ];
    let c = compile(&sources).unwrap();
    assert_eq!(c.warnings.len(), 1);
    let records = c.warning_records();
    assert_eq!(records[0].severity, Severity::Warning);
    assert!(records[0].message.contains("users"));
}

#[test]
fn test_routes_resolved_with_attrs() {
    let source = "namespace files\n\
struct GetMetadataArg\n    path String\n\
struct Metadata\n    name String\n\
union GetMetadataError\n    not_found\n    other*\n\
route get_metadata(GetMetadataArg, Metadata, GetMetadataError)\n    \"Fetch metadata for a path.\"\n    attrs\n        owner = \"platform\"\n        max_batch = 20\n        is_preview = false\n";
    let c = compile(&[SourceSpec::new("files.stone", source)]).unwrap();
    let ns = c.api.namespace("files").unwrap();
    assert_eq!(ns.routes.len(), 1);
    let route = ns.route("get_metadata").unwrap();
    assert_eq!(route.doc.as_deref(), Some("Fetch metadata for a path."));
    assert_eq!(route.attrs["owner"], Value::String("platform".to_string()));
    assert_eq!(route.attrs["max_batch"], Value::Int(20));
    assert_eq!(route.attrs["is_preview"], Value::Bool(false));
    assert!(matches!(route.request, TypeRef::Named(_)));
    assert!(matches!(route.error, TypeRef::Named(_)));
}

#[test]
fn test_route_io_types_helper() {
    let source = "namespace files\n\
struct Arg\n    path String\n\
struct Entry\n    name String\n\
union ListError\n    not_found\n\
route list_folder(Arg, List(Entry), ListError)\n\
route ping(Void, Void, Void)\n";
    let c = compile(&[SourceSpec::new("files.stone", source)]).unwrap();
    let ns = c.api.namespace("files").unwrap();
    let io: Vec<&str> = c
        .api
        .route_io_types(ns)
        .into_iter()
        .map(|id| c.api.type_def(id).name())
        .collect();
    // List(Entry) contributes its element type; Void contributes nothing.
    assert_eq!(io, vec!["Arg", "Entry", "ListError"]);
}

#[test]
fn test_route_name_collision_rejected() {
    let source = "namespace x\n\
struct A\n    a Int64\n\
route probe(Void, Void, Void)\n\
route probe(Void, Void, Void)\n";
    let failure = compile(&[SourceSpec::new("x.stone", source)]).unwrap_err();
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::DuplicateDefinition { name, .. }) if name == "probe"
    )));
}

#[test]
fn test_route_referenced_as_type_rejected() {
    let source = "namespace x\n\
route probe(Void, Void, Void)\n\
struct S\n    p probe\n";
    let failure = compile(&[SourceSpec::new("x.stone", source)]).unwrap_err();
    assert!(failure.diagnostics.iter().any(|d| matches!(
        d,
        StoneError::Resolve(ResolveError::RouteInTypePosition { name, .. }) if name == "probe"
    )));
}

#[test]
fn test_records_ordered_by_file_then_position() {
    let sources = [
        SourceSpec::new("one.stone", "namespace one\nstruct A\n    x Bad1\n    y Bad2\n"),
        SourceSpec::new("two.stone", "namespace two\nstruct B\n    z Bad3\n"),
    ];
    let failure = compile(&sources).unwrap_err();
    let records = failure.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].file, "one.stone");
    assert_eq!(records[1].file, "one.stone");
    assert!(records[0].line < records[1].line);
    assert_eq!(records[2].file, "two.stone");
    assert!(records.iter().all(|r| r.severity == Severity::Error));
}

#[test]
fn test_lex_error_reported_with_location() {
    let sources = [SourceSpec::new(
        "bad.stone",
        "namespace x\nstruct S\n    a Int64 @\n",
    )];
    let failure = compile(&sources).unwrap_err();
    let records = failure.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].line, 3);
    assert!(records[0].message.contains('@'));
}

#[test]
fn test_doc_strings_survive_into_ir() {
    let source = "namespace files\n\"Operations on files.\"\n\
struct File\n    \"\"\"A file on the server.\n\nPaths are rooted.\"\"\"\n    path String\n        \"Absolute path.\"\n";
    let c = compile(&[SourceSpec::new("files.stone", source)]).unwrap();
    let ns = c.api.namespace("files").unwrap();
    assert_eq!(ns.doc.as_deref(), Some("Operations on files."));
    let TypeDef::Struct(file) = c.api.find("files", "File").unwrap() else {
        panic!()
    };
    assert!(file.doc.as_deref().unwrap().contains("Paths are rooted."));
    assert_eq!(file.fields[0].doc.as_deref(), Some("Absolute path."));
}
