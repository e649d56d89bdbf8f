use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum StoneError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),
}

/// Diagnostic severity, as surfaced in [`DiagnosticRecord`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A flattened diagnostic: one line of the stream a driver prints before
/// exiting non-zero. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl StoneError {
    pub fn severity(&self) -> Severity {
        match Diagnostic::severity(self) {
            Some(miette::Severity::Warning) => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Flattens this diagnostic into a `(severity, file, line, column,
    /// message)` record by reading back through its source span.
    pub fn record(&self) -> DiagnosticRecord {
        let span: SourceSpan = self
            .labels()
            .and_then(|mut labels| labels.next())
            .map(|label| (label.offset(), label.len()).into())
            .unwrap_or_else(|| (0, 0).into());
        let located = self
            .source_code()
            .and_then(|src| src.read_span(&span, 0, 0).ok())
            .map(|contents| {
                (
                    contents.name().unwrap_or("<input>").to_string(),
                    contents.line() + 1,
                    contents.column() + 1,
                )
            });
        let (file, line, column) = located.unwrap_or_else(|| ("<input>".to_string(), 0, 0));
        DiagnosticRecord {
            severity: self.severity(),
            file,
            line,
            column,
            message: self.to_string(),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum LexError {
    #[error("Illegal character {character:?}")]
    #[diagnostic(
        code(lex::illegal_character),
        help("This character is not part of any token of the language.")
    )]
    IllegalCharacter {
        #[source_code]
        src: NamedSource<String>,
        #[label("not a valid token here")]
        span: SourceSpan,
        character: char,
    },

    #[error("Unterminated string literal")]
    #[diagnostic(
        code(lex::unterminated_string),
        help("Close the string with '\"', or use a triple-quoted string to span lines.")
    )]
    UnterminatedString {
        #[source_code]
        src: NamedSource<String>,
        #[label("string starts here and never closes")]
        span: SourceSpan,
    },

    #[error("Indentation mixes tabs and spaces")]
    #[diagnostic(
        code(lex::mixed_indentation),
        help("Use only tabs or only spaces to indent a line, not both.")
    )]
    MixedIndentation {
        #[source_code]
        src: NamedSource<String>,
        #[label("this line's leading whitespace mixes tabs and spaces")]
        span: SourceSpan,
    },

    #[error("Indentation does not match any enclosing block")]
    #[diagnostic(
        code(lex::indent_mismatch),
        help("Dedents must return to the column of an enclosing line.")
    )]
    IndentMismatch {
        #[source_code]
        src: NamedSource<String>,
        #[label("no enclosing block starts at this column")]
        span: SourceSpan,
    },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParseError {
    #[error("Unexpected token")]
    #[diagnostic(
        code(parse::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
    },

    #[error("Unexpected end of file")]
    #[diagnostic(
        code(parse::unexpected_eof),
        help("The file ended while the parser expected more tokens.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("file ends here")]
        span: SourceSpan,
    },

    #[error("Keyword argument '{name}' given more than once")]
    #[diagnostic(code(parse::duplicate_keyword_argument))]
    DuplicateKeywordArgument {
        #[source_code]
        src: NamedSource<String>,
        #[label("second occurrence")]
        span: SourceSpan,
        name: String,
    },

    #[error("Catch-all marker on a tag that carries a type")]
    #[diagnostic(
        code(parse::catch_all_on_typed_tag),
        help("Only a bare (Void) tag can be marked with '*'.")
    )]
    CatchAllOnTypedTag {
        #[source_code]
        src: NamedSource<String>,
        #[label("this tag has a type and cannot be the catch-all")]
        span: SourceSpan,
    },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ResolveError {
    // --- redefinition ---
    #[error("Symbol '{name}' is already defined in namespace '{namespace}'")]
    #[diagnostic(code(resolve::duplicate_definition))]
    DuplicateDefinition {
        #[source_code]
        src: NamedSource<String>,
        #[label("second definition of '{name}'")]
        span: SourceSpan,
        name: String,
        namespace: String,
    },

    #[error("Field '{field}' is declared twice in '{type_name}'")]
    #[diagnostic(code(resolve::duplicate_field))]
    DuplicateField {
        #[source_code]
        src: NamedSource<String>,
        #[label("second declaration")]
        span: SourceSpan,
        field: String,
        type_name: String,
    },

    #[error("Field '{field}' is already defined in supertype '{parent}'")]
    #[diagnostic(
        code(resolve::field_shadows_inherited),
        help("Inherited fields may not be redeclared in a subtype.")
    )]
    FieldShadowsInherited {
        #[source_code]
        src: NamedSource<String>,
        #[label("shadows the inherited field")]
        span: SourceSpan,
        field: String,
        parent: String,
    },

    #[error("Tag '{tag}' is already defined in union '{union_name}' or its chain")]
    #[diagnostic(code(resolve::duplicate_tag))]
    DuplicateTag {
        #[source_code]
        src: NamedSource<String>,
        #[label("second declaration")]
        span: SourceSpan,
        tag: String,
        union_name: String,
    },

    // --- unresolved references ---
    #[error("Namespace '{name}' is not defined in any spec")]
    #[diagnostic(code(resolve::unknown_import))]
    UnknownImport {
        #[source_code]
        src: NamedSource<String>,
        #[label("imported here")]
        span: SourceSpan,
        name: String,
    },

    #[error("A namespace cannot import itself")]
    #[diagnostic(code(resolve::self_import))]
    SelfImport {
        #[source_code]
        src: NamedSource<String>,
        #[label("imports the enclosing namespace")]
        span: SourceSpan,
    },

    #[error("Symbol '{name}' is undefined")]
    #[diagnostic(code(resolve::unresolved_reference))]
    UnresolvedReference {
        #[source_code]
        src: NamedSource<String>,
        #[label("not found in scope")]
        span: SourceSpan,
        name: String,
    },

    #[error("Namespace '{name}' is not imported here")]
    #[diagnostic(
        code(resolve::namespace_not_imported),
        help("Add an 'import' for the namespace before referencing its types.")
    )]
    NamespaceNotImported {
        #[source_code]
        src: NamedSource<String>,
        #[label("qualified reference")]
        span: SourceSpan,
        name: String,
    },

    // --- kind mismatches ---
    #[error("'{name}' is a route and cannot be used as a type")]
    #[diagnostic(code(resolve::route_in_type_position))]
    RouteInTypePosition {
        #[source_code]
        src: NamedSource<String>,
        #[label("routes are not types")]
        span: SourceSpan,
        name: String,
    },

    #[error("A struct can only extend another struct: '{name}' is not a struct")]
    #[diagnostic(code(resolve::extends_not_struct))]
    ExtendsNotStruct {
        #[source_code]
        src: NamedSource<String>,
        #[label("not a struct")]
        span: SourceSpan,
        name: String,
    },

    #[error("A union can only extend another union: '{name}' is not a union")]
    #[diagnostic(code(resolve::extends_not_union))]
    ExtendsNotUnion {
        #[source_code]
        src: NamedSource<String>,
        #[label("not a union")]
        span: SourceSpan,
        name: String,
    },

    #[error("Cannot extend the alias '{name}'; use the aliased type's name")]
    #[diagnostic(code(resolve::extends_alias))]
    ExtendsAlias {
        #[source_code]
        src: NamedSource<String>,
        #[label("alias used as a supertype")]
        span: SourceSpan,
        name: String,
    },

    #[error("Struct field '{field}' cannot have a Void type")]
    #[diagnostic(code(resolve::void_struct_field))]
    VoidStructField {
        #[source_code]
        src: NamedSource<String>,
        #[label("Void is only meaningful for union tags and routes")]
        span: SourceSpan,
        field: String,
    },

    #[error("Union tag '{tag}' spells out Void; omit the type instead")]
    #[diagnostic(code(resolve::explicit_void_tag))]
    ExplicitVoidTag {
        #[source_code]
        src: NamedSource<String>,
        #[label("write the tag with no type")]
        span: SourceSpan,
        tag: String,
    },

    #[error("Void cannot be marked nullable")]
    #[diagnostic(code(resolve::nullable_void))]
    NullableVoid {
        #[source_code]
        src: NamedSource<String>,
        #[label("'?' on Void")]
        span: SourceSpan,
    },

    #[error("Reference to a nullable type cannot itself be nullable")]
    #[diagnostic(code(resolve::double_nullable))]
    DoubleNullable {
        #[source_code]
        src: NamedSource<String>,
        #[label("already nullable")]
        span: SourceSpan,
    },

    #[error("Attributes cannot be specified for instantiated type '{name}'")]
    #[diagnostic(code(resolve::args_on_user_type))]
    ArgsOnUserType {
        #[source_code]
        src: NamedSource<String>,
        #[label("user-defined types take no arguments")]
        span: SourceSpan,
        name: String,
    },

    #[error("List requires an element type argument")]
    #[diagnostic(code(resolve::list_missing_element))]
    ListMissingElement {
        #[source_code]
        src: NamedSource<String>,
        #[label("e.g. List(String)")]
        span: SourceSpan,
    },

    // --- type attribute errors ---
    #[error("Bad argument to {type_name} type: {reason}")]
    #[diagnostic(code(resolve::invalid_attribute))]
    InvalidAttribute {
        #[source_code]
        src: NamedSource<String>,
        #[label("in this type reference")]
        span: SourceSpan,
        type_name: String,
        reason: String,
    },

    #[error("Pattern {pattern:?} does not compile: {detail}")]
    #[diagnostic(code(resolve::bad_pattern))]
    BadPattern {
        #[source_code]
        src: NamedSource<String>,
        #[label("in this type reference")]
        span: SourceSpan,
        pattern: String,
        detail: String,
    },

    // --- inheritance errors ---
    #[error("Inheritance cycle through '{name}'")]
    #[diagnostic(code(resolve::inheritance_cycle))]
    InheritanceCycle {
        #[source_code]
        src: NamedSource<String>,
        #[label("part of a cycle of 'extends' declarations")]
        span: SourceSpan,
        name: String,
    },

    #[error("Alias cycle through '{name}'")]
    #[diagnostic(code(resolve::alias_cycle))]
    AliasCycle {
        #[source_code]
        src: NamedSource<String>,
        #[label("aliases may not refer back to themselves")]
        span: SourceSpan,
        name: String,
    },

    #[error("'{name}' already has a catch-all in its chain")]
    #[diagnostic(code(resolve::catch_all_conflict))]
    CatchAllConflict {
        #[source_code]
        src: NamedSource<String>,
        #[label("second catch-all")]
        span: SourceSpan,
        name: String,
    },

    #[error("Enumerated subtype '{subtype}' must be a struct")]
    #[diagnostic(code(resolve::subtype_not_struct))]
    SubtypeNotStruct {
        #[source_code]
        src: NamedSource<String>,
        #[label("not a struct")]
        span: SourceSpan,
        subtype: String,
    },

    #[error("'{subtype}' is not a subtype of '{name}'")]
    #[diagnostic(code(resolve::subtype_not_child))]
    SubtypeNotChild {
        #[source_code]
        src: NamedSource<String>,
        #[label("does not extend the enumerating struct")]
        span: SourceSpan,
        subtype: String,
        name: String,
    },

    #[error("Subtype '{subtype}' can only be listed once")]
    #[diagnostic(code(resolve::duplicate_subtype))]
    DuplicateSubtype {
        #[source_code]
        src: NamedSource<String>,
        #[label("second listing")]
        span: SourceSpan,
        subtype: String,
    },

    #[error("Subtype tag '{tag}' collides with field name '{tag}'")]
    #[diagnostic(code(resolve::tag_collides_with_field))]
    TagCollidesWithField {
        #[source_code]
        src: NamedSource<String>,
        #[label("already the name of a field of this struct")]
        span: SourceSpan,
        tag: String,
    },

    #[error("'{name}' cannot enumerate subtypes if its parent '{parent}' does not")]
    #[diagnostic(code(resolve::enumeration_starts_mid_chain))]
    EnumerationStartsMidChain {
        #[source_code]
        src: NamedSource<String>,
        #[label("parent has subtypes but no enumeration")]
        span: SourceSpan,
        name: String,
        parent: String,
    },

    #[error("'{name}' does not enumerate all of its subtypes; missing '{missing}'")]
    #[diagnostic(code(resolve::enumeration_incomplete))]
    EnumerationIncomplete {
        #[source_code]
        src: NamedSource<String>,
        #[label("enumeration declared here")]
        span: SourceSpan,
        name: String,
        missing: String,
    },

    #[error("Subtype '{name}' cannot be extended unless it enumerates its own subtypes")]
    #[diagnostic(code(resolve::unenumerated_interior_subtype))]
    UnenumeratedInteriorSubtype {
        #[source_code]
        src: NamedSource<String>,
        #[label("has subtypes of its own but no enumeration")]
        span: SourceSpan,
        name: String,
    },

    // --- default / nullability errors ---
    #[error("Field '{field}' cannot be nullable and carry a default")]
    #[diagnostic(
        code(resolve::default_on_nullable),
        help("A nullable field already defaults to null.")
    )]
    DefaultOnNullable {
        #[source_code]
        src: NamedSource<String>,
        #[label("explicit default on a nullable field")]
        span: SourceSpan,
        field: String,
    },

    #[error("Field '{field}' has an invalid default: {reason}")]
    #[diagnostic(code(resolve::default_not_assignable))]
    DefaultNotAssignable {
        #[source_code]
        src: NamedSource<String>,
        #[label("default is not a value of the field's type")]
        span: SourceSpan,
        field: String,
        reason: String,
    },

    #[error("Default of union-typed field '{field}' must name a Void tag of the union")]
    #[diagnostic(code(resolve::default_not_void_tag))]
    DefaultNotVoidTag {
        #[source_code]
        src: NamedSource<String>,
        #[label("not a Void tag of the field's union")]
        span: SourceSpan,
        field: String,
    },

    // --- example errors ---
    #[error("Example label '{label}' is already used on '{type_name}'")]
    #[diagnostic(code(resolve::duplicate_example_label))]
    DuplicateExampleLabel {
        #[source_code]
        src: NamedSource<String>,
        #[label("second example with this label")]
        span: SourceSpan,
        label: String,
        type_name: String,
    },

    #[error("Example '{label}' of '{type_name}' is missing required field '{field}'")]
    #[diagnostic(code(resolve::example_missing_field))]
    ExampleMissingField {
        #[source_code]
        src: NamedSource<String>,
        #[label("example declared here")]
        span: SourceSpan,
        label: String,
        type_name: String,
        field: String,
    },

    #[error("Example of '{type_name}' binds '{field}', which is not a field")]
    #[diagnostic(code(resolve::example_unknown_field))]
    ExampleUnknownField {
        #[source_code]
        src: NamedSource<String>,
        #[label("no such field")]
        span: SourceSpan,
        field: String,
        type_name: String,
    },

    #[error("Bad example value for '{field}': {reason}")]
    #[diagnostic(code(resolve::example_value_mismatch))]
    ExampleValueMismatch {
        #[source_code]
        src: NamedSource<String>,
        #[label("does not fit the field's type")]
        span: SourceSpan,
        field: String,
        reason: String,
    },

    #[error("Example of a union must bind exactly one tag; '{label}' binds {count}")]
    #[diagnostic(code(resolve::example_tag_count))]
    ExampleTagCount {
        #[source_code]
        src: NamedSource<String>,
        #[label("example declared here")]
        span: SourceSpan,
        label: String,
        count: usize,
    },

    #[error("Example of '{type_name}' must bind exactly one subtype tag")]
    #[diagnostic(
        code(resolve::example_subtype_tag),
        help("A struct with enumerated subtypes is exemplified by one tag bound to a subtype example label.")
    )]
    ExampleSubtypeTag {
        #[source_code]
        src: NamedSource<String>,
        #[label("example declared here")]
        span: SourceSpan,
        type_name: String,
    },

    #[error("'{type_name}' has no example labeled '{label}'")]
    #[diagnostic(code(resolve::dangling_example_reference))]
    DanglingExampleReference {
        #[source_code]
        src: NamedSource<String>,
        #[label("referenced here")]
        span: SourceSpan,
        label: String,
        type_name: String,
    },

    #[error("Example references form a cycle through '{label}' of '{type_name}'")]
    #[diagnostic(code(resolve::example_cycle))]
    ExampleCycle {
        #[source_code]
        src: NamedSource<String>,
        #[label("part of a reference cycle")]
        span: SourceSpan,
        label: String,
        type_name: String,
    },

    // --- routes ---
    #[error("Route attribute '{name}' is set twice")]
    #[diagnostic(code(resolve::duplicate_route_attribute))]
    DuplicateRouteAttribute {
        #[source_code]
        src: NamedSource<String>,
        #[label("second assignment")]
        span: SourceSpan,
        name: String,
    },

    // --- value containment ---
    #[error("Struct '{name}' contains itself by value: {cycle}")]
    #[diagnostic(
        code(resolve::containment_cycle),
        help("Break the cycle with a nullable field or a union.")
    )]
    ContainmentCycle {
        #[source_code]
        src: NamedSource<String>,
        #[label("required fields loop back to this struct")]
        span: SourceSpan,
        name: String,
        cycle: String,
    },

    // --- warnings ---
    #[error("Namespace '{name}' is imported but never referenced")]
    #[diagnostic(code(resolve::unused_import), severity(warning))]
    UnusedImport {
        #[source_code]
        src: NamedSource<String>,
        #[label("unused import")]
        span: SourceSpan,
        name: String,
    },
}
