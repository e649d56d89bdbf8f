//! The compiler entry point.
//!
//! [`compile`] drives the whole pipeline: every source file is lexed and
//! parsed (collecting, not short-circuiting, per-file failures), then the
//! resolver runs its phases over the parsed set. On success the caller gets
//! a [`Compilation`] holding the frozen [`Api`]; on failure a
//! [`CompileFailure`] carrying every collected diagnostic, and no IR.

use crate::error::{DiagnosticRecord, StoneError};
use crate::ir::{Api, TypeDef};
use crate::parser::Parser;
use crate::resolver::{self, ParsedFile};
use crate::serialization::Value;
use log::debug;
use miette::Diagnostic;
use thiserror::Error;

/// One input to the compiler: a path (used only for diagnostics) and the
/// file's text.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub path: String,
    pub text: String,
}

impl SourceSpec {
    #[must_use]
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> SourceSpec {
        SourceSpec {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// The result of a successful compilation: the frozen IR, plus any
/// warnings that were collected along the way.
#[derive(Debug)]
pub struct Compilation {
    pub api: Api,
    pub warnings: Vec<StoneError>,
}

impl Compilation {
    /// The materialized literal tree of the example `label` on the type
    /// `name` in `namespace`.
    #[must_use]
    pub fn example(&self, namespace: &str, name: &str, label: &str) -> Option<&Value> {
        let examples = match self.api.find(namespace, name)? {
            TypeDef::Struct(s) => &s.examples,
            TypeDef::Union(u) => &u.examples,
            TypeDef::Alias(_) => return None,
        };
        examples.get(label).map(|example| &example.value)
    }

    /// Serializes an example to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn example_to_json(
        &self,
        namespace: &str,
        name: &str,
        label: &str,
    ) -> Option<Result<String, serde_json::Error>> {
        self.example(namespace, name, label)
            .map(serde_json::to_string_pretty)
    }

    /// Serializes an example to YAML.
    ///
    /// # Errors
    ///
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn example_to_yaml(
        &self,
        namespace: &str,
        name: &str,
        label: &str,
    ) -> Option<Result<String, serde_yaml::Error>> {
        self.example(namespace, name, label)
            .map(serde_yaml::to_string)
    }

    /// The diagnostic records of the warnings, in input order.
    #[must_use]
    pub fn warning_records(&self) -> Vec<DiagnosticRecord> {
        self.warnings.iter().map(StoneError::record).collect()
    }
}

/// A failed compilation: every diagnostic collected up to and including
/// the phase that failed.
#[derive(Error, Debug, Diagnostic)]
#[error("compilation failed with {} diagnostic(s)", .diagnostics.len())]
pub struct CompileFailure {
    #[related]
    pub diagnostics: Vec<StoneError>,
    file_order: Vec<String>,
}

impl CompileFailure {
    fn new(diagnostics: Vec<StoneError>, file_order: Vec<String>) -> CompileFailure {
        CompileFailure {
            diagnostics,
            file_order,
        }
    }

    /// Flattens the diagnostics into `(severity, file, line, column,
    /// message)` records, ordered by input-file order and by source
    /// position within a file.
    #[must_use]
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        let mut records: Vec<DiagnosticRecord> =
            self.diagnostics.iter().map(StoneError::record).collect();
        let file_rank = |file: &str| {
            self.file_order
                .iter()
                .position(|name| name == file)
                .unwrap_or(usize::MAX)
        };
        records.sort_by(|a, b| {
            file_rank(&a.file)
                .cmp(&file_rank(&b.file))
                .then(a.line.cmp(&b.line))
                .then(a.column.cmp(&b.column))
        });
        records
    }
}

/// Compiles a set of spec files into a frozen [`Api`].
///
/// Files contributing to the same namespace may be supplied in any order;
/// lex and parse errors in one file do not stop the others from being
/// checked.
///
/// # Errors
///
/// Returns a [`CompileFailure`] carrying every collected diagnostic if any
/// file fails to lex or parse, or if any resolver phase records an error.
pub fn compile(sources: &[SourceSpec]) -> Result<Compilation, CompileFailure> {
    let file_order: Vec<String> = sources.iter().map(|s| s.path.clone()).collect();
    let mut errors = Vec::new();
    let mut parsed = Vec::new();
    for source in sources {
        let mut parser = match Parser::new_with_name(&source.text, source.path.clone()) {
            Ok(parser) => parser,
            Err(error) => {
                errors.push(error);
                continue;
            }
        };
        match parser.parse_spec() {
            Ok(spec) => parsed.push(ParsedFile {
                name: source.path.clone(),
                text: source.text.clone(),
                spec,
            }),
            Err(error) => errors.push(error),
        }
    }
    if !errors.is_empty() {
        debug!("aborting before resolution: {} parse failure(s)", errors.len());
        return Err(CompileFailure::new(errors, file_order));
    }

    match resolver::resolve(parsed) {
        Ok(outcome) => Ok(Compilation {
            api: outcome.api,
            warnings: outcome.warnings,
        }),
        Err(diagnostics) => Err(CompileFailure::new(diagnostics, file_order)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_minimal_spec() {
        let sources = [SourceSpec::new(
            "x.stone",
            "namespace x\nstruct P\n    a Int64\n    b String\n",
        )];
        let compilation = compile(&sources).unwrap();
        let ns = compilation.api.namespace("x").unwrap();
        assert_eq!(ns.definitions.len(), 1);
        assert!(compilation.warnings.is_empty());
    }

    #[test]
    fn test_compile_reports_parse_errors_from_every_file() {
        let sources = [
            SourceSpec::new("a.stone", "namespace a\nstruct\n"),
            SourceSpec::new("b.stone", "namespace b\nunion\n"),
        ];
        let failure = compile(&sources).unwrap_err();
        assert_eq!(failure.diagnostics.len(), 2);
        let records = failure.records();
        assert_eq!(records[0].file, "a.stone");
        assert_eq!(records[1].file, "b.stone");
    }

    #[test]
    fn test_example_serialization() {
        let sources = [SourceSpec::new(
            "x.stone",
            "namespace x\nstruct P\n    a Int64\n    example default\n        a = 42\n",
        )];
        let compilation = compile(&sources).unwrap();
        let json = compilation
            .example_to_json("x", "P", "default")
            .unwrap()
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serde_json::json!({ "a": 42 }));

        let yaml = compilation
            .example_to_yaml("x", "P", "default")
            .unwrap()
            .unwrap();
        assert_eq!(yaml, "a: 42\n");
    }

    #[test]
    fn test_record_carries_location() {
        let sources = [SourceSpec::new(
            "bad.stone",
            "namespace x\nstruct P\n    a Whatever\n",
        )];
        let failure = compile(&sources).unwrap_err();
        let records = failure.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file, "bad.stone");
        assert_eq!(records[0].line, 3);
        assert!(records[0].message.contains("Whatever"));
    }
}
