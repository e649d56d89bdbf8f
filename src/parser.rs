//! A recursive descent parser for Stone spec files.
//!
//! The grammar is LL(1) over the token stream produced by the
//! [`Lexer`](crate::lexer::Lexer); INDENT/DEDENT/NEWLINE tokens stand in for
//! the block structure. Each `parse_*` method corresponds to one grammar
//! rule; the rule is quoted above the method.

use crate::ast::*;
use crate::error::{ParseError, StoneError};
use crate::lexer::{Lexer, Token, TokenKind};
use miette::NamedSource;
use std::sync::Arc;

#[derive(Debug)]
pub struct Parser<'a> {
    source: Arc<NamedSource<String>>,
    tokens: Vec<Token>,
    position: usize,
    source_text: &'a str,
}

impl<'a> Parser<'a> {
    /// Lexes `source_text` and prepares a parser over the token stream.
    ///
    /// # Errors
    ///
    /// Returns the lexer's error if tokenization fails.
    pub fn new(source_text: &'a str) -> Result<Self, StoneError> {
        Self::new_with_name(source_text, "spec.stone".to_string())
    }

    pub fn new_with_name(source_text: &'a str, name: String) -> Result<Self, StoneError> {
        let source = Arc::new(NamedSource::new(&name, source_text.to_string()));
        let tokens = Lexer::new_with_name(source_text, &name).lex()?;
        Ok(Self {
            source,
            tokens,
            position: 0,
            source_text,
        })
    }

    // === Main parsing methods ===

    /// File := NAMESPACE Doc? Import* Def*
    pub fn parse_spec(&mut self) -> Result<SpecFile, StoneError> {
        let namespace = self.parse_namespace_decl()?;

        let mut imports = Vec::new();
        while self.check(TokenKind::Import) {
            imports.push(self.parse_import()?);
        }

        let mut defs = Vec::new();
        while !self.check(TokenKind::Eof) {
            defs.push(self.parse_def()?);
        }
        self.expect(TokenKind::Eof)?;

        Ok(SpecFile {
            namespace,
            imports,
            defs,
        })
    }

    /// Namespace := 'namespace' IDENT NEWLINE Doc?
    fn parse_namespace_decl(&mut self) -> Result<NamespaceDecl, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Namespace)?;
        let name = self.parse_ident()?;
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;
        let doc = self.parse_optional_doc()?;
        Ok(NamespaceDecl {
            name,
            doc,
            pos_start: start,
            pos_end: end,
        })
    }

    /// Import := 'import' IDENT NEWLINE
    fn parse_import(&mut self) -> Result<Import, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Import)?;
        let target = self.parse_ident()?;
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;
        Ok(Import {
            target,
            pos_start: start,
            pos_end: end,
        })
    }

    /// Def := Alias | Struct | Union | Route
    fn parse_def(&mut self) -> Result<Def, StoneError> {
        match self.current_token()?.kind {
            TokenKind::Alias => self.parse_alias().map(Def::Alias),
            TokenKind::Struct => self.parse_struct().map(Def::Struct),
            TokenKind::Union => self.parse_union().map(Def::Union),
            TokenKind::Route => self.parse_route().map(Def::Route),
            _ => self.err_unexpected("'alias', 'struct', 'union', or 'route'"),
        }
    }

    /// Alias := 'alias' IDENT '=' TypeRef NEWLINE
    fn parse_alias(&mut self) -> Result<AliasDef, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Alias)?;
        let name = self.parse_ident()?;
        self.expect(TokenKind::Eq)?;
        let target = self.parse_type_ref()?;
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;
        Ok(AliasDef {
            name,
            target,
            pos_start: start,
            pos_end: end,
        })
    }

    /// Struct := 'struct' IDENT ('extends' QualIdent)? ':'? NEWLINE
    ///           (INDENT Doc? SubtypesBlock? Field* Example* DEDENT)?
    fn parse_struct(&mut self) -> Result<StructDef, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Struct)?;
        let name = self.parse_ident()?;
        let extends = if self.match_token(TokenKind::Extends) {
            Some(self.parse_qual_ident()?)
        } else {
            None
        };
        let end = self.prev_end();
        self.match_token(TokenKind::Colon);
        self.expect(TokenKind::Newline)?;

        let mut doc = None;
        let mut subtypes = None;
        let mut fields = Vec::new();
        let mut examples = Vec::new();
        if self.match_token(TokenKind::Indent) {
            doc = self.parse_optional_doc()?;
            if self.check(TokenKind::Union) {
                subtypes = Some(self.parse_subtypes_block()?);
            }
            while self.check_ident() {
                fields.push(self.parse_field()?);
            }
            while self.check(TokenKind::Example) {
                examples.push(self.parse_example()?);
            }
            self.expect(TokenKind::Dedent)?;
        }

        Ok(StructDef {
            name,
            extends,
            doc,
            subtypes,
            fields,
            examples,
            pos_start: start,
            pos_end: end,
        })
    }

    /// SubtypesBlock := 'union' '*'? NEWLINE INDENT (IDENT TypeRef NEWLINE)+ DEDENT
    fn parse_subtypes_block(&mut self) -> Result<SubtypesBlock, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Union)?;
        let catch_all = self.match_token(TokenKind::Star);
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut entries = Vec::new();
        loop {
            let entry_start = self.current_token()?.pos_start;
            let tag = self.parse_ident()?;
            let type_ref = self.parse_type_ref()?;
            let entry_end = self.prev_end();
            self.expect(TokenKind::Newline)?;
            entries.push(SubtypeEntry {
                tag,
                type_ref,
                pos_start: entry_start,
                pos_end: entry_end,
            });
            if !self.check_ident() {
                break;
            }
        }
        self.expect(TokenKind::Dedent)?;
        Ok(SubtypesBlock {
            catch_all,
            entries,
            pos_start: start,
            pos_end: end,
        })
    }

    /// Field := IDENT TypeRef ('=' (Literal | IDENT))? NEWLINE (INDENT Doc DEDENT)?
    fn parse_field(&mut self) -> Result<FieldNode, StoneError> {
        let start = self.current_token()?.pos_start;
        let name = self.parse_ident()?;
        let type_ref = self.parse_type_ref()?;
        let default = if self.match_token(TokenKind::Eq) {
            if self.check_ident() {
                Some(DefaultNode::TagRef(self.parse_ident()?))
            } else {
                Some(DefaultNode::Literal(self.parse_literal()?))
            }
        } else {
            None
        };
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;
        let doc = self.parse_doc_block()?;
        Ok(FieldNode {
            name,
            type_ref,
            default,
            doc,
            pos_start: start,
            pos_end: end,
        })
    }

    /// Union := 'union' IDENT ('extends' QualIdent)? NEWLINE
    ///          (INDENT Doc? Tag* Example* DEDENT)?
    fn parse_union(&mut self) -> Result<UnionDef, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Union)?;
        let name = self.parse_ident()?;
        let extends = if self.match_token(TokenKind::Extends) {
            Some(self.parse_qual_ident()?)
        } else {
            None
        };
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;

        let mut doc = None;
        let mut tags = Vec::new();
        let mut examples = Vec::new();
        if self.match_token(TokenKind::Indent) {
            doc = self.parse_optional_doc()?;
            while self.check_ident() {
                tags.push(self.parse_tag()?);
            }
            while self.check(TokenKind::Example) {
                examples.push(self.parse_example()?);
            }
            self.expect(TokenKind::Dedent)?;
        }

        Ok(UnionDef {
            name,
            extends,
            doc,
            tags,
            examples,
            pos_start: start,
            pos_end: end,
        })
    }

    /// Tag := IDENT TypeRef? '*'? NEWLINE (INDENT Doc DEDENT)?
    fn parse_tag(&mut self) -> Result<TagNode, StoneError> {
        let start = self.current_token()?.pos_start;
        let name = self.parse_ident()?;
        let type_ref = if self.check_ident() {
            Some(self.parse_type_ref()?)
        } else {
            None
        };
        let star_span = self.current_token().map(|t| (t.pos_start, t.pos_end)).ok();
        let catch_all = self.match_token(TokenKind::Star);
        if catch_all && type_ref.is_some() {
            let (s, e) = star_span.unwrap_or((start, start));
            return Err(ParseError::CatchAllOnTypedTag {
                src: (*self.source).clone(),
                span: (start, e.max(s) - start).into(),
            }
            .into());
        }
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;
        let doc = self.parse_doc_block()?;
        Ok(TagNode {
            name,
            type_ref,
            catch_all,
            doc,
            pos_start: start,
            pos_end: end,
        })
    }

    /// Route := 'route' IDENT '(' TypeRef ',' TypeRef ',' TypeRef ')' NEWLINE
    ///          (INDENT Doc? AttrsBlock? DEDENT)?
    fn parse_route(&mut self) -> Result<RouteDef, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Route)?;
        let name = self.parse_ident()?;
        self.expect(TokenKind::LParen)?;
        let request = self.parse_type_ref()?;
        self.expect(TokenKind::Comma)?;
        let response = self.parse_type_ref()?;
        self.expect(TokenKind::Comma)?;
        let error = self.parse_type_ref()?;
        self.expect(TokenKind::RParen)?;
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;

        let mut doc = None;
        let mut attrs = Vec::new();
        if self.match_token(TokenKind::Indent) {
            doc = self.parse_optional_doc()?;
            if self.check(TokenKind::Attrs) {
                attrs = self.parse_attrs_block()?;
            }
            self.expect(TokenKind::Dedent)?;
        }

        Ok(RouteDef {
            name,
            request,
            response,
            error,
            doc,
            attrs,
            pos_start: start,
            pos_end: end,
        })
    }

    /// AttrsBlock := 'attrs' NEWLINE INDENT (IDENT '=' Literal NEWLINE)+ DEDENT
    fn parse_attrs_block(&mut self) -> Result<Vec<AttrNode>, StoneError> {
        self.expect(TokenKind::Attrs)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut attrs = Vec::new();
        loop {
            let start = self.current_token()?.pos_start;
            let name = self.parse_ident()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_literal()?;
            let end = self.prev_end();
            self.expect(TokenKind::Newline)?;
            attrs.push(AttrNode {
                name,
                value,
                pos_start: start,
                pos_end: end,
            });
            if !self.check_ident() {
                break;
            }
        }
        self.expect(TokenKind::Dedent)?;
        Ok(attrs)
    }

    /// Example := 'example' IDENT STRING? NEWLINE
    ///            (INDENT (IDENT '=' ExampleValue NEWLINE)+ DEDENT)?
    fn parse_example(&mut self) -> Result<ExampleDef, StoneError> {
        let start = self.current_token()?.pos_start;
        self.expect(TokenKind::Example)?;
        let label = self.parse_ident()?;
        let text = if let TokenKind::Str(s) = &self.current_token()?.kind {
            let s = s.clone();
            self.advance();
            Some(s)
        } else {
            None
        };
        let end = self.prev_end();
        self.expect(TokenKind::Newline)?;

        let mut bindings = Vec::new();
        if self.match_token(TokenKind::Indent) {
            loop {
                let b_start = self.current_token()?.pos_start;
                let name = self.parse_ident()?;
                self.expect(TokenKind::Eq)?;
                let value = if self.check_ident() {
                    ExampleValue::Reference(self.parse_ident()?)
                } else {
                    ExampleValue::Literal(self.parse_literal()?)
                };
                let b_end = self.prev_end();
                self.expect(TokenKind::Newline)?;
                bindings.push(ExampleBinding {
                    name,
                    value,
                    pos_start: b_start,
                    pos_end: b_end,
                });
                if !self.check_ident() {
                    break;
                }
            }
            self.expect(TokenKind::Dedent)?;
        }

        Ok(ExampleDef {
            label,
            text,
            bindings,
            pos_start: start,
            pos_end: end,
        })
    }

    // === Sub-rules ===

    /// TypeRef := IDENT ('.' IDENT)? Args? '?'?
    fn parse_type_ref(&mut self) -> Result<TypeRefNode, StoneError> {
        let start = self.current_token()?.pos_start;
        let first = self.parse_ident()?;
        let (ns, name) = if self.match_token(TokenKind::Dot) {
            (Some(first), self.parse_ident()?)
        } else {
            (None, first)
        };
        let args = if self.check(TokenKind::LParen) {
            self.parse_args()?
        } else {
            Args::default()
        };
        let nullable = self.match_token(TokenKind::Question);
        Ok(TypeRefNode {
            ns,
            name,
            args,
            nullable,
            pos_start: start,
            pos_end: self.prev_end(),
        })
    }

    /// Args := '(' (Arg (',' Arg)*)? ')'
    /// Arg  := Literal | TypeRef | IDENT '=' Literal
    ///
    /// Positional arguments must precede keyword arguments, as in the
    /// reference grammar.
    fn parse_args(&mut self) -> Result<Args, StoneError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Args::default();
        if self.match_token(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            if self.check_ident() && self.peek_is(TokenKind::Eq) {
                let kw_start = self.current_token()?.pos_start;
                let name = self.parse_ident()?;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_literal()?;
                if args.keyword.iter().any(|(k, _)| *k == name) {
                    return Err(ParseError::DuplicateKeywordArgument {
                        src: (*self.source).clone(),
                        span: (kw_start, self.prev_end() - kw_start).into(),
                        name,
                    }
                    .into());
                }
                args.keyword.push((name, value));
            } else if !args.keyword.is_empty() {
                return self.err_unexpected("a keyword argument");
            } else if self.check_ident() {
                args.positional.push(TypeArg::Type(self.parse_type_ref()?));
            } else {
                args.positional.push(TypeArg::Literal(self.parse_literal()?));
            }
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    /// QualIdent := IDENT ('.' IDENT)?
    fn parse_qual_ident(&mut self) -> Result<QualIdent, StoneError> {
        let start = self.current_token()?.pos_start;
        let first = self.parse_ident()?;
        let (ns, name) = if self.match_token(TokenKind::Dot) {
            (Some(first), self.parse_ident()?)
        } else {
            (None, first)
        };
        Ok(QualIdent {
            ns,
            name,
            pos_start: start,
            pos_end: self.prev_end(),
        })
    }

    /// Literal := INT | FLOAT | STRING | 'true' | 'false' | 'null'
    fn parse_literal(&mut self) -> Result<Literal, StoneError> {
        let token = self.current_token()?;
        let literal = match &token.kind {
            TokenKind::Int(n) => Literal::Int(*n),
            TokenKind::Float(n) => Literal::Float(*n),
            TokenKind::Str(s) => Literal::Str(s.clone()),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            TokenKind::Null => Literal::Null,
            _ => return self.err_unexpected("a literal"),
        };
        self.advance();
        Ok(literal)
    }

    /// Doc := STRING NEWLINE, directly at the current block level.
    fn parse_optional_doc(&mut self) -> Result<Option<String>, StoneError> {
        if let Ok(token) = self.current_token() {
            if let TokenKind::Str(s) = &token.kind {
                let s = s.clone();
                self.advance();
                self.expect(TokenKind::Newline)?;
                return Ok(Some(s));
            }
        }
        Ok(None)
    }

    /// (INDENT Doc DEDENT)?, the indented docstring of a field or tag.
    fn parse_doc_block(&mut self) -> Result<Option<String>, StoneError> {
        if !self.match_token(TokenKind::Indent) {
            return Ok(None);
        }
        let token = self.current_token()?;
        let doc = match &token.kind {
            TokenKind::Str(s) => s.clone(),
            _ => return self.err_unexpected("a docstring"),
        };
        self.advance();
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Dedent)?;
        Ok(Some(doc))
    }

    // === Token helpers ===

    fn current_token(&self) -> Result<&Token, StoneError> {
        self.tokens.get(self.position).ok_or_else(|| {
            let pos = self.source_text.len().saturating_sub(1);
            ParseError::UnexpectedEof {
                src: (*self.source).clone(),
                span: (pos, 0).into(),
            }
            .into()
        })
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn prev_end(&self) -> usize {
        if self.position == 0 {
            0
        } else {
            self.tokens[self.position - 1].pos_end
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), StoneError> {
        let token = self.current_token()?;
        if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) {
            self.advance();
            Ok(())
        } else {
            self.err_unexpected(&format!("{expected:?}"))
        }
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        if let Ok(token) = self.current_token() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(&kind)
        } else {
            false
        }
    }

    fn check_ident(&self) -> bool {
        matches!(
            self.current_token().map(|t| &t.kind),
            Ok(TokenKind::Ident(_))
        )
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        if let Some(token) = self.tokens.get(self.position + 1) {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(&kind)
        } else {
            false
        }
    }

    fn parse_ident(&mut self) -> Result<String, StoneError> {
        let token = self.current_token()?;
        if let TokenKind::Ident(s) = &token.kind {
            let s = s.clone();
            self.advance();
            Ok(s)
        } else {
            self.err_unexpected("an identifier")
        }
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, StoneError> {
        let token = self.current_token()?;
        Err(ParseError::UnexpectedToken {
            src: (*self.source).clone(),
            span: (
                token.pos_start,
                token.pos_end.saturating_sub(token.pos_start),
            )
                .into(),
            expected: expected.to_string(),
        }
        .into())
    }
}
