//! Declaration parsing implementation
//!
//! This module handles declarations at file and block scope:
//!
//! - Declaration specifiers: storage class, qualifiers, basic type keywords,
//!   struct/union specifiers and typedef names
//! - Declarators, including pointers to functions and arrays of pointers
//! - Struct and union bodies (named and anonymous)
//! - Function definitions and prototypes
//! - Initializers, with unsized arrays completed from their initializer
//!
//! # Grammar
//!
//! ```text
//! declaration  ::= specifiers (init_declarator ("," init_declarator)*)? ";"
//! function_def ::= specifiers declarator compound_statement
//! declarator   ::= "*"* direct_declarator
//! direct_declarator ::= (identifier | "(" declarator ")")? ("[" const? "]" | "(" params ")")*
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{DiagnosticKind, ParseError, Parser};
use crate::sema::fold;
use crate::sema::types::{
    anonymous_aggregate_key, named_aggregate_key, CType, FunctionType, IntKind, StructDef,
};

/// Parsed declaration specifiers
#[derive(Debug, Clone)]
pub(crate) struct Specifiers {
    pub storage: Storage,
    pub ty: CType,
    pub span: Span,
    pub defines_aggregate: Option<String>,
}

/// One step of a declarator, applied to the base type in order
#[derive(Debug, Clone)]
pub(crate) enum DeclPart {
    Pointer,
    Array(Option<usize>),
    Function(Vec<Param>, bool),
}

/// A parsed (possibly abstract) declarator
#[derive(Debug, Clone)]
pub(crate) struct Declarator {
    pub name: Option<(String, Span)>,
    pub parts: Vec<DeclPart>,
    pub span: Span,
}

impl Declarator {
    fn function_params(&self) -> Option<&[Param]> {
        match self.parts.last() {
            Some(DeclPart::Function(params, _)) => Some(params),
            _ => None,
        }
    }
}

#[derive(Default)]
struct KeywordCounts {
    void: u8,
    char: u8,
    short: u8,
    int: u8,
    long: u8,
    float: u8,
    double: u8,
    signed: u8,
    unsigned: u8,
}

impl KeywordCounts {
    fn any(&self) -> bool {
        self.void + self.char + self.short + self.int + self.long + self.float + self.double + self.signed + self.unsigned
            > 0
    }

    fn resolve(&self) -> Option<CType> {
        if self.signed > 0 && self.unsigned > 0 {
            return None;
        }
        let unsigned = self.unsigned > 0;
        let others = |allowed: u8| {
            self.void + self.char + self.short + self.int + self.long + self.float + self.double == allowed
        };

        let ty = if self.void == 1 && others(1) && self.signed + self.unsigned == 0 {
            CType::Void
        } else if self.float == 1 && others(1) && self.signed + self.unsigned == 0 {
            CType::Float
        } else if self.double == 1 && self.long <= 1 && others(1 + self.long) && self.signed + self.unsigned == 0 {
            CType::Double
        } else if self.char == 1 && others(1) {
            CType::Int(match (self.signed > 0, unsigned) {
                (_, true) => IntKind::UChar,
                (true, false) => IntKind::SChar,
                (false, false) => IntKind::Char,
            })
        } else if self.short == 1 && others(1 + self.int) && self.int <= 1 {
            CType::Int(if unsigned { IntKind::UShort } else { IntKind::Short })
        } else if self.long == 1 && others(1 + self.int) && self.int <= 1 {
            CType::Int(if unsigned { IntKind::ULong } else { IntKind::Long })
        } else if self.long == 2 && others(2 + self.int) && self.int <= 1 {
            CType::Int(if unsigned { IntKind::ULongLong } else { IntKind::LongLong })
        } else if self.int <= 1 && others(self.int) {
            CType::Int(if unsigned { IntKind::UInt } else { IntKind::Int })
        } else {
            return None;
        };
        Some(ty)
    }
}

impl Parser {
    /// Whether the next token starts declaration specifiers
    pub(crate) fn is_declaration_start(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Void
            | TokenKind::Char
            | TokenKind::Short
            | TokenKind::Int
            | TokenKind::Long
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Signed
            | TokenKind::Unsigned
            | TokenKind::Struct
            | TokenKind::Union
            | TokenKind::Typedef
            | TokenKind::Const
            | TokenKind::Volatile
            | TokenKind::Static
            | TokenKind::Extern => true,
            TokenKind::Ident(name) => self.lookup_typedef(name).is_some(),
            _ => false,
        }
    }

    /// Parse one file-scope item
    pub(crate) fn parse_external_declaration(&mut self) -> Result<ExternalDecl, ParseError> {
        let start = self.current_offset();
        if !self.is_declaration_start() {
            return Err(ParseError::new(
                DiagnosticKind::ExpressionAtFileScope,
                format!("Expected a declaration at file scope, found {}", self.peek_kind()),
                start,
            ));
        }

        let specs = self.parse_declaration_specifiers()?;
        if self.check(&TokenKind::Semicolon) {
            return self
                .finish_declaration(specs, Vec::new(), start)
                .map(ExternalDecl::Declaration);
        }

        let first = self.parse_declarator()?;
        if first.function_params().is_some() && self.check(&TokenKind::LBrace) {
            return self
                .parse_function_definition(specs, first, start)
                .map(ExternalDecl::Function);
        }

        self.parse_init_declarators(specs, first, start)
            .map(ExternalDecl::Declaration)
    }

    /// Parse a block-scope declaration, including the terminating `;`
    pub(crate) fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let start = self.current_offset();
        let specs = self.parse_declaration_specifiers()?;
        if self.check(&TokenKind::Semicolon) {
            return self.finish_declaration(specs, Vec::new(), start);
        }
        let first = self.parse_declarator()?;
        if first.function_params().is_some() && self.check(&TokenKind::LBrace) {
            return Err(ParseError::syntax(
                "Function definition is not allowed here",
                self.current_offset(),
            ));
        }
        self.parse_init_declarators(specs, first, start)
    }

    pub(crate) fn parse_declaration_specifiers(&mut self) -> Result<Specifiers, ParseError> {
        let start = self.current_offset();
        let mut storage = Storage::None;
        let mut counts = KeywordCounts::default();
        let mut named: Option<CType> = None;
        let mut defines_aggregate = None;

        loop {
            let storage_class = match self.peek_kind() {
                TokenKind::Typedef => Some(Storage::Typedef),
                TokenKind::Extern => Some(Storage::Extern),
                TokenKind::Static => Some(Storage::Static),
                _ => None,
            };
            if let Some(class) = storage_class {
                if storage != Storage::None {
                    return Err(ParseError::syntax(
                        "Multiple storage classes in declaration specifiers",
                        self.current_offset(),
                    ));
                }
                storage = class;
                self.advance();
                continue;
            }

            match self.peek_kind().clone() {
                TokenKind::Const | TokenKind::Volatile => {}
                TokenKind::Void => counts.void += 1,
                TokenKind::Char => counts.char += 1,
                TokenKind::Short => counts.short += 1,
                TokenKind::Int => counts.int += 1,
                TokenKind::Long => counts.long += 1,
                TokenKind::Float => counts.float += 1,
                TokenKind::Double => counts.double += 1,
                TokenKind::Signed => counts.signed += 1,
                TokenKind::Unsigned => counts.unsigned += 1,
                TokenKind::Struct | TokenKind::Union if named.is_none() && !counts.any() => {
                    self.advance();
                    let (ty, defined) = self.parse_aggregate_specifier()?;
                    named = Some(ty);
                    defines_aggregate = defined;
                    continue;
                }
                TokenKind::Ident(name) if named.is_none() && !counts.any() => match self.lookup_typedef(&name) {
                    Some(ty) => named = Some(ty.clone()),
                    None => break,
                },
                _ => break,
            }
            self.advance();
        }

        let ty = match (named, counts.any()) {
            (Some(ty), false) => ty,
            (None, true) => counts.resolve().ok_or_else(|| {
                ParseError::syntax("Invalid combination of type specifiers", start)
            })?,
            (None, false) => {
                return Err(ParseError::syntax(
                    format!("Expected a type, found {}", self.peek_kind()),
                    self.current_offset(),
                ))
            }
            (Some(_), true) => {
                return Err(ParseError::syntax("Invalid combination of type specifiers", start));
            }
        };

        Ok(Specifiers {
            storage,
            ty,
            span: Span::new(start, self.previous_end()),
            defines_aggregate,
        })
    }

    /// Parse after `struct`/`union`. Returns the type and, when a body was
    /// present, the key of the definition it created.
    fn parse_aggregate_specifier(&mut self) -> Result<(CType, Option<String>), ParseError> {
        let keyword_offset = self.previous().span.start;
        let is_union = self.previous().kind == TokenKind::Union;

        let tag = match self.peek_kind() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        if !self.match_token(&TokenKind::LBrace) {
            return match tag {
                Some(tag) => Ok((CType::Struct(named_aggregate_key(is_union, &tag)), None)),
                None => Err(ParseError::syntax(
                    "Expected tag name or '{' after struct/union",
                    self.current_offset(),
                )),
            };
        }

        let mut members: Vec<(String, CType)> = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(ParseError::syntax("Unterminated struct body", keyword_offset));
            }
            let specs = self.parse_declaration_specifiers()?;
            if specs.storage != Storage::None {
                return Err(ParseError::syntax(
                    "Storage class not allowed on struct members",
                    specs.span.start,
                ));
            }
            loop {
                let declarator = self.parse_declarator()?;
                let (name, name_span) = declarator.name.clone().ok_or_else(|| {
                    ParseError::new(
                        DiagnosticKind::Unsupported,
                        "Anonymous struct members are not supported",
                        declarator.span.start,
                    )
                })?;
                if members.iter().any(|(existing, _)| *existing == name) {
                    return Err(ParseError::new(
                        DiagnosticKind::Redefinition,
                        format!("Duplicate member '{}'", name),
                        name_span.start,
                    ));
                }
                let ty = self.apply_parts(specs.ty.clone(), declarator.parts, declarator.span.start)?;
                members.push((name, ty));
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_semicolon("after struct member")?;
        }
        self.expect_rbrace("to close struct body")?;

        let key = match &tag {
            Some(tag) => named_aggregate_key(is_union, tag),
            None => anonymous_aggregate_key(is_union, &members),
        };

        if tag.is_some() && self.types.contains(&key) {
            return Err(ParseError::new(
                DiagnosticKind::Redefinition,
                format!("Redefinition of '{}'", key),
                keyword_offset,
            ));
        }

        let def = StructDef::layout(key.clone(), is_union, members, &self.types)
            .map_err(|message| ParseError::new(DiagnosticKind::IncompleteType, message, keyword_offset))?;
        self.types.insert(def);

        Ok((CType::Struct(key.clone()), Some(key)))
    }

    /// Parse a declarator; the name is optional (abstract declarators)
    pub(crate) fn parse_declarator(&mut self) -> Result<Declarator, ParseError> {
        let start = self.current_offset();

        let mut pointers = 0;
        while self.match_token(&TokenKind::Star) {
            pointers += 1;
            while self.match_token(&TokenKind::Const) || self.match_token(&TokenKind::Volatile) {}
        }

        let grouped = self.check(&TokenKind::LParen)
            && match self.peek_ahead(1).map(|t| &t.kind) {
                Some(TokenKind::Star) => true,
                Some(TokenKind::Ident(name)) => self.lookup_typedef(name).is_none(),
                _ => false,
            };

        let (name, inner_parts) = if grouped {
            self.advance();
            let inner = self.parse_declarator()?;
            self.expect_rparen("to close declarator")?;
            (inner.name, inner.parts)
        } else if let TokenKind::Ident(name) = self.peek_kind() {
            let name = name.clone();
            let span = self.advance().span;
            (Some((name, span)), Vec::new())
        } else {
            (None, Vec::new())
        };

        let mut suffixes = Vec::new();
        loop {
            if self.match_token(&TokenKind::LBracket) {
                suffixes.push(DeclPart::Array(self.parse_array_size()?));
            } else if self.match_token(&TokenKind::LParen) {
                let (params, variadic) = self.parse_parameter_list()?;
                suffixes.push(DeclPart::Function(params, variadic));
            } else {
                break;
            }
        }

        let mut parts = vec![DeclPart::Pointer; pointers];
        parts.extend(suffixes.into_iter().rev());
        parts.extend(inner_parts);

        let end = if self.position == 0 || self.previous_end() < start {
            start
        } else {
            self.previous_end()
        };

        Ok(Declarator {
            name,
            parts,
            span: Span::new(start, end),
        })
    }

    /// After `[`: parse an optional constant size and the closing `]`
    fn parse_array_size(&mut self) -> Result<Option<usize>, ParseError> {
        if self.match_token(&TokenKind::RBracket) {
            return Ok(None);
        }
        let expr = self.parse_assignment_expression()?;
        let size = fold::eval_int_with(&expr, &self.types).ok_or_else(|| {
            ParseError::syntax("Array size is not an integer constant", expr.span.start)
        })?;
        if size < 0 {
            return Err(ParseError::syntax("Array has negative size", expr.span.start));
        }
        self.expect_token(&TokenKind::RBracket, "Expected ']' after array size")?;
        Ok(Some(size as usize))
    }

    /// After `(`: parse parameters and the closing `)`
    fn parse_parameter_list(&mut self) -> Result<(Vec<Param>, bool), ParseError> {
        if self.match_token(&TokenKind::RParen) {
            return Ok((Vec::new(), false));
        }
        if self.check(&TokenKind::Void) && self.check_ahead(1, &TokenKind::RParen) {
            self.advance();
            self.advance();
            return Ok((Vec::new(), false));
        }

        let mut params = Vec::new();
        loop {
            if self.match_token(&TokenKind::Ellipsis) {
                if params.is_empty() {
                    return Err(ParseError::syntax(
                        "ISO C requires a named parameter before '...'",
                        self.previous().span.start,
                    ));
                }
                self.expect_rparen("after '...'")?;
                return Ok((params, true));
            }

            if !self.is_declaration_start() {
                return Err(ParseError::syntax(
                    format!("Expected parameter declaration, found {}", self.peek_kind()),
                    self.current_offset(),
                ));
            }
            let specs = self.parse_declaration_specifiers()?;
            let declarator = self.parse_declarator()?;
            let ty = self.apply_parts(specs.ty, declarator.parts, declarator.span.start)?;
            if ty.is_void() {
                return Err(ParseError::syntax(
                    "'void' must be the only parameter",
                    declarator.span.start,
                ));
            }
            // Parameters of array or function type are adjusted to pointers
            params.push(Param {
                name: declarator.name.map(|(name, _)| name),
                ty: ty.decay(),
            });

            if !self.match_token(&TokenKind::Comma) {
                self.expect_rparen("after parameters")?;
                return Ok((params, false));
            }
        }
    }

    /// Apply declarator parts to a base type
    pub(crate) fn apply_parts(&self, base: CType, parts: Vec<DeclPart>, offset: usize) -> Result<CType, ParseError> {
        let mut ty = base;
        for part in parts {
            ty = match part {
                DeclPart::Pointer => ty.pointer_to(),
                DeclPart::Array(size) => {
                    if ty.is_function() {
                        return Err(ParseError::syntax("Declared as array of functions", offset));
                    }
                    if matches!(ty, CType::Array(_, None)) || ty.is_void() {
                        return Err(ParseError::new(
                            DiagnosticKind::IncompleteType,
                            "Array has incomplete element type",
                            offset,
                        ));
                    }
                    CType::Array(Box::new(ty), size)
                }
                DeclPart::Function(params, variadic) => {
                    if ty.is_array() || ty.is_function() {
                        return Err(ParseError::syntax(
                            "Function cannot return array or function type",
                            offset,
                        ));
                    }
                    CType::Function(Box::new(FunctionType {
                        ret: ty,
                        params: params.into_iter().map(|p| p.ty).collect(),
                        variadic,
                    }))
                }
            };
        }
        Ok(ty)
    }

    /// Parse a type name as used by casts and `sizeof`
    pub(crate) fn parse_type_name(&mut self) -> Result<CType, ParseError> {
        let specs = self.parse_declaration_specifiers()?;
        if specs.storage != Storage::None {
            return Err(ParseError::syntax("Storage class in type name", specs.span.start));
        }
        let declarator = self.parse_declarator()?;
        if let Some((name, span)) = declarator.name {
            return Err(ParseError::syntax(
                format!("Unexpected identifier '{}' in type name", name),
                span.start,
            ));
        }
        self.apply_parts(specs.ty, declarator.parts, declarator.span.start)
    }

    fn parse_init_declarators(
        &mut self,
        specs: Specifiers,
        first: Declarator,
        start: usize,
    ) -> Result<Declaration, ParseError> {
        let mut declarators = Vec::new();
        let mut next = Some(first);

        while let Some(declarator) = next.take() {
            let (name, name_span) = declarator.name.clone().ok_or_else(|| {
                ParseError::syntax("Expected identifier in declarator", declarator.span.start)
            })?;
            let mut ty = self.apply_parts(specs.ty.clone(), declarator.parts, declarator.span.start)?;

            let init = if self.match_token(&TokenKind::Eq) {
                if specs.storage == Storage::Typedef {
                    return Err(ParseError::syntax(
                        format!("Typedef '{}' is initialized", name),
                        name_span.start,
                    ));
                }
                if ty.is_function() {
                    return Err(ParseError::syntax(
                        format!("Function '{}' is initialized like a variable", name),
                        name_span.start,
                    ));
                }
                Some(self.parse_initializer()?)
            } else {
                None
            };

            if let (CType::Array(elem, None), Some(init)) = (&ty, &init) {
                let size = match init {
                    Initializer::List { items, .. } => Some(items.len()),
                    Initializer::Expr(Expr {
                        kind: ExprKind::StringLiteral(bytes),
                        ..
                    }) if elem.is_char_like() => Some(bytes.len() + 1),
                    Initializer::Expr(_) => None,
                };
                if size.is_some() {
                    ty = CType::Array(elem.clone(), size);
                }
            }

            let typedef = (specs.storage == Storage::Typedef).then(|| ty.clone());
            self.declare_name(&name, typedef);

            declarators.push(InitDeclarator {
                name,
                ty,
                span: declarator.span,
                init,
            });

            if self.match_token(&TokenKind::Comma) {
                next = Some(self.parse_declarator()?);
            }
        }

        self.finish_declaration(specs, declarators, start)
    }

    fn finish_declaration(
        &mut self,
        specs: Specifiers,
        declarators: Vec<InitDeclarator>,
        start: usize,
    ) -> Result<Declaration, ParseError> {
        let end = self.expect_semicolon("after declaration")?;
        Ok(Declaration {
            storage: specs.storage,
            specifiers: specs.span,
            base_type: specs.ty,
            declarators,
            defines_aggregate: specs.defines_aggregate,
            span: Span::new(start, end.end),
        })
    }

    fn parse_function_definition(
        &mut self,
        specs: Specifiers,
        declarator: Declarator,
        start: usize,
    ) -> Result<FunctionDef, ParseError> {
        let (name, name_span) = declarator.name.clone().ok_or_else(|| {
            ParseError::syntax("Expected function name", declarator.span.start)
        })?;
        if specs.storage == Storage::Typedef {
            return Err(ParseError::syntax("Function definition declared 'typedef'", start));
        }
        let params = declarator.function_params().map(<[Param]>::to_vec).unwrap_or_default();
        if let Some(index) = params.iter().position(|p| p.name.is_none()) {
            return Err(ParseError::syntax(
                format!("Parameter {} of '{}' has no name", index + 1, name),
                name_span.start,
            ));
        }

        let signature = Span::new(start, declarator.span.end);
        let ty = match self.apply_parts(specs.ty, declarator.parts, declarator.span.start)? {
            CType::Function(ft) => *ft,
            _ => return Err(ParseError::syntax("Expected function declarator", name_span.start)),
        };

        self.declare_name(&name, None);
        self.push_scope();
        for param in &params {
            if let Some(param_name) = &param.name {
                self.declare_name(param_name, None);
            }
        }
        let body = self.parse_compound_statement();
        self.pop_scope();
        let body = body?;

        let span = Span::new(start, body.span.end);
        Ok(FunctionDef {
            name,
            ty,
            params,
            body,
            is_static: specs.storage == Storage::Static,
            signature,
            span,
        })
    }

    /// Parse a brace list or a single assignment expression
    pub(crate) fn parse_initializer(&mut self) -> Result<Initializer, ParseError> {
        if !self.check(&TokenKind::LBrace) {
            return Ok(Initializer::Expr(self.parse_assignment_expression()?));
        }

        let open = self.advance().span;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            items.push(self.parse_initializer()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        let close = self.expect_rbrace("to close initializer list")?;

        Ok(Initializer::List {
            items,
            span: open.to(close),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse_source;
    use crate::sema::types::{type_name, CType, IntKind};

    fn only_declaration(source: &str) -> Declaration {
        let unit = parse_source(source).unwrap();
        match unit.items.into_iter().next() {
            Some(ExternalDecl::Declaration(decl)) => decl,
            other => panic!("Expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_declarators_and_spans() {
        let source = "int a = 5, *p, arr[3];";
        let decl = only_declaration(source);

        assert_eq!(decl.specifiers.text(source), "int");
        assert_eq!(decl.declarators.len(), 3);
        assert_eq!(decl.declarators[1].span.text(source), "*p");
        assert_eq!(decl.declarators[1].ty, CType::int().pointer_to());
        assert_eq!(decl.declarators[2].span.text(source), "arr[3]");
        assert_eq!(
            decl.declarators[0].init.as_ref().unwrap().span().text(source),
            "5"
        );
        assert_eq!(decl.span.text(source), source);
    }

    #[test]
    fn test_function_pointer_declarator() {
        let decl = only_declaration("int (*fp)(int, char);");
        assert_eq!(type_name(&decl.declarators[0].ty), "int (*)(int, char)");
    }

    #[test]
    fn test_function_returning_function_pointer() {
        let decl = only_declaration("int (*pick(int which))(int);");
        assert_eq!(type_name(&decl.declarators[0].ty), "int (*(int))(int)");
    }

    #[test]
    fn test_unsized_array_completed() {
        let decl = only_declaration("int v[] = {1, 2, 3};");
        assert_eq!(
            decl.declarators[0].ty,
            CType::Array(Box::new(CType::int()), Some(3))
        );

        let decl = only_declaration("char s[] = \"hey\";");
        assert_eq!(type_name(&decl.declarators[0].ty), "char [4]");
    }

    #[test]
    fn test_typedef_names() {
        let unit = parse_source("typedef unsigned long size; size n; size *m;").unwrap();
        match &unit.items[2] {
            ExternalDecl::Declaration(decl) => {
                assert_eq!(decl.declarators[0].ty, CType::Int(IntKind::ULong).pointer_to());
            }
            _ => panic!("Expected declaration"),
        }
    }

    #[test]
    fn test_anonymous_struct() {
        let source = "struct { int a; char b; } pair;";
        let unit = parse_source(source).unwrap();
        match &unit.items[0] {
            ExternalDecl::Declaration(decl) => {
                let key = decl.defines_aggregate.clone().unwrap();
                assert_eq!(unit.types.get(&key).unwrap().size, 8);
                assert_eq!(type_name(&decl.declarators[0].ty), "struct <anonymous>");
            }
            _ => panic!("Expected declaration"),
        }
    }

    #[test]
    fn test_specifier_combinations() {
        let decl = only_declaration("unsigned long long int big;");
        assert_eq!(decl.declarators[0].ty, CType::Int(IntKind::ULongLong));

        assert!(parse_source("long char x;").is_err());
    }

    #[test]
    fn test_function_definition_signature() {
        let source = "static int add(int a, int b) { return a + b; }";
        let unit = parse_source(source).unwrap();
        match &unit.items[0] {
            ExternalDecl::Function(f) => {
                assert!(f.is_static);
                assert_eq!(f.signature.text(source), "static int add(int a, int b)");
                assert_eq!(f.params.len(), 2);
            }
            _ => panic!("Expected function"),
        }
    }
}
