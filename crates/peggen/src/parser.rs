//! Grammar parser: recursive descent over the token stream, building
//! the AST. Nonterminals are interned on first mention; escape decoding
//! of literal bodies happens here.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    CodeBlock, Expr, Grammar, NonterminalHandle, Substitution, SubstitutionKind, TopLevelCode,
    TopLevelCodeKind, Type, TypeHandle,
};
use crate::error::{ErrorAccumulator, FatalError};
use crate::literal;
use crate::source::Source;
use crate::tokenizer::{Token, TokenKind, Tokenizer};

pub fn parse_grammar(source: &Source, err: &ErrorAccumulator) -> Result<Grammar, FatalError> {
    let mut tokenizer = Tokenizer::new(&source.contents);
    let token = tokenizer.parse_token(err)?;
    let mut parser = GrammarParser {
        grammar: Grammar::new(token.span),
        tokenizer,
        token,
        err,
        symbols: HashMap::new(),
        type_names: HashMap::new(),
        variables: HashSet::new(),
        code_allowed: true,
    };
    parser
        .type_names
        .insert("void".to_owned(), parser.grammar.void_type);
    parser
        .type_names
        .insert("char".to_owned(), parser.grammar.char_type);
    parser.parse_top_level()?;
    Ok(parser.grammar)
}

struct GrammarParser<'a> {
    tokenizer: Tokenizer<'a>,
    token: Token,
    err: &'a ErrorAccumulator,
    grammar: Grammar,
    symbols: HashMap<String, NonterminalHandle>,
    type_names: HashMap<String, TypeHandle>,
    /// Binding names used so far in the current rule. `$$` is reserved.
    variables: HashSet<String>,
    /// Cleared inside `!(...)`: a negative match has no value and may
    /// have no side effects, so bindings and code are rejected there.
    code_allowed: bool,
}

impl<'a> GrammarParser<'a> {
    fn next(&mut self) -> Result<(), FatalError> {
        self.token = self.tokenizer.parse_token(self.err)?;
        Ok(())
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.token.kind == kind
    }

    /// Interns the nonterminal named by the current identifier token.
    fn get_symbol(&mut self) -> NonterminalHandle {
        debug_assert_eq!(self.token.kind, TokenKind::Identifier);
        if let Some(&handle) = self.symbols.get(&self.token.text) {
            return handle;
        }
        let handle = self.grammar.nonterminals.push(crate::ast::Nonterminal {
            span: self.token.span,
            name: self.token.text.clone(),
            expr: None,
            ty: None,
            settings: Default::default(),
        });
        self.symbols.insert(self.token.text.clone(), handle);
        handle
    }

    fn parse_top_level(&mut self) -> Result<(), FatalError> {
        loop {
            match self.token.kind {
                TokenKind::EndOfFile => return Ok(()),
                TokenKind::TypedefKeyword => self.parse_typedef()?,
                TokenKind::CodeKeyword => self.parse_code_block()?,
                _ => self.parse_rule()?,
            }
        }
    }

    /// `typedef qual_name Identifier ;`
    fn parse_typedef(&mut self) -> Result<(), FatalError> {
        let typedef_span = self.token.span;
        self.next()?;
        let mut code = String::new();
        if self.at(TokenKind::ColonColon) {
            code.push_str("::");
            self.next()?;
        }
        if !self.at(TokenKind::Identifier) {
            return Err(self.err.fatal(self.token.span, "missing type name"));
        }
        code.push_str(&self.token.text);
        self.next()?;
        while self.at(TokenKind::ColonColon) {
            code.push_str("::");
            self.next()?;
            if !self.at(TokenKind::Identifier) {
                return Err(self.err.fatal(self.token.span, "missing type name"));
            }
            code.push_str(&self.token.text);
            self.next()?;
        }
        if !self.at(TokenKind::Identifier) {
            return Err(self.err.fatal(self.token.span, "missing type name"));
        }
        let name = self.token.text.clone();
        let name_span = self.token.span;
        self.next()?;
        if !self.at(TokenKind::Semicolon) {
            return Err(self.err.fatal(self.token.span, "missing ;"));
        }
        self.next()?;
        if let Some(&existing) = self.type_names.get(&name) {
            self.err.error(name_span, "type already defined");
            let previous = self.grammar.types[existing].span;
            if !previous.is_empty() {
                self.err.info(previous, "previous type definition");
            }
            return Ok(());
        }
        let handle = self.grammar.types.push(Type {
            span: typedef_span,
            name: name.clone(),
            code,
            is_void: false,
        });
        self.type_names.insert(name, handle);
        Ok(())
    }

    /// `code Identifier CodeSnippet` with Identifier in
    /// {license, header, source}.
    fn parse_code_block(&mut self) -> Result<(), FatalError> {
        self.next()?;
        if !self.at(TokenKind::Identifier) {
            return Err(self.err.fatal(self.token.span, "missing identifier"));
        }
        let kind = match self.token.text.as_str() {
            "license" => Some(TopLevelCodeKind::License),
            "header" => Some(TopLevelCodeKind::Header),
            "source" => Some(TopLevelCodeKind::Source),
            _ => {
                self.err.error(self.token.span, "invalid code block name");
                None
            }
        };
        self.next()?;
        if !self.at(TokenKind::CodeSnippet) {
            return Err(self.err.fatal(self.token.span, "missing code snippet"));
        }
        if !self.token.substitutions.is_empty() {
            self.err.error(self.token.span, "$$ not allowed here");
        }
        if let Some(kind) = kind {
            self.grammar.top_level_code.push(TopLevelCode {
                span: self.token.span,
                kind,
                code: self.token.text.clone(),
            });
        }
        self.next()?;
        Ok(())
    }

    /// `Identifier (':' Identifier)? '=' expression ';'`
    fn parse_rule(&mut self) -> Result<(), FatalError> {
        if !self.at(TokenKind::Identifier) {
            return Err(self.err.fatal(self.token.span, "missing rule name"));
        }
        let handle = self.get_symbol();
        let name_span = self.token.span;
        self.next()?;

        let mut ty = None;
        if self.at(TokenKind::Colon) {
            self.next()?;
            if !self.at(TokenKind::Identifier) {
                return Err(self.err.fatal(self.token.span, "missing type name"));
            }
            ty = Some(match self.type_names.get(&self.token.text) {
                Some(&found) => found,
                None => {
                    self.err.error(self.token.span, "type not defined");
                    self.grammar.void_type
                }
            });
            self.next()?;
        }

        if !self.at(TokenKind::Equal) {
            return Err(self.err.fatal(self.token.span, "missing ="));
        }
        self.next()?;

        let already_defined = self.grammar.nonterminals[handle].expr.is_some();
        if already_defined {
            self.err.error(name_span, "rule already defined");
            self.err
                .info(self.grammar.nonterminals[handle].span, "previous rule definition");
        }

        self.variables.clear();
        self.variables.insert("$$".to_owned());
        self.code_allowed = true;
        let expr = self.parse_expression()?;

        if !self.at(TokenKind::Semicolon) {
            return Err(self.err.fatal(self.token.span, "missing ;"));
        }
        self.next()?;

        let nonterminal = &mut self.grammar.nonterminals[handle];
        nonterminal.expr = Some(expr);
        if ty.is_some() {
            nonterminal.ty = ty;
        }
        if !already_defined {
            self.grammar.order.push(handle);
        }
        Ok(())
    }

    /// `sequence ('/' sequence)*`
    fn parse_expression(&mut self) -> Result<Expr, FatalError> {
        let mut expr = self.parse_sequence()?;
        while self.at(TokenKind::FSlash) {
            let span = self.token.span;
            self.next()?;
            let second = self.parse_sequence()?;
            expr = Expr::OrderedChoice {
                span,
                first: Box::new(expr),
                second: Box::new(second),
            };
        }
        Ok(expr)
    }

    /// One or more repeat expressions; ends at a delimiter token.
    fn parse_sequence(&mut self) -> Result<Expr, FatalError> {
        let mut expr = self.parse_repeat()?;
        loop {
            match self.token.kind {
                TokenKind::EndOfFile
                | TokenKind::Semicolon
                | TokenKind::Colon
                | TokenKind::ColonColon
                | TokenKind::FSlash
                | TokenKind::Equal
                | TokenKind::RParen
                | TokenKind::TypedefKeyword
                | TokenKind::CodeKeyword => return Ok(expr),
                _ => {}
            }
            let span = self.token.span;
            let second = self.parse_repeat()?;
            expr = Expr::Sequence {
                span,
                first: Box::new(expr),
                second: Box::new(second),
            };
        }
    }

    /// `primary ('?' | '*' | '+')*`
    fn parse_repeat(&mut self) -> Result<Expr, FatalError> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.token.span;
            expr = match self.token.kind {
                TokenKind::QMark => Expr::Optional {
                    span,
                    inner: Box::new(expr),
                },
                TokenKind::Star => Expr::ZeroOrMore {
                    span,
                    inner: Box::new(expr),
                },
                TokenKind::Plus => Expr::OneOrMore {
                    span,
                    inner: Box::new(expr),
                },
                _ => return Ok(expr),
            };
            self.next()?;
        }
    }

    /// `(':' Identifier)?` after a nonterminal reference or character
    /// class. Returns `None` when the binding is rejected, so the AST
    /// invariants (unique names, none inside `!`) always hold.
    fn parse_binding(&mut self) -> Result<Option<String>, FatalError> {
        if !self.at(TokenKind::Colon) {
            return Ok(None);
        }
        self.next()?;
        if !self.at(TokenKind::Identifier) {
            return Err(self.err.fatal(self.token.span, "missing variable name"));
        }
        let name = self.token.text.clone();
        let span = self.token.span;
        self.next()?;
        if !self.code_allowed {
            self.err.error(span, "variable not allowed inside !");
            return Ok(None);
        }
        if !self.variables.insert(name.clone()) {
            self.err.error(span, "duplicate variable name");
            return Ok(None);
        }
        Ok(Some(name))
    }

    fn snippet_code(&self, kind: SubstitutionKind) -> CodeBlock {
        CodeBlock {
            code: self.token.text.clone(),
            substitutions: self
                .token
                .substitutions
                .iter()
                .map(|&offset| Substitution { kind, offset })
                .collect(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, FatalError> {
        match self.token.kind {
            TokenKind::LParen => {
                self.next()?;
                if self.at(TokenKind::RParen) {
                    let expr = Expr::Empty {
                        span: self.token.span,
                    };
                    self.next()?;
                    return Ok(expr);
                }
                let expr = self.parse_expression()?;
                if !self.at(TokenKind::RParen) {
                    return Err(self.err.fatal(self.token.span, "missing )"));
                }
                self.next()?;
                Ok(expr)
            }
            TokenKind::Identifier => {
                let target = self.get_symbol();
                let span = self.token.span;
                self.next()?;
                let variable = self.parse_binding()?;
                Ok(Expr::NonterminalRef {
                    span,
                    target,
                    variable,
                })
            }
            TokenKind::EofKeyword => {
                let span = self.token.span;
                self.next()?;
                Ok(Expr::EofTerminal { span })
            }
            TokenKind::String => {
                let span = self.token.span;
                let values =
                    literal::decode_string(&self.token.text, span.start() + 1, self.err);
                self.next()?;
                let mut expr = None;
                for value in values {
                    let terminal = Expr::Terminal { span, value };
                    expr = Some(match expr {
                        Some(first) => Expr::Sequence {
                            span,
                            first: Box::new(first),
                            second: Box::new(terminal),
                        },
                        None => terminal,
                    });
                }
                Ok(expr.unwrap_or(Expr::Empty { span }))
            }
            TokenKind::CharacterClass => {
                let span = self.token.span;
                let (inverted, ranges) = literal::decode_character_class(
                    &self.token.text,
                    span,
                    span.start() + 1,
                    self.err,
                )?;
                self.next()?;
                let variable = self.parse_binding()?;
                Ok(Expr::CharacterClass {
                    span,
                    inverted,
                    ranges,
                    variable,
                })
            }
            TokenKind::Amp => {
                let span = self.token.span;
                self.next()?;
                if self.at(TokenKind::CodeSnippet) {
                    if !self.code_allowed {
                        self.err.error(self.token.span, "code not allowed inside !");
                    }
                    let code = self.snippet_code(SubstitutionKind::PredicateReturnValue);
                    self.next()?;
                    return Ok(Expr::CustomPredicate { span, code });
                }
                let inner = self.parse_primary()?;
                Ok(Expr::FollowedBy {
                    span,
                    inner: Box::new(inner),
                })
            }
            TokenKind::EMark => {
                let span = self.token.span;
                self.next()?;
                let saved = self.code_allowed;
                self.code_allowed = false;
                let inner = self.parse_primary()?;
                self.code_allowed = saved;
                Ok(Expr::NotFollowedBy {
                    span,
                    inner: Box::new(inner),
                })
            }
            TokenKind::CodeSnippet => {
                let span = self.token.span;
                if !self.code_allowed {
                    self.err.error(span, "code not allowed inside !");
                }
                let code = self.snippet_code(SubstitutionKind::ReturnValue);
                self.next()?;
                Ok(Expr::CodeSnippet { span, code })
            }
            _ => Err(self.err.fatal(self.token.span, "missing expression")),
        }
    }
}
