//! Recursive-descent parser for the test-source dialect.
//!
//! TypeScript-only syntax (type annotations, `as` casts, non-null assertions,
//! `type`/`interface` declarations, `import type`) is recognized and skipped:
//! it carries no runtime meaning for harvesting.

use super::ast::*;
use super::lexer::{TemplateToken, Token, TokenKind};
use crate::error::{HarvestError, Result};
use std::rc::Rc;

pub fn parse_program(tokens: Vec<Token>, file: &str) -> Result<Program> {
    let mut parser = Parser::new(tokens, file);
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.parse_statement()?);
    }
    Ok(Program { body })
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a str,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, file: &'a str) -> Self {
        Self {
            tokens,
            pos: 0,
            file,
        }
    }

    // ---------------------------------------------------------------------
    // token helpers
    // ---------------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek().is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{p}'")))
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.peek().is_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    fn error(&self, message: impl Into<String>) -> HarvestError {
        let token = self.peek();
        HarvestError::Parse {
            file: self.file.to_string(),
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> HarvestError {
        self.error(format!("expected {expected}, found {:?}", self.peek().kind))
    }

    fn eat_semicolon(&mut self) {
        self.eat_punct(";");
    }

    // ---------------------------------------------------------------------
    // statements
    // ---------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt> {
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.peek().is_punct("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }

        let keyword = match &self.peek().kind {
            TokenKind::Ident(name) => name.clone(),
            _ => return self.parse_expression_statement(),
        };

        match keyword.as_str() {
            "import" if !self.peek_at(1).is_punct("(") && !self.peek_at(1).is_punct(".") => {
                self.parse_import()
            }
            "export" => {
                self.advance();
                if self.eat_ident("default") {
                    return self.parse_statement();
                }
                if self.peek().is_punct("{") || self.peek().is_punct("*") {
                    // Re-exports carry no bindings for the file itself.
                    if self.peek().is_punct("{") {
                        self.skip_balanced()?;
                    } else {
                        self.advance();
                        if self.eat_ident("as") {
                            self.expect_name()?;
                        }
                    }
                    if self.eat_ident("from") {
                        self.expect_string()?;
                    }
                    self.eat_semicolon();
                    return Ok(Stmt::Empty);
                }
                self.parse_statement()
            }
            "const" | "let" | "var" => {
                self.advance();
                if keyword == "const" && self.peek().is_ident("enum") {
                    return Err(self.error("const enums are not supported"));
                }
                let decls = self.parse_declarators()?;
                self.eat_semicolon();
                Ok(Stmt::Declare(decls))
            }
            "async" if self.peek_at(1).is_ident("function") => {
                self.advance();
                self.parse_statement()
            }
            "function" => {
                self.advance();
                self.eat_punct("*");
                let name = self.expect_name()?;
                let def = self.parse_function_rest(Some(name))?;
                Ok(Stmt::Function(def))
            }
            "return" => {
                self.advance();
                let value = if self.peek().is_punct(";")
                    || self.peek().is_punct("}")
                    || self.peek().newline_before
                    || self.at_eof()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.eat_semicolon();
                Ok(Stmt::Return(value))
            }
            "throw" => {
                self.advance();
                let value = self.parse_expression()?;
                self.eat_semicolon();
                Ok(Stmt::Throw(value))
            }
            "if" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.eat_ident("else") {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            "for" => self.parse_for_of(),
            "type" if matches!(self.peek_at(1).kind, TokenKind::Ident(_))
                && (self.peek_at(2).is_punct("=") || self.peek_at(2).is_punct("<")) =>
            {
                self.advance();
                self.advance();
                if self.peek().is_punct("<") {
                    self.skip_balanced()?;
                }
                self.expect_punct("=")?;
                self.skip_type()?;
                self.eat_semicolon();
                Ok(Stmt::Empty)
            }
            "interface" if matches!(self.peek_at(1).kind, TokenKind::Ident(_)) => {
                self.advance();
                while !self.at_eof() && !self.peek().is_punct("{") {
                    self.advance();
                }
                self.skip_balanced()?;
                Ok(Stmt::Empty)
            }
            "declare" if matches!(self.peek_at(1).kind, TokenKind::Ident(_)) => {
                while !self.at_eof() && !self.peek().is_punct(";") {
                    if self.peek().is_punct("{") {
                        self.skip_balanced()?;
                        return Ok(Stmt::Empty);
                    }
                    self.advance();
                }
                self.eat_semicolon();
                Ok(Stmt::Empty)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.parse_expression()?;
        self.eat_semicolon();
        Ok(Stmt::Expr(expr))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.peek().is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_import(&mut self) -> Result<Stmt> {
        self.advance();

        // `import type ...` has no runtime effect.
        if self.peek().is_ident("type")
            && !self.peek_at(1).is_punct(",")
            && !self.peek_at(1).is_ident("from")
        {
            while !self.at_eof() && !matches!(self.peek().kind, TokenKind::Str(_)) {
                self.advance();
            }
            self.advance();
            self.eat_semicolon();
            return Ok(Stmt::Empty);
        }

        let mut decl = ImportDecl {
            specifier: String::new(),
            default: None,
            namespace: None,
            named: Vec::new(),
        };

        if let TokenKind::Str(specifier) = &self.peek().kind {
            decl.specifier = specifier.clone();
            self.advance();
            self.eat_semicolon();
            return Ok(Stmt::Import(decl));
        }

        if matches!(self.peek().kind, TokenKind::Ident(_)) {
            decl.default = Some(self.expect_name()?);
            self.eat_punct(",");
        }

        if self.eat_punct("*") {
            if !self.eat_ident("as") {
                return Err(self.unexpected("'as'"));
            }
            decl.namespace = Some(self.expect_name()?);
        } else if self.eat_punct("{") {
            while !self.eat_punct("}") {
                let type_only = self.peek().is_ident("type")
                    && !self.peek_at(1).is_punct(",")
                    && !self.peek_at(1).is_punct("}")
                    && !self.peek_at(1).is_ident("as");
                if type_only {
                    self.advance();
                }
                let imported = match &self.peek().kind {
                    TokenKind::Str(s) => {
                        let s = s.clone();
                        self.advance();
                        s
                    }
                    _ => self.expect_name()?,
                };
                let local = if self.eat_ident("as") {
                    self.expect_name()?
                } else {
                    imported.clone()
                };
                if !type_only {
                    decl.named.push((imported, local));
                }
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
        }

        if !self.eat_ident("from") {
            return Err(self.unexpected("'from'"));
        }
        decl.specifier = self.expect_string()?;
        self.eat_semicolon();
        Ok(Stmt::Import(decl))
    }

    fn parse_declarators(&mut self) -> Result<Vec<(Pattern, Option<Expr>)>> {
        let mut decls = Vec::new();
        loop {
            let pattern = self.parse_pattern()?;
            self.eat_punct("!");
            if self.eat_punct(":") {
                self.skip_type()?;
            }
            let init = if self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            decls.push((pattern, init));
            if !self.eat_punct(",") {
                return Ok(decls);
            }
        }
    }

    fn parse_for_of(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_punct("(")?;
        if !(self.eat_ident("const") || self.eat_ident("let") || self.eat_ident("var")) {
            return Err(self.error("only `for (const x of xs)` loops are supported"));
        }
        let binding = self.parse_pattern()?;
        if !self.eat_ident("of") {
            return Err(self.error("only `for...of` loops are supported"));
        }
        let iterable = self.parse_expression()?;
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::ForOf {
            binding,
            iterable,
            body,
        })
    }

    // ---------------------------------------------------------------------
    // patterns and functions
    // ---------------------------------------------------------------------

    fn parse_pattern(&mut self) -> Result<Pattern> {
        if self.eat_punct("{") {
            let mut props = Vec::new();
            while !self.eat_punct("}") {
                let rest = self.eat_punct("...");
                let key = self.expect_name()?;
                let pattern = if !rest && self.eat_punct(":") {
                    self.parse_pattern()?
                } else {
                    Pattern::Ident(key.clone())
                };
                let default = if self.eat_punct("=") {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                props.push(ObjectPatternProp {
                    key,
                    binding: Binding {
                        pattern,
                        default,
                        rest,
                    },
                });
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
            return Ok(Pattern::Object(props));
        }

        if self.eat_punct("[") {
            let mut items = Vec::new();
            while !self.eat_punct("]") {
                if self.eat_punct(",") {
                    items.push(None);
                    continue;
                }
                items.push(Some(self.parse_binding()?));
                if !self.eat_punct(",") {
                    self.expect_punct("]")?;
                    break;
                }
            }
            return Ok(Pattern::Array(items));
        }

        Ok(Pattern::Ident(self.expect_name()?))
    }

    fn parse_binding(&mut self) -> Result<Binding> {
        let rest = self.eat_punct("...");
        let pattern = self.parse_pattern()?;
        self.eat_punct("?");
        if self.eat_punct(":") {
            self.skip_type()?;
        }
        let default = if self.eat_punct("=") {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        Ok(Binding {
            pattern,
            default,
            rest,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Binding>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            // TypeScript `this` parameter annotations.
            if self.peek().is_ident("this") && self.peek_at(1).is_punct(":") {
                self.advance();
                self.advance();
                self.skip_type()?;
            } else {
                params.push(self.parse_binding()?);
            }
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(params)
    }

    fn parse_function_rest(&mut self, name: Option<String>) -> Result<Rc<FunctionDef>> {
        if self.peek().is_punct("<") {
            self.skip_balanced()?;
        }
        let params = self.parse_params()?;
        if self.eat_punct(":") {
            self.skip_type()?;
        }
        let body = FunctionBody::Block(self.parse_block()?);
        Ok(Rc::new(FunctionDef { name, params, body }))
    }

    fn parse_arrow(&mut self) -> Result<Expr> {
        let params = if self.peek().is_punct("(") {
            let params = self.parse_params()?;
            if self.eat_punct(":") {
                self.skip_type()?;
            }
            params
        } else {
            vec![Binding {
                pattern: Pattern::Ident(self.expect_name()?),
                default: None,
                rest: false,
            }]
        };
        self.expect_punct("=>")?;
        let body = if self.peek().is_punct("{") {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(self.parse_assignment()?)
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    /// Looks ahead from a `(` to decide whether it opens arrow parameters.
    fn is_arrow_ahead(&mut self) -> bool {
        let start = self.pos;
        let mut depth = 0usize;
        let mut idx = start;
        while idx < self.tokens.len() {
            let token = &self.tokens[idx];
            if token.is_punct("(") || token.is_punct("[") || token.is_punct("{") {
                depth += 1;
            } else if token.is_punct(")") || token.is_punct("]") || token.is_punct("}") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            } else if matches!(token.kind, TokenKind::Eof) {
                return false;
            }
            idx += 1;
        }
        let after = idx + 1;
        if after >= self.tokens.len() {
            return false;
        }
        if self.tokens[after].is_punct("=>") {
            return true;
        }
        if !self.tokens[after].is_punct(":") {
            return false;
        }

        // `(a): T => ...` versus `cond ? (a) : b`: try to read a return type.
        self.pos = after + 1;
        let is_arrow = self.skip_type().is_ok() && self.peek().is_punct("=>");
        self.pos = start;
        is_arrow
    }

    // ---------------------------------------------------------------------
    // types (skipped)
    // ---------------------------------------------------------------------

    fn skip_type(&mut self) -> Result<()> {
        let _leading = self.eat_punct("|") || self.eat_punct("&");
        loop {
            self.skip_type_primary()?;
            loop {
                if self.peek().is_punct("[") && !self.peek().newline_before {
                    self.skip_balanced()?;
                } else {
                    break;
                }
            }
            if self.eat_punct("|") || self.eat_punct("&") {
                continue;
            }
            if self.peek().is_ident("extends") {
                // conditional type: `A extends B ? C : D`
                self.advance();
                self.skip_type_primary()?;
                self.expect_punct("?")?;
                self.skip_type()?;
                self.expect_punct(":")?;
                continue;
            }
            return Ok(());
        }
    }

    fn skip_type_primary(&mut self) -> Result<()> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Punct("(") => {
                self.skip_balanced()?;
                if self.eat_punct("=>") {
                    self.skip_type()?;
                }
                Ok(())
            }
            TokenKind::Punct("<") => {
                self.skip_balanced()?;
                self.skip_type_primary()
            }
            TokenKind::Punct("{") | TokenKind::Punct("[") => self.skip_balanced(),
            TokenKind::Punct("-") => {
                self.advance();
                self.advance();
                Ok(())
            }
            TokenKind::Ident(name)
                if matches!(name.as_str(), "typeof" | "keyof" | "readonly" | "unique" | "infer") =>
            {
                self.advance();
                self.skip_type_primary()
            }
            TokenKind::Ident(name) if name == "new" => {
                self.advance();
                self.skip_type_primary()
            }
            TokenKind::Ident(_) => {
                self.advance();
                while self.peek().is_punct(".") {
                    self.advance();
                    self.expect_name()?;
                }
                if self.peek().is_punct("<") {
                    self.skip_balanced()?;
                }
                if self.peek().is_ident("is") {
                    self.advance();
                    self.skip_type_primary()?;
                }
                Ok(())
            }
            TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::Template(_) => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected("type")),
        }
    }

    /// Skips a bracketed group starting at the current opener, counting angle
    /// brackets only when the group itself opens with `<`.
    fn skip_balanced(&mut self) -> Result<()> {
        let angle = self.peek().is_punct("<");
        let mut depth = 0usize;
        loop {
            let token = self.advance();
            let opens = token.is_punct("(")
                || token.is_punct("[")
                || token.is_punct("{")
                || (angle && token.is_punct("<"));
            let closes = token.is_punct(")")
                || token.is_punct("]")
                || token.is_punct("}")
                || (angle && token.is_punct(">"));
            if opens {
                depth += 1;
            } else if closes {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(());
                }
            } else if matches!(token.kind, TokenKind::Eof) {
                return Err(self.error("unbalanced brackets"));
            }
        }
    }

    // ---------------------------------------------------------------------
    // expressions
    // ---------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        if self.peek().is_ident("async")
            && (self.peek_at(1).is_punct("(") || self.peek_at(2).is_punct("=>"))
            && !self.peek_at(1).newline_before
        {
            self.advance();
        }
        if matches!(self.peek().kind, TokenKind::Ident(_)) && self.peek_at(1).is_punct("=>") {
            return self.parse_arrow();
        }
        if self.peek().is_punct("(") && self.is_arrow_ahead() {
            return self.parse_arrow();
        }

        let target = self.parse_conditional()?;
        let op = if self.peek().is_punct("=") {
            None
        } else if self.peek().is_punct("+=") {
            Some(BinaryOp::Add)
        } else if self.peek().is_punct("-=") {
            Some(BinaryOp::Sub)
        } else {
            return Ok(target);
        };
        if !matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
            return Err(self.error("invalid assignment target"));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            target: Box::new(target),
            op,
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary_operator(&self) -> Option<(u8, BinaryOrLogical)> {
        let TokenKind::Punct(p) = self.peek().kind else {
            return None;
        };
        let op = match p {
            "??" => (1, BinaryOrLogical::Logical(LogicalOp::Coalesce)),
            "||" => (2, BinaryOrLogical::Logical(LogicalOp::Or)),
            "&&" => (3, BinaryOrLogical::Logical(LogicalOp::And)),
            "===" => (6, BinaryOrLogical::Binary(BinaryOp::StrictEq)),
            "!==" => (6, BinaryOrLogical::Binary(BinaryOp::StrictNe)),
            "==" => (6, BinaryOrLogical::Binary(BinaryOp::LooseEq)),
            "!=" => (6, BinaryOrLogical::Binary(BinaryOp::LooseNe)),
            "<" => (7, BinaryOrLogical::Binary(BinaryOp::Lt)),
            ">" => (7, BinaryOrLogical::Binary(BinaryOp::Gt)),
            "<=" => (7, BinaryOrLogical::Binary(BinaryOp::Le)),
            ">=" => (7, BinaryOrLogical::Binary(BinaryOp::Ge)),
            "+" => (9, BinaryOrLogical::Binary(BinaryOp::Add)),
            "-" => (9, BinaryOrLogical::Binary(BinaryOp::Sub)),
            "*" => (10, BinaryOrLogical::Binary(BinaryOp::Mul)),
            "/" => (10, BinaryOrLogical::Binary(BinaryOp::Div)),
            "%" => (10, BinaryOrLogical::Binary(BinaryOp::Rem)),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            if (self.peek().is_ident("as") || self.peek().is_ident("satisfies"))
                && !self.peek().newline_before
            {
                self.advance();
                if !self.eat_ident("const") {
                    self.skip_type()?;
                }
                continue;
            }
            let Some((prec, op)) = self.binary_operator() else {
                return Ok(left);
            };
            if prec < min_prec {
                return Ok(left);
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            left = match op {
                BinaryOrLogical::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                BinaryOrLogical::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = if self.peek().is_punct("!") {
            Some(UnaryOp::Not)
        } else if self.peek().is_punct("-") {
            Some(UnaryOp::Neg)
        } else if self.peek().is_punct("+") {
            Some(UnaryOp::Plus)
        } else if self.peek().is_ident("typeof") {
            Some(UnaryOp::TypeOf)
        } else {
            None
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        if self.peek().is_ident("await") && !self.peek_at(1).is_punct("(") {
            self.advance();
            return self.parse_unary();
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.expect_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberKey::Name(name),
                    optional: false,
                };
            } else if self.eat_punct("?.") {
                if self.peek().is_punct("(") {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                    };
                } else if self.eat_punct("[") {
                    let key = self.parse_expression()?;
                    self.expect_punct("]")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Computed(Box::new(key)),
                        optional: true,
                    };
                } else {
                    let name = self.expect_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Name(name),
                        optional: true,
                    };
                }
            } else if self.peek().is_punct("[") {
                self.advance();
                let key = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberKey::Computed(Box::new(key)),
                    optional: false,
                };
            } else if self.peek().is_punct("(") {
                let args = self.parse_arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: false,
                };
            } else if self.peek().is_punct("!") && !self.peek().newline_before {
                // non-null assertion
                self.advance();
            } else if let TokenKind::Template(template) = &self.peek().kind {
                if self.peek().newline_before {
                    return Ok(expr);
                }
                let template = template.clone();
                self.advance();
                let (quasis, substitutions) = self.template_parts(template)?;
                expr = Expr::TaggedTemplate {
                    tag: Box::new(expr),
                    quasis,
                    substitutions,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Element>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            if self.eat_punct("...") {
                args.push(Element::Spread(self.parse_assignment()?));
            } else {
                args.push(Element::Item(self.parse_assignment()?));
            }
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn template_parts(&self, template: TemplateToken) -> Result<(Vec<String>, Vec<Expr>)> {
        let mut substitutions = Vec::with_capacity(template.substitutions.len());
        for tokens in template.substitutions {
            let mut sub = Parser::new(tokens, self.file);
            let expr = sub.parse_expression()?;
            if !sub.at_eof() {
                return Err(sub.unexpected("end of template substitution"));
            }
            substitutions.push(expr);
        }
        Ok((template.quasis, substitutions))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(Rc::from(s)))
            }
            TokenKind::Template(template) => {
                self.advance();
                let (quasis, substitutions) = self.template_parts(template)?;
                Ok(Expr::Template {
                    quasis,
                    substitutions,
                })
            }
            TokenKind::Punct("(") => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => self.parse_array(),
            TokenKind::Punct("{") => self.parse_object(),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "undefined" => {
                    self.advance();
                    Ok(Expr::Undefined)
                }
                "this" => {
                    self.advance();
                    Ok(Expr::This)
                }
                "function" => {
                    self.advance();
                    self.eat_punct("*");
                    let name = match &self.peek().kind {
                        TokenKind::Ident(n) => {
                            let n = n.clone();
                            self.advance();
                            Some(n)
                        }
                        _ => None,
                    };
                    Ok(Expr::Function(self.parse_function_rest(name)?))
                }
                "new" => self.parse_new(),
                "class" => Err(self.error("class expressions are not supported")),
                _ => {
                    self.advance();
                    Ok(Expr::Ident(name))
                }
            },
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_new(&mut self) -> Result<Expr> {
        self.advance();
        let mut callee = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.expect_name()?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberKey::Name(name),
                    optional: false,
                };
            } else if self.peek().is_punct("[") {
                self.advance();
                let key = self.parse_expression()?;
                self.expect_punct("]")?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberKey::Computed(Box::new(key)),
                    optional: false,
                };
            } else {
                break;
            }
        }
        if self.peek().is_punct("<") {
            self.skip_balanced()?;
        }
        let args = if self.peek().is_punct("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_array(&mut self) -> Result<Expr> {
        self.expect_punct("[")?;
        let mut items = Vec::new();
        while !self.eat_punct("]") {
            if self.eat_punct("...") {
                items.push(Element::Spread(self.parse_assignment()?));
            } else {
                items.push(Element::Item(self.parse_assignment()?));
            }
            if !self.eat_punct(",") {
                self.expect_punct("]")?;
                break;
            }
        }
        Ok(Expr::Array(items))
    }

    fn parse_object(&mut self) -> Result<Expr> {
        self.expect_punct("{")?;
        let mut props = Vec::new();
        while !self.eat_punct("}") {
            if self.eat_punct("...") {
                props.push(Property::Spread(self.parse_assignment()?));
            } else {
                // `async foo() {}` and `*gen() {}` methods
                if self.peek().is_ident("async")
                    && !self.peek_at(1).is_punct(":")
                    && !self.peek_at(1).is_punct("(")
                    && !self.peek_at(1).is_punct(",")
                {
                    self.advance();
                }
                self.eat_punct("*");

                let token = self.peek().clone();
                let (key, shorthand) = match token.kind {
                    TokenKind::Ident(name) => {
                        self.advance();
                        (PropertyKey::Static(name.clone()), Some(name))
                    }
                    TokenKind::Str(s) => {
                        self.advance();
                        (PropertyKey::Static(s), None)
                    }
                    TokenKind::Number(n) => {
                        self.advance();
                        (PropertyKey::Static(super::value::number_to_string(n)), None)
                    }
                    TokenKind::Punct("[") => {
                        self.advance();
                        let key = self.parse_assignment()?;
                        self.expect_punct("]")?;
                        (PropertyKey::Computed(key), None)
                    }
                    _ => return Err(self.unexpected("property key")),
                };

                let value = if self.eat_punct(":") {
                    self.parse_assignment()?
                } else if self.peek().is_punct("(") || self.peek().is_punct("<") {
                    let name = match &key {
                        PropertyKey::Static(name) => Some(name.clone()),
                        PropertyKey::Computed(_) => None,
                    };
                    Expr::Function(self.parse_function_rest(name)?)
                } else if let Some(name) = shorthand {
                    Expr::Ident(name)
                } else {
                    return Err(self.unexpected("':'"));
                };
                props.push(Property::KeyValue(key, value));
            }
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(props))
    }
}

#[derive(Clone, Copy)]
enum BinaryOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;

    fn parse(src: &str) -> Program {
        parse_program(tokenize(src, "t.ts").unwrap(), "t.ts").unwrap()
    }

    #[test]
    fn test_parses_typed_helper_function() {
        let program = parse(
            "function expectErrors(queryStr: string, schema?: GraphQLSchema): ReturnType<typeof f> {\n\
               return expectValidationErrors(KnownTypeNamesRule, queryStr);\n\
             }",
        );
        let Stmt::Function(def) = &program.body[0] else {
            panic!("expected function, got {:?}", program.body[0]);
        };
        assert_eq!(def.name.as_deref(), Some("expectErrors"));
        assert_eq!(def.params.len(), 2);
    }

    #[test]
    fn test_skips_type_only_imports() {
        let program = parse(
            "import type { GraphQLSchema } from '../../type/schema';\n\
             import { describe, it } from 'mocha';",
        );
        assert!(matches!(program.body[0], Stmt::Empty));
        let Stmt::Import(decl) = &program.body[1] else {
            panic!("expected import");
        };
        assert_eq!(decl.specifier, "mocha");
        assert_eq!(
            decl.named,
            vec![
                ("describe".to_string(), "describe".to_string()),
                ("it".to_string(), "it".to_string())
            ]
        );
    }

    #[test]
    fn test_arrow_versus_parenthesized_conditional() {
        let program = parse("const a = x ? (y) : z;\nconst b = (q: string): void => q;");
        let Stmt::Declare(decls) = &program.body[0] else {
            panic!("expected declaration");
        };
        assert!(matches!(decls[0].1, Some(Expr::Conditional { .. })));
        let Stmt::Declare(decls) = &program.body[1] else {
            panic!("expected declaration");
        };
        assert!(matches!(decls[0].1, Some(Expr::Function(_))));
    }

    #[test]
    fn test_chained_member_calls_and_casts() {
        let program = parse("expect(result as any).to.have.nested.property('a.b', 1)!;");
        let Stmt::Expr(Expr::Call { callee, args, .. }) = &program.body[0] else {
            panic!("expected call statement, got {:?}", program.body[0]);
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(
            callee.as_ref(),
            Expr::Member { property: MemberKey::Name(name), .. } if name == "property"
        ));
    }

    #[test]
    fn test_type_alias_and_interface_are_skipped() {
        let program = parse(
            "type Foo = { a: string } | Array<number>;\n\
             interface Bar extends Baz { x: number; }\n\
             const c = 1;",
        );
        assert!(matches!(program.body[0], Stmt::Empty));
        assert!(matches!(program.body[1], Stmt::Empty));
        assert!(matches!(program.body[2], Stmt::Declare(_)));
    }

    #[test]
    fn test_missing_paren_reports_position() {
        let err = parse_program(tokenize("describe('x', () => {", "bad.ts").unwrap(), "bad.ts")
            .unwrap_err();
        assert!(matches!(err, HarvestError::Parse { ref file, .. } if file == "bad.ts"));
    }
}
