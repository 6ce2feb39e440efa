//! Statement and expression parser
//!
//! Parses action/helper bodies such as:
//! - `const { board, isXNext } = state;`
//! - `if (board[params.index]) return;`
//! - `helpers.scheduleAction('tick', {}, 1000)`
//! - `return { board: next, status: \`Next player: ${mark}\` }`
//!
//! Precedence, lowest to highest: assignment / arrow, conditional, `??`,
//! `||`, `&&`, equality, relational, additive, multiplicative, `**`, unary,
//! postfix, call/member, primary.

use crate::parser::ast::{
    ArrayItem, AssignOp, BinaryOp, Binding, DeclarationKind, Expression, FunctionBody,
    FunctionDef, LogicalOp, ObjectPatternProperty, ObjectProperty, Pattern, Program, PropertyKey,
    Statement, TemplatePart, UnaryOp, UpdateOp,
};
use crate::parser::error::SparkletError;
use crate::parser::lexer::{Lexer, Span, SpannedToken, TemplateChunk, Token};
use crate::runtime::value::format_number;
use anyhow::{anyhow, Result};
use std::rc::Rc;

/// Deepest nesting of statements and expressions a body may use
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parses statements and programs (sequences of statements)
pub struct StatementParser {
    tokens: Vec<SpannedToken>,
    position: usize,
    depth: usize,
}

impl StatementParser {
    /// Create a new statement parser from input string
    pub fn new(input: &str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize_spanned()?;

        Ok(StatementParser {
            tokens,
            position: 0,
            depth: 0,
        })
    }

    /// Current token
    fn current(&self) -> &Token {
        self.peek_at(0)
    }

    /// Token `ahead` positions after the current one
    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.position + ahead)
            .map(|st| &st.token)
            .unwrap_or(&Token::Eof)
    }

    /// Current span (position in source)
    fn current_span(&self) -> Span {
        self.tokens
            .get(self.position)
            .map(|st| st.span)
            .unwrap_or_default()
    }

    /// Whether a line break precedes the current token
    fn newline_before(&self) -> bool {
        self.tokens
            .get(self.position)
            .map(|st| st.newline_before)
            .unwrap_or(false)
    }

    /// Advance to the next token
    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> anyhow::Error {
        SparkletError::new(message, self.current_span()).into()
    }

    /// Expect a specific token
    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected '{}', found '{}'",
                expected,
                self.current()
            )))
        }
    }

    /// Check if current token matches (without consuming)
    fn check(&self, token: &Token) -> bool {
        self.current() == token
    }

    /// Consume the current token if it matches
    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Run `parse` one nesting level deeper, failing past
    /// [`MAX_NESTING_DEPTH`] instead of exhausting the stack
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "Nesting exceeds the maximum depth of {}",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Statement terminator with automatic semicolon insertion
    fn consume_terminator(&mut self) -> Result<()> {
        match self.current() {
            Token::Semicolon => {
                self.advance();
                Ok(())
            }
            Token::RightBrace | Token::Eof => Ok(()),
            _ if self.newline_before() => Ok(()),
            other => Err(self.error(format!("Expected ';', found '{}'", other))),
        }
    }

    /// Parse a complete program (sequence of statements)
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::new();

        while !self.check(&Token::Eof) {
            match self.parse_statement()? {
                Statement::Empty => {}
                stmt => program.push(stmt),
            }
        }

        Ok(program)
    }

    /// Parse a single statement
    pub fn parse_statement(&mut self) -> Result<Statement> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Statement> {
        match self.current() {
            Token::Let | Token::Const | Token::Var => {
                let kind = self.declaration_kind();
                self.advance();
                let stmt = self.parse_declarators(kind, None)?;
                self.consume_terminator()?;
                Ok(stmt)
            }
            Token::Function if matches!(self.peek_at(1), Token::Identifier(_)) => {
                let def = self.parse_function()?;
                Ok(Statement::Function(def))
            }
            Token::If => self.parse_if_statement(),
            Token::While => self.parse_while_statement(),
            Token::For => self.parse_for_statement(),
            Token::Return => self.parse_return_statement(),
            Token::Break => {
                self.advance();
                self.consume_terminator()?;
                Ok(Statement::Break)
            }
            Token::Continue => {
                self.advance();
                self.consume_terminator()?;
                Ok(Statement::Continue)
            }
            Token::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            Token::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_terminator()?;
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn declaration_kind(&self) -> DeclarationKind {
        match self.current() {
            Token::Const => DeclarationKind::Const,
            Token::Var => DeclarationKind::Var,
            _ => DeclarationKind::Let,
        }
    }

    /// Parse `a = 1, { b } = obj` after the `let`/`const`/`var` keyword
    fn parse_declarators(
        &mut self,
        kind: DeclarationKind,
        first: Option<Pattern>,
    ) -> Result<Statement> {
        let mut declarations = Vec::new();
        let mut pending = first;

        loop {
            let pattern = match pending.take() {
                Some(pattern) => pattern,
                None => self.parse_binding_pattern()?,
            };
            let init = if self.eat(&Token::Equals) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            if init.is_none() {
                if kind == DeclarationKind::Const {
                    return Err(self.error("Missing initializer in const declaration"));
                }
                if !matches!(pattern, Pattern::Identifier(_)) {
                    return Err(self.error("Destructuring declaration needs an initializer"));
                }
            }

            declarations.push((pattern, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        Ok(Statement::Declaration { kind, declarations })
    }

    /// Parse a binding target: identifier, `{...}` or `[...]`
    fn parse_binding_pattern(&mut self) -> Result<Pattern> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(Pattern::Identifier(name))
            }
            Token::LeftBrace => {
                self.advance();
                let mut properties = Vec::new();
                while !self.check(&Token::RightBrace) {
                    let key = match self.current().clone() {
                        Token::Identifier(name) | Token::StringLiteral(name) => name,
                        other => {
                            return Err(self.error(format!(
                                "Expected property name in pattern, found '{}'",
                                other
                            )))
                        }
                    };
                    self.advance();
                    let pattern = if self.eat(&Token::Colon) {
                        self.parse_binding_pattern()?
                    } else {
                        Pattern::Identifier(key.clone())
                    };
                    let default = if self.eat(&Token::Equals) {
                        Some(self.parse_assignment()?)
                    } else {
                        None
                    };
                    properties.push(ObjectPatternProperty {
                        key,
                        binding: Binding { pattern, default },
                    });
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RightBrace)?;
                Ok(Pattern::Object(properties))
            }
            Token::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                loop {
                    if self.check(&Token::RightBracket) {
                        break;
                    }
                    if self.eat(&Token::Comma) {
                        items.push(None);
                        continue;
                    }
                    items.push(Some(self.parse_binding()?));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(&Token::RightBracket)?;
                Ok(Pattern::Array(items))
            }
            other => Err(self.error(format!("Expected binding name, found '{}'", other))),
        }
    }

    /// Pattern with an optional `= default`
    fn parse_binding(&mut self) -> Result<Binding> {
        let pattern = self.parse_binding_pattern()?;
        let default = if self.eat(&Token::Equals) {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        Ok(Binding { pattern, default })
    }

    /// Parse: { statements }
    fn parse_block(&mut self) -> Result<Vec<Statement>> {
        self.expect(&Token::LeftBrace)?;
        let mut statements = Vec::new();

        while !self.check(&Token::RightBrace) {
            if self.check(&Token::Eof) {
                return Err(self.error("Unexpected end of input, expected '}'"));
            }
            match self.parse_statement()? {
                Statement::Empty => {}
                stmt => statements.push(stmt),
            }
        }

        self.expect(&Token::RightBrace)?;
        Ok(statements)
    }

    /// Parse: if (test) stmt [else stmt]
    fn parse_if_statement(&mut self) -> Result<Statement> {
        self.expect(&Token::If)?;
        self.expect(&Token::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&Token::RightParen)?;

        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&Token::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::If {
            test,
            consequent,
            alternate,
        })
    }

    /// Parse: while (test) stmt
    fn parse_while_statement(&mut self) -> Result<Statement> {
        self.expect(&Token::While)?;
        self.expect(&Token::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&Token::RightParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While { test, body })
    }

    /// Parse the three `for` forms: C-style, `for...of`, `for...in`
    fn parse_for_statement(&mut self) -> Result<Statement> {
        self.expect(&Token::For)?;
        self.expect(&Token::LeftParen)?;

        let init = match self.current() {
            Token::Let | Token::Const | Token::Var => {
                let kind = self.declaration_kind();
                self.advance();
                let pattern = self.parse_binding_pattern()?;

                if self.eat(&Token::Of) {
                    let iterable = self.parse_expression()?;
                    self.expect(&Token::RightParen)?;
                    let body = Box::new(self.parse_statement()?);
                    return Ok(Statement::ForOf {
                        kind,
                        pattern,
                        iterable,
                        body,
                    });
                }
                if self.eat(&Token::In) {
                    let object = self.parse_expression()?;
                    self.expect(&Token::RightParen)?;
                    let body = Box::new(self.parse_statement()?);
                    return Ok(Statement::ForIn {
                        kind,
                        pattern,
                        object,
                        body,
                    });
                }

                Some(Box::new(self.parse_declarators(kind, Some(pattern))?))
            }
            Token::Semicolon => None,
            _ => Some(Box::new(Statement::Expression(self.parse_expression()?))),
        };
        self.expect(&Token::Semicolon)?;

        let test = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::Semicolon)?;

        let update = if self.check(&Token::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::RightParen)?;

        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For {
            init,
            test,
            update,
            body,
        })
    }

    /// Parse: return [expression]
    fn parse_return_statement(&mut self) -> Result<Statement> {
        self.expect(&Token::Return)?;

        let ends_here = matches!(
            self.current(),
            Token::Semicolon | Token::RightBrace | Token::Eof
        ) || self.newline_before();
        if ends_here {
            self.eat(&Token::Semicolon);
            return Ok(Statement::Return(None));
        }

        let value = self.parse_expression()?;
        self.consume_terminator()?;
        Ok(Statement::Return(Some(value)))
    }

    /// Parse: function [name](params) { body }
    fn parse_function(&mut self) -> Result<Rc<FunctionDef>> {
        self.expect(&Token::Function)?;
        let name = match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };
        let params = self.parse_params()?;
        let body = FunctionBody::Block(self.parse_block()?);
        Ok(Rc::new(FunctionDef { name, params, body }))
    }

    /// Parse: (a, { b }, c = 1)
    fn parse_params(&mut self) -> Result<Vec<Binding>> {
        self.expect(&Token::LeftParen)?;
        let mut params = Vec::new();
        while !self.check(&Token::RightParen) {
            params.push(self.parse_binding()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen)?;
        Ok(params)
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    /// Parse an expression
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_assignment()
    }

    /// Whether the tokens ahead start an arrow function
    fn arrow_ahead(&self) -> bool {
        match self.current() {
            Token::Identifier(_) => matches!(self.peek_at(1), Token::Arrow),
            Token::LeftParen => {
                let mut depth = 0usize;
                let mut ahead = 0usize;
                loop {
                    match self.peek_at(ahead) {
                        Token::LeftParen | Token::LeftBracket | Token::LeftBrace => depth += 1,
                        Token::RightParen | Token::RightBracket | Token::RightBrace => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(self.peek_at(ahead + 1), Token::Arrow);
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    ahead += 1;
                }
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<Expression> {
        let params = match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                vec![Binding::identifier(name)]
            }
            _ => self.parse_params()?,
        };
        self.expect(&Token::Arrow)?;

        let body = if self.check(&Token::LeftBrace) {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expression(Box::new(self.parse_assignment()?))
        };

        Ok(Expression::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    /// Grammar: assignment = arrow | conditional (assign_op assignment)?
    fn parse_assignment(&mut self) -> Result<Expression> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expression> {
        if self.arrow_ahead() {
            return self.parse_arrow_function();
        }

        let target = self.parse_conditional()?;
        let op = match self.current() {
            Token::Equals => AssignOp::Assign,
            Token::PlusEq => AssignOp::Add,
            Token::MinusEq => AssignOp::Subtract,
            Token::StarEq => AssignOp::Multiply,
            Token::SlashEq => AssignOp::Divide,
            Token::PercentEq => AssignOp::Remainder,
            Token::AndAndEq => AssignOp::And,
            Token::OrOrEq => AssignOp::Or,
            Token::QuestionQuestionEq => AssignOp::Nullish,
            _ => return Ok(target),
        };

        if !target.is_place() {
            return Err(self.error("Invalid assignment target"));
        }
        self.advance();
        let value = self.parse_assignment()?;

        Ok(Expression::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// Grammar: conditional = nullish ('?' assignment ':' assignment)?
    fn parse_conditional(&mut self) -> Result<Expression> {
        let test = self.parse_nullish()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(&Token::Colon)?;
        let alternate = self.parse_assignment()?;

        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_nullish(&mut self) -> Result<Expression> {
        let mut left = self.parse_or()?;
        while self.eat(&Token::QuestionQuestion) {
            let right = self.parse_or()?;
            left = Expression::logical(LogicalOp::Nullish, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expression::logical(LogicalOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = Expression::logical(LogicalOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current() {
                Token::EqEq => BinaryOp::Equal,
                Token::NotEq => BinaryOp::NotEqual,
                Token::EqEqEq => BinaryOp::StrictEqual,
                Token::NotEqEq => BinaryOp::StrictNotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expression::binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expression> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current() {
                Token::Less => BinaryOp::Less,
                Token::LessEq => BinaryOp::LessEqual,
                Token::Greater => BinaryOp::Greater,
                Token::GreaterEq => BinaryOp::GreaterEqual,
                Token::In => BinaryOp::In,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expression::binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.current() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Remainder,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_exponent()?;
            left = Expression::binary(op, left, right);
        }
    }

    /// `**` is right-associative
    fn parse_exponent(&mut self) -> Result<Expression> {
        let base = self.parse_unary()?;
        if self.eat(&Token::StarStar) {
            let exponent = self.nested(Self::parse_exponent)?;
            return Ok(Expression::binary(BinaryOp::Power, base, exponent));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let op = match self.current() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Negate,
            Token::Plus => UnaryOp::Plus,
            Token::Typeof => UnaryOp::Typeof,
            Token::PlusPlus | Token::MinusMinus => {
                let op = if self.check(&Token::PlusPlus) {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                self.advance();
                let target = self.nested(Self::parse_unary)?;
                if !target.is_place() {
                    return Err(self.error("Invalid increment/decrement target"));
                }
                return Ok(Expression::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let expr = self.parse_call_member()?;
        let op = match self.current() {
            Token::PlusPlus if !self.newline_before() => UpdateOp::Increment,
            Token::MinusMinus if !self.newline_before() => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if !expr.is_place() {
            return Err(self.error("Invalid increment/decrement target"));
        }
        self.advance();
        Ok(Expression::Update {
            op,
            prefix: false,
            target: Box::new(expr),
        })
    }

    /// Property names after `.` may be keywords (`obj.in`, `list.for`)
    fn parse_property_name(&mut self) -> Result<String> {
        let name = match self.current() {
            Token::Identifier(name) => name.clone(),
            Token::Let
            | Token::Const
            | Token::Var
            | Token::If
            | Token::Else
            | Token::For
            | Token::While
            | Token::Of
            | Token::In
            | Token::Return
            | Token::Break
            | Token::Continue
            | Token::Function
            | Token::True
            | Token::False
            | Token::Null
            | Token::Undefined
            | Token::Typeof => self.current().to_string(),
            other => return Err(self.error(format!("Expected property name, found '{}'", other))),
        };
        self.advance();
        Ok(name)
    }

    fn parse_call_member(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current() {
                Token::Dot => {
                    self.advance();
                    let property = self.parse_property_name()?;
                    expr = Expression::member(expr, property, false);
                }
                Token::QuestionDot => {
                    self.advance();
                    expr = match self.current() {
                        Token::LeftParen => Expression::Call {
                            callee: Box::new(expr),
                            args: self.parse_arguments()?,
                            optional: true,
                        },
                        Token::LeftBracket => {
                            self.advance();
                            let index = self.parse_expression()?;
                            self.expect(&Token::RightBracket)?;
                            Expression::Index {
                                object: Box::new(expr),
                                index: Box::new(index),
                                optional: true,
                            }
                        }
                        _ => {
                            let property = self.parse_property_name()?;
                            Expression::member(expr, property, true)
                        }
                    };
                }
                Token::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RightBracket)?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    };
                }
                Token::LeftParen => {
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        args: self.parse_arguments()?,
                        optional: false,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parse: (a, ...rest)
    fn parse_arguments(&mut self) -> Result<Vec<ArrayItem>> {
        self.expect(&Token::LeftParen)?;
        let mut args = Vec::new();
        while !self.check(&Token::RightParen) {
            if self.eat(&Token::Ellipsis) {
                args.push(ArrayItem::Spread(self.parse_assignment()?));
            } else {
                args.push(ArrayItem::Item(self.parse_assignment()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen)?;
        Ok(args)
    }

    /// Parse primary expressions (literals, identifiers, groups, functions)
    fn parse_primary(&mut self) -> Result<Expression> {
        let expr = match self.current().clone() {
            Token::Number(n) => Expression::Number(n),
            Token::StringLiteral(s) => Expression::String(s),
            Token::Template(chunks) => {
                self.advance();
                return self.parse_template(chunks);
            }
            Token::True => Expression::Boolean(true),
            Token::False => Expression::Boolean(false),
            Token::Null => Expression::Null,
            Token::Undefined => Expression::Undefined,
            Token::Identifier(name) => Expression::Identifier(name),
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                return Ok(expr);
            }
            Token::LeftBracket => return self.parse_array_literal(),
            Token::LeftBrace => return self.parse_object_literal(),
            Token::Function => return Ok(Expression::Function(self.parse_function()?)),
            other => return Err(self.error(format!("Unexpected token: '{}'", other))),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_template(&self, chunks: Vec<TemplateChunk>) -> Result<Expression> {
        let mut parts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk {
                TemplateChunk::Text(text) => parts.push(TemplatePart::Literal(text)),
                TemplateChunk::Code(source) => {
                    let expr = parse_expression_at(&source, self.depth + 1).map_err(|e| {
                        anyhow!("at {}: In template substitution: {}", self.current_span(), e)
                    })?;
                    parts.push(TemplatePart::Expression(expr));
                }
            }
        }
        Ok(Expression::Template(parts))
    }

    /// Parse: [a, , ...rest]
    fn parse_array_literal(&mut self) -> Result<Expression> {
        self.expect(&Token::LeftBracket)?;
        let mut items = Vec::new();

        loop {
            if self.check(&Token::RightBracket) {
                break;
            }
            if self.eat(&Token::Comma) {
                items.push(ArrayItem::Item(Expression::Undefined));
                continue;
            }
            if self.eat(&Token::Ellipsis) {
                items.push(ArrayItem::Spread(self.parse_assignment()?));
            } else {
                items.push(ArrayItem::Item(self.parse_assignment()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect(&Token::RightBracket)?;
        Ok(Expression::Array(items))
    }

    /// Parse: { a: 1, b, [key]: 2, ...rest, method() { } }
    fn parse_object_literal(&mut self) -> Result<Expression> {
        self.expect(&Token::LeftBrace)?;
        let mut properties = Vec::new();

        while !self.check(&Token::RightBrace) {
            if self.eat(&Token::Ellipsis) {
                properties.push(ObjectProperty::Spread(self.parse_assignment()?));
            } else if self.eat(&Token::LeftBracket) {
                let key = self.parse_assignment()?;
                self.expect(&Token::RightBracket)?;
                self.expect(&Token::Colon)?;
                let value = self.parse_assignment()?;
                properties.push(ObjectProperty::KeyValue(PropertyKey::Computed(key), value));
            } else {
                let (key, shorthand_allowed) = match self.current().clone() {
                    Token::StringLiteral(s) => {
                        self.advance();
                        (s, false)
                    }
                    Token::Number(n) => {
                        self.advance();
                        (format_number(n), false)
                    }
                    Token::Identifier(_) => (self.parse_property_name()?, true),
                    _ => (self.parse_property_name()?, false),
                };

                let value = if self.eat(&Token::Colon) {
                    self.parse_assignment()?
                } else if self.check(&Token::LeftParen) {
                    let params = self.parse_params()?;
                    let body = FunctionBody::Block(self.parse_block()?);
                    Expression::Function(Rc::new(FunctionDef {
                        name: Some(key.clone()),
                        params,
                        body,
                    }))
                } else if shorthand_allowed {
                    Expression::Identifier(key.clone())
                } else {
                    return Err(self.error(format!("Expected ':' after property '{}'", key)));
                };
                properties.push(ObjectProperty::KeyValue(PropertyKey::Static(key), value));
            }

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect(&Token::RightBrace)?;
        Ok(Expression::Object(properties))
    }
}

/// Parse a sequence of statements (an action or helper body)
pub fn parse_statements(input: &str) -> Result<Program> {
    let mut parser = StatementParser::new(input)?;
    parser.parse_program()
}

/// Parse a single expression; the whole input must be consumed
pub fn parse_expression(input: &str) -> Result<Expression> {
    parse_expression_at(input, 0)
}

/// Template substitutions are parsed separately but count toward the
/// nesting depth of the literal they sit in
fn parse_expression_at(input: &str, depth: usize) -> Result<Expression> {
    let mut parser = StatementParser::new(input)?;
    parser.depth = depth;
    let expr = parser.parse_expression()?;
    parser.eat(&Token::Semicolon);
    if !parser.check(&Token::Eof) {
        return Err(parser.error(format!(
            "Unexpected '{}' after expression",
            parser.current()
        )));
    }
    Ok(expr)
}
