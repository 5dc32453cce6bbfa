use crate::lexer::{LexError, Lexer, SpannedToken, StringKind, Token};
use crate::parser::ast::*;
use log::debug;
use thiserror::Error;

pub mod ast;

/// Deepest expression and block nesting the parser descends into
pub const MAX_NESTING: usize = 100;

/// Malformed source. Carries the line the parser stopped at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self {
            message: err.message,
            line: err.line,
        }
    }
}

/// Parses a whole source unit into a [`Tree`]
pub fn parse(source: &str) -> Result<Tree, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    debug!("tokenized source into {} tokens", tokens.len());
    let mut parser = Parser::new(tokens);
    parser.parse_module()
}

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    depth: usize,
    builder: TreeBuilder,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Newline => "newline".to_string(),
        Token::Indent => "indent".to_string(),
        Token::Dedent => "unindent".to_string(),
        Token::EOF => "end of file".to_string(),
        Token::Identifier(name) => format!("'{}'", name),
        Token::NumberLiteral(text) => format!("number {}", text),
        Token::StringLiteral { .. } => "string".to_string(),
        other => format!("{:?}", other),
    }
}

fn number_literal(text: &str) -> Literal {
    if text.ends_with('j') {
        return Literal::Imaginary(text.to_string());
    }

    let radix = match text.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u128::from_str_radix(&text[2..], radix)
            .map(Literal::Int)
            .unwrap_or_else(|_| Literal::BigInt(text.to_string()));
    }

    if text.contains(['.', 'e']) {
        return Literal::Float(text.parse().unwrap_or(f64::INFINITY));
    }

    text.parse::<u128>()
        .map(Literal::Int)
        .unwrap_or_else(|_| Literal::BigInt(text.to_string()))
}

/// Replacement fields of an f-string body as `(expression, line offset)`,
/// including fields nested in format specs. `None` when specs nest fields
/// more than one level deep.
fn format_fields(body: &str, nesting: usize) -> Option<Vec<(String, usize)>> {
    let chars: Vec<char> = body.chars().collect();
    let mut fields = Vec::new();
    let mut newlines = 0;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\n' => newlines += 1,
            '{' if chars.get(i + 1) == Some(&'{') => i += 1,
            '{' if nesting > 1 => return None,
            '{' => {
                let (expression, spec, end) = split_field(&chars, i + 1);
                fields.push((expression, newlines));
                for (nested, offset) in format_fields(&spec, nesting + 1)? {
                    fields.push((nested, newlines + offset));
                }
                newlines += chars[i..end].iter().filter(|c| **c == '\n').count();
                i = end;
            }
            _ => {}
        }
        i += 1;
    }

    Some(fields)
}

/// Splits one replacement field starting after its `{`. Returns the
/// expression text, the format spec and the index of the closing `}`.
fn split_field(chars: &[char], start: usize) -> (String, String, usize) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut expression_end = None;
    let mut spec_start = None;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '}' if depth == 0 => break,
                '}' => depth -= 1,
                '!' if depth == 0 && expression_end.is_none() && chars.get(i + 1) != Some(&'=') => {
                    expression_end = Some(i);
                }
                ':' if depth == 0 && spec_start.is_none() => {
                    expression_end.get_or_insert(i);
                    spec_start = Some(i + 1);
                }
                _ => {}
            }
        }
        i += 1;
    }

    let expression_end = expression_end.unwrap_or(i);
    let mut expression: String = chars[start..expression_end].iter().collect();

    // f"{x=}" self-documenting form
    let trimmed = expression.trim_end();
    if trimmed.ends_with('=') && !trimmed.ends_with("==") {
        let before = trimmed[..trimmed.len() - 1].chars().last();
        if !matches!(before, Some('!' | '<' | '>')) {
            expression = trimmed[..trimmed.len() - 1].to_string();
        }
    }

    let spec = match spec_start {
        Some(s) if s <= i => chars[s..i].iter().collect(),
        _ => String::new(),
    };

    (expression, spec, i)
}

fn bitwise_or_operator(token: &Token) -> Option<BinaryOperator> {
    match token {
        Token::BitwiseOr => Some(BinaryOperator::BitwiseOr),
        _ => None,
    }
}

fn bitwise_xor_operator(token: &Token) -> Option<BinaryOperator> {
    match token {
        Token::BitwiseXor => Some(BinaryOperator::BitwiseXor),
        _ => None,
    }
}

fn bitwise_and_operator(token: &Token) -> Option<BinaryOperator> {
    match token {
        Token::BitwiseAnd => Some(BinaryOperator::BitwiseAnd),
        _ => None,
    }
}

fn shift_operator(token: &Token) -> Option<BinaryOperator> {
    match token {
        Token::LeftShift => Some(BinaryOperator::LeftShift),
        Token::RightShift => Some(BinaryOperator::RightShift),
        _ => None,
    }
}

fn arith_operator(token: &Token) -> Option<BinaryOperator> {
    match token {
        Token::Plus => Some(BinaryOperator::Add),
        Token::Minus => Some(BinaryOperator::Subtract),
        _ => None,
    }
}

fn term_operator(token: &Token) -> Option<BinaryOperator> {
    match token {
        Token::Star => Some(BinaryOperator::Multiply),
        Token::Slash => Some(BinaryOperator::Divide),
        Token::DoubleSlash => Some(BinaryOperator::FloorDivide),
        Token::Percent => Some(BinaryOperator::Modulo),
        Token::At => Some(BinaryOperator::MatrixMultiply),
        _ => None,
    }
}

fn augmented_operator(token: &Token) -> Option<BinaryOperator> {
    let operator = match token {
        Token::PlusEqual => BinaryOperator::Add,
        Token::MinusEqual => BinaryOperator::Subtract,
        Token::StarEqual => BinaryOperator::Multiply,
        Token::DoubleStarEqual => BinaryOperator::Power,
        Token::SlashEqual => BinaryOperator::Divide,
        Token::DoubleSlashEqual => BinaryOperator::FloorDivide,
        Token::PercentEqual => BinaryOperator::Modulo,
        Token::AtEqual => BinaryOperator::MatrixMultiply,
        Token::BitwiseAndEqual => BinaryOperator::BitwiseAnd,
        Token::BitwiseOrEqual => BinaryOperator::BitwiseOr,
        Token::BitwiseXorEqual => BinaryOperator::BitwiseXor,
        Token::LeftShiftEqual => BinaryOperator::LeftShift,
        Token::RightShiftEqual => BinaryOperator::RightShift,
        _ => return None,
    };
    Some(operator)
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            builder: TreeBuilder::default(),
        }
    }

    /// Runs `parse` one nesting level deeper
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return self.error("too deeply nested");
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn current(&self) -> &Token {
        self.peek_token(0)
    }

    fn peek_token(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len().saturating_sub(1));
        self.tokens
            .get(index)
            .map(|t| &t.token)
            .unwrap_or(&Token::EOF)
    }

    fn line(&self) -> usize {
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        self.tokens.get(index).map(|t| t.line).unwrap_or(1)
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, token_type: &Token) -> bool {
        self.current() == token_type
    }

    fn match_token(&mut self, token_type: &Token) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, token_type: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(token_type) {
            self.advance();
            Ok(())
        } else {
            self.error(format!("{}, got {}", message, describe(self.current())))
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            line: self.line(),
        })
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        if let Token::Identifier(name) = self.current() {
            let result = name.clone();
            self.advance();
            Ok(result)
        } else {
            self.error(format!("expected {}, got {}", what, describe(self.current())))
        }
    }

    fn push(&mut self, kind: NodeKind, line: usize) -> NodeId {
        self.builder.push(kind, line)
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.current(),
            Token::Identifier(_)
                | Token::NumberLiteral(_)
                | Token::StringLiteral { .. }
                | Token::True
                | Token::False
                | Token::None
                | Token::Ellipsis
                | Token::LeftParen
                | Token::LeftBracket
                | Token::LeftBrace
                | Token::Minus
                | Token::Plus
                | Token::Tilde
                | Token::Not
                | Token::Lambda
                | Token::Await
                | Token::Star
        )
    }

    /// Re-tags an expression as an assignment or deletion target
    fn set_context(&mut self, id: NodeId, new_context: ExprContext) -> Result<(), ParseError> {
        let line = self.builder.line(id);
        match self.builder.kind_mut(id) {
            NodeKind::NameReference { context, .. }
            | NodeKind::Attribute { context, .. }
            | NodeKind::Subscript { context, .. } => {
                *context = new_context;
                Ok(())
            }
            NodeKind::Starred { value, context } => {
                *context = new_context;
                let value = *value;
                self.set_context(value, new_context)
            }
            NodeKind::Tuple { elements, context } | NodeKind::List { elements, context } => {
                *context = new_context;
                let elements = elements.clone();
                for element in elements {
                    self.set_context(element, new_context)?;
                }
                Ok(())
            }
            _ => Err(ParseError {
                message: if new_context == ExprContext::Del {
                    "cannot delete expression".to_string()
                } else {
                    "cannot assign to expression".to_string()
                },
                line,
            }),
        }
    }

    pub fn parse_module(&mut self) -> Result<Tree, ParseError> {
        let mut body = Vec::new();

        while !self.check(&Token::EOF) {
            if self.match_token(&Token::Newline) {
                continue;
            }
            body.extend(self.parse_statement()?);
        }

        let root = self.push(NodeKind::Module { body }, 1);
        let builder = std::mem::take(&mut self.builder);
        Ok(builder.finish(root))
    }

    fn parse_statement(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let line = self.line();
        let statement = match self.current() {
            Token::If => self.parse_if_statement()?,
            Token::While => self.parse_while_statement()?,
            Token::For => self.parse_for_statement(false, line)?,
            Token::Try => self.parse_try_statement()?,
            Token::With => self.parse_with_statement(false, line)?,
            Token::Def => self.parse_function_definition(Vec::new(), false, line)?,
            Token::Class => self.parse_class_definition(Vec::new(), line)?,
            Token::At => self.parse_decorated()?,
            Token::Async => {
                self.advance(); // Consume 'async'
                match self.current() {
                    Token::Def => self.parse_function_definition(Vec::new(), true, line)?,
                    Token::For => self.parse_for_statement(true, line)?,
                    Token::With => self.parse_with_statement(true, line)?,
                    other => {
                        return self.error(format!(
                            "expected 'def', 'for' or 'with' after 'async', got {}",
                            describe(other)
                        ));
                    }
                }
            }
            Token::Indent => return self.error("unexpected indent"),
            _ => return self.parse_simple_statements(),
        };
        Ok(vec![statement])
    }

    /// One logical line of `;`-separated simple statements
    fn parse_simple_statements(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut statements = vec![self.parse_small_statement()?];

        while self.match_token(&Token::Semicolon) {
            if self.check(&Token::Newline) {
                break;
            }
            statements.push(self.parse_small_statement()?);
        }

        self.consume(&Token::Newline, "invalid syntax: expected end of statement")?;
        Ok(statements)
    }

    /// `':' suite`, either an indented block or statements on the same line
    fn parse_block(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.consume(&Token::Colon, "expected ':'")?;

        if !self.match_token(&Token::Newline) {
            return self.parse_simple_statements();
        }
        if !self.match_token(&Token::Indent) {
            return self.error("expected an indented block");
        }

        self.nested(|parser| {
            let mut statements = Vec::new();
            while !parser.check(&Token::Dedent) && !parser.check(&Token::EOF) {
                statements.extend(parser.parse_statement()?);
            }
            parser.match_token(&Token::Dedent);
            Ok(statements)
        })
    }

    fn parse_if_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume 'if' or 'elif'

        let test = self.parse_named_expression()?;
        let body = self.parse_block()?;

        let orelse = if self.check(&Token::Elif) {
            vec![self.parse_if_statement()?]
        } else if self.match_token(&Token::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };

        Ok(self.push(NodeKind::If { test, body, orelse }, line))
    }

    fn parse_while_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume 'while'

        let test = self.parse_named_expression()?;
        let body = self.parse_block()?;
        let orelse = if self.match_token(&Token::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };

        Ok(self.push(NodeKind::While { test, body, orelse }, line))
    }

    fn parse_for_statement(&mut self, is_async: bool, line: usize) -> Result<NodeId, ParseError> {
        self.advance(); // Consume 'for'

        let target = self.parse_target_list()?;
        self.consume(&Token::In, "expected 'in' after for-loop target")?;
        let iter = self.parse_star_expressions()?;
        let body = self.parse_block()?;
        let orelse = if self.match_token(&Token::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };

        Ok(self.push(
            NodeKind::For {
                is_async,
                target,
                iter,
                body,
                orelse,
            },
            line,
        ))
    }

    fn parse_try_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume 'try'

        let body = self.parse_block()?;

        let mut handlers = Vec::new();
        while self.check(&Token::Except) {
            let handler_line = self.line();
            self.advance(); // Consume 'except'
            self.match_token(&Token::Star);

            let (exception_type, name) = if self.check(&Token::Colon) {
                (None, None)
            } else {
                let exception_type = self.parse_test()?;
                let name = if self.match_token(&Token::As) {
                    Some(self.expect_identifier("exception name")?)
                } else {
                    None
                };
                (Some(exception_type), name)
            };

            let handler_body = self.parse_block()?;
            handlers.push(self.push(
                NodeKind::ExceptHandler {
                    exception_type,
                    name,
                    body: handler_body,
                },
                handler_line,
            ));
        }

        let orelse = if !handlers.is_empty() && self.match_token(&Token::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };

        let has_finally = self.match_token(&Token::Finally);
        let finalbody = if has_finally {
            self.parse_block()?
        } else {
            Vec::new()
        };

        if handlers.is_empty() && !has_finally {
            return self.error("expected 'except' or 'finally' block");
        }

        Ok(self.push(
            NodeKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            line,
        ))
    }

    fn parse_with_statement(&mut self, is_async: bool, line: usize) -> Result<NodeId, ParseError> {
        self.advance(); // Consume 'with'

        let mut items = Vec::new();
        loop {
            let item_line = self.line();
            let context = self.parse_test()?;
            let target = if self.match_token(&Token::As) {
                let target = self.parse_star_or_expression()?;
                self.set_context(target, ExprContext::Store)?;
                Some(target)
            } else {
                None
            };
            items.push(self.push(NodeKind::WithItem { context, target }, item_line));

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        let body = self.parse_block()?;
        Ok(self.push(
            NodeKind::With {
                is_async,
                items,
                body,
            },
            line,
        ))
    }

    fn parse_decorated(&mut self) -> Result<NodeId, ParseError> {
        // The node starts at the first decorator
        let line = self.line();

        let mut decorators = Vec::new();
        while self.match_token(&Token::At) {
            decorators.push(self.parse_named_expression()?);
            self.consume(&Token::Newline, "expected newline after decorator")?;
        }

        match self.current() {
            Token::Def => self.parse_function_definition(decorators, false, line),
            Token::Class => self.parse_class_definition(decorators, line),
            Token::Async => {
                self.advance(); // Consume 'async'
                if !self.check(&Token::Def) {
                    return self.error("expected 'def' after 'async'");
                }
                self.parse_function_definition(decorators, true, line)
            }
            other => self.error(format!(
                "expected function or class after decorator, got {}",
                describe(other)
            )),
        }
    }

    fn parse_function_definition(
        &mut self,
        decorators: Vec<NodeId>,
        is_async: bool,
        line: usize,
    ) -> Result<NodeId, ParseError> {
        let keyword_line = self.line();
        self.advance(); // Consume 'def'

        let name = self.expect_identifier("function name")?;

        self.consume(&Token::LeftParen, "expected '(' after function name")?;
        let parameters = self.parse_parameter_list(&Token::RightParen, true)?;
        self.consume(&Token::RightParen, "expected ')' after parameters")?;

        let returns = if self.match_token(&Token::Arrow) {
            Some(self.parse_test()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(self.push(
            NodeKind::FunctionDefinition {
                name,
                keyword_line,
                is_async,
                decorators,
                parameters,
                returns,
                body,
            },
            line,
        ))
    }

    /// Parameters up to (not including) `closing`. Lambdas pass
    /// `annotated = false` because their parameters end at ':'.
    fn parse_parameter_list(
        &mut self,
        closing: &Token,
        annotated: bool,
    ) -> Result<Vec<Parameter>, ParseError> {
        let mut parameters: Vec<Parameter> = Vec::new();
        let mut keyword_only = false;

        while !self.check(closing) {
            let line = self.line();

            if self.match_token(&Token::Slash) {
                for parameter in parameters.iter_mut() {
                    if parameter.kind == ParameterKind::Positional {
                        parameter.kind = ParameterKind::PositionalOnly;
                    }
                }
            } else if self.match_token(&Token::DoubleStar) {
                let name = self.expect_identifier("parameter name")?;
                let annotation = self.parse_annotation(annotated)?;
                parameters.push(Parameter {
                    name,
                    kind: ParameterKind::VarKeyword,
                    annotation,
                    default: None,
                    line,
                });
            } else if self.match_token(&Token::Star) {
                keyword_only = true;
                if let Token::Identifier(_) = self.current() {
                    let name = self.expect_identifier("parameter name")?;
                    let annotation = self.parse_annotation(annotated)?;
                    parameters.push(Parameter {
                        name,
                        kind: ParameterKind::VarPositional,
                        annotation,
                        default: None,
                        line,
                    });
                }
            } else {
                let name = self.expect_identifier("parameter name")?;
                let annotation = self.parse_annotation(annotated)?;
                let default = if self.match_token(&Token::Equal) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                parameters.push(Parameter {
                    name,
                    kind: if keyword_only {
                        ParameterKind::KeywordOnly
                    } else {
                        ParameterKind::Positional
                    },
                    annotation,
                    default,
                    line,
                });
            }

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(parameters)
    }

    fn parse_annotation(&mut self, annotated: bool) -> Result<Option<NodeId>, ParseError> {
        if annotated && self.match_token(&Token::Colon) {
            Ok(Some(self.parse_test()?))
        } else {
            Ok(None)
        }
    }

    fn parse_class_definition(
        &mut self,
        decorators: Vec<NodeId>,
        line: usize,
    ) -> Result<NodeId, ParseError> {
        let keyword_line = self.line();
        self.advance(); // Consume 'class'

        let name = self.expect_identifier("class name")?;

        let (bases, keywords) = if self.match_token(&Token::LeftParen) {
            self.parse_call_arguments()?
        } else {
            (Vec::new(), Vec::new())
        };

        let body = self.parse_block()?;

        Ok(self.push(
            NodeKind::ClassDefinition {
                name,
                keyword_line,
                decorators,
                bases,
                keywords,
                body,
            },
            line,
        ))
    }

    fn parse_small_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();

        let kind = match self.current() {
            Token::Pass => {
                self.advance();
                NodeKind::Pass
            }
            Token::Break => {
                self.advance();
                NodeKind::Break
            }
            Token::Continue => {
                self.advance();
                NodeKind::Continue
            }
            Token::Return => {
                self.advance(); // Consume 'return'
                let value = if self.starts_expression() {
                    Some(self.parse_star_expressions()?)
                } else {
                    None
                };
                NodeKind::Return { value }
            }
            Token::Raise => {
                self.advance(); // Consume 'raise'
                let (exception, cause) = if self.starts_expression() {
                    let exception = self.parse_test()?;
                    let cause = if self.match_token(&Token::From) {
                        Some(self.parse_test()?)
                    } else {
                        None
                    };
                    (Some(exception), cause)
                } else {
                    (None, None)
                };
                NodeKind::Raise { exception, cause }
            }
            Token::Global => {
                self.advance();
                NodeKind::Global {
                    names: self.parse_name_list()?,
                }
            }
            Token::Nonlocal => {
                self.advance();
                NodeKind::Nonlocal {
                    names: self.parse_name_list()?,
                }
            }
            Token::Del => {
                self.advance(); // Consume 'del'
                let mut targets = Vec::new();
                loop {
                    let target = self.parse_star_or_expression()?;
                    self.set_context(target, ExprContext::Del)?;
                    targets.push(target);
                    if !self.match_token(&Token::Comma) || !self.starts_expression() {
                        break;
                    }
                }
                NodeKind::Delete { targets }
            }
            Token::Assert => {
                self.advance(); // Consume 'assert'
                let test = self.parse_test()?;
                let message = if self.match_token(&Token::Comma) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                NodeKind::Assert { test, message }
            }
            Token::Import => self.parse_import()?,
            Token::From => self.parse_from_import()?,
            _ => return self.parse_expression_statement(),
        };

        Ok(self.push(kind, line))
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = vec![self.expect_identifier("name")?];
        while self.match_token(&Token::Comma) {
            names.push(self.expect_identifier("name")?);
        }
        Ok(names)
    }

    fn parse_dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_identifier("module name")?;
        while self.match_token(&Token::Dot) {
            name.push('.');
            name.push_str(&self.expect_identifier("module name")?);
        }
        Ok(name)
    }

    fn parse_import(&mut self) -> Result<NodeKind, ParseError> {
        self.advance(); // Consume 'import'

        let mut names = Vec::new();
        loop {
            let name = self.parse_dotted_name()?;
            let asname = if self.match_token(&Token::As) {
                Some(self.expect_identifier("alias")?)
            } else {
                None
            };
            names.push(Alias { name, asname });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(NodeKind::Import { names })
    }

    fn parse_from_import(&mut self) -> Result<NodeKind, ParseError> {
        self.advance(); // Consume 'from'

        let mut level = 0;
        loop {
            if self.match_token(&Token::Dot) {
                level += 1;
            } else if self.match_token(&Token::Ellipsis) {
                level += 3;
            } else {
                break;
            }
        }

        let module = if let Token::Identifier(_) = self.current() {
            Some(self.parse_dotted_name()?)
        } else {
            None
        };
        if module.is_none() && level == 0 {
            return self.error("expected module name after 'from'");
        }

        self.consume(&Token::Import, "expected 'import'")?;

        let mut names = Vec::new();
        if self.match_token(&Token::Star) {
            names.push(Alias {
                name: "*".to_string(),
                asname: None,
            });
        } else {
            let parenthesized = self.match_token(&Token::LeftParen);
            loop {
                let name = self.expect_identifier("imported name")?;
                let asname = if self.match_token(&Token::As) {
                    Some(self.expect_identifier("alias")?)
                } else {
                    None
                };
                names.push(Alias { name, asname });

                if !self.match_token(&Token::Comma) {
                    break;
                }
                if parenthesized && self.check(&Token::RightParen) {
                    break;
                }
            }
            if parenthesized {
                self.consume(&Token::RightParen, "expected ')' after imported names")?;
            }
        }

        Ok(NodeKind::ImportFrom {
            module,
            names,
            level,
        })
    }

    fn parse_assigned_value(&mut self) -> Result<NodeId, ParseError> {
        if self.check(&Token::Yield) {
            self.parse_yield_expression()
        } else {
            self.parse_star_expressions()
        }
    }

    fn parse_expression_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let first = self.parse_assigned_value()?;

        if self.check(&Token::Equal) {
            let mut targets = vec![first];
            while self.match_token(&Token::Equal) {
                targets.push(self.parse_assigned_value()?);
            }
            let Some(value) = targets.pop() else {
                return self.error("invalid assignment");
            };
            for target in &targets {
                self.set_context(*target, ExprContext::Store)?;
            }
            return Ok(self.push(NodeKind::Assignment { targets, value }, line));
        }

        if let Some(operator) = augmented_operator(self.current()) {
            self.advance();
            if !matches!(
                self.builder.kind(first),
                NodeKind::NameReference { .. } | NodeKind::Attribute { .. } | NodeKind::Subscript { .. }
            ) {
                return self.error("illegal expression for augmented assignment");
            }
            self.set_context(first, ExprContext::Store)?;
            let value = self.parse_assigned_value()?;
            return Ok(self.push(
                NodeKind::AugmentedAssignment {
                    target: first,
                    operator,
                    value,
                },
                line,
            ));
        }

        if self.match_token(&Token::Colon) {
            if !matches!(
                self.builder.kind(first),
                NodeKind::NameReference { .. } | NodeKind::Attribute { .. } | NodeKind::Subscript { .. }
            ) {
                return self.error("only single target (not tuple) can be annotated");
            }
            self.set_context(first, ExprContext::Store)?;
            let annotation = self.parse_test()?;
            let value = if self.match_token(&Token::Equal) {
                Some(self.parse_assigned_value()?)
            } else {
                None
            };
            return Ok(self.push(
                NodeKind::AnnotatedAssignment {
                    target: first,
                    annotation,
                    value,
                },
                line,
            ));
        }

        Ok(self.push(NodeKind::ExpressionStatement { value: first }, line))
    }

    /// Comma-separated targets of `for` loops and comprehensions
    fn parse_target_list(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let first = self.parse_star_or_expression()?;

        let target = if self.check(&Token::Comma) {
            let mut elements = vec![first];
            while self.match_token(&Token::Comma) {
                if !self.starts_expression() {
                    break;
                }
                elements.push(self.parse_star_or_expression()?);
            }
            self.push(
                NodeKind::Tuple {
                    elements,
                    context: ExprContext::Load,
                },
                line,
            )
        } else {
            first
        };

        self.set_context(target, ExprContext::Store)?;
        Ok(target)
    }

    /// Expression list that becomes a tuple when it contains a comma
    fn parse_star_expressions(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let first = self.parse_star_or_test()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }

        let mut elements = vec![first];
        while self.match_token(&Token::Comma) {
            if !self.starts_expression() {
                break;
            }
            elements.push(self.parse_star_or_test()?);
        }

        Ok(self.push(
            NodeKind::Tuple {
                elements,
                context: ExprContext::Load,
            },
            line,
        ))
    }

    fn parse_starred(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume '*'
        let value = self.parse_bitwise_or()?;
        Ok(self.push(
            NodeKind::Starred {
                value,
                context: ExprContext::Load,
            },
            line,
        ))
    }

    fn parse_star_or_test(&mut self) -> Result<NodeId, ParseError> {
        if self.check(&Token::Star) {
            self.parse_starred()
        } else {
            self.parse_test()
        }
    }

    fn parse_star_or_named(&mut self) -> Result<NodeId, ParseError> {
        if self.check(&Token::Star) {
            self.parse_starred()
        } else {
            self.parse_named_expression()
        }
    }

    fn parse_star_or_expression(&mut self) -> Result<NodeId, ParseError> {
        if self.check(&Token::Star) {
            self.parse_starred()
        } else {
            self.parse_bitwise_or()
        }
    }

    fn parse_named_expression(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let expression = self.parse_test()?;

        if !self.check(&Token::ColonEqual) {
            return Ok(expression);
        }
        if !matches!(self.builder.kind(expression), NodeKind::NameReference { .. }) {
            return self.error("cannot use assignment expressions with expression");
        }
        self.advance(); // Consume ':='
        self.set_context(expression, ExprContext::Store)?;
        let value = self.parse_test()?;

        Ok(self.push(
            NodeKind::NamedExpression {
                target: expression,
                value,
            },
            line,
        ))
    }

    fn parse_test(&mut self) -> Result<NodeId, ParseError> {
        if self.check(&Token::Lambda) {
            return self.nested(Self::parse_lambda);
        }

        let line = self.line();
        let body = self.parse_or_test()?;

        if !self.match_token(&Token::If) {
            return Ok(body);
        }
        let test = self.parse_or_test()?;
        self.consume(&Token::Else, "expected 'else' after 'if' expression")?;
        let orelse = self.nested(Self::parse_test)?;

        Ok(self.push(NodeKind::IfExpression { test, body, orelse }, line))
    }

    fn parse_lambda(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume 'lambda'

        let parameters = self.parse_parameter_list(&Token::Colon, false)?;
        self.consume(&Token::Colon, "expected ':' after lambda parameters")?;
        let body = self.parse_test()?;

        Ok(self.push(NodeKind::Lambda { parameters, body }, line))
    }

    fn parse_or_test(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let mut values = vec![self.parse_and_test()?];

        while self.match_token(&Token::Or) {
            values.push(self.parse_and_test()?);
        }

        if values.len() == 1 {
            return Ok(values[0]);
        }
        Ok(self.push(
            NodeKind::BoolOp {
                operator: BoolOperator::Or,
                values,
            },
            line,
        ))
    }

    fn parse_and_test(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let mut values = vec![self.parse_not_test()?];

        while self.match_token(&Token::And) {
            values.push(self.parse_not_test()?);
        }

        if values.len() == 1 {
            return Ok(values[0]);
        }
        Ok(self.push(
            NodeKind::BoolOp {
                operator: BoolOperator::And,
                values,
            },
            line,
        ))
    }

    fn parse_not_test(&mut self) -> Result<NodeId, ParseError> {
        if !self.check(&Token::Not) {
            return self.parse_comparison();
        }

        let line = self.line();
        self.advance(); // Consume 'not'
        let operand = self.nested(Self::parse_not_test)?;
        Ok(self.push(
            NodeKind::UnaryOp {
                operator: UnaryOperator::Not,
                operand,
            },
            line,
        ))
    }

    fn parse_comparison(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let left = self.parse_bitwise_or()?;

        let mut operators = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let operator = match self.current() {
                Token::Less => CompareOperator::LessThan,
                Token::LessEqual => CompareOperator::LessThanOrEqual,
                Token::Greater => CompareOperator::GreaterThan,
                Token::GreaterEqual => CompareOperator::GreaterThanOrEqual,
                Token::EqualEqual => CompareOperator::Equal,
                Token::NotEqual => CompareOperator::NotEqual,
                Token::In => CompareOperator::In,
                Token::Not if *self.peek_token(1) == Token::In => {
                    self.advance(); // Consume 'not'
                    CompareOperator::NotIn
                }
                Token::Is if *self.peek_token(1) == Token::Not => {
                    self.advance(); // Consume 'is'
                    CompareOperator::IsNot
                }
                Token::Is => CompareOperator::Is,
                _ => break,
            };
            self.advance();

            operators.push(operator);
            comparators.push(self.parse_bitwise_or()?);
        }

        if operators.is_empty() {
            return Ok(left);
        }
        Ok(self.push(
            NodeKind::Compare {
                left,
                operators,
                comparators,
            },
            line,
        ))
    }

    /// One left-associative binary precedence level
    fn parse_binary_level(
        &mut self,
        operator_for: fn(&Token) -> Option<BinaryOperator>,
        next: fn(&mut Self) -> Result<NodeId, ParseError>,
    ) -> Result<NodeId, ParseError> {
        let line = self.line();
        let mut left = next(self)?;

        while let Some(operator) = operator_for(self.current()) {
            self.advance();
            let right = next(self)?;
            left = self.push(
                NodeKind::BinaryOp {
                    left,
                    operator,
                    right,
                },
                line,
            );
        }

        Ok(left)
    }

    fn parse_bitwise_or(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary_level(bitwise_or_operator, Self::parse_bitwise_xor)
    }

    fn parse_bitwise_xor(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary_level(bitwise_xor_operator, Self::parse_bitwise_and)
    }

    fn parse_bitwise_and(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary_level(bitwise_and_operator, Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary_level(shift_operator, Self::parse_arith)
    }

    fn parse_arith(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary_level(arith_operator, Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary_level(term_operator, Self::parse_factor)
    }

    // Every bracket, call, subscript and unary operator passes through here
    fn parse_factor(&mut self) -> Result<NodeId, ParseError> {
        self.nested(|parser| {
            let operator = match parser.current() {
                Token::Plus => UnaryOperator::Positive,
                Token::Minus => UnaryOperator::Negative,
                Token::Tilde => UnaryOperator::Invert,
                _ => return parser.parse_power(),
            };

            let line = parser.line();
            parser.advance();
            let operand = parser.parse_factor()?;
            Ok(parser.push(NodeKind::UnaryOp { operator, operand }, line))
        })
    }

    fn parse_power(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let base = self.parse_await_primary()?;

        if !self.match_token(&Token::DoubleStar) {
            return Ok(base);
        }
        let exponent = self.parse_factor()?;
        Ok(self.push(
            NodeKind::BinaryOp {
                left: base,
                operator: BinaryOperator::Power,
                right: exponent,
            },
            line,
        ))
    }

    fn parse_await_primary(&mut self) -> Result<NodeId, ParseError> {
        if !self.check(&Token::Await) {
            return self.parse_primary();
        }

        let line = self.line();
        self.advance(); // Consume 'await'
        let value = self.parse_primary()?;
        Ok(self.push(NodeKind::Await { value }, line))
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let mut expression = self.parse_atom()?;

        loop {
            if self.match_token(&Token::LeftParen) {
                let (arguments, keywords) = self.parse_call_arguments()?;
                expression = self.push(
                    NodeKind::Call {
                        function: expression,
                        arguments,
                        keywords,
                    },
                    line,
                );
            } else if self.match_token(&Token::LeftBracket) {
                let slice = self.parse_subscript_list()?;
                self.consume(&Token::RightBracket, "expected ']'")?;
                expression = self.push(
                    NodeKind::Subscript {
                        value: expression,
                        slice,
                        context: ExprContext::Load,
                    },
                    line,
                );
            } else if self.match_token(&Token::Dot) {
                let attribute = self.expect_identifier("attribute name")?;
                expression = self.push(
                    NodeKind::Attribute {
                        value: expression,
                        attribute,
                        context: ExprContext::Load,
                    },
                    line,
                );
            } else {
                break;
            }
        }

        Ok(expression)
    }

    /// Arguments after an opening '(' through the closing ')'
    fn parse_call_arguments(&mut self) -> Result<(Vec<NodeId>, Vec<NodeId>), ParseError> {
        let mut arguments = Vec::new();
        let mut keywords = Vec::new();

        while !self.check(&Token::RightParen) {
            let line = self.line();

            if self.match_token(&Token::DoubleStar) {
                let value = self.parse_test()?;
                keywords.push(self.push(NodeKind::Keyword { name: None, value }, line));
            } else if self.check(&Token::Star) {
                arguments.push(self.parse_starred()?);
            } else if matches!(self.current(), Token::Identifier(_))
                && *self.peek_token(1) == Token::Equal
            {
                let name = self.expect_identifier("keyword")?;
                self.advance(); // Consume '='
                let value = self.parse_test()?;
                keywords.push(self.push(
                    NodeKind::Keyword {
                        name: Some(name),
                        value,
                    },
                    line,
                ));
            } else {
                let value = self.parse_named_expression()?;
                if self.check(&Token::For) || self.check(&Token::Async) {
                    let generators = self.parse_comprehension_clauses()?;
                    arguments.push(self.push(
                        NodeKind::Comprehension {
                            kind: ComprehensionKind::Generator,
                            element: value,
                            value: None,
                            generators,
                        },
                        line,
                    ));
                } else {
                    arguments.push(value);
                }
            }

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RightParen, "expected ')' after arguments")?;
        Ok((arguments, keywords))
    }

    fn parse_subscript_list(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let first = self.parse_subscript_item()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }

        let mut elements = vec![first];
        while self.match_token(&Token::Comma) {
            if self.check(&Token::RightBracket) {
                break;
            }
            elements.push(self.parse_subscript_item()?);
        }

        Ok(self.push(
            NodeKind::Tuple {
                elements,
                context: ExprContext::Load,
            },
            line,
        ))
    }

    fn parse_subscript_item(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        if self.check(&Token::Star) {
            return self.parse_starred();
        }

        let lower = if self.check(&Token::Colon) {
            None
        } else {
            let expression = self.parse_named_expression()?;
            if !self.check(&Token::Colon) {
                return Ok(expression);
            }
            Some(expression)
        };
        self.advance(); // Consume ':'

        let ends_item = |parser: &Self| {
            matches!(
                parser.current(),
                Token::Colon | Token::RightBracket | Token::Comma
            )
        };

        let upper = if ends_item(&*self) {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.match_token(&Token::Colon) && !ends_item(&*self) {
            Some(self.parse_test()?)
        } else {
            None
        };

        Ok(self.push(NodeKind::Slice { lower, upper, step }, line))
    }

    fn parse_atom(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();

        let kind = match self.current() {
            Token::Identifier(id) => NodeKind::NameReference {
                id: id.clone(),
                context: ExprContext::Load,
            },
            Token::NumberLiteral(text) => NodeKind::Literal(number_literal(text)),
            Token::True => NodeKind::Literal(Literal::Bool(true)),
            Token::False => NodeKind::Literal(Literal::Bool(false)),
            Token::None => NodeKind::Literal(Literal::None),
            Token::Ellipsis => NodeKind::Literal(Literal::Ellipsis),
            Token::StringLiteral { .. } => return self.parse_strings(),
            Token::LeftParen => return self.parse_parenthesized(),
            Token::LeftBracket => return self.parse_list_display(),
            Token::LeftBrace => return self.parse_brace_display(),
            other => {
                return self.error(format!("invalid syntax: unexpected {}", describe(other)));
            }
        };

        self.advance();
        Ok(self.push(kind, line))
    }

    /// Adjacent string literals concatenate into one node
    fn parse_strings(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        let mut text = String::new();
        let mut is_bytes = false;
        let mut formatted = false;
        let mut values = Vec::new();

        while let Token::StringLiteral { value, kind } = self.current() {
            let (value, kind) = (value.clone(), *kind);
            let token_line = self.line();
            self.advance();

            match kind {
                StringKind::Str => text.push_str(&value),
                StringKind::Bytes => {
                    is_bytes = true;
                    text.push_str(&value);
                }
                StringKind::Format => {
                    formatted = true;
                    let Some(fields) = format_fields(&value, 0) else {
                        return Err(ParseError {
                            message: "f-string: expressions nested too deeply".to_string(),
                            line: token_line,
                        });
                    };
                    for (expression, offset) in fields {
                        values.push(self.parse_embedded(&expression, token_line + offset)?);
                    }
                }
            }
        }

        let kind = if formatted {
            NodeKind::FormattedString { values }
        } else if is_bytes {
            NodeKind::Literal(Literal::Bytes(text))
        } else {
            NodeKind::Literal(Literal::Str(text))
        };
        Ok(self.push(kind, line))
    }

    /// Parses an expression lifted out of an f-string into the same arena
    fn parse_embedded(&mut self, source: &str, line: usize) -> Result<NodeId, ParseError> {
        if source.trim().is_empty() {
            return Err(ParseError {
                message: "f-string: empty expression not allowed".to_string(),
                line,
            });
        }

        let wrapped = format!("({})", source.trim());
        let tokens = Lexer::new(&wrapped).with_line_offset(line).tokenize()?;

        let saved_tokens = std::mem::replace(&mut self.tokens, tokens);
        let saved_pos = std::mem::replace(&mut self.pos, 0);
        let result = self.parse_star_expressions();
        let complete = self.check(&Token::Newline);
        self.tokens = saved_tokens;
        self.pos = saved_pos;

        let expression = result?;
        if !complete {
            return Err(ParseError {
                message: "f-string: invalid syntax".to_string(),
                line,
            });
        }
        Ok(expression)
    }

    fn parse_parenthesized(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume '('

        if self.match_token(&Token::RightParen) {
            return Ok(self.push(
                NodeKind::Tuple {
                    elements: Vec::new(),
                    context: ExprContext::Load,
                },
                line,
            ));
        }

        if self.check(&Token::Yield) {
            let expression = self.parse_yield_expression()?;
            self.consume(&Token::RightParen, "expected ')'")?;
            return Ok(expression);
        }

        let first = self.parse_star_or_named()?;

        if self.check(&Token::For) || self.check(&Token::Async) {
            let generators = self.parse_comprehension_clauses()?;
            self.consume(&Token::RightParen, "expected ')' after generator expression")?;
            return Ok(self.push(
                NodeKind::Comprehension {
                    kind: ComprehensionKind::Generator,
                    element: first,
                    value: None,
                    generators,
                },
                line,
            ));
        }

        // Plain grouping
        if self.match_token(&Token::RightParen) {
            return Ok(first);
        }

        let mut elements = vec![first];
        while self.match_token(&Token::Comma) {
            if self.check(&Token::RightParen) {
                break;
            }
            elements.push(self.parse_star_or_named()?);
        }
        self.consume(&Token::RightParen, "expected ')'")?;

        Ok(self.push(
            NodeKind::Tuple {
                elements,
                context: ExprContext::Load,
            },
            line,
        ))
    }

    fn parse_list_display(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume '['

        if self.match_token(&Token::RightBracket) {
            return Ok(self.push(
                NodeKind::List {
                    elements: Vec::new(),
                    context: ExprContext::Load,
                },
                line,
            ));
        }

        let first = self.parse_star_or_named()?;

        if self.check(&Token::For) || self.check(&Token::Async) {
            let generators = self.parse_comprehension_clauses()?;
            self.consume(&Token::RightBracket, "expected ']' after list comprehension")?;
            return Ok(self.push(
                NodeKind::Comprehension {
                    kind: ComprehensionKind::List,
                    element: first,
                    value: None,
                    generators,
                },
                line,
            ));
        }

        let mut elements = vec![first];
        while self.match_token(&Token::Comma) {
            if self.check(&Token::RightBracket) {
                break;
            }
            elements.push(self.parse_star_or_named()?);
        }
        self.consume(&Token::RightBracket, "expected ']'")?;

        Ok(self.push(
            NodeKind::List {
                elements,
                context: ExprContext::Load,
            },
            line,
        ))
    }

    fn parse_brace_display(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume '{'

        if self.match_token(&Token::RightBrace) {
            return Ok(self.push(
                NodeKind::Dict {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
                line,
            ));
        }

        let mut keys = Vec::new();
        let mut values = Vec::new();

        if self.match_token(&Token::DoubleStar) {
            keys.push(None);
            values.push(self.parse_bitwise_or()?);
        } else {
            let first = self.parse_star_or_named()?;

            if !self.match_token(&Token::Colon) {
                return self.parse_set_display(first, line);
            }

            let value = self.parse_test()?;
            if self.check(&Token::For) || self.check(&Token::Async) {
                let generators = self.parse_comprehension_clauses()?;
                self.consume(&Token::RightBrace, "expected '}' after dict comprehension")?;
                return Ok(self.push(
                    NodeKind::Comprehension {
                        kind: ComprehensionKind::Dict,
                        element: first,
                        value: Some(value),
                        generators,
                    },
                    line,
                ));
            }
            keys.push(Some(first));
            values.push(value);
        }

        while self.match_token(&Token::Comma) {
            if self.check(&Token::RightBrace) {
                break;
            }
            if self.match_token(&Token::DoubleStar) {
                keys.push(None);
                values.push(self.parse_bitwise_or()?);
            } else {
                keys.push(Some(self.parse_test()?));
                self.consume(&Token::Colon, "expected ':' in dict display")?;
                values.push(self.parse_test()?);
            }
        }
        self.consume(&Token::RightBrace, "expected '}'")?;

        Ok(self.push(NodeKind::Dict { keys, values }, line))
    }

    fn parse_set_display(&mut self, first: NodeId, line: usize) -> Result<NodeId, ParseError> {
        if self.check(&Token::For) || self.check(&Token::Async) {
            let generators = self.parse_comprehension_clauses()?;
            self.consume(&Token::RightBrace, "expected '}' after set comprehension")?;
            return Ok(self.push(
                NodeKind::Comprehension {
                    kind: ComprehensionKind::Set,
                    element: first,
                    value: None,
                    generators,
                },
                line,
            ));
        }

        let mut elements = vec![first];
        while self.match_token(&Token::Comma) {
            if self.check(&Token::RightBrace) {
                break;
            }
            elements.push(self.parse_star_or_named()?);
        }
        self.consume(&Token::RightBrace, "expected '}'")?;

        Ok(self.push(NodeKind::Set { elements }, line))
    }

    fn parse_comprehension_clauses(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut generators = Vec::new();

        loop {
            let line = self.line();
            let is_async = self.match_token(&Token::Async);
            self.consume(&Token::For, "expected 'for' in comprehension")?;

            let target = self.parse_target_list()?;
            self.consume(&Token::In, "expected 'in' in comprehension")?;
            let iter = self.parse_or_test()?;

            let mut conditions = Vec::new();
            while self.match_token(&Token::If) {
                conditions.push(self.parse_or_test()?);
            }

            generators.push(self.push(
                NodeKind::ComprehensionClause {
                    is_async,
                    target,
                    iter,
                    conditions,
                },
                line,
            ));

            if !self.check(&Token::For) && !self.check(&Token::Async) {
                break;
            }
        }

        Ok(generators)
    }

    fn parse_yield_expression(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line();
        self.advance(); // Consume 'yield'

        if self.match_token(&Token::From) {
            let value = self.parse_test()?;
            return Ok(self.push(NodeKind::YieldFrom { value }, line));
        }

        let value = if self.starts_expression() {
            Some(self.parse_star_expressions()?)
        } else {
            None
        };
        Ok(self.push(NodeKind::Yield { value }, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PROGRAM: &str = r#"
import os, sys as system
from collections import (OrderedDict,
                         defaultdict)
from . import sibling


@decorator
class Shape(Base, metaclass=Meta):
    """A shape."""
    sides = []

    def __init__(self, *args, scale=1, **kwargs):
        self.scale = scale

    async def area(self, /, unit: str = "cm") -> float:
        total = 0
        for x, y in zip(self.xs, self.ys):
            if x > y and not y:
                total += x ** 2
            elif x in (1, 2):
                continue
            else:
                break
        else:
            pass
        while total:
            total -= 1
        try:
            risky()
        except (ValueError, TypeError) as err:
            raise RuntimeError("bad") from err
        except:
            raise
        finally:
            cleanup()
        with open(path) as handle, lock:
            data = [line.strip() for line in handle if line]
        squares = {k: v ** 2 for k, v in data.items()}
        fn = lambda a, b=2: a + b
        label = f"{self.scale!r:>{width}} units"
        first, *rest = data[1:3], data[::2]
        return total if total else None


del os
global counter; counter = 0
"#;

    #[test]
    fn test_parse_program() {
        let tree = parse(TEST_PROGRAM).unwrap();
        let NodeKind::Module { body } = tree.kind(tree.root()) else {
            panic!("root is not a module");
        };
        assert_eq!(body.len(), 7);
        assert!(matches!(tree.kind(body[3]), NodeKind::ClassDefinition { .. }));
    }

    #[test]
    fn test_every_node_reachable() {
        let tree = parse(TEST_PROGRAM).unwrap();
        assert_eq!(tree.walk().count(), tree.len());
    }

    #[test]
    fn test_lines_nondecreasing_in_preorder() {
        let tree = parse(TEST_PROGRAM).unwrap();
        let lines: Vec<usize> = tree.walk().map(|id| tree.line(id)).collect();
        assert!(lines.windows(2).all(|w| w[0] <= w[1]), "{:?}", lines);
    }

    #[test]
    fn test_decorated_definitions_keep_keyword_line() {
        let tree = parse("@dec\n@other(1)\nclass A:\n    @staticmethod\n    def f():\n        pass\n").unwrap();
        let definitions: Vec<(usize, usize)> = tree
            .walk()
            .filter_map(|id| match tree.kind(id) {
                NodeKind::ClassDefinition { keyword_line, .. }
                | NodeKind::FunctionDefinition { keyword_line, .. } => {
                    Some((tree.line(id), *keyword_line))
                }
                _ => None,
            })
            .collect();
        assert_eq!(definitions, vec![(1, 3), (4, 5)]);
    }

    #[test]
    fn test_assignment_targets_are_store() {
        let tree = parse("a, [b, *c] = d\n").unwrap();
        let stored: Vec<&str> = tree
            .walk()
            .filter_map(|id| match tree.kind(id) {
                NodeKind::NameReference {
                    id,
                    context: ExprContext::Store,
                } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(stored, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parameters() {
        let tree = parse("def f(a, b, /, c, *d, e=[], **g):\n    pass\n").unwrap();
        let NodeKind::FunctionDefinition { parameters, .. } = tree
            .walk()
            .map(|id| tree.kind(id))
            .find(|k| k.is_function())
            .unwrap()
        else {
            unreachable!()
        };
        let kinds: Vec<ParameterKind> = parameters.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParameterKind::PositionalOnly,
                ParameterKind::PositionalOnly,
                ParameterKind::Positional,
                ParameterKind::VarPositional,
                ParameterKind::KeywordOnly,
                ParameterKind::VarKeyword,
            ]
        );
        assert!(parameters[4].default.is_some());
    }

    #[test]
    fn test_fstring_expressions_are_parsed() {
        let tree = parse("x = f\"{math.pi:.{digits}f} {y=}\"\n").unwrap();
        let loaded: Vec<&str> = tree
            .walk()
            .filter_map(|id| match tree.kind(id) {
                NodeKind::NameReference {
                    id,
                    context: ExprContext::Load,
                } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(loaded, vec!["math", "digits", "y"]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(number_literal("42"), Literal::Int(42));
        assert_eq!(number_literal("0x10"), Literal::Int(16));
        assert_eq!(number_literal("0b11"), Literal::Int(3));
        assert_eq!(number_literal("1.5"), Literal::Float(1.5));
        assert_eq!(number_literal("1e3"), Literal::Float(1000.0));
        assert_eq!(number_literal("2j"), Literal::Imaginary("2j".into()));

        let wide = "123456789012345678901234567890123456789012";
        assert_eq!(number_literal(wide), Literal::BigInt(wide.into()));
        assert_eq!(
            number_literal("0xffffffffffffffffffffffffffffffffff"),
            Literal::BigInt("0xffffffffffffffffffffffffffffffffff".into())
        );
    }

    #[test]
    fn test_single_line_bodies() {
        let tree = parse("if x: y = 1; z = 2\nelse: pass\n").unwrap();
        let NodeKind::Module { body } = tree.kind(tree.root()) else {
            unreachable!()
        };
        let NodeKind::If { body, orelse, .. } = tree.kind(body[0]) else {
            panic!("expected if");
        };
        assert_eq!(body.len(), 2);
        assert_eq!(orelse.len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            ("def f(:\n    pass\n", 1),
            ("x = (1,\n", 1),
            ("x = [\n  1,\n  (2,\n", 3),
            ("x = 0o8\n", 1),
            ("s = f'{x:{y:{z}}}'\n", 1),
            ("if x:\npass\n", 2),
            ("try:\n    pass\nx = 1\n", 3),
            ("1 = x\n", 1),
            ("  x = 1\n", 1),
        ];
        for (source, line) in cases {
            let err = parse(source).unwrap_err();
            assert_eq!(err.line, line, "{:?} -> {}", source, err);
        }
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        let shallow = format!("x = {}1{}\n", "(".repeat(50), ")".repeat(50));
        assert!(parse(&shallow).is_ok());

        let deep_sources = [
            format!("x = {}1{}\n", "(".repeat(150), ")".repeat(150)),
            format!("x = {}1{}\n", "(".repeat(20000), ")".repeat(20000)),
            format!("x = {}1\n", "-".repeat(20000)),
            format!("x = {}y\n", "not ".repeat(20000)),
            format!("x = {}1\n", "lambda: ".repeat(20000)),
            format!("x = {}1\n", "1 if y else ".repeat(20000)),
            format!("x = {}1\n", "2 ** ".repeat(20000)),
            format!("x = {}1{}\n", "f(".repeat(150), ")".repeat(150)),
        ];
        for source in &deep_sources {
            let err = parse(source).unwrap_err();
            assert_eq!(err.line, 1);
        }
    }

    #[test]
    fn test_parse_error_display() {
        let err = parse("x = 'oops\n").unwrap_err();
        assert_eq!(err.to_string(), "unterminated string literal (line 1)");
    }
}
