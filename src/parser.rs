use crate::ast::{AssignOp, BinaryOp, Expr, Position, Program, Statement, UnaryOp};
use crate::lexer::{Lexer, Token, TokenType};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub pos: Position,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.pos.line, self.pos.column)
    }
}

impl Error for ParseError {}

/// Lexes and parses a whole script.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).tokenize().map_err(|e| ParseError {
        message: e.message,
        pos: e.pos,
    })?;
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.typ != TokenType::Eof).unwrap_or(true) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or(Position::new(1, 1));
            tokens.push(Token {
                typ: TokenType::Eof,
                value: String::new(),
                pos,
            });
        }
        Self { tokens, index: 0 }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !self.at_end() {
            self.parse_statement_into(&mut body)?;
        }
        Ok(Program { body })
    }

    fn parse_statement_into(&mut self, out: &mut Vec<Statement>) -> Result<(), ParseError> {
        if self.match_type(TokenType::Semicolon) {
            return Ok(());
        }
        if self.check_type(TokenType::LBrace) {
            out.extend(self.parse_block()?);
            return Ok(());
        }
        let statement = if self.check_keyword("var") || self.check_keyword("let") || self.check_keyword("const") {
            let stmt = self.parse_declaration()?;
            self.end_of_statement()?;
            stmt
        } else if self.check_keyword("if") {
            self.parse_if_stmt()?
        } else if self.check_keyword("while") {
            self.parse_while_stmt()?
        } else if self.check_keyword("for") {
            self.parse_for_stmt()?
        } else {
            let stmt = self.parse_simple_statement()?;
            self.end_of_statement()?;
            stmt
        };
        out.push(statement);
        Ok(())
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut body = Vec::new();
        if !self.match_type(TokenType::LBrace) {
            self.parse_statement_into(&mut body)?;
            return Ok(body);
        }
        while !self.check_type(TokenType::RBrace) {
            if self.at_end() {
                return self.error_here("Expected '}' to close block.");
            }
            self.parse_statement_into(&mut body)?;
        }
        self.consume_type(TokenType::RBrace, "Expected '}' to close block.")?;
        Ok(body)
    }

    fn parse_declaration(&mut self) -> Result<Statement, ParseError> {
        let pos = self.advance().pos;
        let mut names = Vec::new();
        loop {
            let name = self.consume_type(TokenType::Ident, "Expected variable name.")?;
            let init = if self.match_op("=") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            names.push((name.value, init));
            if !self.match_type(TokenType::Comma) {
                break;
            }
        }
        Ok(Statement::Declare { pos, names })
    }

    fn parse_if_stmt(&mut self) -> Result<Statement, ParseError> {
        let pos = self.consume_keyword("if", "Expected 'if'.")?.pos;
        let mut branches = Vec::new();
        let mut else_body = Vec::new();
        let condition = self.parse_condition("if")?;
        branches.push((condition, self.parse_block()?));
        while self.match_keyword("else") {
            if self.match_keyword("if") {
                let condition = self.parse_condition("else if")?;
                branches.push((condition, self.parse_block()?));
            } else {
                else_body = self.parse_block()?;
                break;
            }
        }
        Ok(Statement::If {
            pos,
            branches,
            else_body,
        })
    }

    fn parse_while_stmt(&mut self) -> Result<Statement, ParseError> {
        let pos = self.consume_keyword("while", "Expected 'while'.")?.pos;
        let condition = self.parse_condition("while")?;
        let body = self.parse_block()?;
        Ok(Statement::While { pos, condition, body })
    }

    fn parse_for_stmt(&mut self) -> Result<Statement, ParseError> {
        let pos = self.consume_keyword("for", "Expected 'for'.")?.pos;
        self.consume_type(TokenType::LParen, "Expected '(' after 'for'.")?;
        let init = if self.check_type(TokenType::Semicolon) {
            None
        } else if self.check_keyword("var") || self.check_keyword("let") {
            Some(Box::new(self.parse_declaration()?))
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.consume_type(TokenType::Semicolon, "Expected ';' after loop initializer.")?;
        let condition = if self.check_type(TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_type(TokenType::Semicolon, "Expected ';' after loop condition.")?;
        let update = if self.check_type(TokenType::RParen) {
            None
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.consume_type(TokenType::RParen, "Expected ')' after loop header.")?;
        let body = self.parse_block()?;
        Ok(Statement::For {
            pos,
            init,
            condition,
            update,
            body,
        })
    }

    /// Assignment, increment or a bare expression.
    fn parse_simple_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.current().clone();
        if token.typ == TokenType::Ident && self.peek().typ == TokenType::Op {
            let op = match self.peek().value.as_str() {
                "=" => Some(AssignOp::Set),
                "+=" | "++" => Some(AssignOp::Add),
                "-=" | "--" => Some(AssignOp::Sub),
                _ => None,
            };
            if let Some(op) = op {
                self.advance();
                let symbol = self.advance();
                let value = if symbol.value == "++" || symbol.value == "--" {
                    Expr::Number {
                        pos: symbol.pos,
                        value: 1.0,
                    }
                } else {
                    self.parse_expression()?
                };
                return Ok(Statement::Assign {
                    pos: token.pos,
                    name: token.value,
                    op,
                    value,
                });
            }
        }
        let expr = self.parse_expression()?;
        Ok(Statement::Expr { pos: token.pos, expr })
    }

    fn parse_condition(&mut self, context: &str) -> Result<Expr, ParseError> {
        self.consume_type(TokenType::LParen, &format!("Expected '(' after '{}'.", context))?;
        let expr = self.parse_expression()?;
        self.consume_type(TokenType::RParen, &format!("Expected ')' after {} condition.", context))?;
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_binary(1)?;
        if !self.check_type(TokenType::Question) {
            return Ok(test);
        }
        let pos = self.advance().pos;
        let then = self.parse_expression()?;
        self.consume_type(TokenType::Colon, "Expected ':' in conditional expression.")?;
        let otherwise = self.parse_expression()?;
        Ok(Expr::Conditional {
            pos,
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_binary(&mut self, min_precedence: i32) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let token = self.current().clone();
            if token.typ != TokenType::Op {
                break;
            }
            let Some(precedence) = precedence_of(&token.value) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            let Some(op) = BinaryOp::from_symbol(&token.value) else {
                break;
            };
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = Expr::Binary {
                pos: token.pos,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        let op = match (token.typ == TokenType::Op, token.value.as_str()) {
            (true, "!") => Some(UnaryOp::Not),
            (true, "-") => Some(UnaryOp::Negate),
            (true, "+") => Some(UnaryOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                pos: token.pos,
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.typ {
            TokenType::Number => {
                self.advance();
                let value = token.value.parse::<f64>().map_err(|_| ParseError {
                    message: format!("Invalid number literal '{}'.", token.value),
                    pos: token.pos,
                })?;
                Ok(Expr::Number { pos: token.pos, value })
            }
            TokenType::String => {
                self.advance();
                Ok(Expr::String {
                    pos: token.pos,
                    value: token.value,
                })
            }
            TokenType::Keyword => match token.value.as_str() {
                "true" | "false" => {
                    self.advance();
                    Ok(Expr::Bool {
                        pos: token.pos,
                        value: token.value == "true",
                    })
                }
                "null" | "undefined" => {
                    self.advance();
                    Ok(Expr::Null { pos: token.pos })
                }
                other => self.error_here(format!("Unexpected keyword '{}' in expression.", other)),
            },
            TokenType::Ident => {
                self.advance();
                if !self.match_type(TokenType::LParen) {
                    return Ok(Expr::Var {
                        pos: token.pos,
                        name: token.value,
                    });
                }
                let mut args = Vec::new();
                if !self.check_type(TokenType::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.match_type(TokenType::Comma) {
                            break;
                        }
                    }
                }
                self.consume_type(TokenType::RParen, "Expected ')' after call arguments.")?;
                Ok(Expr::Call {
                    pos: token.pos,
                    callee: token.value,
                    args,
                })
            }
            TokenType::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume_type(TokenType::RParen, "Expected ')' after expression.")?;
                Ok(expr)
            }
            TokenType::Eof => self.error_here("Unexpected end of input, expected expression."),
            _ => self.error_here(format!("Unexpected '{}' in expression.", token.value)),
        }
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        if self.match_type(TokenType::Semicolon) || self.check_type(TokenType::RBrace) || self.at_end() {
            return Ok(());
        }
        self.error_here("Expected ';' after statement.")
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        let token = self.current();
        token.typ == TokenType::Keyword && token.value == keyword
    }

    fn consume_keyword(&mut self, keyword: &str, message: &str) -> Result<Token, ParseError> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            self.error_here(message)
        }
    }

    fn consume_type(&mut self, typ: TokenType, message: &str) -> Result<Token, ParseError> {
        if self.check_type(typ) {
            Ok(self.advance())
        } else {
            self.error_here(message)
        }
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            return true;
        }
        false
    }

    fn match_type(&mut self, typ: TokenType) -> bool {
        if self.check_type(typ) {
            self.advance();
            return true;
        }
        false
    }

    fn match_op(&mut self, op: &str) -> bool {
        let token = self.current();
        if token.typ == TokenType::Op && token.value == op {
            self.advance();
            return true;
        }
        false
    }

    fn check_type(&self, typ: TokenType) -> bool {
        self.current().typ == typ
    }

    fn at_end(&self) -> bool {
        self.current().typ == TokenType::Eof
    }

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.index + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn error_here<T: Into<String>, R>(&self, message: T) -> Result<R, ParseError> {
        Err(ParseError {
            message: message.into(),
            pos: self.current().pos,
        })
    }
}

fn precedence_of(op: &str) -> Option<i32> {
    match op {
        "||" => Some(1),
        "&&" => Some(2),
        "==" | "!=" => Some(3),
        "<" | "<=" | ">" | ">=" => Some(4),
        "+" | "-" => Some(5),
        "*" | "/" | "%" => Some(6),
        _ => None,
    }
}
