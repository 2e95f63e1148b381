use crate::ast::Position;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    Keyword,
    Ident,
    Number,
    String,
    Op,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Question,
    Colon,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub typ: TokenType,
    pub value: String,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct LexerError {
    pub message: String,
    pub pos: Position,
}

impl Display for LexerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.message, self.pos.line, self.pos.column
        )
    }
}

impl Error for LexerError {}

/// Tokenizer for the script subset the generators emit.
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    keywords: HashSet<&'static str>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            keywords: keyword_set(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        while !self.at_end() {
            let ch = self.peek();
            if ch == '\u{feff}' || ch.is_whitespace() {
                self.advance();
                continue;
            }
            if ch == '/' && self.peek_next() == '/' {
                self.skip_line_comment();
                continue;
            }
            if ch == '/' && self.peek_next() == '*' {
                self.skip_block_comment()?;
                continue;
            }
            if ch == '"' || ch == '\'' {
                tokens.push(self.read_string(ch)?);
                continue;
            }
            if ch.is_ascii_digit() || (ch == '.' && self.peek_next().is_ascii_digit()) {
                tokens.push(self.read_number());
                continue;
            }
            if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' {
                tokens.push(self.read_identifier());
                continue;
            }
            let pos = self.pos();
            let single = match ch {
                '(' => Some(TokenType::LParen),
                ')' => Some(TokenType::RParen),
                '{' => Some(TokenType::LBrace),
                '}' => Some(TokenType::RBrace),
                ',' => Some(TokenType::Comma),
                ';' => Some(TokenType::Semicolon),
                '?' => Some(TokenType::Question),
                ':' => Some(TokenType::Colon),
                _ => None,
            };
            if let Some(typ) = single {
                self.advance();
                tokens.push(Token {
                    typ,
                    value: ch.to_string(),
                    pos,
                });
                continue;
            }
            match ch {
                '+' | '-' | '*' | '/' | '%' | '=' | '!' | '<' | '>' | '&' | '|' => {
                    tokens.push(self.read_operator()?);
                }
                _ => {
                    return Err(LexerError {
                        message: format!("Unexpected character {:?}", ch),
                        pos,
                    });
                }
            }
        }
        tokens.push(Token {
            typ: TokenType::Eof,
            value: String::new(),
            pos: self.pos(),
        });
        Ok(tokens)
    }

    fn read_operator(&mut self) -> Result<Token, LexerError> {
        let pos = self.pos();
        let ch = self.advance();
        let mut value = ch.to_string();
        match (ch, self.peek()) {
            ('+', '+') | ('-', '-') | ('&', '&') | ('|', '|') => value.push(self.advance()),
            ('+' | '-' | '*' | '/' | '%' | '<' | '>', '=') => value.push(self.advance()),
            ('=' | '!', '=') => {
                value.push(self.advance());
                // Strict and loose equality behave the same on this value model.
                if self.peek() == '=' {
                    self.advance();
                }
            }
            ('&' | '|', _) => {
                return Err(LexerError {
                    message: format!("Bitwise operator '{}' is not supported", ch),
                    pos,
                });
            }
            _ => {}
        }
        Ok(Token {
            typ: TokenType::Op,
            value,
            pos,
        })
    }

    fn read_identifier(&mut self) -> Token {
        let pos = self.pos();
        let mut text = String::new();
        text.push(self.advance());
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                text.push(self.advance());
            } else if ch == '.' && (self.peek_next().is_ascii_alphabetic() || self.peek_next() == '_') {
                // Dotted member paths (`window.alert`) lex as one name.
                text.push(self.advance());
            } else {
                break;
            }
        }
        let typ = if self.keywords.contains(text.as_str()) {
            TokenType::Keyword
        } else {
            TokenType::Ident
        };
        Token {
            typ,
            value: text,
            pos,
        }
    }

    fn read_number(&mut self) -> Token {
        let pos = self.pos();
        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_ascii_digit() {
                text.push(self.advance());
            } else if ch == '.' && !seen_dot && !seen_exp {
                seen_dot = true;
                text.push(self.advance());
            } else if matches!(ch, 'e' | 'E') && !seen_exp && !text.is_empty() {
                seen_exp = true;
                text.push(self.advance());
                if matches!(self.peek(), '+' | '-') {
                    text.push(self.advance());
                }
            } else {
                break;
            }
        }
        Token {
            typ: TokenType::Number,
            value: text,
            pos,
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, LexerError> {
        let pos = self.pos();
        self.advance();
        let mut out = String::new();
        while !self.at_end() {
            let ch = self.advance();
            if ch == quote {
                return Ok(Token {
                    typ: TokenType::String,
                    value: out,
                    pos,
                });
            }
            if ch == '\\' {
                if self.at_end() {
                    break;
                }
                let esc = self.advance();
                let mapped = match esc {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '0' => '\0',
                    _ => esc,
                };
                out.push(mapped);
                continue;
            }
            if ch == '\n' {
                return Err(LexerError {
                    message: "Unterminated string literal".to_string(),
                    pos,
                });
            }
            out.push(ch);
        }
        Err(LexerError {
            message: "Unterminated string literal".to_string(),
            pos,
        })
    }

    fn skip_line_comment(&mut self) {
        while !self.at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexerError> {
        let pos = self.pos();
        self.advance();
        self.advance();
        while !self.at_end() {
            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(LexerError {
            message: "Unterminated block comment".to_string(),
            pos,
        })
    }

    fn at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars.get(self.index).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.chars.get(self.index + 1).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let ch = self.peek();
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

fn keyword_set() -> HashSet<&'static str> {
    [
        "var", "let", "const", "if", "else", "while", "for", "true", "false", "null", "undefined",
    ]
    .into_iter()
    .collect()
}
