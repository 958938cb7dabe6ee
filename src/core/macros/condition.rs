//! Boolean condition expressions over macro strings.
//!
//! Grammar:
//!
//! ```text
//! or      := and ('||' and)*
//! and     := unary ('&&' unary)*
//! unary   := '!' unary | primary
//! primary := '(' or ')' | operand (('==' | '!=') operand)?
//! ```
//!
//! Operands are bare words (which may contain `$(...)` references) or
//! double-quoted strings. A lone operand is true when it evaluates to a
//! YES-like value.

use super::expr::{MacroParseError, MacroString};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroCondition {
    Truthy(MacroString),
    Equal(MacroString, MacroString),
    NotEqual(MacroString, MacroString),
    Not(Box<MacroCondition>),
    And(Box<MacroCondition>, Box<MacroCondition>),
    Or(Box<MacroCondition>, Box<MacroCondition>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Operand(String),
}

impl MacroCondition {
    pub fn parse(text: &str) -> Result<Self, MacroParseError> {
        let tokens = tokenize(text)?;
        let mut parser = ConditionParser {
            tokens: &tokens,
            pos: 0,
        };
        let condition = parser.parse_or()?;
        if parser.pos != tokens.len() {
            return Err(MacroParseError::Condition(format!(
                "unexpected trailing input in condition '{}'",
                text
            )));
        }
        Ok(condition)
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, MacroParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '"' => {
                let mut word = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '"' {
                        closed = true;
                        i += 1;
                        break;
                    }
                    word.push(chars[i]);
                    i += 1;
                }
                if !closed {
                    return Err(MacroParseError::Quoting(text.to_string()));
                }
                tokens.push(Token::Operand(word));
            }
            _ => {
                let mut word = String::new();
                while i < chars.len() {
                    let c = chars[i];
                    if c == '$' && matches!(chars.get(i + 1), Some('(') | Some('{')) {
                        let close = if chars[i + 1] == '(' { ')' } else { '}' };
                        while i < chars.len() {
                            word.push(chars[i]);
                            i += 1;
                            if chars[i - 1] == close {
                                break;
                            }
                        }
                        continue;
                    }
                    if c.is_whitespace() || "()!=&|\"".contains(c) {
                        break;
                    }
                    word.push(c);
                    i += 1;
                }
                if word.is_empty() {
                    return Err(MacroParseError::Condition(format!(
                        "unexpected character '{}' in condition '{}'",
                        c, text
                    )));
                }
                tokens.push(Token::Operand(word));
            }
        }
    }

    Ok(tokens)
}

struct ConditionParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl ConditionParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<MacroCondition, MacroParseError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = MacroCondition::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<MacroCondition, MacroParseError> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = MacroCondition::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<MacroCondition, MacroParseError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(MacroCondition::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<MacroCondition, MacroParseError> {
        match self.advance().cloned() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(MacroParseError::Condition("expected ')'".to_string())),
                }
            }
            Some(Token::Operand(lhs)) => {
                let lhs = MacroString::parse(&lhs)?;
                match self.peek() {
                    Some(Token::Eq) | Some(Token::Ne) => {
                        let negate = self.peek() == Some(&Token::Ne);
                        self.pos += 1;
                        let rhs = match self.advance() {
                            Some(Token::Operand(rhs)) => MacroString::parse(rhs)?,
                            _ => {
                                return Err(MacroParseError::Condition(
                                    "expected operand after comparison".to_string(),
                                ))
                            }
                        };
                        Ok(if negate {
                            MacroCondition::NotEqual(lhs, rhs)
                        } else {
                            MacroCondition::Equal(lhs, rhs)
                        })
                    }
                    _ => Ok(MacroCondition::Truthy(lhs)),
                }
            }
            Some(token) => Err(MacroParseError::Condition(format!(
                "unexpected token {:?}",
                token
            ))),
            None => Err(MacroParseError::Condition(
                "unexpected end of condition".to_string(),
            )),
        }
    }
}
