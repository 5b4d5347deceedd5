//! A small recursive-descent parser for the expression language shared by
//! transition guards (`timeStep > 3 && armed`) and opaque action bodies
//! (`aoa = slewRate*timeStep;`).

use super::{Assignment, Expression, Value};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Separator,
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

const TWO_CHAR_OPS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPS: [&str; 8] = ["+", "-", "*", "/", "<", ">", "!", "="];

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(&(offset, c)) = self.chars.peek() {
            match c {
                ';' | '\n' => {
                    self.chars.next();
                    tokens.push((offset, Token::Separator));
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '(' => {
                    self.chars.next();
                    tokens.push((offset, Token::LParen));
                }
                ')' => {
                    self.chars.next();
                    tokens.push((offset, Token::RParen));
                }
                c if c.is_ascii_digit() || c == '.' => {
                    tokens.push((offset, self.number(offset)?));
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            ident.push(c);
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push((offset, Token::Ident(ident)));
                }
                _ => tokens.push((offset, self.operator(offset)?)),
            }
        }
        Ok(tokens)
    }

    fn number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut end = start;
        let mut previous = ' ';
        while let Some(&(offset, c)) = self.chars.peek() {
            let exponent_sign = (c == '+' || c == '-') && (previous == 'e' || previous == 'E');
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                end = offset + c.len_utf8();
                previous = c;
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.source[start..end];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError {
                offset: start,
                message: format!("malformed number '{}'", text),
            })
    }

    fn operator(&mut self, offset: usize) -> Result<Token, ParseError> {
        let rest = &self.source[offset..];
        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            self.chars.next();
            self.chars.next();
            return Ok(Token::Op(op));
        }
        if let Some(op) = ONE_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            self.chars.next();
            return Ok(Token::Op(op));
        }
        Err(ParseError {
            offset,
            message: format!("unexpected character '{}'", rest.chars().next().unwrap_or(' ')),
        })
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    position: usize,
    end: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: Lexer::new(source).tokenize()?,
            position: 0,
            end: source.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map(|(o, _)| *o)
            .unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.position += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Separator)) {
            self.position += 1;
        }
    }

    fn statements(&mut self) -> Result<Vec<Assignment>, ParseError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            let target = match self.peek() {
                Some(Token::Ident(name)) => name.clone(),
                _ => return Err(self.error("expected an assignment target")),
            };
            self.position += 1;
            if self.eat_op(&["="]).is_none() {
                return Err(self.error(format!("expected '=' after '{}'", target)));
            }
            let value = self.expression()?;
            statements.push(Assignment { target, value });

            match self.peek() {
                None | Some(Token::Separator) => self.skip_separators(),
                Some(_) => return Err(self.error("expected ';' or end of line")),
            }
        }
        Ok(statements)
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        self.or()
    }

    fn or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.and()?;
        while self.eat_op(&["||"]).is_some() {
            let right = self.and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.equality()?;
        while self.eat_op(&["&&"]).is_some() {
            let right = self.equality()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.comparison()?;
        while let Some(op) = self.eat_op(&["==", "!="]) {
            let right = Box::new(self.comparison()?);
            left = match op {
                "==" => Expression::Equal(Box::new(left), right),
                _ => Expression::NotEqual(Box::new(left), right),
            };
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.additive()?;
        while let Some(op) = self.eat_op(&["<", "<=", ">", ">="]) {
            let right = Box::new(self.additive()?);
            left = match op {
                "<" => Expression::SmallerThan(Box::new(left), right),
                "<=" => Expression::SmallerThanOrEqual(Box::new(left), right),
                ">" => Expression::GreaterThan(Box::new(left), right),
                _ => Expression::GreaterThanOrEqual(Box::new(left), right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = Box::new(self.term()?);
            left = match op {
                "+" => Expression::Sum(Box::new(left), right),
                _ => Expression::Subtract(Box::new(left), right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let right = Box::new(self.unary()?);
            left = match op {
                "*" => Expression::Multiply(Box::new(left), right),
                _ => Expression::Divide(Box::new(left), right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expression, ParseError> {
        match self.eat_op(&["-", "!"]) {
            Some("-") => Ok(Expression::Negate(Box::new(self.unary()?))),
            Some(_) => Ok(Expression::Not(Box::new(self.unary()?))),
            None => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        let token = self.peek().cloned();
        match token {
            Some(Token::Number(n)) => {
                self.position += 1;
                Ok(Expression::Literal(Value::Number(n)))
            }
            Some(Token::Ident(name)) => {
                self.position += 1;
                Ok(match name.as_str() {
                    "true" => Expression::Literal(Value::Bool(true)),
                    "false" => Expression::Literal(Value::Bool(false)),
                    _ => Expression::Variable(name),
                })
            }
            Some(Token::LParen) => {
                self.position += 1;
                let inner = self.expression()?;
                if !matches!(self.peek(), Some(Token::RParen)) {
                    return Err(self.error("expected ')'"));
                }
                self.position += 1;
                Ok(inner)
            }
            Some(_) => Err(self.error("expected a value")),
            None => Err(self.error("unexpected end of input")),
        }
    }
}

/// Parses a single expression, such as a transition guard.
pub fn parse_expression(source: &str) -> Result<Expression, ParseError> {
    let mut parser = Parser::new(source)?;
    parser.skip_separators();
    let expression = parser.expression()?;
    parser.skip_separators();
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expression)
}

/// Parses an opaque action body made of `name = expression` statements.
pub fn parse_statements(source: &str) -> Result<Vec<Assignment>, ParseError> {
    Parser::new(source)?.statements()
}
