//! Arithmetic formula evaluation.
//!
//! Score and threshold checks may carry a formula such as
//! `loan_amount / property_value * 100`. Formulas are evaluated against
//! numeric context values so the arithmetic never depends on a model.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := '-' factor | number | ident | '(' expr ')'
//! ```
//!
//! A leading `name =` is accepted and ignored. Nesting of parentheses and
//! unary minus is capped at [`MAX_DEPTH`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Unexpected character '{0}' in formula")]
    UnexpectedChar(char),

    #[error("Unexpected token '{0}' in formula")]
    UnexpectedToken(String),

    #[error("Formula ended unexpectedly")]
    UnexpectedEnd,

    #[error("Invalid number '{0}' in formula")]
    InvalidNumber(String),

    #[error("No numeric value for '{0}'")]
    UnknownField(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Formula nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Maximum nesting of `(` and unary `-`.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, FormulaError> {
    let rhs = match expr.split_once('=') {
        Some((_, rhs)) => rhs,
        None => expr,
    };

    let mut tokens = Vec::new();
    let chars: Vec<char> = rhs.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '×' => {
                tokens.push(Token::Op('*'));
                i += 1;
            }
            '÷' => {
                tokens.push(Token::Op('/'));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == ',') {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().filter(|c| **c != ',').collect();
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(raw.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(FormulaError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

struct Parser<'a, F> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    lookup: F,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<f64>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == '*' {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(FormulaError::DivisionByZero);
                }
                value / rhs
            };
        }
        Ok(value)
    }

    fn nested<T>(&mut self, inner: impl FnOnce(&mut Self) -> Result<T, FormulaError>) -> Result<T, FormulaError> {
        if self.depth >= MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let value = inner(self);
        self.depth -= 1;
        value
    }

    fn factor(&mut self) -> Result<f64, FormulaError> {
        match self.next() {
            Some(Token::Op('-')) => Ok(-self.nested(Self::factor)?),
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => {
                (self.lookup)(&name).ok_or(FormulaError::UnknownField(name))
            }
            Some(Token::LParen) => {
                let value = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(FormulaError::UnexpectedToken(describe(&other))),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(other) => Err(FormulaError::UnexpectedToken(describe(&other))),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => n.to_string(),
        Token::Ident(s) => s.clone(),
        Token::Op(c) => c.to_string(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
    }
}

/// Evaluate `expr`, resolving identifiers through `lookup`.
pub fn evaluate<F>(expr: &str, lookup: F) -> Result<f64, FormulaError>
where
    F: Fn(&str) -> Option<f64>,
{
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        lookup,
    };
    let value = parser.expr()?;
    match parser.next() {
        None => Ok(value),
        Some(extra) => Err(FormulaError::UnexpectedToken(describe(&extra))),
    }
}

/// Identifiers referenced by `expr`, in order of first appearance.
pub fn identifiers(expr: &str) -> Result<Vec<String>, FormulaError> {
    let mut names: Vec<String> = Vec::new();
    for token in tokenize(expr)? {
        if let Token::Ident(name) = token {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn values() -> HashMap<&'static str, f64> {
        HashMap::from([
            ("loan_amount", 385_000.0),
            ("property_value", 428_000.0),
            ("monthly_debt", 2_100.0),
            ("monthly_income", 6_000.0),
        ])
    }

    #[test]
    fn test_ltv_formula() {
        let vals = values();
        let ltv = evaluate("loan_amount / property_value * 100", |k| vals.get(k).copied()).unwrap();
        assert!((ltv - 89.953).abs() < 0.01);
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(evaluate("2 + 3 * 4", |_| None).unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4", |_| None).unwrap(), 20.0);
        assert_eq!(evaluate("-2 * -3", |_| None).unwrap(), 6.0);
        assert_eq!(evaluate("1,000 / 4", |_| None).unwrap(), 250.0);
    }

    #[test]
    fn test_assignment_prefix_ignored() {
        let vals = values();
        let dti = evaluate("dti = monthly_debt / monthly_income * 100", |k| vals.get(k).copied())
            .unwrap();
        assert!((dti - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            evaluate("missing_field * 2", |_| None),
            Err(FormulaError::UnknownField("missing_field".into()))
        );
        assert_eq!(evaluate("1 / 0", |_| None), Err(FormulaError::DivisionByZero));
        assert_eq!(evaluate("(1 + 2", |_| None), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(evaluate("1 + $", |_| None), Err(FormulaError::UnexpectedChar('$'))));
        assert!(matches!(evaluate("1 2", |_| None), Err(FormulaError::UnexpectedToken(_))));
    }

    #[test]
    fn test_nesting_is_capped() {
        let deep_parens = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
        assert_eq!(evaluate(&deep_parens, |_| None), Err(FormulaError::TooDeep(MAX_DEPTH)));

        let deep_negation = format!("{}1", "-".repeat(5_000));
        assert_eq!(evaluate(&deep_negation, |_| None), Err(FormulaError::TooDeep(MAX_DEPTH)));

        let ok = format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(evaluate(&ok, |_| None), Ok(1.0));
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            identifiers("dti = (monthly_debt + new_payment) / monthly_income").unwrap(),
            vec!["monthly_debt", "new_payment", "monthly_income"]
        );
    }
}
