//! Restricted arithmetic evaluator
//!
//! Accepts digits, whitespace and `+ - * / ( )` only. The input is checked
//! character by character before anything is parsed, then evaluated by a
//! recursive-descent parser:
//!
//! ```text
//! expr   := term   (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | number | '(' expr ')'
//! ```
//!
//! Nothing is ever compiled or executed; the only output is
//! an `f64` or an [`ArithmeticError`].

use thiserror::Error;

/// Deepest nesting of parentheses and unary signs accepted
const MAX_DEPTH: usize = 256;

/// Why an expression was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("Expression is empty")]
    Empty,

    #[error("Invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("Unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("Expression ends unexpectedly")]
    UnexpectedEnd,

    #[error("Unbalanced parenthesis at position {position}")]
    UnbalancedParenthesis { position: usize },

    #[error("Division by zero at position {position}")]
    DivisionByZero { position: usize },

    #[error("Number too large at position {position}")]
    Overflow { position: usize },

    #[error("Expression nested too deeply")]
    TooDeep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn symbol(&self) -> String {
        match self {
            Token::Number(n) => format_number(*n),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

/// Whether `ch` may appear in an expression at all
pub fn is_allowed_char(ch: char) -> bool {
    ch.is_ascii_digit() || ch.is_whitespace() || matches!(ch, '+' | '-' | '*' | '/' | '(' | ')')
}

/// Reject the input if any character falls outside the allowed set.
///
/// Positions are counted in characters, starting at 0.
pub fn check_characters(input: &str) -> Result<(), ArithmeticError> {
    match input.chars().enumerate().find(|(_, ch)| !is_allowed_char(*ch)) {
        Some((position, ch)) => Err(ArithmeticError::InvalidCharacter { ch, position }),
        None => Ok(()),
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ArithmeticError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let token = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value: f64 = digits
                    .parse()
                    .map_err(|_| ArithmeticError::Overflow { position: start })?;
                if !value.is_finite() {
                    return Err(ArithmeticError::Overflow { position: start });
                }
                tokens.push((Token::Number(value), start));
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => {
                return Err(ArithmeticError::InvalidCharacter {
                    ch: other,
                    position: i,
                });
            }
        };
        tokens.push((token, i));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<(Token, usize)> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), ArithmeticError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ArithmeticError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, ArithmeticError> {
        let mut value = self.term()?;
        while let Some((token, position)) = self.peek() {
            match token {
                Token::Plus => {
                    self.advance();
                    value = checked(value + self.term()?, position)?;
                }
                Token::Minus => {
                    self.advance();
                    value = checked(value - self.term()?, position)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ArithmeticError> {
        let mut value = self.factor()?;
        while let Some((token, position)) = self.peek() {
            match token {
                Token::Star => {
                    self.advance();
                    value = checked(value * self.factor()?, position)?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(ArithmeticError::DivisionByZero { position });
                    }
                    value = checked(value / divisor, position)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, ArithmeticError> {
        let (token, position) = self.advance().ok_or(ArithmeticError::UnexpectedEnd)?;
        match token {
            Token::Number(n) => Ok(n),
            Token::Plus | Token::Minus => {
                self.descend()?;
                let operand = self.factor()?;
                self.depth -= 1;
                Ok(if token == Token::Minus { -operand } else { operand })
            }
            Token::LParen => {
                self.descend()?;
                let value = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(value),
                    Some((other, at)) => Err(ArithmeticError::UnexpectedToken {
                        found: other.symbol(),
                        position: at,
                    }),
                    None => Err(ArithmeticError::UnbalancedParenthesis { position }),
                }
            }
            Token::RParen => Err(ArithmeticError::UnbalancedParenthesis { position }),
            Token::Star | Token::Slash => Err(ArithmeticError::UnexpectedToken {
                found: token.symbol(),
                position,
            }),
        }
    }
}

fn checked(value: f64, position: usize) -> Result<f64, ArithmeticError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ArithmeticError::Overflow { position })
    }
}

/// Evaluate a restricted arithmetic expression.
///
/// Characters are checked before any parsing happens, so an input like
/// `"25*4; rm -rf"` is rejected as a whole.
pub fn evaluate(input: &str) -> Result<f64, ArithmeticError> {
    check_characters(input)?;

    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ArithmeticError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;

    match parser.peek() {
        None => Ok(value),
        Some((Token::RParen, position)) => Err(ArithmeticError::UnbalancedParenthesis { position }),
        Some((token, position)) => Err(ArithmeticError::UnexpectedToken {
            found: token.symbol(),
            position,
        }),
    }
}

/// Render a result the way a person would write it: `110`, not `110.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Evaluate and format in one step
pub fn evaluate_to_string(input: &str) -> Result<String, ArithmeticError> {
    evaluate(input).map(format_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate_to_string("25 * 4 + 10").unwrap(), "110");
        assert_eq!(evaluate_to_string("10 + 25 * 4").unwrap(), "110");
        assert_eq!(evaluate_to_string("2 + 3 * 4 - 6 / 2").unwrap(), "11");
    }

    #[test]
    fn test_parentheses_override() {
        assert_eq!(evaluate_to_string("(2+3)*4").unwrap(), "20");
        assert_eq!(evaluate_to_string("((1 + 2) * (3 + 4))").unwrap(), "21");
        assert_eq!(evaluate_to_string("100 / (2 * (3 + 2))").unwrap(), "10");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(evaluate_to_string("10 - 4 - 3").unwrap(), "3");
        assert_eq!(evaluate_to_string("64 / 4 / 2").unwrap(), "8");
    }

    #[test]
    fn test_fractional_result() {
        assert_eq!(evaluate_to_string("7 / 2").unwrap(), "3.5");
        assert_eq!(evaluate_to_string("1 / 4").unwrap(), "0.25");
    }

    #[test]
    fn test_unary_signs() {
        assert_eq!(evaluate_to_string("-5 + 2").unwrap(), "-3");
        assert_eq!(evaluate_to_string("3 * -(2 + 1)").unwrap(), "-9");
        assert_eq!(evaluate_to_string("--4").unwrap(), "4");
        assert_eq!(evaluate_to_string("+7").unwrap(), "7");
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(evaluate_to_string("  1\t+\n2 ").unwrap(), "3");
    }

    #[test]
    fn test_invalid_characters_rejected_before_evaluation() {
        let err = evaluate("25*4; rm -rf").unwrap_err();
        assert_eq!(err, ArithmeticError::InvalidCharacter { ch: ';', position: 4 });

        assert!(matches!(
            evaluate("2 ** 3 + x").unwrap_err(),
            ArithmeticError::InvalidCharacter { ch: 'x', .. }
        ));
        assert!(matches!(
            evaluate("1.5 + 1").unwrap_err(),
            ArithmeticError::InvalidCharacter { ch: '.', position: 1 }
        ));
        assert!(matches!(
            evaluate("__import__('os')").unwrap_err(),
            ArithmeticError::InvalidCharacter { ch: '_', position: 0 }
        ));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            evaluate("5 / 0").unwrap_err(),
            ArithmeticError::DivisionByZero { position: 2 }
        );
        assert!(matches!(
            evaluate("1 / (3 - 3)").unwrap_err(),
            ArithmeticError::DivisionByZero { .. }
        ));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert_eq!(
            evaluate("(1 + 2").unwrap_err(),
            ArithmeticError::UnbalancedParenthesis { position: 0 }
        );
        assert_eq!(
            evaluate("1 + 2)").unwrap_err(),
            ArithmeticError::UnbalancedParenthesis { position: 5 }
        );
        assert!(matches!(
            evaluate(")(").unwrap_err(),
            ArithmeticError::UnbalancedParenthesis { position: 0 }
        ));
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(evaluate("").unwrap_err(), ArithmeticError::Empty);
        assert_eq!(evaluate("   ").unwrap_err(), ArithmeticError::Empty);
        assert_eq!(evaluate("1 +").unwrap_err(), ArithmeticError::UnexpectedEnd);
        assert!(matches!(
            evaluate("* 2").unwrap_err(),
            ArithmeticError::UnexpectedToken { position: 0, .. }
        ));
        assert!(matches!(
            evaluate("2 3").unwrap_err(),
            ArithmeticError::UnexpectedToken { position: 2, .. }
        ));
        assert!(matches!(
            evaluate("()").unwrap_err(),
            ArithmeticError::UnbalancedParenthesis { position: 1 }
        ));
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        assert_eq!(evaluate(&deep).unwrap_err(), ArithmeticError::TooDeep);

        let ok = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(evaluate_to_string(&ok).unwrap(), "1");
    }

    #[test]
    fn test_overflow() {
        let huge = "9".repeat(400);
        assert!(matches!(
            evaluate(&huge).unwrap_err(),
            ArithmeticError::Overflow { position: 0 }
        ));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(110.0), "110");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }
}
