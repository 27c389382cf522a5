//! Parsing matrices from bracketed text.
//!
//! Accepts one- or two-level nesting of comma separated numbers:
//!
//! ```rust
//! use lpmath::{backend, Matrix};
//! backend::set_default_threads(1)?;
//!
//! let row: Matrix = "[1, 2.5, -3e2]".parse()?;
//! assert_eq!(row.shape(), (1, 3));
//!
//! let m: Matrix = "[[1, 2], [3, 4], [5, 6]]".parse()?;
//! assert_eq!(m.shape(), (3, 2));
//! # Ok::<(), lpmath::MatrixError>(())
//! ```
//!
//! Syntax problems are [`MatrixError::Type`]; ragged or empty rows are
//! [`MatrixError::Shape`], exactly as for [`Matrix::from_rows`].

use core::str::FromStr;

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Num(f64),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.src.len()
    }

    fn next(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let bytes = self.src.as_bytes();
        let Some(&c) = bytes.get(self.pos) else {
            return Err(MatrixError::type_error("unexpected end of matrix literal"));
        };
        let start = self.pos;
        self.pos += 1;
        match c {
            b'[' => Ok(Token::Open),
            b']' => Ok(Token::Close),
            b',' => Ok(Token::Comma),
            b'-' | b'+' | b'.' | b'0'..=b'9' => {
                while self.pos < bytes.len()
                    && matches!(bytes[self.pos], b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')
                {
                    self.pos += 1;
                }
                let text = &self.src[start..self.pos];
                text.parse::<f64>().map(Token::Num).map_err(|_| {
                    MatrixError::type_error(format!("'{text}' is not a number"))
                })
            }
            _ => Err(MatrixError::type_error(format!(
                "unexpected character at offset {start} in matrix literal"
            ))),
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.next()? == token {
            Ok(())
        } else {
            Err(MatrixError::type_error(format!("expected {what}")))
        }
    }
}

/// A bracketed, comma separated list of items produced by `item`.
fn list<T>(
    lexer: &mut Lexer<'_>,
    mut item: impl FnMut(&mut Lexer<'_>, Token) -> Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    let mut first = lexer.next()?;
    if first == Token::Close {
        return Ok(out);
    }
    loop {
        out.push(item(lexer, first)?);
        match lexer.next()? {
            Token::Comma => first = lexer.next()?,
            Token::Close => return Ok(out),
            _ => return Err(MatrixError::type_error("expected ',' or ']'")),
        }
    }
}

fn number(_: &mut Lexer<'_>, token: Token) -> Result<f64> {
    match token {
        Token::Num(n) => Ok(n),
        _ => Err(MatrixError::type_error("expected a number")),
    }
}

impl FromStr for Matrix {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self> {
        let mut lexer = Lexer::new(s);
        lexer.expect(Token::Open, "'['")?;

        let nested = s.trim_start().get(1..).is_some_and(|rest| rest.trim_start().starts_with('['));
        let matrix = if nested {
            let rows = list(&mut lexer, |lexer, token| {
                if token != Token::Open {
                    return Err(MatrixError::type_error("expected '[' to open a row"));
                }
                list(lexer, number)
            })?;
            Self::from_rows(rows)?
        } else {
            Self::from_vec(list(&mut lexer, number)?)?
        };

        if lexer.at_end() {
            Ok(matrix)
        } else {
            Err(MatrixError::type_error("trailing characters after matrix literal"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend;

    #[test]
    fn parses_rows_and_vectors() {
        backend::set_default_threads(1).unwrap();
        let m: Matrix = " [ [1, 2] , [3,4.5] ] ".parse().unwrap();
        assert_eq!(m.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.5]]);

        let v: Matrix = "[-1e-2, +3]".parse().unwrap();
        assert_eq!(v.to_vec(), vec![-0.01, 3.0]);
    }

    #[test]
    fn reports_syntax_and_shape_errors() {
        backend::set_default_threads(1).unwrap();
        assert!(matches!("[1, 2,]".parse::<Matrix>(), Err(MatrixError::Type(_))));
        assert!(matches!("[1 2]".parse::<Matrix>(), Err(MatrixError::Type(_))));
        assert!(matches!("[[1], [2]] x".parse::<Matrix>(), Err(MatrixError::Type(_))));
        assert!(matches!("[[1, 2], [3]]".parse::<Matrix>(), Err(MatrixError::Shape(_))));
        assert!(matches!("[]".parse::<Matrix>(), Err(MatrixError::Shape(_))));
    }
}
