//! Bracketed integer literals used on the command line.
//!
//! A literal is one or more rows of unsigned integers:
//!
//! ```text
//! 12                  one row holding 12
//! [1,2,3]             one row
//! [0...3]  [3...0]    inclusive ranges, ascending or descending
//! [0,...,39]          the same range spelled with separators
//! [0,1][2,3]          two rows
//! [[0,1],[2,3]]       two rows, nested
//! ```

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("empty array literal")]
    Empty,

    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: &'static str, offset: usize },

    #[error("missing closing bracket")]
    Unclosed,

    #[error("range at offset {offset} lacks a start or an end")]
    OpenRange { offset: usize },

    #[error("number {0} is too large")]
    Overflow(String),

    #[error("invalid size {0:?}, expected a number with an optional K/M/G and B suffix")]
    Size(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Comma,
    Ellipsis,
    Number(usize),
}

impl Token {
    fn describe(self) -> &'static str {
        match self {
            Token::Open => "'['",
            Token::Close => "']'",
            Token::Comma => "','",
            Token::Ellipsis => "'...'",
            Token::Number(_) => "number",
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, LiteralError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let offset = i;
        match bytes[i] {
            b' ' | b'\t' | b'\n' => i += 1,
            b'[' => {
                tokens.push((offset, Token::Open));
                i += 1;
            }
            b']' => {
                tokens.push((offset, Token::Close));
                i += 1;
            }
            b',' => {
                tokens.push((offset, Token::Comma));
                i += 1;
            }
            b'.' => {
                if !input[i..].starts_with("...") {
                    return Err(LiteralError::UnexpectedChar {
                        found: '.',
                        offset,
                    });
                }
                tokens.push((offset, Token::Ellipsis));
                i += 3;
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let digits = &input[offset..i];
                let value = digits
                    .parse()
                    .map_err(|_| LiteralError::Overflow(digits.to_string()))?;
                tokens.push((offset, Token::Number(value)));
            }
            _ => {
                let found = input[i..].chars().next().unwrap_or_default();
                return Err(LiteralError::UnexpectedChar { found, offset });
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|&(_, token)| token)
    }

    fn bump(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn unexpected(offset: usize, token: Token) -> LiteralError {
        LiteralError::UnexpectedToken {
            found: token.describe(),
            offset,
        }
    }

    fn literal(&mut self) -> Result<Vec<Vec<usize>>, LiteralError> {
        match (self.tokens.first(), self.tokens.get(1)) {
            (None, _) => Err(LiteralError::Empty),
            (Some(&(_, Token::Number(value))), None) => Ok(vec![vec![value]]),
            (Some(&(_, Token::Open)), Some(&(_, Token::Open))) => self.nested(),
            _ => self.sequence(),
        }
    }

    // `[a][b]`, optionally separated by commas
    fn sequence(&mut self) -> Result<Vec<Vec<usize>>, LiteralError> {
        let mut rows = Vec::new();
        while self.peek().is_some() {
            rows.push(self.row()?);
            if self.peek() == Some(Token::Comma) {
                self.pos += 1;
            }
        }
        Ok(rows)
    }

    // `[[a],[b]]`
    fn nested(&mut self) -> Result<Vec<Vec<usize>>, LiteralError> {
        self.pos += 1;
        let mut rows = Vec::new();
        loop {
            rows.push(self.row()?);
            match self.bump() {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::Close)) => break,
                Some((offset, token)) => return Err(Self::unexpected(offset, token)),
                None => return Err(LiteralError::Unclosed),
            }
        }
        match self.bump() {
            None => Ok(rows),
            Some((offset, token)) => Err(Self::unexpected(offset, token)),
        }
    }

    fn row(&mut self) -> Result<Vec<usize>, LiteralError> {
        match self.bump() {
            Some((_, Token::Open)) => {}
            Some((offset, token)) => return Err(Self::unexpected(offset, token)),
            None => return Err(LiteralError::Unclosed),
        }

        let mut values: Vec<usize> = Vec::new();
        let mut open_range: Option<usize> = None;
        let mut after_value = false;
        loop {
            let Some((offset, token)) = self.bump() else {
                return Err(LiteralError::Unclosed);
            };
            match token {
                Token::Number(end) => {
                    if let Some(range_offset) = open_range.take() {
                        let start = *values
                            .last()
                            .ok_or(LiteralError::OpenRange {
                                offset: range_offset,
                            })?;
                        if start <= end {
                            values.extend((start..=end).skip(1));
                        } else {
                            values.extend((end..start).rev());
                        }
                    } else if after_value {
                        return Err(Self::unexpected(offset, token));
                    } else {
                        values.push(end);
                    }
                    after_value = true;
                }
                Token::Comma if after_value || open_range.is_some() => after_value = false,
                Token::Ellipsis if !values.is_empty() && open_range.is_none() => {
                    open_range = Some(offset);
                    after_value = false;
                }
                Token::Ellipsis => return Err(LiteralError::OpenRange { offset }),
                Token::Close => {
                    if let Some(offset) = open_range {
                        return Err(LiteralError::OpenRange { offset });
                    }
                    return Ok(values);
                }
                Token::Comma | Token::Open => return Err(Self::unexpected(offset, token)),
            }
        }
    }
}

/// Parse a literal into its rows.
pub fn parse_rows(input: &str) -> Result<Vec<Vec<usize>>, LiteralError> {
    let tokens = tokenize(input)?;
    Parser { tokens, pos: 0 }.literal()
}

/// Parse a literal that is expected to hold a single list; several rows are concatenated.
pub fn parse_list(input: &str) -> Result<Vec<usize>, LiteralError> {
    Ok(parse_rows(input)?.concat())
}

/// Parse a byte count such as `64M`, `512KB` or `4096`.
pub fn parse_size(input: &str) -> Result<usize, LiteralError> {
    let invalid = || LiteralError::Size(input.to_string());

    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_suffix(['b', 'B'])
        .filter(|rest| !rest.is_empty())
        .unwrap_or(trimmed);
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k' | 'K') => (&trimmed[..trimmed.len() - 1], 1usize << 10),
        Some('m' | 'M') => (&trimmed[..trimmed.len() - 1], 1 << 20),
        Some('g' | 'G') => (&trimmed[..trimmed.len() - 1], 1 << 30),
        _ => (trimmed, 1),
    };
    let value: usize = digits.parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// A parsed literal as a command-line value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayLiteral(pub Vec<Vec<usize>>);

impl ArrayLiteral {
    pub fn rows(&self) -> &[Vec<usize>] {
        &self.0
    }
}

impl FromStr for ArrayLiteral {
    type Err = LiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rows(s).map(ArrayLiteral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_offsets() {
        let tokens = tokenize("[1, 20...3]").unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|&(offset, _)| offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 4, 6, 9, 10]);
        assert_eq!(tokens[3].1, Token::Number(20));
    }

    #[test]
    fn test_two_dots_are_rejected() {
        assert_eq!(
            tokenize("[0..3]"),
            Err(LiteralError::UnexpectedChar {
                found: '.',
                offset: 2
            })
        );
    }
}
