use super::*;

lazy_static! {
  static ref TIMESTAMP: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}@\d{2}:\d{2}:\d{2}").unwrap();
  static ref NUMBER: Regex = Regex::new(r"^-?\d+(\.\d+)?").unwrap();
  static ref WORD: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*").unwrap();
}

/// Literal format of timestamps inside predicates, e.g. `2024-03-01@08:30:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d@%H:%M:%S";

/// A lexical token of the predicate language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
  LParen,
  RParen,
  /// `[c]` case-insensitivity modifier
  CaseFlag,
  /// Identifier, keyword, or dotted keypath
  Word(String),
  Str(String),
  Number(f64),
  Timestamp(DateTime<Utc>),
  /// Comparison and logical symbols such as `==`, `<=`, `&&`, `!`
  Symbol(&'static str),
}

/// Symbols, longest first so `<=` wins over `<`.
const SYMBOLS: [&str; 11] = ["==", "!=", "<>", "<=", ">=", "&&", "||", "=", "<", ">", "!"];

/// Splits a predicate into tokens paired with their byte offsets.
pub fn tokenize(input: &str) -> Result<Vec<(Token, usize)>> {
  let mut tokens = Vec::new();
  let mut pos = 0;

  while pos < input.len() {
    let rest = &input[pos..];
    let Some(c) = rest.chars().next() else { break };

    if c.is_whitespace() {
      pos += c.len_utf8();
      continue;
    }

    match c {
      '(' => {
        tokens.push((Token::LParen, pos));
        pos += 1;
      },
      ')' => {
        tokens.push((Token::RParen, pos));
        pos += 1;
      },
      '[' =>
        if rest.get(..3).is_some_and(|head| head.eq_ignore_ascii_case("[c]")) {
          tokens.push((Token::CaseFlag, pos));
          pos += 3;
        } else {
          return Err(ShelfError::Predicate {
            position: pos,
            message:  "unexpected '[' (relative date macros must be compiled first)".into(),
          });
        },
      '"' | '\'' => {
        let (value, consumed) = lex_string(rest, c, pos)?;
        tokens.push((Token::Str(value), pos));
        pos += consumed;
      },
      _ => {
        if let Some(m) = TIMESTAMP.find(rest) {
          let time = NaiveDateTime::parse_from_str(m.as_str(), TIMESTAMP_FORMAT)
            .map_err(|e| ShelfError::Predicate { position: pos, message: e.to_string() })?
            .and_utc();
          tokens.push((Token::Timestamp(time), pos));
          pos += m.end();
        } else if let Some(m) = NUMBER.find(rest) {
          let number = m
            .as_str()
            .parse::<f64>()
            .map_err(|e| ShelfError::Predicate { position: pos, message: e.to_string() })?;
          tokens.push((Token::Number(number), pos));
          pos += m.end();
        } else if let Some(m) = WORD.find(rest) {
          tokens.push((Token::Word(m.as_str().to_string()), pos));
          pos += m.end();
        } else if let Some(symbol) = SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
          tokens.push((Token::Symbol(*symbol), pos));
          pos += symbol.len();
        } else {
          return Err(ShelfError::Predicate {
            position: pos,
            message:  format!("unexpected character '{c}'"),
          });
        }
      },
    }
  }

  Ok(tokens)
}

/// Reads a quoted string starting at `rest[0]`, returning the unescaped value and the number of
/// bytes consumed including both quotes.
fn lex_string(rest: &str, quote: char, offset: usize) -> Result<(String, usize)> {
  let mut value = String::new();
  let mut chars = rest.char_indices().skip(1);

  while let Some((i, c)) = chars.next() {
    match c {
      '\\' => match chars.next() {
        Some((_, 'n')) => value.push('\n'),
        Some((_, 't')) => value.push('\t'),
        Some((_, escaped)) => value.push(escaped),
        None => break,
      },
      c if c == quote => return Ok((value, i + c.len_utf8())),
      c => value.push(c),
    }
  }

  Err(ShelfError::Predicate { position: offset, message: "unterminated string".into() })
}
