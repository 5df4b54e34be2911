//! Parser and evaluator for the advanced query language.
//!
//! Advanced-mode filters are surfaced to users as a small predicate language, and the filter
//! compiler emits the same language for the general, flagged, tag and folder clauses. This module
//! turns a predicate string into an expression tree that can be matched against
//! [`PaperDraft`]s, so the bundled record store can execute every compiled filter.
//!
//! # Grammar
//!
//! ```text
//! predicate  := or_expr [ "LIMIT(" n ")" ]
//! or_expr    := and_expr { ("OR" | "||") and_expr }
//! and_expr   := not_expr { ("AND" | "&&") not_expr }
//! not_expr   := ("NOT" | "!") not_expr | primary
//! primary    := "(" or_expr ")" | "TRUEPREDICATE" | "FALSEPREDICATE" | comparison
//! comparison := ["ANY" | "NONE"] keypath operator ["[c]"] literal
//! ```
//!
//! # Examples
//!
//! ```
//! use shelf::{entity::PaperDraft, predicate::Predicate};
//!
//! let predicate = Predicate::parse(r#"title LIKE[c] "*graph*" AND flag == true"#).unwrap();
//!
//! let mut draft = PaperDraft::new("Graph Neural Networks");
//! assert!(!predicate.matches(&draft));
//! draft.flag = true;
//! assert!(predicate.matches(&draft));
//! ```

use chrono::NaiveDateTime;

use self::lexer::{tokenize, Token};
pub use self::lexer::TIMESTAMP_FORMAT;
use super::*;

mod lexer;

/// A parsed, executable predicate.
#[derive(Debug, Clone)]
pub struct Predicate {
  /// `None` matches everything
  expr:  Option<Expr>,
  /// Trailing `LIMIT(n)` directive
  limit: Option<usize>,
}

/// Expression tree of a predicate.
#[derive(Debug, Clone)]
enum Expr {
  True,
  False,
  Not(Box<Expr>),
  And(Box<Expr>, Box<Expr>),
  Or(Box<Expr>, Box<Expr>),
  Compare(Comparison),
}

/// A single `keypath op literal` comparison.
#[derive(Debug, Clone)]
struct Comparison {
  field:            Field,
  operator:         Operator,
  case_insensitive: bool,
  literal:          Literal,
  /// `NONE` quantifier on collection keypaths
  negated:          bool,
  /// Compiled wildcard pattern for `LIKE`
  pattern:          Option<Regex>,
}

/// Keypaths the evaluator can resolve on a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Id,
  Title,
  Authors,
  Publication,
  PubTime,
  Note,
  Flag,
  AddTime,
  MainUrl,
  Doi,
  Arxiv,
  TagNames,
  FolderNames,
  Fulltext,
}

impl FromStr for Field {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match &s.to_lowercase() as &str {
      "id" => Ok(Field::Id),
      "title" => Ok(Field::Title),
      "authors" => Ok(Field::Authors),
      "publication" => Ok(Field::Publication),
      "pubtime" => Ok(Field::PubTime),
      "note" => Ok(Field::Note),
      "flag" => Ok(Field::Flag),
      "addtime" => Ok(Field::AddTime),
      "mainurl" => Ok(Field::MainUrl),
      "doi" => Ok(Field::Doi),
      "arxiv" => Ok(Field::Arxiv),
      "tags.name" => Ok(Field::TagNames),
      "folders.name" => Ok(Field::FolderNames),
      "fulltext" => Ok(Field::Fulltext),
      _ => Err(format!("unknown keypath '{s}'")),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  Like,
  Contains,
  BeginsWith,
  EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
  Str(String),
  Number(f64),
  Bool(bool),
  Time(DateTime<Utc>),
  Null,
}

/// A value read off a draft for comparison.
enum FieldValue<'a> {
  Str(&'a str),
  Bool(bool),
  Time(DateTime<Utc>),
  List(Vec<&'a str>),
  Null,
}

impl Predicate {
  /// Parses a predicate. Blank input yields the match-all predicate.
  pub fn parse(input: &str) -> Result<Self> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
      return Ok(Self { expr: None, limit: None });
    }
    let mut parser = Parser { tokens, pos: 0, end: input.len(), depth: 0 };
    let expr = parser.parse_or()?;
    let limit = parser.parse_limit()?;
    if let Some((token, position)) = parser.tokens.get(parser.pos) {
      return Err(ShelfError::Predicate { position: *position, message: format!("unexpected {token:?}") });
    }
    Ok(Self { expr: Some(expr), limit })
  }

  /// The predicate matching every draft.
  pub fn all() -> Self { Self { expr: None, limit: None } }

  /// Whether the draft satisfies the predicate.
  pub fn matches(&self, draft: &PaperDraft) -> bool {
    self.expr.as_ref().map_or(true, |expr| expr.evaluate(draft))
  }

  /// The `LIMIT(n)` directive, if any.
  pub fn limit(&self) -> Option<usize> { self.limit }

  /// Keeps the matching drafts, in order. The limit is not applied.
  pub fn filter(&self, drafts: Vec<PaperDraft>) -> Vec<PaperDraft> {
    drafts.into_iter().filter(|draft| self.matches(draft)).collect()
  }
}

impl Expr {
  fn evaluate(&self, draft: &PaperDraft) -> bool {
    match self {
      Expr::True => true,
      Expr::False => false,
      Expr::Not(inner) => !inner.evaluate(draft),
      Expr::And(lhs, rhs) => lhs.evaluate(draft) && rhs.evaluate(draft),
      Expr::Or(lhs, rhs) => lhs.evaluate(draft) || rhs.evaluate(draft),
      Expr::Compare(comparison) => comparison.evaluate(draft),
    }
  }
}

impl Comparison {
  fn evaluate(&self, draft: &PaperDraft) -> bool {
    let id = draft.id.to_string();
    let value = match self.field {
      Field::Id => FieldValue::Str(&id),
      Field::Title => FieldValue::Str(&draft.title),
      Field::Authors => FieldValue::Str(&draft.authors),
      Field::Publication => FieldValue::Str(&draft.publication),
      Field::PubTime => FieldValue::Str(&draft.pub_time),
      Field::Note => FieldValue::Str(&draft.note),
      Field::Flag => FieldValue::Bool(draft.flag),
      Field::AddTime => FieldValue::Time(draft.add_time),
      Field::MainUrl => FieldValue::Str(&draft.main_url),
      Field::Doi => draft.doi.as_deref().map_or(FieldValue::Null, FieldValue::Str),
      Field::Arxiv => draft.arxiv.as_deref().map_or(FieldValue::Null, FieldValue::Str),
      Field::TagNames => FieldValue::List(draft.tags.iter().map(|t| t.name.as_str()).collect()),
      Field::FolderNames =>
        FieldValue::List(draft.folders.iter().map(|f| f.name.as_str()).collect()),
      // Full-text content lives in the cache, never on the record.
      Field::Fulltext => return false,
    };

    match value {
      FieldValue::List(items) => {
        let any = items.iter().any(|item| self.compare_str(item));
        any != self.negated
      },
      value => self.compare(value),
    }
  }

  fn compare(&self, value: FieldValue<'_>) -> bool {
    match (value, &self.literal) {
      (FieldValue::Null, Literal::Null) => self.operator == Operator::Eq,
      (FieldValue::Null, _) => self.operator == Operator::Ne,
      (FieldValue::Str(s), Literal::Null) => match self.operator {
        Operator::Eq => s.is_empty(),
        Operator::Ne => !s.is_empty(),
        _ => false,
      },
      (FieldValue::Str(s), _) => self.compare_str(s),
      (FieldValue::Bool(b), Literal::Bool(expected)) => match self.operator {
        Operator::Eq => b == *expected,
        Operator::Ne => b != *expected,
        _ => false,
      },
      (FieldValue::Time(t), Literal::Time(expected)) => self.compare_ordering(t.cmp(expected)),
      _ => false,
    }
  }

  fn compare_str(&self, value: &str) -> bool {
    match &self.literal {
      Literal::Str(expected) => {
        if let Some(pattern) = &self.pattern {
          return pattern.is_match(value);
        }
        let (value, expected) = if self.case_insensitive {
          (value.to_lowercase(), expected.to_lowercase())
        } else {
          (value.to_string(), expected.clone())
        };
        match self.operator {
          Operator::Contains => value.contains(&expected),
          Operator::BeginsWith => value.starts_with(&expected),
          Operator::EndsWith => value.ends_with(&expected),
          Operator::Like => false,
          _ => self.compare_ordering(value.as_str().cmp(expected.as_str())),
        }
      },
      Literal::Number(expected) => value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|v| v.partial_cmp(expected))
        .is_some_and(|ordering| self.compare_ordering(ordering)),
      Literal::Null => match self.operator {
        Operator::Eq => value.is_empty(),
        Operator::Ne => !value.is_empty(),
        _ => false,
      },
      Literal::Bool(_) | Literal::Time(_) => false,
    }
  }

  fn compare_ordering(&self, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match self.operator {
      Operator::Eq => ordering == Equal,
      Operator::Ne => ordering != Equal,
      Operator::Lt => ordering == Less,
      Operator::Le => ordering != Greater,
      Operator::Gt => ordering == Greater,
      Operator::Ge => ordering != Less,
      _ => false,
    }
  }
}

/// Converts a `LIKE` pattern (`*` any run, `?` one character) into an anchored regex.
fn like_pattern(pattern: &str, case_insensitive: bool) -> std::result::Result<Regex, regex::Error> {
  let mut source = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
  let mut literal = [0u8; 4];
  for c in pattern.chars() {
    match c {
      '*' => source.push_str(".*"),
      '?' => source.push('.'),
      c => source.push_str(&regex::escape(c.encode_utf8(&mut literal))),
    }
  }
  source.push('$');
  Regex::new(&source)
}

/// How deep groups and negations may nest before parsing gives up.
const MAX_NESTING: usize = 256;

/// Recursive-descent parser over the token stream.
struct Parser {
  tokens: Vec<(Token, usize)>,
  pos:    usize,
  /// Byte length of the input, reported for errors at end of input
  end:    usize,
  /// Current nesting of groups and negations
  depth:  usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos).map(|(token, _)| token) }

  fn position(&self) -> usize { self.tokens.get(self.pos).map_or(self.end, |(_, pos)| *pos) }

  fn error<T>(&self, message: impl Into<String>) -> Result<T> {
    Err(ShelfError::Predicate { position: self.position(), message: message.into() })
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  /// Consumes the next token if it is the given keyword (case-insensitive).
  fn eat_keyword(&mut self, keyword: &str) -> bool {
    match self.peek() {
      Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword) => {
        self.pos += 1;
        true
      },
      _ => false,
    }
  }

  fn eat_symbol(&mut self, symbol: &str) -> bool {
    match self.peek() {
      Some(Token::Symbol(s)) if *s == symbol => {
        self.pos += 1;
        true
      },
      _ => false,
    }
  }

  fn parse_or(&mut self) -> Result<Expr> {
    let mut expr = self.parse_and()?;
    while self.eat_keyword("OR") || self.eat_symbol("||") {
      let rhs = self.parse_and()?;
      expr = Expr::Or(Box::new(expr), Box::new(rhs));
    }
    Ok(expr)
  }

  fn parse_and(&mut self) -> Result<Expr> {
    let mut expr = self.parse_not()?;
    while self.eat_keyword("AND") || self.eat_symbol("&&") {
      let rhs = self.parse_not()?;
      expr = Expr::And(Box::new(expr), Box::new(rhs));
    }
    Ok(expr)
  }

  fn parse_not(&mut self) -> Result<Expr> {
    if self.eat_keyword("NOT") || self.eat_symbol("!") {
      let operand = self.nested(Self::parse_not)?;
      return Ok(Expr::Not(Box::new(operand)));
    }
    self.parse_primary()
  }

  /// Runs `parse` one nesting level deeper, refusing to go past [`MAX_NESTING`].
  fn nested(&mut self, parse: fn(&mut Self) -> Result<Expr>) -> Result<Expr> {
    if self.depth >= MAX_NESTING {
      return self.error(format!("nesting deeper than {MAX_NESTING} levels"));
    }
    self.depth += 1;
    let expr = parse(self);
    self.depth -= 1;
    expr
  }

  fn parse_primary(&mut self) -> Result<Expr> {
    match self.peek() {
      Some(Token::LParen) => {
        self.pos += 1;
        let expr = self.nested(Self::parse_or)?;
        match self.next() {
          Some(Token::RParen) => Ok(expr),
          _ => self.error("expected ')'"),
        }
      },
      Some(Token::Word(word)) if word.eq_ignore_ascii_case("TRUEPREDICATE") => {
        self.pos += 1;
        Ok(Expr::True)
      },
      Some(Token::Word(word)) if word.eq_ignore_ascii_case("FALSEPREDICATE") => {
        self.pos += 1;
        Ok(Expr::False)
      },
      Some(Token::Word(_)) => self.parse_comparison().map(Expr::Compare),
      Some(token) => self.error(format!("expected a comparison, found {token:?}")),
      None => self.error("unexpected end of predicate"),
    }
  }

  fn parse_comparison(&mut self) -> Result<Comparison> {
    let negated = if self.eat_keyword("NONE") {
      true
    } else {
      self.eat_keyword("ANY");
      false
    };

    let keypath_position = self.position();
    let field = match self.next() {
      Some(Token::Word(word)) => Field::from_str(&word)
        .map_err(|message| ShelfError::Predicate { position: keypath_position, message })?,
      _ => return self.error("expected a keypath"),
    };

    let operator = match self.next() {
      Some(Token::Symbol("==")) | Some(Token::Symbol("=")) => Operator::Eq,
      Some(Token::Symbol("!=")) | Some(Token::Symbol("<>")) => Operator::Ne,
      Some(Token::Symbol("<")) => Operator::Lt,
      Some(Token::Symbol("<=")) => Operator::Le,
      Some(Token::Symbol(">")) => Operator::Gt,
      Some(Token::Symbol(">=")) => Operator::Ge,
      Some(Token::Word(word)) => match &word.to_uppercase() as &str {
        "LIKE" => Operator::Like,
        "CONTAINS" => Operator::Contains,
        "BEGINSWITH" => Operator::BeginsWith,
        "ENDSWITH" => Operator::EndsWith,
        _ => return self.error(format!("unknown operator '{word}'")),
      },
      _ => return self.error("expected an operator"),
    };

    let case_insensitive = matches!(self.peek(), Some(Token::CaseFlag));
    if case_insensitive {
      self.pos += 1;
    }

    let literal = match self.next() {
      Some(Token::Str(s)) => Literal::Str(s),
      Some(Token::Number(n)) => Literal::Number(n),
      Some(Token::Timestamp(t)) => Literal::Time(t),
      Some(Token::Word(word)) => match &word.to_lowercase() as &str {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        "null" | "nil" => Literal::Null,
        _ => return self.error(format!("expected a literal, found '{word}'")),
      },
      _ => return self.error("expected a literal"),
    };

    let pattern = match (&operator, &literal) {
      (Operator::Like, Literal::Str(pattern)) => Some(
        like_pattern(pattern, case_insensitive)
          .map_err(|e| ShelfError::Predicate { position: keypath_position, message: e.to_string() })?,
      ),
      (Operator::Like, _) => return self.error("LIKE expects a string pattern"),
      _ => None,
    };

    Ok(Comparison { field, operator, case_insensitive, literal, negated, pattern })
  }

  /// Parses an optional trailing `LIMIT(n)`.
  fn parse_limit(&mut self) -> Result<Option<usize>> {
    if !self.eat_keyword("LIMIT") {
      return Ok(None);
    }
    if self.next() != Some(Token::LParen) {
      return self.error("expected '(' after LIMIT");
    }
    let limit = match self.next() {
      Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => n as usize,
      _ => return self.error("LIMIT expects a non-negative integer"),
    };
    if self.next() != Some(Token::RParen) {
      return self.error("expected ')' after LIMIT");
    }
    Ok(Some(limit))
  }
}
