//! Typed row predicates and the filter-expression language that produces them.
//!
//! Every positionlist operation that touches a subset of rows takes a
//! [`Selection`]. Selections can be built in code or parsed from expressions
//! such as `Comment == 'First_cell' and DoseFactor >= 1.2` or
//! `Layer not in {1, 2}`. Field names are case-insensitive; an empty
//! expression selects every row.

use super::column::Column;
use super::entry::PositionlistEntry;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum SelectionError {
    #[error("Unexpected end of selection expression")]
    UnexpectedEnd,
    #[error("Unexpected '{token}' at position {position} in selection expression")]
    UnexpectedToken { token: String, position: usize },
    #[error("Unexpected character '{ch}' at position {position} in selection expression")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("Unterminated string starting at position {0}")]
    UnterminatedString(usize),
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    #[error("Field '{0}' cannot be used in a selection")]
    UnsupportedField(String),
}

/// Columns that can appear on the left-hand side of a predicate.
pub const SELECTABLE_COLUMNS: [Column; 17] = [
    Column::Id,
    Column::U,
    Column::V,
    Column::Comment,
    Column::Layer,
    Column::DoseFactor,
    Column::File,
    Column::Link,
    Column::Options,
    Column::Type,
    Column::Attribute,
    Column::Template,
    Column::Dwelltime,
    Column::StepsizeU,
    Column::StepsizeV,
    Column::SizeU,
    Column::SizeV,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Number(v as f64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(t) if t.contains('\'') => write!(f, "\"{}\"", t),
            Value::Text(t) => write!(f, "'{}'", t),
        }
    }
}

/// A predicate over positionlist rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    #[default]
    All,
    Compare {
        column: Column,
        op: Comparison,
        value: Value,
    },
    In {
        column: Column,
        values: Vec<Value>,
        negated: bool,
    },
    And(Box<Selection>, Box<Selection>),
    Or(Box<Selection>, Box<Selection>),
    Not(Box<Selection>),
}

impl Selection {
    pub fn all() -> Self {
        Selection::All
    }

    pub fn compare(
        column: Column,
        op: Comparison,
        value: impl Into<Value>,
    ) -> Result<Self, SelectionError> {
        check_selectable(column)?;
        Ok(Selection::Compare {
            column,
            op,
            value: value.into(),
        })
    }

    pub fn is_in<V: Into<Value>>(
        column: Column,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, SelectionError> {
        check_selectable(column)?;
        Ok(Selection::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    /// Rows exposing the named cell.
    pub fn cell(name: &str) -> Self {
        Selection::Compare {
            column: Column::Comment,
            op: Comparison::Eq,
            value: Value::Text(name.to_string()),
        }
    }

    /// Rows whose ID is one of `ids`.
    pub fn ids(ids: impl IntoIterator<Item = usize>) -> Self {
        Selection::In {
            column: Column::Id,
            values: ids.into_iter().map(Value::from).collect(),
            negated: false,
        }
    }

    pub fn and(self, other: Selection) -> Self {
        Selection::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Selection) -> Self {
        Selection::Or(Box::new(self), Box::new(other))
    }

    /// Parses a filter expression. Blank input selects everything.
    pub fn parse(expr: &str) -> Result<Self, SelectionError> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Ok(Selection::All);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let selection = parser.parse_or()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(selection),
            Some((token, position)) => Err(SelectionError::UnexpectedToken {
                token: token.to_string(),
                position: *position,
            }),
        }
    }

    pub fn matches(&self, entry: &PositionlistEntry) -> bool {
        match self {
            Selection::All => true,
            Selection::Compare { column, op, value } => {
                field_value(entry, *column).compare(*op, value)
            }
            Selection::In {
                column,
                values,
                negated,
            } => {
                let field = field_value(entry, *column);
                if field.is_missing() {
                    return *negated;
                }
                let found = values.iter().any(|v| field.compare(Comparison::Eq, v));
                found != *negated
            }
            Selection::And(a, b) => a.matches(entry) && b.matches(entry),
            Selection::Or(a, b) => a.matches(entry) || b.matches(entry),
            Selection::Not(inner) => !inner.matches(entry),
        }
    }
}

impl std::ops::Not for Selection {
    type Output = Selection;

    fn not(self) -> Self::Output {
        Selection::Not(Box::new(self))
    }
}

impl FromStr for Selection {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Compare { column, op, value } => {
                write!(f, "{} {} {}", column, op.symbol(), value)
            }
            Selection::In {
                column,
                values,
                negated,
            } => {
                let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
                let keyword = if *negated { "not in" } else { "in" };
                write!(f, "{} {} {{{}}}", column, keyword, joined.join(", "))
            }
            Selection::And(a, b) => write!(f, "({} and {})", a, b),
            Selection::Or(a, b) => write!(f, "({} or {})", a, b),
            Selection::Not(inner) => write!(f, "not {}", inner),
        }
    }
}

fn check_selectable(column: Column) -> Result<(), SelectionError> {
    if SELECTABLE_COLUMNS.contains(&column) {
        Ok(())
    } else {
        Err(SelectionError::UnsupportedField(column.name().to_string()))
    }
}

enum FieldValue<'a> {
    Missing,
    Number(f64),
    Text(&'a str),
    Layers(&'a [u32]),
}

impl FieldValue<'_> {
    fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Layers(layers) => layers.is_empty(),
            _ => false,
        }
    }

    fn compare(&self, op: Comparison, value: &Value) -> bool {
        if self.is_missing() {
            return op == Comparison::Ne;
        }
        match self {
            FieldValue::Missing => op == Comparison::Ne,
            FieldValue::Number(x) => compare_number(*x, op, value),
            FieldValue::Layers(layers) => layers
                .iter()
                .any(|&layer| compare_number(layer as f64, op, value)),
            FieldValue::Text(text) => match value {
                Value::Text(other) => op.holds((*text).cmp(other.as_str())),
                Value::Number(n) => match text.trim().parse::<f64>() {
                    Ok(x) => compare_number(x, op, &Value::Number(*n)),
                    Err(_) => op == Comparison::Ne,
                },
            },
        }
    }
}

fn compare_number(x: f64, op: Comparison, value: &Value) -> bool {
    let y = match value {
        Value::Number(y) => *y,
        Value::Text(t) => match t.trim().parse::<f64>() {
            Ok(y) => y,
            Err(_) => return op == Comparison::Ne,
        },
    };
    match x.partial_cmp(&y) {
        Some(ordering) => op.holds(ordering),
        None => op == Comparison::Ne,
    }
}

fn optional_text(value: &Option<String>) -> FieldValue<'_> {
    value
        .as_deref()
        .map_or(FieldValue::Missing, FieldValue::Text)
}

fn optional_number(value: Option<f64>) -> FieldValue<'static> {
    value.map_or(FieldValue::Missing, FieldValue::Number)
}

fn field_value(entry: &PositionlistEntry, column: Column) -> FieldValue<'_> {
    match column {
        Column::Id => FieldValue::Number(entry.id as f64),
        Column::U => FieldValue::Number(entry.u),
        Column::V => FieldValue::Number(entry.v),
        Column::Comment => FieldValue::Text(&entry.comment),
        Column::Layer => FieldValue::Layers(&entry.layer),
        Column::DoseFactor => FieldValue::Number(entry.dose_factor),
        Column::File => optional_text(&entry.file),
        Column::Link => optional_text(&entry.link),
        Column::Options => entry
            .options
            .map_or(FieldValue::Missing, |o| FieldValue::Text(o.as_str())),
        Column::Type => optional_text(&entry.entry_type),
        Column::Attribute => optional_text(&entry.attribute),
        Column::Template => optional_text(&entry.template),
        Column::Dwelltime => optional_number(entry.dwelltime),
        Column::StepsizeU => optional_number(entry.stepsize_u),
        Column::StepsizeV => optional_number(entry.stepsize_v),
        Column::SizeU => optional_number(entry.size_u),
        Column::SizeV => optional_number(entry.size_v),
        _ => FieldValue::Missing,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    Cmp(Comparison),
    And,
    Or,
    Not,
    In,
    All,
    Open(char),
    Close(char),
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => f.write_str(s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Text(t) => write!(f, "'{}'", t),
            Token::Cmp(op) => f.write_str(op.symbol()),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Not => f.write_str("not"),
            Token::In => f.write_str("in"),
            Token::All => f.write_str("all"),
            Token::Open(c) | Token::Close(c) => write!(f, "{}", c),
            Token::Comma => f.write_str(","),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<(Token, usize)>, SelectionError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token = match c {
            '(' | '{' | '[' => {
                i += 1;
                Token::Open(c)
            }
            ')' | '}' | ']' => {
                i += 1;
                Token::Close(c)
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '=' => {
                i += if next == Some('=') { 2 } else { 1 };
                Token::Cmp(Comparison::Eq)
            }
            '!' if next == Some('=') => {
                i += 2;
                Token::Cmp(Comparison::Ne)
            }
            '!' => {
                i += 1;
                Token::Not
            }
            '<' | '>' => {
                let inclusive = next == Some('=');
                i += if inclusive { 2 } else { 1 };
                Token::Cmp(match (c, inclusive) {
                    ('<', false) => Comparison::Lt,
                    ('<', true) => Comparison::Le,
                    ('>', false) => Comparison::Gt,
                    _ => Comparison::Ge,
                })
            }
            '&' => {
                i += if next == Some('&') { 2 } else { 1 };
                Token::And
            }
            '|' if next == Some('|') => {
                i += 2;
                Token::Or
            }
            '\'' | '"' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or(SelectionError::UnterminatedString(start))?;
                let text: String = chars[i + 1..i + 1 + close].iter().collect();
                i += close + 2;
                Token::Text(text)
            }
            c if c.is_ascii_digit()
                || c == '.'
                || ((c == '-' || c == '+')
                    && next.is_some_and(|n| n.is_ascii_digit() || n == '.')) =>
            {
                i += 1;
                while let Some(&ch) = chars.get(i) {
                    let exponent_sign =
                        (ch == '-' || ch == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exponent_sign
                    {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| SelectionError::InvalidNumber(literal.clone()))?;
                Token::Number(number)
            }
            c if c.is_alphabetic() || c == '_' => {
                while chars
                    .get(i)
                    .is_some_and(|ch| ch.is_alphanumeric() || *ch == '_' || *ch == '-')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "all" => Token::All,
                    _ => Token::Ident(word),
                }
            }
            _ => return Err(SelectionError::UnexpectedCharacter { ch: c, position: start }),
        };
        tokens.push((token, start));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Result<(Token, usize), SelectionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(SelectionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected((token, position): (Token, usize)) -> SelectionError {
        SelectionError::UnexpectedToken {
            token: token.to_string(),
            position,
        }
    }

    fn parse_or(&mut self) -> Result<Selection, SelectionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            left = left.or(self.parse_and()?);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Selection, SelectionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            left = left.and(self.parse_unary()?);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Selection, SelectionError> {
        let (token, position) = self.advance()?;
        match token {
            Token::Not => Ok(!self.parse_unary()?),
            Token::All => Ok(Selection::All),
            Token::Open('(') => {
                let inner = self.parse_or()?;
                match self.advance()? {
                    (Token::Close(')'), _) => Ok(inner),
                    other => Err(Self::unexpected(other)),
                }
            }
            Token::Ident(name) => self.parse_predicate(&name),
            other => Err(Self::unexpected((other, position))),
        }
    }

    fn parse_predicate(&mut self, name: &str) -> Result<Selection, SelectionError> {
        let column = Column::from_name_ignore_case(name)
            .ok_or_else(|| SelectionError::UnknownField(name.to_string()))?;
        check_selectable(column)?;

        match self.advance()? {
            (Token::Cmp(op), _) => Ok(Selection::Compare {
                column,
                op,
                value: self.parse_value()?,
            }),
            (Token::In, _) => Ok(Selection::In {
                column,
                values: self.parse_set()?,
                negated: false,
            }),
            (Token::Not, _) => match self.advance()? {
                (Token::In, _) => Ok(Selection::In {
                    column,
                    values: self.parse_set()?,
                    negated: true,
                }),
                other => Err(Self::unexpected(other)),
            },
            other => Err(Self::unexpected(other)),
        }
    }

    fn parse_value(&mut self) -> Result<Value, SelectionError> {
        match self.advance()? {
            (Token::Number(n), _) => Ok(Value::Number(n)),
            (Token::Text(t), _) => Ok(Value::Text(t)),
            other => Err(Self::unexpected(other)),
        }
    }

    fn parse_set(&mut self) -> Result<Vec<Value>, SelectionError> {
        let close = match self.advance()? {
            (Token::Open('{'), _) => '}',
            (Token::Open('['), _) => ']',
            other => return Err(Self::unexpected(other)),
        };
        let mut values = vec![self.parse_value()?];
        loop {
            match self.advance()? {
                (Token::Comma, _) => values.push(self.parse_value()?),
                (Token::Close(c), _) if c == close => return Ok(values),
                other => return Err(Self::unexpected(other)),
            }
        }
    }
}
