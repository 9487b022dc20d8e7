//! Boolean guard conditions for step `when` clauses.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! Or    := And ( 'or' And )*
//! And   := Unary ( 'and' Unary )*
//! Unary := '!' Atom | Atom
//! Atom  := '(' Or ')' | name | 'true' | 'false'
//! ```
//!
//! Names match `[a-z][a-zA-Z0-9_]*` and may not be one of the keywords
//! `and`, `or`, `true` or `false`. A condition prints back to a canonical,
//! minimally parenthesized string that re-parses to an equivalent tree.
//! Parenthesized groups nest at most [`MAX_NESTING`] deep.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use cairn_types::error::ConditionError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Condition tree
// ---------------------------------------------------------------------------

/// A parsed guard condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Condition {
    #[default]
    Always,
    Never,
    /// True when the named input is present and truthy.
    Truthy(String),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

/// Deepest parenthesized nesting accepted by the parser.
pub const MAX_NESTING: usize = 64;

const KEYWORDS: [&str; 4] = ["and", "or", "true", "false"];

const PREC_TOP: u8 = 0;
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_TRUTHY: u8 = 4;
const PREC_CONST: u8 = 5;

impl Condition {
    /// Parse condition text. Blank text is `Always`.
    pub fn parse(text: &str) -> Result<Self, ConditionError> {
        if text.trim().is_empty() {
            return Ok(Self::Always);
        }
        Parser::new(text).parse()
    }

    /// A bare name test. Fails with `InvalidName` unless `name` would parse
    /// back as the same name.
    pub fn truthy(name: impl Into<String>) -> Result<Self, ConditionError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self::Truthy(name))
    }

    /// Check every name in a tree assembled by hand.
    pub fn validate(&self) -> Result<(), ConditionError> {
        match self {
            Self::Always | Self::Never => Ok(()),
            Self::Truthy(name) => check_name(name),
            Self::Not(inner) => inner.validate(),
            Self::And(conditions) | Self::Or(conditions) => {
                conditions.iter().try_for_each(Condition::validate)
            }
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Self::Not(Box::new(condition))
    }

    /// Conjunction; no operands is `Always`, one operand is itself.
    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut conditions: Vec<Condition> = conditions.into_iter().collect();
        match conditions.len() {
            0 => Self::Always,
            1 => conditions.remove(0),
            _ => Self::And(conditions),
        }
    }

    /// Disjunction; no operands is `Never`, one operand is itself.
    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut conditions: Vec<Condition> = conditions.into_iter().collect();
        match conditions.len() {
            0 => Self::Never,
            1 => conditions.remove(0),
            _ => Self::Or(conditions),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }

    /// Evaluate against a set of named inputs.
    pub fn is_true<I>(&self, input: &I) -> bool
    where
        I: ConditionInput + ?Sized,
    {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Truthy(name) => input.lookup(name).is_some_and(is_truthy),
            Self::Not(inner) => !inner.is_true(input),
            Self::And(conditions) => conditions.iter().all(|c| c.is_true(input)),
            Self::Or(conditions) => conditions.iter().any(|c| c.is_true(input)),
        }
    }

    /// Sorted, de-duplicated input names referenced anywhere in the tree.
    pub fn names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names.into_iter().map(str::to_string).collect()
    }

    fn collect_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Self::Always | Self::Never => {}
            Self::Truthy(name) => {
                names.insert(name);
            }
            Self::Not(inner) => inner.collect_names(names),
            Self::And(conditions) | Self::Or(conditions) => {
                for condition in conditions {
                    condition.collect_names(names);
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Always | Self::Never => PREC_CONST,
            Self::Truthy(_) => PREC_TRUTHY,
            Self::Not(_) => PREC_NOT,
            Self::And(conditions) => match conditions.as_slice() {
                [] => PREC_CONST,
                [single] => single.precedence(),
                _ => PREC_AND,
            },
            Self::Or(conditions) => match conditions.as_slice() {
                [] => PREC_CONST,
                [single] => single.precedence(),
                _ => PREC_OR,
            },
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, context: u8) -> fmt::Result {
        let wrap = context > self.precedence();
        if wrap {
            f.write_str("(")?;
        }
        match self {
            Self::Always => f.write_str("true")?,
            Self::Never => f.write_str("false")?,
            Self::Truthy(name) => f.write_str(name)?,
            Self::Not(inner) => {
                f.write_str("!")?;
                // `!` only accepts an atom.
                inner.write(f, PREC_TRUTHY)?;
            }
            Self::And(conditions) => write_joined(f, conditions, " and ", PREC_AND, "true")?,
            Self::Or(conditions) => write_joined(f, conditions, " or ", PREC_OR, "false")?,
        }
        if wrap {
            f.write_str(")")?;
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<(), ConditionError> {
    if is_valid_name(name) {
        return Ok(());
    }
    Err(ConditionError::InvalidName {
        name: name.to_string(),
        text: name.to_string(),
        pos: 0,
    })
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    conditions: &[Condition],
    separator: &str,
    precedence: u8,
    empty: &str,
) -> fmt::Result {
    match conditions {
        [] => f.write_str(empty),
        [single] => single.write(f, precedence),
        _ => {
            for (index, condition) in conditions.iter().enumerate() {
                if index > 0 {
                    f.write_str(separator)?;
                }
                condition.write(f, precedence)?;
            }
            Ok(())
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, PREC_TOP)
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Named values a condition is evaluated against.
pub trait ConditionInput {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl ConditionInput for Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl ConditionInput for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl ConditionInput for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Only JSON objects carry names; any other value has none.
impl ConditionInput for Value {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|object| object.get(name))
    }
}

/// Truthiness of an input value.
///
/// `null`, `false`, zero, and empty strings, arrays or objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open,
    Close,
    Bang,
    Word(&'a str),
    End,
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Skip whitespace and return the next token with its byte offset.
    fn next(&mut self) -> (Token<'a>, usize) {
        let rest = &self.text[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        let start = self.pos;

        let Some(first) = trimmed.chars().next() else {
            return (Token::End, start);
        };
        let token = match first {
            '(' => Token::Open,
            ')' => Token::Close,
            '!' => Token::Bang,
            _ => {
                let len = trimmed
                    .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '!'))
                    .unwrap_or(trimmed.len());
                self.pos += len;
                return (Token::Word(&trimmed[..len]), start);
            }
        };
        self.pos += first.len_utf8();
        (token, start)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    scanner: Scanner<'a>,
    token: Token<'a>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let mut scanner = Scanner { text, pos: 0 };
        let (token, pos) = scanner.next();
        Self {
            scanner,
            token,
            pos,
            depth: 0,
        }
    }

    fn advance(&mut self) {
        let (token, pos) = self.scanner.next();
        self.token = token;
        self.pos = pos;
    }

    fn text(&self) -> String {
        self.scanner.text.to_string()
    }

    fn parse(mut self) -> Result<Condition, ConditionError> {
        let condition = self.parse_or()?;
        if self.token != Token::End {
            return Err(ConditionError::SyntaxError {
                text: self.text(),
                pos: self.pos,
            });
        }
        Ok(condition)
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionError> {
        let mut operands = vec![self.parse_and()?];
        while self.token == Token::Word("or") {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(Condition::or(operands))
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionError> {
        let mut operands = vec![self.parse_unary()?];
        while self.token == Token::Word("and") {
            self.advance();
            operands.push(self.parse_unary()?);
        }
        Ok(Condition::and(operands))
    }

    fn parse_unary(&mut self) -> Result<Condition, ConditionError> {
        if self.token == Token::Bang {
            self.advance();
            return Ok(Condition::not(self.parse_atom()?));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Condition, ConditionError> {
        match self.token {
            Token::Open => {
                if self.depth == MAX_NESTING {
                    return Err(ConditionError::SyntaxError {
                        text: self.text(),
                        pos: self.pos,
                    });
                }
                self.depth += 1;
                self.advance();
                let inner = self.parse_or()?;
                self.depth -= 1;
                if self.token != Token::Close {
                    return Err(ConditionError::MissingCloseParen {
                        text: self.text(),
                        pos: self.pos,
                    });
                }
                self.advance();
                Ok(inner)
            }
            Token::Word("true") => {
                self.advance();
                Ok(Condition::Always)
            }
            Token::Word("false") => {
                self.advance();
                Ok(Condition::Never)
            }
            Token::Word("and" | "or") | Token::Close | Token::Bang => {
                Err(ConditionError::SyntaxError {
                    text: self.text(),
                    pos: self.pos,
                })
            }
            Token::Word(word) => {
                if !is_valid_name(word) {
                    return Err(ConditionError::InvalidName {
                        name: word.to_string(),
                        text: self.text(),
                        pos: self.pos,
                    });
                }
                self.advance();
                Ok(Condition::Truthy(word.to_string()))
            }
            Token::End => Err(ConditionError::UnexpectedEnd {
                text: self.text(),
                pos: self.pos,
            }),
        }
    }
}

/// Whether `name` matches `[a-z][a-zA-Z0-9_]*` and is not a keyword.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let shaped = match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    shaped && !KEYWORDS.contains(&name)
}
