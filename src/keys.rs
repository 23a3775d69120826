//! Key paths addressing primitives relative to an argument scope
//!
//! A key path is a slash-delimited string such as `arg0/Line1/Point0`. Each
//! segment is either `argN`, an index into the current scope's argument list,
//! or the name of a child primitive. Keys are lexed and parsed once, when a
//! constraint is constructed; composition and resolution then work on the
//! parsed segments.

use std::fmt;
use std::str::FromStr;

use logos::Logos;

use crate::containers::Node;
use crate::error::{LayoutError, Span};

/// Tokens of a key path
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum KeyToken {
    #[token("/")]
    Slash,

    /// Positional argument reference
    #[regex(r"arg[0-9]+", |lex| lex.slice()[3..].parse::<usize>().ok(), priority = 3)]
    Arg(usize),

    /// Child name; anything up to the next separator
    #[regex(r"[^/]+", |lex| lex.slice().to_string(), priority = 1)]
    Name(String),
}

/// Lex a key path into tokens with spans
///
/// Unrecognised input is reported as `Err(span)`.
pub fn lex(input: &str) -> impl Iterator<Item = Result<(KeyToken, Span), Span>> + '_ {
    KeyToken::lexer(input)
        .spanned()
        .map(|(tok, span)| tok.map(|t| (t, span.clone())).map_err(|_| span))
}

/// One segment of a key path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Arg(usize),
    Child(String),
}

impl Segment {
    /// The child name this segment selects in a tree
    pub fn name(&self) -> String {
        match self {
            Segment::Arg(n) => arg_name(*n),
            Segment::Child(name) => name.clone(),
        }
    }
}

/// Name of the `n`th positional argument in an argument scope
pub fn arg_name(n: usize) -> String {
    format!("arg{}", n)
}

/// A parsed key path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    /// Parse a slash-delimited key
    ///
    /// The empty string parses to the empty path, which refers to the scope root.
    pub fn parse(input: &str) -> Result<Self, LayoutError> {
        let mut segments = Vec::new();
        let mut expect_segment = true;

        for item in lex(input) {
            let malformed = |span: Span| {
                LayoutError::construction(
                    "key path",
                    format!("malformed key '{}' at byte {}", input, span.start),
                )
            };
            let (token, span) = item.map_err(malformed)?;
            match (token, expect_segment) {
                (KeyToken::Arg(n), true) => segments.push(Segment::Arg(n)),
                (KeyToken::Name(name), true) => segments.push(Segment::Child(name)),
                (KeyToken::Slash, false) => {
                    expect_segment = true;
                    continue;
                }
                _ => return Err(malformed(span)),
            }
            expect_segment = false;
        }

        if expect_segment && !segments.is_empty() {
            return Err(LayoutError::construction(
                "key path",
                format!("key '{}' ends with a separator", input),
            ));
        }
        Ok(Self { segments })
    }

    /// The root-scope key `argN`
    pub fn arg(n: usize) -> Self {
        Self {
            segments: vec![Segment::Arg(n)],
        }
    }

    /// Root-scope keys `arg0..argN-1`
    pub fn args(count: usize) -> Vec<Self> {
        (0..count).map(Self::arg).collect()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The argument index of a relative key (`argN/...`)
    pub fn arg_index(&self) -> Option<usize> {
        match self.segments.first() {
            Some(Segment::Arg(n)) => Some(*n),
            _ => None,
        }
    }

    /// Append child segments
    pub fn join(&self, suffix: &[Segment]) -> Self {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(suffix);
        Self { segments }
    }

    /// Rewrite a relative key against the parent's resolved argument keys
    ///
    /// `argN/Suffix` becomes `parent_keys[N]/Suffix`. Applied at each nesting
    /// level, this turns a child's keys into keys against the outermost scope.
    pub fn compose(&self, parent_keys: &[KeyPath]) -> Result<KeyPath, LayoutError> {
        let n = self.arg_index().ok_or_else(|| {
            LayoutError::construction(
                "child argument key",
                format!("'{}' must start with an 'argN' segment", self),
            )
        })?;
        let parent = parent_keys.get(n).ok_or_else(|| {
            LayoutError::mismatch(
                format!("argument key '{}'", self),
                format!("fewer than {} parent arguments", n + 1),
                format!("{} parent arguments", parent_keys.len()),
            )
        })?;
        Ok(parent.join(&self.segments[1..]))
    }

    /// Walk `root` segment by segment
    pub fn resolve<'a, V>(&self, root: &'a Node<V>) -> Result<&'a Node<V>, LayoutError> {
        let mut node = root;
        let mut offset = 0;
        for segment in &self.segments {
            let name = segment.name();
            let span = offset..offset + name.len();
            offset = span.end + 1;
            node = node
                .child(&name)
                .ok_or_else(|| LayoutError::missing_segment(self.to_string(), name.clone(), span))?;
        }
        Ok(node)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match segment {
                Segment::Arg(n) => write!(f, "arg{}", n)?,
                Segment::Child(name) => f.write_str(name)?,
            }
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse a list of keys
pub fn parse_keys<S: AsRef<str>>(keys: &[S]) -> Result<Vec<KeyPath>, LayoutError> {
    keys.iter().map(|k| KeyPath::parse(k.as_ref())).collect()
}
