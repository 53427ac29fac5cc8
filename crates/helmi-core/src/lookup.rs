//! Lookup placeholder grammar
//!
//! Catalog templates embed typed placeholders:
//!
//! ```text
//! jdbc:mysql://{{ lookup('cluster', 'address') }}:{{ lookup('cluster', 'port:3306') }}/db
//! ```
//!
//! The grammar lives in `lookup.pest`. Whitespace is allowed between the
//! tokens of a placeholder but not inside the quotes; kinds are
//! `[A-Za-z0-9_]+` and paths `[A-Za-z0-9_/:.-]+`.
//!
//! Text that does not match is kept verbatim. Tokenizing is separate from
//! substitution: [`tokenize`] yields [`Segment`]s and [`expand`] feeds each
//! placeholder to a caller-supplied resolver.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::fmt;

#[derive(Parser)]
#[grammar = "lookup.pest"]
struct LookupParser;

/// What a placeholder resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    /// A deployed chart value
    Value,
    /// A generated (install) or deployed (bind) username
    Username,
    /// A generated (install) or deployed (bind) password
    Password,
    /// Cluster topology: `address`, `hostname`, `port`, `port:<n>`
    Cluster,
    /// A process environment variable
    Env,
}

impl LookupKind {
    /// Parse a kind name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "value" => Some(Self::Value),
            "username" => Some(Self::Username),
            "password" => Some(Self::Password),
            "cluster" => Some(Self::Cluster),
            "env" => Some(Self::Env),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Username => "username",
            Self::Password => "password",
            Self::Cluster => "cluster",
            Self::Env => "env",
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `{{ lookup('kind', 'path') }}` placeholder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupPlaceholder {
    pub kind: LookupKind,
    pub path: String,
}

impl LookupPlaceholder {
    pub fn new(kind: LookupKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl fmt::Display for LookupPlaceholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{ lookup('{}', '{}') }}}}", self.kind, self.path)
    }
}

/// A piece of a tokenized template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text copied to the output unchanged
    Literal(&'a str),
    /// A placeholder of a known kind
    Lookup(LookupPlaceholder),
    /// A well-formed placeholder of an unknown kind; expands to nothing
    Unsupported(&'a str),
}

/// Split a template into literal text and placeholders
pub fn tokenize(template: &str) -> Vec<Segment<'_>> {
    let pairs = match LookupParser::parse(Rule::template, template) {
        Ok(pairs) => pairs,
        Err(err) => {
            tracing::debug!(error = %err, template, "keeping template verbatim");
            return vec![Segment::Literal(template)];
        }
    };

    let mut segments = Vec::new();
    for pair in pairs {
        if pair.as_rule() == Rule::template {
            segments.extend(pair.into_inner().filter_map(segment));
        }
    }
    segments
}

fn segment(pair: Pair<'_, Rule>) -> Option<Segment<'_>> {
    match pair.as_rule() {
        Rule::literal => Some(Segment::Literal(pair.as_str())),
        Rule::placeholder => Some(placeholder(pair)),
        _ => None,
    }
}

fn placeholder(pair: Pair<'_, Rule>) -> Segment<'_> {
    let raw = pair.as_str();
    let mut kind = "";
    let mut path = "";

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::kind => kind = inner.as_str(),
            Rule::path => path = inner.as_str(),
            _ => {}
        }
    }

    match LookupKind::parse(kind) {
        Some(kind) => Segment::Lookup(LookupPlaceholder::new(kind, path)),
        None => Segment::Unsupported(raw),
    }
}

/// Replace every placeholder in `template` with what `resolve` returns
pub fn expand<F>(template: &str, mut resolve: F) -> String
where
    F: FnMut(&LookupPlaceholder) -> String,
{
    let mut out = String::with_capacity(template.len());
    for segment in tokenize(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Lookup(lookup) => out.push_str(&resolve(&lookup)),
            Segment::Unsupported(_) => {}
        }
    }
    out
}

/// Placeholders contained in a template, in order of appearance
pub fn placeholders(template: &str) -> Vec<LookupPlaceholder> {
    tokenize(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Lookup(lookup) => Some(lookup),
            _ => None,
        })
        .collect()
}
