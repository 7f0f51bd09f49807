use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{QueryError, QueryResult};
use crate::field::Filterable;

/// Clause operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// Bare field name: the field exists.
    Present,
    Eq,
    Ne,
    /// Substring match.
    Contains,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    /// Two-character operators first so `>=` is not read as `>`.
    const SYMBOLS: [(&'static str, Op); 7] = [
        ("==", Op::Eq),
        ("!=", Op::Ne),
        ("~=", Op::Contains),
        (">=", Op::Ge),
        ("<=", Op::Le),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Present => "",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Contains => "~=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One `field op value` test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub op: Op,
    pub value: String,
}

impl Clause {
    /// A record without the field never matches, whatever the operator.
    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        let Some(actual) = item.field(&self.field) else {
            return false;
        };
        match self.op {
            Op::Present => true,
            Op::Contains => actual.contains(&self.value),
            Op::Ne => actual.compare(&self.value) != Some(Ordering::Equal),
            op => match actual.compare(&self.value) {
                Some(ord) => match op {
                    Op::Eq => ord == Ordering::Equal,
                    Op::Gt => ord == Ordering::Greater,
                    Op::Ge => ord != Ordering::Less,
                    Op::Lt => ord == Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                    _ => false,
                },
                None => false,
            },
        }
    }
}

/// A conjunction of clauses parsed from one filter string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    source: String,
    clauses: Vec<Clause>,
}

impl Filter {
    /// Parse a filter string. Blank input yields a filter that matches all.
    pub fn parse(source: &str) -> QueryResult<Self> {
        let clauses = Parser::new(source).clauses()?;
        Ok(Self {
            source: source.to_string(),
            clauses,
        })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        self.clauses.iter().all(|c| c.matches(item))
    }
}

impl FromStr for Filter {
    type Err = QueryError;

    fn from_str(s: &str) -> QueryResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Filters combined with OR. The empty set matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    /// Parse every string, failing on the first malformed one.
    pub fn parse<I, S>(sources: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filters = sources
            .into_iter()
            .map(|s| Filter::parse(s.as_ref()))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self { filters })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(item))
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, reason: impl Into<String>) -> QueryError {
        QueryError::syntax(self.src, self.pos, reason)
    }

    fn clauses(mut self) -> QueryResult<Vec<Clause>> {
        let mut clauses = Vec::new();
        self.skip_ws();
        if self.peek().is_none() {
            return Ok(clauses);
        }
        loop {
            clauses.push(self.clause()?);
            self.skip_ws();
            match self.bump() {
                None => return Ok(clauses),
                Some(',') => {
                    self.skip_ws();
                    if self.peek().is_none() {
                        return Err(self.error("trailing comma"));
                    }
                }
                Some(c) => return Err(self.error(format!("unexpected {c:?} after clause"))),
            }
        }
    }

    fn clause(&mut self) -> QueryResult<Clause> {
        let field = self.field()?;
        self.skip_ws();
        if matches!(self.peek(), None | Some(',')) {
            return Ok(Clause {
                field,
                op: Op::Present,
                value: String::new(),
            });
        }
        let op = self.op()?;
        self.skip_ws();
        let value = self.value()?;
        Ok(Clause { field, op, value })
    }

    fn field(&mut self) -> QueryResult<String> {
        let start = self.pos;
        let mut field = String::new();
        while let Some(c) = self.peek() {
            match c {
                '"' => field.push_str(&self.quoted()?),
                '=' | '!' | '~' | '<' | '>' | ',' => break,
                c if c.is_whitespace() => break,
                c => {
                    field.push(c);
                    self.bump();
                }
            }
        }
        if field.is_empty() {
            return Err(QueryError::syntax(self.src, start, "missing field name"));
        }
        Ok(field)
    }

    fn op(&mut self) -> QueryResult<Op> {
        for (symbol, op) in Op::SYMBOLS {
            if self.rest().starts_with(symbol) {
                self.pos += symbol.len();
                return Ok(op);
            }
        }
        Err(self.error("unknown operator"))
    }

    fn value(&mut self) -> QueryResult<String> {
        if self.peek() == Some('"') {
            return self.quoted();
        }
        let rest = self.rest();
        let end = rest.find(',').unwrap_or(rest.len());
        self.pos += end;
        Ok(rest[..end].trim_end().to_string())
    }

    /// Read a double-quoted string; `\"` and `\\` are the only escapes.
    fn quoted(&mut self) -> QueryResult<String> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(QueryError::syntax(self.src, start, "unterminated quote")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c @ ('"' | '\\')) => out.push(c),
                    _ => return Err(self.error("invalid escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }
}
