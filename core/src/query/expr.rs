//! Predicate builder.
//!
//! A [`Query`] starts out as a bare path accumulated through `field`/`item`
//! calls. A comparison turns it into a predicate, which can then be combined
//! with `and`/`or`/`invert`. Predicates are kept as an [`Expr`] tree and only
//! flattened to SQL by the compiler, so no placeholder text ever needs to be
//! searched for or replaced.

use crate::error::{JsonLiteError, JsonLiteResult};
use crate::query::compiler::Binder;
use crate::query::order::Direction;
use crate::query::path::{PathSegment, render_segments};
use crate::query::sql::{DATA_COLUMN, json_extract};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Neg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Like,
    Glob,
    Regexp,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::Glob => "GLOB",
            CompareOp::Regexp => "REGEXP",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        path: String,
        op: CompareOp,
        value: Value,
    },
    IsNull {
        path: String,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Comparison against a canonical path.
    ///
    /// `= NULL` never matches in SQL, so equality and inequality with JSON
    /// null become `IS [NOT] NULL`.
    pub fn compare(path: String, op: CompareOp, value: Value) -> Self {
        match (op, value.is_null()) {
            (CompareOp::Eq, true) => Expr::IsNull {
                path,
                negated: false,
            },
            (CompareOp::Ne, true) => Expr::IsNull {
                path,
                negated: true,
            },
            _ => Expr::Compare { path, op, value },
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub(crate) fn render(&self, out: &mut String, binder: &mut Binder) {
        match self {
            Expr::Compare { path, op, value } => {
                out.push_str("( ");
                out.push_str(&json_extract(DATA_COLUMN, path));
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                binder.bind(out, value);
                out.push_str(" )");
            }
            Expr::IsNull { path, negated } => {
                out.push_str("( ");
                out.push_str(&json_extract(DATA_COLUMN, path));
                out.push_str(if *negated { " IS NOT NULL )" } else { " IS NULL )" });
            }
            Expr::And(left, right) => render_logic(out, binder, left, "AND", right),
            Expr::Or(left, right) => render_logic(out, binder, left, "OR", right),
            Expr::Not(inner) => {
                out.push_str("( NOT ");
                inner.render(out, binder);
                out.push_str(" )");
            }
        }
    }
}

fn render_logic(out: &mut String, binder: &mut Binder, left: &Expr, comb: &str, right: &Expr) {
    out.push_str("( ");
    left.render(out, binder);
    out.push(' ');
    out.push_str(comb);
    out.push(' ');
    right.render(out, binder);
    out.push_str(" )");
}

/// Path builder and predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    segments: SmallVec<[PathSegment; 4]>,
    expr: Option<Expr>,
    direction: Option<Direction>,
}

/// Short alias, as in `Q::new().field("first").eq("Paul")`.
pub type Q = Query;

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key.
    pub fn field(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append a key or index.
    pub fn item(mut self, segment: impl Into<PathSegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append several segments, as in `q.items(["a", "b"])`.
    pub fn items<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        self.segments.extend(segments.into_iter().map(Into::into));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True once a comparison has been attached.
    pub fn is_set(&self) -> bool {
        self.expr.is_some()
    }

    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Ascending order hint, used only when ordering by this path.
    pub fn asc(mut self) -> Self {
        self.direction = Some(Direction::Asc);
        self
    }

    /// Descending order hint, used only when ordering by this path.
    pub fn desc(mut self) -> Self {
        self.direction = Some(Direction::Desc);
        self
    }

    pub fn lt(self, value: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Lt, value.into())
    }

    pub fn le(self, value: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Le, value.into())
    }

    pub fn eq(self, value: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Eq, value.into())
    }

    pub fn ne(self, value: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Ne, value.into())
    }

    pub fn gt(self, value: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Gt, value.into())
    }

    pub fn ge(self, value: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Ge, value.into())
    }

    /// SQL `LIKE` with `%`/`_` wildcards.
    pub fn like(self, pattern: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Like, pattern.into())
    }

    /// SQL `GLOB` with `*`/`?` wildcards.
    pub fn glob(self, pattern: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Glob, pattern.into())
    }

    /// Regular expression match. Slower than `like`/`glob`.
    pub fn regexp(self, pattern: impl Into<Value>) -> JsonLiteResult<Self> {
        self.compare(CompareOp::Regexp, pattern.into())
    }

    fn compare(mut self, op: CompareOp, value: Value) -> JsonLiteResult<Self> {
        if self.expr.is_some() {
            return Err(JsonLiteError::Disallowed(
                "cannot compare a query that already has a comparison; \
                 instead of chaining `4 <= val <= 5`, build `val.ge(4)` and \
                 `val.le(5)` separately and combine them with `and`"
                    .to_string(),
            ));
        }
        if self.segments.is_empty() {
            return Err(JsonLiteError::InvalidInput(
                "cannot compare an empty path; add a field or item first".to_string(),
            ));
        }

        let path = render_segments(&self.segments);
        self.expr = Some(Expr::compare(path, op, value));
        Ok(self)
    }

    pub fn and(self, other: Query) -> JsonLiteResult<Self> {
        self.combine(other, Expr::and)
    }

    pub fn or(self, other: Query) -> JsonLiteResult<Self> {
        self.combine(other, Expr::or)
    }

    /// Logical NOT of a predicate.
    pub fn invert(mut self) -> JsonLiteResult<Self> {
        let inner = self.expr.take().ok_or_else(missing_value)?;
        self.expr = Some(Expr::Not(Box::new(inner)));
        Ok(self)
    }

    fn combine(mut self, other: Query, join: fn(Expr, Expr) -> Expr) -> JsonLiteResult<Self> {
        match (self.expr.take(), other.expr) {
            (Some(left), Some(right)) => {
                self.expr = Some(join(left, right));
                Ok(self)
            }
            _ => Err(missing_value()),
        }
    }
}

fn missing_value() -> JsonLiteError {
    JsonLiteError::MissingValue("must set an (in)equality before logic".to_string())
}

impl Neg for Query {
    type Output = Query;

    fn neg(self) -> Query {
        self.desc()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = if let Some(expr) = &self.expr {
            let mut out = String::new();
            expr.render(&mut out, &mut Binder::Inline);
            out
        } else if !self.segments.is_empty() {
            json_extract(DATA_COLUMN, &render_segments(&self.segments))
        } else {
            String::new()
        };
        write!(f, "Query({})", body)
    }
}
