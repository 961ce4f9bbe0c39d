//! Query compiler: predicates and equality shorthand to a WHERE clause plus
//! bound values.

use crate::error::{JsonLiteError, JsonLiteResult};
use crate::query::expr::{CompareOp, Expr, Query};
use crate::query::order::{OrderSpec, OrderTerm, compile_order};
use crate::query::path::{PathInput, normalize};
use crate::query::sql::{literal, to_sql_value};
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// Filter text used when nothing restricts the result.
pub const ALWAYS_TRUE: &str = "1 = 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `?`, bound by occurrence.
    #[default]
    Positional,
    /// `:v1`, `:v2`, ...
    Named,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Bindings {
    Positional(Vec<SqlValue>),
    Named(Vec<(String, SqlValue)>),
}

impl Bindings {
    pub fn len(&self) -> usize {
        match self {
            Bindings::Positional(values) => values.len(),
            Bindings::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in occurrence order regardless of style.
    pub fn values(&self) -> Vec<&SqlValue> {
        match self {
            Bindings::Positional(values) => values.iter().collect(),
            Bindings::Named(values) => values.iter().map(|(_, v)| v).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Bindings,
}

/// Flattens an [`Expr`] into text, collecting values as it goes.
pub(crate) enum Binder {
    Positional(Vec<SqlValue>),
    Named(Vec<(String, SqlValue)>),
    /// Literal values in the text. Display only.
    Inline,
}

impl Binder {
    fn new(style: ParamStyle) -> Self {
        match style {
            ParamStyle::Positional => Binder::Positional(Vec::new()),
            ParamStyle::Named => Binder::Named(Vec::new()),
        }
    }

    pub(crate) fn bind(&mut self, out: &mut String, value: &Value) {
        match self {
            Binder::Positional(values) => {
                out.push('?');
                values.push(to_sql_value(value));
            }
            Binder::Named(values) => {
                let name = format!(":v{}", values.len() + 1);
                out.push_str(&name);
                values.push((name, to_sql_value(value)));
            }
            Binder::Inline => out.push_str(&literal(value)),
        }
    }

    fn into_bindings(self) -> Bindings {
        match self {
            Binder::Positional(values) => Bindings::Positional(values),
            Binder::Named(values) => Bindings::Named(values),
            Binder::Inline => Bindings::Positional(Vec::new()),
        }
    }
}

/// Everything that narrows and orders a query.
///
/// ```ignore
/// let filter = Filter::new()
///     .eq("last", "Starr")
///     .with(Q::new().field("born").ge(1940)?)
///     .order_by("-born")
///     .limit(2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Query>,
    equalities: Vec<(PathInput, Value)>,
    limit: Option<u64>,
    order: Vec<OrderSpec>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// AND a predicate onto the filter.
    pub fn with(mut self, query: Query) -> Self {
        self.predicates.push(query);
        self
    }

    /// Equality shorthand. A repeated path keeps its first position but takes
    /// the later value.
    pub fn eq(mut self, path: impl Into<PathInput>, value: impl Into<Value>) -> Self {
        self.equalities.push((path.into(), value.into()));
        self
    }

    /// One equality per entry of a JSON object, in key order.
    pub fn eq_map(mut self, map: &Map<String, Value>) -> Self {
        for (key, value) in map {
            self.equalities
                .push((PathInput::Text(key.clone()), value.clone()));
        }
        self
    }

    /// A bare path is shorthand for equality with null.
    pub fn path(self, path: impl Into<PathInput>) -> Self {
        self.eq(path, Value::Null)
    }

    /// Cap the number of rows. `0` means no limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn order_by(mut self, spec: impl Into<OrderSpec>) -> Self {
        self.order.push(spec.into());
        self
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn has_order(&self) -> bool {
        !self.order.is_empty()
    }

    pub fn compile(&self) -> JsonLiteResult<CompiledQuery> {
        self.compile_with(ParamStyle::Positional)
    }

    pub fn compile_with(&self, style: ParamStyle) -> JsonLiteResult<CompiledQuery> {
        compile_with(self, style)
    }

    pub fn compile_order(&self) -> JsonLiteResult<Vec<OrderTerm>> {
        compile_order(&self.order)
    }
}

impl From<Query> for Filter {
    fn from(query: Query) -> Self {
        Filter::new().with(query)
    }
}

impl From<&Map<String, Value>> for Filter {
    fn from(map: &Map<String, Value>) -> Self {
        Filter::new().eq_map(map)
    }
}

/// Compile with `?` placeholders.
pub fn compile(filter: &Filter) -> JsonLiteResult<CompiledQuery> {
    compile_with(filter, ParamStyle::Positional)
}

pub fn compile_with(filter: &Filter, style: ParamStyle) -> JsonLiteResult<CompiledQuery> {
    let Some(expr) = build_expr(filter)? else {
        return Ok(CompiledQuery {
            sql: ALWAYS_TRUE.to_string(),
            bindings: Binder::new(style).into_bindings(),
        });
    };

    let mut sql = String::new();
    let mut binder = Binder::new(style);
    expr.render(&mut sql, &mut binder);
    Ok(CompiledQuery {
        sql,
        bindings: binder.into_bindings(),
    })
}

/// Render a filter with literal values, for logs and diagnostics.
pub fn display_filter(filter: &Filter) -> JsonLiteResult<String> {
    match build_expr(filter)? {
        Some(expr) => {
            let mut out = String::new();
            expr.render(&mut out, &mut Binder::Inline);
            Ok(out)
        }
        None => Ok(ALWAYS_TRUE.to_string()),
    }
}

fn build_expr(filter: &Filter) -> JsonLiteResult<Option<Expr>> {
    let mut equalities: Vec<(String, Value)> = Vec::with_capacity(filter.equalities.len());
    for (path, value) in &filter.equalities {
        let canonical = normalize(path.clone())?;
        match equalities.iter_mut().find(|(seen, _)| *seen == canonical) {
            Some(slot) => slot.1 = value.clone(),
            None => equalities.push((canonical, value.clone())),
        }
    }

    let mut combined: Option<Expr> = None;
    let mut push = |expr: Expr| {
        combined = Some(match combined.take() {
            Some(left) => left.and(expr),
            None => expr,
        });
    };

    for (path, value) in equalities {
        push(Expr::compare(path, CompareOp::Eq, value));
    }

    for query in &filter.predicates {
        let expr = query.expr().cloned().ok_or_else(|| {
            JsonLiteError::MissingValue(format!(
                "must set an (in)equality for query on {}",
                describe_path(query)
            ))
        })?;
        push(expr);
    }

    Ok(combined)
}

fn describe_path(query: &Query) -> String {
    let mut out = String::new();
    for (i, segment) in query.segments().iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        let _ = write!(out, "{}", segment);
    }
    if out.is_empty() { "<root>".to_string() } else { out }
}
