//! Path codec, predicate builder and the compilers that turn both into SQL.

pub mod compiler;
pub mod expr;
pub mod order;
pub mod path;
pub mod sql;

pub use compiler::{
    ALWAYS_TRUE, Bindings, CompiledQuery, Filter, ParamStyle, compile, compile_with,
    display_filter,
};
pub use expr::{CompareOp, Expr, Q, Query};
pub use order::{Direction, OrderSpec, OrderTerm, compile_order, order_by_clause};
pub use path::{PathInput, PathSegment, ROOT, normalize, render_segments, split, split_canonical};
