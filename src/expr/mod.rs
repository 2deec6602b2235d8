//! Bounded expression sub-language for binding conditions and computed args
//!
//! Presets embed small expressions in two places: `when` conditions that gate
//! a binding, and `computed` argument fields resolved at dispatch time. Both
//! run against a variable context supplied by the engine (count, mode, typed
//! prefix, host state).
//!
//! The language is a deliberately small AST evaluator, not a host-language
//! eval: arithmetic, comparisons, boolean combinators, member access into
//! context objects and a whitelisted helper-function table. Expressions can
//! never mutate the context or reach outside it.

mod eval;
mod parser;
mod token;

pub use eval::{eval, Context, EvalError, Value};
pub use parser::{parse, BinaryOp, CompiledExpr, Expr, ExprKind, UnaryOp};
pub use token::{Span, SyntaxError};

/// Parse and evaluate in one step.
///
/// Prefer pre-parsing with [`parse`] when the same expression runs more than
/// once; this helper is for one-shot evaluation (tests, CLI).
pub fn evaluate(source: &str, ctx: &Context) -> Result<Value, EvalError> {
    let compiled = parse(source).map_err(|e| EvalError {
        message: e.to_string(),
        subexpr: source.to_string(),
        snapshot: ctx.snapshot(),
    })?;
    eval(&compiled, ctx)
}
