//! Pure evaluator for parsed binding expressions.
//!
//! Evaluation is sandboxed: expressions can read the supplied context and
//! call whitelisted helpers, nothing else. The context is never mutated.

use std::collections::BTreeMap;
use std::fmt;

use super::parser::{BinaryOp, CompiledExpr, Expr, ExprKind, UnaryOp};

/// A runtime value in the expression sub-language.
///
/// `Object` only appears inside the context (for member access); a full
/// evaluation must end in a boolean, number or string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => format!("{:?}", s),
            Value::Object(fields) => format!("{{{} fields}}", fields.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Variable bindings an expression evaluates against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Short rendering of every top-level variable, for error diagnostics.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.render()))
            .collect()
    }
}

/// Evaluation failure: what went wrong, the offending subexpression, and the
/// context the expression was evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
    pub subexpr: String,
    pub snapshot: Vec<(String, String)>,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in `{}`)", self.message, self.subexpr)?;
        if !self.snapshot.is_empty() {
            let vars: Vec<String> = self
                .snapshot
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " with {}", vars.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// Evaluate a parsed expression against a context.
///
/// The result is always a boolean, number or string; an expression that
/// resolves to a bare context object is an error.
pub fn eval(expr: &CompiledExpr, ctx: &Context) -> Result<Value, EvalError> {
    let value = eval_node(&expr.root, &expr.source, ctx)?;
    if let Value::Object(_) = value {
        return Err(error(
            "expression evaluated to an object, expected boolean, number or string",
            &expr.root,
            &expr.source,
            ctx,
        ));
    }
    Ok(value)
}

fn error(message: impl Into<String>, node: &Expr, source: &str, ctx: &Context) -> EvalError {
    EvalError {
        message: message.into(),
        subexpr: node.span.slice(source).to_string(),
        snapshot: ctx.snapshot(),
    }
}

fn eval_node(node: &Expr, source: &str, ctx: &Context) -> Result<Value, EvalError> {
    match &node.kind {
        ExprKind::Number(n) => Ok(Value::Number(*n)),
        ExprKind::Str(s) => Ok(Value::Str(s.clone())),
        ExprKind::Bool(b) => Ok(Value::Bool(*b)),

        ExprKind::Var(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| error(format!("undefined variable `{}`", name), node, source, ctx)),

        ExprKind::Member(obj, field) => {
            let value = eval_node(obj, source, ctx)?;
            match value {
                Value::Object(fields) => fields.get(field).cloned().ok_or_else(|| {
                    error(format!("unknown member `{}`", field), node, source, ctx)
                }),
                other => Err(error(
                    format!("cannot access member `{}` of {}", field, other.type_name()),
                    node,
                    source,
                    ctx,
                )),
            }
        }

        ExprKind::Unary(op, operand) => {
            let value = eval_node(operand, source, ctx)?;
            match (op, value) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                (UnaryOp::Not, other) => Err(error(
                    format!("! expects a boolean, got {}", other.type_name()),
                    node,
                    source,
                    ctx,
                )),
                (UnaryOp::Neg, other) => Err(error(
                    format!("unary - expects a number, got {}", other.type_name()),
                    node,
                    source,
                    ctx,
                )),
            }
        }

        ExprKind::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, node, source, ctx),

        ExprKind::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_node(arg, source, ctx)?);
            }
            call_builtin(name, &values).map_err(|msg| error(msg, node, source, ctx))
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    node: &Expr,
    source: &str,
    ctx: &Context,
) -> Result<Value, EvalError> {
    // Short-circuit boolean operators before evaluating the right side
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let l = expect_bool(eval_node(lhs, source, ctx)?, op, lhs, source, ctx)?;
        return match (op, l) {
            (BinaryOp::And, false) => Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => Ok(Value::Bool(true)),
            _ => {
                let r = expect_bool(eval_node(rhs, source, ctx)?, op, rhs, source, ctx)?;
                Ok(Value::Bool(r))
            }
        };
    }

    let l = eval_node(lhs, source, ctx)?;
    let r = eval_node(rhs, source, ctx)?;

    match op {
        BinaryOp::Add => match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (a, b) => Err(mismatch(op, &a, &b, node, source, ctx)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (l, r) {
            (Value::Number(a), Value::Number(b)) => {
                if b == 0.0 && matches!(op, BinaryOp::Div | BinaryOp::Rem) {
                    return Err(error("division by zero", node, source, ctx));
                }
                Ok(Value::Number(match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Rem => a % b,
                    _ => unreachable!(),
                }))
            }
            (a, b) => Err(mismatch(op, &a, &b, node, source, ctx)),
        },
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => a == b,
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (a, b) => return Err(mismatch(op, a, b, node, source, ctx)),
            };
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                (a, b) => return Err(mismatch(op, a, b, node, source, ctx)),
            };
            let Some(ordering) = ordering else {
                return Err(error("values are not comparable", node, source, ctx));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn expect_bool(
    value: Value,
    op: BinaryOp,
    node: &Expr,
    source: &str,
    ctx: &Context,
) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(error(
            format!("{} expects booleans, got {}", op.symbol(), other.type_name()),
            node,
            source,
            ctx,
        )),
    }
}

fn mismatch(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    node: &Expr,
    source: &str,
    ctx: &Context,
) -> EvalError {
    error(
        format!(
            "type mismatch: {} {} {}",
            lhs.type_name(),
            op.symbol(),
            rhs.type_name()
        ),
        node,
        source,
        ctx,
    )
}

/// The helper-function whitelist. Anything not listed here is rejected,
/// which is the sandboxing boundary for preset-supplied expressions.
fn call_builtin(name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "min" => {
            let (a, b) = two_numbers(name, args)?;
            Ok(Value::Number(a.min(b)))
        }
        "max" => {
            let (a, b) = two_numbers(name, args)?;
            Ok(Value::Number(a.max(b)))
        }
        "abs" => match args {
            [Value::Number(n)] => Ok(Value::Number(n.abs())),
            _ => Err(format!("abs expects one number, got {} args", args.len())),
        },
        "contains" => {
            let (s, needle) = two_strings(name, args)?;
            Ok(Value::Bool(s.contains(needle.as_str())))
        }
        "starts_with" => {
            let (s, prefix) = two_strings(name, args)?;
            Ok(Value::Bool(s.starts_with(prefix.as_str())))
        }
        _ => Err(format!("unknown function `{}`", name)),
    }
}

fn two_numbers(name: &str, args: &[Value]) -> Result<(f64, f64), String> {
    match args {
        [Value::Number(a), Value::Number(b)] => Ok((*a, *b)),
        _ => Err(format!("{} expects two numbers", name)),
    }
}

fn two_strings(name: &str, args: &[Value]) -> Result<(String, String), String> {
    match args {
        [Value::Str(a), Value::Str(b)] => Ok((a.clone(), b.clone())),
        _ => Err(format!("{} expects two strings", name)),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;

    fn eval_str(source: &str, ctx: &Context) -> Result<Value, EvalError> {
        eval(&parse(source).unwrap(), ctx)
    }

    fn ctx_with_count(count: u32) -> Context {
        let mut ctx = Context::new();
        ctx.set("count", count);
        ctx
    }

    #[test]
    fn test_arithmetic() {
        let ctx = ctx_with_count(3);
        assert_eq!(eval_str("count * 2", &ctx).unwrap(), Value::Number(6.0));
        assert_eq!(eval_str("count + 1", &ctx).unwrap(), Value::Number(4.0));
        assert_eq!(eval_str("10 % 3", &ctx).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_comparison_and_boolean() {
        let ctx = ctx_with_count(3);
        assert_eq!(eval_str("count >= 3", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(
            eval_str("count > 1 && count < 3", &ctx).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval_str("!(count == 3)", &ctx).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_string_ops() {
        let mut ctx = Context::new();
        ctx.set("mode", "normal");
        assert_eq!(
            eval_str("mode == 'normal'", &ctx).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_str("mode + '!'", &ctx).unwrap(),
            Value::Str("normal!".into())
        );
        assert_eq!(
            eval_str("starts_with(mode, 'nor')", &ctx).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_member_access() {
        let mut fields = BTreeMap::new();
        fields.insert("focused".to_string(), Value::Bool(true));
        let mut ctx = Context::new();
        ctx.set("editor", Value::Object(fields));

        assert_eq!(eval_str("editor.focused", &ctx).unwrap(), Value::Bool(true));
        assert!(eval_str("editor.missing", &ctx).is_err());
        // Bare object is not an allowed result type
        assert!(eval_str("editor", &ctx).is_err());
    }

    #[test]
    fn test_builtins() {
        let ctx = ctx_with_count(7);
        assert_eq!(
            eval_str("min(count, 5)", &ctx).unwrap(),
            Value::Number(5.0)
        );
        assert_eq!(
            eval_str("max(count, 5)", &ctx).unwrap(),
            Value::Number(7.0)
        );
        assert_eq!(eval_str("abs(0 - 4)", &ctx).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_undefined_variable_carries_context() {
        let ctx = ctx_with_count(1);
        let e = eval_str("missing + 1", &ctx).unwrap_err();
        assert!(e.message.contains("missing"));
        assert_eq!(e.subexpr, "missing");
        assert!(e.snapshot.iter().any(|(k, _)| k == "count"));
    }

    #[test]
    fn test_unknown_function_rejected() {
        let ctx = Context::new();
        let e = eval_str("system('rm')", &ctx).unwrap_err();
        assert!(e.message.contains("unknown function"));
    }

    #[test]
    fn test_type_mismatch() {
        let mut ctx = Context::new();
        ctx.set("mode", "normal");
        ctx.set("count", 3u32);
        assert!(eval_str("mode + count", &ctx).is_err());
        assert!(eval_str("count && true", &ctx).is_err());
        assert!(eval_str("mode == 3", &ctx).is_err());
    }

    #[test]
    fn test_division_by_zero() {
        let ctx = Context::new();
        assert!(eval_str("1 / 0", &ctx).is_err());
    }

    #[test]
    fn test_short_circuit() {
        // The right side would fail, but the left side decides
        let mut ctx = Context::new();
        ctx.set("ok", false);
        assert_eq!(
            eval_str("ok && missing", &ctx).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_evaluation_is_pure() {
        let ctx = ctx_with_count(2);
        let before = ctx.clone();
        let _ = eval_str("count * 2", &ctx);
        assert_eq!(ctx, before);
    }
}
