//! Normalized binding items: the flat records the preset parser emits and
//! the compiler consumes.

use std::collections::BTreeMap;
use std::fmt;

use crate::expr::{eval, CompiledExpr, Context, EvalError, Value};

use super::types::Keystroke;

/// Where a binding item came from, for diagnostics and override ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceTag {
    /// Preset name ("vim-basics")
    pub preset: String,
    /// Merge precedence: higher wins across presets
    pub priority: i32,
    /// Declaration index within the preset document
    pub index: usize,
    /// Document path for error messages ("bindings[3]")
    pub path: String,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.preset, self.path)
    }
}

/// A `when` condition: the parsed expression plus its source text.
///
/// The source text doubles as the guard's identity: two bindings with the
/// same sequence coexist when their guard texts differ, and collide under
/// the override rules when they match.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub expr: CompiledExpr,
}

impl Guard {
    pub fn source(&self) -> &str {
        &self.expr.source
    }

    /// Evaluate the guard. Anything but a boolean result is an error.
    pub fn check(&self, ctx: &Context) -> Result<bool, EvalError> {
        match eval(&self.expr, ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError {
                message: format!(
                    "when condition must be a boolean, got {}",
                    other.type_name()
                ),
                subexpr: self.expr.source.clone(),
                snapshot: ctx.snapshot(),
            }),
        }
    }
}

/// A structured argument payload whose leaves may be computed expressions.
///
/// Mirrors the JSON value tree, with one extra leaf kind: an object of the
/// form `{"computed": "count * 2"}` becomes [`ArgTemplate::Computed`] and is
/// evaluated lazily at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgTemplate {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<ArgTemplate>),
    Map(BTreeMap<String, ArgTemplate>),
    Computed(CompiledExpr),
}

impl ArgTemplate {
    pub fn is_null(&self) -> bool {
        matches!(self, ArgTemplate::Null)
    }

    /// Resolve every computed leaf against the dispatch context.
    pub fn resolve(&self, ctx: &Context) -> Result<serde_json::Value, EvalError> {
        match self {
            ArgTemplate::Null => Ok(serde_json::Value::Null),
            ArgTemplate::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            ArgTemplate::Number(n) => Ok(json_number(*n)),
            ArgTemplate::Str(s) => Ok(serde_json::Value::String(s.clone())),
            ArgTemplate::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.resolve(ctx)?);
                }
                Ok(serde_json::Value::Array(out))
            }
            ArgTemplate::Map(fields) => {
                let mut out = serde_json::Map::new();
                for (key, value) in fields {
                    out.insert(key.clone(), value.resolve(ctx)?);
                }
                Ok(serde_json::Value::Object(out))
            }
            ArgTemplate::Computed(expr) => match eval(expr, ctx)? {
                Value::Bool(b) => Ok(serde_json::Value::Bool(b)),
                Value::Number(n) => Ok(json_number(n)),
                Value::Str(s) => Ok(serde_json::Value::String(s)),
                Value::Object(_) => unreachable!("eval never returns objects"),
            },
        }
    }
}

fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        serde_json::Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// One normalized binding entry, defaults already merged in.
///
/// Either a concrete binding (`command` set) or a prefix declaration
/// (`defines_prefix` set); never both.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingItem {
    /// The item's own chords (full sequence = resolved prefix scope + these)
    pub keys: Vec<Keystroke>,
    /// Command identifier to dispatch ("file.save")
    pub command: Option<String>,
    /// Argument payload passed to the dispatcher
    pub args: ArgTemplate,
    /// Optional activation condition
    pub when: Option<Guard>,
    /// Modes this item applies in; empty = every declared mode
    pub modes: Vec<String>,
    /// Named prefix scope this item hangs under
    pub prefix_scope: Option<String>,
    /// If set, this item declares a prefix other items can reference
    pub defines_prefix: Option<String>,
    /// Documentation only
    pub name: Option<String>,
    pub description: Option<String>,
    pub source: SourceTag,
}

impl BindingItem {
    pub fn is_prefix_declaration(&self) -> bool {
        self.defines_prefix.is_some()
    }
}
