//! Well-known globals and methods with direct target equivalents.
//!
//! A global only maps when the program does not declare a binding of the same
//! name in scope. Members of the builtin namespaces (`Math`, `console`, ...)
//! without a mapping are rejected, since the emitted code would otherwise
//! reach a global that does not exist. Method mappings (`xs.push(v)`) are
//! skipped when the program defines a method of that name anywhere, since the
//! receiver could then be one of its own objects.

use super::{LowerResult, Lowerer};
use crate::error::LoweringError;
use crate::ir::{BinaryOperator, NodeId, UnaryOperator};
use crate::protocol::RuntimeHelper;
use lunar_ast::{Node, NodeKind};

const MATH_FUNCTIONS: &[&str] = &[
    "floor", "ceil", "abs", "sqrt", "max", "min", "random", "sin", "cos", "tan", "exp", "log",
];

/// Globals whose members only exist through the mappings below.
const NAMESPACES: &[&str] = &[
    "console", "Math", "Object", "Array", "Promise", "Number", "String", "JSON",
];

/// Methods with a mapping. A call to one of these that matches no rule is
/// rejected instead of becoming a call to a method the receiver lacks.
const METHODS: &[&str] = &[
    "push", "pop", "join", "map", "filter", "forEach", "toUpperCase", "toLowerCase", "toString",
];

fn has_spread(arguments: &[Node]) -> bool {
    arguments
        .iter()
        .any(|a| matches!(a.kind, NodeKind::SpreadElement { .. }))
}

impl Lowerer<'_> {
    /// `Global.name` read as a value.
    pub(super) fn lower_builtin_member(
        &mut self,
        node: &Node,
        object: &Node,
        name: &str,
    ) -> LowerResult<Option<NodeId>> {
        let Some(global) = object.as_identifier() else {
            return Ok(None);
        };
        if self.scopes.is_declared(global) {
            return Ok(None);
        }
        let value = match (global, name) {
            ("Math", "PI") => self.arena.path("math", "pi"),
            ("Math", "E") => self.arena.number(std::f64::consts::E),
            ("Math", "LN2") => self.arena.number(std::f64::consts::LN_2),
            ("Math", "LN10") => self.arena.number(std::f64::consts::LN_10),
            ("Math", "SQRT2") => self.arena.number(std::f64::consts::SQRT_2),
            ("Number", "POSITIVE_INFINITY") => self.arena.path("math", "huge"),
            ("Number", "NEGATIVE_INFINITY") => {
                let huge = self.arena.path("math", "huge");
                self.arena.unary(UnaryOperator::Neg, huge)
            }
            ("Number", "MAX_SAFE_INTEGER") => self.arena.number(9_007_199_254_740_991.0),
            ("Number", "MIN_SAFE_INTEGER") => self.arena.number(-9_007_199_254_740_991.0),
            ("Number", "EPSILON") => self.arena.number(f64::EPSILON),
            _ if NAMESPACES.contains(&global) => {
                return Err(LoweringError::new(
                    node,
                    format!("`{global}.{name}` has no Lua equivalent"),
                ));
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// A call with a builtin equivalent, or `None` to lower it as written.
    pub(super) fn lower_builtin_call(
        &mut self,
        callee: &Node,
        arguments: &[Node],
    ) -> LowerResult<Option<NodeId>> {
        match &callee.kind {
            NodeKind::Identifier { name } if !self.scopes.is_declared(name) => {
                self.lower_global_call(callee, name, arguments)
            }
            NodeKind::MemberExpression {
                object,
                property,
                computed: false,
                optional: false,
            } => {
                let Some(name) = property.as_identifier() else {
                    return Ok(None);
                };
                if let Some(global) = object.as_identifier() {
                    if NAMESPACES.contains(&global) && !self.scopes.is_declared(global) {
                        let value = self.lower_namespace_call(callee, global, name, arguments)?;
                        return Ok(Some(value));
                    }
                }
                if self.analysis.method_names.contains(name) || !METHODS.contains(&name) {
                    return Ok(None);
                }
                self.lower_method_call(callee, object, name, arguments).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn lower_global_call(
        &mut self,
        callee: &Node,
        name: &str,
        arguments: &[Node],
    ) -> LowerResult<Option<NodeId>> {
        let function = match name {
            "String" => "tostring",
            "Number" | "parseFloat" | "parseInt" => "tonumber",
            _ => return Ok(None),
        };
        if has_spread(arguments) {
            return Err(LoweringError::new(
                callee,
                format!("spread arguments to `{name}` are not supported"),
            ));
        }
        let value = match (name, arguments.len()) {
            ("String", 0) => self.arena.string(""),
            ("Number", 0) => self.arena.number(0.0),
            ("String" | "Number" | "parseFloat", 1) => {
                let value = self.lower_expr(&arguments[0])?;
                self.arena.call_named(function, vec![value])
            }
            ("parseInt", 1 | 2) => {
                let args = self.lower_all(arguments)?;
                self.arena.call_named(function, args)
            }
            _ => {
                return Err(LoweringError::new(
                    callee,
                    format!("`{name}` with {} arguments is not supported", arguments.len()),
                ));
            }
        };
        Ok(Some(value))
    }

    /// `console.log(x)`, `Math.floor(x)`, `Object.keys(o)`, `Promise.all(xs)`.
    fn lower_namespace_call(
        &mut self,
        callee: &Node,
        global: &str,
        name: &str,
        arguments: &[Node],
    ) -> LowerResult<NodeId> {
        let spread = has_spread(arguments);
        let value = match (global, name) {
            ("console", "log" | "info" | "warn" | "error" | "debug") => {
                let args = self.lower_args(arguments)?;
                self.arena.call_named("print", args)
            }
            ("Math", name) if MATH_FUNCTIONS.contains(&name) => {
                let function = self.arena.path("math", name);
                let args = self.lower_args(arguments)?;
                self.arena.call(function, args)
            }
            ("Math", "pow") if !spread && arguments.len() == 2 => {
                let base = self.lower_expr(&arguments[0])?;
                let exponent = self.lower_expr(&arguments[1])?;
                self.arena.binary(BinaryOperator::Pow, base, exponent)
            }
            ("Math", "round") if !spread && arguments.len() == 1 => {
                let value = self.lower_expr(&arguments[0])?;
                let half = self.arena.number(0.5);
                let shifted = self.arena.binary(BinaryOperator::Add, value, half);
                let floor = self.arena.path("math", "floor");
                self.arena.call(floor, vec![shifted])
            }
            ("String", "fromCharCode") => {
                let function = self.arena.path("string", "char");
                let args = self.lower_args(arguments)?;
                self.arena.call(function, args)
            }
            ("Object", "keys" | "values" | "entries") if !spread && arguments.len() == 1 => {
                let helper = match name {
                    "keys" => RuntimeHelper::Keys,
                    "values" => RuntimeHelper::Values,
                    _ => RuntimeHelper::Entries,
                };
                self.helper_call(helper, arguments)?
            }
            ("Object", "assign") if !arguments.is_empty() => {
                self.helper_call(RuntimeHelper::Assign, arguments)?
            }
            ("Array", "isArray") if !spread && arguments.len() == 1 => {
                let value = self.lower_expr(&arguments[0])?;
                let kind = self.arena.call_named("type", vec![value]);
                let table = self.arena.string("table");
                self.arena.binary(BinaryOperator::Eq, kind, table)
            }
            ("Promise", "all") if !spread && arguments.len() == 1 => {
                self.uses_async = true;
                self.helper_call(RuntimeHelper::AwaitAll, arguments)?
            }
            ("Promise", "resolve") if !spread && arguments.len() <= 1 => {
                self.helper_call(RuntimeHelper::Resolve, arguments)?
            }
            _ => {
                return Err(LoweringError::new(
                    callee,
                    format!(
                        "`{global}.{name}` with {} argument(s) has no Lua equivalent",
                        arguments.len()
                    ),
                ));
            }
        };
        Ok(value)
    }

    /// Array and string methods.
    fn lower_method_call(
        &mut self,
        callee: &Node,
        object: &Node,
        name: &str,
        arguments: &[Node],
    ) -> LowerResult<NodeId> {
        let spread = has_spread(arguments);
        let value = match (name, arguments.len()) {
            ("push", 1) if !spread => {
                let list = self.lower_expr(object)?;
                let item = self.lower_expr(&arguments[0])?;
                let insert = self.arena.path("table", "insert");
                self.arena.call(insert, vec![list, item])
            }
            ("push", _) => {
                self.require(RuntimeHelper::Push);
                let mut args = vec![self.lower_expr(object)?];
                args.extend(self.lower_args(arguments)?);
                self.arena.call_named(RuntimeHelper::Push.name(), args)
            }
            ("pop", 0) => {
                let list = self.lower_expr(object)?;
                let remove = self.arena.path("table", "remove");
                self.arena.call(remove, vec![list])
            }
            ("join", 0 | 1) if !spread => {
                let list = self.lower_expr(object)?;
                let separator = match arguments.first() {
                    Some(separator) => self.lower_expr(separator)?,
                    None => self.arena.string(","),
                };
                let concat = self.arena.path("table", "concat");
                self.arena.call(concat, vec![list, separator])
            }
            ("map" | "filter" | "forEach", 1) if !spread => {
                let helper = match name {
                    "map" => RuntimeHelper::Map,
                    "filter" => RuntimeHelper::Filter,
                    _ => RuntimeHelper::ForEach,
                };
                self.require(helper);
                let list = self.lower_expr(object)?;
                let callback = self.lower_expr(&arguments[0])?;
                self.arena.call_named(helper.name(), vec![list, callback])
            }
            ("toUpperCase" | "toLowerCase", 0) => {
                let text = self.lower_expr(object)?;
                let function = if name == "toUpperCase" { "upper" } else { "lower" };
                let function = self.arena.path("string", function);
                self.arena.call(function, vec![text])
            }
            ("toString", 0) => {
                let value = self.lower_expr(object)?;
                self.arena.call_named("tostring", vec![value])
            }
            _ => {
                return Err(LoweringError::new(
                    callee,
                    format!(
                        "`.{name}` with {} argument(s) has no Lua equivalent",
                        arguments.len()
                    ),
                ));
            }
        };
        Ok(value)
    }

    fn helper_call(&mut self, helper: RuntimeHelper, arguments: &[Node]) -> LowerResult<NodeId> {
        self.require(helper);
        let args = self.lower_args(arguments)?;
        Ok(self.arena.call_named(helper.name(), args))
    }
}
