//! Expressions.
//!
//! Expressions lower to a single IR expression. Source constructs that need
//! statements (assignments, updates, optional chains, `??`, sequences) are
//! wrapped in an immediately invoked function whose body holds them.

use super::function::Receiver;
use super::infer::Kind;
use super::{LowerResult, Lowerer, Parent, ThisBinding};
use crate::error::LoweringError;
use crate::ir::{BinaryOperator, LogicalOperator, Node as Ir, NodeId, UnaryOperator};
use crate::names;
use crate::protocol::RuntimeHelper;
use lunar_ast::{
    BinaryOperator as JsBinary, LogicalOperator as JsLogical, Node, NodeKind,
    UnaryOperator as JsUnary,
};

/// Constructors of the builtin error records.
pub(super) const ERROR_CLASSES: &[&str] = &[
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
    "EvalError",
    "URIError",
];

/// The base of a member place.
#[derive(Debug)]
pub(super) enum Base<'n> {
    /// A side-effect free expression, lowered again for every use.
    Pure(&'n Node),
    /// A local holding the evaluated expression.
    Name(String),
}

/// An assignable location whose parts are evaluated once.
#[derive(Debug)]
pub(super) enum Place<'n> {
    Name(String),
    Field { base: Base<'n>, field: String },
    Index { base: Base<'n>, key: Base<'n> },
}

impl Lowerer<'_> {
    pub(super) fn lower_expr(&mut self, node: &Node) -> LowerResult<NodeId> {
        match &node.kind {
            NodeKind::Literal { value, .. } => self.lower_literal(node, value),
            NodeKind::Identifier { name } => Ok(self.lower_identifier(name)),
            NodeKind::ThisExpression {} => Ok(self.lower_this()),
            NodeKind::TemplateLiteral { quasis, expressions } => {
                let quasis = quasis
                    .iter()
                    .map(|quasi| match &quasi.kind {
                        NodeKind::TemplateElement { value, .. } => {
                            Ok(value.cooked.clone().unwrap_or_else(|| value.raw.clone()))
                        }
                        _ => Err(LoweringError::new(quasi, "expected a template element")),
                    })
                    .collect::<LowerResult<Vec<_>>>()?;
                let expressions = self.lower_all(expressions)?;
                Ok(self.arena.alloc(Ir::TemplateLiteral { quasis, expressions }))
            }
            NodeKind::BinaryExpression { operator, left, right } => {
                let left_kind = self.analysis.kind_of(left);
                let right_kind = self.analysis.kind_of(right);
                let left = self.lower_expr(left)?;
                let right = self.lower_expr(right)?;
                Ok(self.combine(*operator, (left, left_kind), (right, right_kind)))
            }
            NodeKind::LogicalExpression { operator, left, right } => match operator {
                JsLogical::And | JsLogical::Or => {
                    let operator = if *operator == JsLogical::And {
                        LogicalOperator::And
                    } else {
                        LogicalOperator::Or
                    };
                    let left = self.lower_expr(left)?;
                    let right = self.lower_expr(right)?;
                    Ok(self.arena.logical(operator, left, right))
                }
                JsLogical::Nullish => self.lower_nullish(left, right),
            },
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => self.lower_conditional(test, consequent, alternate),
            NodeKind::UnaryExpression {
                operator, argument, ..
            } => self.lower_unary(node, *operator, argument),
            NodeKind::AssignmentExpression { .. }
            | NodeKind::UpdateExpression { .. }
            | NodeKind::SequenceExpression { .. } => self.lower_effect_value(node),
            NodeKind::MemberExpression { optional: true, .. } => self.lower_chain(node),
            NodeKind::MemberExpression {
                object,
                property,
                computed,
                ..
            } => self.lower_member(node, object, property, *computed),
            NodeKind::ChainExpression { expression } => self.lower_chain(expression),
            NodeKind::CallExpression { optional: true, .. } => self.lower_chain(node),
            NodeKind::CallExpression {
                callee, arguments, ..
            } => self.lower_call(node, callee, arguments),
            NodeKind::NewExpression { callee, arguments } => self.lower_new(callee, arguments),
            NodeKind::ArrayExpression { elements } => self.lower_array(elements),
            NodeKind::ObjectExpression { properties } => self.lower_object(properties),
            NodeKind::FunctionExpression { .. } => self.lower_function_expr(node, Receiver::None),
            NodeKind::ArrowFunctionExpression { .. } => self.lower_arrow(node, Receiver::None),
            NodeKind::ClassExpression { .. } => self.lower_class_expr(node),
            NodeKind::AwaitExpression { argument } => {
                self.require(RuntimeHelper::Suspend);
                let argument = self.lower_expr(argument)?;
                Ok(self.arena.alloc(Ir::AwaitExpression { argument }))
            }
            NodeKind::YieldExpression { argument, delegate } => {
                self.require(if *delegate {
                    RuntimeHelper::Delegate
                } else {
                    RuntimeHelper::Suspend
                });
                let argument = argument.as_deref().map(|a| self.lower_expr(a)).transpose()?;
                Ok(self.arena.alloc(Ir::YieldExpression {
                    argument,
                    delegate: *delegate,
                }))
            }
            NodeKind::SpreadElement { .. } => Err(LoweringError::new(
                node,
                "spread outside of a call or literal",
            )),
            NodeKind::Super {} => Err(LoweringError::new(
                node,
                "`super` must be called or accessed",
            )),
            _ => Err(LoweringError::new(node, "no lowering rule for this expression")),
        }
    }

    pub(super) fn lower_all(&mut self, nodes: &[Node]) -> LowerResult<Vec<NodeId>> {
        nodes.iter().map(|node| self.lower_expr(node)).collect()
    }

    fn lower_literal(&mut self, node: &Node, value: &serde_json::Value) -> LowerResult<NodeId> {
        Ok(match value {
            serde_json::Value::Null => self.arena.null(),
            serde_json::Value::Bool(b) => self.arena.boolean(*b),
            serde_json::Value::Number(n) => {
                let n = n
                    .as_f64()
                    .ok_or_else(|| LoweringError::new(node, "number literal out of range"))?;
                self.arena.number(n)
            }
            serde_json::Value::String(s) => self.arena.string(s.as_str()),
            _ => return Err(LoweringError::new(node, "unsupported literal value")),
        })
    }

    fn lower_identifier(&mut self, name: &str) -> NodeId {
        match name {
            "undefined" => self.arena.null(),
            "NaN" => {
                let zero = self.arena.number(0.0);
                let divisor = self.arena.number(0.0);
                self.arena.binary(BinaryOperator::Div, zero, divisor)
            }
            "Infinity" => self.arena.path("math", "huge"),
            _ => self.arena.ident(Self::binding_name(name)),
        }
    }

    fn lower_this(&mut self) -> NodeId {
        match self.this_binding() {
            ThisBinding::SelfParam => self.arena.alloc(Ir::ThisExpression),
            ThisBinding::Name(name) => self.arena.ident(name),
            ThisBinding::Nil | ThisBinding::Lexical => self.arena.null(),
        }
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// Combine two lowered operands with a source binary operator.
    ///
    /// `+` concatenates when either side is known to be a string and adds
    /// otherwise, including when neither side is known.
    pub(super) fn combine(
        &mut self,
        operator: JsBinary,
        left: (NodeId, Kind),
        right: (NodeId, Kind),
    ) -> NodeId {
        let ((l, left_kind), (r, right_kind)) = (left, right);
        let operator = match operator {
            JsBinary::Add if left_kind == Kind::String || right_kind == Kind::String => {
                let l = self.stringify(l, left_kind);
                let r = self.stringify(r, right_kind);
                return self.arena.binary(BinaryOperator::Concat, l, r);
            }
            JsBinary::Add => BinaryOperator::Add,
            JsBinary::Sub => BinaryOperator::Sub,
            JsBinary::Mul => BinaryOperator::Mul,
            JsBinary::Div => BinaryOperator::Div,
            JsBinary::Pow => BinaryOperator::Pow,
            JsBinary::Mod => {
                let fmod = self.arena.path("math", "fmod");
                return self.arena.call(fmod, vec![l, r]);
            }
            JsBinary::Eq | JsBinary::StrictEq => BinaryOperator::Eq,
            JsBinary::NotEq | JsBinary::StrictNotEq => BinaryOperator::NotEq,
            JsBinary::Lt => BinaryOperator::Lt,
            JsBinary::LtEq => BinaryOperator::LtEq,
            JsBinary::Gt => BinaryOperator::Gt,
            JsBinary::GtEq => BinaryOperator::GtEq,
            JsBinary::Shl
            | JsBinary::Shr
            | JsBinary::UShr
            | JsBinary::BitAnd
            | JsBinary::BitOr
            | JsBinary::BitXor => return self.bitwise(operator, l, r),
            JsBinary::In => {
                let slot = self.arena.index(r, l);
                let nil = self.arena.null();
                return self.arena.binary(BinaryOperator::NotEq, slot, nil);
            }
            JsBinary::Instanceof => {
                self.require(RuntimeHelper::Instanceof);
                return self.arena.call_named(RuntimeHelper::Instanceof.name(), vec![l, r]);
            }
        };
        self.arena.binary(operator, l, r)
    }

    /// Bitwise operators work on 32-bit integers: operands wrap through
    /// `__lunar_uint32`, results are read back as signed except for `>>>`.
    /// Shift counts use their low five bits.
    fn bitwise(&mut self, operator: JsBinary, l: NodeId, r: NodeId) -> NodeId {
        let shift_count = |this: &mut Self, r: NodeId| {
            let count = this.to_uint32(r);
            let mask = this.arena.number(31.0);
            this.arena.binary(BinaryOperator::BitAnd, count, mask)
        };
        let value = match operator {
            JsBinary::UShr => {
                let value = self.to_uint32(l);
                let count = shift_count(self, r);
                return self.arena.binary(BinaryOperator::Shr, value, count);
            }
            // Lua shifts 64-bit integers logically. Shifting the sign-extended
            // int32 keeps the arithmetic result in the low 32 bits.
            JsBinary::Shr => {
                let value = self.to_int32(l);
                let count = shift_count(self, r);
                self.arena.binary(BinaryOperator::Shr, value, count)
            }
            JsBinary::Shl => {
                let value = self.to_uint32(l);
                let count = shift_count(self, r);
                self.arena.binary(BinaryOperator::Shl, value, count)
            }
            _ => {
                let operator = match operator {
                    JsBinary::BitAnd => BinaryOperator::BitAnd,
                    JsBinary::BitOr => BinaryOperator::BitOr,
                    _ => BinaryOperator::BitXor,
                };
                let l = self.to_uint32(l);
                let r = self.to_uint32(r);
                self.arena.binary(operator, l, r)
            }
        };
        self.to_int32(value)
    }

    fn to_uint32(&mut self, value: NodeId) -> NodeId {
        self.require(RuntimeHelper::Uint32);
        self.arena.call_named(RuntimeHelper::Uint32.name(), vec![value])
    }

    fn to_int32(&mut self, value: NodeId) -> NodeId {
        self.require(RuntimeHelper::Int32);
        self.arena.call_named(RuntimeHelper::Int32.name(), vec![value])
    }

    /// Concatenation operand: strings and numbers as they are, anything else
    /// through `tostring`.
    fn stringify(&mut self, value: NodeId, kind: Kind) -> NodeId {
        match kind {
            Kind::String | Kind::Number => value,
            Kind::Unknown | Kind::Bottom => self.arena.call_named("tostring", vec![value]),
        }
    }

    fn lower_unary(
        &mut self,
        node: &Node,
        operator: JsUnary,
        argument: &Node,
    ) -> LowerResult<NodeId> {
        match operator {
            JsUnary::Minus => {
                if let NodeKind::Literal {
                    value: serde_json::Value::Number(n),
                    ..
                } = &argument.kind
                {
                    if let Some(n) = n.as_f64() {
                        return Ok(self.arena.number(-n));
                    }
                }
                let argument = self.lower_expr(argument)?;
                Ok(self.arena.unary(UnaryOperator::Neg, argument))
            }
            JsUnary::Plus => {
                let kind = self.analysis.kind_of(argument);
                let value = self.lower_expr(argument)?;
                if kind == Kind::Number {
                    Ok(value)
                } else {
                    Ok(self.arena.call_named("tonumber", vec![value]))
                }
            }
            JsUnary::Not => {
                let argument = self.lower_expr(argument)?;
                Ok(self.arena.unary(UnaryOperator::Not, argument))
            }
            JsUnary::BitNot => {
                let argument = self.lower_expr(argument)?;
                let argument = self.to_uint32(argument);
                let inverted = self.arena.unary(UnaryOperator::BitNot, argument);
                Ok(self.to_int32(inverted))
            }
            JsUnary::Typeof => {
                self.require(RuntimeHelper::Typeof);
                let argument = self.lower_expr(argument)?;
                Ok(self.arena.call_named(RuntimeHelper::Typeof.name(), vec![argument]))
            }
            JsUnary::Void if is_pure(argument) => Ok(self.arena.null()),
            JsUnary::Void | JsUnary::Delete => self.lower_effect_value(node),
        }
    }

    /// `a ?? b`: `b` only when `a` is nil.
    fn lower_nullish(&mut self, left: &Node, right: &Node) -> LowerResult<NodeId> {
        let mut body = Vec::new();
        let value = self.lower_expr(left)?;
        let name = self.ensure_name(value, &mut body);
        let current = self.arena.ident(name.as_str());
        let nil = self.arena.null();
        let test = self.arena.binary(BinaryOperator::Eq, current, nil);
        let fallback = self.lower_expr(right)?;
        let fallback = self.arena.ret(vec![fallback]);
        body.push(self.arena.if_(test, vec![fallback], None));
        let value = self.arena.ident(name);
        body.push(self.arena.ret(vec![value]));
        Ok(self.arena.iife(body))
    }

    /// `test ? a : b`. With a consequent that can never be nil or false the
    /// `and`/`or` idiom is exact; otherwise the choice is made by a branch.
    fn lower_conditional(
        &mut self,
        test: &Node,
        consequent: &Node,
        alternate: &Node,
    ) -> LowerResult<NodeId> {
        let test = self.lower_expr(test)?;
        if is_truthy(consequent) {
            let consequent = self.lower_expr(consequent)?;
            let alternate = self.lower_expr(alternate)?;
            let both = self.arena.logical(LogicalOperator::And, test, consequent);
            return Ok(self.arena.logical(LogicalOperator::Or, both, alternate));
        }
        let consequent = self.lower_expr(consequent)?;
        let consequent = self.arena.ret(vec![consequent]);
        let alternate = self.lower_expr(alternate)?;
        let alternate = self.arena.ret(vec![alternate]);
        let branch = self.arena.if_(test, vec![consequent], Some(vec![alternate]));
        Ok(self.arena.iife(vec![branch]))
    }

    /// A statement-like expression in value position: its statements run in a
    /// wrapper function that returns the value.
    fn lower_effect_value(&mut self, node: &Node) -> LowerResult<NodeId> {
        let mut body = Vec::new();
        let value = match &node.kind {
            NodeKind::AssignmentExpression { operator, left, right } => {
                if matches!(
                    left.kind,
                    NodeKind::ObjectPattern { .. } | NodeKind::ArrayPattern { .. }
                ) {
                    let value = self.lower_expr(right)?;
                    let name = self.ensure_name(value, &mut body);
                    let source = self.arena.ident(name.as_str());
                    self.bind_pattern(left, source, super::pattern::Binding::Assign, &mut body)?;
                    Some(self.arena.ident(name))
                } else {
                    match self.lower_assignment(*operator, left, right, &mut body)? {
                        Some(place) => Some(self.place_expr(&place)?),
                        None => None,
                    }
                }
            }
            NodeKind::UpdateExpression {
                operator,
                prefix,
                argument,
            } => {
                if *prefix {
                    let place = self.lower_update(*operator, argument, &mut body)?;
                    Some(self.place_expr(&place)?)
                } else {
                    let place = self.place(argument, &mut body)?;
                    let current = self.place_expr(&place)?;
                    let old = self.temp();
                    body.push(self.arena.local(&old, Some(current)));
                    let previous = self.arena.ident(old.as_str());
                    let one = self.arena.number(1.0);
                    let operator = match operator {
                        lunar_ast::UpdateOperator::Increment => BinaryOperator::Add,
                        lunar_ast::UpdateOperator::Decrement => BinaryOperator::Sub,
                    };
                    let next = self.arena.binary(operator, previous, one);
                    let target = self.place_expr(&place)?;
                    body.push(self.arena.assign(target, next));
                    Some(self.arena.ident(old))
                }
            }
            NodeKind::SequenceExpression { expressions } => match expressions.split_last() {
                Some((last, rest)) => {
                    for expression in rest {
                        self.lower_expr_stmt(expression, &mut body)?;
                    }
                    Some(self.lower_expr(last)?)
                }
                None => None,
            },
            NodeKind::UnaryExpression {
                operator: JsUnary::Delete,
                ..
            } => {
                self.lower_expr_stmt(node, &mut body)?;
                Some(self.arena.boolean(true))
            }
            NodeKind::UnaryExpression {
                operator: JsUnary::Void,
                argument,
                ..
            } => {
                self.lower_expr_stmt(argument, &mut body)?;
                None
            }
            _ => return Err(LoweringError::new(node, "no lowering rule for this expression")),
        };
        if let Some(value) = value {
            body.push(self.arena.ret(vec![value]));
        }
        Ok(self.arena.iife(body))
    }

    // =========================================================================
    // Members
    // =========================================================================

    fn lower_member(
        &mut self,
        node: &Node,
        object: &Node,
        property: &Node,
        computed: bool,
    ) -> LowerResult<NodeId> {
        if matches!(object.kind, NodeKind::Super {}) {
            let parent = self.parent_table(node)?;
            let parent = self.arena.ident(parent);
            return self.member_of(parent, property, computed);
        }
        if !computed {
            let name = property
                .as_identifier()
                .ok_or_else(|| LoweringError::new(property, "member name is not an identifier"))?;
            if let Some(value) = self.lower_builtin_member(node, object, name)? {
                return Ok(value);
            }
            if name == "length" {
                let object = self.lower_expr(object)?;
                return Ok(self.arena.unary(UnaryOperator::Len, object));
            }
        }
        let object = self.lower_expr(object)?;
        self.member_of(object, property, computed)
    }

    /// `object.property` or `object[key]` over an already lowered object.
    fn member_of(
        &mut self,
        object: NodeId,
        property: &Node,
        computed: bool,
    ) -> LowerResult<NodeId> {
        if computed {
            let key = self.lower_index_key(property)?;
            Ok(self.arena.index(object, key))
        } else {
            let name = property
                .as_identifier()
                .ok_or_else(|| LoweringError::new(property, "member name is not an identifier"))?;
            Ok(self.arena.member(object, &names::sanitize_field(name)))
        }
    }

    /// A computed key. Numeric keys move from 0-based to 1-based; string keys
    /// get the same renaming as dotted access. Keys of unknown type are
    /// shifted at run time by `__lunar_index`.
    fn lower_index_key(&mut self, key: &Node) -> LowerResult<NodeId> {
        if let Some(s) = key.as_string_literal() {
            return Ok(self.arena.string(names::sanitize_field(s)));
        }
        match self.analysis.kind_of(key) {
            Kind::Number => {
                if let NodeKind::Literal {
                    value: serde_json::Value::Number(n),
                    ..
                } = &key.kind
                {
                    if let Some(n) = n.as_f64() {
                        return Ok(self.arena.number(n + 1.0));
                    }
                }
                let key = self.lower_expr(key)?;
                let one = self.arena.number(1.0);
                Ok(self.arena.binary(BinaryOperator::Add, key, one))
            }
            Kind::String => self.lower_expr(key),
            Kind::Unknown | Kind::Bottom => {
                let key = self.lower_expr(key)?;
                self.require(RuntimeHelper::Index);
                Ok(self.arena.call_named(RuntimeHelper::Index.name(), vec![key]))
            }
        }
    }

    /// The parent table `super` refers to in the current class.
    fn parent_table(&self, node: &Node) -> LowerResult<String> {
        match &self.class_context(node)?.parent {
            Some(Parent::Class(name)) => Ok(name.clone()),
            Some(Parent::Error(_)) => Err(LoweringError::new(
                node,
                "builtin error classes have no methods to call",
            )),
            None => Err(LoweringError::new(node, "`super` in a class without a parent")),
        }
    }

    // =========================================================================
    // Places
    // =========================================================================

    /// Resolve an assignment target. Impure parts are evaluated into locals
    /// appended to `prelude`.
    pub(super) fn place<'n>(
        &mut self,
        target: &'n Node,
        prelude: &mut Vec<NodeId>,
    ) -> LowerResult<Place<'n>> {
        match &target.kind {
            NodeKind::Identifier { name } => Ok(Place::Name(Self::binding_name(name))),
            NodeKind::MemberExpression {
                object,
                property,
                computed,
                optional: false,
            } => {
                let base = self.base(object, prelude)?;
                if !*computed {
                    let name = property
                        .as_identifier()
                        .ok_or_else(|| {
                            LoweringError::new(property, "member name is not an identifier")
                        })?;
                    return Ok(Place::Field {
                        base,
                        field: names::sanitize_field(name).into_owned(),
                    });
                }
                let key = if is_pure(property) {
                    Base::Pure(property)
                } else {
                    let key = self.lower_index_key(property)?;
                    let temp = self.temp();
                    prelude.push(self.arena.local(&temp, Some(key)));
                    Base::Name(temp)
                };
                Ok(Place::Index { base, key })
            }
            _ => Err(LoweringError::new(target, "invalid assignment target")),
        }
    }

    fn base<'n>(&mut self, object: &'n Node, prelude: &mut Vec<NodeId>) -> LowerResult<Base<'n>> {
        if is_pure(object) {
            return Ok(Base::Pure(object));
        }
        let value = self.lower_expr(object)?;
        let temp = self.temp();
        prelude.push(self.arena.local(&temp, Some(value)));
        Ok(Base::Name(temp))
    }

    /// A fresh expression reading or writing `place`.
    pub(super) fn place_expr(&mut self, place: &Place<'_>) -> LowerResult<NodeId> {
        match place {
            Place::Name(name) => Ok(self.arena.ident(name.as_str())),
            Place::Field { base, field } => {
                let object = self.base_expr(base)?;
                Ok(self.arena.member(object, field))
            }
            Place::Index { base, key } => {
                let object = self.base_expr(base)?;
                let key = match key {
                    Base::Pure(key) => self.lower_index_key(key)?,
                    Base::Name(name) => self.arena.ident(name.as_str()),
                };
                Ok(self.arena.index(object, key))
            }
        }
    }

    fn base_expr(&mut self, base: &Base<'_>) -> LowerResult<NodeId> {
        match base {
            Base::Pure(node) => self.lower_expr(node),
            Base::Name(name) => Ok(self.arena.ident(name.as_str())),
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn lower_call(
        &mut self,
        node: &Node,
        callee: &Node,
        arguments: &[Node],
    ) -> LowerResult<NodeId> {
        match &callee.kind {
            NodeKind::Super {} => {
                let context = self.class_context(node)?;
                return match &context.parent {
                    Some(Parent::Class(parent)) => {
                        let parent = parent.clone();
                        let table = self.arena.ident(parent);
                        let constructor = self.arena.member(table, names::CONSTRUCTOR);
                        let mut args = vec![self.arena.alloc(Ir::ThisExpression)];
                        args.extend(self.lower_args(arguments)?);
                        Ok(self.arena.call(constructor, args))
                    }
                    Some(Parent::Error(_)) => {
                        let mut body = Vec::new();
                        self.lower_expr_stmt(node, &mut body)?;
                        Ok(self.arena.iife(body))
                    }
                    None => Err(LoweringError::new(node, "`super()` in a class without a parent")),
                };
            }
            NodeKind::MemberExpression {
                object,
                property,
                computed,
                ..
            } if matches!(object.kind, NodeKind::Super {}) => {
                let parent = self.parent_table(node)?;
                let table = self.arena.ident(parent);
                let method = self.member_of(table, property, *computed)?;
                let mut args = vec![self.arena.alloc(Ir::ThisExpression)];
                args.extend(self.lower_args(arguments)?);
                return Ok(self.arena.call(method, args));
            }
            _ => {}
        }

        if let Some(value) = self.lower_builtin_call(callee, arguments)? {
            return Ok(value);
        }

        match &callee.kind {
            NodeKind::MemberExpression {
                object,
                property,
                computed: false,
                optional: false,
            } => {
                let name = property
                    .as_identifier()
                    .ok_or_else(|| {
                        LoweringError::new(property, "method name is not an identifier")
                    })?;
                let field = names::sanitize_field(name).into_owned();
                let object = self.lower_expr(object)?;
                let args = self.lower_args(arguments)?;
                Ok(self.arena.method_call(object, &field, args))
            }
            NodeKind::MemberExpression {
                object,
                property,
                computed: true,
                optional: false,
            } => {
                // `obj[key](args)` passes `obj` as the receiver.
                let mut body = Vec::new();
                let receiver = self.lower_expr(object)?;
                let receiver = self.ensure_name(receiver, &mut body);
                let table = self.arena.ident(receiver.as_str());
                let method = self.member_of(table, property, true)?;
                let mut args = vec![self.arena.ident(receiver)];
                args.extend(self.lower_args(arguments)?);
                let call = self.arena.call(method, args);
                if body.is_empty() {
                    return Ok(call);
                }
                body.push(self.arena.ret(vec![call]));
                Ok(self.arena.iife(body))
            }
            _ => {
                let callee = self.lower_expr(callee)?;
                let args = self.lower_args(arguments)?;
                Ok(self.arena.call(callee, args))
            }
        }
    }

    /// Call arguments. A trailing spread expands in place; spreads anywhere
    /// else are concatenated first.
    pub(super) fn lower_args(&mut self, arguments: &[Node]) -> LowerResult<Vec<NodeId>> {
        let spreads = arguments
            .iter()
            .filter(|a| matches!(a.kind, NodeKind::SpreadElement { .. }))
            .count();
        let trailing = matches!(
            arguments.last().map(|a| &a.kind),
            Some(NodeKind::SpreadElement { .. })
        );
        if spreads == 0 || (spreads == 1 && trailing) {
            return arguments
                .iter()
                .map(|argument| match &argument.kind {
                    NodeKind::SpreadElement { argument } => {
                        let argument = self.lower_expr(argument)?;
                        Ok(self.arena.alloc(Ir::SpreadElement { argument }))
                    }
                    _ => self.lower_expr(argument),
                })
                .collect();
        }
        let items: Vec<Option<&Node>> = arguments.iter().map(Some).collect();
        let argument = self.lower_spread_list(&items)?;
        Ok(vec![self.arena.alloc(Ir::SpreadElement { argument })])
    }

    /// `__lunar_spread({a, b}, xs, {c})` for a list with spreads.
    fn lower_spread_list(&mut self, items: &[Option<&Node>]) -> LowerResult<NodeId> {
        self.require(RuntimeHelper::Spread);
        let mut parts = Vec::new();
        let mut run = Vec::new();
        for item in items {
            match item {
                Some(Node {
                    kind: NodeKind::SpreadElement { argument },
                    ..
                }) => {
                    if !run.is_empty() {
                        parts.push(self.arena.array(std::mem::take(&mut run)));
                    }
                    parts.push(self.lower_expr(argument)?);
                }
                Some(item) => run.push(self.lower_expr(item)?),
                None => run.push(self.arena.null()),
            }
        }
        if !run.is_empty() {
            parts.push(self.arena.array(run));
        }
        Ok(self.arena.call_named(RuntimeHelper::Spread.name(), parts))
    }

    fn lower_new(&mut self, callee: &Node, arguments: &[Node]) -> LowerResult<NodeId> {
        if let Some(name) = callee.as_identifier() {
            if ERROR_CLASSES.contains(&name) && !self.scopes.is_declared(name) {
                let message = match arguments.first() {
                    Some(message) => self.lower_expr(message)?,
                    None => self.arena.string(""),
                };
                let name = self.arena.string(name);
                return Ok(self.arena.object(vec![("name", name), ("message", message)]));
            }
        }
        let class = self.lower_expr(callee)?;
        let constructor = self.arena.member(class, names::NEW);
        let args = self.lower_args(arguments)?;
        Ok(self.arena.call(constructor, args))
    }

    // =========================================================================
    // Optional chains
    // =========================================================================

    /// `a?.b.c` and friends: each optional link checks its base for nil and
    /// short-circuits the whole chain.
    fn lower_chain(&mut self, expression: &Node) -> LowerResult<NodeId> {
        let mut body = Vec::new();
        let value = self.chain_link(expression, &mut body)?;
        body.push(self.arena.ret(vec![value]));
        Ok(self.arena.iife(body))
    }

    fn chain_link(&mut self, node: &Node, body: &mut Vec<NodeId>) -> LowerResult<NodeId> {
        match &node.kind {
            NodeKind::MemberExpression {
                object,
                property,
                computed,
                optional,
            } => {
                let object = self.chain_link(object, body)?;
                let object = if *optional { self.guard_nil(object, body) } else { object };
                if !*computed && property.is_identifier("length") {
                    return Ok(self.arena.unary(UnaryOperator::Len, object));
                }
                self.member_of(object, property, *computed)
            }
            NodeKind::CallExpression {
                callee,
                arguments,
                optional,
            } => {
                let (function, receiver) = match &callee.kind {
                    NodeKind::MemberExpression {
                        object,
                        property,
                        computed,
                        optional: member_optional,
                    } if !matches!(object.kind, NodeKind::Super {}) => {
                        let object = self.chain_link(object, body)?;
                        let object = if *member_optional {
                            self.guard_nil(object, body)
                        } else {
                            object
                        };
                        let receiver = self.ensure_name(object, body);
                        let table = self.arena.ident(receiver.as_str());
                        (self.member_of(table, property, *computed)?, Some(receiver))
                    }
                    _ => (self.chain_link(callee, body)?, None),
                };
                let function = if *optional { self.guard_nil(function, body) } else { function };
                let mut args = Vec::new();
                if let Some(receiver) = receiver {
                    args.push(self.arena.ident(receiver));
                }
                args.extend(self.lower_args(arguments)?);
                Ok(self.arena.call(function, args))
            }
            NodeKind::ChainExpression { expression } => self.chain_link(expression, body),
            _ => self.lower_expr(node),
        }
    }

    /// Bind `value` to a local and return from the chain if it is nil.
    fn guard_nil(&mut self, value: NodeId, body: &mut Vec<NodeId>) -> NodeId {
        let temp = self.temp();
        body.push(self.arena.local(&temp, Some(value)));
        let current = self.arena.ident(temp.as_str());
        let nil = self.arena.null();
        let test = self.arena.binary(BinaryOperator::Eq, current, nil);
        let nil = self.arena.null();
        let bail = self.arena.ret(vec![nil]);
        body.push(self.arena.if_(test, vec![bail], None));
        self.arena.ident(temp)
    }

    // =========================================================================
    // Literals
    // =========================================================================

    fn lower_array(&mut self, elements: &[Option<Node>]) -> LowerResult<NodeId> {
        let spreads = elements
            .iter()
            .flatten()
            .filter(|e| matches!(e.kind, NodeKind::SpreadElement { .. }))
            .count();
        let trailing = matches!(
            elements.last().and_then(Option::as_ref).map(|e| &e.kind),
            Some(NodeKind::SpreadElement { .. })
        );
        if spreads > 1 || (spreads == 1 && !trailing) {
            let items: Vec<Option<&Node>> = elements.iter().map(Option::as_ref).collect();
            return self.lower_spread_list(&items);
        }
        let mut lowered = Vec::with_capacity(elements.len());
        for element in elements {
            lowered.push(match element {
                Some(Node {
                    kind: NodeKind::SpreadElement { argument },
                    ..
                }) => {
                    let argument = self.lower_expr(argument)?;
                    self.arena.alloc(Ir::SpreadElement { argument })
                }
                Some(element) => self.lower_expr(element)?,
                None => self.arena.null(),
            });
        }
        Ok(self.arena.array(lowered))
    }

    fn lower_object(&mut self, properties: &[Node]) -> LowerResult<NodeId> {
        let mut parts = Vec::new();
        let mut run = Vec::new();
        for property in properties {
            match &property.kind {
                NodeKind::Property {
                    key, value, computed, ..
                } => {
                    let (key, computed) = self.lower_property_key(key, *computed)?;
                    let value = self.lower_member_value(value)?;
                    run.push(self.arena.alloc(Ir::Property {
                        key,
                        value,
                        computed,
                        shorthand: false,
                    }));
                }
                NodeKind::SpreadElement { argument } => {
                    if parts.is_empty() || !run.is_empty() {
                        let properties = std::mem::take(&mut run);
                        parts.push(self.arena.alloc(Ir::ObjectExpression { properties }));
                    }
                    parts.push(self.lower_expr(argument)?);
                }
                _ => return Err(LoweringError::new(property, "unsupported object literal entry")),
            }
        }
        if parts.is_empty() {
            return Ok(self.arena.alloc(Ir::ObjectExpression { properties: run }));
        }
        self.require(RuntimeHelper::Assign);
        if !run.is_empty() {
            parts.push(self.arena.alloc(Ir::ObjectExpression { properties: run }));
        }
        Ok(self.arena.call_named(RuntimeHelper::Assign.name(), parts))
    }

    /// A property key: names and strings as fields, numbers and computed keys
    /// in brackets.
    pub(super) fn lower_property_key(
        &mut self,
        key: &Node,
        computed: bool,
    ) -> LowerResult<(NodeId, bool)> {
        if computed {
            return Ok((self.lower_expr(key)?, true));
        }
        match &key.kind {
            NodeKind::Literal {
                value: serde_json::Value::Number(_),
                ..
            } => Ok((self.lower_expr(key)?, true)),
            _ => {
                let name = super::pattern::static_key(key)
                    .ok_or_else(|| LoweringError::new(key, "unsupported property key"))?;
                Ok((self.arena.ident(names::sanitize_field(&name)), false))
            }
        }
    }

    /// A value stored on an object. Functions get a receiver parameter, since
    /// calls through a member pass the object first.
    pub(super) fn lower_member_value(&mut self, value: &Node) -> LowerResult<NodeId> {
        match &value.kind {
            NodeKind::FunctionExpression { .. } => {
                self.lower_function_expr(value, Receiver::SelfParam)
            }
            NodeKind::ArrowFunctionExpression { .. } => {
                self.lower_arrow(value, Receiver::Placeholder)
            }
            _ => self.lower_expr(value),
        }
    }
}

/// Side-effect free and cheap to evaluate more than once.
pub(super) fn is_pure(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Identifier { .. }
        | NodeKind::ThisExpression {}
        | NodeKind::Literal { .. } => true,
        NodeKind::MemberExpression {
            object,
            property,
            computed,
            optional: false,
        } => is_pure(object) && (!computed || is_pure(property)),
        _ => false,
    }
}

/// Never nil or false in the target language.
fn is_truthy(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Literal { value, .. } => matches!(
            value,
            serde_json::Value::Number(_)
                | serde_json::Value::String(_)
                | serde_json::Value::Bool(true)
        ),
        NodeKind::TemplateLiteral { .. }
        | NodeKind::ArrayExpression { .. }
        | NodeKind::ObjectExpression { .. }
        | NodeKind::FunctionExpression { .. }
        | NodeKind::ArrowFunctionExpression { .. }
        | NodeKind::ClassExpression { .. }
        | NodeKind::NewExpression { .. } => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_ast::build;

    #[test]
    fn test_purity() {
        assert!(is_pure(&build::ident("x")));
        assert!(is_pure(&build::member(build::this(), "count")));
        assert!(is_pure(&build::index(build::ident("xs"), build::ident("i"))));
        assert!(!is_pure(&build::call(build::ident("f"), vec![])));
        assert!(!is_pure(&build::member(build::call(build::ident("f"), vec![]), "x")));
    }

    #[test]
    fn test_truthy_consequents() {
        assert!(is_truthy(&build::num(0.0)));
        assert!(is_truthy(&build::string("")));
        assert!(is_truthy(&build::array(vec![])));
        assert!(!is_truthy(&build::boolean(false)));
        assert!(!is_truthy(&build::null()));
        assert!(!is_truthy(&build::ident("value")));
    }
}
