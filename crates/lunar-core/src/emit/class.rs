use super::{EmitResult, Emitter};
use crate::ir::{MethodKind, Node, NodeId};
use crate::names;

impl<'a> Emitter<'a> {
    /// Render a class as a dispatch table:
    ///
    /// ```text
    /// local Name = setmetatable({}, { __index = Parent })
    /// Name.__index = Name
    /// function Name.new(...) ... end
    /// function Name.method(self, ...) ... end
    /// ```
    ///
    /// Instances get the class as metatable, so lookups of missing members
    /// fall through to the class table and from there to the parent table.
    /// Classes with accessors replace `__index` with a function that consults
    /// the getter table first, and add a `__newindex` that routes setters.
    /// Derived classes always dispatch, since a parent's accessors must keep
    /// working on instances of the child.
    pub(super) fn emit_class(
        &mut self,
        name: NodeId,
        super_class: Option<NodeId>,
        members: &[NodeId],
        static_fields: &[NodeId],
    ) -> EmitResult {
        let name = self.identifier(name, "class name")?;
        let parent = match super_class {
            Some(parent) => Some(self.identifier(parent, "superclass")?),
            None => None,
        };

        let mut methods = Vec::with_capacity(members.len());
        for &member in members {
            let Node::MethodDefinition {
                kind,
                key,
                computed,
                value,
            } = self.node(member)?
            else {
                return Err(self.gap(member, "class member"));
            };
            methods.push((*kind, *key, *computed, *value));
        }
        let dispatch = parent.is_some()
            || methods
                .iter()
                .any(|(kind, ..)| matches!(kind, MethodKind::Get | MethodKind::Set));

        self.emit("local ");
        self.emit(name);
        self.emit(" = ");
        self.emit_inheriting_table(parent, None);

        if dispatch {
            for table in [names::GETTERS, names::SETTERS] {
                self.emit_newline();
                self.emit(&format!("{name}.{table} = "));
                self.emit_inheriting_table(parent, Some(table));
            }
        } else {
            self.emit_newline();
            self.emit(&format!("{name}.{} = {name}", names::INDEX));
        }

        self.emit_newline();
        self.emit(&format!("function {name}.{}(...)", names::NEW));
        self.indent();
        self.emit_newline();
        self.emit(&format!("local {} = setmetatable({{}}, {name})", names::SELF));
        self.emit_newline();
        self.emit(&format!("{}:{}(...)", names::SELF, names::CONSTRUCTOR));
        self.emit_newline();
        self.emit(&format!("return {}", names::SELF));
        self.dedent();
        self.emit_newline();
        self.emit("end");

        for (kind, key, computed, value) in methods {
            let table = match kind {
                MethodKind::Get => format!("{name}.{}", names::GETTERS),
                MethodKind::Set => format!("{name}.{}", names::SETTERS),
                MethodKind::Constructor | MethodKind::Method | MethodKind::StaticMethod => {
                    name.to_string()
                }
            };
            let (params, body) = match self.node(value)? {
                Node::FunctionExpression { params, body, .. }
                | Node::ArrowFunctionExpression { params, body, .. } => (params, *body),
                _ => return Err(self.gap(value, "method value")),
            };
            self.emit_newline();
            match self.node(key)? {
                Node::Identifier { name: key } if !computed && names::is_field_name(key) => {
                    self.emit(&format!("function {table}.{key}"));
                    self.emit_function_tail(params, body)?;
                }
                _ => {
                    self.emit(&table);
                    self.emit("[");
                    self.emit_member_key(key, computed)?;
                    self.emit("] = function");
                    self.emit_function_tail(params, body)?;
                }
            }
        }

        if dispatch {
            self.emit_accessor_dispatch(name);
        }

        for &field in static_fields {
            let Node::Property {
                key,
                value,
                computed,
                ..
            } = self.node(field)?
            else {
                return Err(self.gap(field, "static field"));
            };
            self.emit_newline();
            self.emit(name);
            match self.node(*key)? {
                Node::Identifier { name: key } if !computed => self.emit_field(key),
                _ => {
                    self.emit("[");
                    self.emit_member_key(*key, *computed)?;
                    self.emit("]");
                }
            }
            self.emit(" = ");
            self.emit_expr(*value)?;
        }
        Ok(())
    }

    /// `{}` or a table that falls back to the parent's table of the same role.
    fn emit_inheriting_table(&mut self, parent: Option<&str>, field: Option<&str>) {
        match (parent, field) {
            (None, _) => self.emit("{}"),
            (Some(parent), None) => {
                self.emit(&format!("setmetatable({{}}, {{ {} = {parent} }})", names::INDEX));
            }
            (Some(parent), Some(field)) => self.emit(&format!(
                "setmetatable({{}}, {{ {} = {parent}.{field} }})",
                names::INDEX
            )),
        }
    }

    /// A key in `[...]` position: a computed expression, or a name that is not
    /// a valid field name.
    fn emit_member_key(&mut self, key: NodeId, computed: bool) -> EmitResult {
        match self.node(key)? {
            Node::Identifier { name } if !computed => {
                self.emit("\"");
                self.emit(&super::escape_string(name));
                self.emit("\"");
                Ok(())
            }
            _ => self.emit_expr(key),
        }
    }

    fn emit_accessor_dispatch(&mut self, name: &str) {
        let lines = [
            format!("function {name}.{}(t, k)", names::INDEX),
            format!("local getter = {name}.{}[k]", names::GETTERS),
            "if getter then return getter(t) end".to_string(),
            format!("return {name}[k]"),
        ];
        self.emit_function_lines(&lines);
        let lines = [
            format!("function {name}.{}(t, k, v)", names::NEWINDEX),
            format!("local setter = {name}.{}[k]", names::SETTERS),
            "if setter then setter(t, v) else rawset(t, k, v) end".to_string(),
        ];
        self.emit_function_lines(&lines);
    }

    fn emit_function_lines(&mut self, lines: &[String]) {
        let Some((head, body)) = lines.split_first() else {
            return;
        };
        self.emit_newline();
        self.emit(head);
        self.indent();
        for line in body {
            self.emit_newline();
            self.emit(line);
        }
        self.dedent();
        self.emit_newline();
        self.emit("end");
    }
}
