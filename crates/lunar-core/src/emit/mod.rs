//! Lua source emitter.
//!
//! Renders a validated arena as Lua 5.4 text by walking `moduleBody` and
//! dispatching on node kind. Emission is a pure function of the arena and the
//! options: it makes no semantic decisions beyond the fixed rendering of each
//! kind, so identical arenas always produce identical text.

mod class;
mod expr;
mod stmt;

use crate::config::CompileOptions;
use crate::error::EmissionGap;
use crate::ir::{Arena, Node, NodeId};

type EmitResult = Result<(), EmissionGap>;

/// Render `arena` as Lua source text.
pub fn emit(arena: &Arena, options: &CompileOptions) -> Result<String, EmissionGap> {
    let mut emitter = Emitter::new(arena, options);
    emitter.emit_module()?;
    Ok(emitter.output)
}

/// The code generator.
struct Emitter<'a> {
    arena: &'a Arena,
    header: Option<&'a str>,
    /// Output buffer.
    output: String,
    /// Current indentation level.
    indent_level: usize,
    /// Indent string.
    indent_str: &'a str,
}

impl<'a> Emitter<'a> {
    fn new(arena: &'a Arena, options: &'a CompileOptions) -> Self {
        Self {
            arena,
            header: options.header.as_deref(),
            output: String::new(),
            indent_level: 0,
            indent_str: &options.indent,
        }
    }

    fn emit_module(&mut self) -> EmitResult {
        if let Some(header) = self.header {
            for line in header.lines() {
                self.emit("-- ");
                self.emit(line);
                self.output.push('\n');
            }
        }
        for &id in self.arena.module_body() {
            self.emit_stmt(id)?;
            self.output.push('\n');
        }
        Ok(())
    }

    // =========================================================================
    // Output Helpers
    // =========================================================================

    fn emit(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn emit_newline(&mut self) {
        self.output.push('\n');
        for _ in 0..self.indent_level {
            self.output.push_str(self.indent_str);
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    // =========================================================================
    // Arena access
    // =========================================================================

    fn node(&self, id: NodeId) -> Result<&'a Node, EmissionGap> {
        self.arena.get(id).ok_or(EmissionGap {
            node: id,
            kind: "missing",
            context: "node lookup",
        })
    }

    fn gap(&self, id: NodeId, context: &'static str) -> EmissionGap {
        EmissionGap {
            node: id,
            kind: self.arena.get(id).map_or("missing", Node::kind_name),
            context,
        }
    }

    fn identifier(&self, id: NodeId, context: &'static str) -> Result<&'a str, EmissionGap> {
        match self.node(id)? {
            Node::Identifier { name } => Ok(name),
            _ => Err(self.gap(id, context)),
        }
    }

    fn block_statements(&self, id: NodeId) -> Result<&'a [NodeId], EmissionGap> {
        match self.node(id)? {
            Node::BlockStatement { statements } => Ok(statements),
            _ => Err(self.gap(id, "block position")),
        }
    }
}

/// Render a number as a Lua numeral.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "(0 / 0)".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "math.huge" } else { "-math.huge" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        let s = format!("{n}");
        let exp = format!("{n:e}");
        if exp.len() < s.len() {
            exp
        } else {
            s
        }
    }
}

/// Escape the contents of a double-quoted Lua string.
pub(crate) fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{{{:X}}}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        BinaryOperator, DeclarationKind, Declarator, Iteration, LogicalOperator, MethodKind,
        SwitchCase, UnaryOperator,
    };

    fn render(arena: &Arena) -> String {
        emit(arena, &CompileOptions::default()).unwrap()
    }

    fn render_statement(build: impl FnOnce(&mut Arena) -> NodeId) -> String {
        let mut arena = Arena::new();
        let stmt = build(&mut arena);
        arena.push_module_statement(stmt);
        render(&arena)
    }

    fn render_expr(build: impl FnOnce(&mut Arena) -> NodeId) -> String {
        let text = render_statement(|a| {
            let value = build(a);
            a.local("x", Some(value))
        });
        text.trim_end()
            .strip_prefix("local x = ")
            .map(str::to_string)
            .unwrap_or(text)
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(1e21), "1e21");
        assert_eq!(format_number(f64::INFINITY), "math.huge");
        assert_eq!(format_number(f64::NAN), "(0 / 0)");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("a\"b"), "a\\\"b");
        assert_eq!(escape_string("line\nnext"), "line\\nnext");
        assert_eq!(escape_string("\u{1}"), "\\u{1}");
        assert_eq!(escape_string("café"), "café");
    }

    #[test]
    fn test_precedence_parenthesizes() {
        let text = render_expr(|a| {
            let x = a.ident("a");
            let y = a.ident("b");
            let sum = a.binary(BinaryOperator::Add, x, y);
            let two = a.number(2.0);
            a.binary(BinaryOperator::Mul, sum, two)
        });
        assert_eq!(text, "(a + b) * 2");

        let text = render_expr(|a| {
            let x = a.ident("a");
            let y = a.ident("b");
            let z = a.ident("c");
            let inner = a.binary(BinaryOperator::Sub, y, z);
            a.binary(BinaryOperator::Sub, x, inner)
        });
        assert_eq!(text, "a - (b - c)");
    }

    #[test]
    fn test_concat_is_right_associative() {
        let text = render_expr(|a| {
            let x = a.string("a");
            let y = a.ident("b");
            let z = a.string("c");
            let tail = a.binary(BinaryOperator::Concat, y, z);
            a.binary(BinaryOperator::Concat, x, tail)
        });
        assert_eq!(text, "\"a\" .. b .. \"c\"");
    }

    #[test]
    fn test_unary_operators() {
        let text = render_expr(|a| {
            let x = a.ident("a");
            let y = a.ident("b");
            let eq = a.binary(BinaryOperator::Eq, x, y);
            a.unary(UnaryOperator::Not, eq)
        });
        assert_eq!(text, "not (a == b)");

        let text = render_expr(|a| {
            let x = a.ident("a");
            let neg = a.unary(UnaryOperator::Neg, x);
            a.unary(UnaryOperator::Neg, neg)
        });
        assert_eq!(text, "- -a");

        let text = render_expr(|a| {
            let x = a.ident("items");
            a.unary(UnaryOperator::Len, x)
        });
        assert_eq!(text, "#items");
    }

    #[test]
    fn test_logical_operators() {
        let text = render_expr(|a| {
            let x = a.ident("a");
            let y = a.ident("b");
            let z = a.ident("c");
            let or = a.logical(LogicalOperator::Or, x, y);
            a.logical(LogicalOperator::And, or, z)
        });
        assert_eq!(text, "(a or b) and c");
    }

    #[test]
    fn test_member_and_method_calls() {
        let text = render_statement(|a| {
            let obj = a.ident("list");
            let arg = a.number(1.0);
            let call = a.method_call(obj, "add", vec![arg]);
            a.expr_stmt(call)
        });
        assert_eq!(text, "list:add(1)\n");

        let text = render_expr(|a| {
            let obj = a.ident("t");
            a.member(obj, "my-key")
        });
        assert_eq!(text, "t[\"my-key\"]");

        let text = render_expr(|a| {
            let s = a.string("abc");
            a.method_call(s, "upper", vec![])
        });
        assert_eq!(text, "(\"abc\"):upper()");
    }

    #[test]
    fn test_statement_starting_with_paren_gets_separator() {
        let text = render_statement(|a| {
            let call = a.iife(vec![]);
            a.expr_stmt(call)
        });
        assert!(text.starts_with(";(function()"), "{text}");
    }

    #[test]
    fn test_template_literal() {
        let text = render_expr(|a| {
            let name = a.ident("name");
            a.alloc(Node::TemplateLiteral {
                quasis: vec!["Hello, ".to_string(), "!".to_string()],
                expressions: vec![name],
            })
        });
        assert_eq!(text, "\"Hello, \" .. tostring(name) .. \"!\"");

        let text = render_expr(|a| {
            a.alloc(Node::TemplateLiteral {
                quasis: vec![String::new()],
                expressions: vec![],
            })
        });
        assert_eq!(text, "\"\"");
    }

    #[test]
    fn test_object_literal_keys() {
        let text = render_expr(|a| {
            let one = a.number(1.0);
            let two = a.number(2.0);
            a.object(vec![("a", one), ("end", two)])
        });
        assert_eq!(text, "{a = 1, [\"end\"] = 2}");

        let text = render_expr(|a| {
            let key = a.ident("k");
            let value = a.boolean(true);
            let property = a.alloc(Node::Property {
                key,
                value,
                computed: true,
                shorthand: false,
            });
            a.alloc(Node::ObjectExpression {
                properties: vec![property],
            })
        });
        assert_eq!(text, "{[k] = true}");
    }

    #[test]
    fn test_if_elseif_chain() {
        let text = render_statement(|a| {
            let first = a.ident("a");
            let second = a.ident("b");
            let call = a.call_named("f", vec![]);
            let stmt = a.expr_stmt(call);
            let inner = a.if_(second, vec![], Some(vec![]));
            let consequent = a.block(vec![stmt]);
            a.alloc(Node::IfStatement {
                test: first,
                consequent,
                alternate: Some(inner),
            })
        });
        assert_eq!(text, "if a then\n  f()\nelseif b then\nelse\nend\n");
    }

    #[test]
    fn test_loops_with_continue_labels() {
        let text = render_statement(|a| {
            let test = a.boolean(true);
            let cont = a.alloc(Node::ContinueStatement {
                label: "__continue1".to_string(),
            });
            let body = a.block(vec![cont]);
            a.alloc(Node::WhileStatement {
                test,
                body,
                continue_label: Some("__continue1".to_string()),
            })
        });
        assert_eq!(
            text,
            "while true do\n  do\n    goto __continue1\n  end\n  ::__continue1::\nend\n"
        );

        let text = render_statement(|a| {
            let left = a.ident("x");
            let right = a.ident("xs");
            let body = a.block(vec![]);
            a.alloc(Node::ForOfStatement {
                left,
                right,
                body,
                iteration: Iteration::Positional,
                continue_label: None,
            })
        });
        assert_eq!(text, "for _, x in ipairs(xs) do\nend\n");

        let text = render_statement(|a| {
            let body = a.block(vec![]);
            let test = a.ident("going");
            a.alloc(Node::DoWhileStatement {
                body,
                test,
                continue_label: None,
            })
        });
        assert_eq!(text, "repeat\n  do\n  end\nuntil not going\n");
    }

    #[test]
    fn test_switch_template() {
        let text = render_statement(|a| {
            let discriminant = a.ident("k");
            let one = a.number(1.0);
            let two = a.number(2.0);
            let call = a.call_named("shared", vec![]);
            let body = a.expr_stmt(call);
            let other = a.call_named("other", vec![]);
            let default_body = a.expr_stmt(other);
            a.alloc(Node::SwitchStatement {
                discriminant,
                cases: vec![
                    SwitchCase {
                        tests: vec![one, two],
                        consequent: vec![body],
                    },
                    SwitchCase {
                        tests: vec![],
                        consequent: vec![default_body],
                    },
                ],
            })
        });
        assert_eq!(
            text,
            "do\n  local __switch = k\n  if __switch == 1 or __switch == 2 then\n    shared()\n  else\n    other()\n  end\nend\n"
        );
    }

    #[test]
    fn test_try_template() {
        let text = render_statement(|a| {
            let call = a.call_named("work", vec![]);
            let work = a.expr_stmt(call);
            let block = a.block(vec![work]);
            let param = a.ident("e");
            let handler_body = a.block(vec![]);
            let handler = a.alloc(Node::CatchClause {
                param: Some(param),
                body: handler_body,
            });
            let cleanup = a.call_named("cleanup", vec![]);
            let cleanup = a.expr_stmt(cleanup);
            let finalizer = a.block(vec![cleanup]);
            a.alloc(Node::TryStatement {
                block,
                handler: Some(handler),
                finalizer: Some(finalizer),
                completion: None,
            })
        });
        let expected = "\
do
  local __ok, __flow, __value = pcall(function()
    work()
  end)
  if not __ok then
    __ok, __flow, __value = pcall(function(e)
    end, __flow)
  end
  do
    cleanup()
  end
  if not __ok then error(__flow, 0) end
end
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_class_template() {
        let text = render_statement(|a| {
            let name = a.ident("Dog");
            let parent = a.ident("Animal");
            let key = a.ident("speak");
            let params = a.params(&["self"]);
            let body = a.block(vec![]);
            let value = a.alloc(Node::FunctionExpression {
                id: None,
                params,
                body,
                is_async: false,
                is_generator: false,
            });
            let method = a.alloc(Node::MethodDefinition {
                kind: MethodKind::Method,
                key,
                computed: false,
                value,
            });
            a.alloc(Node::ClassDeclaration {
                id: name,
                super_class: Some(parent),
                body: vec![method],
                static_fields: vec![],
            })
        });
        let expected = "\
local Dog = setmetatable({}, { __index = Animal })
Dog.__get = setmetatable({}, { __index = Animal.__get })
Dog.__set = setmetatable({}, { __index = Animal.__set })
function Dog.new(...)
  local self = setmetatable({}, Dog)
  self:constructor(...)
  return self
end
function Dog.speak(self)
end
function Dog.__index(t, k)
  local getter = Dog.__get[k]
  if getter then return getter(t) end
  return Dog[k]
end
function Dog.__newindex(t, k, v)
  local setter = Dog.__set[k]
  if setter then setter(t, v) else rawset(t, k, v) end
end
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_base_class_without_accessors_indexes_itself() {
        let text = render_statement(|a| {
            let name = a.ident("Animal");
            a.alloc(Node::ClassDeclaration {
                id: name,
                super_class: None,
                body: vec![],
                static_fields: vec![],
            })
        });
        assert!(text.starts_with("local Animal = {}\nAnimal.__index = Animal\n"), "{text}");
        assert!(!text.contains("__newindex"), "{text}");
    }

    #[test]
    fn test_declarations() {
        let text = render_statement(|a| a.predeclare(&["a".to_string(), "b".to_string()]));
        assert_eq!(text, "local a, b\n");

        let text = render_statement(|a| {
            let first = a.ident("first");
            let second = a.ident("second");
            let pattern = a.alloc(Node::ArrayPattern {
                elements: vec![Some(first), None, Some(second)],
            });
            let init = a.ident("pair");
            a.alloc(Node::VariableDeclaration {
                declaration_kind: DeclarationKind::Const,
                declarations: vec![Declarator {
                    pattern,
                    init: Some(init),
                }],
            })
        });
        assert_eq!(text, "local first, _, second = table.unpack(pair)\n");
    }

    #[test]
    fn test_gap_reports_node() {
        let mut arena = Arena::new();
        let sup = arena.alloc(Node::Super);
        let stmt = arena.ret(vec![sup]);
        arena.push_module_statement(stmt);
        let gap = emit(&arena, &CompileOptions::default()).unwrap_err();
        assert_eq!(gap.node, sup);
        assert_eq!(gap.kind, "Super");

        let mut arena = Arena::new();
        let literal = arena.number(1.0);
        let stmt = arena.expr_stmt(literal);
        arena.push_module_statement(stmt);
        let gap = emit(&arena, &CompileOptions::default()).unwrap_err();
        assert_eq!(gap.context, "expression statement");
    }

    #[test]
    fn test_header_and_indent_options() {
        let mut arena = Arena::new();
        let test = arena.boolean(true);
        let inner = arena.ret(vec![]);
        let stmt = arena.if_(test, vec![inner], None);
        arena.push_module_statement(stmt);
        let options = CompileOptions::new().with_indent("\t").with_header("generated");
        let text = emit(&arena, &options).unwrap();
        assert_eq!(text, "-- generated\nif true then\n\treturn\nend\n");
    }
}
