//! Runtime helpers, synthesized as IR.
//!
//! Each helper is an ordinary local function (or, for the task queue, a
//! local table) prepended to the unit. Only helpers the unit uses are
//! emitted, together with what they depend on, in [`RuntimeHelper`]
//! declaration order. The coroutine protocol strings come from
//! [`crate::protocol`].

use crate::ir::{Arena, BinaryOperator, Iteration, LogicalOperator, Node, NodeId, UnaryOperator};
use crate::names;
use crate::protocol::{CoroutineState, ProtocolMethod, RuntimeHelper, TaskStatus};
use std::collections::BTreeSet;

/// Size of the 32-bit integer range bitwise operators wrap into.
const UINT32_RANGE: f64 = 4_294_967_296.0;

/// `helpers` plus everything they depend on, in emission order.
pub(super) fn with_dependencies(helpers: &BTreeSet<RuntimeHelper>) -> Vec<RuntimeHelper> {
    let mut all = BTreeSet::new();
    let mut stack: Vec<RuntimeHelper> = helpers.iter().copied().collect();
    while let Some(helper) = stack.pop() {
        if all.insert(helper) {
            stack.extend_from_slice(helper.dependencies());
        }
    }
    all.into_iter().collect()
}

/// Allocate the definitions of `helpers` and return their statements.
pub(super) fn synthesize(arena: &mut Arena, helpers: &[RuntimeHelper]) -> Vec<NodeId> {
    let mut b = Builder { arena };
    helpers.iter().map(|helper| b.helper(*helper)).collect()
}

struct Builder<'a> {
    arena: &'a mut Arena,
}

impl Builder<'_> {
    fn helper(&mut self, helper: RuntimeHelper) -> NodeId {
        match helper {
            RuntimeHelper::Suspend => self.suspend(),
            RuntimeHelper::Generator => self.generator(),
            RuntimeHelper::Delegate => self.delegate(),
            RuntimeHelper::Iterate => self.iterate(),
            RuntimeHelper::Tasks => {
                let queue = self.arena.array(vec![]);
                self.arena.local(RuntimeHelper::Tasks.name(), Some(queue))
            }
            RuntimeHelper::Step => self.step(),
            RuntimeHelper::Async => self.async_(),
            RuntimeHelper::Resolve => {
                let value = self.id("value");
                let task = self.task(TaskStatus::Fulfilled, "value", value);
                let body = vec![self.arena.ret(vec![task])];
                self.function(helper, &["value"], body)
            }
            RuntimeHelper::AwaitAll => self.await_all(),
            RuntimeHelper::Drain => self.drain(),
            RuntimeHelper::Spread => self.spread(),
            RuntimeHelper::Assign => self.assign(),
            RuntimeHelper::ObjectRest => self.object_rest(),
            RuntimeHelper::Push => self.push(),
            RuntimeHelper::Index => self.index_key(),
            RuntimeHelper::Keys | RuntimeHelper::Values | RuntimeHelper::Entries => {
                self.collect_keys(helper)
            }
            RuntimeHelper::Map | RuntimeHelper::Filter | RuntimeHelper::ForEach => {
                self.list_method(helper)
            }
            RuntimeHelper::Typeof => self.typeof_(),
            RuntimeHelper::Instanceof => self.instanceof(),
            RuntimeHelper::Uint32 => self.uint32(),
            RuntimeHelper::Int32 => self.int32(),
        }
    }

    // =========================================================================
    // Coroutine protocol
    // =========================================================================

    /// ```text
    /// local function __lunar_suspend(value)
    ///   local resumed = {coroutine.yield(value)}
    ///   if resumed[1] == "throw" then error(resumed[2], 0) end
    ///   return resumed[2]
    /// end
    /// ```
    fn suspend(&mut self) -> NodeId {
        let value = self.id("value");
        let yielded = self.coroutine("yield", vec![value]);
        let resumed = self.arena.array(vec![yielded]);
        let capture = self.arena.local("resumed", Some(resumed));
        let mode = self.at("resumed", 1);
        let throw = self.arena.string(ProtocolMethod::Throw.mode());
        let test = self.arena.binary(BinaryOperator::Eq, mode, throw);
        let error = self.at("resumed", 2);
        let raise = self.raise(error);
        let check = self.arena.if_(test, vec![raise], None);
        let value = self.at("resumed", 2);
        let done = self.arena.ret(vec![value]);
        self.function(RuntimeHelper::Suspend, &["value"], vec![capture, check, done])
    }

    /// A generator object over a coroutine running `body`.
    fn generator(&mut self) -> NodeId {
        let mut body = Vec::new();
        let function = self.id("body");
        let co = self.coroutine("create", vec![function]);
        body.push(self.arena.local("co", Some(co)));
        let state = self.arena.string(CoroutineState::Suspended.as_str());
        let started = self.arena.boolean(false);
        let gen = self.arena.object(vec![("state", state), ("started", started)]);
        body.push(self.arena.local("gen", Some(gen)));
        body.push(self.advance());

        for method in ProtocolMethod::ALL {
            let statements = match method {
                ProtocolMethod::Return => {
                    let done = self.set_state(CoroutineState::Done);
                    let value = self.id("value");
                    let yes = self.arena.boolean(true);
                    let result = self.arena.object(vec![("value", value), ("done", yes)]);
                    vec![done, self.arena.ret(vec![result])]
                }
                ProtocolMethod::Next | ProtocolMethod::Throw => {
                    let mode = self.arena.string(method.mode());
                    let value = self.id("value");
                    let call = self.arena.call_named("advance", vec![mode, value]);
                    vec![self.arena.ret(vec![call])]
                }
            };
            let params = self.arena.params(&[names::SELF, "value"]);
            let function = self.arena.function_expr(params, statements);
            let gen = self.id("gen");
            let slot = self.arena.member(gen, method.field());
            body.push(self.arena.assign(slot, function));
        }

        let gen = self.id("gen");
        body.push(self.arena.ret(vec![gen]));
        self.function(RuntimeHelper::Generator, &["body"], body)
    }

    /// `advance(mode, value)`: resume the coroutine once and describe the
    /// outcome as `{value = ..., done = ...}`.
    fn advance(&mut self) -> NodeId {
        let mut body = Vec::new();

        // A finished generator stays finished.
        let is_done = self.state_is(CoroutineState::Done);
        let is_throw = self.mode_is(ProtocolMethod::Throw);
        let value = self.id("value");
        let raise = self.raise(value);
        let rethrow = self.arena.if_(is_throw, vec![raise], None);
        let finished = self.result(None, true);
        let finished = self.arena.ret(vec![finished]);
        body.push(self.arena.if_(is_done, vec![rethrow, finished], None));

        // Throwing into a generator that never ran finishes it.
        let is_throw = self.mode_is(ProtocolMethod::Throw);
        let gen = self.id("gen");
        let started = self.arena.member(gen, "started");
        let not_started = self.arena.unary(UnaryOperator::Not, started);
        let test = self.arena.logical(LogicalOperator::And, is_throw, not_started);
        let done = self.set_state(CoroutineState::Done);
        let value = self.id("value");
        let raise = self.raise(value);
        body.push(self.arena.if_(test, vec![done, raise], None));

        let gen = self.id("gen");
        let started = self.arena.member(gen, "started");
        let yes = self.arena.boolean(true);
        body.push(self.arena.assign(started, yes));
        body.push(self.set_state(CoroutineState::Running));
        let co = self.id("co");
        let mode = self.id("mode");
        let value = self.id("value");
        let resumed = self.coroutine("resume", vec![co, mode, value]);
        let result = self.arena.array(vec![resumed]);
        body.push(self.arena.local("result", Some(result)));

        let ok = self.at("result", 1);
        let failed = self.arena.unary(UnaryOperator::Not, ok);
        let done = self.set_state(CoroutineState::Done);
        let error = self.at("result", 2);
        let raise = self.raise(error);
        body.push(self.arena.if_(failed, vec![done, raise], None));

        let dead = self.is_dead("co");
        let done = self.set_state(CoroutineState::Done);
        let value = self.at("result", 2);
        let finished = self.result(Some(value), true);
        let finished = self.arena.ret(vec![finished]);
        body.push(self.arena.if_(dead, vec![done, finished], None));

        body.push(self.set_state(CoroutineState::Suspended));
        let value = self.at("result", 2);
        let step = self.result(Some(value), false);
        body.push(self.arena.ret(vec![step]));

        self.arena.function_decl("advance", &["mode", "value"], body)
    }

    /// `yield*`: forward every value of an array or a generator, then
    /// evaluate to the generator's return value.
    fn delegate(&mut self) -> NodeId {
        let inner = self.id("inner");
        let next = self.arena.member(inner, ProtocolMethod::Next.field());
        let nil = self.arena.null();
        let is_array = self.arena.binary(BinaryOperator::Eq, next, nil);
        let item = self.id("item");
        let forward = self.call_helper(RuntimeHelper::Suspend, vec![item]);
        let forward = self.arena.expr_stmt(forward);
        let each = self.for_values("item", "inner", vec![forward]);
        let done = self.arena.ret(vec![]);
        let array = self.arena.if_(is_array, vec![each, done], None);

        let first = self.next_of("inner");
        let first = self.arena.local("step", Some(first));
        let step = self.id("step");
        let finished = self.arena.member(step, "done");
        let running = self.arena.unary(UnaryOperator::Not, finished);
        let value = self.field("step", "value");
        let forward = self.call_helper(RuntimeHelper::Suspend, vec![value]);
        let forward = self.arena.expr_stmt(forward);
        let next = self.next_of("inner");
        let advance = self.arena.assign_name("step", next);
        let body = self.arena.block(vec![forward, advance]);
        let loop_ = self.arena.alloc(Node::WhileStatement {
            test: running,
            body,
            continue_label: None,
        });
        let value = self.field("step", "value");
        let result = self.arena.ret(vec![value]);
        self.function(RuntimeHelper::Delegate, &["inner"], vec![array, first, loop_, result])
    }

    /// The iterator function of a protocol `for-of`: generator objects are
    /// stepped, anything else is read by position.
    fn iterate(&mut self) -> NodeId {
        let source = self.id("source");
        let next = self.arena.member(source, ProtocolMethod::Next.field());
        let kind = self.arena.call_named("type", vec![next]);
        let function = self.arena.string("function");
        let is_generator = self.arena.binary(BinaryOperator::Eq, kind, function);

        let step = self.next_of("source");
        let step = self.arena.local("step", Some(step));
        let done = self.field("step", "done");
        let stop = self.arena.ret(vec![]);
        let check = self.arena.if_(done, vec![stop], None);
        let value = self.field("step", "value");
        let value = self.arena.ret(vec![value]);
        let stepper = self.arena.function_expr(vec![], vec![step, check, value]);
        let stepper = self.arena.ret(vec![stepper]);
        let generator = self.arena.if_(is_generator, vec![stepper], None);

        let zero = self.arena.number(0.0);
        let position = self.arena.local("i", Some(zero));
        let bump = self.increment("i");
        let source = self.id("source");
        let i = self.id("i");
        let item = self.arena.index(source, i);
        let item = self.arena.ret(vec![item]);
        let reader = self.arena.function_expr(vec![], vec![bump, item]);
        let reader = self.arena.ret(vec![reader]);
        self.function(RuntimeHelper::Iterate, &["source"], vec![generator, position, reader])
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Advance a task once. Returns false while it waits on a pending task.
    fn step(&mut self) -> NodeId {
        let mut body = Vec::new();
        let mode = self.arena.string(ProtocolMethod::Next.mode());
        body.push(self.arena.local("mode", Some(mode)));
        body.push(self.arena.local("value", None));
        let waiting = self.field("task", "waiting");
        body.push(self.arena.local("waiting", Some(waiting)));

        let waiting = self.id("waiting");
        let nil = self.arena.null();
        let has_wait = self.arena.binary(BinaryOperator::NotEq, waiting, nil);
        let pending = self.status_is("waiting", TaskStatus::Pending);
        let blocked = self.arena.boolean(false);
        let blocked = self.arena.ret(vec![blocked]);
        let still_pending = self.arena.if_(pending, vec![blocked], None);
        let task = self.id("task");
        let slot = self.arena.member(task, "waiting");
        let nil = self.arena.null();
        let clear = self.arena.assign(slot, nil);
        let rejected = self.status_is("waiting", TaskStatus::Rejected);
        let throw = self.arena.string(ProtocolMethod::Throw.mode());
        let to_throw = self.arena.assign_name("mode", throw);
        let inject = self.arena.if_(rejected, vec![to_throw], None);
        let settled = self.field("waiting", "value");
        let pass = self.arena.assign_name("value", settled);
        body.push(self.arena.if_(has_wait, vec![still_pending, clear, inject, pass], None));

        let co = self.field("task", "co");
        let mode = self.id("mode");
        let value = self.id("value");
        let resumed = self.coroutine("resume", vec![co, mode, value]);
        let result = self.arena.array(vec![resumed]);
        body.push(self.arena.local("result", Some(result)));

        let ok = self.at("result", 1);
        let failed = self.arena.unary(UnaryOperator::Not, ok);
        let reject = self.settle(TaskStatus::Rejected);

        let dead = self.is_dead_field("task", "co");
        let fulfil = self.settle(TaskStatus::Fulfilled);

        // Still running: remember what it waits on, as a task.
        let awaited = self.at("result", 2);
        let capture = self.arena.local("awaited", Some(awaited));
        let awaited = self.id("awaited");
        let kind = self.arena.call_named("type", vec![awaited]);
        let table = self.arena.string("table");
        let not_table = self.arena.binary(BinaryOperator::NotEq, kind, table);
        let marker = self.field("awaited", "__task");
        let not_task = self.arena.unary(UnaryOperator::Not, marker);
        let plain = self.arena.logical(LogicalOperator::Or, not_table, not_task);
        let awaited = self.id("awaited");
        let wrapped = self.task(TaskStatus::Fulfilled, "value", awaited);
        let wrap = self.arena.assign_name("awaited", wrapped);
        let wrap = self.arena.if_(plain, vec![wrap], None);
        let task = self.id("task");
        let slot = self.arena.member(task, "waiting");
        let awaited = self.id("awaited");
        let wait = self.arena.assign(slot, awaited);

        let suspended = self.arena.if_(dead, fulfil, Some(vec![capture, wrap, wait]));
        body.push(self.arena.if_(failed, reject, Some(vec![suspended])));

        let yes = self.arena.boolean(true);
        body.push(self.arena.ret(vec![yes]));
        self.function(RuntimeHelper::Step, &["task"], body)
    }

    /// Run `body` as a task until its first suspension and queue it if it is
    /// still pending.
    fn async_(&mut self) -> NodeId {
        let function = self.id("body");
        let co = self.coroutine("create", vec![function]);
        let task = self.task(TaskStatus::Pending, "co", co);
        let create = self.arena.local("task", Some(task));
        let task = self.id("task");
        let first = self.call_helper(RuntimeHelper::Step, vec![task]);
        let first = self.arena.expr_stmt(first);
        let pending = self.status_is("task", TaskStatus::Pending);
        let queue = self.id(RuntimeHelper::Tasks.name());
        let task = self.id("task");
        let insert = self.table("insert", vec![queue, task]);
        let insert = self.arena.expr_stmt(insert);
        let enqueue = self.arena.if_(pending, vec![insert], None);
        let task = self.id("task");
        let done = self.arena.ret(vec![task]);
        self.function(RuntimeHelper::Async, &["body"], vec![create, first, enqueue, done])
    }

    /// `Promise.all`: a task awaiting each input in order.
    fn await_all(&mut self) -> NodeId {
        let results = self.arena.array(vec![]);
        let results = self.arena.local("results", Some(results));
        let zero = self.arena.number(0.0);
        let count = self.arena.local("count", Some(zero));
        let bump = self.increment("count");
        let item = self.id("item");
        let settled = self.call_helper(RuntimeHelper::Suspend, vec![item]);
        let list = self.id("results");
        let position = self.id("count");
        let slot = self.arena.index(list, position);
        let store = self.arena.assign(slot, settled);
        let each = self.for_values("item", "list", vec![bump, store]);
        let list = self.id("results");
        let done = self.arena.ret(vec![list]);
        let body = self.arena.function_expr(vec![], vec![results, count, each, done]);
        let task = self.call_helper(RuntimeHelper::Async, vec![body]);
        let task = self.arena.ret(vec![task]);
        self.function(RuntimeHelper::AwaitAll, &["list"], vec![task])
    }

    /// Step queued tasks round-robin until all have settled.
    fn drain(&mut self) -> NodeId {
        let queue_name = RuntimeHelper::Tasks.name();

        let pending = self.arena.array(vec![]);
        let pending = self.arena.local("pending", Some(pending));
        let no = self.arena.boolean(false);
        let progressed = self.arena.local("progressed", Some(no));

        let task = self.id("task");
        let stepped = self.call_helper(RuntimeHelper::Step, vec![task]);
        let yes = self.arena.boolean(true);
        let mark = self.arena.assign_name("progressed", yes);
        let mark = self.arena.if_(stepped, vec![mark], None);
        let still = self.status_is("task", TaskStatus::Pending);
        let list = self.id("pending");
        let task = self.id("task");
        let keep = self.table("insert", vec![list, task]);
        let keep = self.arena.expr_stmt(keep);
        let keep = self.arena.if_(still, vec![keep], None);
        let each = self.for_values("task", queue_name, vec![mark, keep]);

        let list = self.id("pending");
        let replace = self.arena.assign_name(queue_name, list);
        let progressed_id = self.id("progressed");
        let stuck = self.arena.unary(UnaryOperator::Not, progressed_id);
        let message = self.arena.string("async tasks deadlocked");
        let raise = self.raise(message);
        let stuck = self.arena.if_(stuck, vec![raise], None);

        let queue = self.id(queue_name);
        let size = self.arena.unary(UnaryOperator::Len, queue);
        let zero = self.arena.number(0.0);
        let test = self.arena.binary(BinaryOperator::Gt, size, zero);
        let body = self.arena.block(vec![pending, progressed, each, replace, stuck]);
        let loop_ = self.arena.alloc(Node::WhileStatement {
            test,
            body,
            continue_label: None,
        });
        self.function(RuntimeHelper::Drain, &[], vec![loop_])
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Concatenate the sequences passed as arguments.
    fn spread(&mut self) -> NodeId {
        let result = self.arena.array(vec![]);
        let result = self.arena.local("result", Some(result));
        let list = self.id("result");
        let item = self.id("item");
        let insert = self.table("insert", vec![list, item]);
        let insert = self.arena.expr_stmt(insert);
        let inner = self.for_values("item", "part", vec![insert]);
        let varargs = self.arena.alloc(Node::VarArgs);
        let parts = self.arena.array(vec![varargs]);
        let outer = self.for_values_of("part", parts, vec![inner]);
        let list = self.id("result");
        let done = self.arena.ret(vec![list]);
        self.function_variadic(RuntimeHelper::Spread, &[], vec![result, outer, done])
    }

    /// Copy the fields of every source into `target`.
    fn assign(&mut self) -> NodeId {
        let target = self.id("target");
        let key = self.id("key");
        let slot = self.arena.index(target, key);
        let source = self.id("source");
        let key = self.id("key");
        let value = self.arena.index(source, key);
        let copy = self.arena.assign(slot, value);
        let fields = self.for_keys("key", "source", vec![copy]);
        let varargs = self.arena.alloc(Node::VarArgs);
        let sources = self.arena.array(vec![varargs]);
        let each = self.for_values_of("source", sources, vec![fields]);
        let target = self.id("target");
        let done = self.arena.ret(vec![target]);
        self.function_variadic(RuntimeHelper::Assign, &["target"], vec![each, done])
    }

    /// The fields of `source` not named in `excluded`.
    fn object_rest(&mut self) -> NodeId {
        let result = self.arena.object(vec![]);
        let result = self.arena.local("result", Some(result));
        let excluded = self.id("excluded");
        let key = self.id("key");
        let listed = self.arena.index(excluded, key);
        let keep = self.arena.unary(UnaryOperator::Not, listed);
        let target = self.id("result");
        let key = self.id("key");
        let slot = self.arena.index(target, key);
        let source = self.id("source");
        let key = self.id("key");
        let value = self.arena.index(source, key);
        let copy = self.arena.assign(slot, value);
        let copy = self.arena.if_(keep, vec![copy], None);
        let each = self.for_keys("key", "source", vec![copy]);
        let result_id = self.id("result");
        let done = self.arena.ret(vec![result_id]);
        self.function(RuntimeHelper::ObjectRest, &["source", "excluded"], vec![result, each, done])
    }

    /// Append every argument and return the new length.
    fn push(&mut self) -> NodeId {
        let list = self.id("list");
        let item = self.id("item");
        let insert = self.table("insert", vec![list, item]);
        let insert = self.arena.expr_stmt(insert);
        let varargs = self.arena.alloc(Node::VarArgs);
        let items = self.arena.array(vec![varargs]);
        let each = self.for_values_of("item", items, vec![insert]);
        let list = self.id("list");
        let length = self.arena.unary(UnaryOperator::Len, list);
        let done = self.arena.ret(vec![length]);
        self.function_variadic(RuntimeHelper::Push, &["list"], vec![each, done])
    }

    /// A computed key whose type is only known at run time. Numbers shift
    /// to 1-based positions, anything else is a field name.
    fn index_key(&mut self) -> NodeId {
        let key = self.id("key");
        let kind = self.arena.call_named("type", vec![key]);
        let number = self.arena.string("number");
        let is_number = self.arena.binary(BinaryOperator::Eq, kind, number);
        let key = self.id("key");
        let one = self.arena.number(1.0);
        let shifted = self.arena.binary(BinaryOperator::Add, key, one);
        let shifted = self.arena.ret(vec![shifted]);
        let shift = self.arena.if_(is_number, vec![shifted], None);
        let key = self.id("key");
        let done = self.arena.ret(vec![key]);
        self.function(RuntimeHelper::Index, &["key"], vec![shift, done])
    }

    /// `Object.keys`, `Object.values` and `Object.entries`.
    fn collect_keys(&mut self, helper: RuntimeHelper) -> NodeId {
        let result = self.arena.array(vec![]);
        let result = self.arena.local("result", Some(result));
        let item = match helper {
            RuntimeHelper::Keys => self.id("key"),
            RuntimeHelper::Values => {
                let object = self.id("object");
                let key = self.id("key");
                self.arena.index(object, key)
            }
            _ => {
                let key = self.id("key");
                let object = self.id("object");
                let key_again = self.id("key");
                let value = self.arena.index(object, key_again);
                self.arena.array(vec![key, value])
            }
        };
        let list = self.id("result");
        let insert = self.table("insert", vec![list, item]);
        let insert = self.arena.expr_stmt(insert);
        let each = self.for_keys("key", "object", vec![insert]);
        let list = self.id("result");
        let done = self.arena.ret(vec![list]);
        self.function(helper, &["object"], vec![result, each, done])
    }

    /// `map`, `filter` and `forEach`. Callbacks get the element and its
    /// 0-based position.
    fn list_method(&mut self, helper: RuntimeHelper) -> NodeId {
        let mut body = Vec::new();
        if helper != RuntimeHelper::ForEach {
            let result = self.arena.array(vec![]);
            body.push(self.arena.local("result", Some(result)));
        }
        let zero = self.arena.number(0.0);
        body.push(self.arena.local("i", Some(zero)));

        let bump = self.increment("i");
        let item = self.id("item");
        let i = self.id("i");
        let one = self.arena.number(1.0);
        let position = self.arena.binary(BinaryOperator::Sub, i, one);
        let called = self.arena.call_named("callback", vec![item, position]);
        let apply = match helper {
            RuntimeHelper::Map => {
                let list = self.id("result");
                let i = self.id("i");
                let slot = self.arena.index(list, i);
                self.arena.assign(slot, called)
            }
            RuntimeHelper::Filter => {
                let list = self.id("result");
                let item = self.id("item");
                let insert = self.table("insert", vec![list, item]);
                let insert = self.arena.expr_stmt(insert);
                self.arena.if_(called, vec![insert], None)
            }
            _ => self.arena.expr_stmt(called),
        };
        body.push(self.for_values("item", "list", vec![bump, apply]));
        if helper != RuntimeHelper::ForEach {
            let list = self.id("result");
            body.push(self.arena.ret(vec![list]));
        }
        self.function(helper, &["list", "callback"], body)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn typeof_(&mut self) -> NodeId {
        let value = self.id("value");
        let kind = self.arena.call_named("type", vec![value]);
        let capture = self.arena.local("kind", Some(kind));
        let mut body = vec![capture];
        for (lua, js) in [("nil", "undefined"), ("table", "object")] {
            let kind = self.id("kind");
            let name = self.arena.string(lua);
            let test = self.arena.binary(BinaryOperator::Eq, kind, name);
            let answer = self.arena.string(js);
            let answer = self.arena.ret(vec![answer]);
            body.push(self.arena.if_(test, vec![answer], None));
        }
        let kind = self.id("kind");
        body.push(self.arena.ret(vec![kind]));
        self.function(RuntimeHelper::Typeof, &["value"], body)
    }

    /// Walk the metatable chain of `value` looking for `class`.
    fn instanceof(&mut self) -> NodeId {
        let value = self.id("value");
        let kind = self.arena.call_named("type", vec![value]);
        let table = self.arena.string("table");
        let not_table = self.arena.binary(BinaryOperator::NotEq, kind, table);
        let no = self.arena.boolean(false);
        let no = self.arena.ret(vec![no]);
        let guard = self.arena.if_(not_table, vec![no], None);

        let value = self.id("value");
        let meta = self.arena.call_named("getmetatable", vec![value]);
        let meta = self.arena.local("meta", Some(meta));

        let current = self.id("meta");
        let class = self.id("class");
        let found = self.arena.binary(BinaryOperator::Eq, current, class);
        let yes = self.arena.boolean(true);
        let yes = self.arena.ret(vec![yes]);
        let found = self.arena.if_(found, vec![yes], None);
        let current = self.id("meta");
        let parent = self.arena.call_named("getmetatable", vec![current]);
        let parent = self.arena.local("parent", Some(parent));
        let parent_id = self.id("parent");
        let nil = self.arena.null();
        let top = self.arena.binary(BinaryOperator::Eq, parent_id, nil);
        let no = self.arena.boolean(false);
        let no = self.arena.ret(vec![no]);
        let top = self.arena.if_(top, vec![no], None);
        let up = self.field("parent", names::INDEX);
        let up = self.arena.assign_name("meta", up);
        let body = self.arena.block(vec![found, parent, top, up]);
        let current = self.id("meta");
        let nil = self.arena.null();
        let test = self.arena.binary(BinaryOperator::NotEq, current, nil);
        let walk = self.arena.alloc(Node::WhileStatement {
            test,
            body,
            continue_label: None,
        });
        let no = self.arena.boolean(false);
        let done = self.arena.ret(vec![no]);
        self.function(RuntimeHelper::Instanceof, &["value", "class"], vec![guard, meta, walk, done])
    }

    /// ```text
    /// local function __lunar_uint32(value)
    ///   local n = tonumber(value)
    ///   if n == nil or n ~= n or n == math.huge or n == -math.huge then return 0 end
    ///   if n < 0 then n = math.ceil(n) else n = math.floor(n) end
    ///   n = math.fmod(n, 4294967296)
    ///   if n < 0 then n = n + 4294967296 end
    ///   return math.tointeger(n)
    /// end
    /// ```
    fn uint32(&mut self) -> NodeId {
        let value = self.id("value");
        let number = self.arena.call_named("tonumber", vec![value]);
        let capture = self.arena.local("n", Some(number));

        let n = self.id("n");
        let nil = self.arena.null();
        let missing = self.arena.binary(BinaryOperator::Eq, n, nil);
        let n = self.id("n");
        let n_again = self.id("n");
        let nan = self.arena.binary(BinaryOperator::NotEq, n, n_again);
        let n = self.id("n");
        let huge = self.arena.path("math", "huge");
        let positive = self.arena.binary(BinaryOperator::Eq, n, huge);
        let n = self.id("n");
        let huge = self.arena.path("math", "huge");
        let huge = self.arena.unary(UnaryOperator::Neg, huge);
        let negative = self.arena.binary(BinaryOperator::Eq, n, huge);
        let test = [nan, positive, negative]
            .into_iter()
            .fold(missing, |acc, next| self.arena.logical(LogicalOperator::Or, acc, next));
        let zero = self.arena.number(0.0);
        let zero = self.arena.ret(vec![zero]);
        let finite = self.arena.if_(test, vec![zero], None);

        let n = self.id("n");
        let zero = self.arena.number(0.0);
        let below = self.arena.binary(BinaryOperator::Lt, n, zero);
        let n = self.id("n");
        let ceil = self.math("ceil", vec![n]);
        let ceil = self.arena.assign_name("n", ceil);
        let n = self.id("n");
        let floor = self.math("floor", vec![n]);
        let floor = self.arena.assign_name("n", floor);
        let truncate = self.arena.if_(below, vec![ceil], Some(vec![floor]));

        let n = self.id("n");
        let modulus = self.arena.number(UINT32_RANGE);
        let wrapped = self.math("fmod", vec![n, modulus]);
        let wrap = self.arena.assign_name("n", wrapped);

        let n = self.id("n");
        let zero = self.arena.number(0.0);
        let below = self.arena.binary(BinaryOperator::Lt, n, zero);
        let n = self.id("n");
        let modulus = self.arena.number(UINT32_RANGE);
        let lifted = self.arena.binary(BinaryOperator::Add, n, modulus);
        let lift = self.arena.assign_name("n", lifted);
        let lift = self.arena.if_(below, vec![lift], None);

        let n = self.id("n");
        let integer = self.math("tointeger", vec![n]);
        let done = self.arena.ret(vec![integer]);
        let body = vec![capture, finite, truncate, wrap, lift, done];
        self.function(RuntimeHelper::Uint32, &["value"], body)
    }

    /// The signed reading of `__lunar_uint32(value)`.
    fn int32(&mut self) -> NodeId {
        let value = self.id("value");
        let unsigned = self.call_helper(RuntimeHelper::Uint32, vec![value]);
        let capture = self.arena.local("n", Some(unsigned));
        let n = self.id("n");
        let half = self.arena.number(UINT32_RANGE / 2.0);
        let high = self.arena.binary(BinaryOperator::GtEq, n, half);
        let n = self.id("n");
        let modulus = self.arena.number(UINT32_RANGE);
        let signed = self.arena.binary(BinaryOperator::Sub, n, modulus);
        let signed = self.arena.ret(vec![signed]);
        let negative = self.arena.if_(high, vec![signed], None);
        let n = self.id("n");
        let done = self.arena.ret(vec![n]);
        self.function(RuntimeHelper::Int32, &["value"], vec![capture, negative, done])
    }

    // =========================================================================
    // Shapes
    // =========================================================================

    fn function(&mut self, helper: RuntimeHelper, params: &[&str], body: Vec<NodeId>) -> NodeId {
        self.arena.function_decl(helper.name(), params, body)
    }

    /// A helper taking `params` followed by `...`.
    fn function_variadic(
        &mut self,
        helper: RuntimeHelper,
        params: &[&str],
        body: Vec<NodeId>,
    ) -> NodeId {
        let id = self.arena.ident(helper.name());
        let mut params = self.arena.params(params);
        let rest = self.arena.ident(names::PLACEHOLDER);
        params.push(self.arena.alloc(Node::RestElement { argument: rest }));
        let body = self.arena.block(body);
        self.arena.alloc(Node::FunctionDeclaration {
            id,
            params,
            body,
            is_async: false,
            is_generator: false,
        })
    }

    fn id(&mut self, name: &str) -> NodeId {
        self.arena.ident(name)
    }

    fn field(&mut self, object: &str, name: &str) -> NodeId {
        let object = self.id(object);
        self.arena.member(object, name)
    }

    /// `name[position]`
    fn at(&mut self, name: &str, position: u32) -> NodeId {
        let object = self.id(name);
        let key = self.arena.number(f64::from(position));
        self.arena.index(object, key)
    }

    fn coroutine(&mut self, function: &str, arguments: Vec<NodeId>) -> NodeId {
        let callee = self.arena.path("coroutine", function);
        self.arena.call(callee, arguments)
    }

    fn math(&mut self, function: &str, arguments: Vec<NodeId>) -> NodeId {
        let callee = self.arena.path("math", function);
        self.arena.call(callee, arguments)
    }

    fn table(&mut self, function: &str, arguments: Vec<NodeId>) -> NodeId {
        let callee = self.arena.path("table", function);
        self.arena.call(callee, arguments)
    }

    fn call_helper(&mut self, helper: RuntimeHelper, arguments: Vec<NodeId>) -> NodeId {
        self.arena.call_named(helper.name(), arguments)
    }

    /// `error(value, 0)`
    fn raise(&mut self, value: NodeId) -> NodeId {
        self.arena.alloc(Node::ThrowStatement { argument: value })
    }

    /// `name = name + 1`
    fn increment(&mut self, name: &str) -> NodeId {
        let current = self.id(name);
        let one = self.arena.number(1.0);
        let next = self.arena.binary(BinaryOperator::Add, current, one);
        self.arena.assign_name(name, next)
    }

    /// `source:next()`
    fn next_of(&mut self, source: &str) -> NodeId {
        let source = self.id(source);
        self.arena.method_call(source, ProtocolMethod::Next.field(), vec![])
    }

    /// `for _, item in ipairs(list) do body end`
    fn for_values(&mut self, item: &str, list: &str, body: Vec<NodeId>) -> NodeId {
        let list = self.id(list);
        self.for_values_of(item, list, body)
    }

    fn for_values_of(&mut self, item: &str, list: NodeId, body: Vec<NodeId>) -> NodeId {
        let left = self.id(item);
        let body = self.arena.block(body);
        self.arena.alloc(Node::ForOfStatement {
            left,
            right: list,
            body,
            iteration: Iteration::Positional,
            continue_label: None,
        })
    }

    /// `for key in pairs(object) do body end`
    fn for_keys(&mut self, key: &str, object: &str, body: Vec<NodeId>) -> NodeId {
        let left = self.id(key);
        let right = self.id(object);
        let body = self.arena.block(body);
        self.arena.alloc(Node::ForInStatement {
            left,
            right,
            body,
            continue_label: None,
        })
    }

    /// `{__task = true, status = "...", <field> = value}`
    fn task(&mut self, status: TaskStatus, field: &str, value: NodeId) -> NodeId {
        let marker = self.arena.boolean(true);
        let status = self.arena.string(status.as_str());
        self.arena
            .object(vec![("__task", marker), ("status", status), (field, value)])
    }

    /// `task.status = status; task.value = result[2]`
    fn settle(&mut self, status: TaskStatus) -> Vec<NodeId> {
        let task = self.id("task");
        let slot = self.arena.member(task, "status");
        let status = self.arena.string(status.as_str());
        let mark = self.arena.assign(slot, status);
        let task = self.id("task");
        let slot = self.arena.member(task, "value");
        let value = self.at("result", 2);
        let store = self.arena.assign(slot, value);
        vec![mark, store]
    }

    fn status_is(&mut self, task: &str, status: TaskStatus) -> NodeId {
        let current = self.field(task, "status");
        let expected = self.arena.string(status.as_str());
        self.arena.binary(BinaryOperator::Eq, current, expected)
    }

    fn state_is(&mut self, state: CoroutineState) -> NodeId {
        let current = self.field("gen", "state");
        let expected = self.arena.string(state.as_str());
        self.arena.binary(BinaryOperator::Eq, current, expected)
    }

    fn set_state(&mut self, state: CoroutineState) -> NodeId {
        let slot = self.field("gen", "state");
        let state = self.arena.string(state.as_str());
        self.arena.assign(slot, state)
    }

    fn mode_is(&mut self, method: ProtocolMethod) -> NodeId {
        let mode = self.id("mode");
        let expected = self.arena.string(method.mode());
        self.arena.binary(BinaryOperator::Eq, mode, expected)
    }

    /// `coroutine.status(name) == "dead"`
    fn is_dead(&mut self, name: &str) -> NodeId {
        let co = self.id(name);
        self.dead(co)
    }

    fn is_dead_field(&mut self, object: &str, name: &str) -> NodeId {
        let co = self.field(object, name);
        self.dead(co)
    }

    fn dead(&mut self, co: NodeId) -> NodeId {
        let status = self.coroutine("status", vec![co]);
        let dead = self.arena.string("dead");
        self.arena.binary(BinaryOperator::Eq, status, dead)
    }

    /// `{value = value, done = done}`
    fn result(&mut self, value: Option<NodeId>, done: bool) -> NodeId {
        let value = value.unwrap_or_else(|| self.arena.null());
        let done = self.arena.boolean(done);
        self.arena.object(vec![("value", value), ("done", done)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_are_added_in_order() {
        let requested: BTreeSet<_> = [RuntimeHelper::AwaitAll].into_iter().collect();
        assert_eq!(
            with_dependencies(&requested),
            [
                RuntimeHelper::Suspend,
                RuntimeHelper::Tasks,
                RuntimeHelper::Step,
                RuntimeHelper::Async,
                RuntimeHelper::AwaitAll,
            ]
        );
    }

    #[test]
    fn test_every_helper_synthesizes_a_statement() {
        let all = [
            RuntimeHelper::Suspend,
            RuntimeHelper::Generator,
            RuntimeHelper::Delegate,
            RuntimeHelper::Iterate,
            RuntimeHelper::Tasks,
            RuntimeHelper::Step,
            RuntimeHelper::Async,
            RuntimeHelper::Resolve,
            RuntimeHelper::AwaitAll,
            RuntimeHelper::Drain,
            RuntimeHelper::Spread,
            RuntimeHelper::Assign,
            RuntimeHelper::ObjectRest,
            RuntimeHelper::Push,
            RuntimeHelper::Index,
            RuntimeHelper::Keys,
            RuntimeHelper::Values,
            RuntimeHelper::Entries,
            RuntimeHelper::Map,
            RuntimeHelper::Filter,
            RuntimeHelper::ForEach,
            RuntimeHelper::Typeof,
            RuntimeHelper::Instanceof,
            RuntimeHelper::Uint32,
            RuntimeHelper::Int32,
        ];
        let mut arena = Arena::new();
        let statements = synthesize(&mut arena, &all);
        assert_eq!(statements.len(), all.len());
        arena.set_module_body(statements);
        assert!(crate::validate::validate_ir(&arena).is_ok());
        let code = crate::emit::emit(&arena, &crate::config::CompileOptions::default()).unwrap();
        assert!(code.contains("local function __lunar_generator(body)"));
        assert!(code.contains("local __lunar_tasks = {}"));
        assert!(code.contains("local function __lunar_spread(...)"));
    }
}
