//! Data description of the cooperative-coroutine protocol.
//!
//! Generators and async functions share one suspend/resume protocol. The
//! runtime helpers that implement it are synthesized as IR from these
//! descriptions, so the emitted protocol is driven by data rather than by
//! any control-flow feature of the compiler's own language.

use serde::{Deserialize, Serialize};

/// Lifecycle of a generator object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoroutineState {
    Suspended,
    Running,
    Done,
}

impl CoroutineState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suspended => "suspended",
            Self::Running => "running",
            Self::Done => "done",
        }
    }
}

/// The three methods of a generator object. Each resumes the coroutine in
/// a mode of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMethod {
    Next,
    Return,
    Throw,
}

impl ProtocolMethod {
    pub const ALL: [ProtocolMethod; 3] = [Self::Next, Self::Return, Self::Throw];

    /// The resume mode passed to the coroutine.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Return => "return",
            Self::Throw => "throw",
        }
    }

    /// The field name of the method on the generator object. `return` is a
    /// keyword of the target language, so it carries the same trailing
    /// underscore that member accesses of `return` are lowered with.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Return => "return_",
            Self::Throw => "throw",
        }
    }
}

/// Settlement state of an async task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Fulfilled,
    Rejected,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

/// Runtime helpers the lowerer can prepend to a unit.
///
/// Declaration order is emission order; every helper only depends on
/// helpers declared before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeHelper {
    Suspend,
    Generator,
    Delegate,
    Iterate,
    Tasks,
    Step,
    Async,
    Resolve,
    AwaitAll,
    Drain,
    Spread,
    Assign,
    ObjectRest,
    Push,
    Index,
    Keys,
    Values,
    Entries,
    Map,
    Filter,
    ForEach,
    Typeof,
    Instanceof,
    Uint32,
    Int32,
}

impl RuntimeHelper {
    /// The binding name of the helper in emitted code.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Suspend => "__lunar_suspend",
            Self::Generator => "__lunar_generator",
            Self::Delegate => "__lunar_delegate",
            Self::Iterate => "__lunar_iter",
            Self::Tasks => "__lunar_tasks",
            Self::Step => "__lunar_step",
            Self::Async => "__lunar_async",
            Self::Resolve => "__lunar_resolve",
            Self::AwaitAll => "__lunar_await_all",
            Self::Drain => "__lunar_drain",
            Self::Spread => "__lunar_spread",
            Self::Assign => "__lunar_assign",
            Self::ObjectRest => "__lunar_object_rest",
            Self::Push => "__lunar_push",
            Self::Index => "__lunar_index",
            Self::Keys => "__lunar_keys",
            Self::Values => "__lunar_values",
            Self::Entries => "__lunar_entries",
            Self::Map => "__lunar_map",
            Self::Filter => "__lunar_filter",
            Self::ForEach => "__lunar_for_each",
            Self::Typeof => "__lunar_typeof",
            Self::Instanceof => "__lunar_instanceof",
            Self::Uint32 => "__lunar_uint32",
            Self::Int32 => "__lunar_int32",
        }
    }

    /// Helpers that must be defined before this one.
    #[must_use]
    pub fn dependencies(&self) -> &'static [RuntimeHelper] {
        match self {
            Self::Delegate => &[Self::Suspend],
            Self::Async => &[Self::Tasks, Self::Step],
            Self::AwaitAll => &[Self::Suspend, Self::Async],
            Self::Drain => &[Self::Tasks, Self::Step],
            Self::Int32 => &[Self::Uint32],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_precede_dependents() {
        let all = [
            RuntimeHelper::Delegate,
            RuntimeHelper::Async,
            RuntimeHelper::AwaitAll,
            RuntimeHelper::Drain,
            RuntimeHelper::Int32,
        ];
        for helper in all {
            for dep in helper.dependencies() {
                assert!(dep < &helper, "{dep:?} must be declared before {helper:?}");
            }
        }
    }

    #[test]
    fn test_protocol_fields() {
        let fields: Vec<&str> = ProtocolMethod::ALL.iter().map(ProtocolMethod::field).collect();
        assert_eq!(fields, ["next", "return_", "throw"]);
        assert_eq!(CoroutineState::Done.as_str(), "done");
    }
}
