use rustc_hash::FxHashSet;

/// Stack of lexical scopes holding the source names declared in each.
///
/// Only membership matters: the lowerer asks whether a well-known global such
/// as `console` or `Math` has been shadowed by a local binding before it
/// rewrites it.
#[derive(Debug, Default)]
pub(super) struct Scopes {
    stack: Vec<FxHashSet<String>>,
}

impl Scopes {
    pub fn push(&mut self) {
        self.stack.push(FxHashSet::default());
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn declare(&mut self, name: &str) {
        if let Some(scope) = self.stack.last_mut() {
            scope.insert(name.to_string());
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.stack.iter().rev().any(|scope| scope.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_ends_with_scope() {
        let mut scopes = Scopes::default();
        scopes.push();
        scopes.declare("outer");
        scopes.push();
        scopes.declare("console");
        assert!(scopes.is_declared("console"));
        assert!(scopes.is_declared("outer"));
        scopes.pop();
        assert!(!scopes.is_declared("console"));
        assert!(scopes.is_declared("outer"));
    }
}
