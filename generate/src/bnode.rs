//! Per-invocation identity map for template blank nodes.
//!
//! A template refers to blank nodes by placeholder label (optionally keyed by
//! the values of some variables, as in `_:n{?x}`). The scope turns each
//! distinct `(label, key values)` pair into one concrete `BlankNode` and
//! remembers it for the rest of the invocation.
//!
//! # Thread Safety
//!
//! The scope is the only mutable state shared by concurrent branches of one
//! invocation. All accesses go through a single `Mutex`. Cloning a scope
//! shares it; `BlankNodeScope::new` creates an independent one.
//!
//! # Invariants
//!
//! - The same placeholder seen twice in one scope maps to the same node.
//! - Two scopes never hand out the same concrete identifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::GenerateError;
use crate::types::{BlankNode, Value};

/// Source of process-unique scope identifiers.
static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, PartialEq, Eq, Hash)]
struct Placeholder {
    label: String,
    key: Vec<Value>,
}

#[derive(Debug, Default)]
struct ScopeState {
    nodes: HashMap<Placeholder, BlankNode>,
    next_node: u64,
}

impl ScopeState {
    fn allocate(&mut self, scope_id: u64) -> BlankNode {
        let node = BlankNode::new(format!("b{scope_id}x{}", self.next_node));
        self.next_node += 1;
        node
    }
}

#[derive(Debug)]
struct ScopeInner {
    id: u64,
    state: Mutex<ScopeState>,
}

/// Placeholder-to-node map with the lifetime of one invocation.
#[derive(Debug, Clone)]
pub struct BlankNodeScope {
    inner: Arc<ScopeInner>,
}

impl BlankNodeScope {
    /// Create a new scope that shares nothing with any other scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(ScopeState::default()),
            }),
        }
    }

    /// The process-unique identifier of this scope.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Resolve a placeholder to its concrete node, allocating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `GenerateError::LockPoisoned` if another task panicked while
    /// holding the scope.
    pub fn resolve(&self, label: &str, key: &[Value]) -> Result<BlankNode, GenerateError> {
        let placeholder = Placeholder {
            label: label.to_owned(),
            key: key.to_vec(),
        };
        let mut state = self
            .inner
            .state
            .lock()
            .map_err(|_| GenerateError::LockPoisoned)?;
        if let Some(node) = state.nodes.get(&placeholder) {
            return Ok(node.clone());
        }
        let node = state.allocate(self.inner.id);
        state.nodes.insert(placeholder, node.clone());
        drop(state);
        Ok(node)
    }

    /// Allocate a node that no placeholder will ever resolve to.
    ///
    /// # Errors
    ///
    /// Returns `GenerateError::LockPoisoned` if the scope is poisoned.
    pub fn fresh(&self) -> Result<BlankNode, GenerateError> {
        let mut state = self
            .inner
            .state
            .lock()
            .map_err(|_| GenerateError::LockPoisoned)?;
        Ok(state.allocate(self.inner.id))
    }

    /// Number of placeholders resolved so far.
    ///
    /// # Errors
    ///
    /// Returns `GenerateError::LockPoisoned` if the scope is poisoned.
    pub fn len(&self) -> Result<usize, GenerateError> {
        let state = self
            .inner
            .state
            .lock()
            .map_err(|_| GenerateError::LockPoisoned)?;
        Ok(state.nodes.len())
    }

    /// Check if two handles refer to the same scope.
    #[must_use]
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for BlankNodeScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_label_same_node() {
        let scope = BlankNodeScope::new();
        let first = scope.resolve("x", &[]).expect("scope healthy");
        let second = scope.resolve("x", &[]).expect("scope healthy");
        assert_eq!(first, second);
        assert_eq!(scope.len().expect("scope healthy"), 1);
    }

    #[test]
    fn test_keyed_labels() {
        let scope = BlankNodeScope::new();
        let one = scope
            .resolve("n", &[Value::integer(1)])
            .expect("scope healthy");
        let two = scope
            .resolve("n", &[Value::integer(2)])
            .expect("scope healthy");
        let one_again = scope
            .resolve("n", &[Value::integer(1)])
            .expect("scope healthy");
        assert_ne!(one, two);
        assert_eq!(one, one_again);
    }

    #[test]
    fn test_scopes_never_share_nodes() {
        let first = BlankNodeScope::new();
        let second = BlankNodeScope::new();
        assert_ne!(
            first.resolve("x", &[]).expect("scope healthy"),
            second.resolve("x", &[]).expect("scope healthy")
        );
        assert!(!first.shares_with(&second));
        assert!(first.shares_with(&first.clone()));
    }

    #[test]
    fn test_fresh_nodes_are_distinct() {
        let scope = BlankNodeScope::new();
        let labelled = scope.resolve("x", &[]).expect("scope healthy");
        let fresh = scope.fresh().expect("scope healthy");
        assert_ne!(labelled, fresh);
        assert_ne!(fresh, scope.fresh().expect("scope healthy"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_agrees() {
        let scope = BlankNodeScope::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let scope = scope.clone();
            handles.push(tokio::spawn(async move { scope.resolve("shared", &[]) }));
        }
        let mut nodes = Vec::new();
        for handle in handles {
            nodes.push(handle.await.expect("task").expect("scope healthy"));
        }
        assert!(nodes.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
