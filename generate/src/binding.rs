//! Variable bindings accumulated as a pipeline advances.
//!
//! A `Binding` holds the values bound to variables so far. It is immutable:
//! `extend` returns a new binding that shares every existing entry with its
//! parent, so forking one binding into many extensions costs one allocation
//! per extension.
//!
//! # Invariants
//!
//! - A variable appears at most once in a binding.
//! - Extending with an already-bound variable is rejected, even when the
//!   value is identical.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::types::{Value, Variable};

#[derive(Debug)]
struct Entry {
    variable: Variable,
    value: Value,
    parent: Option<Arc<Entry>>,
}

/// An immutable, append-only map from variables to values.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    head: Option<Arc<Entry>>,
    len: usize,
}

impl Binding {
    /// Create an empty binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a binding from `(variable, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Rebinding` if a variable appears twice.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (Variable, Value)>,
    ) -> Result<Self, ConfigurationError> {
        pairs
            .into_iter()
            .try_fold(Self::new(), |binding, (variable, value)| {
                binding.extend(variable, value)
            })
    }

    /// Return a new binding with one more variable bound.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Rebinding` if `variable` is already bound.
    pub fn extend(&self, variable: Variable, value: Value) -> Result<Self, ConfigurationError> {
        if self.contains(&variable) {
            return Err(ConfigurationError::Rebinding { variable });
        }
        Ok(Self {
            head: Some(Arc::new(Entry {
                variable,
                value,
                parent: self.head.clone(),
            })),
            len: self.len + 1,
        })
    }

    /// Get the value bound to a variable.
    #[must_use]
    pub fn get(&self, variable: &Variable) -> Option<&Value> {
        self.iter()
            .find_map(|(bound, value)| (bound == variable).then_some(value))
    }

    /// Get the value bound to a variable by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.iter()
            .find_map(|(bound, value)| (bound.name() == name).then_some(value))
    }

    /// Check if a variable is bound.
    #[must_use]
    pub fn contains(&self, variable: &Variable) -> bool {
        self.get(variable).is_some()
    }

    /// Get the number of bound variables.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the binding has no variables.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over `(variable, value)` pairs, most recently bound first.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    /// Iterate over the bound variables.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.iter().map(|(variable, _)| variable)
    }

    /// Keep only the given variables.
    ///
    /// Variables that are not bound here are skipped.
    #[must_use]
    pub fn project(&self, variables: &[Variable]) -> Self {
        let mut pairs: Vec<(&Variable, &Value)> = self
            .iter()
            .filter(|(variable, _)| variables.contains(variable))
            .collect();
        pairs.reverse();
        let mut projected = Self::new();
        for (variable, value) in pairs {
            // Entries of one binding never repeat a variable.
            if let Ok(next) = projected.extend(variable.clone(), value.clone()) {
                projected = next;
            }
        }
        projected
    }

    /// Check if this binding is consistent with another.
    ///
    /// Two bindings are consistent if all shared variables have the same value.
    #[must_use]
    pub fn is_consistent_with(&self, other: &Self) -> bool {
        self.iter().all(|(variable, value)| {
            other.get(variable).is_none_or(|other_value| other_value == value)
        })
    }

    /// Create a binding that combines this one with another.
    ///
    /// Returns `None` if the bindings are inconsistent. Variables shared by
    /// both keep this binding's entry.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        if !self.is_consistent_with(other) {
            return None;
        }
        let mut missing: Vec<(&Variable, &Value)> = other
            .iter()
            .filter(|(variable, _)| !self.contains(variable))
            .collect();
        missing.reverse();
        let mut merged = self.clone();
        for (variable, value) in missing {
            merged = merged.extend(variable.clone(), value.clone()).ok()?;
        }
        Some(merged)
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .iter()
                .all(|(variable, value)| other.get(variable) == Some(value))
    }
}

impl Eq for Binding {}

/// Agrees with `eq`: the order in which variables were bound is ignored.
impl Hash for Binding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut pairs: Vec<(&Variable, &Value)> = self.iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        pairs.hash(state);
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<(&Variable, &Value)> = self.iter().collect();
        pairs.reverse();
        f.write_str("{")?;
        for (i, (variable, value)) in pairs.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{variable} = {value}")?;
        }
        f.write_str("}")
    }
}

/// Iterator over the entries of a `Binding`.
pub struct Iter<'a> {
    next: Option<&'a Entry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Variable, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.next?;
        self.next = entry.parent.as_deref();
        Some((&entry.variable, &entry.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_basic() {
        let var_x = Variable::new("x");
        let var_y = Variable::new("y");

        let empty = Binding::new();
        assert!(empty.is_empty());
        assert!(!empty.contains(&var_x));

        let binding = empty
            .extend(var_x.clone(), Value::string("hello"))
            .expect("x is free");
        assert!(binding.contains(&var_x));
        assert!(!binding.contains(&var_y));
        assert_eq!(binding.len(), 1);
        assert_eq!(binding.get(&var_x), Some(&Value::string("hello")));

        // The parent is untouched.
        assert!(empty.is_empty());
    }

    #[test]
    fn test_extensions_share_parent() {
        let var_x = Variable::new("x");
        let var_y = Variable::new("y");
        let parent = Binding::new()
            .extend(var_x.clone(), Value::integer(1))
            .expect("x is free");

        let left = parent
            .extend(var_y.clone(), Value::integer(2))
            .expect("y is free");
        let right = parent
            .extend(var_y.clone(), Value::integer(3))
            .expect("y is free");

        assert_eq!(left.get(&var_x), Some(&Value::integer(1)));
        assert_eq!(right.get(&var_x), Some(&Value::integer(1)));
        assert_eq!(left.get(&var_y), Some(&Value::integer(2)));
        assert_eq!(right.get(&var_y), Some(&Value::integer(3)));
        assert_eq!(parent.len(), 1);
    }

    #[test]
    fn test_rebinding_is_rejected_even_for_same_value() {
        let var_x = Variable::new("x");
        let binding = Binding::new()
            .extend(var_x.clone(), Value::integer(1))
            .expect("x is free");

        let same = binding.extend(var_x.clone(), Value::integer(1));
        assert_eq!(
            same,
            Err(ConfigurationError::Rebinding {
                variable: var_x.clone()
            })
        );
        assert!(binding.extend(var_x, Value::integer(2)).is_err());
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = Binding::from_pairs([
            (Variable::new("x"), Value::integer(1)),
            (Variable::new("y"), Value::integer(2)),
        ])
        .expect("distinct variables");
        let b = Binding::from_pairs([
            (Variable::new("y"), Value::integer(2)),
            (Variable::new("x"), Value::integer(1)),
        ])
        .expect("distinct variables");
        assert_eq!(a, b);

        let distinct: std::collections::HashSet<Binding> = [a, b].into_iter().collect();
        assert_eq!(distinct.len(), 1);
    }

    #[test]
    fn test_project() {
        let binding = Binding::from_pairs([
            (Variable::new("x"), Value::integer(1)),
            (Variable::new("y"), Value::integer(2)),
        ])
        .expect("distinct variables");
        let projected = binding.project(&[Variable::new("y"), Variable::new("z")]);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get_by_name("y"), Some(&Value::integer(2)));
    }

    #[test]
    fn test_binding_merge() {
        let left = Binding::from_pairs([(Variable::new("x"), Value::string("a"))])
            .expect("distinct variables");
        let mut right = Binding::from_pairs([(Variable::new("y"), Value::string("b"))])
            .expect("distinct variables");

        let merged = left.merge(&right).expect("should merge");
        assert_eq!(merged.len(), 2);

        // Inconsistent bindings don't merge
        right = right
            .extend(Variable::new("x"), Value::string("different"))
            .expect("x is free on the right");
        assert!(left.merge(&right).is_none());
    }
}
