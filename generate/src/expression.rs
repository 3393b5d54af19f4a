//! Expressions evaluated against a binding.
//!
//! Bind stages, source locators and iterator arguments are expressions. An
//! evaluation failure is an `EvaluationError`, scoped to the one binding it
//! was evaluated against.

use std::fmt;

use crate::binding::Binding;
use crate::error::EvaluationError;
use crate::types::{Value, Variable};

/// An expression over bound variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Constant(Value),
    Variable(Variable),
    /// Integer addition.
    Add(Box<Expression>, Box<Expression>),
    /// Integer multiplication.
    Multiply(Box<Expression>, Box<Expression>),
    /// String concatenation of the `STR()` of every argument.
    Concat(Vec<Expression>),
    /// `STR()`: the IRI or lexical form as a plain string.
    Str(Box<Expression>),
    /// `IRI()`: a string or IRI turned into an IRI.
    Iri(Box<Expression>),
}

impl Expression {
    #[must_use]
    pub const fn constant(value: Value) -> Self {
        Self::Constant(value)
    }

    #[must_use]
    pub fn var(name: impl AsRef<str>) -> Self {
        Self::Variable(Variable::new(name))
    }

    #[must_use]
    pub fn add(left: Self, right: Self) -> Self {
        Self::Add(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn multiply(left: Self, right: Self) -> Self {
        Self::Multiply(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub const fn concat(parts: Vec<Self>) -> Self {
        Self::Concat(parts)
    }

    #[must_use]
    pub fn str(inner: Self) -> Self {
        Self::Str(Box::new(inner))
    }

    #[must_use]
    pub fn iri(inner: Self) -> Self {
        Self::Iri(Box::new(inner))
    }

    /// Evaluate this expression against a binding.
    pub fn evaluate(&self, binding: &Binding) -> Result<Value, EvaluationError> {
        match self {
            Self::Constant(value) => Ok(value.clone()),
            Self::Variable(variable) => binding
                .get(variable)
                .cloned()
                .ok_or_else(|| EvaluationError::UnboundVariable(variable.clone())),
            Self::Add(left, right) => {
                let (l, r) = integer_operands(left, right, binding)?;
                l.checked_add(r)
                    .map(Value::integer)
                    .ok_or(EvaluationError::Overflow)
            }
            Self::Multiply(left, right) => {
                let (l, r) = integer_operands(left, right, binding)?;
                l.checked_mul(r)
                    .map(Value::integer)
                    .ok_or(EvaluationError::Overflow)
            }
            Self::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&string_form(&part.evaluate(binding)?)?);
                }
                Ok(Value::string(out))
            }
            Self::Str(inner) => string_form(&inner.evaluate(binding)?).map(Value::string),
            Self::Iri(inner) => match inner.evaluate(binding)? {
                Value::Iri(iri) => Ok(Value::Iri(iri)),
                Value::Literal(literal) => Ok(Value::iri(literal.lexical())),
                Value::Blank(node) => Err(EvaluationError::TypeMismatch {
                    expected: "string or IRI",
                    found: node.to_string(),
                }),
            },
        }
    }
}

fn integer_operands(
    left: &Expression,
    right: &Expression,
    binding: &Binding,
) -> Result<(i64, i64), EvaluationError> {
    Ok((
        integer(&left.evaluate(binding)?)?,
        integer(&right.evaluate(binding)?)?,
    ))
}

fn integer(value: &Value) -> Result<i64, EvaluationError> {
    value.as_integer().ok_or_else(|| EvaluationError::TypeMismatch {
        expected: "integer",
        found: value.to_string(),
    })
}

fn string_form(value: &Value) -> Result<String, EvaluationError> {
    value
        .lexical_form()
        .map(str::to_owned)
        .ok_or_else(|| EvaluationError::TypeMismatch {
            expected: "IRI or literal",
            found: value.to_string(),
        })
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Variable(variable) => write!(f, "{variable}"),
            Self::Add(left, right) => write!(f, "({left} + {right})"),
            Self::Multiply(left, right) => write!(f, "({left} * {right})"),
            Self::Concat(parts) => {
                f.write_str("CONCAT(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
            Self::Str(inner) => write!(f, "STR({inner})"),
            Self::Iri(inner) => write!(f, "IRI({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding_x(value: Value) -> Binding {
        Binding::new()
            .extend(Variable::new("x"), value)
            .expect("x is free")
    }

    #[test]
    fn test_multiply_bound_variable() {
        let expr = Expression::multiply(Expression::var("x"), Expression::constant(Value::integer(2)));
        assert_eq!(expr.evaluate(&binding_x(Value::integer(3))), Ok(Value::integer(6)));
        assert_eq!(expr.to_string(), "(?x * \"2\"^^<http://www.w3.org/2001/XMLSchema#integer>)");
    }

    #[test]
    fn test_unbound_variable_fails() {
        let expr = Expression::var("missing");
        assert_eq!(
            expr.evaluate(&Binding::new()),
            Err(EvaluationError::UnboundVariable(Variable::new("missing")))
        );
    }

    #[test]
    fn test_type_mismatch() {
        let expr = Expression::add(Expression::var("x"), Expression::constant(Value::integer(1)));
        assert!(matches!(
            expr.evaluate(&binding_x(Value::string("one"))),
            Err(EvaluationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_overflow() {
        let expr = Expression::add(
            Expression::constant(Value::integer(i64::MAX)),
            Expression::constant(Value::integer(1)),
        );
        assert_eq!(expr.evaluate(&Binding::new()), Err(EvaluationError::Overflow));
    }

    #[test]
    fn test_concat_and_iri() {
        let expr = Expression::iri(Expression::concat(vec![
            Expression::constant(Value::string("http://ex.org/item/")),
            Expression::var("x"),
        ]));
        assert_eq!(
            expr.evaluate(&binding_x(Value::integer(5))),
            Ok(Value::iri("http://ex.org/item/5"))
        );
    }
}
