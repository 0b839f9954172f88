//! # Assertion Language
//!
//! Assertions let a relying party ask a question about a claim ("is the
//! balance greater than 999.00?") instead of asking for the value itself.
//!
//! An assertion is a JSON object. Keys beginning with `$` are operators
//! applied to the claim value; any other key names a property of an object
//! value and holds a nested assertion for that property:
//!
//! ```json
//! { "currency": { "$eq": "GBP" }, "amount": { "$gte": "1000.00" } }
//! ```
//!
//! Supported operators are `$eq` (case-insensitive for text), `$gt`, `$lt`,
//! `$gte` and `$lte`. All operators and nested assertions must hold for a
//! value to match. An empty assertion matches any value that is present.
//!
//! An optional [`Schema`] types the value: decimal text is compared
//! numerically, phone numbers are normalized to E.164, and dates and strings
//! are compared lexically.

mod schema;

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

pub use self::schema::Schema;
use crate::phone;
use crate::resolved::UnresolvedKind;

/// Errors raised while compiling an assertion.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// The assertion is structurally invalid.
    #[error("{0}")]
    Syntax(String),

    /// The assertion uses an operator the language does not support.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

impl CompileError {
    /// The unresolved marker recorded against a claim whose assertion failed
    /// to compile.
    #[must_use]
    pub const fn kind(&self) -> UnresolvedKind {
        match self {
            Self::Syntax(_) => UnresolvedKind::SyntaxError,
            Self::UnknownOperator(_) => UnresolvedKind::UnknownOperator,
        }
    }
}

/// Assertion operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    /// Equal to (case-insensitive for text).
    Eq,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal to.
    Gte,
    /// Less than or equal to.
    Lte,
}

impl Operator {
    const ALL: [Self; 5] = [Self::Eq, Self::Gt, Self::Lt, Self::Gte, Self::Lte];

    /// The operator's key in an assertion object.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Gt => "$gt",
            Self::Lt => "$lt",
            Self::Gte => "$gte",
            Self::Lte => "$lte",
        }
    }

    /// Look up an operator by key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }
}

/// A parsed, not yet typed, assertion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expression {
    /// Operators applied to the value, with their test literals.
    pub operators: Vec<(Operator, Value)>,

    /// Nested assertions applied to properties of the value.
    pub fields: Vec<(String, Self)>,
}

impl Expression {
    /// Parse a raw JSON assertion.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::Syntax` if the assertion (or a nested assertion)
    /// is not a JSON object, and `CompileError::UnknownOperator` naming the
    /// first unsupported `$` key.
    pub fn parse(raw: &Value) -> Result<Self, CompileError> {
        let Some(object) = raw.as_object() else {
            return Err(CompileError::Syntax("expression should be an object".into()));
        };

        if let Some(key) = object.keys().find(|k| k.starts_with('$') && Operator::from_key(k).is_none())
        {
            return Err(CompileError::UnknownOperator(key.clone()));
        }

        let operators = Operator::ALL
            .into_iter()
            .filter_map(|op| object.get(op.key()).map(|test| (op, test.clone())))
            .collect();

        let mut fields = vec![];
        for (key, test) in object.iter().filter(|(k, _)| !k.starts_with('$')) {
            // scalar tests on properties are not assertions
            if test.is_object() || test.is_array() {
                fields.push((key.clone(), Self::parse(test)?));
            }
        }

        Ok(Self { operators, fields })
    }
}

impl TryFrom<&Value> for Expression {
    type Error = CompileError;

    fn try_from(raw: &Value) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

/// Compile a raw assertion into a predicate, typing operands with `schema`.
///
/// # Errors
///
/// Returns a `CompileError` if the assertion cannot be parsed.
pub fn compile(raw: &Value, schema: Option<&Schema>) -> Result<Predicate, CompileError> {
    let expression = Expression::parse(raw)?;
    Ok(Predicate::new(&expression, schema.cloned().unwrap_or_default()))
}

/// Compile `raw` and return the values it matches.
///
/// # Errors
///
/// Returns a `CompileError` if the assertion cannot be parsed.
pub fn filter_values(
    values: &[Value], raw: &Value, schema: Option<&Schema>,
) -> Result<Vec<Value>, CompileError> {
    let predicate = compile(raw, schema)?;
    Ok(values.iter().filter(|v| predicate.matches(v)).cloned().collect())
}

/// A compiled assertion.
#[derive(Clone, Debug)]
pub struct Predicate {
    schema: Schema,
    tests: Vec<Test>,
    fields: Vec<(String, Self)>,
}

impl Predicate {
    fn new(expression: &Expression, schema: Schema) -> Self {
        let tests = expression
            .operators
            .iter()
            .map(|(operator, literal)| Test {
                operator: *operator,
                operand: Operand::convert(literal, &schema),
            })
            .collect();
        let fields = expression
            .fields
            .iter()
            .map(|(key, nested)| (key.clone(), Self::new(nested, schema.property(key))))
            .collect();

        Self {
            schema,
            tests,
            fields,
        }
    }

    /// Evaluate the predicate. An absent value (`None`) never matches.
    #[must_use]
    pub fn test(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };

        let candidate = Operand::convert(value, &self.schema);
        if !self.tests.iter().all(|t| t.matches(&candidate)) {
            return false;
        }
        self.fields.iter().all(|(key, nested)| nested.test(value.as_object().and_then(|o| o.get(key))))
    }

    /// Evaluate the predicate against a present value.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        self.test(Some(value))
    }
}

#[derive(Clone, Debug)]
struct Test {
    operator: Operator,
    operand: Operand,
}

impl Test {
    fn matches(&self, candidate: &Operand) -> bool {
        match self.operator {
            Operator::Eq => candidate.equals(&self.operand),
            Operator::Gt => candidate.compare(&self.operand) == Some(Ordering::Greater),
            Operator::Lt => candidate.compare(&self.operand) == Some(Ordering::Less),
            Operator::Gte => {
                matches!(candidate.compare(&self.operand), Some(Ordering::Greater | Ordering::Equal))
            }
            Operator::Lte => {
                matches!(candidate.compare(&self.operand), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

// A value converted for comparison. Only like kinds compare.
#[derive(Clone, Debug, PartialEq)]
enum Operand {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Composite,
    // could not be converted to the schema type
    Invalid,
}

impl Operand {
    fn convert(value: &Value, schema: &Schema) -> Self {
        if value.is_null() {
            return Self::Null;
        }
        match schema {
            Schema::Decimal => Self::Number(decimal(value)),
            Schema::PhoneNumber => {
                let number = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Self::Invalid,
                };
                phone::normalize(&number).map_or(Self::Invalid, Self::Text)
            }
            _ => Self::from(value),
        }
    }

    #[allow(clippy::float_cmp)]
    fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b || a.to_uppercase() == b.to_uppercase(),
            _ => false,
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&Value> for Operand {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Invalid, Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Composite,
        }
    }
}

// Parse a decimal amount. Unparseable values become NaN, which neither
// equals nor orders against anything.
fn decimal(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
