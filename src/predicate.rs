use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::caveat::Caveat;
use crate::verifier::CaveatVerifier;

/// Operators supported in comparison caveats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equality (=)
    Equal,
    /// Inequality (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessOrEqual,
    /// Collection containment (in)
    In,
    /// Collection exclusion (!in)
    NotIn,
}

impl Operator {
    /// Parse an operator token
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Operator::Equal),
            "!=" => Some(Operator::NotEqual),
            ">" => Some(Operator::GreaterThan),
            ">=" => Some(Operator::GreaterOrEqual),
            "<" => Some(Operator::LessThan),
            "<=" => Some(Operator::LessOrEqual),
            "in" => Some(Operator::In),
            "!in" => Some(Operator::NotIn),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::In => "in",
            Operator::NotIn => "!in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed evidence value with an explicit tag.
///
/// The tag selects the parser applied to the raw caveat text; there is no
/// runtime type inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl Value {
    // Parses `raw` with the parser selected by this value's tag.
    fn parse_as(&self, raw: &str) -> Option<Value> {
        match self {
            Value::String(_) => Some(Value::String(raw.to_string())),
            Value::Int(_) => raw.parse::<i64>().ok().map(Value::Int),
            Value::Float(_) => raw.parse::<f64>().ok().map(Value::Float),
            Value::Bool(_) => match raw {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Timestamp(_) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|t| Value::Timestamp(t.with_timezone(&Utc))),
        }
    }

    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Timestamp(t) => {
                f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

/// Starts a comparison caveat for the named field
///
/// # Example
/// ```
/// use macaroon::predicate::field;
///
/// let predicate = field("account").equal(3735928559i64);
/// assert_eq!(predicate.to_string(), "account = 3735928559");
/// ```
pub fn field(name: impl Into<String>) -> Field {
    Field(name.into())
}

/// A field name under comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field(String);

impl Field {
    fn scalar(self, operator: Operator, value: impl Into<Value>) -> Predicate {
        Predicate {
            field: self.0,
            operator,
            value: value.into().to_string(),
        }
    }

    fn collection<I>(self, operator: Operator, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.into().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Predicate {
            field: self.0,
            operator,
            value: joined,
        }
    }

    pub fn equal(self, value: impl Into<Value>) -> Predicate {
        self.scalar(Operator::Equal, value)
    }

    pub fn not_equal(self, value: impl Into<Value>) -> Predicate {
        self.scalar(Operator::NotEqual, value)
    }

    pub fn greater_than(self, value: impl Into<Value>) -> Predicate {
        self.scalar(Operator::GreaterThan, value)
    }

    pub fn greater_or_equal(self, value: impl Into<Value>) -> Predicate {
        self.scalar(Operator::GreaterOrEqual, value)
    }

    pub fn less_than(self, value: impl Into<Value>) -> Predicate {
        self.scalar(Operator::LessThan, value)
    }

    pub fn less_or_equal(self, value: impl Into<Value>) -> Predicate {
        self.scalar(Operator::LessOrEqual, value)
    }

    /// Requires the caveat's listed collection to contain all of `values`
    pub fn contains_all<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.collection(Operator::In, values)
    }

    /// Requires the caveat's listed collection to exclude `values`
    pub fn not_contains<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.collection(Operator::NotIn, values)
    }
}

/// A rendered comparison caveat, attached via `Builder::require_predicate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    field: String,
    operator: Operator,
    value: String,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

// Splits a caveat of the form "<field> <operator> <value>"; None unless the
// field name matches exactly.
fn split_caveat<'a>(caveat: &'a Caveat, field: &str) -> Option<(Operator, &'a str)> {
    let text = caveat.identifier_str()?;
    let rest = text.strip_prefix(field)?.strip_prefix(' ')?;
    let (operator, value) = rest.split_once(' ')?;
    Some((Operator::parse(operator)?, value))
}

fn evaluate_scalar(operator: Operator, ordering: Option<Ordering>) -> bool {
    match operator {
        Operator::Equal => ordering == Some(Ordering::Equal),
        Operator::NotEqual => ordering.is_some_and(|o| o != Ordering::Equal),
        Operator::GreaterThan => ordering == Some(Ordering::Greater),
        Operator::GreaterOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        Operator::LessThan => ordering == Some(Ordering::Less),
        Operator::LessOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        Operator::In | Operator::NotIn => false,
    }
}

/// Satisfies scalar comparison caveats against a typed live value.
///
/// The caveat `"account > 10"` is satisfied by
/// `PredicateVerifier::new("account", 15i64)`: the live value is compared
/// against the parsed caveat value, `live (operator) caveat`.
pub struct PredicateVerifier {
    field: String,
    value: Value,
}

impl PredicateVerifier {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl CaveatVerifier for PredicateVerifier {
    fn verify(&self, caveat: &Caveat) -> bool {
        let Some((operator, raw)) = split_caveat(caveat, &self.field) else {
            return false;
        };
        let Some(expected) = self.value.parse_as(raw) else {
            return false;
        };
        evaluate_scalar(operator, self.value.compare(&expected))
    }
}

/// Satisfies `in` / `!in` caveats against a typed collection.
///
/// Caveat items that fail to parse under the evidence tag cannot match.
pub struct SetPredicateVerifier {
    field: String,
    values: Vec<Value>,
}

impl SetPredicateVerifier {
    pub fn new<I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl CaveatVerifier for SetPredicateVerifier {
    fn verify(&self, caveat: &Caveat) -> bool {
        let Some((operator, raw)) = split_caveat(caveat, &self.field) else {
            return false;
        };
        let Some(tag) = self.values.first() else {
            return false;
        };

        let listed: Vec<Value> = raw.split(',').filter_map(|item| tag.parse_as(item)).collect();
        let contains_all = self.values.iter().all(|v| listed.contains(v));

        match operator {
            Operator::In => contains_all,
            Operator::NotIn => !contains_all,
            _ => false,
        }
    }
}

/// Satisfies scalar comparison caveats with a user-supplied parser.
///
/// # Example
/// ```
/// use macaroon::Caveat;
/// use macaroon::predicate::CustomPredicateVerifier;
/// use macaroon::verifier::CaveatVerifier;
///
/// #[derive(PartialEq, PartialOrd)]
/// struct Version(u32, u32);
///
/// let verifier = CustomPredicateVerifier::new("version", Version(2, 3), |raw: &str| {
///     let (major, minor) = raw.split_once('.')?;
///     Some(Version(major.parse().ok()?, minor.parse().ok()?))
/// });
/// assert!(verifier.verify(&Caveat::first_party("version >= 2.0")));
/// ```
pub struct CustomPredicateVerifier<T, P> {
    field: String,
    value: T,
    parser: P,
}

impl<T, P> CustomPredicateVerifier<T, P>
where
    T: PartialOrd,
    P: Fn(&str) -> Option<T>,
{
    pub fn new(field: impl Into<String>, value: T, parser: P) -> Self {
        Self {
            field: field.into(),
            value,
            parser,
        }
    }
}

impl<T, P> CaveatVerifier for CustomPredicateVerifier<T, P>
where
    T: PartialOrd,
    P: Fn(&str) -> Option<T>,
{
    fn verify(&self, caveat: &Caveat) -> bool {
        let Some((operator, raw)) = split_caveat(caveat, &self.field) else {
            return false;
        };
        let Some(expected) = (self.parser)(raw) else {
            return false;
        };
        evaluate_scalar(operator, self.value.partial_cmp(&expected))
    }
}
