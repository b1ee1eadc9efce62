//! Runtime values and the operator rules that apply to them.
//!
//! Numbers follow the usual promotion rules: `int op int` stays an
//! integer for `+ - * %`, any float operand makes the result a float and
//! `/` always produces a float. Booleans take part in arithmetic as `0`/`1`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{BinOp, MacroDef};
use crate::error::SemanticError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Macro(Rc<MacroDef>),
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(n) => n == 0,
            Num::Float(f) => f == 0.0,
        }
    }
}

type OpResult = Result<Value, SemanticError>;

/// Largest string, in bytes, that `*` repetition may build.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::Bool(_) => "bool",
            Value::Array(_) => "list",
            Value::Map(_) => "dict",
            Value::Macro(_) => "macro",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Array(a) => !a.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Macro(_) => true,
        }
    }

    fn as_num(&self) -> Option<Num> {
        match self {
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Float(f) => Some(Num::Float(*f)),
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            _ => None,
        }
    }

    fn unsupported(&self, op: BinOp, other: &Value) -> SemanticError {
        SemanticError::UnsupportedOperands {
            op: op.symbol(),
            left: self.type_name(),
            right: other.type_name(),
        }
    }

    pub fn add(&self, other: &Value) -> OpResult {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b).cloned().collect()))
            }
            _ => self.arithmetic(BinOp::Add, other, i64::checked_add, |a, b| a + b),
        }
    }

    pub fn sub(&self, other: &Value) -> OpResult {
        self.arithmetic(BinOp::Sub, other, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> OpResult {
        match (self, other) {
            (Value::String(s), Value::Int(_) | Value::Bool(_)) => repeat(s, other),
            (Value::Int(_) | Value::Bool(_), Value::String(s)) => repeat(s, self),
            _ => self.arithmetic(BinOp::Mul, other, i64::checked_mul, |a, b| a * b),
        }
    }

    pub fn div(&self, other: &Value) -> OpResult {
        let (a, b) = self.numeric_pair(BinOp::Div, other)?;
        if b.is_zero() {
            return Err(SemanticError::DivisionByZero);
        }
        Ok(Value::Float(a.as_f64() / b.as_f64()))
    }

    /// Floored modulo: a non-zero result takes the sign of the divisor.
    pub fn rem(&self, other: &Value) -> OpResult {
        let (a, b) = self.numeric_pair(BinOp::Mod, other)?;
        if b.is_zero() {
            return Err(SemanticError::DivisionByZero);
        }
        match (a, b) {
            (Num::Int(a), Num::Int(b)) => {
                // Only i64::MIN % -1 overflows, and its remainder is 0.
                let r = a.checked_rem(b).unwrap_or(0);
                Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            _ => {
                let (a, b) = (a.as_f64(), b.as_f64());
                let r = a % b;
                Ok(Value::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
            }
        }
    }

    pub fn neg(&self) -> OpResult {
        match self.as_num() {
            Some(Num::Int(n)) => n.checked_neg().map(Value::Int).ok_or(SemanticError::Overflow),
            Some(Num::Float(f)) => Ok(Value::Float(-f)),
            None => Err(SemanticError::UnsupportedOperand {
                op: "-",
                operand: self.type_name(),
            }),
        }
    }

    pub fn pos(&self) -> OpResult {
        match self.as_num() {
            Some(Num::Int(n)) => Ok(Value::Int(n)),
            Some(Num::Float(f)) => Ok(Value::Float(f)),
            None => Err(SemanticError::UnsupportedOperand {
                op: "+",
                operand: self.type_name(),
            }),
        }
    }

    fn numeric_pair(&self, op: BinOp, other: &Value) -> Result<(Num, Num), SemanticError> {
        match (self.as_num(), other.as_num()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(self.unsupported(op, other)),
        }
    }

    fn arithmetic(
        &self,
        op: BinOp,
        other: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> OpResult {
        match self.numeric_pair(op, other)? {
            (Num::Int(a), Num::Int(b)) => int_op(a, b).map(Value::Int).ok_or(SemanticError::Overflow),
            (a, b) => Ok(Value::Float(float_op(a.as_f64(), b.as_f64()))),
        }
    }

    /// Equality as the template language sees it: numbers compare by value
    /// across int/float/bool, containers compare element-wise, and values
    /// of unrelated types are unequal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(a), Num::Int(b)) => a == b,
                (a, b) => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn ordering(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return Some(match (a, b) {
                (Num::Int(a), Num::Int(b)) => a.cmp(&b),
                (a, b) => a.as_f64().total_cmp(&b.as_f64()),
            });
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.ordering(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// Evaluates one of the comparison operators.
    pub fn compare(&self, op: BinOp, other: &Value) -> Result<bool, SemanticError> {
        if op == BinOp::Eq {
            return Ok(self.loose_eq(other));
        }
        if op == BinOp::NotEq {
            return Ok(!self.loose_eq(other));
        }
        let ordering = self
            .ordering(other)
            .ok_or_else(|| self.unsupported(op, other))?;
        Ok(match op {
            BinOp::Lt => ordering.is_lt(),
            BinOp::Le => ordering.is_le(),
            BinOp::Gt => ordering.is_gt(),
            BinOp::Ge => ordering.is_ge(),
            _ => return Err(self.unsupported(op, other)),
        })
    }

    /// Membership test, `needle in self`.
    pub fn contains(&self, needle: &Value) -> Result<bool, SemanticError> {
        let invalid = || SemanticError::InvalidMembership {
            needle: needle.type_name(),
            haystack: self.type_name(),
        };
        match (self, needle) {
            (Value::String(hay), Value::String(n)) => Ok(hay.contains(n.as_str())),
            (Value::String(_), _) => Err(invalid()),
            (Value::Array(items), _) => Ok(items.iter().any(|item| item.loose_eq(needle))),
            (Value::Map(map), Value::String(key)) => Ok(map.contains_key(key)),
            (Value::Map(map), Value::Int(key)) => Ok(map.contains_key(&key.to_string())),
            (Value::Map(_), _) => Ok(false),
            _ => Err(invalid()),
        }
    }

    /// `self[key]`. Negative positions count from the end.
    pub fn index(&self, key: &Value) -> OpResult {
        match (self, key) {
            (Value::Array(items), Value::Int(_) | Value::Bool(_)) => {
                let i = position(key, items.len())?;
                Ok(items[i].clone())
            }
            (Value::String(s), Value::Int(_) | Value::Bool(_)) => {
                let chars: Vec<char> = s.chars().collect();
                let i = position(key, chars.len())?;
                Ok(Value::String(chars[i].to_string()))
            }
            (Value::Map(map), Value::String(k)) => map
                .get(k)
                .cloned()
                .ok_or_else(|| SemanticError::MissingKey(k.clone())),
            (Value::Map(map), Value::Int(n)) => {
                let k = n.to_string();
                map.get(&k).cloned().ok_or(SemanticError::MissingKey(k))
            }
            _ => Err(SemanticError::NotIndexable {
                target: self.type_name(),
                index: key.type_name(),
            }),
        }
    }

    /// `self.name`, equivalent to `self['name']` on mappings.
    pub fn attribute(&self, name: &str) -> OpResult {
        match self {
            Value::Map(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| SemanticError::MissingKey(name.to_string())),
            _ => Err(SemanticError::NotIndexable {
                target: self.type_name(),
                index: "str",
            }),
        }
    }

    /// Items visited by a `for` loop.
    pub fn iter_items(&self) -> Result<Vec<Value>, SemanticError> {
        match self {
            Value::Array(items) => Ok(items.clone()),
            Value::Map(map) => Ok(map.keys().cloned().map(Value::String).collect()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            _ => Err(SemanticError::NotIterable(self.type_name())),
        }
    }

    fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("'{s}'"),
            other => other.to_string(),
        }
    }
}

fn repeat(s: &str, count: &Value) -> OpResult {
    let n = match count {
        Value::Int(n) => *n,
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    };
    let times = usize::try_from(n).unwrap_or(0);
    match s.len().checked_mul(times) {
        Some(len) if len <= MAX_STRING_LEN => Ok(Value::String(s.repeat(times))),
        _ => Err(SemanticError::StringTooLong(MAX_STRING_LEN)),
    }
}

fn position(key: &Value, len: usize) -> Result<usize, SemanticError> {
    let index = match key {
        Value::Int(n) => *n,
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    };
    let out_of_range = || SemanticError::IndexOutOfRange { index, len };
    let len_i = i64::try_from(len).map_err(|_| out_of_range())?;
    let resolved = if index < 0 { index + len_i } else { index };
    if (0..len_i).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| out_of_range())
    } else {
        Err(out_of_range())
    }
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::String(s) => write!(f, "{s}"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("'{k}': {}", v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Macro(m) => write!(f, "<macro {}>", m.name),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn integer_arithmetic_stays_integer() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(Value::Int(2).sub(&Value::Int(3)), Ok(Value::Int(-1)));
        assert_eq!(Value::Int(2).mul(&Value::Int(3)), Ok(Value::Int(6)));
    }

    #[test]
    fn float_operand_promotes() {
        assert_eq!(Value::Int(2).add(&Value::Float(3.0)), Ok(Value::Float(5.0)));
        assert_eq!(Value::Float(2.0).mul(&Value::Int(-3)), Ok(Value::Float(-6.0)));
    }

    #[test]
    fn division_is_always_float() {
        assert_eq!(Value::Int(8).div(&Value::Int(2)), Ok(Value::Float(4.0)));
    }

    #[test]
    fn division_and_modulo_by_zero() {
        assert_eq!(Value::Int(1).div(&Value::Int(0)), Err(SemanticError::DivisionByZero));
        assert_eq!(Value::Int(1).rem(&Value::Float(0.0)), Err(SemanticError::DivisionByZero));
        assert_eq!(Value::Int(1).div(&Value::Bool(false)), Err(SemanticError::DivisionByZero));
    }

    #[test]
    fn modulo_takes_sign_of_divisor() {
        assert_eq!(Value::Int(7).rem(&Value::Int(3)), Ok(Value::Int(1)));
        assert_eq!(Value::Int(-7).rem(&Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(Value::Int(7).rem(&Value::Int(-3)), Ok(Value::Int(-2)));
        assert_eq!(Value::Float(7.5).rem(&Value::Int(2)), Ok(Value::Float(1.5)));
    }

    #[test]
    fn booleans_count_as_integers() {
        assert_eq!(Value::Bool(true).add(&Value::Bool(false)), Ok(Value::Int(1)));
        assert_eq!(Value::Int(4).mul(&Value::Bool(true)), Ok(Value::Int(4)));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(Value::Int(i64::MAX).add(&Value::Int(1)), Err(SemanticError::Overflow));
        assert_eq!(Value::Int(i64::MIN).neg(), Err(SemanticError::Overflow));
    }

    #[test]
    fn oversized_repetition_is_rejected() {
        assert_eq!(
            s("ab").mul(&Value::Int(i64::MAX)),
            Err(SemanticError::StringTooLong(MAX_STRING_LEN))
        );
        assert_eq!(
            Value::Int(100_000_000_000).mul(&s("ab")),
            Err(SemanticError::StringTooLong(MAX_STRING_LEN))
        );
        assert_eq!(s("ab").mul(&Value::Int(-2)), Ok(s("")));
        assert_eq!(s("").mul(&Value::Int(i64::MAX)), Ok(s("")));
    }

    #[test]
    fn min_modulo_minus_one_is_zero() {
        assert_eq!(Value::Int(i64::MIN).rem(&Value::Int(-1)), Ok(Value::Int(0)));
    }

    #[test]
    fn string_operators() {
        assert_eq!(s("ab").add(&s("cd")), Ok(s("abcd")));
        assert_eq!(s("ab").mul(&Value::Int(3)), Ok(s("ababab")));
        assert!(matches!(
            s("ab").sub(&s("a")),
            Err(SemanticError::UnsupportedOperands { op: "-", .. })
        ));
        assert!(s("1").add(&Value::Int(1)).is_err());
    }

    #[test]
    fn equality_across_numeric_types() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!s("1").loose_eq(&Value::Int(1)));
    }

    #[test]
    fn ordering_comparisons() {
        assert_eq!(Value::Int(5).compare(BinOp::Gt, &Value::Int(3)), Ok(true));
        assert_eq!(Value::Int(2).compare(BinOp::Le, &Value::Float(2.0)), Ok(true));
        assert_eq!(s("a").compare(BinOp::Lt, &s("b")), Ok(true));
        assert!(s("a").compare(BinOp::Lt, &Value::Int(1)).is_err());
    }

    #[test]
    fn membership() {
        assert_eq!(s("str").contains(&s("t")), Ok(true));
        assert_eq!(s("str").contains(&s("a")), Ok(false));
        assert!(matches!(
            s("str").contains(&Value::Bool(true)),
            Err(SemanticError::InvalidMembership { .. })
        ));
        let list = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.contains(&Value::Float(2.0)), Ok(true));
        assert!(Value::Int(3).contains(&Value::Int(3)).is_err());
    }

    #[test]
    fn indexing() {
        let list = Value::Array(vec![s("a"), s("b"), s("c")]);
        assert_eq!(list.index(&Value::Int(0)), Ok(s("a")));
        assert_eq!(list.index(&Value::Int(-1)), Ok(s("c")));
        assert_eq!(
            list.index(&Value::Int(3)),
            Err(SemanticError::IndexOutOfRange { index: 3, len: 3 })
        );

        let mut map = BTreeMap::new();
        map.insert("age".to_string(), Value::Int(34));
        let map = Value::Map(map);
        assert_eq!(map.index(&s("age")), Ok(Value::Int(34)));
        assert_eq!(map.attribute("age"), Ok(Value::Int(34)));
        assert_eq!(
            map.index(&s("date_of_birth")),
            Err(SemanticError::MissingKey("date_of_birth".into()))
        );
        assert_eq!(s("xyz").index(&Value::Int(1)), Ok(s("y")));
    }

    #[test]
    fn iteration() {
        assert_eq!(s("ab").iter_items(), Ok(vec![s("a"), s("b")]));
        assert_eq!(
            Value::Int(3).iter_items(),
            Err(SemanticError::NotIterable("int"))
        );
    }

    #[test]
    fn text_rendering() {
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(Value::Float(4.0).to_string(), "4.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Bool(false).to_string(), "False");
        assert_eq!(
            Value::Array(vec![Value::Int(1), s("a")]).to_string(),
            "[1, 'a']"
        );
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!s("").is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Int(2).is_truthy());
        assert!(s("x").is_truthy());
    }
}
