use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// String comparison rules applied to matching and sorting.
///
/// Strength follows the ICU levels a document store exposes: at strength 3
/// and above strings compare exactly, at 1 or 2 they compare without regard
/// to letter case. Values of different types never compare equal and order
/// as null < numbers < strings < objects < arrays < booleans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collation {
    pub locale: String,
    pub strength: u8,
}

impl Collation {
    pub fn new(locale: impl Into<String>, strength: u8) -> Self {
        Self { locale: locale.into(), strength }
    }

    /// Binary comparison.
    pub fn simple() -> Self {
        Self::new("simple", 3)
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.strength <= 2
    }

    pub fn compare_str(&self, a: &str, b: &str) -> Ordering {
        if self.is_case_insensitive() {
            a.to_lowercase().cmp(&b.to_lowercase())
        } else {
            a.cmp(b)
        }
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let (ra, rb) = (type_rank(a), type_rank(b));
        if ra != rb {
            return ra.cmp(&rb);
        }

        match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Number(x), Value::Number(y)) => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => self.compare_str(x, y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Array(x), Value::Array(y)) => {
                for (l, r) in x.iter().zip(y.iter()) {
                    let ord = self.compare(l, r);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            (Value::Object(x), Value::Object(y)) => {
                for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                    let ord = lk.cmp(rk).then_with(|| self.compare(lv, rv));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            _ => Ordering::Equal,
        }
    }

    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// True when both values sit in the same comparison bracket, which is the
    /// precondition for range operators to match at all.
    pub fn comparable(a: &Value, b: &Value) -> bool {
        type_rank(a) == type_rank(b)
    }
}

impl Default for Collation {
    fn default() -> Self {
        Self::new("en", 2)
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}
