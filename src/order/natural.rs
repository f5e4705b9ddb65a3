use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Type class ordering: null < bool < number < string < array < object.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total natural order over JSON values.
///
/// Values of different kinds order by type class. Within a kind:
/// - numbers compare numerically; integers stay exact, also against floats
/// - strings compare lexicographically
/// - arrays compare element-wise, then by length
/// - objects compare entry-wise in iteration order (key, then value), then by length
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(va, vb)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => Ordering::Equal,
    }
}

/// Integers (`i64` and `u64`) compare exactly, against each other and against
/// floats; floats compare numerically with `-0.0 == 0.0`.
fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (integer(a), integer(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(x), None) => compare_integer_float(x, float(b)),
        (None, Some(y)) => compare_integer_float(y, float(a)).reverse(),
        (None, None) => {
            let (x, y) = (float(a), float(b));
            x.partial_cmp(&y).unwrap_or_else(|| x.total_cmp(&y))
        }
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn float(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

fn compare_integer_float(x: i128, y: f64) -> Ordering {
    if y.is_nan() {
        // same placement as `f64::total_cmp`
        return if y.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if y.is_infinite() {
        return if y > 0.0 { Ordering::Less } else { Ordering::Greater };
    }
    // `as` saturates; every saturated value lies outside the integer range
    let floor = y.floor();
    x.cmp(&(floor as i128)).then(if y > floor {
        Ordering::Less
    } else {
        Ordering::Equal
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_across_representations() {
        assert_eq!(compare_values(&json!(1), &json!(1.5)), Ordering::Less);
        assert_eq!(compare_values(&json!(-3), &json!(u64::MAX)), Ordering::Less);
        assert_eq!(compare_values(&json!(u64::MAX), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!(2), &json!(2)), Ordering::Equal);
        assert_eq!(compare_values(&json!(2), &json!(2.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(-0.0), &json!(0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(-0.0), &json!(0.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(-3), &json!(-2.5)), Ordering::Less);
        assert_eq!(compare_values(&json!(u64::MAX), &json!(1e300)), Ordering::Less);
    }

    #[test]
    fn large_integers_stay_exact_next_to_floats() {
        let two_53: u64 = 1 << 53;
        let values = [
            json!(two_53),
            json!(two_53 + 1),
            json!(two_53 + 2),
            json!(two_53 + 3),
            json!(two_53 as f64),
            json!((two_53 + 2) as f64),
            json!(-(1_i64 << 53) - 1),
            json!(-((1_i64 << 53) as f64)),
        ];
        assert_eq!(compare_values(&values[1], &values[4]), Ordering::Greater);
        assert_eq!(compare_values(&values[0], &values[4]), Ordering::Equal);
        assert_eq!(compare_values(&values[6], &values[7]), Ordering::Less);

        for a in &values {
            for b in &values {
                assert_eq!(compare_values(a, b), compare_values(b, a).reverse());
                for c in &values {
                    if compare_values(a, b).is_le() && compare_values(b, c).is_le() {
                        assert!(compare_values(a, c).is_le(), "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn kinds_order_by_type_class() {
        let mut values = vec![
            json!({ "a": 1 }),
            json!("text"),
            json!([1]),
            json!(true),
            json!(null),
            json!(0),
        ];
        values.sort_by(compare_values);
        assert_eq!(
            values,
            vec![json!(null), json!(true), json!(0), json!("text"), json!([1]), json!({ "a": 1 })]
        );
    }

    #[test]
    fn arrays_compare_elementwise_then_length() {
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1])), Ordering::Greater);
    }
}
