// Normalization of untyped upstream payloads into canonical bins
use crate::types::*;
use serde_json::{Map, Value};

/// Nesting bound for every recursive walk over upstream JSON
pub const MAX_DEPTH: usize = 5;

const PRICE_KEYS: &[&str] = &["price", "binPrice", "p", "pricePerLamport"];
const LIQUIDITY_KEYS: &[&str] = &["liquidity", "binLiquidity", "l"];
const AMOUNT_X_KEYS: &[&str] = &["amountX", "amount_x", "xAmount", "reserveX"];
const AMOUNT_Y_KEYS: &[&str] = &["amountY", "amount_y", "yAmount", "reserveY"];

/// Keys that usually hold the bin array itself
const BIN_KEYS: &[&str] = &["bins", "entries", "items"];
/// Wrappers that usually hold a nested payload
const CONTAINER_KEYS: &[&str] = &["data", "result", "payload", "pair", "pool"];

const DETAIL_PRICE_KEYS: &[&str] = &["currentPrice", "current_price", "activePrice", "price"];
const DETAIL_STEP_KEYS: &[&str] = &["binStep", "bin_step"];

const LISTING_KEYS: &[&str] = &["pairs", "pools", "data", "items", "result"];
const ADDRESS_KEYS: &[&str] = &["address", "pairAddress", "pair_address", "pubkey", "id"];

/// Read a finite number, accepting numeric strings
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k).and_then(as_number))
}

/// Map one upstream record to a bin, or reject it
pub fn normalize_bin(value: &Value) -> Option<BinPoint> {
    let obj = value.as_object()?;
    let price = first_number(obj, PRICE_KEYS)?;

    let liquidity = match first_number(obj, LIQUIDITY_KEYS) {
        Some(l) => l,
        None => {
            let x = first_number(obj, AMOUNT_X_KEYS);
            let y = first_number(obj, AMOUNT_Y_KEYS);
            if x.is_none() && y.is_none() {
                return None;
            }
            x.unwrap_or(0.0) + y.unwrap_or(0.0)
        }
    };

    BinPoint::new(price, liquidity)
}

/// Normalize every element of an array, dropping rejects
pub fn normalize_bins(records: &[Value]) -> Vec<BinPoint> {
    records.iter().filter_map(normalize_bin).collect()
}

/// Visit object keys in lookup order: bin keys, containers, then the rest
fn ordered_children(obj: &Map<String, Value>) -> impl Iterator<Item = &Value> {
    let preferred = BIN_KEYS
        .iter()
        .chain(CONTAINER_KEYS.iter())
        .filter_map(move |k| obj.get(*k));
    let rest = obj
        .iter()
        .filter(|(k, _)| !BIN_KEYS.contains(&k.as_str()) && !CONTAINER_KEYS.contains(&k.as_str()))
        .map(|(_, v)| v);
    preferred.chain(rest)
}

/// Search an arbitrary payload for a nested array of bin-like records.
/// The first non-empty candidate wins; nothing found yields an empty vec.
pub fn extract_bins(value: &Value) -> Vec<BinPoint> {
    extract_bins_at(value, 0)
}

fn extract_bins_at(value: &Value, depth: usize) -> Vec<BinPoint> {
    if depth > MAX_DEPTH {
        return Vec::new();
    }
    match value {
        Value::Array(items) => normalize_bins(items),
        Value::Object(obj) => {
            for child in ordered_children(obj) {
                if !matches!(child, Value::Array(_) | Value::Object(_)) {
                    continue;
                }
                let found = extract_bins_at(child, depth + 1);
                if !found.is_empty() {
                    return found;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Locate a current price and bin step in a payload without bins
pub fn extract_detail(value: &Value) -> Option<PoolDetail> {
    extract_detail_at(value, 0)
}

fn extract_detail_at(value: &Value, depth: usize) -> Option<PoolDetail> {
    if depth > MAX_DEPTH {
        return None;
    }
    let obj = value.as_object()?;

    let price = first_number(obj, DETAIL_PRICE_KEYS).filter(|p| *p > 0.0);
    let bin_step = first_number(obj, DETAIL_STEP_KEYS).filter(|s| *s > 0.0);
    if let (Some(price), Some(bin_step)) = (price, bin_step) {
        return Some(PoolDetail { price, bin_step });
    }

    CONTAINER_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|child| extract_detail_at(child, depth + 1))
}

/// Find the record array of a listing payload
pub fn find_records(value: &Value) -> Option<&Vec<Value>> {
    find_records_at(value, 0)
}

fn find_records_at(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => LISTING_KEYS
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(|child| find_records_at(child, depth + 1)),
        _ => None,
    }
}

/// Address of a listing record, if it has one
pub fn record_address(record: &Value) -> Option<&str> {
    let obj = record.as_object()?;
    ADDRESS_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_price_key_priority() {
        let bin = normalize_bin(&json!({"p": 2.0, "price": 1.5, "liquidity": 10})).unwrap();
        assert_eq!(bin.price, 1.5);

        let bin = normalize_bin(&json!({"pricePerLamport": "0.25", "l": 3})).unwrap();
        assert_eq!(bin.price, 0.25);
        assert_eq!(bin.liquidity, 3.0);
    }

    #[test]
    fn test_paired_amounts_sum_missing_side_as_zero() {
        let bin = normalize_bin(&json!({"price": 1.0, "amountX": 4, "amountY": 6})).unwrap();
        assert_eq!(bin.liquidity, 10.0);

        let bin = normalize_bin(&json!({"price": 1.0, "yAmount": "7"})).unwrap();
        assert_eq!(bin.liquidity, 7.0);
    }

    #[test]
    fn test_direct_liquidity_takes_precedence() {
        let bin = normalize_bin(&json!({"price": 1.0, "liquidity": 2, "amountX": 100})).unwrap();
        assert_eq!(bin.liquidity, 2.0);
    }

    #[test]
    fn test_rejections_never_panic() {
        for value in [
            json!(null),
            json!(42),
            json!("price"),
            json!([1, 2]),
            json!({}),
            json!({"price": "abc", "liquidity": 1}),
            json!({"price": 1.0}),
            json!({"liquidity": 5}),
            json!({"price": -1.0, "liquidity": 5}),
            json!({"price": 0, "amountX": 1}),
        ] {
            assert!(normalize_bin(&value).is_none(), "accepted {value}");
        }
    }

    #[test]
    fn test_negative_liquidity_clamped() {
        let bin = normalize_bin(&json!({"price": 3.0, "liquidity": -12})).unwrap();
        assert_eq!(bin.liquidity, 0.0);

        let bin = normalize_bin(&json!({"price": 3.0, "amountX": -5, "amountY": 2})).unwrap();
        assert_eq!(bin.liquidity, 0.0);
    }

    #[test]
    fn test_extract_nested_bins() {
        let payload = json!({
            "status": "ok",
            "data": {
                "meta": {"count": 2},
                "pair": {"bins": [
                    {"price": 2.0, "liquidity": 1},
                    {"price": 1.0, "liquidity": 2},
                    {"junk": true}
                ]}
            }
        });
        let bins = extract_bins(&payload);
        assert_eq!(bins.len(), 2);
    }

    #[test]
    fn test_extract_prefers_bins_key_over_other_arrays() {
        let payload = json!({
            "alpha": [{"price": 9.0, "liquidity": 9}],
            "bins": [{"price": 1.0, "liquidity": 1}]
        });
        let bins = extract_bins(&payload);
        assert_eq!(bins, vec![BinPoint { price: 1.0, liquidity: 1.0 }]);
    }

    #[test]
    fn test_extract_scans_unknown_keys() {
        let payload = json!({"weird": {"buckets": [{"binPrice": 5, "l": 1}]}});
        assert_eq!(extract_bins(&payload).len(), 1);
    }

    #[test]
    fn test_extract_depth_bound() {
        let mut payload = json!([{"price": 1.0, "liquidity": 1}]);
        for _ in 0..(MAX_DEPTH + 2) {
            payload = json!({ "data": payload });
        }
        assert!(extract_bins(&payload).is_empty());

        let mut shallow = json!([{"price": 1.0, "liquidity": 1}]);
        for _ in 0..MAX_DEPTH {
            shallow = json!({ "data": shallow });
        }
        assert_eq!(extract_bins(&shallow).len(), 1);
    }

    #[test]
    fn test_extract_detail() {
        let detail = extract_detail(&json!({"currentPrice": 150, "binStep": 0.5})).unwrap();
        assert_eq!(detail, PoolDetail { price: 150.0, bin_step: 0.5 });

        let nested = json!({"data": {"current_price": "21.5", "bin_step": 25}});
        assert_eq!(extract_detail(&nested).unwrap().price, 21.5);

        assert!(extract_detail(&json!({"currentPrice": 150})).is_none());
    }

    #[test]
    fn test_find_records_and_address() {
        let listing = json!({"pairs": [{"pair_address": "abc"}, {"name": "x"}]});
        let records = find_records(&listing).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(record_address(&records[0]), Some("abc"));
        assert_eq!(record_address(&records[1]), None);
    }
}
