//! Reconciles the list payload shapes returned by the admin backends into one
//! `{items, total}` page.
//!
//! Recognized list locations, first match wins: the payload itself,
//! `data.list`, `data.records`, `data`, `list`, `records`. Totals come from
//! `data.total`, `data.pagination.total` or `total`, otherwise the item count.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::pagination::total_pages;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total: u64,
}

const LIST_PATHS: [&[&str]; 6] = [
    &[],
    &["data", "list"],
    &["data", "records"],
    &["data"],
    &["list"],
    &["records"],
];

const TOTAL_PATHS: [&[&str]; 3] = [
    &["data", "total"],
    &["data", "pagination", "total"],
    &["total"],
];

fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |value, key| value.get(*key))
}

fn as_total(value: &Value) -> Option<u64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(total) = number.as_u64() {
        return Some(total);
    }
    if number.as_i64().is_some() {
        return Some(0);
    }
    number.as_f64().map(|total| total.max(0.0).floor() as u64)
}

/// The raw record array of a payload, or an empty slice when no recognized
/// location holds an array.
pub fn extract_list(payload: &Value) -> &[Value] {
    LIST_PATHS
        .iter()
        .find_map(|path| lookup(payload, path).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// The first numeric total a payload carries, if any.
pub fn extract_total(payload: &Value) -> Option<u64> {
    TOTAL_PATHS
        .iter()
        .find_map(|path| lookup(payload, path).and_then(as_total))
}

/// Pure normalization over raw JSON records. An empty server list is replaced
/// by `fallback`; an explicit numeric total is kept even then.
pub fn parse_list_response(payload: &Value, fallback: &[Value]) -> ListPage<Value> {
    let list = extract_list(payload);
    let items = if list.is_empty() {
        fallback.to_vec()
    } else {
        list.to_vec()
    };
    let total = extract_total(payload).unwrap_or(items.len() as u64);
    ListPage { items, total }
}

/// [`parse_list_response`] followed by decoding each server record into `T`.
/// Fallback records are used as-is.
pub fn decode_list_response<T>(payload: &Value, fallback: &[T]) -> Result<ListPage<T>, serde_json::Error>
where
    T: DeserializeOwned + Clone,
{
    let list = extract_list(payload);
    let items = if list.is_empty() {
        fallback.to_vec()
    } else {
        list.iter()
            .cloned()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?
    };
    let total = extract_total(payload).unwrap_or(items.len() as u64);
    Ok(ListPage { items, total })
}

/// One page of the trade search, whose service uses its own envelope:
/// rows under `trades`, the payload itself, `data` or `content`, and a total
/// under `total`, `totalElements`, `totalCount` or `count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePage {
    pub items: Vec<Value>,
    pub total: u64,
    pub total_pages: u32,
}

impl TradePage {
    /// Re-wraps the page as `{list, total}` so the paged-list controller can
    /// consume it.
    pub fn into_list_payload(self) -> Value {
        json!({ "list": self.items, "total": self.total })
    }
}

const TRADE_TOTAL_KEYS: [&str; 4] = ["total", "totalElements", "totalCount", "count"];

/// A zero total counts as missing, so the next key or the row count is used.
/// `totalPages` wins when present; otherwise pages are derived from the
/// reported `size`, then `requested_size`.
pub fn parse_trade_page(payload: &Value, requested_size: u32) -> TradePage {
    let items = [
        payload.get("trades"),
        Some(payload),
        payload.get("data"),
        payload.get("content"),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_array)
    .cloned()
    .unwrap_or_default();

    let total = TRADE_TOTAL_KEYS
        .iter()
        .filter_map(|key| payload.get(*key).and_then(as_total))
        .find(|total| *total > 0)
        .unwrap_or(items.len() as u64);

    let reported_pages = payload
        .get("totalPages")
        .and_then(as_total)
        .filter(|pages| *pages > 0)
        .map(|pages| u32::try_from(pages).unwrap_or(u32::MAX));
    let total_pages = reported_pages.unwrap_or_else(|| {
        let size = payload
            .get("size")
            .and_then(as_total)
            .filter(|size| *size > 0)
            .map(|size| u32::try_from(size).unwrap_or(u32::MAX))
            .unwrap_or(requested_size);
        total_pages(total, size)
    });

    TradePage {
        items,
        total,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_array_payload_is_used_directly() {
        let page = parse_list_response(&json!([1, 2]), &[]);
        assert_eq!(page.items, vec![json!(1), json!(2)]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn data_list_wins_over_data_records() {
        let payload = json!({
            "data": { "list": [1, 2, 3], "records": [9], "total": 10 }
        });
        let page = parse_list_response(&payload, &[]);
        assert_eq!(page.items, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(page.total, 10);
    }

    #[test]
    fn each_list_location_is_recognized_in_order() {
        let cases = [
            (json!({ "data": { "records": ["r"] } }), "r"),
            (json!({ "data": ["d"], "list": ["l"] }), "d"),
            (json!({ "list": ["l"], "records": ["x"] }), "l"),
            (json!({ "records": ["x"] }), "x"),
        ];
        for (payload, expected) in cases {
            let page = parse_list_response(&payload, &[]);
            assert_eq!(page.items, vec![json!(expected)], "payload {payload}");
        }
    }

    #[test]
    fn data_list_that_is_not_an_array_falls_through() {
        let payload = json!({ "data": { "list": "oops" }, "records": [5] });
        assert_eq!(parse_list_response(&payload, &[]).items, vec![json!(5)]);
    }

    #[test]
    fn unrecognized_shape_degrades_to_empty() {
        for payload in [json!(null), json!("text"), json!({ "items": [1] }), json!(42)] {
            let page = parse_list_response(&payload, &[]);
            assert!(page.items.is_empty());
            assert_eq!(page.total, 0);
        }
    }

    #[test]
    fn empty_server_list_uses_fallback_and_inferred_total() {
        let fallback = [json!("a"), json!("b")];
        let page = parse_list_response(&json!({ "list": [] }), &fallback);
        assert_eq!(page.items, fallback.to_vec());
        assert_eq!(page.total, 2);
    }

    #[test]
    fn explicit_zero_total_is_kept_with_fallback_items() {
        let fallback = [json!("a"), json!("b")];
        let page = parse_list_response(&json!({ "data": { "list": [], "total": 0 } }), &fallback);
        assert_eq!(page.items, fallback.to_vec());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn total_priority_and_numeric_check() {
        let nested = json!({ "data": { "list": [1], "pagination": { "total": 30 } }, "total": 99 });
        assert_eq!(parse_list_response(&nested, &[]).total, 30);

        let top_level = json!({ "data": { "list": [1], "total": "12" }, "total": 99 });
        assert_eq!(parse_list_response(&top_level, &[]).total, 99);

        let non_numeric = json!({ "list": [1, 2, 3], "total": "7" });
        assert_eq!(parse_list_response(&non_numeric, &[]).total, 3);

        let fractional = json!({ "list": [1], "total": 12.7 });
        assert_eq!(parse_list_response(&fractional, &[]).total, 12);

        let negative = json!({ "list": [1], "total": -4 });
        assert_eq!(parse_list_response(&negative, &[]).total, 0);
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Row {
        id: u32,
    }

    #[test]
    fn decode_produces_typed_records() {
        let payload = json!({ "data": { "records": [{ "id": 4 }, { "id": 5 }], "total": 22 } });
        let page = decode_list_response::<Row>(&payload, &[]).expect("decode");
        assert_eq!(page.items, vec![Row { id: 4 }, Row { id: 5 }]);
        assert_eq!(page.total, 22);
    }

    #[test]
    fn decode_uses_fallback_for_empty_list_and_rejects_bad_records() {
        let fallback = vec![Row { id: 1 }];
        let page = decode_list_response(&json!([]), &fallback).expect("decode");
        assert_eq!(page.items, fallback);
        assert_eq!(page.total, 1);

        assert!(decode_list_response::<Row>(&json!([{ "id": "x" }]), &fallback).is_err());
    }

    #[test]
    fn trade_rows_come_from_the_first_array_location() {
        let page = parse_trade_page(&json!({ "trades": [1, 2], "content": [3] }), 10);
        assert_eq!(page.items, vec![json!(1), json!(2)]);

        let page = parse_trade_page(&json!([4, 5, 6]), 10);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total, 3);

        let page = parse_trade_page(&json!({ "content": [7], "totalElements": 31 }), 10);
        assert_eq!(page.items, vec![json!(7)]);
        assert_eq!(page.total, 31);
        assert_eq!(page.total_pages, 4);

        let page = parse_trade_page(&json!({ "trades": "none" }), 10);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn trade_total_skips_zero_and_prefers_reported_pages() {
        let payload = json!({ "data": [1], "total": 0, "totalCount": 12, "size": 5 });
        let page = parse_trade_page(&payload, 10);
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 3);

        let payload = json!({ "data": [1], "count": 12, "totalPages": 7 });
        assert_eq!(parse_trade_page(&payload, 10).total_pages, 7);
    }

    #[test]
    fn trade_page_rewraps_for_list_normalization() {
        let payload = parse_trade_page(&json!({ "trades": [{ "tradeId": "T1" }], "count": 9 }), 5)
            .into_list_payload();
        let page = parse_list_response(&payload, &[]);
        assert_eq!(page.items, vec![json!({ "tradeId": "T1" })]);
        assert_eq!(page.total, 9);
    }
}
