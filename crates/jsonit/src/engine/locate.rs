use serde_json::Value;

/// Depth-first, pre-order search for `key` in nested objects.
///
/// An object that holds `key` answers for its whole subtree: a `null` there
/// yields `None` for that branch without descending further. Arrays are not
/// traversed.
#[must_use]
pub fn find<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let Value::Object(map) = value else {
        return None;
    };

    if let Some(hit) = map.get(key) {
        return (!hit.is_null()).then_some(hit);
    }

    map.values()
        .filter(|child| child.is_object())
        .find_map(|child| find(child, key))
}

/// Renders an identifier-like leaf as text. Empty strings and non-scalar
/// values do not count as evidence.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[must_use]
pub fn text_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_text)
}

/// `value[key]` when it is an object.
#[must_use]
pub fn object_at<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|child| child.is_object())
}

#[cfg(test)]
mod tests {
    use super::{find, scalar_text, text_at};
    use serde_json::json;

    #[test]
    fn finds_key_at_root() {
        let value = json!({"bidId": "B1", "nested": {"bidId": "B2"}});
        assert_eq!(find(&value, "bidId"), Some(&json!("B1")));
    }

    #[test]
    fn finds_deeply_nested_key_in_document_order() {
        let value = json!({
            "meta": {"source": "x"},
            "bidAttributes": {"inner": {"bidId": "B-deep"}},
            "later": {"bidId": "B-late"}
        });
        assert_eq!(find(&value, "bidId"), Some(&json!("B-deep")));
    }

    #[test]
    fn null_hit_falls_through_to_next_sibling() {
        let value = json!({
            "first": {"adId": null, "child": {"adId": "hidden"}},
            "second": {"adId": "A2"}
        });
        assert_eq!(find(&value, "adId"), Some(&json!("A2")));
    }

    #[test]
    fn arrays_are_not_searched() {
        let value = json!({"slots": [{"bidId": "B-in-array"}]});
        assert_eq!(find(&value, "bidId"), None);
    }

    #[test]
    fn leaves_never_match() {
        assert_eq!(find(&json!("bidId"), "bidId"), None);
        assert_eq!(find(&json!(7), "bidId"), None);
    }

    #[test]
    fn scalar_text_accepts_strings_and_numbers_only() {
        assert_eq!(scalar_text(&json!("B1")), Some("B1".to_string()));
        assert_eq!(scalar_text(&json!(123)), Some("123".to_string()));
        assert_eq!(scalar_text(&json!("")), None);
        assert_eq!(scalar_text(&json!({"a": 1})), None);
        assert_eq!(text_at(&json!({"cor": "AFTMM"}), "cor"), Some("AFTMM".to_string()));
    }
}
