use serde_json::Value;

pub type JsonMap = serde_json::Map<String, Value>;

/// 顶层对象及常见嵌套容器（`product` / `display` / `properties` / `data`）。
pub fn collect_maps(raw: &Value) -> Vec<&JsonMap> {
    let mut maps = Vec::new();
    if let Some(map) = raw.as_object() {
        maps.push(map);
        for key in ["product", "display", "properties", "data"] {
            if let Some(inner) = map.get(key).and_then(|v| v.as_object()) {
                maps.push(inner);
            }
        }
    }
    maps
}

pub fn pick_string(map: &JsonMap, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(s) = val.as_str() {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            } else if let Some(n) = val.as_i64() {
                return Some(n.to_string());
            } else if let Some(n) = val.as_u64() {
                return Some(n.to_string());
            }
        }
    }
    None
}

pub fn pick_u64(map: &JsonMap, keys: &[&str]) -> Option<u64> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(n) = val.as_u64() {
                return Some(n);
            }
            if let Some(s) = val.as_str()
                && let Ok(n) = s.trim().parse::<u64>()
            {
                return Some(n);
            }
        }
    }
    None
}

pub fn pick_i64(map: &JsonMap, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(n) = val.as_i64() {
                return Some(n);
            }
            if let Some(s) = val.as_str()
                && let Ok(n) = s.trim().parse::<i64>()
            {
                return Some(n);
            }
        }
    }
    None
}

pub fn pick_bool(map: &JsonMap, keys: &[&str]) -> Option<bool> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(b) = val.as_bool() {
                return Some(b);
            }
            if let Some(n) = val.as_i64() {
                return Some(n != 0);
            }
            if let Some(s) = val.as_str() {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => return Some(true),
                    "false" | "no" | "0" => return Some(false),
                    _ => {}
                }
            }
        }
    }
    None
}

/// 在多层容器中按顺序查找第一个命中的字段。
pub fn find_in<T>(maps: &[&JsonMap], pick: impl Fn(&JsonMap) -> Option<T>) -> Option<T> {
    maps.iter().find_map(|m| pick(*m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_containers_are_searched_in_order() {
        let raw = json!({
            "id": 10,
            "display": { "title": "Title" },
            "properties": { "expired": "true" }
        });
        let maps = collect_maps(&raw);
        assert_eq!(maps.len(), 3);
        assert_eq!(
            find_in(&maps, |m| pick_string(m, &["title"])),
            Some("Title".to_string())
        );
        assert_eq!(find_in(&maps, |m| pick_bool(m, &["expired"])), Some(true));
        assert_eq!(find_in(&maps, |m| pick_u64(m, &["id"])), Some(10));
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let raw = json!({ "id": " 42 ", "updatedAt": "-5" });
        let map = raw.as_object().unwrap();
        assert_eq!(pick_u64(map, &["id"]), Some(42));
        assert_eq!(pick_i64(map, &["updatedAt"]), Some(-5));
        assert_eq!(pick_string(map, &["missing"]), None);
    }
}
