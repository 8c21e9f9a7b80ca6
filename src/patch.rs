use serde::{Deserialize, Deserializer};

/// Deserializes a nullable patch field: absent -> `None`, `null` -> `Some(None)`,
/// value -> `Some(Some(v))`. Pair with `#[serde(default)]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Trims a text field; blank text counts as cleared.
pub fn normalize_text(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        note: Option<Option<String>>,
    }

    #[test]
    fn distinguishes_absent_null_and_value() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);
        let null: Patch = serde_json::from_str(r#"{"note":null}"#).unwrap();
        assert_eq!(null.note, Some(None));
        let set: Patch = serde_json::from_str(r#"{"note":"hi"}"#).unwrap();
        assert_eq!(set.note, Some(Some("hi".into())));
    }

    #[test]
    fn blank_text_is_cleared() {
        assert_eq!(normalize_text(Some("  ".into())), None);
        assert_eq!(normalize_text(Some(" @ana ".into())), Some("@ana".into()));
        assert_eq!(normalize_text(None), None);
    }
}
