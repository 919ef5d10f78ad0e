use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{MAX_MATCH_SECONDS, MAX_NAME_CHARS};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Trims and truncates a display name. `None` when nothing is left.
pub fn sanitize_name(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_NAME_CHARS).collect())
}

/// Missing or blank room ids map to the default room.
pub fn normalize_room_id(raw: Option<&str>, default_room: &str) -> String {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value.chars().take(32).collect(),
        _ => default_room.to_string(),
    }
}

pub fn is_valid_duration(seconds: i64) -> bool {
    (1..=i64::from(MAX_MATCH_SECONDS)).contains(&seconds)
}

pub fn make_id(prefix: &str) -> String {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_name_applies_trim_empty_and_max_len() {
        assert_eq!(sanitize_name(""), None);
        assert_eq!(sanitize_name("   "), None);
        assert_eq!(sanitize_name(" Alice ").as_deref(), Some("Alice"));
        assert_eq!(
            sanitize_name("12345678901234567890").as_deref(),
            Some("123456789012345")
        );
        assert_eq!(
            sanitize_name("ÁÉÍÓÚáéíóúÀÈÌÒÙàè").map(|name| name.chars().count()),
            Some(MAX_NAME_CHARS)
        );
    }

    #[test]
    fn blank_room_ids_fall_back_to_default() {
        assert_eq!(normalize_room_id(None, "default"), "default");
        assert_eq!(normalize_room_id(Some("  "), "default"), "default");
        assert_eq!(normalize_room_id(Some(" sala-2 "), "default"), "sala-2");
    }

    #[test]
    fn duration_range_is_inclusive() {
        assert!(!is_valid_duration(0));
        assert!(is_valid_duration(1));
        assert!(is_valid_duration(3_600));
        assert!(!is_valid_duration(3_601));
        assert!(!is_valid_duration(-5));
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = make_id("conn");
        let b = make_id("conn");
        assert_ne!(a, b);
        assert!(a.starts_with("conn_"));
    }
}
