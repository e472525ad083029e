const MAX_NAME_CHARS: usize = 16;
const DEFAULT_NAME: &str = "Player";
const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Display names come straight from clients; trim, fall back on empty, and
/// cap the length in characters rather than bytes.
pub fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_NAME.to_string();
    }
    trimmed.chars().take(MAX_NAME_CHARS).collect()
}

pub fn parse_leaderboard_limit(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        return 10;
    };
    match raw.parse::<usize>() {
        Ok(0) => 10,
        Ok(limit) => limit.min(MAX_LEADERBOARD_LIMIT),
        Err(_) => 10,
    }
}

pub fn normalize_bot_count(raw: Option<i64>) -> Option<usize> {
    raw.map(|count| count.clamp(0, 200) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_and_falls_back() {
        assert_eq!(sanitize_name("  Alice  "), "Alice");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(""), "Player");
    }

    #[test]
    fn sanitize_caps_length_in_characters() {
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuv"), "abcdefghijklmnop");
        // Multibyte characters count as one each.
        let name = "ねこ".repeat(10);
        assert_eq!(sanitize_name(&name).chars().count(), 16);
    }

    #[test]
    fn leaderboard_limit_defaults_and_clamps() {
        assert_eq!(parse_leaderboard_limit(None), 10);
        assert_eq!(parse_leaderboard_limit(Some("25")), 25);
        assert_eq!(parse_leaderboard_limit(Some("0")), 10);
        assert_eq!(parse_leaderboard_limit(Some("9999")), 100);
        assert_eq!(parse_leaderboard_limit(Some("abc")), 10);
    }

    #[test]
    fn bot_count_clamps_negative_and_huge_values() {
        assert_eq!(normalize_bot_count(None), None);
        assert_eq!(normalize_bot_count(Some(-5)), Some(0));
        assert_eq!(normalize_bot_count(Some(12)), Some(12));
        assert_eq!(normalize_bot_count(Some(10_000)), Some(200));
    }
}
