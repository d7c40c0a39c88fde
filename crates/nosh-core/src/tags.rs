//! Tag list parsing.

/// Split a comma-separated tag field into unique, trimmed, non-empty names.
///
/// First occurrence wins, so the original order is kept.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == name) {
            tags.push(name.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        assert_eq!(parse_tag_list("math,calc"), vec!["math", "calc"]);
    }

    #[test]
    fn test_parse_trims_and_drops_empties() {
        assert_eq!(parse_tag_list("  math , ,calc,, "), vec!["math", "calc"]);
    }

    #[test]
    fn test_parse_collapses_duplicates() {
        assert_eq!(parse_tag_list("a,b,a, b"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_tag_list("").is_empty());
        assert!(parse_tag_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(parse_tag_list("Math,math"), vec!["Math", "math"]);
    }
}
