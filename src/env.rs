/// Interpret a string value such as "1" or "no" as a boolean.
pub fn str_as_bool(s: &str) -> bool {
    match s {
        "1" | "true" | "t" | "yes" | "y" => true,
        "0" | "false" | "f" | "no" | "n" => false,
        _ => {
            tracing::warn!(value = s, "unrecognized boolean value");
            false
        }
    }
}

/// Split a configuration string of space-separated `key=value` pairs.
///
/// Tokens without an `=` are ignored.
pub fn config_pairs(config: &str) -> impl Iterator<Item = (&str, &str)> {
    config
        .split_ascii_whitespace()
        .filter_map(|token| token.split_once('='))
        .map(|(key, val)| (key.trim(), val.trim()))
}

#[cfg(test)]
mod tests {
    use super::{config_pairs, str_as_bool};

    #[test]
    fn test_str_as_bool() {
        assert!(str_as_bool("yes"));
        assert!(str_as_bool("1"));
        assert!(!str_as_bool("f"));
        assert!(!str_as_bool("maybe"));
    }

    #[test]
    fn test_config_pairs() {
        let pairs: Vec<_> = config_pairs("recursion-limit=8  junk lossy-utf8=1").collect();
        assert_eq!(pairs, [("recursion-limit", "8"), ("lossy-utf8", "1")]);
    }
}
