//! Exec argument parsing
//!
//! Actions pass arguments as `key:value` strings. A bare `key` is a flag.
//! Accessors fall back to the supplied default when a key is missing or
//! its value does not parse.

use std::collections::BTreeMap;
use std::time::Duration;

const SPLITTER: char = ':';

/// Parsed exec arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecArgs {
    values: BTreeMap<String, String>,
}

impl ExecArgs {
    /// Parse raw `key:value` entries; later keys override earlier ones
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut values = BTreeMap::new();
        for entry in raw {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            let (key, value) = match entry.split_once(SPLITTER) {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (entry, ""),
            };
            if key.is_empty() {
                tracing::debug!(entry, "Skipping exec argument without key");
                continue;
            }
            values.insert(key.to_string(), value.to_string());
        }
        Self { values }
    }

    /// Whether the key was given
    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no argument was given
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over keys and values in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw value of a key
    #[must_use]
    pub fn as_string(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .map_or_else(|| default.to_string(), Clone::clone)
    }

    /// Boolean value; a bare flag is `true`
    #[must_use]
    pub fn as_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key).map(|v| v.to_ascii_lowercase()) {
            None => default,
            Some(v) if v.is_empty() => true,
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    tracing::warn!(key, value = %v, "Exec argument is not a bool");
                    default
                }
            },
        }
    }

    /// Integer value
    #[must_use]
    pub fn as_int(&self, key: &str, default: i64) -> i64 {
        self.parse_value(key, default)
    }

    /// Floating point value
    #[must_use]
    pub fn as_float(&self, key: &str, default: f64) -> f64 {
        self.parse_value(key, default)
    }

    /// Duration given in (possibly fractional) seconds
    #[must_use]
    pub fn as_duration(&self, key: &str, default: Duration) -> Duration {
        let parsed = self
            .values
            .get(key)
            .map(|v| v.parse::<f64>().ok().and_then(|s| Duration::try_from_secs_f64(s).ok()));
        match parsed {
            Some(Some(duration)) => duration,
            Some(None) => {
                tracing::warn!(key, "Exec argument is not a duration in seconds");
                default
            }
            None => default,
        }
    }

    /// Comma separated list, empty items dropped
    #[must_use]
    pub fn as_string_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_value<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.values.get(key) {
            None => default,
            Some(v) => v.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %v, "Exec argument does not parse");
                default
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_pairs_and_flags() {
        let args = ExecArgs::parse(&[
            " retry_count : 3 ",
            "fast",
            "",
            "url:http://host:8080/path",
            ":orphan",
        ]);
        assert_eq!(args.len(), 3);
        assert_eq!(args.as_int("retry_count", 0), 3);
        assert!(args.as_bool("fast", false));
        assert_eq!(args.as_string("url", ""), "http://host:8080/path");
        assert!(!args.has("orphan"));
    }

    #[test]
    fn defaults_on_missing_or_bad_values() {
        let args = ExecArgs::parse(&["count:many", "enabled:maybe", "wait:-1"]);
        assert_eq!(args.as_int("count", 7), 7);
        assert_eq!(args.as_int("absent", 9), 9);
        assert!(args.as_bool("enabled", true));
        assert_eq!(
            args.as_duration("wait", Duration::from_secs(4)),
            Duration::from_secs(4)
        );
        assert_eq!(args.as_string("absent", "x"), "x");
    }

    #[test]
    fn bool_spellings() {
        let args = ExecArgs::parse(&["a:TRUE", "b:0", "c:no", "d:yes"]);
        assert!(args.as_bool("a", false));
        assert!(!args.as_bool("b", true));
        assert!(!args.as_bool("c", true));
        assert!(args.as_bool("d", false));
    }

    #[test]
    fn durations_and_lists() {
        let args = ExecArgs::parse(&["sleep:1.5", "ports:9999, ,22,"]);
        assert_eq!(
            args.as_duration("sleep", Duration::ZERO),
            Duration::from_millis(1500)
        );
        assert_eq!(args.as_string_list("ports"), vec!["9999", "22"]);
        assert!(args.as_string_list("absent").is_empty());
    }

    #[test]
    fn out_of_range_duration_falls_back() {
        let args = ExecArgs::parse(&["huge:1e30", "negative:-1", "nan:NaN", "inf:inf"]);
        let default = Duration::from_secs(3);
        for key in ["huge", "negative", "nan", "inf"] {
            assert_eq!(args.as_duration(key, default), default, "{key}");
        }
    }

    #[test]
    fn later_keys_override() {
        let args = ExecArgs::parse(&["k:1", "k:2"]);
        assert_eq!(args.as_int("k", 0), 2);
    }

    proptest! {
        #[test]
        fn prop_any_valid_pair_round_trips(
            key in "[a-z_][a-z0-9_]{0,12}",
            value in "[A-Za-z0-9_.:/-]{0,20}",
        ) {
            let args = ExecArgs::parse(&[format!("{key}:{value}")]);
            prop_assert!(args.has(&key));
            prop_assert_eq!(args.as_string(&key, "<none>"), value.trim().to_string());
        }

        #[test]
        fn prop_integers_parse(n in any::<i64>()) {
            let args = ExecArgs::parse(&[format!("n:{n}")]);
            prop_assert_eq!(args.as_int("n", 0), n);
        }
    }
}
