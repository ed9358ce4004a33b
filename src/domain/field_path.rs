//! Dotted path queries into JSON message payloads.
//!
//! The grammar follows the gjson conventions so existing pipeline configs keep
//! their meaning:
//!
//! - `.` separates segments, `\` escapes the next character (`a\.b` is the
//!   key `a.b`)
//! - on objects a segment names a key; `*` and `?` turn it into a wildcard
//!   matching the first key in document order
//! - on arrays a segment is a decimal index; a trailing `#` yields the array
//!   length, and `#` followed by more segments maps the remaining path over
//!   every element
//!
//! Extraction never fails. A payload that is not JSON, or a path that does not
//! resolve, yields an empty string.
//!
//! # Example
//! ```
//! use stream_dedup::FieldPath;
//!
//! let path = FieldPath::parse("sender.identity");
//! let payload = br#"{"sender": {"identity": "node1.example.net"}}"#;
//! assert_eq!(path.extract(payload), "node1.example.net");
//!
//! let missing = FieldPath::parse("sender.certname");
//! assert_eq!(missing.extract(payload), "");
//! ```

use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Pattern(Vec<Token>),
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyRun,
    Hash,
}

impl Segment {
    fn from_tokens(tokens: Vec<Token>) -> Self {
        if tokens == [Token::Hash] {
            return Segment::Count;
        }

        let tokens: Vec<Token> = tokens
            .into_iter()
            .map(|t| match t {
                Token::Hash => Token::Literal('#'),
                other => other,
            })
            .collect();

        if tokens
            .iter()
            .any(|t| matches!(t, Token::AnyOne | Token::AnyRun))
        {
            return Segment::Pattern(tokens);
        }

        let key = tokens
            .into_iter()
            .filter_map(|t| match t {
                Token::Literal(c) => Some(c),
                _ => None,
            })
            .collect();
        Segment::Key(key)
    }
}

impl FieldPath {
    /// Parse a path expression. Parsing is total: every string is a path.
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut tokens = Vec::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        tokens.push(Token::Literal(escaped));
                    }
                }
                '.' => segments.push(Segment::from_tokens(std::mem::take(&mut tokens))),
                '*' => tokens.push(Token::AnyRun),
                '?' => tokens.push(Token::AnyOne),
                '#' => tokens.push(Token::Hash),
                other => tokens.push(Token::Literal(other)),
            }
        }
        segments.push(Segment::from_tokens(tokens));

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// The path as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if the path is the empty string.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Extract the value at this path from a JSON payload as a string.
    ///
    /// Strings are returned verbatim and booleans as their JSON text. Integer
    /// literals keep every digit; other numbers are written as the shortest
    /// plain decimal (`1.0` gives `1`, `1e2` gives `100`). Objects and arrays
    /// come back as compact JSON. `null`, a missing path, or a payload that is
    /// not valid JSON all yield `""`.
    pub fn extract(&self, payload: &[u8]) -> String {
        let Ok(document) = serde_json::from_slice::<Value>(payload) else {
            return String::new();
        };

        resolve(&document, &self.segments)
            .map(|value| stringify(&value))
            .unwrap_or_default()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn resolve<'a>(value: &'a Value, segments: &[Segment]) -> Option<Cow<'a, Value>> {
    let Some((segment, rest)) = segments.split_first() else {
        return Some(Cow::Borrowed(value));
    };

    match (value, segment) {
        (Value::Array(items), Segment::Count) if rest.is_empty() => {
            Some(Cow::Owned(Value::from(items.len())))
        }
        (Value::Array(items), Segment::Count) => {
            let matches = items
                .iter()
                .filter_map(|item| resolve(item, rest))
                .map(Cow::into_owned)
                .collect();
            Some(Cow::Owned(Value::Array(matches)))
        }
        (Value::Array(items), Segment::Key(key)) => parse_index(key)
            .and_then(|index| items.get(index))
            .and_then(|item| resolve(item, rest)),
        (Value::Object(map), Segment::Key(key)) => {
            map.get(key).and_then(|child| resolve(child, rest))
        }
        (Value::Object(map), Segment::Count) => {
            map.get("#").and_then(|child| resolve(child, rest))
        }
        (Value::Object(map), Segment::Pattern(pattern)) => map
            .iter()
            .find(|(key, _)| glob_match(pattern, key))
            .and_then(|(_, child)| resolve(child, rest)),
        _ => None,
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(&n.to_string()),
        other => other.to_string(),
    }
}

// Integer literals keep their exact text. Anything with a fraction or an
// exponent becomes the shortest plain decimal, so `1.0` and `1e0` both read
// as `1`.
fn format_number(raw: &str) -> String {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    raw.parse::<f64>()
        .map_or_else(|_| raw.to_string(), |float| float.to_string())
}

/// Wildcard match with single-star backtracking.
fn glob_match(pattern: &[Token], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(Token::AnyRun) => {
                star = Some((p, t));
                p += 1;
            }
            Some(Token::AnyOne) => {
                p += 1;
                t += 1;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|token| matches!(token, Token::AnyRun))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &[u8] = br#"{
        "name": {"first": "Tom", "last": "Anderson"},
        "age": 37,
        "active": true,
        "nothing": null,
        "children": ["Sara", "Alex", "Jack"],
        "fav.movie": "Deer Hunter",
        "friends": [
            {"first": "Dale", "last": "Murphy", "age": 44},
            {"first": "Roger", "last": "Craig", "age": 68},
            {"first": "Jane", "last": "Murphy", "age": 47}
        ]
    }"#;

    fn get(path: &str) -> String {
        FieldPath::parse(path).extract(DOC)
    }

    #[test]
    fn test_nested_keys() {
        assert_eq!(get("name.last"), "Anderson");
        assert_eq!(get("name.middle"), "");
    }

    #[test]
    fn test_scalar_stringification() {
        assert_eq!(get("age"), "37");
        assert_eq!(get("active"), "true");
        assert_eq!(get("nothing"), "");
    }

    #[test]
    fn test_large_integers_keep_every_digit() {
        let path = FieldPath::parse("id");
        let a = path.extract(br#"{"id":12345678901234567890123}"#);
        let b = path.extract(br#"{"id":12345678901234567890124}"#);

        assert_eq!(a, "12345678901234567890123");
        assert_eq!(b, "12345678901234567890124");
        assert_eq!(
            path.extract(br#"{"id":-18446744073709551617}"#),
            "-18446744073709551617"
        );
    }

    #[test]
    fn test_float_literals_use_shortest_decimal() {
        let path = FieldPath::parse("n");
        for (literal, expected) in [
            ("1.0", "1"),
            ("1e2", "100"),
            ("1.50", "1.5"),
            ("-0.25", "-0.25"),
            ("2E-3", "0.002"),
            ("-7", "-7"),
        ] {
            let payload = format!(r#"{{"n":{}}}"#, literal);
            assert_eq!(path.extract(payload.as_bytes()), expected, "{}", literal);
        }
    }

    #[test]
    fn test_compound_values_render_as_json() {
        assert_eq!(get("name"), r#"{"first":"Tom","last":"Anderson"}"#);
        assert_eq!(get("children"), r#"["Sara","Alex","Jack"]"#);
    }

    #[test]
    fn test_array_index_and_count() {
        assert_eq!(get("children.1"), "Alex");
        assert_eq!(get("children.9"), "");
        assert_eq!(get("children.#"), "3");
        assert_eq!(get("friends.1.first"), "Roger");
    }

    #[test]
    fn test_count_maps_over_elements() {
        assert_eq!(get("friends.#.first"), r#"["Dale","Roger","Jane"]"#);
        assert_eq!(get("friends.#.age"), "[44,68,47]");
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(get("child*.2"), "Jack");
        assert_eq!(get("c?ildren.0"), "Sara");
        assert_eq!(get("name.l*"), "Anderson");
        assert_eq!(get("zz*"), "");
    }

    #[test]
    fn test_escaped_dot() {
        assert_eq!(get(r"fav\.movie"), "Deer Hunter");
        assert_eq!(get("fav.movie"), "");
    }

    #[test]
    fn test_non_index_segment_on_array() {
        assert_eq!(get("children.first"), "");
        assert_eq!(get("children.+1"), "");
    }

    #[test]
    fn test_malformed_payload_yields_empty() {
        let path = FieldPath::parse("id");
        assert_eq!(path.extract(b"not json"), "");
        assert_eq!(path.extract(b""), "");
        assert_eq!(path.extract(br#"{"id": "#), "");
    }

    #[test]
    fn test_path_through_scalar_yields_empty() {
        assert_eq!(get("age.years"), "");
    }

    #[test]
    fn test_display_round_trips_raw() {
        let path = FieldPath::parse(r"a\.b.*");
        assert_eq!(path.to_string(), r"a\.b.*");
        assert!(!path.is_empty());
        assert!(FieldPath::parse("").is_empty());
    }

    #[test]
    fn test_glob_match() {
        let pattern = match FieldPath::parse("a*c?").segments.remove(0) {
            Segment::Pattern(p) => p,
            other => panic!("expected pattern, got {:?}", other),
        };
        assert!(glob_match(&pattern, "abcd"));
        assert!(glob_match(&pattern, "acx"));
        assert!(glob_match(&pattern, "abbbbcx"));
        assert!(!glob_match(&pattern, "ac"));
        assert!(!glob_match(&pattern, "bcd"));
    }
}
