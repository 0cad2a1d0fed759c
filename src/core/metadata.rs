//! Ordered string metadata attached to objects, properties and archives.

use smallvec::SmallVec;
use std::fmt;

/// Ordered key/value string pairs.
///
/// Insertion order is preserved and is part of the serialized form, so two
/// maps with the same pairs in a different order serialize differently.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 4]>,
}

impl MetaData {
    pub const SCHEMA_KEY: &'static str = "schema";
    pub const SCHEMA_BASE_KEY: &'static str = "schemaBaseType";
    pub const INTERPRETATION_KEY: &'static str = "interpretation";

    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite in place, keeping the original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert only if `key` is not present yet.
    pub fn set_unique(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value.into()));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append every pair of `other` not already present here.
    pub fn append_unique(&mut self, other: &MetaData) {
        for (k, v) in other.iter() {
            self.set_unique(k, v);
        }
    }

    /// Single-string form: `key=value` tokens joined by `;`.
    /// Backslash, `;` and `=` inside keys or values are escaped.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            escape_into(&mut out, k);
            out.push('=');
            escape_into(&mut out, v);
        }
        out
    }

    /// Inverse of [`serialize`](Self::serialize). Tokens without an
    /// unescaped `=` or with an empty key are skipped.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        for token in split_unescaped(s, ';').filter(|t| !t.is_empty()) {
            let Some(eq) = find_unescaped(token, '=') else {
                continue;
            };
            let key = unescape(&token[..eq]);
            if !key.is_empty() {
                meta.set(key, unescape(&token[eq + 1..]));
            }
        }
        meta
    }

    pub fn schema(&self) -> Option<&str> {
        self.get(Self::SCHEMA_KEY)
    }

    pub fn schema_base(&self) -> Option<&str> {
        self.get(Self::SCHEMA_BASE_KEY)
    }

    pub fn interpretation(&self) -> Option<&str> {
        self.get(Self::INTERPRETATION_KEY)
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn find_unescaped(s: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some(i);
        }
    }
    None
}

/// Split on `sep` where it is not preceded by an escaping backslash.
fn split_unescaped(s: &str, sep: char) -> impl Iterator<Item = &str> {
    let mut rest = Some(s);
    std::iter::from_fn(move || {
        let current = rest?;
        match find_unescaped(current, sep) {
            Some(i) => {
                rest = Some(&current[i + sep.len_utf8()..]);
                Some(&current[..i])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_kept() {
        let mut meta = MetaData::new();
        meta.set("b", "2");
        meta.set("a", "1");
        meta.set("b", "3");
        assert_eq!(meta.serialize(), "b=3;a=1");
    }

    #[test]
    fn test_parse_roundtrip_with_escapes() {
        let meta = MetaData::new()
            .with("schema", "AbcGeom_Xform_v3")
            .with("odd=key", "semi;colon\\slash");
        let text = meta.serialize();
        assert_eq!(text, "schema=AbcGeom_Xform_v3;odd\\=key=semi\\;colon\\\\slash");
        assert_eq!(MetaData::parse(&text), meta);
    }

    #[test]
    fn test_parse_skips_malformed_tokens() {
        let meta = MetaData::parse("novalue;=empty;k=v;;");
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("k"), Some("v"));
        assert!(MetaData::parse("").is_empty());
    }

    #[test]
    fn test_empty_value() {
        let meta = MetaData::parse("k=");
        assert_eq!(meta.get("k"), Some(""));
    }

    #[test]
    fn test_set_unique() {
        let mut meta = MetaData::new().with("a", "1");
        assert!(!meta.set_unique("a", "2"));
        assert!(meta.set_unique("b", "2"));
        assert_eq!(meta.get("a"), Some("1"));
    }
}
