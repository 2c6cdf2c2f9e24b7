//! Column 9 attribute parsing and escaping for both GFF dialects.

use crate::error::{ParseError, ParseErrorKind};

use super::GffVersion;

/// Ordered multimap of attribute key/value pairs, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value for any of `keys`, in the order given.
    #[must_use]
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tokenize an attribute column in the given dialect.
pub fn parse_attributes(text: &str, version: GffVersion) -> Result<Attributes, ParseError> {
    match version {
        GffVersion::V3 => parse_v3(text),
        GffVersion::V2 => parse_v2(text),
    }
}

/// `key=value;key=value`, percent-decoded.
fn parse_v3(text: &str) -> Result<Attributes, ParseError> {
    let mut attrs = Attributes::default();
    let text = text.trim();
    if text == "." {
        return Ok(attrs);
    }

    for piece in text.split(';') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let (key, value) = piece.split_once('=').ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::MalformedAttribute,
                format!("attribute missing '=': '{piece}'"),
            )
        })?;
        attrs.push(percent_decode(key.trim())?, percent_decode(value.trim())?);
    }
    Ok(attrs)
}

fn percent_decode(text: &str) -> Result<String, ParseError> {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| {
            ParseError::new(
                ParseErrorKind::MalformedAttribute,
                format!("bad percent-encoding in '{text}': {e}"),
            )
        })
}

/// `key value ; key "quoted value"`, with an unquoted `#` starting a trailing comment.
fn parse_v2(text: &str) -> Result<Attributes, ParseError> {
    let mut attrs = Attributes::default();
    if text.trim() == "." {
        return Ok(attrs);
    }
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quote = false;
    let mut chars = text.chars();

    let flush = |tokens: &mut Vec<String>, attrs: &mut Attributes| {
        let mut iter = tokens.drain(..);
        if let Some(key) = iter.next() {
            let value: Vec<String> = iter.collect();
            attrs.push(key, value.join(" "));
        }
    };

    while let Some(c) = chars.next() {
        if in_quote {
            match c {
                '"' => in_quote = false,
                '\\' => match chars.next() {
                    Some('n') => current.push('\n'),
                    Some('t') => current.push('\t'),
                    Some(other) => current.push(other),
                    None => break,
                },
                _ => current.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                in_quote = true;
                in_token = true;
            }
            '#' => break,
            ';' => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
                flush(&mut tokens, &mut attrs);
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            _ => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quote {
        return Err(ParseError::new(
            ParseErrorKind::MalformedAttribute,
            format!("unterminated quote in attributes: '{text}'"),
        ));
    }
    if in_token {
        tokens.push(current);
    }
    flush(&mut tokens, &mut attrs);
    Ok(attrs)
}

/// Percent-encode the characters that carry meaning in a v3 attribute column.
#[must_use]
pub fn escape_v3(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' | '=' | '&' | ',' | '%' => out.push_str(&format!("%{:02X}", c as u32)),
            c if c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Double-quote a v2 value, backslash-escaping quotes, backslashes and control characters.
#[must_use]
pub fn quote_v2(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_pairs_in_order() {
        let attrs = parse_attributes("ID=tx1;Name=ABC-1 ; Note=first;Note=second", GffVersion::V3).unwrap();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs.get("ID"), Some("tx1"));
        assert_eq!(attrs.get("Name"), Some("ABC-1"));
        let notes: Vec<_> = attrs.get_all("Note").collect();
        assert_eq!(notes, ["first", "second"]);
    }

    #[test]
    fn v3_percent_decoding() {
        let attrs = parse_attributes("Note=100%25 done%3B really%2C%3Dyes", GffVersion::V3).unwrap();
        assert_eq!(attrs.get("Note"), Some("100% done; really,=yes"));
    }

    #[test]
    fn v3_missing_equals_is_malformed() {
        let err = parse_attributes("ID=a;bogus", GffVersion::V3).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MalformedAttribute);
    }

    #[test]
    fn v3_dot_and_trailing_semicolon() {
        assert!(parse_attributes(".", GffVersion::V3).unwrap().is_empty());
        assert_eq!(parse_attributes("ID=a;", GffVersion::V3).unwrap().len(), 1);
    }

    #[test]
    fn v2_quoted_values() {
        let attrs = parse_attributes(
            r#"Sequence "B0250.1" ; Note "say \"hi\"; twice" ; percentID 89.3"#,
            GffVersion::V2,
        )
        .unwrap();
        assert_eq!(attrs.get("Sequence"), Some("B0250.1"));
        assert_eq!(attrs.get("Note"), Some(r#"say "hi"; twice"#));
        assert_eq!(attrs.get("percentID"), Some("89.3"));
    }

    #[test]
    fn v2_multi_token_value() {
        let attrs = parse_attributes(r#"Target "Sequence:AF1234" 1 50 +"#, GffVersion::V2).unwrap();
        assert_eq!(attrs.get("Target"), Some("Sequence:AF1234 1 50 +"));
    }

    #[test]
    fn v2_comment_stripped_outside_quotes() {
        let attrs = parse_attributes(r#"Name "a#b" ; Clone X # trailing comment"#, GffVersion::V2).unwrap();
        assert_eq!(attrs.get("Name"), Some("a#b"));
        assert_eq!(attrs.get("Clone"), Some("X"));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn v2_flag_without_value() {
        let attrs = parse_attributes("end_not_found ; start_not_found 2", GffVersion::V2).unwrap();
        assert_eq!(attrs.get("end_not_found"), Some(""));
        assert_eq!(attrs.get("start_not_found"), Some("2"));
    }

    #[test]
    fn v2_unterminated_quote() {
        let err = parse_attributes(r#"Name "open"#, GffVersion::V2).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MalformedAttribute);
    }

    #[test]
    fn escaping_inverts_parsing() {
        let value = "a;b=c,d%e\tf";
        let v3 = format!("Note={}", escape_v3(value));
        assert_eq!(parse_attributes(&v3, GffVersion::V3).unwrap().get("Note"), Some(value));

        let v2 = format!("Note {}", quote_v2("say \"x\" \\ y"));
        assert_eq!(parse_attributes(&v2, GffVersion::V2).unwrap().get("Note"), Some("say \"x\" \\ y"));
    }
}
