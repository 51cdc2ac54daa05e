//! Name codecs
//!
//! IR object names must not clash with reserved words of the downstream language, so every
//! segment of a dotted or slashed name gets a `j$` prefix. Method names carry their descriptor,
//! form-URL encoded, so that overloads stay distinct.

use crate::xmir::CodecError;
use std::fmt::Write;

const PREFIX: &str = "j$";

/// Prefix every `.` or `/` separated segment with `j$`
///
/// ```
/// # use xmir::xmir::names::prefix;
/// assert_eq!(prefix("org.eolang").unwrap(), "j$org.j$eolang");
/// ```
pub fn prefix(name: &str) -> Result<String, CodecError> {
    if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
        return Err(CodecError::InvalidName(name.to_owned()));
    }
    let mut out = String::from(PREFIX);
    for c in name.chars() {
        out.push(c);
        if c == '.' || c == '/' {
            out.push_str(PREFIX);
        }
    }
    Ok(out)
}

/// Strip the `j$` prefix from every segment that has one
///
/// Segments without the prefix are left alone.
pub fn unprefix(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut start = true;
    let mut rest = name;
    while !rest.is_empty() {
        if start {
            if let Some(stripped) = rest.strip_prefix(PREFIX) {
                rest = stripped;
            }
        }
        let Some(c) = rest.chars().next() else { break };
        out.push(c);
        rest = &rest[c.len_utf8()..];
        start = c == '.' || c == '/';
    }
    out
}

/// Form-URL encode a string
///
/// Letters, digits, `.`, `*`, and `_` pass through, space becomes `+`, and every other byte of
/// the UTF-8 encoding becomes `%XX`.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'*' | b'_' => out.push(byte as char),
            b' ' => out.push('+'),
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

/// Reverse of [`encode`]
pub fn decode(text: &str) -> Result<String, CodecError> {
    let invalid = || CodecError::InvalidEncoding(text.to_owned());
    let mut bytes = Vec::with_capacity(text.len());
    let mut iter = text.bytes();
    while let Some(byte) = iter.next() {
        match byte {
            b'+' => bytes.push(b' '),
            b'%' => {
                let hi = iter.next().and_then(|b| (b as char).to_digit(16));
                let lo = iter.next().and_then(|b| (b as char).to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => bytes.push((hi << 4 | lo) as u8),
                    _ => return Err(invalid()),
                }
            }
            _ => bytes.push(byte),
        }
    }
    String::from_utf8(bytes).map_err(|_| invalid())
}

/// `name-<encoded descriptor>`
pub fn signature(name: &str, descriptor: &str) -> String {
    format!("{}-{}", name, encode(descriptor))
}

/// Split a [`signature`] back into name and descriptor
pub fn split_signature(signature: &str) -> Result<(String, String), CodecError> {
    // The encoded descriptor never contains a raw '-'
    let (name, descriptor) = signature
        .rsplit_once('-')
        .ok_or_else(|| CodecError::InvalidSignature(signature.to_owned()))?;
    Ok((name.to_owned(), decode(descriptor)?))
}

/// Disambiguate the `number`-th use of a name: the first is the bare name, later ones get `-N`
pub fn numbered(name: &str, number: i64) -> Result<String, CodecError> {
    match number {
        n if n < 1 => Err(CodecError::InvalidNumber(n)),
        1 => Ok(name.to_owned()),
        n => Ok(format!("{}-{}", name, n)),
    }
}

/// Reverse of [`numbered`]: split off the number after the last `-`
pub fn unnumbered(name: &str) -> Result<(&str, i64), CodecError> {
    match name.rsplit_once('-') {
        Some((base, suffix)) => match suffix.parse::<i64>() {
            Ok(n) => Ok((base, n)),
            Err(_) => Err(CodecError::InvalidSuffix(suffix.to_owned())),
        },
        None => Ok((name, 1)),
    }
}

/// Replace the special initializer names with identifiers
pub fn method_name(name: &str) -> &str {
    match name {
        "<init>" => "object@init@",
        "<clinit>" => "class@clinit@",
        other => other,
    }
}

/// Reverse of [`method_name`]
pub fn java_method_name(name: &str) -> &str {
    match name {
        "object@init@" => "<init>",
        "class@clinit@" => "<clinit>",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed() {
        assert_eq!(prefix("org.eolang").unwrap(), "j$org.j$eolang");
        assert_eq!(prefix("java/lang/Object").unwrap(), "j$java/j$lang/j$Object");
        assert_eq!(prefix("main").unwrap(), "j$main");
        assert_eq!(unprefix("j$org.j$eolang"), "org.eolang");
        assert_eq!(unprefix("j$a/j$b"), "a/b");
        assert!(prefix(" ").is_err());
        assert!(prefix("a b").is_err());
    }

    #[test]
    fn unprefixed_segments_pass_through() {
        assert_eq!(unprefix("someName"), "someName");
        assert_eq!(unprefix("j$org.eolang"), "org.eolang");
        assert_eq!(unprefix("org/j$eolang"), "org/eolang");
        assert_eq!(unprefix("a.bj$c"), "a.bj$c");
        assert_eq!(unprefix(""), "");
    }

    #[test]
    fn signatures() {
        assert_eq!(signature("foo", "()I"), "foo-%28%29I");
        assert_eq!(
            signature("object@init@", "(Ljava/lang/String;)V"),
            "object@init@-%28Ljava%2Flang%2FString%3B%29V"
        );
        assert_eq!(
            split_signature("foo-%28%29I").unwrap(),
            ("foo".to_owned(), "()I".to_owned())
        );
        assert_eq!(
            split_signature("a-b-%28%29V").unwrap(),
            ("a-b".to_owned(), "()V".to_owned())
        );
        assert!(split_signature("foo").is_err());
        assert!(decode("%2").is_err());
        assert_eq!(decode(&encode("a b-ü")).unwrap(), "a b-ü");
    }

    #[test]
    fn numbers() {
        assert_eq!(numbered("x", 1).unwrap(), "x");
        assert_eq!(numbered("x", 3).unwrap(), "x-3");
        assert_eq!(
            numbered("x", 0).unwrap_err().to_string(),
            "Number must be greater than 0, but was: 0"
        );
        assert_eq!(unnumbered("x-3").unwrap(), ("x", 3));
        assert_eq!(unnumbered("x").unwrap(), ("x", 1));
        assert_eq!(unnumbered("x-1").unwrap(), ("x", 1));
        assert_eq!(unnumbered("foobar-4").unwrap(), ("foobar", 4));
        assert_eq!(
            unnumbered("x-y").unwrap_err().to_string(),
            "Invalid number in name: y"
        );
    }

    #[test]
    fn initializers() {
        assert_eq!(method_name("<init>"), "object@init@");
        assert_eq!(method_name("<clinit>"), "class@clinit@");
        assert_eq!(method_name("run"), "run");
        assert_eq!(java_method_name("object@init@"), "<init>");
        assert_eq!(java_method_name("class@clinit@"), "<clinit>");
    }
}
