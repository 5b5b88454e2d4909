//! Entity escaping for character data and attribute values.
//!
//! Character data only needs `<`, `>` and `&` replaced; attribute values are
//! always written double-quoted, so `"` is escaped as well. Unescaping
//! understands the five predefined entities and numeric character
//! references.

use std::borrow::Cow;

use memchr::{memchr, memchr3};

use crate::error::{Error, Result};

/// Escapes character data.
///
/// Borrows the input when nothing has to be replaced.
#[inline]
pub fn escape_text(s: &str) -> Cow<'_, str> {
    if memchr3(b'<', b'>', b'&', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    escape_into(s, &mut out, false);
    Cow::Owned(out)
}

/// Escapes a double-quoted attribute value.
#[inline]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if memchr3(b'<', b'>', b'&', bytes).is_none() && memchr(b'"', bytes).is_none() {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    escape_into(s, &mut out, true);
    Cow::Owned(out)
}

fn escape_into(s: &str, out: &mut String, quotes: bool) {
    let mut start = 0;
    for (i, byte) in s.bytes().enumerate() {
        let entity = match byte {
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'&' => "&amp;",
            b'"' if quotes => "&quot;",
            _ => continue,
        };
        // Replaced bytes are ASCII, so both slice ends fall on char boundaries.
        out.push_str(&s[start..i]);
        out.push_str(entity);
        start = i + 1;
    }
    out.push_str(&s[start..]);
}

/// Replaces entity and character references with the characters they denote.
///
/// Borrows the input when it contains no `&`.
pub fn unescape(s: &str) -> Result<Cow<'_, str>> {
    let Some(first) = memchr(b'&', s.as_bytes()) else {
        return Ok(Cow::Borrowed(s));
    };

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut rest = &s[first..];

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let end = match after.find(';') {
            Some(end) if end > 0 => end,
            _ => return Err(Error::invalid_escape(truncate(&rest[amp..]))),
        };
        let entity = &after[..end];
        match decode_entity(entity).or_else(|| decode_numeric(entity)) {
            Some(c) => out.push(c),
            None => return Err(Error::invalid_escape(format!("&{};", entity))),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}

fn truncate(s: &str) -> String {
    s.chars().take(12).collect()
}

#[inline]
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Decodes `#NNN` or `#xHHH`.
fn decode_numeric(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}
