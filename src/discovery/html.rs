//! `<link>` extraction from an HTML `<head>`.
//!
//! Uses simple string scanning (no HTML parser dependency). Scanning works on
//! an ASCII-lowercased copy so byte offsets line up with the original text,
//! which is where attribute values are read from.

use super::RawLink;

/// Whether the HTML step applies to this content.
///
/// Declared HTML/XHTML always qualifies. Untyped content qualifies only when
/// it has a `<head>` element.
pub(super) fn should_scan(content_type: Option<&str>, text: &str) -> bool {
    match content_type {
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        }
        None => head_region(&text.to_ascii_lowercase()).is_some(),
    }
}

/// Returns every `<link>` inside `<head>` that carries a `rel` attribute.
pub(super) fn head_links(html: &str) -> Vec<RawLink> {
    let lower = html.to_ascii_lowercase();
    let Some((start, end)) = head_region(&lower) else {
        return Vec::new();
    };

    let mut links = Vec::new();
    let mut search_from = start;

    while search_from < end {
        let Some(found) = lower[search_from..end].find("<link") else {
            break;
        };
        let attrs_start = search_from + found + "<link".len();

        // `<linkfoo>` is a different element
        if !lower[attrs_start..]
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_whitespace() || b == b'/' || b == b'>')
        {
            search_from = attrs_start;
            continue;
        }

        let Some(tag_len) = find_tag_end(&html[attrs_start..]) else {
            break;
        };

        let attrs = parse_attributes(&html[attrs_start..attrs_start + tag_len]);
        let attr = |name: &str| {
            attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| decode_entities(v))
        };

        if let (Some(rel), Some(href)) = (attr("rel"), attr("href")) {
            links.push(RawLink { href, rel });
        }

        search_from = attrs_start + tag_len + 1;
    }

    links
}

/// Byte range of the `<head>` element's content in a lowercased document.
///
/// An unterminated head ends at `<body` or at the end of the document.
fn head_region(lower: &str) -> Option<(usize, usize)> {
    let mut search_from = 0;

    let start = loop {
        let found = lower[search_from..].find("<head")?;
        let after = search_from + found + "<head".len();
        match lower.as_bytes().get(after) {
            // Excludes `<header>` and friends
            Some(b) if b.is_ascii_whitespace() || *b == b'>' => break after,
            None => return None,
            _ => search_from = after,
        }
    };

    let end = lower[start..]
        .find("</head")
        .or_else(|| lower[start..].find("<body"))
        .map(|pos| start + pos)
        .unwrap_or(lower.len());

    Some((start, end))
}

/// Offset of the `>` closing the tag, ignoring any inside quoted values.
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;

    for (i, b) in s.bytes().enumerate() {
        match (quote, b) {
            (None, b'"' | b'\'') => quote = Some(b),
            (Some(q), _) if q == b => quote = None,
            (None, b'>') => return Some(i),
            _ => {}
        }
    }

    None
}

/// Parses `name="value" name='value' name=value name` into lowercased-name pairs.
fn parse_attributes(s: &str) -> Vec<(String, String)> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut attrs = Vec::new();
    let mut i = 0;

    let skip_ws = |mut i: usize| {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    while i < len {
        while i < len && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= len {
            break;
        }

        let name_start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' && bytes[i] != b'/'
        {
            i += 1;
        }
        let name = s[name_start..i].to_ascii_lowercase();
        i = skip_ws(i);

        if i < len && bytes[i] == b'=' {
            i = skip_ws(i + 1);
            let value = if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                let value_start = i + 1;
                i = value_start;
                while i < len && bytes[i] != quote {
                    i += 1;
                }
                let value = &s[value_start..i];
                i = (i + 1).min(len);
                value
            } else {
                let value_start = i;
                while i < len && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                &s[value_start..i]
            };
            attrs.push((name, value.to_owned()));
        } else if !name.is_empty() {
            attrs.push((name, String::new()));
        }
    }

    attrs
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.trim().to_owned();
    }
    value
        .trim()
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
