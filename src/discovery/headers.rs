//! HTTP `Link` header parsing (RFC 8288 subset).
//!
//! Only the target URI and the `rel` parameter are kept. Other parameters
//! (`type`, `title`, ...) are skipped.

use super::RawLink;
use reqwest::header::{HeaderMap, LINK};

/// Collects links from every `Link` header line, in order.
pub(super) fn links_from_headers(headers: &HeaderMap) -> Vec<RawLink> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_link_header)
        .map(|(href, rel)| RawLink { href, rel })
        .collect()
}

/// Parses one `Link` header value into `(href, rel)` pairs.
///
/// Comma-separated links are all returned. Links without a `rel` parameter
/// are dropped, as are malformed entries (missing `<...>`).
///
/// ```
/// use websub_subscriber::discovery::parse_link_header;
///
/// let links = parse_link_header(r#"<https://hub.example.com/>; rel="hub", </feed>; rel=self"#);
/// assert_eq!(links, vec![
///     ("https://hub.example.com/".to_owned(), "hub".to_owned()),
///     ("/feed".to_owned(), "self".to_owned()),
/// ]);
/// ```
pub fn parse_link_header(value: &str) -> Vec<(String, String)> {
    let mut links = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }

        let Some(after_open) = rest.strip_prefix('<') else {
            // Not a link-value; skip to the next top-level comma
            rest = split_at_unquoted(rest, ',').1;
            continue;
        };

        let Some(close) = after_open.find('>') else {
            break;
        };

        let href = after_open[..close].trim();
        let (params, remainder) = split_at_unquoted(&after_open[close + 1..], ',');
        rest = remainder;

        if href.is_empty() {
            continue;
        }

        if let Some(rel) = rel_param(params) {
            links.push((href.to_owned(), rel));
        }
    }

    links
}

/// Finds the `rel` parameter in a `; name=value; ...` list.
fn rel_param(params: &str) -> Option<String> {
    let mut rest = params;

    while !rest.is_empty() {
        let (param, remainder) = split_at_unquoted(rest, ';');
        rest = remainder;

        let Some((name, value)) = param.split_once('=') else {
            continue;
        };

        if name.trim().eq_ignore_ascii_case("rel") {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            return Some(value.trim().to_owned());
        }
    }

    None
}

/// Splits at the first `sep` outside double quotes. The separator is dropped.
fn split_at_unquoted(s: &str, sep: char) -> (&str, &str) {
    let mut in_quotes = false;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => return (&s[..i], &s[i + c.len_utf8()..]),
            _ => {}
        }
    }

    (s, "")
}
