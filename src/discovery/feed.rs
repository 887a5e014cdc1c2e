//! Feed-level links from Atom and RSS documents.

use super::RawLink;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Deepest element nesting the RSS scan follows before giving up.
const MAX_XML_DEPTH: usize = 64;

/// Feed-level links with a `rel`, as parsed by feed-rs.
///
/// Entry links are not included. Unparseable documents yield no links.
pub(super) fn atom_links(body: &[u8]) -> Vec<RawLink> {
    match feed_rs::parser::parse(body) {
        Ok(feed) => feed
            .links
            .into_iter()
            .filter_map(|link| link.rel.map(|rel| RawLink { href: link.href, rel }))
            .collect(),
        Err(e) => {
            tracing::trace!(error = %e, "Body is not a parseable feed");
            Vec::new()
        }
    }
}

/// `<link rel=".." href="..">` children of an RSS `<channel>`.
///
/// These are the Atom-namespace extension links (`<atom:link>`); plain RSS
/// `<link>` elements carry text, not attributes, and are ignored.
pub(super) fn rss_channel_links(text: &str) -> Vec<RawLink> {
    // quick-xml (0.37) never expands DOCTYPE entity declarations; attribute
    // values go through `decode_and_unescape_value`, which only knows the
    // five XML builtins.
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if in_channel(&stack) && e.local_name().as_ref() == b"link" {
                    links.extend(link_from_element(&e, &reader));
                }
                stack.push(e.local_name().as_ref().to_vec());
                if stack.len() > MAX_XML_DEPTH {
                    break;
                }
            }
            Ok(Event::Empty(e)) => {
                if in_channel(&stack) && e.local_name().as_ref() == b"link" {
                    links.extend(link_from_element(&e, &reader));
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::trace!(error = %e, "Stopping RSS link scan on malformed XML");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    links
}

fn in_channel(stack: &[Vec<u8>]) -> bool {
    matches!(stack, [rss, channel] if rss == b"rss" && channel == b"channel")
}

fn link_from_element(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Option<RawLink> {
    let mut href = None;
    let mut rel = None;

    for attr in e.attributes().flatten() {
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(value) => value,
            Err(e) => {
                tracing::trace!(error = %e, "Skipping undecodable link attribute");
                continue;
            }
        };
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value.into_owned()),
            b"rel" => rel = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(RawLink {
        href: href?,
        rel: rel?,
    })
}
