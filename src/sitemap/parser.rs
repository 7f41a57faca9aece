//! Sitemap XML parsing
//!
//! Accepts both root shapes the sitemap protocol defines without the
//! caller needing to know which it has:
//!
//! - `<sitemapindex><sitemap><loc>…` yields child sitemap URLs
//! - `<urlset><url><loc>…` yields page URLs
//!
//! A `<sitemap>` element inside a urlset is still treated as a child.
//! Parsing is best-effort: malformed XML yields whatever parsed cleanly
//! before the error, with no error surfaced.

use quick_xml::events::Event;
use quick_xml::Reader;

/// URLs extracted from one sitemap payload
#[derive(Debug, Default, Clone)]
pub struct SitemapPayload {
    /// Child sitemaps to recurse into
    pub children: Vec<String>,

    /// Page URLs to warm
    pub pages: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Entry {
    None,
    Child,
    Page,
}

/// Parses sitemap XML into child-sitemap and page URL lists
///
/// `<loc>` values are whitespace-trimmed; empty values are dropped.
pub fn parse_sitemap(data: &[u8]) -> SitemapPayload {
    let text = String::from_utf8_lossy(data);
    let mut reader = Reader::from_str(&text);

    let mut payload = SitemapPayload::default();
    let mut entry = Entry::None;
    let mut in_loc = false;
    let mut loc_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemap" => entry = Entry::Child,
                b"url" => entry = Entry::Page,
                b"loc" => {
                    in_loc = true;
                    loc_text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(unescaped) = t.unescape() {
                    loc_text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(t)) if in_loc => {
                loc_text.push_str(&String::from_utf8_lossy(&t));
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"loc" => {
                    in_loc = false;
                    let loc = loc_text.trim();
                    if !loc.is_empty() {
                        match entry {
                            Entry::Child => payload.children.push(loc.to_string()),
                            Entry::Page => payload.pages.push(loc.to_string()),
                            Entry::None => {}
                        }
                    }
                }
                b"sitemap" | b"url" => entry = Entry::None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            // Best-effort: keep whatever parsed cleanly before the error
            Err(_) => break,
            Ok(_) => {}
        }
    }

    payload
}
