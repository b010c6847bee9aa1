//! Atom feed parsing for arXiv API responses

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::paper::Paper;

/// Raw fields of one `<entry>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomEntry {
    pub id_url: String,
    pub title: String,
    pub summary: String,
    pub published: String,
    pub authors: Vec<String>,
    pub primary_category: String,
    pub pdf_url: Option<String>,
}

impl AtomEntry {
    /// `http://arxiv.org/abs/2401.00001v1` -> `2401.00001v1`
    pub fn short_id(&self) -> String {
        self.id_url
            .trim()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.published.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn into_paper(self) -> Paper {
        let id = self.short_id();
        let published = self
            .published_at()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
            .unwrap_or_else(|| self.published.clone());
        let pdf_url = self
            .pdf_url
            .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}", id));
        Paper {
            id,
            title: self.title,
            authors: self.authors,
            summary: self.summary,
            published,
            pdf_url,
            primary_category: self.primary_category,
        }
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Local part of a possibly prefixed tag name (`arxiv:primary_category`)
fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.to_string(),
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

#[derive(Default)]
struct Cur {
    entry: AtomEntry,
    in_entry: bool,
    in_author: bool,
    text: String,
}

impl Cur {
    /// Attribute-carrying elements, which arXiv emits as empty tags
    fn open(&mut self, name: &str, e: &BytesStart<'_>) {
        if !self.in_entry {
            return;
        }
        match name {
            "author" => self.in_author = true,
            "primary_category" => {
                if let Some(term) = attr(e, "term") {
                    self.entry.primary_category = term;
                }
            }
            "link" => {
                let href = attr(e, "href");
                let is_pdf = attr(e, "title").as_deref() == Some("pdf")
                    || (attr(e, "rel").as_deref() == Some("related")
                        && attr(e, "type").as_deref() == Some("application/pdf"));
                if is_pdf && href.is_some() && self.entry.pdf_url.is_none() {
                    self.entry.pdf_url = href;
                }
            }
            _ => {}
        }
    }
}

/// Parse every `<entry>` of an arXiv Atom feed
pub fn parse_feed(body: &str) -> Result<Vec<AtomEntry>> {
    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut cur = Cur::default();
    let mut entries = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "entry" {
                    cur = Cur {
                        in_entry: true,
                        ..Default::default()
                    };
                } else {
                    cur.open(&name, &e);
                }
                cur.text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.name().as_ref());
                cur.open(&name, &e);
            }
            Ok(Event::Text(t)) => {
                if cur.in_entry {
                    let txt = t
                        .unescape()
                        .map_err(|e| Error::Feed(e.to_string()))?;
                    cur.text.push_str(&txt);
                }
            }
            Ok(Event::CData(t)) => {
                if cur.in_entry {
                    cur.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => {
                if !cur.in_entry {
                    buf.clear();
                    continue;
                }
                let name = local_name(e.name().as_ref());
                let txt = normalize_ws(&cur.text);
                match name.as_str() {
                    "id" => cur.entry.id_url = txt,
                    "title" => cur.entry.title = txt,
                    "summary" => cur.entry.summary = txt,
                    "published" => cur.entry.published = txt,
                    "name" if cur.in_author && !txt.is_empty() => cur.entry.authors.push(txt),
                    "author" => cur.in_author = false,
                    "entry" => {
                        cur.in_entry = false;
                        entries.push(std::mem::take(&mut cur.entry));
                    }
                    _ => {}
                }
                cur.text.clear();
            }
            Err(e) => {
                return Err(Error::Feed(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:rlhf</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v2</id>
    <updated>2024-02-01T00:00:00Z</updated>
    <published>2024-01-05T18:30:00Z</published>
    <title>Reward Models:
      A Survey &amp; Outlook</title>
    <summary>  We survey
      reward models.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2401.00001v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.00001v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/math/0101001v1</id>
    <published>2001-01-01T00:00:00Z</published>
    <title>Old Math</title>
    <summary>Numbers.</summary>
    <author><name>Emmy Noether</name></author>
    <arxiv:primary_category term="math.AG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_entries() {
        let entries = parse_feed(FEED).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.short_id(), "2401.00001v2");
        assert_eq!(first.title, "Reward Models: A Survey & Outlook");
        assert_eq!(first.summary, "We survey reward models.");
        assert_eq!(first.authors, ["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.primary_category, "cs.LG");
        assert_eq!(first.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2401.00001v2"));
    }

    #[test]
    fn test_into_paper_renders_utc_and_falls_back_pdf() {
        let papers: Vec<Paper> = parse_feed(FEED)
            .unwrap()
            .into_iter()
            .map(AtomEntry::into_paper)
            .collect();
        assert_eq!(papers[0].published, "2024-01-05T18:30:00+00:00");
        assert_eq!(papers[1].id, "0101001v1");
        assert_eq!(papers[1].pdf_url, "https://arxiv.org/pdf/0101001v1");
    }

    #[test]
    fn test_feed_title_is_not_an_entry_title() {
        let entries = parse_feed(FEED).unwrap();
        assert!(entries.iter().all(|e| !e.title.starts_with("ArXiv Query")));
    }

    #[test]
    fn test_empty_feed() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>none</title></feed>"#;
        assert!(parse_feed(body).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        let body = "<feed><entry><title>oops</entry></feed>";
        assert!(matches!(parse_feed(body), Err(Error::Feed(_))));
    }
}
