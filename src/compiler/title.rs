//! Title fallback: the text of the first `<h1>` in a produced page.
//!
//! Elements are visited in document order, which is a pre-order walk of the
//! element tree, so the first `<h1>` start tag is the first match. Its text
//! is every text node beneath it, with whitespace collapsed.

use crate::utils::xml::{create_xml_reader, decode_entity};
use quick_xml::events::Event;
use std::{fs, path::Path};

const HEADING: &[u8] = b"h1";

/// Title from the first level-1 heading of `html`, if it has any text.
pub fn first_heading(html: &str) -> Option<String> {
    let mut reader = create_xml_reader(html.as_bytes());
    let mut text: Option<String> = None;
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().ok()?;

        let Some(buf) = text.as_mut() else {
            match event {
                Event::Start(e) if is_heading(e.name().as_ref()) => text = Some(String::new()),
                Event::Eof => return None,
                _ => {}
            }
            continue;
        };

        match event {
            Event::Start(e) if is_heading(e.name().as_ref()) => depth += 1,
            Event::Text(e) => buf.push_str(&String::from_utf8_lossy(&e)),
            Event::CData(e) => buf.push_str(&String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => buf.push_str(&decode_entity(&String::from_utf8_lossy(&e))),
            Event::End(e) if is_heading(e.name().as_ref()) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let title = collapse_whitespace(&text?);
    (!title.is_empty()).then_some(title)
}

#[inline]
fn is_heading(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(HEADING)
}

/// Read `path` and extract its first heading.
pub fn title_from_file(path: &Path) -> Option<String> {
    let html = fs::read_to_string(path).ok()?;
    first_heading(&html)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_heading() {
        let html = r#"<h1 id="hello">Hello</h1><p>text</p>"#;
        assert_eq!(first_heading(html).as_deref(), Some("Hello"));
    }

    #[test]
    fn test_first_heading_wins() {
        let html = "<h2>Sub</h2><h1>First</h1><div><h1>Second</h1></div>";
        assert_eq!(first_heading(html).as_deref(), Some("First"));
    }

    #[test]
    fn test_nested_heading_preorder() {
        let html = "<main><section><h1>Deep</h1></section></main><h1>Later</h1>";
        assert_eq!(first_heading(html).as_deref(), Some("Deep"));
    }

    #[test]
    fn test_inline_markup_and_entities() {
        let html = "<h1><em>Fish</em> &amp;\n   Chips</h1>";
        assert_eq!(first_heading(html).as_deref(), Some("Fish & Chips"));
    }

    #[test]
    fn test_uppercase_tag() {
        assert_eq!(first_heading("<H1>Loud</H1>").as_deref(), Some("Loud"));
    }

    #[test]
    fn test_void_elements_before_heading() {
        let html = r#"<p>a<br>b</p><img src="x.png"><h1>After</h1>"#;
        assert_eq!(first_heading(html).as_deref(), Some("After"));
    }

    #[test]
    fn test_no_heading() {
        assert_eq!(first_heading("<h2>Only sub</h2><p>x</p>"), None);
        assert_eq!(first_heading(""), None);
    }

    #[test]
    fn test_empty_heading() {
        assert_eq!(first_heading("<h1>  </h1><h1>Next</h1>"), None);
    }

    #[test]
    fn test_title_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "<h1>On disk</h1>").unwrap();

        assert_eq!(title_from_file(&path).as_deref(), Some("On disk"));
        assert_eq!(title_from_file(&dir.path().join("missing.html")), None);
    }
}
