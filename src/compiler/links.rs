//! URL extraction from link files.
//!
//! - `.webloc`: macOS property list, `<dict><key>URL</key><string>..</string></dict>`
//! - `.lnk`: Windows shell link; a 76-byte header whose class id must be
//!   `00021401-0000-0000-C000-000000000046`, followed by data in which the
//!   target URL is introduced by a `URL` marker
//!
//! Extracted URLs are only logged by the build today.

use crate::utils::xml::{create_xml_reader, decode_entity};
use quick_xml::events::Event;
use std::{fs, io, path::Path};
use thiserror::Error;

/// Size of a shell link header, also its first little-endian `u32`.
const SHELL_LINK_HEADER_SIZE: usize = 0x4C;

/// `00021401-0000-0000-C000-000000000046` in on-disk byte order.
const SHELL_LINK_CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const URL_MARKER: &[u8] = b"URL";
const URL_MARKER_WIDE: &[u8] = b"U\0R\0L\0";

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to read `{0}`")]
    Io(String, #[source] io::Error),

    #[error("malformed property list")]
    Xml(#[from] quick_xml::Error),

    #[error("not a Windows shortcut file")]
    NotAShortcut,

    #[error("no URL found")]
    NoUrl,
}

/// Read a `.webloc` file and return its URL.
pub fn extract_webloc(path: &Path) -> Result<String, LinkError> {
    parse_webloc(&read(path)?)
}

/// Read a `.lnk` file and return its URL.
pub fn extract_shortcut(path: &Path) -> Result<String, LinkError> {
    parse_shortcut(&read(path)?)
}

fn read(path: &Path) -> Result<Vec<u8>, LinkError> {
    fs::read(path).map_err(|e| LinkError::Io(path.display().to_string(), e))
}

/// URL from a property list: the `<string>` right after `<key>URL</key>`.
pub fn parse_webloc(content: &[u8]) -> Result<String, LinkError> {
    let mut reader = create_xml_reader(content);
    let mut text = String::new();
    let mut after_url_key = false;

    loop {
        match reader.read_event()? {
            Event::Start(_) => text.clear(),
            Event::Text(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => text.push_str(&decode_entity(&String::from_utf8_lossy(&e))),
            Event::End(e) => {
                match e.name().as_ref() {
                    b"key" => after_url_key = text.trim() == "URL",
                    b"string" if after_url_key => {
                        let url = text.trim();
                        return if url.is_empty() {
                            Err(LinkError::NoUrl)
                        } else {
                            Ok(url.to_owned())
                        };
                    }
                    _ => after_url_key = false,
                }
                text.clear();
            }
            Event::Eof => return Err(LinkError::NoUrl),
            _ => {}
        }
    }
}

/// URL from a shell link: the text after the first `URL` marker following
/// the header, up to the first NUL or line break.
pub fn parse_shortcut(content: &[u8]) -> Result<String, LinkError> {
    let header = content
        .get(..SHELL_LINK_HEADER_SIZE)
        .ok_or(LinkError::NotAShortcut)?;

    let header_size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if header_size as usize != SHELL_LINK_HEADER_SIZE || header[4..20] != SHELL_LINK_CLSID {
        return Err(LinkError::NotAShortcut);
    }

    let data = &content[SHELL_LINK_HEADER_SIZE..];

    let narrow = find(data, URL_MARKER).map(|i| (i, narrow_url(data, i)));
    let wide = find(data, URL_MARKER_WIDE).map(|i| (i, wide_url(data, i)));

    // Whichever marker comes first in the file
    let url = match (narrow, wide) {
        (Some((a, url_a)), Some((b, url_b))) => if a <= b { url_a } else { url_b },
        (Some((_, url)), None) | (None, Some((_, url))) => url,
        (None, None) => return Err(LinkError::NoUrl),
    };

    let url = url.trim().to_owned();
    if url.is_empty() {
        return Err(LinkError::NoUrl);
    }
    Ok(url)
}

/// Skip the marker and one separator byte (`URL=`, `URL\0`).
fn narrow_url(data: &[u8], marker: usize) -> String {
    let start = (marker + URL_MARKER.len() + 1).min(data.len());
    let rest = &data[start..];
    let end = rest
        .iter()
        .position(|&b| matches!(b, 0 | b'\r' | b'\n'))
        .unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// UTF-16LE variant: skip the marker and one separator code unit.
fn wide_url(data: &[u8], marker: usize) -> String {
    let start = (marker + URL_MARKER_WIDE.len() + 2).min(data.len());
    let units: Vec<u16> = data[start..]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| !matches!(unit, 0 | 0x0D | 0x0A))
        .collect();
    String::from_utf16_lossy(&units)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
