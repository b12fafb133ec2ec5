//! XML/HTML reading helpers shared by title and link extraction.

use quick_xml::Reader;

/// Create a lenient reader: no end-name or well-formedness checks, so
/// converter HTML with unclosed void elements (`<br>`) reads fine.
#[inline]
pub fn create_xml_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader
}

/// Resolve an entity reference name (`amp`, `#39`, `#x27`) to its text.
///
/// Unknown named entities are kept verbatim as `&name;`.
pub fn decode_entity(name: &str) -> String {
    let numeric = name
        .strip_prefix("#x")
        .or_else(|| name.strip_prefix("#X"))
        .map(|hex| u32::from_str_radix(hex, 16))
        .or_else(|| name.strip_prefix('#').map(str::parse::<u32>));

    if let Some(code) = numeric {
        return code
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| format!("&{name};"), String::from);
    }

    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        _ => return format!("&{name};"),
    }
    .to_owned()
}
