//! Printed page labels
//!
//! Reads the `/PageLabels` number tree from the document catalog and
//! computes the label of every page: decimal, roman or alphabetic numbering
//! with an optional prefix and start value. Documents without the tree have
//! no labels at all.

use lopdf::{Dictionary, Document, Object};

/// Number trees deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 32;

/// Largest accepted `/St` value
const MAX_START: i64 = 1_000_000_000;

/// Roman and letter labels grow with the number; above this they are
/// printed as decimals
const MAX_SYMBOLIC: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Decimal,
    UpperRoman,
    LowerRoman,
    UpperAlpha,
    LowerAlpha,
}

/// One entry of the number tree: labels for pages from `start` onwards
#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelRange {
    start: usize,
    style: Option<Style>,
    prefix: String,
    first: i64,
}

impl LabelRange {
    fn from_dict(doc: &Document, start: usize, dict: &Dictionary) -> Self {
        let style = match dict.get(b"S").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Name(name)) => match name.as_slice() {
                b"D" => Some(Style::Decimal),
                b"R" => Some(Style::UpperRoman),
                b"r" => Some(Style::LowerRoman),
                b"A" => Some(Style::UpperAlpha),
                b"a" => Some(Style::LowerAlpha),
                _ => None,
            },
            _ => None,
        };

        let prefix = match dict.get(b"P").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::String(bytes, _)) => decode_text_string(bytes),
            _ => String::new(),
        };

        let first = dict
            .get(b"St")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_i64().ok())
            .filter(|n| *n >= 1)
            .map(|n| n.min(MAX_START))
            .unwrap_or(1);

        Self { start, style, prefix, first }
    }

    fn label(&self, page_index: usize) -> String {
        let offset = i64::try_from(page_index - self.start).unwrap_or(i64::MAX);
        let n = self.first.saturating_add(offset);
        let number = match self.style {
            None => String::new(),
            Some(Style::Decimal) => n.to_string(),
            Some(_) if n > MAX_SYMBOLIC => n.to_string(),
            Some(Style::UpperRoman) => roman(n),
            Some(Style::LowerRoman) => roman(n).to_lowercase(),
            Some(Style::UpperAlpha) => alpha(n),
            Some(Style::LowerAlpha) => alpha(n).to_lowercase(),
        };
        format!("{}{}", self.prefix, number)
    }
}

/// Label of every page in document order; `None` where the document
/// defines no label
pub fn page_labels(doc: &Document, page_count: usize) -> Vec<Option<String>> {
    let mut ranges = label_ranges(doc);
    ranges.sort_by_key(|r| r.start);

    (0..page_count)
        .map(|index| {
            ranges
                .iter()
                .rev()
                .find(|r| r.start <= index)
                .map(|r| r.label(index))
        })
        .collect()
}

fn label_ranges(doc: &Document) -> Vec<LabelRange> {
    let mut ranges = Vec::new();

    let root = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok());
    let tree = root
        .and_then(|catalog| catalog.get(b"PageLabels").ok())
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok());

    if let Some(tree) = tree {
        collect_ranges(doc, tree, &mut ranges, 0);
    }
    ranges
}

fn collect_ranges(doc: &Document, node: &Dictionary, out: &mut Vec<LabelRange>, depth: usize) {
    if depth > MAX_TREE_DEPTH {
        return;
    }

    if let Some(Object::Array(items)) = node.get(b"Nums").ok().and_then(|o| resolve(doc, o)) {
        for pair in items.chunks(2) {
            let [key, value] = pair else { continue };
            let start = resolve(doc, key).and_then(|k| k.as_i64().ok());
            let dict = resolve(doc, value).and_then(|v| v.as_dict().ok());
            if let (Some(start), Some(dict)) = (start, dict) {
                if let Ok(start) = usize::try_from(start) {
                    out.push(LabelRange::from_dict(doc, start, dict));
                }
            }
        }
    }

    if let Some(Object::Array(kids)) = node.get(b"Kids").ok().and_then(|o| resolve(doc, o)) {
        for kid in kids {
            if let Some(Object::Dictionary(child)) = resolve(doc, kid) {
                collect_ranges(doc, child, out, depth + 1);
            }
        }
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// PDF text strings are either UTF-16BE with a byte order mark or
/// single-byte PDFDocEncoding (treated as Latin-1 here)
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn roman(mut n: i64) -> String {
    const NUMERALS: [(i64, &str); 13] = [
        (1000, "M"), (900, "CM"), (500, "D"), (400, "CD"),
        (100, "C"), (90, "XC"), (50, "L"), (40, "XL"),
        (10, "X"), (9, "IX"), (5, "V"), (4, "IV"), (1, "I"),
    ];

    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// A..Z, then AA..ZZ, then AAA..ZZZ
fn alpha(n: i64) -> String {
    if n < 1 {
        return String::new();
    }
    let letter = (b'A' + ((n - 1) % 26) as u8) as char;
    let repeat = ((n - 1) / 26 + 1) as usize;
    std::iter::repeat(letter).take(repeat).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_roman() {
        assert_eq!(roman(1), "I");
        assert_eq!(roman(4), "IV");
        assert_eq!(roman(14), "XIV");
        assert_eq!(roman(1994), "MCMXCIV");
    }

    #[test]
    fn test_alpha() {
        assert_eq!(alpha(1), "A");
        assert_eq!(alpha(26), "Z");
        assert_eq!(alpha(27), "AA");
        assert_eq!(alpha(53), "AAA");
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(b"A-"), "A-");
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x50, 0x01, 0x61]), "Pš");
    }

    #[test]
    fn test_range_label_with_prefix_and_start() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "S" => "D",
            "P" => Object::string_literal("A-"),
            "St" => 5,
        };
        let range = LabelRange::from_dict(&doc, 3, &dict);
        assert_eq!(range.label(3), "A-5");
        assert_eq!(range.label(4), "A-6");
    }

    #[test]
    fn test_huge_start_stays_small() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! { "S" => "A", "St" => 2_000_000_000i64 };
        let range = LabelRange::from_dict(&doc, 0, &dict);
        assert_eq!(range.label(0), MAX_START.to_string());

        let dict = dictionary! { "S" => "r", "St" => i64::MAX };
        let range = LabelRange::from_dict(&doc, 0, &dict);
        assert!(range.label(usize::MAX).len() <= 20);

        let dict = dictionary! { "S" => "R", "St" => 4999 };
        let range = LabelRange::from_dict(&doc, 0, &dict);
        assert_eq!(range.label(0), "MMMMCMXCIX");
        assert_eq!(range.label(2), "5001");
    }

    #[test]
    fn test_prefix_only_range() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! { "P" => Object::string_literal("Cover") };
        let range = LabelRange::from_dict(&doc, 0, &dict);
        assert_eq!(range.label(0), "Cover");
        assert_eq!(range.label(1), "Cover");
    }

    #[test]
    fn test_no_tree_means_no_labels() {
        let doc = Document::with_version("1.5");
        assert_eq!(page_labels(&doc, 2), vec![None, None]);
    }
}
