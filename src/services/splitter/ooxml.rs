//! Paragraph extraction from Office Open XML containers (docx, pptx).
//!
//! Both formats keep text in `<*:t>` runs grouped by `<*:p>` paragraphs, so a
//! single reader handles `word/document.xml` and every `ppt/slides/slideN.xml`.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use crate::error::SplitError;

const DOCX_BODY: &str = "word/document.xml";
const SLIDE_PREFIX: &str = "ppt/slides/slide";

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, SplitError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SplitError::ExtractionError(format!("not an OOXML container: {}", e)))
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<String, SplitError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| SplitError::ExtractionError(format!("{}: {}", name, e)))?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Paragraph texts of a docx body, in document order.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, SplitError> {
    let mut archive = open(bytes)?;
    let xml = read_entry(&mut archive, DOCX_BODY)?;
    paragraphs(&xml)
}

/// Paragraph texts of every slide, slides in numeric order.
pub fn pptx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, SplitError> {
    let mut archive = open(bytes)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(SLIDE_PREFIX)?.strip_suffix(".xml")?;
            number.parse().ok().map(|n| (n, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut out = Vec::new();
    for (_, name) in slides {
        let xml = read_entry(&mut archive, &name)?;
        out.extend(paragraphs(&xml)?);
    }
    Ok(out)
}

/// Collect the text runs of each `p` element, ignoring namespace prefixes.
///
/// Paragraphs can nest (a text box inside a paragraph). A nested paragraph is
/// emitted when it closes and the enclosing one keeps collecting its own runs.
fn paragraphs(xml: &str) -> Result<Vec<String>, SplitError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SplitError::ExtractionError(format!("malformed XML: {}", e)))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"p" => {
                    if let Some(paragraph) = open.pop() {
                        out.push(paragraph);
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(current) = open.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| SplitError::ExtractionError(e.to_string()))?;
                    current.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn container(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, body) in entries {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_paragraphs_join_runs() {
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>GDP </w:t></w:r><w:r><w:t>grows</w:t></w:r></w:p>
            <w:p></w:p>
            <w:p><w:r><w:t>A &amp; B</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(paragraphs(xml).unwrap(), vec!["GDP grows", "", "A & B"]);
    }

    #[test]
    fn test_nested_paragraph_keeps_outer_text() {
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p>
                <w:r><w:t>before </w:t></w:r>
                <w:r><w:txbxContent><w:p><w:r><w:t>boxed</w:t></w:r></w:p></w:txbxContent></w:r>
                <w:r><w:t>after</w:t></w:r>
            </w:p>
            <w:p><w:r><w:t>next</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(
            paragraphs(xml).unwrap(),
            vec!["boxed", "before after", "next"]
        );
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = container(&[(
            DOCX_BODY,
            r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>hello</w:t></w:r></w:p></w:body></w:document>"#,
        )]);
        assert_eq!(docx_paragraphs(&bytes).unwrap(), vec!["hello"]);
    }

    #[test]
    fn test_pptx_slides_in_numeric_order() {
        let slide = |text: &str| {
            format!(r#"<p:sld xmlns:p="p" xmlns:a="a"><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:sld>"#)
        };
        let s10 = slide("ten");
        let s2 = slide("two");
        let s1 = slide("one");
        let bytes = container(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);
        assert_eq!(pptx_paragraphs(&bytes).unwrap(), vec!["one", "two", "ten"]);
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            docx_paragraphs(b"plain text"),
            Err(SplitError::ExtractionError(_))
        ));
    }

    #[test]
    fn test_docx_missing_body() {
        let bytes = container(&[("other.xml", "<x/>")]);
        assert!(matches!(
            docx_paragraphs(&bytes),
            Err(SplitError::ExtractionError(_))
        ));
    }
}
