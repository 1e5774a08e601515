//! Text extraction from Office Open XML documents.
//!
//! docx, pptx and xlsx files are zip archives of XML parts. Word and
//! PowerPoint text lives in `<t>` runs grouped into `<p>` paragraphs;
//! spreadsheet cells either hold a value or index the shared string table.

use docbase_core::{AppError, AppResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Office document flavours with a text extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeKind {
    Word,
    Slides,
    Sheet,
}

impl OfficeKind {
    /// Kind for a lowercase file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "docx" => Some(Self::Word),
            "pptx" => Some(Self::Slides),
            "xlsx" => Some(Self::Sheet),
            _ => None,
        }
    }
}

/// Extract the text of an Office document held in memory.
pub fn extract_office_text(kind: OfficeKind, bytes: &[u8]) -> AppResult<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::LoadFailed(format!("Not an Office archive: {}", e)))?;

    match kind {
        OfficeKind::Word => paragraph_text(&read_part(&mut archive, "word/document.xml")?),
        OfficeKind::Slides => {
            let mut slides = Vec::new();
            for name in numbered_parts(&archive, "ppt/slides/slide") {
                slides.push(paragraph_text(&read_part(&mut archive, &name)?)?);
            }
            Ok(slides.join("\n"))
        }
        OfficeKind::Sheet => {
            let shared = match read_optional_part(&mut archive, "xl/sharedStrings.xml")? {
                Some(xml) => shared_strings(&xml)?,
                None => Vec::new(),
            };
            let mut sheets = Vec::new();
            for name in numbered_parts(&archive, "xl/worksheets/sheet") {
                sheets.push(sheet_text(&read_part(&mut archive, &name)?, &shared)?);
            }
            Ok(sheets.join("\n"))
        }
    }
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> AppResult<String> {
    read_optional_part(archive, name)?
        .ok_or_else(|| AppError::LoadFailed(format!("Office archive has no {}", name)))
}

fn read_optional_part(archive: &mut Archive<'_>, name: &str) -> AppResult<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(AppError::LoadFailed(format!("{}: {}", name, e))),
    };

    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| AppError::LoadFailed(format!("{}: {}", name, e)))?;
    Ok(Some(xml))
}

/// Parts named `<prefix><n>.xml`, ordered by `n`.
fn numbered_parts(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix(prefix)?.strip_suffix(".xml")?.parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, name)| name).collect()
}

fn xml_error(e: impl std::fmt::Display) -> AppError {
    AppError::LoadFailed(format!("Malformed Office XML: {}", e))
}

/// Text of `<t>` runs, one line per `<p>` paragraph.
fn paragraph_text(xml: &str) -> AppResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run => out.push_str(&t.unescape().map_err(xml_error)?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim_end().to_string())
}

/// Entries of `xl/sharedStrings.xml`, rich text runs concatenated.
fn shared_strings(xml: &str) -> AppResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Text(t) if in_run => current.push_str(&t.unescape().map_err(xml_error)?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

/// One line per row, cells separated by tabs.
fn sheet_text(xml: &str, shared: &[String]) -> AppResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut shared_ref = false;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    shared_ref = e
                        .attributes()
                        .flatten()
                        .any(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s");
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let text = if shared_ref {
                        value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i).cloned())
                            .unwrap_or_default()
                    } else {
                        value.clone()
                    };
                    if !text.is_empty() {
                        cells.push(text);
                    }
                }
                b"row" => {
                    if !cells.is_empty() {
                        rows.push(cells.join("\t"));
                        cells.clear();
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_value => value.push_str(&t.unescape().map_err(xml_error)?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, xml) in parts {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_word_paragraphs() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
            <w:p><w:r><w:t>Fish &amp; chips</w:t><w:tab/><w:t>2</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let bytes = archive(&[("word/document.xml", xml)]);

        let text = extract_office_text(OfficeKind::Word, &bytes).unwrap();
        assert_eq!(text, "Hello world\nFish & chips\t2");
    }

    #[test]
    fn test_slides_in_numeric_order() {
        let slide = |s: &str| format!(r#"<p:sld xmlns:a="a" xmlns:p="p"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>"#, s);
        let (one, two, ten) = (slide("one"), slide("two"), slide("ten"));
        let bytes = archive(&[
            ("ppt/slides/slide10.xml", ten.as_str()),
            ("ppt/slides/slide2.xml", two.as_str()),
            ("ppt/slides/slide1.xml", one.as_str()),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);

        let text = extract_office_text(OfficeKind::Slides, &bytes).unwrap();
        assert_eq!(text, "one\ntwo\nten");
    }

    #[test]
    fn test_sheet_resolves_shared_strings() {
        let shared = r#"<sst><si><t>name</t></si><si><r><t>Ada </t></r><r><t>Lovelace</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>1815</v></c></row>
            <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2" t="inlineStr"><is><t>inline</t></is></c></row>
            <row r="3"></row>
        </sheetData></worksheet>"#;
        let bytes = archive(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        let text = extract_office_text(OfficeKind::Sheet, &bytes).unwrap();
        assert_eq!(text, "name\t1815\nAda Lovelace\tinline");
    }

    #[test]
    fn test_missing_part_and_bad_archive() {
        let bytes = archive(&[("other.xml", "<x/>")]);
        assert!(matches!(
            extract_office_text(OfficeKind::Word, &bytes),
            Err(AppError::LoadFailed(_))
        ));
        assert!(matches!(
            extract_office_text(OfficeKind::Sheet, b"not a zip"),
            Err(AppError::LoadFailed(_))
        ));
    }
}
