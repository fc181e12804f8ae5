//! OOXML (`.docx`, `.xlsx`) text extraction.
//!
//! Both formats are ZIP packages of XML parts, pull-parsed with
//! `quick-xml`. Word documents yield their `w:t` runs with paragraph
//! breaks preserved; spreadsheets yield every sheet as
//! `"[Sheet: <name>]\n<csv rows>\n\n"` so sheet names survive into the
//! corpus for downstream display.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::Event;

use super::ExtractError;

/// Maximum sheets to process in one workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry
/// (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

fn ooxml_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Like [`read_zip_entry_bounded`], but a missing entry is `None`
/// instead of an error (some packages omit optional parts).
fn read_optional_zip_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, ExtractError> {
    match archive.by_name(name) {
        Ok(entry) => {
            let mut out = Vec::new();
            entry
                .take(max_bytes)
                .read_to_end(&mut out)
                .map_err(ooxml_err)?;
            if out.len() as u64 >= max_bytes {
                return Err(ExtractError::Ooxml(format!(
                    "ZIP entry {} exceeds size limit ({} bytes)",
                    name, max_bytes
                )));
            }
            Ok(Some(out))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ooxml_err(e)),
    }
}

// ── docx ───────────────────────────────────────────────────────────────

pub(crate) fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(ooxml_err)?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_document_text(&doc_xml)
}

/// Collect `w:t` runs, emitting `\n` at paragraph ends and explicit
/// breaks so the chunker has line boundaries to cut on.
fn extract_document_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => out.push('\n'),
                b"tab" => out.push('\t'),
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ── xlsx ───────────────────────────────────────────────────────────────

pub(crate) fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(ooxml_err)?;

    let shared_strings = read_shared_strings(&mut archive)?;
    let rels = read_workbook_rels(&mut archive)?;
    let sheets = read_workbook_sheets(&mut archive)?;

    let mut out = String::new();
    for (idx, sheet) in sheets.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let part = sheet
            .rel_id
            .as_deref()
            .and_then(|rid| rels.get(rid))
            .map(|target| resolve_workbook_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", idx + 1));
        let sheet_xml = read_zip_entry_bounded(&mut archive, &part, MAX_XML_ENTRY_BYTES)?;
        let csv = render_sheet_csv(&sheet_xml, &shared_strings)?;
        out.push_str("[Sheet: ");
        out.push_str(&sheet.name);
        out.push_str("]\n");
        out.push_str(&csv);
        out.push_str("\n\n");
    }
    Ok(out)
}

struct SheetRef {
    name: String,
    rel_id: Option<String>,
}

/// Sheet display names in workbook order, from `xl/workbook.xml`.
fn read_workbook_sheets(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
) -> Result<Vec<SheetRef>, ExtractError> {
    let xml = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let mut sheets = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    let mut name = None;
                    let mut rel_id = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.local_name().as_ref() {
                            b"name" => {
                                name = Some(
                                    attr.unescape_value().map_err(ooxml_err)?.into_owned(),
                                );
                            }
                            b"id" => {
                                rel_id = Some(
                                    attr.unescape_value().map_err(ooxml_err)?.into_owned(),
                                );
                            }
                            _ => {}
                        }
                    }
                    if let Some(name) = name {
                        sheets.push(SheetRef { name, rel_id });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// Relationship id → target part, from `xl/_rels/workbook.xml.rels`.
fn read_workbook_rels(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
) -> Result<HashMap<String, String>, ExtractError> {
    let Some(xml) =
        read_optional_zip_entry(archive, "xl/_rels/workbook.xml.rels", MAX_XML_ENTRY_BYTES)?
    else {
        return Ok(HashMap::new());
    };
    let mut rels = HashMap::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = None;
                    let mut target = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => {
                                id = Some(attr.unescape_value().map_err(ooxml_err)?.into_owned())
                            }
                            b"Target" => {
                                target =
                                    Some(attr.unescape_value().map_err(ooxml_err)?.into_owned())
                            }
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(target)) = (id, target) {
                        rels.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Relationship targets are relative to `xl/` unless package-absolute.
fn resolve_workbook_target(target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else {
        format!("xl/{}", target)
    }
}

/// Shared strings, one entry per `<si>`, rich-text runs concatenated.
fn read_shared_strings(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    let Some(xml) =
        read_optional_zip_entry(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?
    else {
        return Ok(Vec::new());
    };
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                    current.clear();
                } else if in_si && e.local_name().as_ref() == b"t" {
                    if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    SharedString,
    InlineString,
    Other,
}

/// Render one worksheet as CSV rows: cells joined with commas, column
/// gaps padded, values escaped when they contain CSV metacharacters.
fn render_sheet_csv(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut row_cells: Vec<(usize, String)> = Vec::new();

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut cell_type = CellType::Other;
    let mut cell_col = 0usize;
    let mut next_col = 0usize;
    let mut cell_value = String::new();
    let mut in_value = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                cell_type = CellType::Other;
                cell_col = next_col;
                cell_value.clear();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"r" => {
                            let cell_ref = attr.unescape_value().map_err(ooxml_err)?;
                            if let Some(col) = column_of_cell_ref(&cell_ref) {
                                cell_col = col;
                            }
                        }
                        b"t" => {
                            cell_type = match attr.value.as_ref() {
                                b"s" => CellType::SharedString,
                                b"inlineStr" => CellType::InlineString,
                                _ => CellType::Other,
                            };
                        }
                        _ => {}
                    }
                }
                next_col = cell_col + 1;
            }
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"v" => in_value = true,
                b"t" if cell_type == CellType::InlineString => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                cell_value.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let text = match cell_type {
                        CellType::SharedString => cell_value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i))
                            .cloned()
                            .unwrap_or_default(),
                        _ => cell_value.clone(),
                    };
                    if !text.is_empty() {
                        row_cells.push((cell_col, text));
                        cell_count += 1;
                    }
                }
                b"row" => {
                    if !row_cells.is_empty() {
                        rows.push(render_csv_row(&mut row_cells));
                    }
                    next_col = 0;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows.join("\n"))
}

fn render_csv_row(cells: &mut Vec<(usize, String)>) -> String {
    cells.sort_by_key(|(col, _)| *col);
    let last_col = cells.last().map(|(col, _)| *col).unwrap_or(0);
    let mut fields = vec![String::new(); last_col + 1];
    for (col, text) in cells.drain(..) {
        fields[col] = escape_csv_field(&text);
    }
    fields.join(",")
}

fn escape_csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Column index from an `A1`-style cell reference (`A` → 0, `AB` → 27).
fn column_of_cell_ref(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(col - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_package(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, content) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = "<?xml version=\"1.0\"?>\
            <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
            <w:body>\
            <w:p><w:r><w:t>Học phí hàng tháng là 500 nghìn đồng.</w:t></w:r></w:p>\
            <w:p><w:r><w:t>Bao gồm ăn uống.</w:t></w:r></w:p>\
            </w:body></w:document>";
        let bytes = zip_package(&[("word/document.xml", xml)]);
        let text = extract_docx(&bytes).unwrap();
        assert_eq!(
            text,
            "Học phí hàng tháng là 500 nghìn đồng.\nBao gồm ăn uống.\n"
        );
    }

    #[test]
    fn xlsx_preserves_sheet_names_and_rows() {
        let workbook = "<?xml version=\"1.0\"?>\
            <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
            <sheets><sheet name=\"Thực đơn tuần\" sheetId=\"1\" r:id=\"rId1\"/></sheets>\
            </workbook>";
        let rels = "<?xml version=\"1.0\"?>\
            <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
            <Relationship Id=\"rId1\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
             Target=\"worksheets/sheet1.xml\"/>\
            </Relationships>";
        let sheet = "<?xml version=\"1.0\"?>\
            <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
            <sheetData>\
            <row r=\"1\">\
              <c r=\"A1\" t=\"inlineStr\"><is><t>Thứ hai</t></is></c>\
              <c r=\"B1\" t=\"inlineStr\"><is><t>Cháo gà</t></is></c>\
            </row>\
            <row r=\"2\">\
              <c r=\"A2\" t=\"inlineStr\"><is><t>Thứ ba</t></is></c>\
              <c r=\"C2\"><v>35000</v></c>\
            </row>\
            </sheetData></worksheet>";
        let bytes = zip_package(&[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let text = extract_xlsx(&bytes).unwrap();
        assert!(text.starts_with("[Sheet: Thực đơn tuần]\n"));
        assert!(text.contains("Thứ hai,Cháo gà"));
        // Column B is empty in row 2, so the gap is padded.
        assert!(text.contains("Thứ ba,,35000"));
    }

    #[test]
    fn xlsx_resolves_shared_strings() {
        let workbook = "<workbook xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
            <sheets><sheet name=\"Data\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>";
        let rels = "<Relationships>\
            <Relationship Id=\"rId1\" Target=\"worksheets/sheet1.xml\"/></Relationships>";
        let shared = "<sst><si><t>ghi chú</t></si><si><r><t>hai </t></r><r><t>phần</t></r></si></sst>";
        let sheet = "<worksheet><sheetData>\
            <row><c r=\"A1\" t=\"s\"><v>0</v></c><c r=\"B1\" t=\"s\"><v>1</v></c></row>\
            </sheetData></worksheet>";
        let bytes = zip_package(&[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let text = extract_xlsx(&bytes).unwrap();
        assert!(text.contains("ghi chú,hai phần"));
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("kh\"op"), "\"kh\"\"op\"");
        assert_eq!(escape_csv_field("plain"), "plain");
    }

    #[test]
    fn cell_ref_columns() {
        assert_eq!(column_of_cell_ref("A1"), Some(0));
        assert_eq!(column_of_cell_ref("C12"), Some(2));
        assert_eq!(column_of_cell_ref("AB3"), Some(27));
        assert_eq!(column_of_cell_ref("7"), None);
    }
}
