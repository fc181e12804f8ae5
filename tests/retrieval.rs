//! End-to-end retrieval tests over real fixture files.
//!
//! Builds minimal `.docx` and `.xlsx` packages in a temp directory,
//! loads them through the full pipeline, and checks the assembled
//! context for the scenarios the school actually cares about.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use kinderchat::config::{Config, DocsDirConfig};
use kinderchat::corpus::CorpusProvider;
use kinderchat::loader::load_documents;
use kinderchat::search::search;

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    let mut xml = String::from(
        "<?xml version=\"1.0\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>",
    );
    for paragraph in paragraphs {
        xml.push_str("<w:p><w:r><w:t>");
        xml.push_str(paragraph);
        xml.push_str("</w:t></w:r></w:p>");
    }
    xml.push_str("</w:body></w:document>");
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

fn write_xlsx(path: &Path, sheet_name: &str, rows: &[&[&str]]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);

    zip.start_file("xl/workbook.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    let workbook = format!(
        "<?xml version=\"1.0\"?>\
         <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
          xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
         <sheets><sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>",
        sheet_name
    );
    zip.write_all(workbook.as_bytes()).unwrap();

    zip.start_file(
        "xl/_rels/workbook.xml.rels",
        zip::write::SimpleFileOptions::default(),
    )
    .unwrap();
    zip.write_all(
        b"<?xml version=\"1.0\"?>\
          <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
          <Relationship Id=\"rId1\" \
           Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" \
           Target=\"worksheets/sheet1.xml\"/></Relationships>",
    )
    .unwrap();

    zip.start_file(
        "xl/worksheets/sheet1.xml",
        zip::write::SimpleFileOptions::default(),
    )
    .unwrap();
    let mut sheet = String::from(
        "<?xml version=\"1.0\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
         <sheetData>",
    );
    for (row_idx, row) in rows.iter().enumerate() {
        sheet.push_str(&format!("<row r=\"{}\">", row_idx + 1));
        for (col_idx, cell) in row.iter().enumerate() {
            let col_letter = (b'A' + col_idx as u8) as char;
            sheet.push_str(&format!(
                "<c r=\"{}{}\" t=\"inlineStr\"><is><t>{}</t></is></c>",
                col_letter,
                row_idx + 1,
                cell
            ));
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");
    zip.write_all(sheet.as_bytes()).unwrap();
    zip.finish().unwrap();
}

fn school_fixture_dir() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    write_docx(
        &tmp.path().join("học-phí.docx"),
        &[
            "Học phí hàng tháng là 500 nghìn đồng, bao gồm ăn uống.",
            "Miễn giảm học phí cho hộ nghèo theo quy định hiện hành.",
        ],
    );
    write_xlsx(
        &tmp.path().join("thực-đơn.xlsx"),
        "Tuần 1",
        &[
            &["Thứ hai", "Cháo gà", "Sữa chua"],
            &["Thứ ba", "Súp bí đỏ", "Chuối"],
        ],
    );
    write_docx(
        &tmp.path().join("tuyển-sinh.docx"),
        &["Nhà trường nhận hồ sơ tuyển sinh từ tháng 6 cho trẻ từ 2 tuổi."],
    );
    tmp
}

#[tokio::test]
async fn loads_and_indexes_office_documents() {
    let tmp = school_fixture_dir();
    let config = Config::for_docs_dir(tmp.path().to_path_buf());

    let documents = load_documents(&config).await.unwrap();
    assert_eq!(documents.len(), 3);

    // Sorted by filename for deterministic corpus order.
    let filenames: Vec<&str> = documents.iter().map(|d| d.filename.as_str()).collect();
    let mut sorted = filenames.clone();
    sorted.sort();
    assert_eq!(filenames, sorted);

    let tuition = documents
        .iter()
        .find(|d| d.filename == "học-phí.docx")
        .unwrap();
    assert_eq!(tuition.title, "Học Phí");
    assert!(tuition.content.contains("500 nghìn đồng"));
    assert!(tuition.index.word_frequency.get("phí").copied().unwrap_or(0) >= 2);

    let menu = documents
        .iter()
        .find(|d| d.filename == "thực-đơn.xlsx")
        .unwrap();
    assert_eq!(menu.title, "Thực Đơn");
    assert!(menu.content.starts_with("[Sheet: Tuần 1]"));
    assert!(menu.content.contains("Thứ hai,Cháo gà,Sữa chua"));
}

#[tokio::test]
async fn corrupt_file_is_dropped_not_fatal() {
    let tmp = school_fixture_dir();
    std::fs::write(tmp.path().join("hỏng.docx"), b"definitely not a zip").unwrap();
    std::fs::write(tmp.path().join("~$học-phí.docx"), b"office lock file").unwrap();
    std::fs::write(tmp.path().join("ghi-chú.txt"), b"unsupported extension").unwrap();

    let config = Config::for_docs_dir(tmp.path().to_path_buf());
    let documents = load_documents(&config).await.unwrap();
    assert_eq!(documents.len(), 3);
    assert!(documents.iter().all(|d| d.filename != "hỏng.docx"));
}

#[tokio::test]
async fn missing_directory_contributes_nothing() {
    let tmp = school_fixture_dir();
    let mut config = Config::for_docs_dir(tmp.path().to_path_buf());
    config.docs.push(DocsDirConfig {
        dir: tmp.path().join("không-tồn-tại"),
        extensions: vec!["docx".to_string()],
    });

    let documents = load_documents(&config).await.unwrap();
    assert_eq!(documents.len(), 3);
}

#[tokio::test]
async fn tuition_question_gets_grounded_excerpt() {
    let tmp = school_fixture_dir();
    let config = Config::for_docs_dir(tmp.path().to_path_buf());
    let provider = CorpusProvider::new(Arc::new(config.clone()));
    let corpus = provider.get().await.unwrap();

    let context = search("học phí", &corpus, &config.search_params());
    assert!(context.contains("[Học Phí]"));
    assert!(context.contains("Học phí hàng tháng là 500 nghìn đồng"));
}

#[tokio::test]
async fn unrelated_question_gets_empty_context() {
    let tmp = school_fixture_dir();
    let config = Config::for_docs_dir(tmp.path().to_path_buf());
    let provider = CorpusProvider::new(Arc::new(config.clone()));
    let corpus = provider.get().await.unwrap();

    assert_eq!(search("giá vàng hôm nay", &corpus, &config.search_params()), "");
}

#[tokio::test]
async fn menu_question_surfaces_sheet_rows() {
    let tmp = school_fixture_dir();
    let config = Config::for_docs_dir(tmp.path().to_path_buf());
    let provider = CorpusProvider::new(Arc::new(config.clone()));
    let corpus = provider.get().await.unwrap();

    let context = search("thực đơn thứ hai có cháo gà không", &corpus, &config.search_params());
    assert!(context.contains("[Thực Đơn]"));
    assert!(context.contains("Cháo gà"));
}

#[tokio::test]
async fn repeated_query_is_byte_identical() {
    let tmp = school_fixture_dir();
    let config = Config::for_docs_dir(tmp.path().to_path_buf());
    let provider = CorpusProvider::new(Arc::new(config.clone()));
    let corpus = provider.get().await.unwrap();

    let params = config.search_params();
    let first = search("học phí tháng này bao nhiêu", &corpus, &params);
    let second = search("học phí tháng này bao nhiêu", &corpus, &params);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}
