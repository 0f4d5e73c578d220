//! Reading documents whose objects live in object streams, and signing them.

mod common;

use common::signing_key;
use pdfseal::config::SealConfig;
use pdfseal::document::PdfDocument;
use pdfseal::object::{Object, ObjectRef};
use pdfseal::signatures::{issue_credentials, PdfSigner, SignOptions, SignatureVerifier};
use pdfseal::xref::XRefKind;

/// Catalog (2) and page tree (3) compressed in object stream 1; page (4),
/// contents (5) and the xref stream (6) are plain objects.
fn compressed_pdf() -> Vec<u8> {
    let catalog = b"<< /Type /Catalog /Pages 3 0 R >>".to_vec();
    let pages = b"<< /Type /Pages /Kids [4 0 R] /Count 1 >>".to_vec();
    let header = format!("2 0 3 {} ", catalog.len() + 1);
    let mut objstm = header.clone().into_bytes();
    objstm.extend_from_slice(&catalog);
    objstm.push(b' ');
    objstm.extend_from_slice(&pages);

    let mut pdf = b"%PDF-1.5\n".to_vec();
    let mut offsets = Vec::new();

    offsets.push(pdf.len());
    pdf.extend_from_slice(
        format!(
            "1 0 obj\n<< /Type /ObjStm /N 2 /First {} /Length {} >>\nstream\n",
            header.len(),
            objstm.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&objstm);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    offsets.push(pdf.len());
    pdf.extend_from_slice(b"4 0 obj\n<< /Type /Page /Parent 3 0 R /MediaBox [0 0 595 842] /Contents 5 0 R >>\nendobj\n");
    let content = b"BT /F1 12 Tf 72 720 Td (Compressed) Tj ET";
    offsets.push(pdf.len());
    pdf.extend_from_slice(format!("5 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes());
    pdf.extend_from_slice(content);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_offset = pdf.len();
    let plain = |offset: usize| {
        let mut row = vec![1u8];
        row.extend_from_slice(&(offset as u32).to_be_bytes());
        row.extend_from_slice(&[0, 0]);
        row
    };
    let compressed = |index: u16| {
        let mut row = vec![2u8, 0, 0, 0, 1];
        row.extend_from_slice(&index.to_be_bytes());
        row
    };
    let mut rows = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
    rows.extend(plain(offsets[0]));
    rows.extend(compressed(0));
    rows.extend(compressed(1));
    rows.extend(plain(offsets[1]));
    rows.extend(plain(offsets[2]));
    rows.extend(plain(xref_offset));

    pdf.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /XRef /Size 7 /W [1 4 2] /Root 2 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&rows);
    pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    pdf
}

#[test]
fn test_compressed_objects_resolve() {
    let doc = PdfDocument::from_bytes(compressed_pdf()).unwrap();
    assert_eq!(doc.version(), "1.5");
    assert_eq!(doc.xref().kind(), XRefKind::Stream);
    assert_eq!(doc.catalog_ref().unwrap(), ObjectRef::new(2, 0));
    assert!(doc.catalog().unwrap().contains_key("Pages"));
    assert_eq!(doc.pages().unwrap(), vec![ObjectRef::new(4, 0)]);

    let pages = doc.get_object(ObjectRef::new(3, 0)).unwrap();
    assert_eq!(pages.get("Count").and_then(Object::as_integer), Some(1));
    assert!(doc.signature_fields().unwrap().is_empty());
}

#[test]
fn test_sign_document_with_compressed_catalog() {
    let original = compressed_pdf();
    let credentials = issue_credentials(signing_key(), &SealConfig::new()).unwrap();
    let signed = PdfSigner::new(credentials, SignOptions::default())
        .sign_bytes(&original)
        .unwrap();
    assert!(signed.starts_with(&original));

    let doc = PdfDocument::from_bytes(signed.clone()).unwrap();
    assert_eq!(doc.xref().kind(), XRefKind::Stream);
    assert!(doc.catalog().unwrap().contains_key("AcroForm"));
    assert_eq!(doc.signature_fields().unwrap().len(), 1);

    let result = SignatureVerifier::new()
        .with_expected_key(signing_key().to_public_key())
        .verify_bytes(&signed)
        .unwrap();
    assert!(result.status.is_valid(), "{:?}", result.messages);
}

#[test]
fn test_broken_xref_is_reconstructed() {
    let mut pdf = common::simple_pdf();
    let at = pdf
        .windows(b"startxref\n".len())
        .rposition(|w| w == b"startxref\n")
        .unwrap();
    pdf.truncate(at);
    pdf.extend_from_slice(b"startxref\n999999\n%%EOF\n");

    let doc = PdfDocument::from_bytes(pdf).unwrap();
    assert!(doc.xref().is_reconstructed());
    assert_eq!(doc.pages().unwrap().len(), 1);
}

#[test]
fn test_missing_header_is_read_error() {
    let err = PdfDocument::from_bytes(b"hello".to_vec()).unwrap_err();
    assert!(err.is_pdf_read());
}
