//! Shared fixtures for integration tests: small PDFs with correct
//! cross-reference offsets, and RSA keys generated once per test binary.

#![allow(dead_code)]

use rsa::RsaPrivateKey;
use std::sync::OnceLock;

/// Builds a PDF from object bodies numbered 1..=n in insertion order.
#[derive(Default)]
pub struct PdfBuilder {
    objects: Vec<Vec<u8>>,
    trailer_extra: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object body; returns its object number.
    pub fn add(&mut self, body: impl AsRef<[u8]>) -> u32 {
        self.objects.push(body.as_ref().to_vec());
        self.objects.len() as u32
    }

    /// Extra trailer entries, e.g. `/Encrypt 9 0 R`.
    pub fn trailer_entry(mut self, entry: &str) -> Self {
        self.trailer_extra.push(' ');
        self.trailer_extra.push_str(entry);
        self
    }

    fn body(&self) -> (Vec<u8>, Vec<usize>) {
        let mut pdf = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in self.objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            pdf.extend_from_slice(body);
            pdf.extend_from_slice(b"\nendobj\n");
        }
        (pdf, offsets)
    }

    /// Classic `xref` table; object 1 is the catalog.
    pub fn build(&self) -> Vec<u8> {
        let (mut pdf, offsets) = self.body();
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1).as_bytes());
        for offset in &offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF\n",
                offsets.len() + 1,
                self.trailer_extra,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    /// Uncompressed cross-reference stream with `/W [1 4 2]`.
    pub fn build_with_xref_stream(&self) -> Vec<u8> {
        let (mut pdf, offsets) = self.body();
        let xref_id = offsets.len() + 1;
        let xref_offset = pdf.len();

        let mut rows = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
        for offset in offsets.iter().chain(std::iter::once(&xref_offset)) {
            rows.push(1);
            rows.extend_from_slice(&(*offset as u32).to_be_bytes());
            rows.extend_from_slice(&[0, 0]);
        }
        pdf.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R{} /Length {} >>\nstream\n",
                xref_id,
                xref_id + 1,
                self.trailer_extra,
                rows.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&rows);
        pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        pdf
    }
}

fn content_stream(text: &str) -> String {
    let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text);
    format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content)
}

/// Catalog, page tree and `pages` pages with a line of text each.
pub fn document(pages: usize) -> PdfBuilder {
    let mut builder = PdfBuilder::new();
    builder.add("<< /Type /Catalog /Pages 2 0 R >>");
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    builder.add(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages));
    builder.add("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    for i in 0..pages {
        let page = 4 + 2 * i;
        builder.add(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page + 1
        ));
        builder.add(content_stream(&format!("Page {} of the contract", i + 1)));
    }
    builder
}

/// One-page document with a classic xref table.
pub fn simple_pdf() -> Vec<u8> {
    document(1).build()
}

/// One-page document whose catalog points at an indirect AcroForm with an
/// unsigned text field.
pub fn pdf_with_acroform() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder.add("<< /Type /Catalog /Pages 2 0 R /AcroForm 6 0 R >>");
    builder.add("<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    builder.add("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Annots [5 0 R] >>");
    builder.add(content_stream("Form"));
    builder.add("<< /Type /Annot /Subtype /Widget /FT /Tx /T (Name) /Rect [100 100 300 120] /P 3 0 R >>");
    builder.add("<< /Fields [5 0 R] /DA (/Helv 0 Tf 0 g) >>");
    builder.build()
}

/// Document whose trailer names an `/Encrypt` dictionary.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut builder = document(1);
    let encrypt = builder.add("<< /Filter /Standard /V 2 /R 3 /Length 128 /P -44 /O <00> /U <00> >>");
    builder.trailer_entry(&format!("/Encrypt {} 0 R /ID [<01> <01>]", encrypt)).build()
}

/// RSA key shared by every test in a binary.
pub fn signing_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap())
}

/// A second, unrelated key.
pub fn other_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap())
}
