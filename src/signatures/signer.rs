//! PDF signing implementation.
//!
//! Signing appends one incremental revision holding:
//!
//! - a signature dictionary (`/Type /Sig`) with fixed-width `/ByteRange`
//!   and `/Contents` placeholders
//! - a widget annotation that is also the signature field, with a small
//!   visible appearance
//! - the updated page (`/Annots`) and AcroForm (`/Fields`, `/SigFlags 3`)
//!
//! Once the revision is written the placeholders are patched in place: the
//! ByteRange is computed from the final layout, the covered bytes are
//! digested, and the DER of a detached CMS SignedData is hex-encoded into
//! `/Contents`.

use super::byterange::{ByteRangeCalculator, BYTE_RANGE_PLACEHOLDER};
use super::certificate::{self, common_name};
use super::timestamp::{
    LocalClockTimestamper, Timestamper, ID_AA_SIGNATURE_TIME_STAMP_TOKEN, ID_SIGNED_DATA,
};
use super::types::{DigestAlgorithm, SignOptions, SigningCredentials};
use crate::config::SealConfig;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::{escape_literal, format_real, hex_upper, IncrementalUpdate};
use chrono::{DateTime, FixedOffset, Local};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::ContentInfo;
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfos};
use der::asn1::{Any, ObjectIdentifier, SetOfVec, UtcTime};
use der::{Decode, Encode};
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::{Keypair, Signer};
use spki::{AlgorithmIdentifierOwned, DynSignatureAlgorithmIdentifier, EncodePublicKey};
use std::path::Path;
use x509_cert::attr::Attribute;
use x509_cert::time::Time;

/// id-data
const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
/// id-signingTime
const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

/// Annotation flags: Print (4) + Locked (128).
const WIDGET_FLAGS: i64 = 132;

/// PDF signer that creates digital signatures.
pub struct PdfSigner {
    credentials: SigningCredentials,
    options: SignOptions,
    byte_range_calc: ByteRangeCalculator,
    timestamper: Box<dyn Timestamper>,
}

impl PdfSigner {
    /// Create a new PDF signer with the given credentials and options.
    pub fn new(credentials: SigningCredentials, options: SignOptions) -> Self {
        let byte_range_calc = ByteRangeCalculator::new(options.estimated_size);
        Self {
            credentials,
            options,
            byte_range_calc,
            timestamper: Box::new(LocalClockTimestamper),
        }
    }

    /// Use a different source of timestamp tokens.
    pub fn with_timestamper(mut self, timestamper: impl Timestamper + 'static) -> Self {
        self.timestamper = Box::new(timestamper);
        self
    }

    /// Get the signing options.
    pub fn options(&self) -> &SignOptions {
        &self.options
    }

    /// Get the signing credentials.
    pub fn credentials(&self) -> &SigningCredentials {
        &self.credentials
    }

    /// Sign a PDF held in memory and return the signed file.
    ///
    /// The input is never modified; the result is the input followed by one
    /// incremental revision.
    pub fn sign_bytes(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        self.options.validate()?;
        let document = PdfDocument::from_bytes(pdf.to_vec())?;
        if document.is_encrypted() {
            return Err(Error::Unsupported("signing encrypted documents".to_string()));
        }
        if !document.signature_fields()?.is_empty() {
            return Err(Error::AlreadySigned);
        }

        let page_index = self.options.appearance.page;
        let page_ref = *document
            .pages()?
            .get(page_index)
            .ok_or_else(|| Error::InvalidPdf(format!("document has no page {}", page_index + 1)))?;
        let now = Local::now().fixed_offset();

        let mut update = IncrementalUpdate::new(&document)?;
        let sig_ref = update.allocate();
        let widget_ref = update.allocate();
        let appearance_ref = update.allocate();

        update.put_raw(sig_ref, self.signature_dictionary(&now));
        update.put(appearance_ref, &self.appearance_stream(&now));
        update.put(widget_ref, &Object::Dictionary(self.widget(sig_ref, page_ref, appearance_ref)));

        let mut page = document.resolve_dict(&Object::Reference(page_ref))?;
        append_reference(&document, &mut page, "Annots", widget_ref)?;
        update.put(page_ref, &Object::Dictionary(page));
        register_field(&document, &mut update, widget_ref)?;

        let mut written = update.write()?;
        let sig_offset = *written
            .offsets
            .get(&sig_ref)
            .ok_or_else(|| Error::Signing("signature dictionary was not written".to_string()))?;
        let contents_offset = ByteRangeCalculator::find_contents_offset(&written.bytes, sig_offset)
            .ok_or_else(|| Error::Signing("Contents placeholder not found".to_string()))?;

        let byte_range = self
            .byte_range_calc
            .calculate_byte_range(written.bytes.len(), contents_offset);
        ByteRangeCalculator::patch_byte_range(&mut written.bytes, sig_offset, &byte_range)?;
        log::debug!("signature byte range {}", ByteRangeCalculator::format_byte_range(&byte_range));

        let signed_bytes = ByteRangeCalculator::extract_signed_bytes(&written.bytes, &byte_range)?;
        let cms = self.sign(&signed_bytes)?;
        self.byte_range_calc
            .insert_signature(&mut written.bytes, contents_offset, &hex_upper(&cms))?;
        log::info!(
            "signed document: {} byte CMS in {} byte placeholder, field {}",
            cms.len(),
            self.byte_range_calc.placeholder_size(),
            self.options.field_name
        );
        Ok(written.bytes)
    }

    /// Build the DER-encoded detached CMS SignedData over `signed_bytes`.
    pub fn sign(&self, signed_bytes: &[u8]) -> Result<Vec<u8>> {
        let digest_algorithm = self.options.digest_algorithm;
        let digest = digest_algorithm.digest(signed_bytes);
        let key = &self.credentials.private_key;
        let content_info = match digest_algorithm {
            DigestAlgorithm::Sha256 => self.signed_data::<Sha256>(key, &digest)?,
            DigestAlgorithm::Sha384 => self.signed_data::<Sha384>(key, &digest)?,
            DigestAlgorithm::Sha512 => self.signed_data::<Sha512>(key, &digest)?,
        };

        let content_info = if self.options.embed_timestamp {
            self.attach_timestamp(content_info)?
        } else {
            content_info
        };
        content_info.to_der().map_err(cms_error)
    }

    fn signed_data<D>(&self, key: &RsaPrivateKey, digest: &[u8]) -> Result<ContentInfo>
    where
        D: Digest + const_oid::AssociatedOid,
        SigningKey<D>: Keypair + DynSignatureAlgorithmIdentifier + Signer<Signature>,
        <SigningKey<D> as Keypair>::VerifyingKey: EncodePublicKey,
    {
        let certificate = self.credentials.certificate.clone();
        let content = EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        };
        let digest_algorithm = AlgorithmIdentifierOwned {
            oid: D::OID,
            parameters: None,
        };
        let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: certificate.tbs_certificate.issuer.clone(),
            serial_number: certificate.tbs_certificate.serial_number.clone(),
        });

        let signer = SigningKey::<D>::new(key.clone());
        let mut signer_info =
            SignerInfoBuilder::new(&signer, sid, digest_algorithm.clone(), &content, Some(digest))
                .map_err(|e| Error::Signing(format!("signer info: {:?}", e)))?;
        signer_info
            .add_signed_attribute(signing_time_attribute()?)
            .map_err(|e| Error::Signing(format!("signing time: {:?}", e)))?;

        SignedDataBuilder::new(&content)
            .add_digest_algorithm(digest_algorithm)
            .and_then(|b| b.add_certificate(CertificateChoices::Certificate(certificate)))
            .and_then(|b| b.add_signer_info::<SigningKey<D>, Signature>(signer_info))
            .and_then(|b| b.build())
            .map_err(|e| Error::Signing(format!("signed data: {:?}", e)))
    }

    /// Add a timestamp token over the signature value as an unsigned
    /// attribute of the (single) signer.
    fn attach_timestamp(&self, content_info: ContentInfo) -> Result<ContentInfo> {
        let mut signed_data: SignedData = content_info.content.decode_as().map_err(cms_error)?;
        let mut signer_infos = signed_data.signer_infos.0.into_vec();
        let signer_info = signer_infos
            .first_mut()
            .ok_or_else(|| Error::Signing("signed data has no signer".to_string()))?;

        let token = self
            .timestamper
            .timestamp(signer_info.signature.as_bytes(), &self.credentials)?;
        let attribute = Attribute {
            oid: ID_AA_SIGNATURE_TIME_STAMP_TOKEN,
            values: SetOfVec::try_from(vec![Any::from_der(&token).map_err(cms_error)?]).map_err(cms_error)?,
        };
        signer_info.unsigned_attrs = Some(SetOfVec::try_from(vec![attribute]).map_err(cms_error)?);

        signed_data.signer_infos = SignerInfos(SetOfVec::try_from(signer_infos).map_err(cms_error)?);
        Ok(ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data).map_err(cms_error)?,
        })
    }

    fn signer_name(&self) -> String {
        self.options
            .name
            .clone()
            .or_else(|| common_name(&self.credentials.certificate.tbs_certificate.subject))
            .unwrap_or_else(|| "Unknown signer".to_string())
    }

    /// Raw signature dictionary with both placeholders.
    fn signature_dictionary(&self, now: &DateTime<FixedOffset>) -> Vec<u8> {
        let mut dict = String::new();
        dict.push_str("<</Type /Sig /Filter /Adobe.PPKLite");
        dict.push_str(&format!(" /SubFilter /{}", self.options.sub_filter.as_pdf_name()));
        dict.push_str(&format!(" /ByteRange {}", BYTE_RANGE_PLACEHOLDER));
        dict.push_str(&format!("\n/Contents {}\n", self.byte_range_calc.generate_placeholder()));
        dict.push_str(&format!("/M {}", text_string(&pdf_date(now))));

        let optional = [
            ("Name", &self.options.name),
            ("Reason", &self.options.reason),
            ("Location", &self.options.location),
            ("ContactInfo", &self.options.contact_info),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                dict.push_str(&format!(" /{} {}", key, text_string(value)));
            }
        }
        dict.push_str(" >>");
        dict.into_bytes()
    }

    /// Widget annotation merged with its signature field.
    fn widget(&self, sig_ref: ObjectRef, page_ref: ObjectRef, appearance_ref: ObjectRef) -> Dictionary {
        let rect = self.options.appearance.rect.to_pdf_array();
        let mut normal = Dictionary::new();
        normal.insert("N".to_string(), Object::Reference(appearance_ref));

        let mut widget = Dictionary::new();
        widget.insert("Type".to_string(), Object::name("Annot"));
        widget.insert("Subtype".to_string(), Object::name("Widget"));
        widget.insert("FT".to_string(), Object::name("Sig"));
        widget.insert("T".to_string(), Object::String(self.options.field_name.as_bytes().to_vec()));
        widget.insert("V".to_string(), Object::Reference(sig_ref));
        widget.insert(
            "Rect".to_string(),
            Object::Array(rect.iter().map(|v| Object::Real(*v as f64)).collect()),
        );
        widget.insert("P".to_string(), Object::Reference(page_ref));
        widget.insert("F".to_string(), Object::Integer(WIDGET_FLAGS));
        widget.insert("AP".to_string(), Object::Dictionary(normal));
        widget
    }

    /// Form XObject drawn in the widget rectangle.
    fn appearance_stream(&self, now: &DateTime<FixedOffset>) -> Object {
        let appearance = &self.options.appearance;
        let width = appearance.rect.width as f64;
        let height = appearance.rect.height as f64;
        let font_size = appearance.font_size as f64;

        let mut lines = Vec::new();
        if appearance.show_name {
            lines.push(format!("Digitally signed by {}", self.signer_name()));
        }
        if appearance.show_date {
            lines.push(format!("Date: {}", now.format("%Y-%m-%d %H:%M:%S %:z")));
        }
        if appearance.show_reason {
            if let Some(reason) = &self.options.reason {
                lines.push(format!("Reason: {}", reason));
            }
        }

        let mut content = String::new();
        content.push_str("q 0.96 0.96 0.96 rg ");
        content.push_str(&format!("0 0 {} {} re f\n", format_real(width), format_real(height)));
        content.push_str(&format!(
            "0.2 0.2 0.2 RG 0.75 w 0.375 0.375 {} {} re S Q\n",
            format_real(width - 0.75),
            format_real(height - 0.75)
        ));
        content.push_str(&format!("BT /Helv {} Tf 0 0 0 rg ", format_real(font_size)));
        content.push_str(&format!(
            "{} TL 4 {} Td\n",
            format_real(font_size + 2.0),
            format_real(height - font_size - 4.0)
        ));
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                content.push_str("T* ");
            }
            content.push_str(&escape_literal(&win_ansi(line)));
            content.push_str(" Tj\n");
        }
        content.push_str("ET");

        let mut font = Dictionary::new();
        font.insert("Type".to_string(), Object::name("Font"));
        font.insert("Subtype".to_string(), Object::name("Type1"));
        font.insert("BaseFont".to_string(), Object::name("Helvetica"));
        font.insert("Encoding".to_string(), Object::name("WinAnsiEncoding"));
        let mut fonts = Dictionary::new();
        fonts.insert("Helv".to_string(), Object::Dictionary(font));
        let mut resources = Dictionary::new();
        resources.insert("Font".to_string(), Object::Dictionary(fonts));

        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("XObject"));
        dict.insert("Subtype".to_string(), Object::name("Form"));
        dict.insert(
            "BBox".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ]),
        );
        dict.insert("Resources".to_string(), Object::Dictionary(resources));
        Object::Stream {
            dict,
            data: bytes::Bytes::from(content.into_bytes()),
        }
    }
}

/// Append `target` to the array under `key`, turning an indirect array
/// into a direct one.
fn append_reference(document: &PdfDocument, dict: &mut Dictionary, key: &str, target: ObjectRef) -> Result<()> {
    let mut items = match dict.get(key) {
        None | Some(Object::Null) => Vec::new(),
        Some(value) => match document.resolve(value)? {
            Object::Array(items) => items,
            Object::Null => Vec::new(),
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Array".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        },
    };
    items.push(Object::Reference(target));
    dict.insert(key.to_string(), Object::Array(items));
    Ok(())
}

/// Add the field to the AcroForm, creating or relocating the AcroForm as
/// an indirect object when needed.
fn register_field(document: &PdfDocument, update: &mut IncrementalUpdate<'_>, field_ref: ObjectRef) -> Result<()> {
    let (acroform_ref, mut acroform) = match document.acroform()? {
        Some((Some(r), dict)) => (r, dict),
        existing => {
            let dict = existing.map(|(_, dict)| dict).unwrap_or_default();
            let r = update.allocate();
            let mut catalog = document.catalog()?;
            catalog.insert("AcroForm".to_string(), Object::Reference(r));
            update.put(document.catalog_ref()?, &Object::Dictionary(catalog));
            (r, dict)
        },
    };

    append_reference(document, &mut acroform, "Fields", field_ref)?;
    let flags = acroform.get("SigFlags").and_then(Object::as_integer).unwrap_or(0);
    acroform.insert("SigFlags".to_string(), Object::Integer(flags | 3));
    update.put(acroform_ref, &Object::Dictionary(acroform));
    Ok(())
}

/// `signingTime` signed attribute for the current time.
fn signing_time_attribute() -> Result<Attribute> {
    let now = UtcTime::from_system_time(std::time::SystemTime::now()).map_err(cms_error)?;
    let value = Any::encode_from(&Time::UtcTime(now)).map_err(cms_error)?;
    Ok(Attribute {
        oid: ID_SIGNING_TIME,
        values: SetOfVec::try_from(vec![value]).map_err(cms_error)?,
    })
}

/// `D:YYYYMMDDHHmmSS+HH'mm'`
pub fn pdf_date(at: &DateTime<FixedOffset>) -> String {
    let offset = at.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        at.format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

/// PDF text string: literal for ASCII, UTF-16BE hex otherwise.
fn text_string(text: &str) -> String {
    if text.is_ascii() {
        return escape_literal(text.as_bytes());
    }
    let mut utf16 = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        utf16.extend_from_slice(&unit.to_be_bytes());
    }
    format!("<{}>", hex_upper(&utf16))
}

/// Latin-1 bytes for WinAnsi text, `?` for anything outside.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn cms_error(e: der::Error) -> Error {
    Error::Signing(format!("ASN.1: {}", e))
}

/// Sign `input` into `output` with a freshly issued certificate.
///
/// Both paths must be non-empty and must differ. The input is only read.
/// The output appears atomically: on any failure no output file is left
/// behind and an existing file at `output` is untouched.
pub fn sign_file(private_key: &RsaPrivateKey, input: &Path, output: &Path) -> Result<()> {
    sign_file_with(private_key, input, output, &SealConfig::default(), SignOptions::default())
}

/// [`sign_file`] with explicit configuration and options.
pub fn sign_file_with(
    private_key: &RsaPrivateKey,
    input: &Path,
    output: &Path,
    config: &SealConfig,
    options: SignOptions,
) -> Result<()> {
    if input.as_os_str().is_empty() {
        return Err(Error::EmptyPath("input document"));
    }
    if output.as_os_str().is_empty() {
        return Err(Error::EmptyPath("output document"));
    }
    if input == output || same_file(input, output) {
        return Err(Error::OutputIsInput(output.to_path_buf()));
    }

    let credentials = certificate::issue_credentials(private_key, config)?;
    let original = std::fs::read(input)?;
    let signed = PdfSigner::new(credentials, options).sign_bytes(&original)?;
    fsutil::write_atomic(output, &signed)?;
    log::info!("wrote signed document {}", output.display());
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pdf_date() {
        let tz = FixedOffset::east_opt(2 * 3600 + 30 * 60).unwrap();
        let at = tz.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(pdf_date(&at), "D:20240305070809+02'30'");
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let at = west.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(pdf_date(&at), "D:20241231235900-05'00'");
    }

    #[test]
    fn test_text_string() {
        assert_eq!(text_string("Approved (final)"), "(Approved \\(final\\))");
        assert_eq!(text_string("é"), "<FEFF00E9>");
    }

    #[test]
    fn test_win_ansi() {
        assert_eq!(win_ansi("Zürich → Genève"), b"Z\xFCrich ? Gen\xE8ve".to_vec());
    }

    #[test]
    fn test_append_reference_creates_and_extends() {
        let doc = PdfDocument::from_bytes(tiny_pdf()).unwrap();
        let mut dict = Dictionary::new();
        append_reference(&doc, &mut dict, "Annots", ObjectRef::new(9, 0)).unwrap();
        append_reference(&doc, &mut dict, "Annots", ObjectRef::new(10, 0)).unwrap();
        assert_eq!(
            dict.get("Annots"),
            Some(&Object::Array(vec![
                Object::Reference(ObjectRef::new(9, 0)),
                Object::Reference(ObjectRef::new(10, 0)),
            ]))
        );
        dict.insert("Bad".to_string(), Object::Integer(1));
        assert!(append_reference(&doc, &mut dict, "Bad", ObjectRef::new(9, 0)).is_err());
    }

    fn tiny_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n{:010} 00000 n \n", o1, o2).as_bytes());
        pdf.extend_from_slice(format!("trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF", xref).as_bytes());
        pdf
    }

    #[test]
    fn test_rejects_same_input_and_output() {
        let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let path = Path::new("document.pdf");
        assert!(matches!(sign_file(&key, path, path), Err(Error::OutputIsInput(_))));
        assert!(matches!(sign_file(&key, Path::new(""), path), Err(Error::EmptyPath(_))));
    }
}
