//! Signature object embedded in a PDF as an incremental update.
//!
//! The original bytes are left untouched. A new indirect object of type
//! `/ContractSignature` is appended together with an xref section and a
//! trailer pointing back at the previous one, so ordinary PDF readers still
//! open the document.

use contract_core::{Error, Result};
use std::str;

pub const SIGNATURE_TYPE: &str = "ContractSignature";
pub const SIGNATURE_FILTER: &str = "ContractSigning.ECDSA-P256-SHA256";

/// Raw fields of an embedded signature object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEnvelope {
    /// Number of leading bytes covered by the digest.
    pub byte_length: usize,
    pub digest: Vec<u8>,
    /// Canonical signed attributes.
    pub attributes: Vec<u8>,
    pub signature: Vec<u8>,
    pub certificate: Vec<u8>,
}

/// Trailer values of the document being extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PreviousTrailer {
    startxref: usize,
    size: u32,
    root: (u32, u16),
    info: Option<(u32, u16)>,
}

/// Append `envelope` to `original` as an incremental update.
pub fn append(original: &[u8], envelope: &SignatureEnvelope) -> Result<Vec<u8>> {
    if envelope.byte_length != original.len() {
        return Err(Error::signing(format!(
            "signature covers {} bytes but document has {}",
            envelope.byte_length,
            original.len()
        )));
    }
    let previous = previous_trailer(original)?;
    let object_number = previous.size;

    let mut out = Vec::with_capacity(original.len() + 4096);
    out.extend_from_slice(original);
    if !original.ends_with(b"\n") {
        out.push(b'\n');
    }

    let object_offset = out.len();
    out.extend_from_slice(format!("{} 0 obj\n<<\n", object_number).as_bytes());
    out.extend_from_slice(format!("/Type /{}\n", SIGNATURE_TYPE).as_bytes());
    out.extend_from_slice(format!("/Filter /{}\n", SIGNATURE_FILTER).as_bytes());
    out.extend_from_slice(format!("/ByteLength {}\n", envelope.byte_length).as_bytes());
    push_hex(&mut out, "Digest", &envelope.digest);
    push_hex(&mut out, "Attributes", &envelope.attributes);
    push_hex(&mut out, "Signature", &envelope.signature);
    push_hex(&mut out, "Certificate", &envelope.certificate);
    out.extend_from_slice(b">>\nendobj\n");

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n{} 1\n", object_number).as_bytes());
    // Entries are exactly 20 bytes
    out.extend_from_slice(format!("{:010} 00000 n \n", object_offset).as_bytes());

    let mut trailer = format!(
        "trailer\n<< /Size {} /Root {} {} R",
        object_number + 1,
        previous.root.0,
        previous.root.1
    );
    if let Some((number, generation)) = previous.info {
        trailer.push_str(&format!(" /Info {} {} R", number, generation));
    }
    trailer.push_str(&format!(" /Prev {} >>\n", previous.startxref));
    out.extend_from_slice(trailer.as_bytes());
    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());

    Ok(out)
}

/// Extract the signature object from the final incremental update.
///
/// Fails when the document's last update is not a signature object or when
/// anything other than whitespace sits between the covered range and the
/// signature object.
pub fn extract(signed: &[u8]) -> Result<SignatureEnvelope> {
    let xref_offset = last_startxref(signed)?;
    let object_offset = single_xref_entry(signed, xref_offset)?;

    let body = slice_from(signed, object_offset)?;
    let end = find(body, b"endobj")
        .ok_or_else(|| Error::signing("signature object is not terminated"))?;
    let text = str::from_utf8(&body[..end])
        .map_err(|_| Error::signing("signature object is not ASCII"))?;

    let mut object_type = None;
    let mut byte_length = None;
    let mut digest = None;
    let mut attributes = None;
    let mut signature = None;
    let mut certificate = None;

    for line in text.lines().map(str::trim) {
        let Some(entry) = line.strip_prefix('/') else {
            continue;
        };
        let (key, value) = entry.split_once(' ').unwrap_or((entry, ""));
        let value = value.trim();
        match key {
            "Type" => object_type = Some(value.trim_start_matches('/').to_string()),
            "ByteLength" => {
                byte_length = Some(value.parse::<usize>().map_err(|_| {
                    Error::signing(format!("invalid /ByteLength {}", value))
                })?)
            }
            "Digest" => digest = Some(parse_hex(key, value)?),
            "Attributes" => attributes = Some(parse_hex(key, value)?),
            "Signature" => signature = Some(parse_hex(key, value)?),
            "Certificate" => certificate = Some(parse_hex(key, value)?),
            _ => {}
        }
    }

    if object_type.as_deref() != Some(SIGNATURE_TYPE) {
        return Err(Error::signing("final update is not a contract signature"));
    }

    let byte_length = byte_length.ok_or_else(|| missing("ByteLength"))?;
    if byte_length > object_offset {
        return Err(Error::signing("signature covers bytes past its own object"));
    }
    if !signed[byte_length..object_offset]
        .iter()
        .all(u8::is_ascii_whitespace)
    {
        return Err(Error::signing("unsigned content precedes the signature"));
    }

    Ok(SignatureEnvelope {
        byte_length,
        digest: digest.ok_or_else(|| missing("Digest"))?,
        attributes: attributes.ok_or_else(|| missing("Attributes"))?,
        signature: signature.ok_or_else(|| missing("Signature"))?,
        certificate: certificate.ok_or_else(|| missing("Certificate"))?,
    })
}

fn missing(key: &str) -> Error {
    Error::signing(format!("signature object has no /{}", key))
}

fn push_hex(out: &mut Vec<u8>, key: &str, bytes: &[u8]) {
    out.extend_from_slice(format!("/{} <{}>\n", key, hex::encode_upper(bytes)).as_bytes());
}

fn parse_hex(key: &str, value: &str) -> Result<Vec<u8>> {
    let inner = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .ok_or_else(|| Error::signing(format!("/{} is not a hex string", key)))?;
    hex::decode(inner).map_err(|e| Error::signing(format!("/{} is malformed: {}", key, e)))
}

fn previous_trailer(pdf: &[u8]) -> Result<PreviousTrailer> {
    let startxref = last_startxref(pdf)?;

    let document = lopdf::Document::load_mem(pdf)?;
    let trailer = &document.trailer;

    let size = trailer
        .get(b"Size")
        .and_then(|size| size.as_i64())
        .map_err(|_| Error::signing("document trailer has no /Size"))?;
    let size = u32::try_from(size)
        .map_err(|_| Error::signing(format!("invalid trailer /Size {}", size)))?;
    let root = trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| Error::signing("document trailer has no /Root"))?;
    let info = trailer
        .get(b"Info")
        .and_then(|info| info.as_reference())
        .ok();

    Ok(PreviousTrailer {
        startxref,
        size,
        root,
        info,
    })
}

/// Offset named by the last `startxref` keyword.
fn last_startxref(pdf: &[u8]) -> Result<usize> {
    let position = rfind(pdf, b"startxref")
        .ok_or_else(|| Error::signing("document has no startxref"))?;
    let tail = &pdf[position + b"startxref".len()..];
    let digits: String = tail
        .iter()
        .map(|&b| b as char)
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let offset = digits
        .parse::<usize>()
        .map_err(|_| Error::signing("startxref offset is malformed"))?;
    if offset >= pdf.len() {
        return Err(Error::signing("startxref points past end of document"));
    }
    Ok(offset)
}

/// Offset of the only object listed by the xref section at `xref_offset`.
fn single_xref_entry(pdf: &[u8], xref_offset: usize) -> Result<usize> {
    let section = slice_from(pdf, xref_offset)?;
    let text = str::from_utf8(&section[..section.len().min(128)])
        .map_err(|_| Error::signing("final update is not a contract signature"))?;
    let mut lines = text.lines();

    if lines.next().map(str::trim) != Some("xref") {
        return Err(Error::signing("final update has no xref table"));
    }
    let count = lines
        .next()
        .and_then(|header| header.split_whitespace().nth(1))
        .and_then(|count| count.parse::<usize>().ok());
    if count != Some(1) {
        return Err(Error::signing("final update is not a contract signature"));
    }
    lines
        .next()
        .and_then(|entry| entry.split_whitespace().next())
        .and_then(|offset| offset.parse::<usize>().ok())
        .filter(|offset| *offset < pdf.len())
        .ok_or_else(|| Error::signing("final update xref entry is malformed"))
}

fn slice_from(pdf: &[u8], offset: usize) -> Result<&[u8]> {
    pdf.get(offset..)
        .ok_or_else(|| Error::signing(format!("offset {} is out of range", offset)))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    fn minimal_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn envelope_for(pdf: &[u8]) -> SignatureEnvelope {
        SignatureEnvelope {
            byte_length: pdf.len(),
            digest: vec![0xAB; 32],
            attributes: br#"{"version":1}"#.to_vec(),
            signature: vec![1, 2, 3, 4],
            certificate: vec![5, 6, 7],
        }
    }

    #[test]
    fn test_append_then_extract() {
        let pdf = minimal_pdf();
        let envelope = envelope_for(&pdf);

        let signed = append(&pdf, &envelope).unwrap();
        assert!(signed.starts_with(&pdf));
        assert!(signed.ends_with(b"%%EOF\n"));
        assert_eq!(extract(&signed).unwrap(), envelope);
    }

    #[test]
    fn test_signed_document_still_opens() {
        let pdf = minimal_pdf();
        let signed = append(&pdf, &envelope_for(&pdf)).unwrap();

        let doc = Document::load_mem(&signed).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_unsigned_document_has_no_signature() {
        let pdf = minimal_pdf();
        assert!(extract(&pdf).is_err());
    }

    #[test]
    fn test_content_after_signature_is_rejected() {
        let pdf = minimal_pdf();
        let signed = append(&pdf, &envelope_for(&pdf)).unwrap();

        let mut tampered = signed.clone();
        tampered.extend_from_slice(b"% trailing comment\n");
        // startxref still points at the signature xref, so this parses
        assert!(extract(&tampered).is_ok());

        // A second incremental update hides the signature
        let mut doc = Document::load_mem(&signed).unwrap();
        doc.trailer.set("Extra", 1);
        let mut resaved = Vec::new();
        doc.save_to(&mut resaved).unwrap();
        assert!(extract(&resaved).is_err());
    }

    #[test]
    fn test_byte_length_must_match_document() {
        let pdf = minimal_pdf();
        let mut envelope = envelope_for(&pdf);
        envelope.byte_length -= 1;
        assert!(append(&pdf, &envelope).is_err());
    }
}
