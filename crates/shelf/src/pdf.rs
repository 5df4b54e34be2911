//! PDF metadata and text extraction.
//!
//! Both functions are blocking; async callers run them on the blocking pool.

use lopdf::{Dictionary, Document, Object};

use super::*;

/// Bibliographic fields of a PDF's document information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
  /// `/Title`
  pub title:    Option<String>,
  /// `/Author`
  pub author:   Option<String>,
  /// `/Subject`
  pub subject:  Option<String>,
  /// `/Keywords`
  pub keywords: Option<String>,
}

/// Reads the document information dictionary of a PDF.
///
/// A PDF without one yields empty metadata rather than an error.
pub fn read_metadata(path: impl AsRef<Path>) -> Result<PdfMetadata> {
  let doc = Document::load(path)?;

  let info = match doc.trailer.get(b"Info") {
    Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict)?,
    Ok(Object::Dictionary(dict)) => dict,
    _ => return Ok(PdfMetadata::default()),
  };

  Ok(PdfMetadata {
    title:    text_entry(info, "Title"),
    author:   text_entry(info, "Author"),
    subject:  text_entry(info, "Subject"),
    keywords: text_entry(info, "Keywords"),
  })
}

/// Extracts the text of every page, in page order.
pub fn extract_text(path: impl AsRef<Path>) -> Result<String> {
  let doc = Document::load(path)?;
  let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
  if pages.is_empty() {
    return Ok(String::new());
  }
  Ok(doc.extract_text(&pages)?)
}

/// Decodes a text string entry, honoring a UTF-16BE byte order mark. Blank values are `None`.
fn text_entry(dict: &Dictionary, key: &str) -> Option<String> {
  let bytes = dict.get(key.as_bytes()).ok()?.as_str().ok()?;
  let text = if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
    let (decoded, ..) = encoding_rs::UTF_16BE.decode(utf16);
    decoded.into_owned()
  } else {
    String::from_utf8_lossy(bytes).into_owned()
  };
  let text = text.trim();
  (!text.is_empty()).then(|| text.to_string())
}
