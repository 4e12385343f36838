//! Media classification for uploaded attachments.

use serde::{Deserialize, Serialize};

/// Coarse media class for an attachment, driving how it is ingested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MimeClass {
    /// PDF document, reduced to text per page before chunking.
    Pdf,
    /// Image, summarized into a single descriptive record.
    Image,
    /// Video, summarized into a single descriptive record.
    Video,
    /// Biological sequence file (FASTA/PDB), chunked as text.
    Sequence,
    /// Plain text, chunked directly.
    Text,
}

impl MimeClass {
    /// Return the class as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeClass::Pdf => "pdf",
            MimeClass::Image => "image",
            MimeClass::Video => "video",
            MimeClass::Sequence => "sequence",
            MimeClass::Text => "text",
        }
    }

    /// Classify an upload from its content type and filename.
    ///
    /// Returns `None` when the attachment is outside the allow-list
    /// {pdf, image/*, video/*, text/plain, fasta, pdb}.
    pub fn classify(content_type: &str, filename: &str) -> Option<Self> {
        let content_type = content_type.trim().to_ascii_lowercase();
        if content_type == "application/pdf" {
            return Some(MimeClass::Pdf);
        }
        if content_type.starts_with("image/") {
            return Some(MimeClass::Image);
        }
        if content_type.starts_with("video/") {
            return Some(MimeClass::Video);
        }
        if sequence_extension(filename) {
            return Some(MimeClass::Sequence);
        }
        if content_type == "text/plain" {
            return Some(MimeClass::Text);
        }
        None
    }

    /// Whether this class yields chunked text records when ingested.
    pub fn is_chunked(&self) -> bool {
        matches!(self, MimeClass::Pdf | MimeClass::Sequence | MimeClass::Text)
    }
}

/// Filename extensions recognized as biological sequence files.
fn sequence_extension(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    ["fasta", "fa", "pdb"]
        .iter()
        .any(|ext| lower.rsplit('.').next() == Some(ext))
}
