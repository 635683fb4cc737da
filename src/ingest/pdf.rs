//! PDF text extraction.

use anyhow::{bail, Context, Result};

/// Extract plain text from PDF bytes. Fails on encrypted or image-only
/// documents rather than indexing empty chunks.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .context("failed to extract text from PDF")?;
    if text.trim().is_empty() {
        bail!("PDF contains no extractable text");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bytes_rejected() {
        assert!(extract_text(b"not a pdf").is_err());
    }
}
