//! The success payload of a render job.

/// Bytes produced by a successful render, plus the value for the
/// `Last-Modified` response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfResult {
    /// The PDF file contents.
    pub buffer: Vec<u8>,
    /// HTTP-date formatted last-modified value (from the upstream response
    /// header if present, else the time the render completed).
    pub last_modified: String,
}

impl PdfResult {
    /// Construct a result from its parts.
    #[must_use]
    pub const fn new(buffer: Vec<u8>, last_modified: String) -> Self {
        Self {
            buffer,
            last_modified,
        }
    }
}
