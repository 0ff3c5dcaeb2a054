use bytes::Bytes;

/// One framed unit of a streamed transfer.
///
/// An upload stream is exactly one `Header` followed by zero or more
/// `Data` chunks. A download stream is `Data` chunks only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChunk {
    /// Names the destination file. Only valid as the first upload chunk.
    Header { filename: String },
    /// A slice of file content.
    Data(Bytes),
}

impl FileChunk {
    /// Creates a header chunk.
    pub fn header(filename: impl Into<String>) -> Self {
        Self::Header {
            filename: filename.into(),
        }
    }

    /// Creates a content chunk.
    pub fn data(content: impl Into<Bytes>) -> Self {
        Self::Data(content.into())
    }

    /// Returns the content bytes, or `None` for a header.
    pub fn content(&self) -> Option<&Bytes> {
        match self {
            Self::Data(bytes) => Some(bytes),
            Self::Header { .. } => None,
        }
    }

    /// Returns `true` for a header chunk.
    pub fn is_header(&self) -> bool {
        matches!(self, Self::Header { .. })
    }
}
