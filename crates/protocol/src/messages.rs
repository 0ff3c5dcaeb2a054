use serde::{Deserialize, Serialize};

use crate::{UPLOAD_FAILED, UPLOAD_SUCCEEDED};

// ---------------------------------------------------------------------------
// Reply payloads
// ---------------------------------------------------------------------------

/// Reply to `list_files`.
///
/// Order follows the storage enumeration and is not stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub filenames: Vec<String>,
}

/// Reply to `upload_file`, sent once per upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
}

impl UploadResponse {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            message: UPLOAD_SUCCEEDED.into(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            message: UPLOAD_FAILED.into(),
        }
    }
}
