use serde::{Deserialize, Serialize};

/// RPC methods exposed by the transfer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    ListFiles,
    UploadFile,
    DownloadFile,
}

/// Opens a call on the RPC channel.
///
/// `filename` is only meaningful for [`Method::DownloadFile`]; uploads
/// carry their filename in the first chunk instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Call {
    pub fn list_files() -> Self {
        Self {
            method: Method::ListFiles,
            filename: None,
        }
    }

    pub fn upload_file() -> Self {
        Self {
            method: Method::UploadFile,
            filename: None,
        }
    }

    pub fn download_file(filename: impl Into<String>) -> Self {
        Self {
            method: Method::DownloadFile,
            filename: Some(filename.into()),
        }
    }
}

/// Outcome class of a call, sent as the last frame of every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    NotFound,
    InvalidArgument,
    Internal,
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::NotFound => "not found",
            Self::InvalidArgument => "invalid argument",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Trailing status of a call.
///
/// The message is carried verbatim from the service to the gateway and
/// from there into the HTTP error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}
