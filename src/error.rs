//! Error taxonomy / 错误分类
//!
//! Validation errors are raised before any network call. Everything that
//! happens after the first request is surfaced through [`Error::SessionInit`],
//! [`Error::SliceTransport`], [`Error::SliceIntegrity`] or [`Error::Cancelled`].

use std::path::PathBuf;

/// Boxed error returned by caller-supplied callbacks / 回调返回的错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Crate-wide result alias / 结果别名
pub type Result<T> = std::result::Result<T, Error>;

/// Failure produced by a [`Signer`](crate::transport::Signer) / 签名失败
#[derive(Debug, thiserror::Error)]
#[error("sign failed: {0}")]
pub struct SignError(pub String);

/// Failure of one signed request / 单次请求失败
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Server answered with a non-zero `code` / 服务端返回错误码
    #[error("server error {code}: {message}")]
    Api { code: i64, message: String },

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// SDK error / SDK错误
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Destination is not a legal file path (empty, root, or ends with `/`)
    #[error("invalid file path: {0}")]
    InvalidFilePath(String),

    /// Folder operations need a path ending with `/`
    #[error("invalid folder path: {0}")]
    InvalidFolderPath(String),

    #[error("local file does not exist: {0}")]
    FileNotExist(PathBuf),

    /// Resume requested with an empty session id / 续传缺少 session
    #[error("resume requested but no session id supplied")]
    MissingSessionId,

    #[error("slice size must be positive, got {0}")]
    InvalidSliceSize(u64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Init call failed; no session can be assumed / 初始化分片上传失败
    #[error("failed to initialise upload session: {0}")]
    SessionInit(#[source] TransportError),

    /// A slice failed in transit; resumable with the same session id
    #[error("slice at offset {offset} failed: {source}")]
    SliceTransport {
        offset: u64,
        #[source]
        source: TransportError,
    },

    /// Server reported a hash mismatch for a slice / 分片校验失败
    #[error("slice at offset {offset} failed integrity check: {message}")]
    SliceIntegrity { offset: u64, message: String },

    #[error("upload cancelled")]
    Cancelled,

    /// The progress callback returned an error and aborted the upload
    #[error("progress callback aborted upload: {0}")]
    ProgressCallback(#[source] BoxError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for input errors raised before any network call / 是否为参数校验错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidFilePath(_)
                | Error::InvalidFolderPath(_)
                | Error::FileNotExist(_)
                | Error::MissingSessionId
                | Error::InvalidSliceSize(_)
                | Error::InvalidConfig(_)
        )
    }

    /// True when re-invoking the upload with the same session id may finish it
    /// / 是否可以使用同一 session 续传
    pub fn is_resumable(&self) -> bool {
        matches!(self, Error::SliceTransport { .. } | Error::Cancelled)
    }
}
