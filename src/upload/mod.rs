//! Multipart (slice) upload / 分片上传
//!
//! Flow: init or resume a session, plan slices, upload them strictly in
//! offset order, surface the last response as the result. Nothing is retried
//! inside one call; resuming means calling again with the same session id.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

mod orchestrator;
mod plan;
mod session;
mod slice;
mod source;

pub use orchestrator::{MultipartOrchestrator, UploadEvent, UploadProgress, UploadState};
pub use plan::{plan_slices, SlicePlan};
pub use session::{SessionController, SessionGrant, UploadSession};
pub use slice::{SliceAck, SliceUploader};
pub use source::{sha1_hex, SliceSource, UploadSource};

/// Progress callback, receives the completed fraction in `(0, 1]`.
/// Returning `Err` aborts the upload / 进度回调，返回错误将中止上传
pub type ProgressCallback = Box<dyn FnMut(f64) -> Result<(), BoxError> + Send>;

/// Recognized upload options / 上传选项
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Overrides the configured bucket / 覆盖默认存储桶
    pub bucket: Option<String>,
    /// Opaque caller metadata, passed through unmodified / 业务属性
    pub biz_attr: Option<String>,
    /// Resume the session with this id; no init call is made / 续传会话ID
    pub session: Option<String>,
    /// Overrides the configured slice size / 分片大小
    pub slice_size: Option<u64>,
    /// Refuse to overwrite an existing object / 不覆盖已存在文件
    pub insert_only: bool,
    /// Offsets known to be stored already, used with `session` / 已上传的分片偏移
    pub uploaded_offsets: BTreeSet<u64>,
    /// Checked between slices / 取消信号(分片之间检查)
    pub cancel: Option<CancellationToken>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            bucket: None,
            biz_attr: None,
            session: None,
            slice_size: None,
            insert_only: true,
            uploaded_offsets: BTreeSet::new(),
            cancel: None,
        }
    }
}

impl UploadOptions {
    /// Options resuming `session_id` / 续传选项
    pub fn resume(session_id: impl Into<String>) -> Self {
        Self {
            session: Some(session_id.into()),
            ..Default::default()
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_biz_attr(mut self, biz_attr: impl Into<String>) -> Self {
        self.biz_attr = Some(biz_attr.into());
        self
    }

    pub fn with_slice_size(mut self, slice_size: u64) -> Self {
        self.slice_size = Some(slice_size);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn overwrite(mut self) -> Self {
        self.insert_only = false;
        self
    }
}

/// Wrap an infallible closure as a [`ProgressCallback`] / 包装不会失败的回调
pub fn progress_fn<F>(mut f: F) -> ProgressCallback
where
    F: FnMut(f64) + Send + 'static,
{
    Box::new(move |fraction| {
        f(fraction);
        Ok(())
    })
}
