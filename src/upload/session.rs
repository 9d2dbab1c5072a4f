//! Upload sessions / 上传会话
//!
//! A session id correlates every slice of one logical upload. It is either
//! issued by the server through `upload_slice_init`, or supplied by the
//! caller to resume an earlier upload, in which case no init call is made.

use std::collections::BTreeSet;

use super::UploadOptions;
use crate::api::{ApiCall, ApiContext};
use crate::error::{Error, Result, TransportError};
use crate::models::{ServerResponse, SliceInitData};
use crate::transport::{FormValue, RequestBody};

/// State of one multipart upload / 分片上传会话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub session_id: String,
    pub file_size: u64,
    /// Whole-file SHA-1, hex / 整体 SHA-1
    pub sha: String,
    pub slice_size: u64,
    /// Offsets the server has acknowledged / 已确认的分片偏移
    pub uploaded_offsets: BTreeSet<u64>,
    completed: bool,
}

impl UploadSession {
    pub fn new(session_id: impl Into<String>, file_size: u64, sha: impl Into<String>, slice_size: u64) -> Self {
        Self {
            session_id: session_id.into(),
            file_size,
            sha: sha.into(),
            slice_size,
            uploaded_offsets: BTreeSet::new(),
            completed: false,
        }
    }

    /// Record an acknowledged slice; ignored once the session completed / 记录已上传分片
    pub fn mark_uploaded(&mut self, offset: u64) {
        if self.completed {
            tracing::warn!("session {} already completed, ignoring offset {}", self.session_id, offset);
            return;
        }
        self.uploaded_offsets.insert(offset);
    }

    /// Length of the slice planned at `offset`, `None` off the slice grid / 该偏移处分片的计划长度
    pub fn planned_length(&self, offset: u64) -> Option<u64> {
        if self.slice_size == 0 || offset % self.slice_size != 0 || offset >= self.file_size {
            return None;
        }
        Some(self.slice_size.min(self.file_size - offset))
    }

    pub fn is_uploaded(&self, offset: u64) -> bool {
        self.uploaded_offsets.contains(&offset)
    }

    /// Freeze the session / 标记完成
    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// What the controller hands back / 会话获取结果
#[derive(Debug)]
pub struct SessionGrant {
    pub session: UploadSession,
    /// Init response, `None` on resume / 初始化响应
    pub init_response: Option<ServerResponse>,
}

/// Obtains or resumes sessions / 会话控制器
pub struct SessionController<'a> {
    api: &'a ApiContext,
}

impl<'a> SessionController<'a> {
    pub fn new(api: &'a ApiContext) -> Self {
        Self { api }
    }

    /// Resume with `options.session`, or issue an init call / 获取或续用会话
    ///
    /// `slice_size` is the requested size; the server may answer with its own.
    pub async fn init_or_resume(
        &self,
        bucket: &str,
        path: &str,
        file_size: u64,
        sha: &str,
        slice_size: u64,
        options: &UploadOptions,
    ) -> Result<SessionGrant> {
        if let Some(session_id) = &options.session {
            let session_id = session_id.trim();
            if session_id.is_empty() {
                return Err(Error::MissingSessionId);
            }
            tracing::info!("Resuming upload session {} for {}", session_id, path);
            let mut session = UploadSession::new(session_id, file_size, sha, slice_size);
            session.uploaded_offsets = options.uploaded_offsets.clone();
            return Ok(SessionGrant { session, init_response: None });
        }

        let mut fields = vec![
            ("op".to_string(), FormValue::Text("upload_slice_init".to_string())),
            ("filesize".to_string(), FormValue::Text(file_size.to_string())),
            ("slice_size".to_string(), FormValue::Text(slice_size.to_string())),
            ("sha".to_string(), FormValue::Text(sha.to_string())),
            (
                "insertOnly".to_string(),
                FormValue::Text(if options.insert_only { "1" } else { "0" }.to_string()),
            ),
        ];
        if let Some(biz_attr) = &options.biz_attr {
            fields.push(("biz_attr".to_string(), FormValue::Text(biz_attr.clone())));
        }

        let resp = self
            .api
            .call_checked(ApiCall::post(bucket, path, RequestBody::Multipart(fields)))
            .await
            .map_err(Error::SessionInit)?;
        let data: SliceInitData = resp.data_as().map_err(Error::SessionInit)?;

        let already_stored = data.access_url.as_deref().is_some_and(|u| !u.is_empty());
        if data.session.is_empty() && !already_stored {
            return Err(Error::SessionInit(TransportError::Decode(format!(
                "init response carries no session: {}",
                resp.data
            ))));
        }

        let slice_size = match data.slice_size {
            Some(size) if size > 0 => size,
            _ => slice_size,
        };
        let mut session = UploadSession::new(data.session.clone(), file_size, sha, slice_size);
        // A part counts as stored only when it covers the whole planned slice
        let stored: Vec<u64> = data
            .listparts
            .iter()
            .filter(|p| session.planned_length(p.offset) == Some(p.datalen))
            .map(|p| p.offset)
            .collect();
        session.uploaded_offsets.extend(stored);
        if already_stored {
            session.complete();
        }

        tracing::info!(
            "Opened upload session {} for {} ({} bytes, slice {} bytes, {} already stored)",
            session.session_id,
            path,
            file_size,
            slice_size,
            session.uploaded_offsets.len()
        );
        Ok(SessionGrant {
            session,
            init_response: Some(resp),
        })
    }
}
