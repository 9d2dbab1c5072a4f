//! Multipart upload orchestration / 分片上传编排
//!
//! `Init -> Sessioned -> Uploading -> Finalizing -> {Done, Failed}`
//!
//! Slices go out one at a time in offset order; slice N+1 is not read until
//! slice N is acknowledged. The orchestrator can be driven with a callback
//! ([`MultipartOrchestrator::run`]) or pulled as a stream of events
//! ([`MultipartOrchestrator::into_events`]).

use std::collections::VecDeque;

use futures::Stream;

use super::plan::{plan_slices, SlicePlan};
use super::session::{SessionController, UploadSession};
use super::slice::SliceUploader;
use super::source::{SliceSource, UploadSource};
use super::{ProgressCallback, UploadOptions};
use crate::api::{ApiCall, ApiContext};
use crate::error::{Error, Result};
use crate::models::{ServerResponse, UploadData, UploadResult, UploadStatus};
use crate::transport::{FormValue, RequestBody};
use crate::utils::validate_file_path;

/// Orchestrator phase / 编排阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Init,
    Sessioned,
    Uploading,
    Finalizing,
    Done,
    Failed,
}

/// One completed slice / 单个分片完成进度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub offset: u64,
    pub length: u64,
    /// `(offset + length) / file_size` / 完成比例
    pub fraction: f64,
}

/// Item of the event stream / 上传事件
#[derive(Debug)]
pub enum UploadEvent {
    Progress(UploadProgress),
    Finished(UploadResult),
}

/// Drives one slice upload / 分片上传编排器
pub struct MultipartOrchestrator {
    api: ApiContext,
    bucket: String,
    dst: String,
    path: String,
    options: UploadOptions,
    default_slice_size: u64,
    state: UploadState,
    pending_source: Option<UploadSource>,
    source: Option<SliceSource>,
    file_name: String,
    session: Option<UploadSession>,
    init_response: Option<ServerResponse>,
    slices: VecDeque<SlicePlan>,
    last_response: Option<ServerResponse>,
    last_fraction: f64,
    pending_result: Option<UploadResult>,
}

impl MultipartOrchestrator {
    pub fn new(
        api: ApiContext,
        bucket: impl Into<String>,
        dst: impl Into<String>,
        source: UploadSource,
        options: UploadOptions,
        default_slice_size: u64,
    ) -> Self {
        Self {
            api,
            bucket: bucket.into(),
            dst: dst.into(),
            path: String::new(),
            options,
            default_slice_size,
            state: UploadState::Init,
            pending_source: Some(source),
            source: None,
            file_name: String::new(),
            session: None,
            init_response: None,
            slices: VecDeque::new(),
            last_response: None,
            last_fraction: 0.0,
            pending_result: None,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    /// Advance until the next event; `None` once a terminal state was reported
    /// / 推进到下一个事件
    pub async fn next_event(&mut self) -> Result<Option<UploadEvent>> {
        loop {
            let step = match self.state {
                UploadState::Init => self.open_session().await.map(|_| None),
                UploadState::Sessioned => self.plan().map(|_| None),
                UploadState::Uploading => self.upload_next().await,
                UploadState::Finalizing => self.finalize().await,
                UploadState::Done => return Ok(self.pending_result.take().map(UploadEvent::Finished)),
                UploadState::Failed => return Ok(None),
            };
            match step {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => continue,
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Run to completion, reporting progress through `progress` / 执行上传
    ///
    /// Input errors come back as `Err` before any request is made; anything
    /// failing later is reported as a `Failed` result carrying the cause.
    pub async fn run(mut self, mut progress: Option<ProgressCallback>) -> Result<UploadResult> {
        loop {
            match self.next_event().await {
                Ok(Some(UploadEvent::Progress(p))) => {
                    if let Some(callback) = progress.as_mut() {
                        if let Err(e) = callback(p.fraction) {
                            let err = self.fail(Error::ProgressCallback(e));
                            return Ok(self.failed_result(err));
                        }
                    }
                }
                Ok(Some(UploadEvent::Finished(result))) => return Ok(result),
                Ok(None) => {
                    let err = Error::InvalidConfig("upload already finished".to_string());
                    return Ok(self.failed_result(err));
                }
                Err(e) if e.is_validation() => return Err(e),
                Err(e) => return Ok(self.failed_result(e)),
            }
        }
    }

    /// Finite, not restartable stream of events; errors end the stream
    /// / 以事件流方式驱动上传
    pub fn into_events(self) -> impl Stream<Item = Result<UploadEvent>> + Send {
        futures::stream::try_unfold(self, |mut orchestrator| async move {
            Ok(orchestrator
                .next_event()
                .await?
                .map(|event| (event, orchestrator)))
        })
    }

    fn fail(&mut self, err: Error) -> Error {
        if !err.is_validation() {
            tracing::warn!("Upload of {} failed: {}", self.dst, err);
        }
        self.state = UploadState::Failed;
        self.source = None;
        err
    }

    fn failed_result(&self, err: Error) -> UploadResult {
        let session_id = self
            .session
            .as_ref()
            .map(|s| s.session_id.clone())
            .unwrap_or_default();
        UploadResult::failed(session_id, self.last_response.clone(), err)
    }

    /// Init: validate input, open the source, obtain the session / 校验并获取会话
    async fn open_session(&mut self) -> Result<()> {
        self.path = validate_file_path(&self.dst)?;
        if matches!(&self.options.session, Some(id) if id.trim().is_empty()) {
            return Err(Error::MissingSessionId);
        }
        let slice_size = self.options.slice_size.unwrap_or(self.default_slice_size);
        if slice_size == 0 {
            return Err(Error::InvalidSliceSize(slice_size));
        }
        let source = self
            .pending_source
            .take()
            .ok_or_else(|| Error::InvalidConfig("upload source already consumed".to_string()))?;
        let mut source = SliceSource::open(source).await?;
        let sha = source.sha1_hex().await?;
        self.file_name = source.file_name();
        let file_size = source.len();
        self.source = Some(source);

        let grant = SessionController::new(&self.api)
            .init_or_resume(&self.bucket, &self.path, file_size, &sha, slice_size, &self.options)
            .await?;
        self.session = Some(grant.session);
        self.init_response = grant.init_response;
        self.state = UploadState::Sessioned;
        Ok(())
    }

    /// Sessioned: compute the slice plan / 计算分片计划
    fn plan(&mut self) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Err(Error::InvalidConfig("upload session not open".to_string()));
        };
        if session.is_completed() {
            tracing::info!("{} already stored, skipping slices", self.path);
            self.last_response = self.init_response.take();
            self.state = UploadState::Finalizing;
            return Ok(());
        }
        self.slices = plan_slices(session.file_size, session.slice_size).into();
        tracing::debug!("{} planned as {} slices", self.path, self.slices.len());
        self.state = UploadState::Uploading;
        Ok(())
    }

    /// Uploading: send the next slice / 上传下一个分片
    async fn upload_next(&mut self) -> Result<Option<UploadEvent>> {
        let Some(slice) = self.slices.pop_front() else {
            self.state = UploadState::Finalizing;
            return Ok(None);
        };
        // Only checked while a slice is still pending
        if self.options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Err(Error::Cancelled);
        }
        let (Some(session), Some(source)) = (self.session.as_mut(), self.source.as_mut()) else {
            return Err(Error::InvalidConfig("upload session not open".to_string()));
        };

        // The final slice also finalizes the file, so it is always sent
        let is_last = self.slices.is_empty();
        if !is_last && session.is_uploaded(slice.offset) {
            tracing::debug!("Slice {}+{} already stored, skipping", slice.offset, slice.length);
            return Ok(None);
        }

        let data = source.read_range(slice.offset, slice.length).await?;
        let ack = SliceUploader::new(&self.api)
            .upload_one(
                &self.bucket,
                &self.path,
                &session.session_id,
                slice.offset,
                data,
                &self.file_name,
            )
            .await?;
        session.mark_uploaded(ack.offset);
        self.last_response = Some(ack.response);

        let fraction = slice.end() as f64 / session.file_size as f64;
        self.last_fraction = fraction;
        Ok(Some(UploadEvent::Progress(UploadProgress {
            offset: slice.offset,
            length: slice.length,
            fraction,
        })))
    }

    /// Finalizing: build the terminal result / 生成最终结果
    async fn finalize(&mut self) -> Result<Option<UploadEvent>> {
        let Some(session) = self.session.as_mut() else {
            return Err(Error::InvalidConfig("upload session not open".to_string()));
        };

        if self.last_response.is_none() {
            // Nothing was sent (empty source), close the session explicitly
            let fields = vec![
                ("op".to_string(), FormValue::Text("upload_slice_finish".to_string())),
                ("session".to_string(), FormValue::Text(session.session_id.clone())),
                ("filesize".to_string(), FormValue::Text(session.file_size.to_string())),
                ("sha".to_string(), FormValue::Text(session.sha.clone())),
            ];
            let offset = session.file_size;
            let resp = self
                .api
                .call_checked(ApiCall::post(&self.bucket, &self.path, RequestBody::Multipart(fields)))
                .await
                .map_err(|source| Error::SliceTransport { offset, source })?;
            self.last_response = Some(resp);
        }

        let complete = self
            .last_response
            .as_ref()
            .and_then(|resp| resp.data_as::<UploadData>().ok())
            .is_some_and(|data| data.is_complete());
        let status = if complete {
            session.complete();
            UploadStatus::Success
        } else {
            UploadStatus::Partial
        };
        tracing::info!("Upload of {} finished: {:?} (session {})", self.path, status, session.session_id);

        let result = UploadResult {
            status,
            server_response: self.last_response.clone(),
            session_id: session.session_id.clone(),
            error: None,
        };
        self.state = UploadState::Done;
        self.source = None;

        if complete && self.last_fraction < 1.0 {
            // Empty or already stored content: no slice reported 1.0 yet
            self.last_fraction = 1.0;
            self.pending_result = Some(result);
            return Ok(Some(UploadEvent::Progress(UploadProgress {
                offset: session.file_size,
                length: 0,
                fraction: 1.0,
            })));
        }
        Ok(Some(UploadEvent::Finished(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, TransportError};
    use crate::transport::mock::MockTransport;
    use crate::transport::StaticSigner;
    use crate::upload::progress_fn;
    use bytes::Bytes;
    use futures::StreamExt;
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    const KB: u64 = 1024;

    fn ctx(transport: Arc<MockTransport>) -> ApiContext {
        ApiContext::new(transport, Arc::new(StaticSigner::new("tok")), "125", 60)
    }

    fn payload(len: u64) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    fn orchestrator(transport: Arc<MockTransport>, dst: &str, source: UploadSource, options: UploadOptions) -> MultipartOrchestrator {
        MultipartOrchestrator::new(ctx(transport), "media", dst, source, options, 3 * KB)
    }

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, ProgressCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        (seen, progress_fn(move |f| seen_clone.lock().unwrap().push(f)))
    }

    fn slice_offsets(transport: &MockTransport) -> Vec<String> {
        transport
            .requests()
            .iter()
            .filter(|r| r.op().as_deref() == Some("upload_slice_data"))
            .filter_map(|r| r.field("offset"))
            .collect()
    }

    #[tokio::test]
    async fn test_seven_by_three_succeeds_in_order() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s-7"}));
        transport.push_ok(json!({"offset": 0}));
        transport.push_ok(json!({"offset": 3072}));
        transport.push_ok(json!({"access_url": "http://cdn/media/a.bin"}));
        let (seen, callback) = recorder();

        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(Some(callback))
            .await
            .unwrap();

        assert_eq!(result.status, UploadStatus::Success);
        assert_eq!(result.session_id, "s-7");
        assert_eq!(result.upload_data().unwrap().access_url.as_deref(), Some("http://cdn/media/a.bin"));
        assert_eq!(slice_offsets(&transport), vec!["0", "3072", "6144"]);

        let fractions = seen.lock().unwrap().clone();
        assert_eq!(fractions.len(), 3);
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*fractions.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_transport_error_stops_sequence() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s-7"}));
        transport.push_ok(json!({"offset": 0}));
        transport.push_err(TransportError::Status { status: 502, body: "bad gateway".into() });
        transport.push_ok(json!({"access_url": "never"}));
        let (seen, callback) = recorder();

        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(Some(callback))
            .await
            .unwrap();

        assert_eq!(result.status, UploadStatus::Failed);
        assert_eq!(result.session_id, "s-7");
        assert!(matches!(result.error, Some(Error::SliceTransport { offset: 3072, .. })));
        assert_eq!(slice_offsets(&transport), vec!["0", "3072"]);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_never_calls_init() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({}));
        transport.push_ok(json!({"access_url": "http://cdn/a"}));

        let orch = orchestrator(
            transport.clone(),
            "/a.bin",
            payload(5 * KB).into(),
            UploadOptions::resume("abc"),
        );
        let result = orch.run(None).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.session_id, "abc");
        assert!(!transport.ops().contains(&"upload_slice_init".to_string()));
        assert!(transport.requests().iter().all(|r| r.field("session").as_deref() == Some("abc")));
    }

    #[tokio::test]
    async fn test_resume_skips_known_offsets_but_sends_last() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"access_url": "http://cdn/a"}));

        let options = UploadOptions {
            uploaded_offsets: [0, 3 * KB, 6 * KB].into_iter().collect(),
            ..UploadOptions::resume("abc")
        };
        let result = orchestrator(transport.clone(), "/a.bin", payload(10 * KB).into(), options)
            .run(None)
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(slice_offsets(&transport), vec!["9216"]);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_directory_destination_rejected_before_network() {
        let transport = Arc::new(MockTransport::new());
        let err = orchestrator(transport.clone(), "/photos/", payload(10).into(), UploadOptions::default())
            .run(None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFilePath(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_rejected_before_network() {
        let transport = Arc::new(MockTransport::new());
        let err = orchestrator(
            transport.clone(),
            "/a.bin",
            UploadSource::Path("/no/such/file.bin".into()),
            UploadOptions::default(),
        )
        .run(None)
        .await
        .unwrap_err();
        assert!(matches!(err, Error::FileNotExist(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_session_rejected_before_network() {
        let transport = Arc::new(MockTransport::new());
        let err = orchestrator(transport.clone(), "/a.bin", payload(10).into(), UploadOptions::resume(""))
            .run(None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingSessionId));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_session_init_failure_is_failed_result() {
        let transport = Arc::new(MockTransport::new());
        transport.push_code(-70, "bucket not exist");
        let result = orchestrator(transport.clone(), "/a.bin", payload(10).into(), UploadOptions::default())
            .run(None)
            .await
            .unwrap();
        assert_eq!(result.status, UploadStatus::Failed);
        assert!(result.session_id.is_empty());
        assert!(matches!(result.error, Some(Error::SessionInit(_))));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_integrity_error_is_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_code(crate::models::CODE_SHA_MISMATCH, "sha mismatch");
        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(None)
            .await
            .unwrap();
        assert!(matches!(result.error, Some(Error::SliceIntegrity { offset: 0, .. })));
        assert_eq!(slice_offsets(&transport).len(), 1);
    }

    #[tokio::test]
    async fn test_callback_error_aborts() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({}));
        let callback: ProgressCallback =
            Box::new(|_: f64| -> std::result::Result<(), BoxError> { Err("disk full".into()) });

        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(Some(callback))
            .await
            .unwrap();
        assert_eq!(result.status, UploadStatus::Failed);
        assert!(matches!(result.error, Some(Error::ProgressCallback(_))));
        assert_eq!(slice_offsets(&transport).len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_between_slices() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({}));
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let callback = progress_fn(move |_| cancel_clone.cancel());

        let result = orchestrator(
            transport.clone(),
            "/a.bin",
            payload(7 * KB).into(),
            UploadOptions::default().with_cancel(cancel),
        )
        .run(Some(callback))
        .await
        .unwrap();
        assert_eq!(result.status, UploadStatus::Failed);
        assert!(matches!(result.error, Some(Error::Cancelled)));
        assert_eq!(slice_offsets(&transport).len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_after_last_slice_still_succeeds() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({"access_url": "http://cdn/a"}));
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback = progress_fn(move |f| {
            seen_clone.lock().unwrap().push(f);
            if f >= 1.0 {
                cancel_clone.cancel();
            }
        });

        let result = orchestrator(
            transport.clone(),
            "/a.bin",
            payload(5000).into(),
            UploadOptions::default().with_cancel(cancel.clone()),
        )
        .run(Some(callback))
        .await
        .unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(result.status, UploadStatus::Success);
        assert!(result.error.is_none());
        assert_eq!(*seen.lock().unwrap(), vec![3072.0 / 5000.0, 1.0]);
    }

    #[tokio::test]
    async fn test_short_server_part_is_sent_again() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s", "listparts": [{"offset": 0, "datalen": 10}]}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({"access_url": "http://cdn/a"}));

        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(None)
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(slice_offsets(&transport), vec!["0", "3072", "6144"]);
    }

    #[tokio::test]
    async fn test_full_server_part_is_skipped() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s", "listparts": [{"offset": 0, "datalen": 3072}]}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({"access_url": "http://cdn/a"}));

        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(None)
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(slice_offsets(&transport), vec!["3072", "6144"]);
    }

    #[tokio::test]
    async fn test_plan_without_session_fails_cleanly() {
        let transport = Arc::new(MockTransport::new());
        let mut orch = orchestrator(transport, "/a.bin", payload(10).into(), UploadOptions::default());
        orch.state = UploadState::Sessioned;
        let err = orch.next_event().await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(orch.state(), UploadState::Failed);
        assert!(orch.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_slice_size_wins() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s", "slice_size": 4096}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({"access_url": "http://cdn/a"}));
        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(None)
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(slice_offsets(&transport), vec!["0", "4096"]);
    }

    #[tokio::test]
    async fn test_already_stored_content() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"access_url": "http://cdn/a"}));
        let (seen, callback) = recorder();
        let result = orchestrator(transport.clone(), "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .run(Some(callback))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_empty_source_finishes_explicitly() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_ok(json!({"access_url": "http://cdn/empty"}));
        let (seen, callback) = recorder();
        let result = orchestrator(transport.clone(), "/empty.txt", Bytes::new().into(), UploadOptions::default())
            .run(Some(callback))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(transport.ops(), vec!["upload_slice_init", "upload_slice_finish"]);
        assert_eq!(*seen.lock().unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_missing_completion_is_partial() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_ok(json!({"offset": 0}));
        let result = orchestrator(transport, "/a.bin", payload(KB).into(), UploadOptions::default())
            .run(None)
            .await
            .unwrap();
        assert_eq!(result.status, UploadStatus::Partial);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_file_source_and_event_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("movie.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&payload(7 * KB))
            .unwrap();

        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({}));
        transport.push_ok(json!({"access_url": "http://cdn/movie.bin"}));

        let events: Vec<_> = orchestrator(transport.clone(), "/movie.bin", path.into(), UploadOptions::default())
            .into_events()
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        let fractions: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                Ok(UploadEvent::Progress(p)) => Some(p.fraction),
                _ => None,
            })
            .collect();
        assert_eq!(fractions.len(), 3);
        assert_eq!(fractions[2], 1.0);
        assert!(matches!(events.last(), Some(Ok(UploadEvent::Finished(r))) if r.is_success()));

        let third = &transport.requests()[3];
        assert_eq!(third.file_field("filecontent").unwrap().len(), KB as usize);
        assert_eq!(third.field("filecontent").as_deref(), Some("movie.bin"));
    }

    #[tokio::test]
    async fn test_event_stream_ends_on_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s"}));
        transport.push_err(TransportError::Decode("eof".into()));

        let events: Vec<_> = orchestrator(transport, "/a.bin", payload(7 * KB).into(), UploadOptions::default())
            .into_events()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::SliceTransport { offset: 0, .. })));
    }
}
