//! Client facade / 客户端入口
//!
//! Folder and file management plus the two upload paths. Every method
//! validates its paths before anything is signed or sent.

use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use serde_json::json;

use crate::api::{ApiCall, ApiContext};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{FileStat, ListData, ServerResponse, UploadData, UploadResult, UploadStatus};
use crate::transport::{FormValue, HttpTransport, RequestBody, Signer, Transport};
use crate::upload::{
    sha1_hex, MultipartOrchestrator, ProgressCallback, SliceSource, UploadEvent, UploadOptions,
    UploadSource,
};
use crate::utils::{validate_file_path, validate_folder_path};

/// Largest page the list call accepts / 单次列出上限
pub const MAX_LIST_NUM: u32 = 199;

/// Which entries a listing returns / 列出类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPattern {
    #[default]
    Both,
    DirOnly,
    FileOnly,
}

impl ListPattern {
    fn as_str(&self) -> &'static str {
        match self {
            ListPattern::Both => "eListBoth",
            ListPattern::DirOnly => "eListDirOnly",
            ListPattern::FileOnly => "eListFileOnly",
        }
    }
}

/// Folder listing options / 目录列出选项
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Page size, clamped to `1..=MAX_LIST_NUM` / 每页数量
    pub num: u32,
    /// Continuation token from the previous page / 翻页上下文
    pub context: Option<String>,
    pub pattern: ListPattern,
    /// Reverse order when set / 是否倒序
    pub reverse: bool,
    /// Only names starting with this prefix / 前缀过滤
    pub prefix: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            num: 20,
            context: None,
            pattern: ListPattern::Both,
            reverse: false,
            prefix: None,
        }
    }
}

/// Object storage client / 对象存储客户端
#[derive(Clone)]
pub struct CosClient {
    config: ClientConfig,
    api: ApiContext,
}

impl CosClient {
    pub fn new(config: ClientConfig, signer: Arc<dyn Signer>, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let api = ApiContext::new(transport, signer, config.app_id.clone(), config.sign_expire_secs);
        Ok(Self { config, api })
    }

    /// Client over the reqwest transport / 使用 HTTP 传输创建客户端
    pub fn with_http(config: ClientConfig, signer: Arc<dyn Signer>) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::new(config, signer, Arc::new(transport))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn bucket<'a>(&'a self, bucket: Option<&'a str>) -> Result<&'a str> {
        bucket
            .filter(|b| !b.trim().is_empty())
            .or_else(|| Some(self.config.bucket.as_str()).filter(|b| !b.trim().is_empty()))
            .ok_or_else(|| Error::InvalidConfig("no bucket given and none configured".to_string()))
    }

    // ---------- folders / 目录 ----------

    /// Create a folder; `path` must end with `/` / 创建目录
    pub async fn create_folder(&self, path: &str, biz_attr: Option<&str>) -> Result<ServerResponse> {
        let path = non_root_folder(path)?;
        let bucket = self.bucket(None)?;
        let body = json!({"op": "create", "biz_attr": biz_attr.unwrap_or_default()});
        let resp = self
            .api
            .call_checked(ApiCall::post(bucket, &path, RequestBody::Json(body)))
            .await?;
        tracing::info!("Created folder {}", path);
        Ok(resp)
    }

    /// Delete an empty folder / 删除目录
    pub async fn delete_folder(&self, path: &str) -> Result<ServerResponse> {
        let path = non_root_folder(path)?;
        self.delete(&path).await
    }

    pub async fn stat_folder(&self, path: &str) -> Result<FileStat> {
        let path = validate_folder_path(path)?;
        self.stat(&path).await
    }

    /// Replace the folder's `biz_attr` / 更新目录属性
    pub async fn update_folder(&self, path: &str, biz_attr: &str) -> Result<ServerResponse> {
        let path = non_root_folder(path)?;
        self.update(&path, biz_attr).await
    }

    /// One page of a folder listing / 列出目录
    pub async fn list_folder(&self, path: &str, options: &ListOptions) -> Result<ListData> {
        let mut path = validate_folder_path(path)?;
        // The prefix is appended to the folder path
        if let Some(prefix) = options.prefix.as_deref().filter(|p| !p.is_empty()) {
            path.push_str(prefix);
        }
        let bucket = self.bucket(None)?;
        let mut call = ApiCall::get(bucket, &path)
            .query("op", "list")
            .query("num", options.num.clamp(1, MAX_LIST_NUM).to_string())
            .query("pattern", options.pattern.as_str())
            .query("order", if options.reverse { "1" } else { "0" });
        if let Some(context) = options.context.as_deref().filter(|c| !c.is_empty()) {
            call = call.query("context", context);
        }
        let resp = self.api.call_checked(call).await?;
        Ok(resp.data_as()?)
    }

    // ---------- files / 文件 ----------

    pub async fn delete_file(&self, path: &str) -> Result<ServerResponse> {
        let path = validate_file_path(path)?;
        self.delete(&path).await
    }

    pub async fn stat_file(&self, path: &str) -> Result<FileStat> {
        let path = validate_file_path(path)?;
        self.stat(&path).await
    }

    pub async fn update_file(&self, path: &str, biz_attr: &str) -> Result<ServerResponse> {
        let path = validate_file_path(path)?;
        self.update(&path, biz_attr).await
    }

    async fn delete(&self, path: &str) -> Result<ServerResponse> {
        let bucket = self.bucket(None)?;
        let resp = self
            .api
            .call_checked(ApiCall::post(bucket, path, RequestBody::Json(json!({"op": "delete"}))).sign_once())
            .await?;
        tracing::info!("Deleted {}", path);
        Ok(resp)
    }

    async fn stat(&self, path: &str) -> Result<FileStat> {
        let bucket = self.bucket(None)?;
        let resp = self
            .api
            .call_checked(ApiCall::get(bucket, path).query("op", "stat"))
            .await?;
        Ok(resp.data_as()?)
    }

    async fn update(&self, path: &str, biz_attr: &str) -> Result<ServerResponse> {
        let bucket = self.bucket(None)?;
        let body = json!({"op": "update", "biz_attr": biz_attr});
        Ok(self
            .api
            .call_checked(ApiCall::post(bucket, path, RequestBody::Json(body)).sign_once())
            .await?)
    }

    // ---------- uploads / 上传 ----------

    /// Upload the whole source in one request / 简单上传
    pub async fn upload(&self, dst: &str, src: impl Into<UploadSource>, options: UploadOptions) -> Result<UploadResult> {
        let path = validate_file_path(dst)?;
        let bucket = self.bucket(options.bucket.as_deref())?;
        let mut source = SliceSource::open(src.into()).await?;
        let data = source.read_range(0, source.len()).await?;
        let sha = sha1_hex(&data);

        let mut fields = vec![
            ("op".to_string(), FormValue::Text("upload".to_string())),
            (
                "filecontent".to_string(),
                FormValue::File {
                    data,
                    file_name: source.file_name(),
                },
            ),
            ("sha".to_string(), FormValue::Text(sha)),
            (
                "insertOnly".to_string(),
                FormValue::Text(if options.insert_only { "1" } else { "0" }.to_string()),
            ),
        ];
        if let Some(biz_attr) = &options.biz_attr {
            fields.push(("biz_attr".to_string(), FormValue::Text(biz_attr.clone())));
        }

        let resp = match self
            .api
            .call_checked(ApiCall::post(bucket, &path, RequestBody::Multipart(fields)))
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Upload of {} failed: {}", path, e);
                return Ok(UploadResult::failed(String::new(), None, Error::Transport(e)));
            }
        };
        let complete = resp.data_as::<UploadData>().is_ok_and(|d| d.is_complete());
        tracing::info!("Uploaded {} ({} bytes)", path, source.len());
        Ok(UploadResult {
            status: if complete { UploadStatus::Success } else { UploadStatus::Partial },
            server_response: Some(resp),
            session_id: String::new(),
            error: None,
        })
    }

    /// Orchestrator for one slice upload / 创建分片上传编排器
    pub fn slice_orchestrator(
        &self,
        dst: &str,
        src: impl Into<UploadSource>,
        options: UploadOptions,
    ) -> Result<MultipartOrchestrator> {
        let bucket = self.bucket(options.bucket.as_deref())?.to_string();
        Ok(MultipartOrchestrator::new(
            self.api.clone(),
            bucket,
            dst,
            src.into(),
            options,
            self.config.slice_size,
        ))
    }

    /// Multipart upload with optional progress callback / 分片上传
    pub async fn upload_slice(
        &self,
        dst: &str,
        src: impl Into<UploadSource>,
        options: UploadOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadResult> {
        self.slice_orchestrator(dst, src, options)?.run(progress).await
    }

    /// Multipart upload of an in-memory buffer / 内存数据分片上传
    pub async fn upload_slice_bytes(
        &self,
        dst: &str,
        data: Bytes,
        options: UploadOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadResult> {
        self.upload_slice(dst, data, options, progress).await
    }

    /// Multipart upload as a stream of progress events / 以事件流方式分片上传
    pub fn upload_slice_events(
        &self,
        dst: &str,
        src: impl Into<UploadSource>,
        options: UploadOptions,
    ) -> Result<impl Stream<Item = Result<UploadEvent>> + Send> {
        Ok(self.slice_orchestrator(dst, src, options)?.into_events())
    }

    /// Simple upload below `slice_threshold`, multipart at or above it / 自动选择上传方式
    pub async fn upload_file(
        &self,
        dst: &str,
        src: impl Into<UploadSource>,
        options: UploadOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadResult> {
        validate_file_path(dst)?;
        let src = src.into();
        let size = match &src {
            UploadSource::Bytes(data) => data.len() as u64,
            UploadSource::Path(path) => match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() => meta.len(),
                _ => return Err(Error::FileNotExist(path.clone())),
            },
        };
        if size < self.config.slice_threshold && options.session.is_none() {
            tracing::debug!("{} bytes below slice threshold, simple upload", size);
            let mut progress = progress;
            let result = self.upload(dst, src, options).await?;
            if result.is_success() {
                if let Some(callback) = progress.as_mut() {
                    if let Err(e) = callback(1.0) {
                        return Ok(UploadResult::failed(
                            result.session_id,
                            result.server_response,
                            Error::ProgressCallback(e),
                        ));
                    }
                }
            }
            return Ok(result);
        }
        self.upload_slice(dst, src, options, progress).await
    }
}

fn non_root_folder(path: &str) -> Result<String> {
    let cleaned = validate_folder_path(path)?;
    if cleaned == "/" {
        return Err(Error::InvalidFolderPath(path.to_string()));
    }
    Ok(cleaned)
}
