//! Wire models / 接口数据模型
//!
//! Every call answers with the same envelope: `{ "code", "message", "data" }`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, TransportError};

/// Server code reporting a slice hash mismatch / 分片 SHA 校验不一致
pub const CODE_SHA_MISMATCH: i64 = -174;

/// Response envelope / 响应结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    /// 0 means success / 0 表示成功
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ServerResponse {
    /// Successful response carrying `data` / 构造成功响应
    pub fn ok(data: Value) -> Self {
        Self {
            code: 0,
            message: "SUCCESS".to_string(),
            data,
            request_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero code into [`TransportError::Api`] / 非零错误码转为错误
    pub fn check(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Api {
                code: self.code,
                message: self.message,
            })
        }
    }

    /// Decode `data` into a typed payload / 解析 data 字段
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        let data = if self.data.is_null() {
            Value::Object(Default::default())
        } else {
            self.data.clone()
        };
        serde_json::from_value(data)
            .map_err(|e| TransportError::Decode(format!("{} - {}", e, self.data)))
    }
}

/// Already stored range reported by the server / 服务端已保存的分片
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartInfo {
    pub offset: u64,
    #[serde(default)]
    pub datalen: u64,
}

/// `upload_slice_init` payload / 初始化分片上传返回
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SliceInitData {
    #[serde(default)]
    pub session: String,
    /// Server may impose its own slice size / 服务端指定的分片大小
    #[serde(default)]
    pub slice_size: Option<u64>,
    /// Present when the content is already stored (sha match) / 秒传命中
    #[serde(default)]
    pub access_url: Option<String>,
    #[serde(default)]
    pub listparts: Vec<PartInfo>,
}

/// `upload_slice_data` / `upload` / `upload_slice_finish` payload / 上传返回
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadData {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub access_url: Option<String>,
    #[serde(default)]
    pub resource_path: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl UploadData {
    /// Whether the payload carries completed-file metadata / 是否为完成态
    pub fn is_complete(&self) -> bool {
        self.access_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// File or folder attributes from `op=stat` / 文件属性
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStat {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub biz_attr: String,
    /// Bytes stored so far / 已上传大小
    #[serde(default)]
    pub filesize: Option<u64>,
    /// Declared file length / 文件总大小
    #[serde(default)]
    pub filelen: Option<u64>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub ctime: Option<i64>,
    #[serde(default)]
    pub mtime: Option<i64>,
    #[serde(default)]
    pub access_url: Option<String>,
}

impl FileStat {
    /// Modification time as RFC 3339 / 修改时间
    pub fn modified(&self) -> Option<String> {
        self.mtime
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
            .map(|t| t.to_rfc3339())
    }

    /// An upload that stopped half-way reports `filesize < filelen` / 是否上传未完成
    pub fn is_incomplete(&self) -> bool {
        matches!((self.filesize, self.filelen), (Some(size), Some(len)) if size < len)
    }
}

/// One entry of a folder listing / 目录条目
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEntry {
    pub name: String,
    #[serde(default)]
    pub biz_attr: String,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filelen: Option<u64>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub mtime: Option<i64>,
    #[serde(default)]
    pub access_url: Option<String>,
}

impl ListEntry {
    /// Folders come back with a trailing `/` / 目录名以 / 结尾
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// `op=list` payload / 目录列表
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub dircount: u64,
    #[serde(default)]
    pub filecount: u64,
    #[serde(default)]
    pub infos: Vec<ListEntry>,
}

/// Terminal status of a slice upload / 分片上传最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    /// Server returned completed-file metadata / 上传完成
    Success,
    /// Every slice was accepted but the server did not report completion
    /// / 分片全部被接受但未返回完成信息
    Partial,
    Failed,
}

/// Result handed back to the caller / 上传结果
#[derive(Debug)]
pub struct UploadResult {
    pub status: UploadStatus,
    /// Last response the server sent, if any / 最后一次服务端响应
    pub server_response: Option<ServerResponse>,
    /// Empty when the session was never opened / 未建立会话时为空
    pub session_id: String,
    /// Cause of a `Failed` status / 失败原因
    pub error: Option<Error>,
}

impl UploadResult {
    pub fn failed(session_id: String, server_response: Option<ServerResponse>, error: Error) -> Self {
        Self {
            status: UploadStatus::Failed,
            server_response,
            session_id,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }

    /// Completed-file metadata from the final response / 完成后的文件信息
    pub fn upload_data(&self) -> Option<UploadData> {
        self.server_response
            .as_ref()
            .and_then(|resp| resp.data_as::<UploadData>().ok())
    }
}
