//! Signed call dispatch / 签名请求分发

use std::sync::Arc;

use reqwest::Method;

use crate::error::TransportError;
use crate::models::ServerResponse;
use crate::transport::{ApiRequest, RequestBody, SignRequest, SignScope, Signer, Transport};
use crate::utils::encode_path;

/// Which kind of signature a call needs / 签名类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignKind {
    Reusable,
    Once,
}

/// One logical call against a bucket path / 一次接口调用
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: Method,
    pub bucket: String,
    /// Normalized remote path / 规范化后的远端路径
    pub path: String,
    pub sign: SignKind,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiCall {
    pub fn get(bucket: &str, path: &str) -> Self {
        Self {
            method: Method::GET,
            bucket: bucket.to_string(),
            path: path.to_string(),
            sign: SignKind::Reusable,
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post(bucket: &str, path: &str, body: RequestBody) -> Self {
        Self {
            method: Method::POST,
            bucket: bucket.to_string(),
            path: path.to_string(),
            sign: SignKind::Reusable,
            query: Vec::new(),
            body,
        }
    }

    pub fn sign_once(mut self) -> Self {
        self.sign = SignKind::Once;
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// Shared transport, signer and resource layout / 共享的请求上下文
#[derive(Clone)]
pub struct ApiContext {
    transport: Arc<dyn Transport>,
    signer: Arc<dyn Signer>,
    app_id: String,
    sign_expire_secs: u64,
}

impl ApiContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        signer: Arc<dyn Signer>,
        app_id: impl Into<String>,
        sign_expire_secs: u64,
    ) -> Self {
        Self {
            transport,
            signer,
            app_id: app_id.into(),
            sign_expire_secs,
        }
    }

    /// Signing resource: `/{app_id}/{bucket}{path}` / 签名资源
    pub fn resource(&self, bucket: &str, path: &str) -> String {
        format!("/{}/{}{}", self.app_id, bucket, path)
    }

    /// Request path: `/files/v2/{app_id}/{bucket}{encoded_path}` / 请求路径
    pub fn url_path(&self, bucket: &str, path: &str) -> String {
        format!("/files/v2/{}/{}{}", self.app_id, bucket, encode_path(path))
    }

    fn sign_scope(&self, kind: SignKind) -> SignScope {
        match kind {
            SignKind::Once => SignScope::Once,
            SignKind::Reusable => SignScope::Reusable {
                expire_at: chrono::Utc::now().timestamp() + self.sign_expire_secs as i64,
            },
        }
    }

    /// Sign and send one call; the envelope is returned as-is / 签名并发送
    pub async fn call(&self, call: ApiCall) -> Result<ServerResponse, TransportError> {
        let resource = self.resource(&call.bucket, &call.path);
        let token = self.signer.sign(&SignRequest {
            bucket: &call.bucket,
            method: &call.method,
            resource: &resource,
            scope: self.sign_scope(call.sign),
        })?;

        let request = ApiRequest {
            method: call.method,
            path: self.url_path(&call.bucket, &call.path),
            query: call.query,
            headers: vec![("Authorization".to_string(), token)],
            body: call.body,
        };
        self.transport.send(request).await
    }

    /// Same as [`call`](Self::call) but a non-zero code becomes an error / 发送并检查错误码
    pub async fn call_checked(&self, call: ApiCall) -> Result<ServerResponse, TransportError> {
        self.call(call).await?.check()
    }
}
