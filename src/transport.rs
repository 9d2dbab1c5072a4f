//! Signing and transport capabilities / 签名与传输能力
//!
//! The SDK never computes signatures itself and never talks to sockets
//! directly: both concerns sit behind [`Signer`] and [`Transport`].
//! [`HttpTransport`] is the reqwest-backed default.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{SignError, TransportError};
use crate::models::ServerResponse;

/// Signature lifetime / 签名有效范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignScope {
    /// Reusable until `expire_at` (unix seconds) / 多次有效签名
    Reusable { expire_at: i64 },
    /// Bound to one resource, single use (delete, update) / 单次有效签名
    Once,
}

/// What a signature is requested for / 签名请求
#[derive(Debug, Clone)]
pub struct SignRequest<'a> {
    pub bucket: &'a str,
    pub method: &'a Method,
    /// `/{app_id}/{bucket}{path}`
    pub resource: &'a str,
    pub scope: SignScope,
}

/// Request signing capability / 请求签名
pub trait Signer: Send + Sync {
    fn sign(&self, request: &SignRequest<'_>) -> Result<String, SignError>;
}

impl<F> Signer for F
where
    F: Fn(&SignRequest<'_>) -> Result<String, SignError> + Send + Sync,
{
    fn sign(&self, request: &SignRequest<'_>) -> Result<String, SignError> {
        self(request)
    }
}

/// Signer handing out one pre-issued token / 使用预签发令牌
#[derive(Debug, Clone)]
pub struct StaticSigner {
    token: String,
}

impl StaticSigner {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl Signer for StaticSigner {
    fn sign(&self, _request: &SignRequest<'_>) -> Result<String, SignError> {
        if self.token.is_empty() {
            return Err(SignError("no authorization token configured".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Value of one multipart field / 表单字段值
#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File { data: Bytes, file_name: String },
}

/// Request body / 请求体
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<(String, FormValue)>),
}

/// A signed request ready for the wire / 已签名的请求
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// `/files/v2/{app_id}/{bucket}{encoded_path}`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    /// Text value of a multipart field or JSON key / 获取表单或 JSON 字段
    pub fn field(&self, name: &str) -> Option<String> {
        match &self.body {
            RequestBody::Multipart(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| match v {
                FormValue::Text(text) => text.clone(),
                FormValue::File { file_name, .. } => file_name.clone(),
            }),
            RequestBody::Json(value) => value.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            RequestBody::Empty => self
                .query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
        }
    }

    /// Binary payload of a multipart field / 获取表单中的文件内容
    pub fn file_field(&self, name: &str) -> Option<&Bytes> {
        match &self.body {
            RequestBody::Multipart(fields) => fields.iter().find_map(|(k, v)| match v {
                FormValue::File { data, .. } if k == name => Some(data),
                _ => None,
            }),
            _ => None,
        }
    }

    /// The `op` this request performs / 请求的操作类型
    pub fn op(&self) -> Option<String> {
        self.field("op")
    }
}

/// Request transport capability / 请求传输
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one signed request and decode the response envelope.
    /// Non-2xx status and connection errors are `Err`; non-zero `code` is not.
    async fn send(&self, request: ApiRequest) -> Result<ServerResponse, TransportError>;
}

/// reqwest-backed transport / 基于 reqwest 的传输实现
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, endpoint })
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    fn build_form(fields: Vec<(String, FormValue)>) -> Form {
        fields.into_iter().fold(Form::new(), |form, (name, value)| match value {
            FormValue::Text(text) => form.text(name, text),
            FormValue::File { data, file_name } => {
                form.part(name, Part::bytes(data.to_vec()).file_name(file_name))
            }
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ServerResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        tracing::debug!("{} {}", request.method, url);

        let mut req = self
            .client
            .request(request.method, url)
            .header("X-Request-ID", uuid::Uuid::new_v4().to_string())
            .header("Accept", "application/json");
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req = match request.body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => req.json(&value),
            RequestBody::Multipart(fields) => req.multipart(Self::build_form(fields)),
        };

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Decode(format!("{} - {}", e, text)))
    }
}
