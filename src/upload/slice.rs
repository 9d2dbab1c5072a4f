//! Single slice upload / 单个分片上传

use bytes::Bytes;

use super::source::sha1_hex;
use crate::api::{ApiCall, ApiContext};
use crate::error::{Error, Result, TransportError};
use crate::models::{ServerResponse, UploadData, CODE_SHA_MISMATCH};
use crate::transport::{FormValue, RequestBody};

/// Server acknowledgement of one slice / 分片确认
#[derive(Debug, Clone)]
pub struct SliceAck {
    pub offset: u64,
    pub length: u64,
    /// SHA-1 sent with the slice / 分片 SHA-1
    pub sha: String,
    pub data: UploadData,
    pub response: ServerResponse,
}

/// Uploads one slice per call, no retry / 分片上传器(不重试)
pub struct SliceUploader<'a> {
    api: &'a ApiContext,
}

impl<'a> SliceUploader<'a> {
    pub fn new(api: &'a ApiContext) -> Self {
        Self { api }
    }

    /// Send `data` at `offset` within `session_id` / 上传一个分片
    ///
    /// Transport failures and non-zero codes become [`Error::SliceTransport`],
    /// except a hash mismatch which becomes [`Error::SliceIntegrity`].
    pub async fn upload_one(
        &self,
        bucket: &str,
        path: &str,
        session_id: &str,
        offset: u64,
        data: Bytes,
        file_name: &str,
    ) -> Result<SliceAck> {
        let length = data.len() as u64;
        let sha = sha1_hex(&data);

        let fields = vec![
            ("op".to_string(), FormValue::Text("upload_slice_data".to_string())),
            (
                "filecontent".to_string(),
                FormValue::File {
                    data,
                    file_name: file_name.to_string(),
                },
            ),
            ("sha".to_string(), FormValue::Text(sha.clone())),
            ("session".to_string(), FormValue::Text(session_id.to_string())),
            ("offset".to_string(), FormValue::Text(offset.to_string())),
        ];

        let response = self
            .api
            .call(ApiCall::post(bucket, path, RequestBody::Multipart(fields)))
            .await
            .map_err(|source| Error::SliceTransport { offset, source })?;

        if response.code == CODE_SHA_MISMATCH {
            return Err(Error::SliceIntegrity {
                offset,
                message: response.message,
            });
        }
        let response = response
            .check()
            .map_err(|source| Error::SliceTransport { offset, source })?;
        let data: UploadData = response
            .data_as()
            .map_err(|source: TransportError| Error::SliceTransport { offset, source })?;

        tracing::debug!("Slice {}+{} of {} acknowledged", offset, length, path);
        Ok(SliceAck {
            offset,
            length,
            sha,
            data,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::StaticSigner;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(transport: Arc<MockTransport>) -> ApiContext {
        ApiContext::new(transport, Arc::new(StaticSigner::new("tok")), "125", 60)
    }

    #[tokio::test]
    async fn test_upload_one_sends_hash_and_offset() {
        let transport = Arc::new(MockTransport::new());
        transport.push_ok(json!({"session": "s1", "offset": 4}));
        let api = ctx(transport.clone());

        let ack = SliceUploader::new(&api)
            .upload_one("media", "/a.bin", "s1", 4, Bytes::from_static(b"abc"), "a.bin")
            .await
            .unwrap();

        assert_eq!(ack.offset, 4);
        assert_eq!(ack.length, 3);
        assert_eq!(ack.sha, sha1_hex(b"abc"));
        assert!(!ack.data.is_complete());

        let req = &transport.requests()[0];
        assert_eq!(req.op().as_deref(), Some("upload_slice_data"));
        assert_eq!(req.field("session").as_deref(), Some("s1"));
        assert_eq!(req.field("offset").as_deref(), Some("4"));
        assert_eq!(req.field("sha"), Some(ack.sha.clone()));
        assert_eq!(req.file_field("filecontent").unwrap().as_ref(), b"abc");
    }

    #[tokio::test]
    async fn test_sha_mismatch_is_integrity_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_code(CODE_SHA_MISMATCH, "sha mismatch");
        let api = ctx(transport);

        let err = SliceUploader::new(&api)
            .upload_one("media", "/a.bin", "s1", 0, Bytes::from_static(b"abc"), "a.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SliceIntegrity { offset: 0, .. }));
    }

    #[tokio::test]
    async fn test_failures_are_transport_errors() {
        let transport = Arc::new(MockTransport::new());
        transport.push_err(TransportError::Status { status: 500, body: "oops".into() });
        transport.push_code(-5, "session expired");
        let api = ctx(transport);
        let uploader = SliceUploader::new(&api);

        for _ in 0..2 {
            let err = uploader
                .upload_one("media", "/a.bin", "s1", 8, Bytes::from_static(b"abc"), "a.bin")
                .await
                .unwrap_err();
            assert!(matches!(err, Error::SliceTransport { offset: 8, .. }));
        }
    }
}
