//! Two-step upload: ask the backend for a presigned ticket, then send the bytes straight to
//! object storage. Tickets are single-use. A failed upload is reported, never retried with the
//! same ticket.

use bytes::Bytes;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE, multipart};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};
use url::Url;

use crate::errors::{Error, Result};
use crate::http::{TransferError, error_for_status, join_path};
use crate::types::{Attachment, AuthToken, PresignedUploadTicket};

use super::content_type::ContentType;

/// Body of `POST {api_base_url}/files/upload`.
#[derive(Debug, Serialize)]
struct TicketRequest<'a> {
    filename: &'a str,
    content_type: &'a str,
    size: u64,
}

#[derive(Debug, Clone)]
pub struct UploadClient {
    client: Client,
    ticket_url: Url,
}

impl UploadClient {
    pub fn new(api_base_url: &Url, client: Client) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            ticket_url: join_path(api_base_url, "files/upload")?,
        })
    }

    /// Store `bytes` and describe the stored object.
    #[instrument(skip_all, fields(filename = %filename, mime = content_type.mime, size = bytes.len()))]
    pub async fn upload(
        &self,
        token: &AuthToken,
        bytes: Bytes,
        content_type: ContentType,
        filename: &str,
    ) -> Result<Attachment> {
        let size = bytes.len() as u64;
        let ticket = self.request_ticket(token, filename, content_type.mime, size).await?;

        match &ticket.fields {
            Some(fields) => self.post_form(&ticket.upload_url, fields, bytes, content_type, filename).await?,
            None => self.put(&ticket.upload_url, bytes, content_type).await?,
        }

        info!(s3_key = %ticket.file_id, "Upload complete");
        Ok(Attachment {
            s3_key: ticket.file_id,
            size,
            filename: filename.to_string(),
        })
    }

    async fn request_ticket(
        &self,
        token: &AuthToken,
        filename: &str,
        content_type: &str,
        size: u64,
    ) -> Result<PresignedUploadTicket> {
        let body = TicketRequest {
            filename,
            content_type,
            size,
        };

        let response = self
            .client
            .post(self.ticket_url.clone())
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("upload ticket request failed: {}", TransferError::from(e))))?;

        let response = match error_for_status(response).await {
            Ok(response) => response,
            Err(TransferError::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                return Err(Error::upstream("upload denied"));
            }
            Err(e) => return Err(Error::upstream(format!("upload ticket request failed: {e}"))),
        };

        response
            .json::<PresignedUploadTicket>()
            .await
            .map_err(|e| Error::upstream(format!("invalid upload ticket: {}", TransferError::from(e))))
    }

    async fn put(&self, upload_url: &str, bytes: Bytes, content_type: ContentType) -> Result<()> {
        let response = self
            .client
            .put(upload_url)
            .header(CONTENT_TYPE, content_type.mime)
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::upload(TransferError::from(e).to_string()))?;
        error_for_status(response)
            .await
            .map_err(|e| Error::upload(e.to_string()))?;
        Ok(())
    }

    async fn post_form(
        &self,
        upload_url: &str,
        fields: &BTreeMap<String, String>,
        bytes: Bytes,
        content_type: ContentType,
        filename: &str,
    ) -> Result<()> {
        let file = multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(content_type.mime)
            .map_err(|e| Error::upload(e.to_string()))?;

        // Presigned POST policies require the file part to come after every field
        let form = fields
            .iter()
            .fold(multipart::Form::new(), |form, (key, value)| form.text(key.clone(), value.clone()))
            .part("file", file);

        let response = self
            .client
            .post(upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::upload(TransferError::from(e).to_string()))?;
        error_for_status(response)
            .await
            .map_err(|e| Error::upload(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::install_crypto_provider;
    use crate::storage::content_type::MediaCategory;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uploader(server: &MockServer) -> UploadClient {
        install_crypto_provider();
        let base = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
        UploadClient::new(&base, Client::new()).unwrap()
    }

    fn png() -> ContentType {
        ContentType::default_for(MediaCategory::Image)
    }

    fn token() -> AuthToken {
        AuthToken::new("user-token")
    }

    #[test_log::test(tokio::test)]
    async fn test_put_upload_returns_ticket_key_and_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .and(header("authorization", "Bearer user-token"))
            .and(body_json(json!({"filename": "grayscale.png", "content_type": "image/png", "size": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": format!("{}/bucket/abc123", server.uri()),
                "file_id": "abc123"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bucket/abc123"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let attachment = uploader(&server)
            .upload(&token(), Bytes::from_static(b"\x89PNG"), png(), "grayscale.png")
            .await
            .unwrap();

        assert_eq!(
            attachment,
            Attachment {
                s3_key: "abc123".to_string(),
                size: 4,
                filename: "grayscale.png".to_string(),
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_presigned_post_sends_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/bucket", server.uri()),
                "fields": {"key": "uploads/k1", "policy": "p"},
                "file_id": "k1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bucket"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let attachment = uploader(&server)
            .upload(&token(), Bytes::from_static(b"abc"), png(), "out.png")
            .await
            .unwrap();
        assert_eq!(attachment.s3_key, "k1");

        let requests = server.received_requests().await.unwrap();
        let storage = requests.iter().find(|r| r.url.path() == "/bucket").unwrap();
        let body = String::from_utf8_lossy(&storage.body);
        let key_at = body.find("name=\"key\"").unwrap();
        let policy_at = body.find("name=\"policy\"").unwrap();
        let file_at = body.find("name=\"file\"").unwrap();
        assert!(key_at < file_at && policy_at < file_at);
        assert!(body.contains("filename=\"out.png\""));
    }

    #[test_log::test(tokio::test)]
    async fn test_null_fields_ticket_uploads_with_put() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/bucket/k2", server.uri()),
                "fields": null,
                "file_id": "k2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bucket/k2"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let attachment = uploader(&server)
            .upload(&token(), Bytes::from_static(b"abc"), png(), "out.png")
            .await
            .unwrap();
        assert_eq!(attachment.s3_key, "k2");
        assert_eq!(attachment.size, 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_fields_ticket_still_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/bucket", server.uri()),
                "fields": {},
                "file_id": "k3"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bucket"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let attachment = uploader(&server)
            .upload(&token(), Bytes::from_static(b"abc"), png(), "out.png")
            .await
            .unwrap();
        assert_eq!(attachment.s3_key, "k3");
    }

    #[test_log::test(tokio::test)]
    async fn test_ticket_forbidden_is_upload_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let err = uploader(&server)
            .upload(&token(), Bytes::from_static(b"abc"), png(), "out.png")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "UpstreamError: upload denied");
    }

    #[test_log::test(tokio::test)]
    async fn test_ticket_server_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;

        let err = uploader(&server)
            .upload(&token(), Bytes::from_static(b"abc"), png(), "out.png")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "UpstreamError: upload ticket request failed: HTTP 500 Internal Server Error: db down"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_storage_rejection_is_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": format!("{}/bucket/x", server.uri()),
                "file_id": "x"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("SignatureDoesNotMatch"))
            .mount(&server)
            .await;

        let err = uploader(&server)
            .upload(&token(), Bytes::from_static(b"abc"), png(), "out.png")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UploadError");
        assert!(err.to_string().contains("SignatureDoesNotMatch"));
    }

    #[test_log::test(tokio::test)]
    async fn test_identical_bytes_get_distinct_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": format!("{}/bucket/first", server.uri()),
                "file_id": "first"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": format!("{}/bucket/second", server.uri()),
                "file_id": "second"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(2).mount(&server).await;

        let uploader = uploader(&server);
        let a = uploader
            .upload(&token(), Bytes::from_static(b"same"), png(), "a.png")
            .await
            .unwrap();
        let b = uploader
            .upload(&token(), Bytes::from_static(b"same"), png(), "a.png")
            .await
            .unwrap();
        assert_ne!(a.s3_key, b.s3_key);
    }
}
