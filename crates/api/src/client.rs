use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use snafu::ResultExt;

use scenechat_session::{
    BoxFuture, CollaboratorError, CollaboratorResult, DownloadCollaborator, FetchedFile,
    RawFile, RemoteFileId, SendCollaborator, SendReply, SendRequest,
};

use super::config::ApiConfig;
use super::error::{
    ApiResult, BuildClientSnafu, DecodeReplySnafu, ReadBodySnafu, SendRequestSnafu, StatusSnafu,
};
use super::wire::WireReply;

/// Client for the assistant backend. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpApiClient {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context(BuildClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self { client, config })
    }

    /// Posts text, scene and files as one multipart form and decodes the assistant reply.
    pub async fn send_message(&self, request: SendRequest) -> ApiResult<SendReply> {
        let url = self.config.messages_url();
        let file_count = request.files.len();
        let mut form = Form::new()
            .text("content", request.text)
            .text("scene", request.scene);
        for (index, file) in request.files.into_iter().enumerate() {
            form = form.part(format!("files[{index}]"), file_part(file));
        }

        tracing::debug!(request = %request.request_id, file_count, %url, "posting message");
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context(SendRequestSnafu {
                stage: "send-message",
                url: url.as_str(),
            })?;

        let status = response.status();
        let body = response.text().await.context(ReadBodySnafu {
            stage: "read-message-reply",
            url: url.as_str(),
        })?;
        if !status.is_success() {
            return StatusSnafu {
                stage: "message-http-status",
                url,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let reply = serde_json::from_str::<WireReply>(&body).context(DecodeReplySnafu {
            stage: "decode-message-reply",
        })?;
        Ok(reply.into_reply())
    }

    pub async fn download_file(&self, file_id: &RemoteFileId) -> ApiResult<FetchedFile> {
        let url = self.config.file_url(file_id.as_str());
        tracing::debug!(file = %file_id, %url, "downloading file");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .context(SendRequestSnafu {
                stage: "download-file",
                url: url.as_str(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return StatusSnafu {
                stage: "download-http-status",
                url,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.context(ReadBodySnafu {
            stage: "read-download-body",
            url: url.as_str(),
        })?;

        Ok(FetchedFile {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}

fn file_part(file: RawFile) -> Part {
    let part = Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
    match part.mime_str(&file.mime_type) {
        Ok(part) => part,
        Err(error) => {
            tracing::warn!(
                name = %file.name,
                mime_type = %file.mime_type,
                %error,
                "unusable mime type, sending part untyped"
            );
            Part::bytes(file.bytes.to_vec()).file_name(file.name)
        }
    }
}

impl SendCollaborator for HttpApiClient {
    fn send(&self, request: SendRequest) -> BoxFuture<'static, CollaboratorResult<SendReply>> {
        let client = self.clone();
        Box::pin(async move {
            client
                .send_message(request)
                .await
                .map_err(|error| CollaboratorError::Sending {
                    message: error.to_string(),
                })
        })
    }
}

impl DownloadCollaborator for HttpApiClient {
    fn fetch(&self, file_id: &RemoteFileId) -> BoxFuture<'static, CollaboratorResult<FetchedFile>> {
        let client = self.clone();
        let file_id = file_id.clone();
        Box::pin(async move {
            client
                .download_file(&file_id)
                .await
                .map_err(|error| CollaboratorError::Fetching {
                    message: error.to_string(),
                })
        })
    }
}
