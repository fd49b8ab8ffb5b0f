use std::path::Path;

use async_trait::async_trait;
use methu_store::LocalStore;
use methu_types::{config::RemoteConfig, naming::FrameIdentifier, FetchError, MethuError, Result};
use reqwest::{Client, Response};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::FrameSource;

/// Remote snapshot source reached over plain HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFrameSource {
    client: Client,
    base_url: String,
}

impl HttpFrameSource {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| MethuError::Network(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn stream_body(
        &self,
        url: &str,
        mut response: Response,
        staged: &Path,
    ) -> std::result::Result<u64, FetchError> {
        let io_error = |source| FetchError::Io {
            path: staged.to_path_buf(),
            source,
        };

        let mut file = fs::File::create(staged).await.map_err(io_error)?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| transport_error(url, err))?
        {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;

        if written == 0 {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(written)
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    fn url_for(&self, id: &FrameIdentifier) -> String {
        format!("{}/{}", self.base_url, id)
    }

    async fn fetch(
        &self,
        id: &FrameIdentifier,
        store: &LocalStore,
    ) -> std::result::Result<u64, FetchError> {
        let url = self.url_for(id);
        debug!("Requesting {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| transport_error(&url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let staged = store.staging_path_for(id);
        let written = match self.stream_body(&url, response, &staged).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&staged).await;
                return Err(err);
            }
        };

        let dest = store.path_for(id);
        if let Err(source) = fs::rename(&staged, &dest).await {
            let _ = fs::remove_file(&staged).await;
            return Err(FetchError::Io { path: dest, source });
        }
        Ok(written)
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
