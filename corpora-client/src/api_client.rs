use anyhow::{Context, Result, bail};
use reqwest::{Body, header};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use url::Url;

#[derive(Deserialize)]
pub struct ServerConfigurationResponse {
    pub blob: BlobConfiguration,
}

#[derive(Deserialize)]
pub struct BlobConfiguration {
    pub max_size_bytes: u64,
}

pub struct CorporaApiClient<'a> {
    base_url: &'a Url,
    access_token: &'a str,
    inner_client: reqwest::Client,
}

impl<'a> CorporaApiClient<'a> {
    pub fn new(base_url: &'a Url, access_token: &'a str) -> Self {
        Self {
            base_url,
            access_token,
            inner_client: reqwest::Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .build()
                .expect("api inner client should build"),
        }
    }

    pub async fn get_server_config(&self) -> Result<ServerConfigurationResponse> {
        let res = self
            .inner_client
            .get(self.base_url.join("configuration")?)
            .send()
            .await
            .context("server configuration request failed before response")?;

        if !res.status().is_success() {
            bail!(
                "server returned status code {} from get server configuration request. {}",
                res.status(),
                res.text().await.unwrap_or_default(),
            );
        }
        Ok(res.json::<ServerConfigurationResponse>().await?)
    }

    pub async fn upload_blob<R: AsyncRead + Send + Sync + 'static>(
        &self,
        container: &str,
        filename: &str,
        reader: R,
    ) -> Result<()> {
        let reader = ReaderStream::new(reader);
        let res = self
            .inner_client
            .put(
                self.base_url
                    .join(&format!("containers/{container}/{filename}"))?,
            )
            .bearer_auth(self.access_token)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::wrap_stream(reader))
            .timeout(Duration::from_secs(60 * 60)) // 1 hour.
            .send()
            .await
            .context("upload blob request failed before response")?;
        if !res.status().is_success() {
            bail!(
                "server returned status code {} from upload blob request. {}",
                res.status(),
                res.text().await.unwrap_or_default(),
            );
        }
        Ok(())
    }

    /// Download a blob via the server's download endpoint.
    ///
    /// The server answers with a redirect to a short-lived signed URL which
    /// is followed transparently. Returns the number of bytes written.
    pub async fn download_blob<W: AsyncWriteExt + Unpin>(
        &self,
        container: &str,
        filename: &str,
        writer: &mut W,
        update_progress: impl Fn(u64, Option<u64>),
    ) -> Result<u64> {
        let mut url = self.base_url.join("download")?;
        url.query_pairs_mut()
            .append_pair("container", container)
            .append_pair("filename", filename);
        let mut res = self
            .inner_client
            .get(url)
            .bearer_auth(self.access_token)
            .timeout(Duration::from_secs(60 * 60)) // 1 hour.
            .send()
            .await
            .context("download blob request failed before response")?;

        if !res.status().is_success() {
            bail!(
                "server returned status code {} from download blob request. {}",
                res.status(),
                res.text().await.unwrap_or_default(),
            );
        }

        let total_size = res.content_length();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = res.chunk().await? {
            writer.write_all(chunk.as_ref()).await?;
            downloaded += chunk.len() as u64;
            update_progress(downloaded, total_size);
        }
        Ok(downloaded)
    }
}
