use crate::{
    ExecutableCommand, api_client::CorporaApiClient, commands::PROGRESS_BAR_TICKRATE,
};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueHint};
use indicatif::{HumanBytes, ProgressBar};
use inquire::Confirm;
use std::path::PathBuf;
use tokio::fs;
use url::Url;

/// Upload a file as a corpus blob.
#[derive(Parser)]
pub struct UploadCommand {
    /// Container the blob should be stored in.
    #[clap(value_hint = ValueHint::Other)]
    container: String,

    /// File to upload.
    #[clap(value_hint = ValueHint::FilePath)]
    path: PathBuf,

    /// Store the blob under this name instead of the file's own name.
    #[clap(long = "name", value_hint = ValueHint::Other)]
    name: Option<String>,

    /// Skip all confirmation dialogues.
    #[clap(short = 'y', env = "CORPORA_CLIENT_NOCONFIRM", long = "yes")]
    no_confirm: bool,

    /// URL (including scheme) of the server to upload the blob to.
    #[clap(
        short = 's',
        env = "CORPORA_CLIENT_SERVER",
        long = "server",
        value_hint = ValueHint::Url
    )]
    server: Url,

    /// Access token identifying this client as a user of the server.
    #[clap(
        env = "CORPORA_CLIENT_ACCESS_TOKEN",
        long = "access-token",
        hide_env_values = true
    )]
    access_token: String,
}

impl ExecutableCommand for UploadCommand {
    async fn run(self) -> Result<()> {
        let path_canonical = match fs::canonicalize(&self.path).await {
            Ok(path) => path,
            Err(err) => bail!(
                "failed while trying to read file at '{}': {err}",
                self.path.display()
            ),
        };
        if !path_canonical.is_file() {
            bail!("only single files can be uploaded as blobs");
        }
        let blob_name = match self.name {
            Some(name) => name,
            None => path_canonical
                .file_name()
                .context("failed to read file name")?
                .to_str()
                .context("failed to parse file name as str")?
                .to_owned(),
        };

        if !self.no_confirm
            && !Confirm::new(&format!(
                "Are you sure you want to upload '{}' to container '{}'?",
                path_canonical.display(),
                self.container,
            ))
            .with_default(false)
            .prompt()?
        {
            return Ok(());
        }

        // Validate the blob size against the server's limit before sending.
        let api_client = CorporaApiClient::new(&self.server, &self.access_token);
        let server_config = api_client.get_server_config().await?;
        let blob_size = fs::metadata(&path_canonical).await?.len();
        if blob_size > server_config.blob.max_size_bytes {
            bail!(
                "blob is larger than the server's maximum size of {}",
                HumanBytes(server_config.blob.max_size_bytes)
            );
        }

        let prog_bar = ProgressBar::new_spinner();
        prog_bar.enable_steady_tick(PROGRESS_BAR_TICKRATE);
        prog_bar.set_message(format!("Uploading '{blob_name}'"));
        api_client
            .upload_blob(
                &self.container,
                &blob_name,
                fs::File::open(&path_canonical).await?,
            )
            .await?;
        prog_bar.finish_and_clear();

        println!(
            "Successfully uploaded '{blob_name}' to container '{}'",
            self.container
        );

        Ok(())
    }
}
