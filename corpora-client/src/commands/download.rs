use crate::{
    ExecutableCommand, api_client::CorporaApiClient, commands::PROGRESS_BAR_TICKRATE,
};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueHint};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use std::path::PathBuf;
use tokio::fs::File;
use url::Url;

/// Download a corpus blob from a server.
#[derive(Parser)]
pub struct DownloadCommand {
    /// Container the blob lives in.
    #[clap(value_hint = ValueHint::Other)]
    container: String,

    /// Name of the blob within the container.
    #[clap(value_hint = ValueHint::Other)]
    filename: String,

    /// Path the blob should be written to.
    ///
    /// Defaults to the blob's name in the current directory.
    #[clap(short = 'o', long = "output", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Skip all confirmation dialogues.
    #[clap(short = 'y', env = "CORPORA_CLIENT_NOCONFIRM", long = "yes")]
    no_confirm: bool,

    /// URL (including scheme) of the server to download the blob from.
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

impl ExecutableCommand for DownloadCommand {
    async fn run(self) -> Result<()> {
        let output = self
            .output
            .unwrap_or_else(|| PathBuf::from(&self.filename));
        if output.is_dir() {
            bail!("output path must be a file and not a directory");
        }
        if output.exists()
            && !self.no_confirm
            && !Confirm::new(&format!(
                "'{}' already exists - overwrite it?",
                output.display()
            ))
            .with_default(false)
            .prompt()?
        {
            return Ok(());
        }

        let prog_bar = ProgressBar::no_length().with_message("Downloading blob");
        prog_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {bytes}/{total_bytes} @ {bytes_per_sec}")
                .unwrap()
                .progress_chars("##-"),
        );
        prog_bar.enable_steady_tick(PROGRESS_BAR_TICKRATE);

        let api_client = CorporaApiClient::new(&self.server, &self.access_token);
        let mut file = File::create(&output)
            .await
            .context("failed to create output file")?;
        api_client
            .download_blob(&self.container, &self.filename, &mut file, |downloaded, total| {
                if let Some(total) = total {
                    prog_bar.set_length(total);
                }
                prog_bar.set_position(downloaded);
            })
            .await?;
        prog_bar.finish_and_clear();

        println!(
            "Successfully downloaded '{}' from container '{}' to '{}'",
            self.filename,
            self.container,
            output.display()
        );

        Ok(())
    }
}
