mod api_client;
mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{DownloadCommand, GenCompletionsCommand, UploadCommand};

pub trait ExecutableCommand: Parser {
    /// Consume `self` and run the command.
    async fn run(self) -> Result<()>;
}

#[derive(Parser)]
enum Command {
    Upload(UploadCommand),
    Download(DownloadCommand),
    GenCompletions(GenCompletionsCommand),
}

#[derive(Parser)]
#[command(author, version, about, long_about)]
struct RootCommand {
    #[clap(subcommand)]
    command: Command,
}

impl ExecutableCommand for RootCommand {
    async fn run(self) -> Result<()> {
        match self.command {
            Command::Upload(cmd) => cmd.run().await,
            Command::Download(cmd) => cmd.run().await,
            Command::GenCompletions(cmd) => cmd.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    RootCommand::parse().run().await
}
