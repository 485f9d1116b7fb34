use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use roberto::account::{check_credentials, AuthCheck};
use roberto::cli::CommonArgs;
use roberto::display::render_auth;

/// Check that the configured API key is accepted.
#[derive(Parser)]
#[command(name = "test_auth")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let session = cli.common.connect("test_auth")?;
    let check = check_credentials(session.exchange.as_ref()).await?;
    print!("{}", render_auth(&check));
    Ok(match check {
        AuthCheck::Valid { .. } => ExitCode::SUCCESS,
        AuthCheck::Invalid { .. } => ExitCode::FAILURE,
    })
}
