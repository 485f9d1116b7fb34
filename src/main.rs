use anyhow::Result;
use clap::Parser;

use roberto::cli::{CommonArgs, LimitPairArgs};
use roberto::pricing::{set_limit_orders, Confirm};

/// Place one buy limit below and one sell limit above the current price.
#[derive(Parser)]
#[command(name = "roberto", allow_negative_numbers = true)]
struct Cli {
    #[command(flatten)]
    pair: LimitPairArgs,

    /// Place without asking for confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Print nothing but errors
    #[arg(short, long)]
    quiet: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if !cli.quiet {
        print!("{}", cli.pair.echo(&[("yes", cli.yes), ("quiet", cli.quiet)]));
    }
    let session = cli.common.connect("roberto")?;

    let confirm = if cli.yes { Confirm::Yes } else { Confirm::Prompt };
    set_limit_orders(session.exchange.as_ref(), &cli.pair.params(), confirm, cli.quiet).await?;
    Ok(())
}
