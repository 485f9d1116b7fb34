use anyhow::Result;
use clap::Parser;

use roberto::cli::{CommonArgs, LimitPairArgs};
use roberto::journal::Journal;
use roberto::reconcile::{run_cycle, CycleReport};

/// One scheduled tick: if a stored limit filled, cancel its sibling and
/// place a fresh pair around the current price.
#[derive(Parser)]
#[command(name = "cron_roberto", allow_negative_numbers = true)]
struct Cli {
    #[command(flatten)]
    pair: LimitPairArgs,

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
        print!("{}", cli.pair.echo(&[("quiet", cli.quiet)]));
    }
    let session = cli.common.connect("cron_roberto")?;
    let journal = Journal::new(&session.cfg.log_dir);

    match run_cycle(session.exchange.as_ref(), &cli.pair.params(), &journal, cli.quiet).await? {
        CycleReport::Placed { outcome, result } => {
            if result.accepted_ids().len() < 2 {
                eprintln!("[cron_roberto] {}: only {} of 2 legs accepted", outcome.label(), result.accepted_ids().len());
            }
        }
        CycleReport::Idle => {}
    }
    Ok(())
}
