use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio::time::Duration;

use roberto::cli::CommonArgs;
use roberto::dca::{run_dca, DcaParams};
use roberto::exchange::retry::RetryConfig;
use roberto::exchange::ProductId;
use roberto::journal::Journal;

/// Dollar-cost average: one market buy of a fixed quote amount.
#[derive(Parser)]
#[command(name = "dca")]
struct Cli {
    #[arg(default_value = "ETH-USD")]
    product: ProductId,

    /// Quote-currency amount to spend
    #[arg(long, default_value_t = 25.0)]
    amount: f64,

    /// Deposit the amount from the first linked payment method first
    #[arg(long)]
    deposit: bool,

    /// Seconds to wait after a deposit before buying
    #[arg(long, default_value_t = 10)]
    settle_secs: u64,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let session = cli.common.connect_with_env("dca", ".env_default")?;
    let journal = Journal::new(&session.cfg.log_dir);
    let params = DcaParams {
        product: cli.product.clone(),
        amount: cli.amount,
        deposit: cli.deposit,
        settle: Duration::from_secs(cli.settle_secs),
    };

    println!(
        "Executing purchase of {} from {} {}",
        params.product.base(),
        params.amount,
        params.product.quote()
    );
    let report = run_dca(session.exchange.as_ref(), &params, &journal, &RetryConfig::market_order()).await?;
    if let Some(deposit) = &report.deposit {
        println!("deposit {} {} (id {})", deposit.amount, deposit.currency, deposit.id);
    }
    match &report.outcome {
        Ok(order) => {
            println!("market buy placed: {}", order.id);
            Ok(ExitCode::SUCCESS)
        }
        Err(msg) => {
            eprintln!("DCA failed for {}: {}", params.product, msg);
            Ok(ExitCode::FAILURE)
        }
    }
}
