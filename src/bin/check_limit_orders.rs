use anyhow::Result;
use clap::Parser;

use roberto::cli::CommonArgs;
use roberto::display::render_ladder;
use roberto::exchange::ProductId;
use roberto::ladder;

/// Show resting limit orders above and below the current price.
#[derive(Parser)]
#[command(name = "check_limit_orders")]
struct Cli {
    /// Product whose price the orders are measured against
    #[arg(default_value = "ETH-USD")]
    product: ProductId,

    /// List only orders on `product` instead of every open order
    #[arg(long)]
    only_product: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session = cli.common.connect("check_limit_orders")?;
    let ladder = ladder::fetch(session.exchange.as_ref(), &cli.product, cli.only_product).await?;
    print!("{}", render_ladder(&ladder));
    Ok(())
}
