use std::collections::HashMap;

use anyhow::Result;
use clap::Parser;

use roberto::cli::CommonArgs;
use roberto::display::{render_series_table, render_tick};
use roberto::exchange::{Exchange, OrderQuery, ProductId};
use roberto::feed::stream_tickers;
use roberto::ladder::LimitLevels;
use roberto::logging;

/// Print live ticker prices until Ctrl-C, then the whole series.
#[derive(Parser)]
#[command(name = "stream_market_data")]
struct Cli {
    #[arg(default_value = "ETH-USD")]
    products: Vec<ProductId>,

    /// Show the distance to the nearest open limit orders on every tick
    #[arg(long)]
    with_limits: bool,

    /// Stop after this many ticker messages
    #[arg(long)]
    max_messages: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (cfg, levels) = if cli.with_limits {
        let session = cli.common.connect("stream_market_data")?;
        let orders = session.exchange.list_orders(None, OrderQuery::Open).await?;
        let levels: HashMap<String, LimitLevels> = cli
            .products
            .iter()
            .map(|p| (p.to_string(), LimitLevels::from_orders(&orders, p)))
            .collect();
        (session.cfg, levels)
    } else {
        let cfg = cli.common.config();
        logging::init(&cfg.log_dir);
        (cfg, HashMap::new())
    };

    println!("{} {:?}", cfg.ws_url, cli.products.iter().map(|p| p.as_str()).collect::<Vec<_>>());
    let (session, _end) = stream_tickers(&cfg.ws_url, &cli.products, cli.max_messages, |ticker, t, series| {
        let overlay = levels.get(&ticker.product_id);
        println!("{}", render_tick(&ticker.product_id, t, ticker.price, series, overlay));
    })
    .await?;

    for (product, series) in &session.series {
        print!("{}", render_series_table(product, series));
    }
    println!();
    println!("-- Goodbye! --");
    Ok(())
}
