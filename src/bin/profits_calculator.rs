use anyhow::Result;
use clap::Parser;

use roberto::cli::CommonArgs;
use roberto::display::{render_args, render_profit_report};
use roberto::exchange::ProductId;
use roberto::logging::{log, obj, v_num, v_str, Domain, Level};
use roberto::profits;

/// Realized profit over every filled order on a product.
#[derive(Parser)]
#[command(name = "profits_calculator")]
struct Cli {
    product: ProductId,

    /// Print only the profit figure
    #[arg(short, long)]
    quiet: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if !cli.quiet {
        print!("{}", render_args(&[("product", cli.product.to_string())]));
    }
    let session = cli.common.connect("profits_calculator")?;
    let report = profits::calculate(session.exchange.as_ref(), &cli.product).await?;
    log(
        Level::Info,
        Domain::Account,
        "profit_report",
        obj(&[
            ("product", v_str(cli.product.as_str())),
            ("sells", v_num(report.sells.value)),
            ("buys", v_num(report.buys.value)),
            ("profit", v_num(report.profit())),
        ]),
    );
    if cli.quiet {
        println!("{:.2}", report.profit());
    } else {
        print!("{}", render_profit_report(&report));
    }
    Ok(())
}
