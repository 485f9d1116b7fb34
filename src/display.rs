//! Terminal rendering. Everything returns a `String` so the binaries decide
//! when to print and tests can look at the text.

use std::fmt::Write;

use colored::Colorize;

use crate::account::AuthCheck;
use crate::exchange::ProductId;
use crate::feed::TickerSeries;
use crate::ladder::{Ladder, LimitLevels};
use crate::pricing::LimitPairPlan;
use crate::profits::{ProfitReport, SideTotals};

/// `name = value` lines with the `=` signs aligned.
pub fn render_args(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (k, v) in pairs {
        let _ = writeln!(out, "{:<width$} = {}", k, v, width = width);
    }
    out
}

pub fn render_plan(product: &ProductId, plan: &LimitPairPlan) -> String {
    let crypto = product.base();
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{} current price: ${}", crypto, plan.mid);
    let buy = format!(
        "buy  {} ${} ${:.2} ({} {})",
        product,
        plan.buy_price,
        plan.buy_value(),
        plan.buy_size,
        crypto
    );
    let sell = format!(
        "sell {} ${} ${:.2} ({} {})",
        product,
        plan.sell_price,
        plan.sell_value(),
        plan.sell_size,
        crypto
    );
    let _ = writeln!(out, "{}", buy.bright_green());
    let _ = writeln!(out, "{}", sell.bright_red());
    out
}

fn heading(out: &mut String, title: &str, rule: char, paint: fn(&str) -> colored::ColoredString) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", paint(title));
    let _ = writeln!(out, "{}", paint(&rule.to_string().repeat(title.len())));
}

pub fn render_ladder(ladder: &Ladder) -> String {
    let mut out = String::new();
    heading(&mut out, "Limit Sells", '=', |s| s.bright_green());
    for row in &ladder.sells {
        let _ = writeln!(
            out,
            "{:.2}   ({}) ({})",
            row.price,
            format!(" +{:.2} ", row.diff).bright_green(),
            format!(" {:.3} % ", row.pct).bright_green()
        );
    }
    heading(&mut out, "Current Price", '=', |s| s.bright_cyan());
    let _ = writeln!(out, "{:.2}", ladder.current);
    heading(&mut out, "Limit Buys", '=', |s| s.bright_red());
    for row in &ladder.buys {
        let _ = writeln!(
            out,
            "{:.2}   ({}) ({})",
            row.price,
            format!(" {:.2} ", row.diff).bright_red(),
            format!(" {:.3} % ", row.pct).bright_red()
        );
    }
    let _ = writeln!(out);
    out
}

fn render_side(out: &mut String, title: &str, totals: &SideTotals, paint: fn(&str) -> colored::ColoredString) {
    heading(out, title, '=', paint);
    let _ = writeln!(out, "      Value         Fees");
    for row in &totals.rows {
        let _ = writeln!(out, "{:7.2} USD  {:7.2} USD ", row.value, row.fees);
    }
}

fn render_total(out: &mut String, title: &str, totals: &SideTotals, paint: fn(&str) -> colored::ColoredString) {
    heading(out, title, '-', paint);
    let _ = writeln!(out, "      Value         Fees");
    let _ = writeln!(out, "{:7.2} USD  {:7.2} USD ", totals.value, totals.fees);
}

pub fn render_profit_report(report: &ProfitReport) -> String {
    let mut out = String::new();
    render_side(&mut out, "Filled Sells", &report.sells, |s| s.bright_green());
    render_side(&mut out, "Filled Buys", &report.buys, |s| s.bright_red());
    render_total(&mut out, "Total Sells", &report.sells, |s| s.bright_green());
    render_total(&mut out, "Total Buys", &report.buys, |s| s.bright_red());
    heading(&mut out, "Current Price", '=', |s| s.bright_cyan());
    let _ = writeln!(out, "{:.2} {}", report.current_price, report.product.quote());
    heading(&mut out, "Profits", '-', |s| s.bright_yellow());
    let _ = writeln!(out, "{:7.2} {} ", report.profit(), report.product.quote());
    let _ = writeln!(out);
    out
}

/// One live line per tick: elapsed seconds, price, running range, and the
/// distance to the nearest resting limits when `levels` is given.
pub fn render_tick(product: &str, t: f64, price: f64, series: &TickerSeries, levels: Option<&LimitLevels>) -> String {
    let mut line = format!("{:>9.3}s  {}  {}", t, product, format!("{:.2}", price).bright_green());
    if let (Some(lo), Some(hi)) = (series.min_price(), series.max_price()) {
        let _ = write!(line, "  [{:.2} .. {:.2}]", lo, hi);
    }
    if let Some(levels) = levels {
        match levels.nearest_sell_above(price) {
            Some(s) => {
                let _ = write!(line, "  {}", format!("sell {:.2} (+{:.2})", s, s - price).bright_green());
            }
            None => line.push_str("  no sell above"),
        }
        match levels.nearest_buy_below(price) {
            Some(b) => {
                let _ = write!(line, "  {}", format!("buy {:.2} (-{:.2})", b, price - b).bright_red());
            }
            None => line.push_str("  no buy below"),
        }
    }
    line
}

pub fn render_series_table(product: &str, series: &TickerSeries) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", format!("{}\nTime,\tPrice", product).bright_cyan());
    for (t, price) in series.points() {
        let _ = writeln!(out, "{},\t{}", t, price.to_string().bright_green());
    }
    out
}

pub fn render_auth(check: &AuthCheck) -> String {
    match check {
        AuthCheck::Valid { first_currency } => format!(
            "valid config\n{}\n",
            first_currency.as_deref().unwrap_or("(no accounts)")
        ),
        AuthCheck::Invalid { message } => format!("invalid config\n{}\n", message),
    }
}
