//! Limit-pair planning: one buy below and one sell above the mid price.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use crate::display;
use crate::exchange::decimal::{increment_decimals, round_to};
use crate::exchange::{rejection_message, Exchange, Order, Product, ProductId, Side};

#[derive(Debug, Clone, PartialEq)]
pub struct LimitPairParams {
    pub product: ProductId,
    pub buy_amount_usd: f64,
    pub swing_percent: f64,
    pub fiat_profits_percent: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("swing_percent = {0} is not valid")]
    Swing(f64),
    #[error("fiat_profits_percent = {0} is not valid")]
    FiatProfits(f64),
    #[error("buy_amount_usd = {0} is not valid")]
    Amount(f64),
    #[error("mid price {0} is not usable")]
    Price(f64),
    #[error("{side} size rounds to zero at {decimals} decimals")]
    ZeroSize { side: Side, decimals: u32 },
}

impl LimitPairParams {
    /// Returns `(swing, fiat_ratio)` as fractions.
    pub fn validate(&self) -> Result<(f64, f64), PlanError> {
        if !(0.0..=100.0).contains(&self.swing_percent) {
            return Err(PlanError::Swing(self.swing_percent));
        }
        if !(0.0..=100.0).contains(&self.fiat_profits_percent) {
            return Err(PlanError::FiatProfits(self.fiat_profits_percent));
        }
        if !self.buy_amount_usd.is_finite() || self.buy_amount_usd <= 0.0 {
            return Err(PlanError::Amount(self.buy_amount_usd));
        }
        Ok((self.swing_percent / 100.0, self.fiat_profits_percent / 100.0))
    }
}

/// Decimal places the exchange accepts for price and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub price_decimals: u32,
    pub size_decimals: u32,
}

impl From<&Product> for Precision {
    fn from(p: &Product) -> Self {
        Self {
            price_decimals: increment_decimals(&p.quote_increment),
            size_decimals: increment_decimals(&p.base_increment),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitPairPlan {
    pub mid: f64,
    pub buy_price: f64,
    pub buy_size: f64,
    pub sell_price: f64,
    pub sell_size: f64,
}

impl LimitPairPlan {
    pub fn buy_value(&self) -> f64 {
        self.buy_price * self.buy_size
    }

    pub fn sell_value(&self) -> f64 {
        self.sell_price * self.sell_size
    }
}

/// The fiat ratio skews sizes: buying spends less than `buy_amount_usd` and
/// selling brings back more, so `ratio * swing` of the notional stays in fiat.
pub fn plan_limit_pair(params: &LimitPairParams, mid: f64, precision: Precision) -> Result<LimitPairPlan, PlanError> {
    let (swing, ratio) = params.validate()?;
    if !mid.is_finite() || mid <= 0.0 {
        return Err(PlanError::Price(mid));
    }

    let buy_price = round_to((1.0 - swing) * mid, precision.price_decimals);
    let sell_price = round_to((1.0 + swing) * mid, precision.price_decimals);
    if buy_price <= 0.0 {
        return Err(PlanError::Price(buy_price));
    }

    let buy_size = round_to(
        params.buy_amount_usd * (1.0 - ratio * swing) / buy_price,
        precision.size_decimals,
    );
    let sell_size = round_to(
        params.buy_amount_usd * (1.0 + ratio * swing) / sell_price,
        precision.size_decimals,
    );
    if buy_size <= 0.0 {
        return Err(PlanError::ZeroSize { side: Side::Buy, decimals: precision.size_decimals });
    }
    if sell_size <= 0.0 {
        return Err(PlanError::ZeroSize { side: Side::Sell, decimals: precision.size_decimals });
    }

    Ok(LimitPairPlan { mid, buy_price, buy_size, sell_price, sell_size })
}

/// Result of placing one leg of the pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LegOutcome {
    Placed(Order),
    Failed(String),
}

impl LegOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self {
            LegOutcome::Placed(o) => Some(o),
            LegOutcome::Failed(_) => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.order().map(|o| o.id.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LimitPairResult {
    pub product: ProductId,
    pub plan: LimitPairPlan,
    pub buy: LegOutcome,
    pub sell: LegOutcome,
}

impl LimitPairResult {
    /// Ids of the legs the exchange accepted, buy first.
    pub fn accepted_ids(&self) -> Vec<&str> {
        [self.buy.id(), self.sell.id()].into_iter().flatten().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    /// `--yes`: place without asking.
    Yes,
    /// Ask `place limit orders? (y/n)` on stdin.
    Prompt,
}

/// Fetch the book and product increments, then plan the pair.
pub async fn plan_for_market(exchange: &dyn Exchange, params: &LimitPairParams) -> Result<LimitPairPlan> {
    params.validate()?;
    let top = exchange.book_top(&params.product).await?;
    let product = exchange.product(&params.product).await?;
    Ok(plan_limit_pair(params, top.mid(), Precision::from(&product))?)
}

/// Place the buy leg, then the sell leg. A rejected leg does not stop the
/// other one.
pub async fn place_limit_pair(exchange: &dyn Exchange, product: &ProductId, plan: LimitPairPlan) -> LimitPairResult {
    let buy = match exchange.place_limit_order(product, Side::Buy, plan.buy_price, plan.buy_size).await {
        Ok(order) => LegOutcome::Placed(order),
        Err(err) => LegOutcome::Failed(rejection_message(&err)),
    };
    let sell = match exchange.place_limit_order(product, Side::Sell, plan.sell_price, plan.sell_size).await {
        Ok(order) => LegOutcome::Placed(order),
        Err(err) => LegOutcome::Failed(rejection_message(&err)),
    };
    LimitPairResult { product: product.clone(), plan, buy, sell }
}

fn prompt_yes_no(question: &str) -> Result<bool> {
    println!("{}", question);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim() == "y")
}

/// Plan, show, confirm and place a limit pair. `Ok(None)` means the user
/// declined.
pub async fn set_limit_orders(
    exchange: &dyn Exchange,
    params: &LimitPairParams,
    confirm: Confirm,
    quiet: bool,
) -> Result<Option<LimitPairResult>> {
    let plan = plan_for_market(exchange, params).await?;
    if !quiet {
        print!("{}", display::render_plan(&params.product, &plan));
    }

    let go = match confirm {
        Confirm::Yes => true,
        Confirm::Prompt => prompt_yes_no("place limit orders? (y/n)")?,
    };
    if !go {
        println!("orders aborted");
        return Ok(None);
    }

    let result = place_limit_pair(exchange, &params.product, plan).await;
    for (side, leg) in [(Side::Buy, &result.buy), (Side::Sell, &result.sell)] {
        if let LegOutcome::Failed(msg) = leg {
            println!("{} error: {}", side, msg);
        }
    }
    Ok(Some(result))
}
