//! Dollar-cost averaging: one market buy per run, optionally funded by a
//! deposit from the first linked payment method.

use anyhow::{anyhow, Result};
use tokio::time::{sleep, Duration};

use crate::exchange::retry::{retry_async, RetryConfig};
use crate::exchange::{rejection_message, Deposit, Exchange, Order, ProductId, Side};
use crate::journal::Journal;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};

#[derive(Debug, Clone)]
pub struct DcaParams {
    pub product: ProductId,
    /// Quote-currency amount to spend.
    pub amount: f64,
    /// Deposit `amount` before buying.
    pub deposit: bool,
    /// Wait after a deposit before the first buy attempt.
    pub settle: Duration,
}

#[derive(Debug)]
pub struct DcaReport {
    pub deposit: Option<Deposit>,
    pub outcome: Result<Order, String>,
}

impl DcaReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Deposit `amount` of `currency` from the first payment method.
pub async fn fund_from_first_payment_method(exchange: &dyn Exchange, amount: f64, currency: &str) -> Result<Deposit> {
    let methods = exchange.payment_methods().await?;
    let method = methods.first().ok_or_else(|| anyhow!("no payment methods linked to this account"))?;
    let deposit = exchange.deposit(amount, currency, &method.id).await?;
    log(
        Level::Info,
        Domain::Account,
        "deposit",
        obj(&[
            ("payment_method", v_str(&method.id)),
            ("amount", v_num(amount)),
            ("currency", v_str(currency)),
        ]),
    );
    Ok(deposit)
}

/// One DCA run. Journal failures are errors; a buy that never goes through
/// is reported in [`DcaReport::outcome`].
pub async fn run_dca(
    exchange: &dyn Exchange,
    params: &DcaParams,
    journal: &Journal,
    retry: &RetryConfig,
) -> Result<DcaReport> {
    if !params.amount.is_finite() || params.amount <= 0.0 {
        return Err(anyhow!("amount = {} is not valid", params.amount));
    }
    journal.ensure_dir()?;
    journal.record_dca_start(&params.product)?;

    let deposit = if params.deposit {
        let d = match fund_from_first_payment_method(exchange, params.amount, params.product.quote()).await {
            Ok(d) => d,
            Err(err) => {
                journal.record_dca_result(&params.product, false)?;
                return Err(err.context("deposit before market buy"));
            }
        };
        if !params.settle.is_zero() {
            sleep(params.settle).await;
        }
        Some(d)
    } else {
        None
    };

    let outcome = retry_async(retry, "market_buy", || {
        exchange.place_market_order_funds(&params.product, Side::Buy, params.amount)
    })
    .await
    .map_err(|e| rejection_message(&e));

    journal.record_dca_result(&params.product, outcome.is_ok())?;
    Ok(DcaReport { deposit, outcome })
}
