//! Detect fills by diffing open-order ids between scheduled runs.
//!
//! Each run reads the ids the previous run placed. If every one is still
//! open, nothing happened. If any disappeared, one leg filled (or was
//! cancelled by hand): the surviving sibling is cancelled and a fresh pair
//! is placed around the current price.

use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::exchange::{rejection_message, Exchange, OrderQuery, ProductId};
use crate::journal::{Journal, OrderIdFile};
use crate::logging;
use crate::pricing::{set_limit_orders, Confirm, LimitPairParams, LimitPairResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No state file yet.
    MissingState,
    /// State file present but holds no ids.
    EmptyState,
    /// Every stored id is still open.
    Unchanged,
    /// `gone` ids are no longer open; `cancelled` are the siblings that were.
    Executed { gone: Vec<String>, cancelled: Vec<String> },
}

impl ReconcileOutcome {
    pub fn should_create_orders(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::MissingState => "missing_state",
            ReconcileOutcome::EmptyState => "empty_state",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Executed { .. } => "executed",
        }
    }
}

/// Ids of the open orders on `product`.
pub async fn open_order_ids(exchange: &dyn Exchange, product: &ProductId) -> Result<Vec<String>> {
    let orders = exchange.list_orders(Some(product), OrderQuery::Open).await?;
    Ok(orders
        .into_iter()
        .filter(|o| o.product_id == product.as_str())
        .map(|o| o.id)
        .collect())
}

/// Split stored ids into `(gone, still_open)`, keeping file order.
pub fn diff_ids(stored: &[String], open: &[String]) -> (Vec<String>, Vec<String>) {
    let open: HashSet<&str> = open.iter().map(String::as_str).collect();
    stored.iter().cloned().partition(|id| !open.contains(id.as_str()))
}

/// Compare the stored ids with the exchange. On a detected fill the
/// surviving siblings are cancelled and the state file is truncated.
/// Failed cancels are logged and reported but do not abort the run.
pub async fn check_if_limits_executed(
    exchange: &dyn Exchange,
    product: &ProductId,
    store: &OrderIdFile,
    quiet: bool,
) -> Result<ReconcileOutcome> {
    let stored = match store.read().with_context(|| format!("reading {}", store.path().display()))? {
        None => {
            if !quiet {
                println!();
                println!("File not found: {}", store.path().display());
                println!("Creating file with order ids for next time this runs.");
                println!();
            }
            logging::log_reconcile(product.as_str(), "missing_state", 0, 0);
            return Ok(ReconcileOutcome::MissingState);
        }
        Some(ids) if ids.is_empty() => {
            if !quiet {
                println!();
                println!("File is empty: {}", store.path().display());
                println!("Creating file with order ids for next time this runs.");
                println!();
            }
            logging::log_reconcile(product.as_str(), "empty_state", 0, 0);
            return Ok(ReconcileOutcome::EmptyState);
        }
        Some(ids) => ids,
    };

    let open = open_order_ids(exchange, product).await?;
    let (gone, surviving) = diff_ids(&stored, &open);
    logging::log_reconcile(product.as_str(), if gone.is_empty() { "unchanged" } else { "executed" }, stored.len(), open.len());

    if gone.is_empty() {
        if !quiet {
            println!();
            println!("All stored order ids are still open");
            println!("No orders went off");
            println!();
        }
        return Ok(ReconcileOutcome::Unchanged);
    }

    if !quiet {
        println!();
        println!("Stored order ids are *not* all open");
        println!("One order went off, or was otherwise canceled");
        println!();
    }

    let mut cancelled = Vec::new();
    for order_id in surviving {
        if !quiet {
            println!("Canceling the other order of the pair: order id = {}", order_id);
        }
        match exchange.cancel_order(&order_id).await {
            Ok(()) => cancelled.push(order_id),
            Err(err) => eprintln!("cancel of {} failed: {}", order_id, rejection_message(&err)),
        }
    }
    if !quiet && !cancelled.is_empty() {
        println!("Cancel succeeded");
        println!();
    }

    store.truncate().with_context(|| format!("truncating {}", store.path().display()))?;
    Ok(ReconcileOutcome::Executed { gone, cancelled })
}

#[derive(Debug)]
pub enum CycleReport {
    /// A fresh pair was placed (possibly with rejected legs).
    Placed { outcome: ReconcileOutcome, result: LimitPairResult },
    /// Nothing filled since the last run.
    Idle,
}

/// One scheduler tick of the limit-pair bot.
pub async fn run_cycle(
    exchange: &dyn Exchange,
    params: &LimitPairParams,
    journal: &Journal,
    quiet: bool,
) -> Result<CycleReport> {
    params.validate()?;
    journal
        .ensure_dir()
        .with_context(|| format!("creating {}", journal.log_dir().display()))?;

    let store = journal.order_ids(&params.product);
    let outcome = check_if_limits_executed(exchange, &params.product, &store, quiet).await?;

    if !outcome.should_create_orders() {
        journal.record_no_new_orders(&params.product)?;
        return Ok(CycleReport::Idle);
    }

    let result = set_limit_orders(exchange, params, Confirm::Yes, quiet)
        .await?
        .context("limit orders were not confirmed")?;
    journal.record_limit_orders(&result)?;
    store.append(&result.accepted_ids())?;

    if !quiet {
        println!();
        println!("cron_roberto is done setting new limit orders!");
        println!();
    }
    Ok(CycleReport::Placed { outcome, result })
}
