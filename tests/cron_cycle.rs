//! Scheduled limit-pair runs against the in-memory exchange.
//!
//! Each test drives `run_cycle` several times in a row, the way cron would,
//! and checks the state file and text records between runs.

use std::fs;

use roberto::exchange::{Exchange, OrderQuery, PaperExchange, ProductId, Side};
use roberto::journal::Journal;
use roberto::pricing::{LegOutcome, LimitPairParams};
use roberto::reconcile::{run_cycle, CycleReport, ReconcileOutcome};

fn eth() -> ProductId {
    "ETH-USD".parse().unwrap()
}

fn params() -> LimitPairParams {
    LimitPairParams {
        product: eth(),
        buy_amount_usd: 1000.0,
        swing_percent: 5.0,
        fiat_profits_percent: 100.0,
    }
}

fn exchange() -> PaperExchange {
    PaperExchange::new().with_book(&eth(), 1999.0, 2001.0)
}

fn stored_ids(journal: &Journal) -> Vec<String> {
    journal.order_ids(&eth()).read().unwrap().unwrap_or_default()
}

fn placed(report: CycleReport) -> (ReconcileOutcome, Vec<String>) {
    match report {
        CycleReport::Placed { outcome, result } => {
            let ids = result.accepted_ids().into_iter().map(str::to_string).collect();
            (outcome, ids)
        }
        CycleReport::Idle => panic!("expected a new pair, got Idle"),
    }
}

#[tokio::test]
async fn test_first_run_places_pair_and_stores_ids() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path().join("log"));
    let ex = exchange();

    let (outcome, ids) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    assert_eq!(outcome, ReconcileOutcome::MissingState);
    assert_eq!(ids.len(), 2);
    assert_eq!(stored_ids(&journal), ids);

    let open = ex.list_orders(Some(&eth()), OrderQuery::Open).await.unwrap();
    let buy = open.iter().find(|o| o.side == Side::Buy).unwrap();
    let sell = open.iter().find(|o| o.side == Side::Sell).unwrap();
    assert_eq!((buy.price, buy.size), (Some(1900.0), Some(0.5)));
    assert_eq!((sell.price, sell.size), (Some(2100.0), Some(0.5)));

    let record = fs::read_to_string(journal.limit_orders_record_path(&eth())).unwrap();
    assert!(record.contains("New limit orders creation attempt at "));
    assert!(record.contains(&format!("ID: {}", ids[0])));
    assert!(record.contains(&format!("ID: {}", ids[1])));
}

#[tokio::test]
async fn test_nothing_filled_keeps_orders_and_logs_failure() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path());
    let ex = exchange();

    let (_, first) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    for _ in 0..2 {
        assert!(matches!(run_cycle(&ex, &params(), &journal, true).await.unwrap(), CycleReport::Idle));
    }

    assert_eq!(stored_ids(&journal), first);
    assert!(ex.cancelled().is_empty());
    assert_eq!(ex.orders().len(), 2);
    let failures = fs::read_to_string(journal.failure_log_path(&eth())).unwrap();
    assert_eq!(failures.lines().filter(|l| l.starts_with("No new limit orders set at ")).count(), 2);
}

#[tokio::test]
async fn test_fill_cancels_sibling_and_replaces_pair() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path());
    let ex = exchange();

    let (_, first) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    let buy_id = ex
        .orders()
        .into_iter()
        .find(|o| o.side == Side::Buy)
        .map(|o| o.id)
        .unwrap();
    let sell_id = first.iter().find(|id| **id != buy_id).cloned().unwrap();
    ex.fill(&buy_id).unwrap();
    ex.set_book(&eth(), 1899.0, 1901.0);

    let (outcome, second) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    assert_eq!(
        outcome,
        ReconcileOutcome::Executed { gone: vec![buy_id.clone()], cancelled: vec![sell_id.clone()] }
    );
    assert_eq!(ex.cancelled(), vec![sell_id]);
    assert_eq!(stored_ids(&journal), second);
    assert!(second.iter().all(|id| !first.contains(id)));

    // new pair sits around the new mid of 1900
    let open = ex.list_orders(Some(&eth()), OrderQuery::Open).await.unwrap();
    let mut prices: Vec<f64> = open.iter().filter_map(|o| o.price).collect();
    prices.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(prices, vec![1805.0, 1995.0]);
}

#[tokio::test]
async fn test_failed_sibling_cancel_still_replaces_pair() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path());
    let ex = exchange();

    let (_, first) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    let sell_id = ex
        .orders()
        .into_iter()
        .find(|o| o.side == Side::Sell)
        .map(|o| o.id)
        .unwrap();
    let buy_id = first.iter().find(|id| **id != sell_id).cloned().unwrap();
    ex.fill(&sell_id).unwrap();
    ex.fail_next_cancel(1, "order not cancellable");

    let (outcome, second) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    assert_eq!(outcome, ReconcileOutcome::Executed { gone: vec![sell_id], cancelled: vec![] });
    assert!(ex.cancelled().is_empty());
    assert_eq!(second.len(), 2);
    assert_eq!(stored_ids(&journal), second);
    assert!(!second.contains(&buy_id));

    // the un-cancelled buy is still resting next to the new pair
    let open: Vec<String> = ex
        .list_orders(Some(&eth()), OrderQuery::Open)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(open.len(), 3);
    assert!(open.contains(&buy_id));
}

#[tokio::test]
async fn test_rejected_leg_is_not_stored() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path());
    let ex = exchange();
    ex.fail_next(1, "Insufficient funds");

    let report = run_cycle(&ex, &params(), &journal, true).await.unwrap();
    let CycleReport::Placed { result, .. } = report else { panic!("expected Placed") };
    assert_eq!(result.buy, LegOutcome::Failed("Insufficient funds".to_string()));
    let sell_id = result.sell.id().unwrap().to_string();
    assert_eq!(stored_ids(&journal), vec![sell_id.clone()]);

    let record = fs::read_to_string(journal.limit_orders_record_path(&eth())).unwrap();
    assert!(record.contains("buy error: Insufficient funds"));
    assert!(record.contains(&format!("ID: {}", sell_id)));

    // the lone sell fills: nothing left to cancel, a fresh pair goes out
    ex.fill(&sell_id).unwrap();
    let (outcome, ids) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    assert_eq!(outcome, ReconcileOutcome::Executed { gone: vec![sell_id], cancelled: vec![] });
    assert_eq!(ids.len(), 2);
    assert_eq!(stored_ids(&journal), ids);
}

#[tokio::test]
async fn test_blank_state_file_counts_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path());
    fs::write(journal.order_ids(&eth()).path(), "\n\n").unwrap();
    let ex = exchange();

    let (outcome, ids) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    assert_eq!(outcome, ReconcileOutcome::EmptyState);
    assert_eq!(stored_ids(&journal), ids);
}

#[tokio::test]
async fn test_other_products_do_not_count_as_open() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path());
    let btc: ProductId = "BTC-USD".parse().unwrap();
    let ex = exchange().with_book(&btc, 56_000.0, 56_010.0);

    // an id that is open, but on another product
    let btc_order = ex.place_limit_order(&btc, Side::Buy, 50_000.0, 0.01).await.unwrap();
    journal.ensure_dir().unwrap();
    journal.order_ids(&eth()).append(&[btc_order.id.as_str()]).unwrap();

    let (outcome, _) = placed(run_cycle(&ex, &params(), &journal, true).await.unwrap());
    assert_eq!(outcome, ReconcileOutcome::Executed { gone: vec![btc_order.id], cancelled: vec![] });
    assert!(ex.cancelled().is_empty());
}

#[tokio::test]
async fn test_invalid_params_touch_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path().join("log"));
    let ex = exchange();
    let mut p = params();
    p.swing_percent = 101.0;

    let err = run_cycle(&ex, &p, &journal, true).await.unwrap_err();
    assert!(err.to_string().contains("101"));
    assert!(!journal.log_dir().exists());
    assert!(ex.orders().is_empty());
}
