//! Plain-text record files kept next to each other in the log directory.
//!
//! These are for humans reading `tail -f`; the JSON event log in
//! [`crate::logging`] is the machine-readable side.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::exchange::ProductId;
use crate::pricing::{LegOutcome, LimitPairResult};

pub const DCA_LOG: &str = "dca_log.txt";

/// Local time as `2021 11 26, 00:45:18`.
pub fn stamp() -> String {
    Local::now().format("%Y %m %d, %H:%M:%S").to_string()
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// `current_order_ids_<TAG>.txt`: ids of the pair placed by the last run.
#[derive(Debug, Clone)]
pub struct OrderIdFile {
    path: PathBuf,
}

impl OrderIdFile {
    pub fn for_product(log_dir: &Path, product: &ProductId) -> Self {
        Self { path: log_dir.join(format!("current_order_ids_{}.txt", product.file_tag())) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file does not exist. Blank lines are skipped.
    pub fn read(&self) -> io::Result<Option<Vec<String>>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// True when the file exists but holds no ids.
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(matches!(self.read()?, Some(ids) if ids.is_empty()))
    }

    pub fn truncate(&self) -> io::Result<()> {
        File::create(&self.path).map(|_| ())
    }

    pub fn append(&self, ids: &[&str]) -> io::Result<()> {
        let mut f = append(&self.path)?;
        for id in ids {
            writeln!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// Append-only text records for the limit-pair and DCA tools.
#[derive(Debug, Clone)]
pub struct Journal {
    log_dir: PathBuf,
}

impl Journal {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.log_dir)
    }

    pub fn order_ids(&self, product: &ProductId) -> OrderIdFile {
        OrderIdFile::for_product(&self.log_dir, product)
    }

    pub fn limit_orders_record_path(&self, product: &ProductId) -> PathBuf {
        self.log_dir.join(format!("limit_orders_record_{}.txt", product.file_tag()))
    }

    pub fn failure_log_path(&self, product: &ProductId) -> PathBuf {
        self.log_dir.join(format!("failure_log_{}.txt", product.file_tag()))
    }

    pub fn dca_log_path(&self) -> PathBuf {
        self.log_dir.join(DCA_LOG)
    }

    pub fn record_limit_orders(&self, result: &LimitPairResult) -> io::Result<()> {
        let product = &result.product;
        let mut f = append(&self.limit_orders_record_path(product))?;
        writeln!(f, "\n\nNew limit orders creation attempt at {}", stamp())?;
        for (label, title, leg) in [("buy", "Limit buy", &result.buy), ("sell", "Limit sell", &result.sell)] {
            match leg {
                LegOutcome::Failed(msg) => writeln!(f, "\n{} error: {}", label, msg)?,
                LegOutcome::Placed(order) => {
                    let price = order.price.unwrap_or_default();
                    let size = order.size.unwrap_or_default();
                    writeln!(f, "\n{}:", title)?;
                    writeln!(f, "Price: {}", price)?;
                    writeln!(f, "Size: {} {} ({} {})", size, product.base(), price * size, product.quote())?;
                    writeln!(f, "ID: {}", order.id)?;
                }
            }
        }
        Ok(())
    }

    pub fn record_no_new_orders(&self, product: &ProductId) -> io::Result<()> {
        let mut f = append(&self.failure_log_path(product))?;
        writeln!(f, "No new limit orders set at {}", stamp())
    }

    pub fn record_dca_start(&self, product: &ProductId) -> io::Result<()> {
        let mut f = append(&self.dca_log_path())?;
        writeln!(f, "dca run for {} at {}", product.file_tag(), stamp())
    }

    pub fn record_dca_result(&self, product: &ProductId, succeeded: bool) -> io::Result<()> {
        let mut f = append(&self.dca_log_path())?;
        let verdict = if succeeded { "succeeded" } else { "failed" };
        writeln!(f, "DCA {} for {} at {}", verdict, product.file_tag(), stamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Order, OrderStatus, Side};
    use crate::pricing::LimitPairPlan;

    fn eth() -> ProductId {
        "ETH-USD".parse().unwrap()
    }

    fn order(id: &str, side: Side, price: f64, size: f64) -> Order {
        Order {
            id: id.to_string(),
            product_id: "ETH-USD".to_string(),
            side,
            price: Some(price),
            size: Some(size),
            funds: None,
            status: OrderStatus::Open,
            fill_fees: 0.0,
            filled_size: 0.0,
            executed_value: 0.0,
            created_at: None,
        }
    }

    #[test]
    fn test_order_id_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let file = OrderIdFile::for_product(dir.path(), &eth());
        assert!(file.path().ends_with("current_order_ids_ETH_USD.txt"));
        assert_eq!(file.read().unwrap(), None);
        assert!(!file.is_empty().unwrap());

        file.append(&["a", "b"]).unwrap();
        assert_eq!(file.read().unwrap(), Some(vec!["a".to_string(), "b".to_string()]));

        file.truncate().unwrap();
        assert_eq!(file.read().unwrap(), Some(vec![]));
        assert!(file.is_empty().unwrap());
    }

    #[test]
    fn test_order_id_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = OrderIdFile::for_product(dir.path(), &eth());
        fs::write(file.path(), "\n  id-1  \n\nid-2\n").unwrap();
        assert_eq!(file.read().unwrap(), Some(vec!["id-1".to_string(), "id-2".to_string()]));
    }

    #[test]
    fn test_limit_orders_record_format() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        let result = LimitPairResult {
            product: eth(),
            plan: LimitPairPlan { mid: 2000.0, buy_price: 1900.0, buy_size: 0.5, sell_price: 2100.0, sell_size: 0.5 },
            buy: LegOutcome::Placed(order("buy-1", Side::Buy, 1900.0, 0.5)),
            sell: LegOutcome::Failed("Insufficient funds".to_string()),
        };
        journal.record_limit_orders(&result).unwrap();

        let text = fs::read_to_string(journal.limit_orders_record_path(&eth())).unwrap();
        assert!(text.starts_with("\n\nNew limit orders creation attempt at "));
        assert!(text.contains("\nLimit buy:\nPrice: 1900\nSize: 0.5 ETH (950 USD)\nID: buy-1\n"));
        assert!(text.contains("\nsell error: Insufficient funds\n"));
    }

    #[test]
    fn test_failure_and_dca_logs_append() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        journal.record_no_new_orders(&eth()).unwrap();
        journal.record_no_new_orders(&eth()).unwrap();
        let text = fs::read_to_string(journal.failure_log_path(&eth())).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("No new limit orders set at "));

        journal.record_dca_start(&eth()).unwrap();
        journal.record_dca_result(&eth(), false).unwrap();
        let text = fs::read_to_string(journal.dca_log_path()).unwrap();
        assert!(text.contains("dca run for ETH_USD at "));
        assert!(text.contains("DCA failed for ETH_USD at "));
    }
}
