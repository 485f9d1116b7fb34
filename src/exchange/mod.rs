use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{Config, Credentials};

mod coinbase;
pub mod decimal;
pub mod paper;
pub mod retry;
pub mod signing;

pub use coinbase::CoinbasePro;
pub use paper::PaperExchange;

use decimal::{de_f64, de_opt_f64};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeKind {
    Live,
    Paper,
}

impl ExchangeKind {
    /// `EXCHANGE=paper` swaps the REST client for the in-memory book.
    pub fn from_env() -> Self {
        match std::env::var("EXCHANGE").unwrap_or_default().to_lowercase().as_str() {
            "paper" => ExchangeKind::Paper,
            _ => ExchangeKind::Live,
        }
    }

    pub fn build(self, cfg: &Config, creds: Option<Credentials>) -> Result<Box<dyn Exchange>> {
        match self {
            ExchangeKind::Live => {
                let creds = creds.ok_or_else(|| anyhow::anyhow!("live exchange needs API credentials"))?;
                Ok(Box::new(CoinbasePro::new(cfg, creds)?))
            }
            ExchangeKind::Paper => Ok(Box::new(PaperExchange::from_env())),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx answer; `message` is the body's `message` field when present.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn rejected(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: String,
        }
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.message)
            .unwrap_or_else(|_| body.trim().to_string());
        ApiError::Rejected { status, message }
    }
}

/// The exchange's own message when `err` is a rejection, otherwise the
/// error's display form.
pub fn rejection_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Rejected { message, .. }) => message.clone(),
        _ => format!("{:#}", err),
    }
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("product id {0:?} is not of the form BASE-QUOTE")]
pub struct ProductParseError(String);

/// A `BASE-QUOTE` product id such as `ETH-USD`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductId(String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    pub fn quote(&self) -> &str {
        self.0.split('-').nth(1).unwrap_or_default()
    }

    /// `ETH-USD` -> `ETH_USD`, used in record file names.
    pub fn file_tag(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl FromStr for ProductId {
    type Err = ProductParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(ProductParseError(s));
        }
        Ok(ProductId(s))
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    pub base_increment: String,
    pub quote_increment: String,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderStatus {
    #[default]
    Open,
    Pending,
    Active,
    Done,
    Rejected,
    Other(String),
}

impl OrderStatus {
    /// Still resting on (or about to reach) the book.
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Pending | OrderStatus::Active)
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Pending => "pending",
            OrderStatus::Active => "active",
            OrderStatus::Done => "done",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Other(s) => s,
        }
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(match s.as_str() {
            "open" => OrderStatus::Open,
            "pending" => OrderStatus::Pending,
            "active" => OrderStatus::Active,
            "done" => OrderStatus::Done,
            "rejected" => OrderStatus::Rejected,
            _ => OrderStatus::Other(s),
        })
    }
}

/// Order as returned by `/orders`. Numeric fields arrive as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub product_id: String,
    pub side: Side,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub funds: Option<f64>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "de_f64")]
    pub fill_fees: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub filled_size: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub executed_value: f64,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Which orders `/orders` should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderQuery {
    /// Exchange default: open, pending and active.
    Open,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookTop {
    pub bid: f64,
    pub ask: f64,
}

impl BookTop {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

// =============================================================================
// Accounts and funding
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub currency: String,
    #[serde(deserialize_with = "de_f64")]
    pub balance: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub available: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub hold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: String,
    #[serde(deserialize_with = "de_f64")]
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub payout_at: Option<String>,
}

#[async_trait]
pub trait Exchange: Send + Sync {
    async fn book_top(&self, product: &ProductId) -> Result<BookTop>;
    async fn product(&self, product: &ProductId) -> Result<Product>;
    async fn list_orders(&self, product: Option<&ProductId>, query: OrderQuery) -> Result<Vec<Order>>;
    async fn place_limit_order(&self, product: &ProductId, side: Side, price: f64, size: f64) -> Result<Order>;
    async fn place_market_order_funds(&self, product: &ProductId, side: Side, funds: f64) -> Result<Order>;
    async fn cancel_order(&self, order_id: &str) -> Result<()>;
    async fn accounts(&self) -> Result<Vec<Account>>;
    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>>;
    async fn deposit(&self, amount: f64, currency: &str, payment_method_id: &str) -> Result<Deposit>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_parts() {
        let p: ProductId = "eth-usd".parse().unwrap();
        assert_eq!(p.as_str(), "ETH-USD");
        assert_eq!(p.base(), "ETH");
        assert_eq!(p.quote(), "USD");
        assert_eq!(p.file_tag(), "ETH_USD");
    }

    #[test]
    fn test_product_id_rejects_malformed() {
        assert!("ETHUSD".parse::<ProductId>().is_err());
        assert!("ETH-".parse::<ProductId>().is_err());
        assert!("A-B-C".parse::<ProductId>().is_err());
    }

    #[test]
    fn test_order_decodes_string_decimals() {
        let raw = r#"{
            "id": "3db19014-f97d-449c-b40e-2122a1d73e50",
            "price": "1.85090000",
            "size": "20.00000000",
            "product_id": "MATIC-USD",
            "profile_id": "9e90b3fa-499b-4b8a-8bc3-4c4cd1ad6eb2",
            "side": "buy",
            "type": "limit",
            "time_in_force": "GTC",
            "post_only": false,
            "created_at": "2021-11-26T00:45:18.845641Z",
            "fill_fees": "0.0000000000000000",
            "filled_size": "0.00000000",
            "executed_value": "0.0000000000000000",
            "status": "open"
        }"#;
        let order: Order = serde_json::from_str(raw).unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.price, Some(1.8509));
        assert_eq!(order.size, Some(20.0));
        assert_eq!(order.status, OrderStatus::Open);
        assert!(order.status.is_live());
    }

    #[test]
    fn test_market_order_without_price() {
        let raw = r#"{"id":"x","product_id":"ETH-USD","side":"buy","funds":"24.87","status":"pending","settled":false}"#;
        let order: Order = serde_json::from_str(raw).unwrap();
        assert_eq!(order.price, None);
        assert_eq!(order.funds, Some(24.87));
        assert_eq!(order.fill_fees, 0.0);
    }

    #[test]
    fn test_rejected_extracts_message() {
        let err = ApiError::rejected(400, r#"{"message":"Insufficient funds"}"#);
        assert_eq!(err.to_string(), "Insufficient funds");
        let err = ApiError::rejected(502, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "<html>bad gateway</html>");
    }

    #[test]
    fn test_rejection_message_downcasts() {
        let err: anyhow::Error = ApiError::rejected(400, r#"{"message":"size too small"}"#).into();
        assert_eq!(rejection_message(&err), "size too small");
        let other = anyhow::anyhow!("boom");
        assert_eq!(rejection_message(&other), "boom");
    }

    #[test]
    fn test_unknown_status_kept() {
        let s: OrderStatus = serde_json::from_str("\"received\"").unwrap();
        assert_eq!(s, OrderStatus::Other("received".to_string()));
        assert!(!s.is_live());
    }
}
