//! In-memory exchange for dry runs (`EXCHANGE=paper`) and tests.
//!
//! Limit orders rest until [`PaperExchange::fill`] is called; market orders
//! fill at the ask immediately. Queued failures let callers rehearse
//! rejected orders and retries.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::exchange::{
    Account, ApiError, BookTop, Deposit, Exchange, Order, OrderQuery, OrderStatus, PaymentMethod, Product, ProductId,
    Side,
};

#[derive(Debug, Default)]
struct PaperState {
    books: HashMap<ProductId, BookTop>,
    orders: Vec<Order>,
    cancelled: Vec<String>,
    deposits: Vec<Deposit>,
    accounts: Vec<Account>,
    payment_methods: Vec<PaymentMethod>,
    failures: VecDeque<String>,
    cancel_failures: VecDeque<String>,
    next_id: u64,
}

impl PaperState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("paper-{:06}", self.next_id)
    }

    fn take_failure(&mut self) -> Result<()> {
        match self.failures.pop_front() {
            Some(message) => Err(ApiError::Rejected { status: 400, message }.into()),
            None => Ok(()),
        }
    }

    fn take_cancel_failure(&mut self) -> Result<()> {
        match self.cancel_failures.pop_front() {
            Some(message) => Err(ApiError::Rejected { status: 400, message }.into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct PaperExchange {
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeded from `PAPER_PRODUCT`, `PAPER_BID` and `PAPER_ASK`.
    pub fn from_env() -> Self {
        let product: ProductId = std::env::var("PAPER_PRODUCT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| ProductId("ETH-USD".to_string()));
        let bid = std::env::var("PAPER_BID").ok().and_then(|v| v.parse().ok()).unwrap_or(2000.0);
        let ask = std::env::var("PAPER_ASK").ok().and_then(|v| v.parse().ok()).unwrap_or(bid + 0.01);
        Self::new()
            .with_book(&product, bid, ask)
            .with_account("USD", 10_000.0)
            .with_payment_method("paper-bank", "Paper Bank", "USD")
    }

    pub fn with_book(self, product: &ProductId, bid: f64, ask: f64) -> Self {
        self.set_book(product, bid, ask);
        self
    }

    pub fn with_account(self, currency: &str, balance: f64) -> Self {
        if let Ok(mut s) = self.state() {
            let id = s.next_id();
            s.accounts.push(Account {
                id,
                currency: currency.to_string(),
                balance,
                available: balance,
                hold: 0.0,
            });
        }
        self
    }

    pub fn with_payment_method(self, id: &str, name: &str, currency: &str) -> Self {
        if let Ok(mut s) = self.state() {
            s.payment_methods.push(PaymentMethod {
                id: id.to_string(),
                name: name.to_string(),
                currency: currency.to_string(),
            });
        }
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, PaperState>> {
        self.state.lock().map_err(|_| anyhow!("paper exchange state poisoned"))
    }

    pub fn set_book(&self, product: &ProductId, bid: f64, ask: f64) {
        if let Ok(mut s) = self.state() {
            s.books.insert(product.clone(), BookTop { bid, ask });
        }
    }

    /// The next `count` order placements are rejected with `message`.
    pub fn fail_next(&self, count: usize, message: &str) {
        if let Ok(mut s) = self.state() {
            s.failures.extend(std::iter::repeat(message.to_string()).take(count));
        }
    }

    /// The next `count` cancels are rejected with `message`; the orders stay
    /// open.
    pub fn fail_next_cancel(&self, count: usize, message: &str) {
        if let Ok(mut s) = self.state() {
            s.cancel_failures.extend(std::iter::repeat(message.to_string()).take(count));
        }
    }

    /// Mark a resting order as completely filled.
    pub fn fill(&self, order_id: &str) -> Result<()> {
        let mut s = self.state()?;
        let order = s
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| anyhow!("unknown order {}", order_id))?;
        let price = order.price.unwrap_or(0.0);
        let size = order.size.unwrap_or(0.0);
        order.status = OrderStatus::Done;
        order.filled_size = size;
        order.executed_value = price * size;
        order.fill_fees = order.executed_value * 0.005;
        Ok(())
    }

    /// Insert an order as-is, e.g. a historical fill.
    pub fn insert_order(&self, order: Order) {
        if let Ok(mut s) = self.state() {
            s.orders.push(order);
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state().map(|s| s.orders.clone()).unwrap_or_default()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state().map(|s| s.cancelled.clone()).unwrap_or_default()
    }

    pub fn deposits(&self) -> Vec<Deposit> {
        self.state().map(|s| s.deposits.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn book_top(&self, product: &ProductId) -> Result<BookTop> {
        let s = self.state()?;
        s.books
            .get(product)
            .copied()
            .ok_or_else(|| ApiError::Rejected { status: 404, message: "NotFound".to_string() }.into())
    }

    async fn product(&self, product: &ProductId) -> Result<Product> {
        let s = self.state()?;
        if !s.books.contains_key(product) {
            return Err(ApiError::Rejected { status: 404, message: "NotFound".to_string() }.into());
        }
        Ok(Product {
            id: product.to_string(),
            base_increment: "0.00000001".to_string(),
            quote_increment: "0.01000000".to_string(),
        })
    }

    async fn list_orders(&self, product: Option<&ProductId>, query: OrderQuery) -> Result<Vec<Order>> {
        let s = self.state()?;
        Ok(s.orders
            .iter()
            .filter(|o| product.map_or(true, |p| o.product_id == p.as_str()))
            .filter(|o| query == OrderQuery::All || o.status.is_live())
            .cloned()
            .collect())
    }

    async fn place_limit_order(&self, product: &ProductId, side: Side, price: f64, size: f64) -> Result<Order> {
        let mut s = self.state()?;
        s.take_failure()?;
        if price <= 0.0 || size <= 0.0 {
            return Err(ApiError::Rejected { status: 400, message: "Invalid order size or price".to_string() }.into());
        }
        let order = Order {
            id: s.next_id(),
            product_id: product.to_string(),
            side,
            price: Some(price),
            size: Some(size),
            funds: None,
            status: OrderStatus::Open,
            fill_fees: 0.0,
            filled_size: 0.0,
            executed_value: 0.0,
            created_at: Some(crate::logging::ts_now()),
        };
        s.orders.push(order.clone());
        Ok(order)
    }

    async fn place_market_order_funds(&self, product: &ProductId, side: Side, funds: f64) -> Result<Order> {
        let mut s = self.state()?;
        s.take_failure()?;
        let top = s
            .books
            .get(product)
            .copied()
            .ok_or_else(|| anyhow::Error::from(ApiError::Rejected { status: 404, message: "NotFound".to_string() }))?;
        let px = match side {
            Side::Buy => top.ask,
            Side::Sell => top.bid,
        };
        let fees = funds * 0.005;
        let order = Order {
            id: s.next_id(),
            product_id: product.to_string(),
            side,
            price: None,
            size: None,
            funds: Some(funds),
            status: OrderStatus::Done,
            fill_fees: fees,
            filled_size: (funds - fees) / px,
            executed_value: funds - fees,
            created_at: Some(crate::logging::ts_now()),
        };
        s.orders.push(order.clone());
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let mut s = self.state()?;
        s.take_cancel_failure()?;
        let pos = s
            .orders
            .iter()
            .position(|o| o.id == order_id && o.status.is_live())
            .ok_or_else(|| anyhow::Error::from(ApiError::Rejected { status: 404, message: "order not found".to_string() }))?;
        s.orders.remove(pos);
        s.cancelled.push(order_id.to_string());
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.state()?.accounts.clone())
    }

    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        Ok(self.state()?.payment_methods.clone())
    }

    async fn deposit(&self, amount: f64, currency: &str, payment_method_id: &str) -> Result<Deposit> {
        let mut s = self.state()?;
        if !s.payment_methods.iter().any(|m| m.id == payment_method_id) {
            return Err(ApiError::Rejected { status: 400, message: "payment method not found".to_string() }.into());
        }
        let deposit = Deposit {
            id: s.next_id(),
            amount,
            currency: currency.to_string(),
            payout_at: Some(crate::logging::ts_now()),
        };
        if let Some(acct) = s.accounts.iter_mut().find(|a| a.currency == currency) {
            acct.balance += amount;
            acct.available += amount;
        }
        s.deposits.push(deposit.clone());
        Ok(deposit)
    }
}
