//! Resting limit orders laid out around the current price.

use anyhow::Result;

use crate::exchange::decimal::round_to;
use crate::exchange::{Exchange, Order, OrderQuery, ProductId, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderRow {
    pub side: Side,
    pub price: f64,
    /// `price - current`, in quote currency.
    pub diff: f64,
    /// `diff / current * 100`.
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    pub current: f64,
    /// Highest first, whatever order the exchange listed them in.
    pub sells: Vec<LadderRow>,
    /// Highest first, whatever order the exchange listed them in.
    pub buys: Vec<LadderRow>,
}

impl Ladder {
    /// Orders without a price (market orders) are skipped. Rows are sorted
    /// by price rather than kept in API order, so the sells read down
    /// towards the current price and the buys away from it.
    pub fn build(orders: &[Order], mid: f64) -> Self {
        let current = round_to(mid, 2);
        let mut sells = Vec::new();
        let mut buys = Vec::new();
        for order in orders {
            let Some(price) = order.price else { continue };
            let price = round_to(price, 2);
            let diff = round_to(price - current, 2);
            let pct = if current > 0.0 { diff / current * 100.0 } else { 0.0 };
            let row = LadderRow { side: order.side, price, diff, pct };
            match order.side {
                Side::Sell => sells.push(row),
                Side::Buy => buys.push(row),
            }
        }
        sells.sort_by(|a, b| b.price.total_cmp(&a.price));
        buys.sort_by(|a, b| b.price.total_cmp(&a.price));
        Self { current, sells, buys }
    }
}

/// Fetch the open orders and build a ladder against `product`'s mid. With
/// `only_product` unset every open order is listed, as a quick glance at
/// the whole account.
pub async fn fetch(exchange: &dyn Exchange, product: &ProductId, only_product: bool) -> Result<Ladder> {
    let filter = if only_product { Some(product) } else { None };
    let orders = exchange.list_orders(filter, OrderQuery::Open).await?;
    let top = exchange.book_top(product).await?;
    Ok(Ladder::build(&orders, top.mid()))
}

/// Limit prices grouped by side, for overlaying on a live ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitLevels {
    pub buys: Vec<f64>,
    pub sells: Vec<f64>,
}

impl LimitLevels {
    pub fn from_orders(orders: &[Order], product: &ProductId) -> Self {
        let mut levels = Self::default();
        for order in orders.iter().filter(|o| o.product_id == product.as_str()) {
            if let Some(price) = order.price {
                match order.side {
                    Side::Buy => levels.buys.push(round_to(price, 2)),
                    Side::Sell => levels.sells.push(round_to(price, 2)),
                }
            }
        }
        levels
    }

    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    /// Lowest sell at or above `price`.
    pub fn nearest_sell_above(&self, price: f64) -> Option<f64> {
        self.sells.iter().copied().filter(|p| *p >= price).min_by(|a, b| a.total_cmp(b))
    }

    /// Highest buy at or below `price`.
    pub fn nearest_buy_below(&self, price: f64) -> Option<f64> {
        self.buys.iter().copied().filter(|p| *p <= price).max_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::OrderStatus;

    fn order(product: &str, side: Side, price: Option<f64>) -> Order {
        Order {
            id: format!("{}-{:?}", product, price),
            product_id: product.to_string(),
            side,
            price,
            size: Some(1.0),
            funds: None,
            status: OrderStatus::Open,
            fill_fees: 0.0,
            filled_size: 0.0,
            executed_value: 0.0,
            created_at: None,
        }
    }

    #[test]
    fn test_ladder_rows() {
        let orders = vec![
            order("ETH-USD", Side::Sell, Some(2100.004)),
            order("ETH-USD", Side::Buy, Some(1900.0)),
            order("ETH-USD", Side::Sell, Some(2200.0)),
            order("ETH-USD", Side::Buy, None),
        ];
        let ladder = Ladder::build(&orders, 2000.004);
        assert_eq!(ladder.current, 2000.0);
        assert_eq!(ladder.sells.len(), 2);
        assert_eq!(ladder.sells[0].price, 2200.0);
        assert_eq!(ladder.sells[1].diff, 100.0);
        assert!((ladder.sells[1].pct - 5.0).abs() < 1e-9);
        assert_eq!(ladder.buys.len(), 1);
        assert_eq!(ladder.buys[0].diff, -100.0);
    }

    #[test]
    fn test_limit_levels_nearest() {
        let eth: ProductId = "ETH-USD".parse().unwrap();
        let orders = vec![
            order("ETH-USD", Side::Sell, Some(2100.0)),
            order("ETH-USD", Side::Sell, Some(2050.0)),
            order("ETH-USD", Side::Buy, Some(1900.0)),
            order("ETH-USD", Side::Buy, Some(1950.0)),
            order("BTC-USD", Side::Buy, Some(1990.0)),
        ];
        let levels = LimitLevels::from_orders(&orders, &eth);
        assert_eq!(levels.buys.len(), 2);
        assert_eq!(levels.nearest_sell_above(2000.0), Some(2050.0));
        assert_eq!(levels.nearest_buy_below(2000.0), Some(1950.0));
        assert_eq!(levels.nearest_sell_above(2200.0), None);
        assert_eq!(levels.nearest_buy_below(1800.0), None);
    }
}
