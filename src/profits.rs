//! Realized profit over filled orders on one product.

use anyhow::Result;

use crate::exchange::decimal::round_to;
use crate::exchange::{Exchange, Order, OrderQuery, OrderStatus, ProductId, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilledRow {
    pub value: f64,
    pub fees: f64,
}

impl FilledRow {
    /// Value is `size * price` at cents precision. Market orders carry no
    /// price, so their executed value is used instead.
    pub fn from_order(order: &Order) -> Self {
        let value = match (order.size, order.price) {
            (Some(size), Some(price)) => round_to(size * round_to(price, 2), 2),
            _ => round_to(order.executed_value, 2),
        };
        Self { value, fees: round_to(order.fill_fees, 2) }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideTotals {
    pub rows: Vec<FilledRow>,
    pub value: f64,
    pub fees: f64,
}

impl SideTotals {
    fn push(&mut self, row: FilledRow) {
        self.value += row.value;
        self.fees += row.fees;
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitReport {
    pub product: ProductId,
    pub sells: SideTotals,
    pub buys: SideTotals,
    pub current_price: f64,
}

impl ProfitReport {
    pub fn from_orders(product: &ProductId, orders: &[Order], current_price: f64) -> Self {
        let mut sells = SideTotals::default();
        let mut buys = SideTotals::default();
        for order in orders.iter().filter(|o| o.status == OrderStatus::Done) {
            let row = FilledRow::from_order(order);
            match order.side {
                Side::Sell => sells.push(row),
                Side::Buy => buys.push(row),
            }
        }
        Self { product: product.clone(), sells, buys, current_price }
    }

    /// Sells minus buys minus every fee paid.
    pub fn profit(&self) -> f64 {
        self.sells.value - self.buys.value - self.sells.fees - self.buys.fees
    }
}

pub async fn calculate(exchange: &dyn Exchange, product: &ProductId) -> Result<ProfitReport> {
    let top = exchange.book_top(product).await?;
    let orders = exchange.list_orders(Some(product), OrderQuery::All).await?;
    Ok(ProfitReport::from_orders(product, &orders, top.mid()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: Side, status: OrderStatus, price: Option<f64>, size: Option<f64>, fees: f64, executed: f64) -> Order {
        Order {
            id: "x".to_string(),
            product_id: "ETH-USD".to_string(),
            side,
            price,
            size,
            funds: None,
            status,
            fill_fees: fees,
            filled_size: size.unwrap_or_default(),
            executed_value: executed,
            created_at: None,
        }
    }

    #[test]
    fn test_profit_over_done_orders_only() {
        let product: ProductId = "ETH-USD".parse().unwrap();
        let orders = vec![
            order(Side::Buy, OrderStatus::Done, Some(1900.0), Some(0.5), 4.75, 950.0),
            order(Side::Sell, OrderStatus::Done, Some(2100.0), Some(0.5), 5.25, 1050.0),
            order(Side::Sell, OrderStatus::Open, Some(2200.0), Some(1.0), 0.0, 0.0),
        ];
        let report = ProfitReport::from_orders(&product, &orders, 2000.0);
        assert_eq!(report.buys.rows.len(), 1);
        assert_eq!(report.sells.rows.len(), 1);
        assert_eq!(report.sells.value, 1050.0);
        assert_eq!(report.buys.fees, 4.75);
        assert!((report.profit() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_market_order_uses_executed_value() {
        let row = FilledRow::from_order(&order(Side::Buy, OrderStatus::Done, None, None, 0.124, 24.876));
        assert_eq!(row.value, 24.88);
        assert_eq!(row.fees, 0.12);
    }

    #[test]
    fn test_value_rounds_price_first() {
        let row = FilledRow::from_order(&order(Side::Sell, OrderStatus::Done, Some(2.004), Some(10.0), 0.0, 0.0));
        // 2.00 * 10, not 2.004 * 10
        assert_eq!(row.value, 20.0);
    }
}
