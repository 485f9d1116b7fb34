use std::future::Future;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::Duration;
use url::Url;

use crate::config::{Config, Credentials};
use crate::exchange::decimal::format_decimal;
use crate::exchange::signing::sign_coinbase;
use crate::exchange::{
    Account, ApiError, BookTop, Deposit, Exchange, Order, OrderQuery, PaymentMethod, Product, ProductId, Side,
};
use crate::logging::{self, v_str, Domain, ProfileScope};

/// Orders requested per `/orders` page (the exchange maximum).
const ORDERS_PAGE_LIMIT: u32 = 1000;
/// At `ORDERS_PAGE_LIMIT` per page this is a million orders; a cursor that
/// is still going past it is treated as an error.
const MAX_ORDER_PAGES: usize = 1000;

/// REST client for the Coinbase Exchange API (the former Coinbase Pro).
pub struct CoinbasePro {
    client: Client,
    base: Url,
    creds: Credentials,
    max_order_pages: usize,
}

struct Response<T> {
    body: T,
    after: Option<String>,
}

impl CoinbasePro {
    pub fn new(cfg: &Config, creds: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .user_agent(concat!("roberto/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base = Url::parse(&cfg.api_base).with_context(|| format!("bad CBPRO_API_BASE {}", cfg.api_base))?;
        Ok(Self { client, base, creds, max_order_pages: MAX_ORDER_PAGES })
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    /// `path` plus the encoded query, exactly as it is signed.
    fn request_url(&self, path: &str, query: &[(&str, String)]) -> Result<(Url, String)> {
        let mut url = self.base.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let request_path = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        Ok((url, request_path))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Response<T>> {
        let (url, request_path) = self.request_url(path, query)?;
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let timestamp = Self::timestamp();
        let signature = sign_coinbase(&timestamp, method.as_str(), &request_path, &body, &self.creds.api_secret)
            .map_err(|e| anyhow!(e))?;

        let _scope = ProfileScope::with_context(
            Domain::Exec,
            "http_request",
            &[("method", v_str(method.as_str())), ("path", v_str(&request_path))],
        );

        let mut req = self
            .client
            .request(method, url)
            .header("CB-ACCESS-KEY", &self.creds.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", timestamp)
            .header("CB-ACCESS-PASSPHRASE", &self.creds.passphrase)
            .header("Accept", "application/json");
        if !body.is_empty() {
            req = req.header("Content-Type", "application/json").body(body);
        }

        let resp = req.send().await.map_err(ApiError::Transport)?;
        let status = resp.status();
        let after = resp
            .headers()
            .get("cb-after")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let text = resp.text().await.map_err(ApiError::Transport)?;

        if !status.is_success() {
            return Err(ApiError::rejected(status.as_u16(), &text).into());
        }

        let body = serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            path: request_path.clone(),
            source,
        })?;
        Ok(Response { body, after })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        Ok(self.send(Method::GET, path, query, None).await?.body)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        Ok(self.send(Method::POST, path, &[], Some(body)).await?.body)
    }

    async fn submit_order(&self, product: &ProductId, side: Side, body: Value) -> Result<Order> {
        match self.post::<Order>("/orders", body).await {
            Ok(order) => {
                logging::log_order_accepted(product.as_str(), side.as_str(), &order.id);
                Ok(order)
            }
            Err(err) => {
                logging::log_order_rejected(product.as_str(), side.as_str(), &crate::exchange::rejection_message(&err));
                Err(err)
            }
        }
    }
}

/// First price of a level-1 book side: `[["price", "size", num_orders], ...]`.
fn best_price(levels: &[Vec<Value>], side: &str) -> Result<f64> {
    let level = levels.first().ok_or_else(|| anyhow!("order book has no {}", side))?;
    let raw = level.first().ok_or_else(|| anyhow!("empty {} level", side))?;
    match raw {
        Value::String(s) => s.parse::<f64>().with_context(|| format!("bad {} price {:?}", side, s)),
        Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("bad {} price {}", side, n)),
        other => Err(anyhow!("bad {} price {}", side, other)),
    }
}

/// Follow a `CB-AFTER` cursor until it runs out or a page comes back
/// empty. A cursor still advertised after `max_pages` pages is an error,
/// never a partial list.
async fn collect_pages<T, F, Fut>(max_pages: usize, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>)>>,
{
    let mut items = Vec::new();
    let mut cursor = None;
    for _ in 0..max_pages {
        let (page, next) = fetch(cursor.take()).await?;
        let empty = page.is_empty();
        items.extend(page);
        match next {
            Some(after) if !empty => cursor = Some(after),
            _ => return Ok(items),
        }
    }
    Err(anyhow!(
        "pagination still advertising more results after {} pages ({} items read)",
        max_pages,
        items.len()
    ))
}

#[async_trait]
impl Exchange for CoinbasePro {
    async fn book_top(&self, product: &ProductId) -> Result<BookTop> {
        #[derive(serde::Deserialize)]
        struct Book {
            bids: Vec<Vec<Value>>,
            asks: Vec<Vec<Value>>,
        }

        let path = format!("/products/{}/book", product);
        let book: Book = self.get(&path, &[("level", "1".to_string())]).await?;
        let top = BookTop {
            bid: best_price(&book.bids, "bids")?,
            ask: best_price(&book.asks, "asks")?,
        };
        logging::log_book_top(product.as_str(), top.bid, top.ask);
        Ok(top)
    }

    async fn product(&self, product: &ProductId) -> Result<Product> {
        self.get(&format!("/products/{}", product), &[]).await
    }

    async fn list_orders(&self, product: Option<&ProductId>, query: OrderQuery) -> Result<Vec<Order>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if query == OrderQuery::All {
            params.push(("status", "all".to_string()));
        }
        if let Some(p) = product {
            params.push(("product_id", p.to_string()));
        }
        params.push(("limit", ORDERS_PAGE_LIMIT.to_string()));

        let orders = collect_pages(self.max_order_pages, |after| {
            let mut page_params = params.clone();
            if let Some(cursor) = after {
                page_params.push(("after", cursor));
            }
            async move {
                let page: Response<Vec<Order>> = self.send(Method::GET, "/orders", &page_params, None).await?;
                Ok((page.body, page.after))
            }
        })
        .await
        .context("listing /orders")?;
        Ok(orders)
    }

    async fn place_limit_order(&self, product: &ProductId, side: Side, price: f64, size: f64) -> Result<Order> {
        logging::log_order_submit(product.as_str(), side.as_str(), "limit", Some(price), Some(size), None);
        let body = json!({
            "type": "limit",
            "product_id": product.as_str(),
            "side": side.as_str(),
            "price": price.to_string(),
            "size": size.to_string(),
        });
        self.submit_order(product, side, body).await
    }

    async fn place_market_order_funds(&self, product: &ProductId, side: Side, funds: f64) -> Result<Order> {
        logging::log_order_submit(product.as_str(), side.as_str(), "market", None, None, Some(funds));
        let body = json!({
            "type": "market",
            "product_id": product.as_str(),
            "side": side.as_str(),
            "funds": format_decimal(funds, 2),
        });
        self.submit_order(product, side, body).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let result: Result<Value> = self
            .send(Method::DELETE, &format!("/orders/{}", order_id), &[], None)
            .await
            .map(|r| r.body);
        match &result {
            Ok(_) => logging::log_cancel(order_id, Ok(())),
            Err(err) => logging::log_cancel(order_id, Err(&crate::exchange::rejection_message(err))),
        }
        result.map(|_| ())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        self.get("/accounts", &[]).await
    }

    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        self.get("/payment-methods", &[]).await
    }

    async fn deposit(&self, amount: f64, currency: &str, payment_method_id: &str) -> Result<Deposit> {
        let body = json!({
            "amount": format_decimal(amount, 2),
            "currency": currency,
            "payment_method_id": payment_method_id,
        });
        self.post("/deposits/payment-method", body).await
    }
}
