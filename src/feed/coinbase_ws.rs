use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::exchange::ProductId;
use crate::feed::ticker::{parse_message, subscribe_message, FeedMessage, Ticker, TickerSeries};
use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Ctrl-C.
    Interrupted,
    /// The server closed the socket.
    Closed,
    /// `max_ticks` ticker messages were received.
    Limit,
}

/// Everything a ticker session collected, one series per product.
#[derive(Debug, Default)]
pub struct FeedSession {
    pub series: BTreeMap<String, TickerSeries>,
    pub messages: u64,
    pub ticks: u64,
}

impl FeedSession {
    /// Feed one text frame through. Returns the ticker and its point when
    /// the frame was a usable tick; feed-level errors abort the session.
    pub fn handle_text(&mut self, text: &str) -> Result<Option<(Ticker, f64)>> {
        self.messages += 1;
        match parse_message(text) {
            Ok(FeedMessage::Ticker(ticker)) => {
                let series = self.series.entry(ticker.product_id.clone()).or_default();
                match series.push(&ticker) {
                    Ok((t, _)) => {
                        self.ticks += 1;
                        Ok(Some((ticker, t)))
                    }
                    Err(err) => {
                        log(Level::Warn, Domain::Market, "bad_tick", obj(&[("msg", v_str(&format!("{:#}", err)))]));
                        Ok(None)
                    }
                }
            }
            Ok(FeedMessage::Error(msg)) => Err(anyhow!("feed error: {}", msg)),
            Ok(FeedMessage::Other(kind)) => {
                log(Level::Trace, Domain::Market, "feed_message", obj(&[("type", v_str(&kind))]));
                Ok(None)
            }
            Err(err) => {
                log(Level::Warn, Domain::Market, "bad_frame", obj(&[("msg", v_str(&format!("{:#}", err)))]));
                Ok(None)
            }
        }
    }
}

/// Subscribe to the ticker channel for `products` and call `on_tick` with
/// every tick, its elapsed time and the product's series so far.
pub async fn stream_tickers<F>(
    ws_url: &str,
    products: &[ProductId],
    max_ticks: Option<u64>,
    mut on_tick: F,
) -> Result<(FeedSession, StreamEnd)>
where
    F: FnMut(&Ticker, f64, &TickerSeries),
{
    let names: Vec<String> = products.iter().map(|p| p.to_string()).collect();
    let (ws, _) = tokio_tungstenite::connect_async(ws_url)
        .await
        .with_context(|| format!("connecting to {}", ws_url))?;
    let (mut write, mut read) = ws.split();
    write.send(Message::Text(subscribe_message(&names))).await?;
    log(
        Level::Info,
        Domain::Market,
        "feed_subscribed",
        obj(&[("url", v_str(ws_url)), ("products", json!(names))]),
    );

    let mut session = FeedSession::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let end = loop {
        tokio::select! {
            _ = &mut ctrl_c => break StreamEnd::Interrupted,
            frame = read.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break StreamEnd::Closed,
                Some(Err(err)) => return Err(err).context("reading from ticker feed"),
                Some(Ok(Message::Text(text))) => {
                    if let Some((ticker, t)) = session.handle_text(&text)? {
                        if let Some(series) = session.series.get(&ticker.product_id) {
                            on_tick(&ticker, t, series);
                        }
                        if max_ticks.map_or(false, |max| session.ticks >= max) {
                            break StreamEnd::Limit;
                        }
                    }
                }
                Some(Ok(_)) => {}
            }
        }
    };

    let _ = write.send(Message::Close(None)).await;
    log(
        Level::Info,
        Domain::Market,
        "feed_closed",
        obj(&[
            ("reason", v_str(&format!("{:?}", end))),
            ("messages", json!(session.messages)),
            ("ticks", json!(session.ticks)),
        ]),
    );
    Ok((session, end))
}
