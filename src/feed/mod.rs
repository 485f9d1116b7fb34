pub mod coinbase_ws;
pub mod ticker;

pub use coinbase_ws::{stream_tickers, FeedSession, StreamEnd};
pub use ticker::{parse_message, subscribe_message, FeedMessage, Ticker, TickerSeries};
