//! Arguments and start-up shared by every binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::{Config, Credentials};
use crate::display;
use crate::exchange::{Exchange, ExchangeKind, ProductId};
use crate::logging::{self, log, obj, v_str, Domain, Level};
use crate::pricing::LimitPairParams;

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Dotenv file holding API_KEY, API_SECRET and PASSPHRASE
    /// (.env, or .env_default for dca)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Directory for state files, journals and structured logs
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Positional arguments of the two limit-pair tools.
#[derive(Args, Debug, Clone)]
pub struct LimitPairArgs {
    /// Product to trade, e.g. ETH-USD
    pub product: ProductId,
    /// Quote-currency amount behind each leg
    pub buy_amount_usd: f64,
    /// Distance of each limit from the mid price, in percent
    pub swing_percent: f64,
    /// Share of the swing taken as fiat profit, in percent
    pub fiat_profits_percent: f64,
}

impl LimitPairArgs {
    pub fn params(&self) -> LimitPairParams {
        LimitPairParams {
            product: self.product.clone(),
            buy_amount_usd: self.buy_amount_usd,
            swing_percent: self.swing_percent,
            fiat_profits_percent: self.fiat_profits_percent,
        }
    }

    /// Parsed arguments followed by the tool's flags, one aligned
    /// `name = value` line each. Numbers keep their decimal point.
    pub fn echo(&self, flags: &[(&str, bool)]) -> String {
        let mut pairs = vec![
            ("product", self.product.to_string()),
            ("buy_amount_usd", format!("{:?}", self.buy_amount_usd)),
            ("swing_percent", format!("{:?}", self.swing_percent)),
            ("fiat_profits_percent", format!("{:?}", self.fiat_profits_percent)),
        ];
        pairs.extend(flags.iter().map(|(name, on)| (*name, on.to_string())));
        display::render_args(&pairs)
    }
}

/// A ready exchange plus the settings it was built from.
pub struct Session {
    pub cfg: Config,
    pub kind: ExchangeKind,
    pub exchange: Box<dyn Exchange>,
}

impl CommonArgs {
    pub fn config(&self) -> Config {
        Config::from_env().with_log_dir(self.log_dir.clone())
    }

    pub fn env_file_or(&self, default: &str) -> PathBuf {
        self.env_file.clone().unwrap_or_else(|| PathBuf::from(default))
    }

    /// Resolve config, start logging, load credentials (the paper exchange
    /// needs none) and build the exchange.
    pub fn connect(&self, bin: &str) -> Result<Session> {
        self.connect_with_env(bin, ".env")
    }

    pub fn connect_with_env(&self, bin: &str, default_env_file: &str) -> Result<Session> {
        let cfg = self.config();
        logging::init(&cfg.log_dir);
        let kind = ExchangeKind::from_env();
        let creds = match kind {
            ExchangeKind::Live => Some(Credentials::load(&self.env_file_or(default_env_file))?),
            ExchangeKind::Paper => None,
        };
        log(
            Level::Info,
            Domain::System,
            "start",
            obj(&[
                ("bin", v_str(bin)),
                ("exchange", v_str(&format!("{:?}", kind).to_lowercase())),
                ("api_base", v_str(&cfg.api_base)),
                ("log_dir", v_str(&cfg.log_dir.display().to_string())),
            ]),
        );
        let exchange = kind.build(&cfg, creds)?;
        Ok(Session { cfg, kind, exchange })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn test_common_args_defaults() {
        let cli = TestCli::parse_from(["bin"]);
        assert_eq!(cli.common.env_file_or(".env"), PathBuf::from(".env"));
        assert_eq!(cli.common.env_file_or(".env_default"), PathBuf::from(".env_default"));
        assert!(cli.common.log_dir.is_none());
    }

    #[test]
    fn test_log_dir_flag_overrides_config() {
        let cli = TestCli::parse_from(["bin", "--log-dir", "/tmp/roberto-logs", "--env-file", ".env_default"]);
        assert_eq!(cli.common.config().log_dir, PathBuf::from("/tmp/roberto-logs"));
        assert_eq!(cli.common.env_file_or(".env"), PathBuf::from(".env_default"));
    }

    #[derive(Parser)]
    struct PairCli {
        #[command(flatten)]
        pair: LimitPairArgs,
    }

    #[test]
    fn test_limit_pair_args_parse_and_echo() {
        let cli = PairCli::parse_from(["roberto", "eth-usd", "1000", "5", "100"]);
        let params = cli.pair.params();
        assert_eq!(params.product.as_str(), "ETH-USD");
        assert_eq!(params.swing_percent, 5.0);
        assert_eq!(
            cli.pair.echo(&[("yes", true), ("quiet", false)]),
            "product              = ETH-USD\n\
             buy_amount_usd       = 1000.0\n\
             swing_percent        = 5.0\n\
             fiat_profits_percent = 100.0\n\
             yes                  = true\n\
             quiet                = false\n"
        );
    }

    #[test]
    fn test_limit_pair_args_reject_bad_product() {
        assert!(PairCli::try_parse_from(["roberto", "ETHUSD", "1000", "5", "100"]).is_err());
    }
}
