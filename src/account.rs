use anyhow::Result;

use crate::exchange::{ApiError, Exchange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCheck {
    /// Credentials accepted; carries the first account's currency.
    Valid { first_currency: Option<String> },
    /// The exchange refused the credentials.
    Invalid { message: String },
}

/// List accounts to find out whether the credentials work. Transport
/// failures are errors, not verdicts.
pub async fn check_credentials(exchange: &dyn Exchange) -> Result<AuthCheck> {
    match exchange.accounts().await {
        Ok(accounts) => Ok(AuthCheck::Valid {
            first_currency: accounts.first().map(|a| a.currency.clone()),
        }),
        Err(err) => match err.downcast_ref::<ApiError>() {
            Some(ApiError::Rejected { message, .. }) => Ok(AuthCheck::Invalid { message: message.clone() }),
            _ => Err(err),
        },
    }
}
