//! The exchange sends prices, sizes and balances as decimal strings.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Str(String),
    Num(f64),
}

impl StrOrNum {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            StrOrNum::Str(s) => s.trim().parse::<f64>().map_err(E::custom),
            StrOrNum::Num(n) => Ok(n),
        }
    }
}

pub fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    StrOrNum::deserialize(d)?.into_f64()
}

pub fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<StrOrNum>::deserialize(d)? {
        Some(v) => v.into_f64().map(Some),
        None => Ok(None),
    }
}

/// Number of decimals an increment such as `"0.01000000"` allows (here 2).
pub fn increment_decimals(increment: &str) -> u32 {
    match increment.trim().split_once('.') {
        Some((_, frac)) => frac.trim_end_matches('0').len() as u32,
        None => 0,
    }
}

/// Round to `decimals` places, exact ties going to the even digit.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}

/// Wire form for a price or size: fixed decimals, no exponent.
pub fn format_decimal(value: f64, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, value)
}
