//! Symbol classification and pip/USD conversion.
//!
//! The engine works in three unit systems: USD thresholds (what the operator
//! configures), pips (what the agents' open endpoint takes), and price
//! levels (what the modify endpoint takes). The conversion constant is
//!
//!   usd_per_pip = trade_tick_value × (pip_value / point) × lots
//!
//! where `trade_tick_value` is USD per tick per lot, `point` is the broker's
//! minimum quote increment and `pip_value` the pip size in price units
//! (1 pip = 10 points on 3/5-digit brokers).

use crate::error::HedgeError;

/// Symbol class, keyed off the uppercased symbol name.
///
/// Drives the pip-size fallback (used when an agent quote omits `pip_value`)
/// and the decimal count prices are rounded to before being sent back out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolClass {
    /// Any pair quoted in yen.
    Jpy,
    /// BTC / ETH.
    CryptoMajor,
    /// XRP / LTC / BCH.
    CryptoMinor,
    /// Gold and silver.
    Metal,
    /// Plain 5-digit FX.
    Default,
}

impl SymbolClass {
    pub fn of(symbol: &str) -> Self {
        let s = symbol.to_ascii_uppercase();
        if s.contains("JPY") {
            SymbolClass::Jpy
        } else if s.starts_with("BTC") || s.starts_with("ETH") {
            SymbolClass::CryptoMajor
        } else if s.starts_with("XRP") || s.starts_with("LTC") || s.starts_with("BCH") {
            SymbolClass::CryptoMinor
        } else if s.starts_with("XAU") || s.starts_with("XAG") {
            SymbolClass::Metal
        } else {
            SymbolClass::Default
        }
    }

    /// Pip size in price units, used only when the agent quote has none.
    pub fn pip_fallback(self) -> f64 {
        match self {
            SymbolClass::Jpy => 0.01,
            SymbolClass::CryptoMajor => 1.0,
            SymbolClass::CryptoMinor => 0.01,
            SymbolClass::Metal => 0.01,
            SymbolClass::Default => 0.0001,
        }
    }

    /// Decimal places for outgoing price levels.
    pub fn price_decimals(self) -> u32 {
        match self {
            SymbolClass::Jpy => 3,
            SymbolClass::CryptoMajor | SymbolClass::CryptoMinor | SymbolClass::Metal => 2,
            SymbolClass::Default => 5,
        }
    }
}

/// Resolve the pip size for `symbol`: the agent-reported value wins when
/// present and positive, otherwise the class-table fallback.
pub fn resolve_pip_size(symbol: &str, reported: Option<f64>) -> f64 {
    match reported {
        Some(v) if v > 0.0 => v,
        _ => SymbolClass::of(symbol).pip_fallback(),
    }
}

/// The conversion constant between USD thresholds and pip distances.
///
/// Fails when any input is non-positive or the result is not a usable
/// positive finite number — a zero here would turn every USD threshold
/// into an infinite pip distance downstream.
pub fn usd_per_pip(
    trade_tick_value: f64,
    pip_size: f64,
    point: f64,
    lots: f64,
) -> Result<f64, HedgeError> {
    if point <= 0.0 || pip_size <= 0.0 || trade_tick_value <= 0.0 || lots <= 0.0 {
        return Err(HedgeError::Other(format!(
            "cannot derive usd_per_pip from tick_value={trade_tick_value}, pip={pip_size}, point={point}, lots={lots}"
        )));
    }
    let v = trade_tick_value * (pip_size / point) * lots;
    if !v.is_finite() || v <= 0.0 {
        return Err(HedgeError::Other(format!("usd_per_pip came out as {v}")));
    }
    Ok(v)
}

/// Round a pip quantity to 0.1 pip, the granularity the agents accept.
pub fn round_pips(pips: f64) -> f64 {
    (pips * 10.0).round() / 10.0
}

/// Round a price level to the symbol class's decimal count.
pub fn round_price(price: f64, symbol: &str) -> f64 {
    let factor = 10f64.powi(SymbolClass::of(symbol).price_decimals() as i32);
    (price * factor).round() / factor
}

/// Round a lot size to 2 decimals (the broker volume step).
pub fn round_lots(lots: f64) -> f64 {
    (lots * 100.0).round() / 100.0
}
