use serde::{Serialize, Deserialize};
use anyhow::{Result, anyhow, bail};
use crate::chain::{ChainClient, TokenBalance};

pub const NATIVE_SYMBOL: &str = "BTC";
pub const NATIVE_NAME: &str = "Bitcoin";
/// The native asset is denominated in wei-equivalent units.
pub const NATIVE_DECIMALS: u32 = 18;

/// Display names for the fixed token set.
const TOKEN_NAMES: &[(&str, &str)] = &[
    ("BTC", "Bitcoin"),
    ("mcbBTC", "Mezo cbBTC"),
    ("mDAI", "Mezo DAI"),
    ("mFBTC", "Mezo FBTC"),
    ("mSolvBTC", "Mezo SolvBTC"),
    ("mswBTC", "Mezo swBTC"),
    ("mT", "Mezo T"),
    ("mUSDC", "Mezo USDC"),
    ("mUSDe", "Mezo USDe"),
    ("mUSDT", "Mezo USDT"),
    ("mxSolvBTC", "Mezo xSolvBTC"),
    ("MUSD", "Mezo USD"),
    ("MEZO", "Mezo Token"),
];

pub fn token_name(symbol: &str) -> &str {
    TOKEN_NAMES
        .iter()
        .find(|(sym, _)| *sym == symbol)
        .map(|(_, name)| *name)
        .unwrap_or(symbol)
}

/// USD-stable tickers render with 2 decimal places, everything else with 8.
pub fn display_precision(symbol: &str) -> u32 {
    if symbol.contains("USD") { 2 } else { 8 }
}

/// A fungible unit balance displayable to the user. `raw_balance` is exact;
/// `balance` is the formatted view of it and is what send-flow UX checks
/// compare against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub balance: String,
    pub balance_usd: String,
    pub decimals: u32,
    pub raw_balance: u128,
    pub contract_address: Option<String>,
}

impl Asset {
    pub fn native(raw: u128) -> Asset {
        Asset {
            symbol: NATIVE_SYMBOL.to_string(),
            name: NATIVE_NAME.to_string(),
            balance: format_display(raw, NATIVE_DECIMALS, display_precision(NATIVE_SYMBOL)),
            balance_usd: String::new(),
            decimals: NATIVE_DECIMALS,
            raw_balance: raw,
            contract_address: None,
        }
    }

    pub fn token(tb: &TokenBalance) -> Asset {
        Asset {
            symbol: tb.symbol.clone(),
            name: token_name(&tb.symbol).to_string(),
            balance: format_display(tb.raw, tb.decimals, display_precision(&tb.symbol)),
            balance_usd: tb.usd.clone().unwrap_or_default(),
            decimals: tb.decimals,
            raw_balance: tb.raw,
            contract_address: tb.contract_address.clone(),
        }
    }
}

/// Assemble the displayable asset list for one (account, chain) pair: the
/// native asset always leads, even at zero; tokens with a zero raw balance
/// are omitted.
pub async fn collect_assets<C: ChainClient>(
    client: &C,
    account: &str,
    chain_id: u64,
) -> Result<Vec<Asset>> {
    let mut assets = Vec::new();

    let native = client.native_balance(account, chain_id).await?;
    assets.push(Asset::native(native));

    for tb in client.token_balances(account, chain_id).await? {
        if tb.symbol == NATIVE_SYMBOL {
            continue; // already covered by the native balance
        }
        if tb.raw == 0 {
            continue;
        }
        assets.push(Asset::token(&tb));
    }

    Ok(assets)
}

/// Advisory dollar total across the asset list.
pub fn total_usd(assets: &[Asset]) -> String {
    let total: f64 = assets
        .iter()
        .filter_map(|a| a.balance_usd.parse::<f64>().ok())
        .sum();
    format!("{total:.2}")
}

/// Convert a raw smallest-denomination amount to its full-precision decimal
/// string, trailing zeros trimmed.
pub fn format_units(raw: u128, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let scale = 10u128.pow(decimals);
    let int = raw / scale;
    let frac = raw % scale;
    if frac == 0 {
        return int.to_string();
    }
    let mut frac_str = format!("{frac:0width$}", width = decimals as usize);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{int}.{frac_str}")
}

/// Format a raw amount with exactly `precision` decimal places, rounding
/// half-up at the cut.
pub fn format_display(raw: u128, decimals: u32, precision: u32) -> String {
    let scaled = if decimals > precision {
        let div = 10u128.pow(decimals - precision);
        (raw + div / 2) / div
    } else {
        raw * 10u128.pow(precision - decimals)
    };
    if precision == 0 {
        return scaled.to_string();
    }
    let scale = 10u128.pow(precision);
    format!(
        "{}.{:0width$}",
        scaled / scale,
        scaled % scale,
        width = precision as usize
    )
}

/// Parse a human-entered decimal amount into raw smallest-denomination
/// units. Rejects malformed input, negative amounts and fractions finer
/// than `decimals` allows.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128> {
    let s = amount.trim();
    if s.is_empty() {
        bail!("amount is empty");
    }
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        bail!("'{s}' is not a number");
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        bail!("'{s}' is not a non-negative decimal number");
    }
    if frac_part.len() > decimals as usize {
        bail!("'{s}' has more than {decimals} decimal places");
    }

    let int: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| anyhow!("'{s}' integer part overflows"))?
    };
    let frac: u128 = if frac_part.is_empty() {
        0
    } else {
        let digits: u128 = frac_part.parse().map_err(|_| anyhow!("'{s}' fraction overflows"))?;
        digits * 10u128.pow(decimals - frac_part.len() as u32)
    };

    int.checked_mul(10u128.pow(decimals))
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(|| anyhow!("'{s}' overflows the raw amount range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        let raw = parse_units("0.5", 18).unwrap();
        assert_eq!(raw, 500_000_000_000_000_000);
        assert_eq!(format_units(raw, 18), "0.5");

        assert_eq!(parse_units("1", 18).unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_units(".25", 8).unwrap(), 25_000_000);
        assert_eq!(format_units(0, 18), "0");
        assert_eq!(format_units(1, 18), "0.000000000000000001");
    }

    #[test]
    fn parse_units_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units(".", 18).is_err());
        // finer than the asset's scale
        assert!(parse_units("0.123", 2).is_err());
    }

    #[test]
    fn display_formatting_rounds_half_up() {
        // 1.000000004999... BTC renders as 1.00000000
        assert_eq!(format_display(1_000_000_004_999_999_999, 18, 8), "1.00000000");
        // 1.000000005 rounds up
        assert_eq!(format_display(1_000_000_005_000_000_000, 18, 8), "1.00000001");
        // USD-stable precision
        assert_eq!(format_display(1_234_567, 6, 2), "1.23");
        assert_eq!(display_precision("mUSDC"), 2);
        assert_eq!(display_precision("BTC"), 8);
    }

    #[test]
    fn token_names_fall_back_to_symbol() {
        assert_eq!(token_name("MUSD"), "Mezo USD");
        assert_eq!(token_name("XYZ"), "XYZ");
    }
}
