use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{RepairError, Result};

/// Option right: call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// The opposite right (call <-> put).
    pub fn opposite(self) -> Self {
        match self {
            OptionRight::Call => OptionRight::Put,
            OptionRight::Put => OptionRight::Call,
        }
    }

    pub fn is_call(self) -> bool {
        matches!(self, OptionRight::Call)
    }

    fn code(self) -> char {
        match self {
            OptionRight::Call => 'C',
            OptionRight::Put => 'P',
        }
    }
}

/// Exercise style of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionStyle {
    American,
    European,
}

impl OptionStyle {
    /// European when the root is listed in `european_roots`, American otherwise.
    pub fn for_root(root: &str, european_roots: &[String]) -> Self {
        if european_roots.iter().any(|r| r.eq_ignore_ascii_case(root)) {
            OptionStyle::European
        } else {
            OptionStyle::American
        }
    }
}

/// Contract terms decoded from an OCC-style ticker.
///
/// The layout is `ROOT` + `YYMMDD` + `C|P` + strike x 1000 as eight digits,
/// e.g. `SPY   240119C00450000`. The root may be padded with spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSymbol {
    /// Underlying root (e.g. "SPY", "SPXW")
    pub root: String,
    pub expiry: NaiveDate,
    pub right: OptionRight,
    /// Strike price
    pub strike: f64,
}

/// Length of the `YYMMDD` + right + strike suffix.
const OSI_SUFFIX_LEN: usize = 15;

impl ContractSymbol {
    pub fn parse(ticker: &str) -> Result<Self> {
        let trimmed = ticker.trim();
        let invalid = || RepairError::InvalidSymbol(ticker.to_string());

        if trimmed.len() <= OSI_SUFFIX_LEN || !trimmed.is_ascii() {
            return Err(invalid());
        }
        let (root, suffix) = trimmed.split_at(trimmed.len() - OSI_SUFFIX_LEN);
        let root = root.trim_end();
        if root.is_empty() {
            return Err(invalid());
        }

        let expiry = NaiveDate::parse_from_str(&suffix[..6], "%y%m%d").map_err(|_| invalid())?;
        let right = match &suffix[6..7] {
            "C" | "c" => OptionRight::Call,
            "P" | "p" => OptionRight::Put,
            _ => return Err(invalid()),
        };
        let strike_digits = &suffix[7..];
        if !strike_digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let strike_milli: u64 = strike_digits.parse().map_err(|_| invalid())?;
        if strike_milli == 0 {
            return Err(invalid());
        }

        Ok(Self {
            root: root.to_string(),
            expiry,
            right,
            strike: strike_milli as f64 / 1000.0,
        })
    }

    /// Opposite-right contract at the same strike and expiry.
    pub fn mirror(&self) -> Self {
        Self {
            right: self.right.opposite(),
            ..self.clone()
        }
    }

    /// Renders the ticker back in the padded OCC layout.
    pub fn ticker(&self) -> String {
        format!(
            "{:<6}{}{}{:08}",
            self.root,
            self.expiry.format("%y%m%d"),
            self.right.code(),
            (self.strike * 1000.0).round() as u64
        )
    }
}

/// One contract row of a snapshot, with the fields the repair engine reads.
#[derive(Debug, Clone)]
pub struct ContractRow {
    /// Position of the row in the snapshot (0 = header, 1 = underlying)
    pub row: usize,
    pub ticker: String,
    pub symbol: ContractSymbol,
    pub style: OptionStyle,
    /// Implied volatility as a decimal; zero marks a failed computation
    pub iv: f64,
}

impl ContractRow {
    pub fn strike(&self) -> f64 {
        self.symbol.strike
    }

    pub fn expiry(&self) -> NaiveDate {
        self.symbol.expiry
    }
}

/// (date, ATM IV) pair extracted from one historical snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmIvSample {
    pub date: NaiveDate,
    pub iv: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_osi_ticker() {
        let sym = ContractSymbol::parse("SPY   240119C00450000").unwrap();
        assert_eq!(sym.root, "SPY");
        assert_eq!(sym.expiry, NaiveDate::from_ymd_opt(2024, 1, 19).unwrap());
        assert_eq!(sym.right, OptionRight::Call);
        assert_eq!(sym.strike, 450.0);
    }

    #[test]
    fn parses_unpadded_fractional_strike() {
        let sym = ContractSymbol::parse("SPXW231215P04187500").unwrap();
        assert_eq!(sym.root, "SPXW");
        assert_eq!(sym.right, OptionRight::Put);
        assert_eq!(sym.strike, 4187.5);
    }

    #[test]
    fn mirror_swaps_right_only() {
        let sym = ContractSymbol::parse("QQQ   240315P00380000").unwrap();
        let mirror = sym.mirror();
        assert_eq!(mirror.right, OptionRight::Call);
        assert_eq!(mirror.strike, sym.strike);
        assert_eq!(mirror.expiry, sym.expiry);
        assert_eq!(mirror.ticker(), "QQQ   240315C00380000");
        assert_eq!(mirror.mirror(), sym);
    }

    #[test]
    fn rejects_malformed_tickers() {
        for bad in [
            "SPY",
            "240119C00450000",
            "SPY   241319C00450000",
            "SPY   240119X00450000",
            "SPY   240119C0045O000",
        ] {
            assert!(ContractSymbol::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn style_follows_european_roots() {
        let roots = vec!["SPX".to_string(), "SPXW".to_string()];
        assert_eq!(OptionStyle::for_root("spxw", &roots), OptionStyle::European);
        assert_eq!(OptionStyle::for_root("SPY", &roots), OptionStyle::American);
    }
}
