//! Identity & venue resolver.
//!
//! Maps host exchange strings (case-insensitive, short or long form) to a
//! MIC, and normalizes symbols for venues that suffix a hint (Tokyo `.T`).

use serde::{Deserialize, Serialize};

/// A resolved security identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    pub mic: String,
}

impl Security {
    pub fn is_valid(&self) -> bool {
        if self.symbol.is_empty() {
            return false;
        }
        if self.mic.is_empty() {
            return true;
        }
        self.mic.len() == 4 && self.mic.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }
}

/// One entry in the static exchange->MIC table: the host's short and long
/// exchange names, both matched case-insensitively.
struct ExchangeEntry {
    mic: &'static str,
    names: &'static [&'static str],
}

const EXCHANGE_TABLE: &[ExchangeEntry] = &[
    ExchangeEntry { mic: "XNAS", names: &["nasdaq", "nms", "ngm", "ncm"] },
    ExchangeEntry { mic: "XNYS", names: &["nyse", "new york stock exchange"] },
    ExchangeEntry { mic: "XTKS", names: &["jpx", "tse", "tokyo stock exchange"] },
    ExchangeEntry { mic: "XLON", names: &["lse", "london stock exchange"] },
    ExchangeEntry { mic: "XPAR", names: &["euronext paris", "par"] },
    ExchangeEntry { mic: "XETR", names: &["xetra", "ger"] },
    ExchangeEntry { mic: "XHKG", names: &["hkg", "hong kong stock exchange"] },
    ExchangeEntry { mic: "XTSE", names: &["tor", "toronto stock exchange"] },
    ExchangeEntry { mic: "XASX", names: &["asx", "australian securities exchange"] },
];

/// Resolves host exchange strings and symbols into canonical [`Security`]
/// identities.
#[derive(Debug, Clone, Copy, Default)]
pub struct VenueResolver;

impl VenueResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves a MIC for a host exchange string. Returns `""` if no entry
    /// matches — the caller must still emit a valid identifier using
    /// `symbol` alone.
    pub fn resolve_mic(&self, exchange: &str) -> String {
        let needle = exchange.trim().to_ascii_lowercase();
        for entry in EXCHANGE_TABLE {
            if entry.names.iter().any(|n| *n == needle) {
                return entry.mic.to_string();
            }
        }
        String::new()
    }

    /// Builds a [`Security`], resolving the MIC and cleaning up
    /// venue-suffixed symbols (e.g. stripping `.T` once MIC is XTKS).
    pub fn build(&self, symbol: &str, exchange: &str) -> Security {
        let mic = self.resolve_mic(exchange);
        let cleaned = clean_symbol(symbol, &mic);
        Security { symbol: cleaned, mic }
    }
}

fn clean_symbol(symbol: &str, mic: &str) -> String {
    if mic == "XTKS" {
        if let Some(stripped) = symbol.strip_suffix(".T") {
            return stripped.to_string();
        }
    }
    symbol.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_exchange_case_insensitively() {
        let r = VenueResolver::new();
        assert_eq!(r.resolve_mic("NMS"), "XNAS");
        assert_eq!(r.resolve_mic("nms"), "XNAS");
        assert_eq!(r.resolve_mic("NASDAQ"), "XNAS");
    }

    #[test]
    fn unknown_exchange_yields_empty_mic() {
        let r = VenueResolver::new();
        assert_eq!(r.resolve_mic("SOME_UNKNOWN_VENUE"), "");
    }

    #[test]
    fn strips_tokyo_suffix_once_mic_resolved() {
        let r = VenueResolver::new();
        let sec = r.build("7203.T", "JPX");
        assert_eq!(sec.symbol, "7203");
        assert_eq!(sec.mic, "XTKS");
    }

    #[test]
    fn leaves_suffix_when_mic_unresolved() {
        let r = VenueResolver::new();
        let sec = r.build("7203.T", "UNKNOWN");
        assert_eq!(sec.symbol, "7203.T");
        assert_eq!(sec.mic, "");
    }

    #[test]
    fn validation_rules() {
        assert!(Security { symbol: "AAPL".into(), mic: "XNAS".into() }.is_valid());
        assert!(Security { symbol: "AAPL".into(), mic: "".into() }.is_valid());
        assert!(!Security { symbol: "".into(), mic: "".into() }.is_valid());
        assert!(!Security { symbol: "AAPL".into(), mic: "xnas".into() }.is_valid());
    }
}
