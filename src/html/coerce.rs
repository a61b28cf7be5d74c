//! Text coercion for extracted HTML fields: thousand separators, numeric
//! suffixes, URL normalization, relative-time parsing.

use chrono::{DateTime, Duration, TimeZone, Utc};
use url::Url;

/// Strips thousand separators and surrounding whitespace from a captured
/// numeric string, leaving a sign, digits, decimal point, and optional
/// `T/B/M/K` suffix.
pub fn clean_numeric_text(raw: &str) -> String {
    raw.trim().replace(',', "").replace(char::is_whitespace, "")
}

/// Parses a coerced numeric string, expanding `T/B/M/K` suffixes.
pub fn parse_scaled_number(raw: &str) -> Option<f64> {
    let cleaned = clean_numeric_text(raw);
    if cleaned.is_empty() {
        return None;
    }
    let (digits, multiplier) = match cleaned.chars().last() {
        Some('T') | Some('t') => (&cleaned[..cleaned.len() - 1], 1e12),
        Some('B') | Some('b') => (&cleaned[..cleaned.len() - 1], 1e9),
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1e3),
        _ => (cleaned.as_str(), 1.0),
    };
    digits.parse::<f64>().ok().map(|v| v * multiplier)
}

pub fn parse_int_text(raw: &str) -> Option<i64> {
    clean_numeric_text(raw).parse::<i64>().ok()
}

/// Tracking query parameters stripped from scraped URLs. Kept as a
/// constant here since the extractor has no separate asset file for it.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content", "ncid", "guccounter",
];

/// Normalizes a captured URL: strips tracking parameters, resolves relative
/// paths against `base`.
pub fn normalize_url(raw: &str, base: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    let mut url = base_url.join(raw).ok()?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if retained.is_empty() {
        url.set_query(None);
    } else {
        let qs = retained
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&qs));
    }
    Some(url.to_string())
}

/// Parses relative-time phrases ("16m ago", "2h ago", "1 day ago",
/// "yesterday", "1 week ago") relative to `now`. Unparseable input yields
/// `None`, never an error.
pub fn parse_relative_time(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = raw.trim().to_ascii_lowercase();

    if text == "yesterday" {
        let midnight = now.date_naive().and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight) - Duration::days(1));
    }
    if text == "today" {
        let midnight = now.date_naive().and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight));
    }

    let text = text.strip_suffix(" ago").unwrap_or(&text).trim();
    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next()?;
    let rest = parts.next().unwrap_or("").trim();

    // Compact form: "16m", "2h", "1d", "1w".
    if rest.is_empty() && first.len() > 1 {
        let (num_part, unit) = first.split_at(first.len() - 1);
        if let Ok(n) = num_part.parse::<i64>() {
            let delta = match unit {
                "m" => Some(Duration::minutes(n)),
                "h" => Some(Duration::hours(n)),
                "d" => Some(Duration::days(n)),
                "w" => Some(Duration::weeks(n)),
                _ => None,
            };
            if let Some(d) = delta {
                return Some(now - d);
            }
        }
    }

    // Spelled-out form: "1 day", "2 hours", "1 week".
    let n: i64 = first.parse().ok()?;
    let unit = rest.trim_end_matches('s');
    let delta = match unit {
        "minute" | "min" => Duration::minutes(n),
        "hour" | "hr" => Duration::hours(n),
        "day" => Duration::days(n),
        "week" => Duration::weeks(n),
        "month" => Duration::days(n * 30),
        _ => return None,
    };
    Some(now - delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap()
    }

    #[test]
    fn strips_thousand_separators_and_parses_suffix() {
        assert_eq!(parse_scaled_number("2.95T"), Some(2.95e12));
        assert_eq!(parse_scaled_number("1,234,567"), Some(1_234_567.0));
    }

    #[test]
    fn normalizes_relative_url_and_strips_tracking_params() {
        let url = normalize_url(
            "/news/a.html",
            "https://finance.yahoo.com/news/a.html?utm_source=x",
        )
        .unwrap();
        assert_eq!(url, "https://finance.yahoo.com/news/a.html");

        let url2 = normalize_url(
            "https://finance.yahoo.com/news/a.html?utm_source=x",
            "https://finance.yahoo.com/",
        )
        .unwrap();
        assert_eq!(url2, "https://finance.yahoo.com/news/a.html");
    }

    #[test]
    fn parses_compact_relative_time() {
        let now = fixed_now();
        assert_eq!(
            parse_relative_time("16m ago", now),
            Some(now - Duration::minutes(16))
        );
        assert_eq!(
            parse_relative_time("2h ago", now),
            Some(now - Duration::hours(2))
        );
    }

    #[test]
    fn parses_spelled_out_and_special_words() {
        let now = fixed_now();
        assert_eq!(
            parse_relative_time("1 day ago", now),
            Some(now - Duration::days(1))
        );
        assert_eq!(
            parse_relative_time("1 week ago", now),
            Some(now - Duration::weeks(1))
        );
        let yesterday_midnight = Utc.with_ymd_and_hms(2025, 9, 28, 0, 0, 0).unwrap();
        assert_eq!(parse_relative_time("yesterday", now), Some(yesterday_midnight));
    }

    #[test]
    fn unparseable_input_yields_none() {
        assert_eq!(parse_relative_time("sometime never", fixed_now()), None);
    }
}
