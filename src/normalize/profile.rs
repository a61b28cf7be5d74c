//! Company profile normalization: normalized `...Profile` entities; DTO
//! shape comes from the HTML extractor's `ProfileDto`.

use chrono::{DateTime, Utc};

use crate::error::{ErrorKind, FetchError};
use crate::html::endpoints::ProfileDto;
use crate::identity::Security;
use crate::normalize::Meta;
use crate::time_utils::Clock;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NormalizedProfile {
    pub security: Security,
    pub name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub employees: Option<i64>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub as_of: DateTime<Utc>,
    pub meta: Meta,
}

pub fn normalize_profile(
    dto: &ProfileDto,
    security: Security,
    run_id: &str,
    producer: &str,
    clock: &dyn Clock,
) -> Result<NormalizedProfile, FetchError> {
    let name = dto
        .name
        .clone()
        .ok_or_else(|| FetchError::new(ErrorKind::ValidationError, "profile requires a company name"))?;
    Ok(NormalizedProfile {
        security,
        name,
        sector: dto.sector.clone(),
        industry: dto.industry.clone(),
        employees: dto.employees,
        description: dto.description.clone(),
        website: dto.website.clone(),
        as_of: clock.now(),
        meta: Meta::new(run_id, producer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::FixedClock;
    use chrono::TimeZone;

    #[test]
    fn normalizes_profile_with_name() {
        let dto = ProfileDto {
            name: Some("Apple Inc.".to_string()),
            sector: Some("Technology".to_string()),
            industry: None,
            employees: Some(164_000),
            description: None,
            website: Some("https://www.apple.com".to_string()),
        };
        let sec = Security { symbol: "AAPL".into(), mic: "XNAS".into() };
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        let profile = normalize_profile(&dto, sec, "run-1", "host-1", &clock).unwrap();
        assert_eq!(profile.name, "Apple Inc.");
        assert_eq!(profile.employees, Some(164_000));
    }

    #[test]
    fn rejects_profile_without_name() {
        let dto = ProfileDto::default();
        let sec = Security { symbol: "AAPL".into(), mic: "XNAS".into() };
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 9, 29, 12, 0, 0).unwrap());
        assert!(normalize_profile(&dto, sec, "run-1", "host-1", &clock).is_err());
    }
}
