use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;

use super::DataIntegrityError;
use crate::domain::PositionCode;

const PREFIX: &str = "Position(code='";
const DATE_SEPARATOR: &str = "',effectiveStartDate=datetime'";
const SUFFIX: &str = "')";

/// Key of one effective-dated position version, e.g.
/// `Position(code='61000230',effectiveStartDate=datetime'2025-06-20T00:00:00')`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub code: PositionCode,
    pub effective_start_date: NaiveDate,
}

impl EntityKey {
    pub fn position(code: PositionCode, effective_start_date: NaiveDate) -> Self {
        Self {
            code,
            effective_start_date,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}{DATE_SEPARATOR}{}{SUFFIX}",
            self.code.as_str().replace('\'', "''"),
            self.effective_start_date
                .and_time(NaiveTime::MIN)
                .format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

impl FromStr for EntityKey {
    type Err = DataIntegrityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || DataIntegrityError::MalformedEntityKey(raw.to_string());

        let body = raw
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            .ok_or_else(malformed)?;
        let (code, date) = body.rsplit_once(DATE_SEPARATOR).ok_or_else(malformed)?;
        if code.is_empty() {
            return Err(malformed());
        }

        let effective_start_date = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|timestamp| timestamp.date())
            .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
            .map_err(|_| malformed())?;

        Ok(Self {
            code: PositionCode::new(code.replace("''", "'")),
            effective_start_date,
        })
    }
}

/// Legacy JSON date literal used by the directory for navigation dates: `/Date(<epoch millis>)/`.
pub fn json_date(date: NaiveDate) -> String {
    let millis = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    format!("/Date({millis})/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn renders_position_uri() {
        let key = EntityKey::position(PositionCode::from("61000230"), date(2025, 6, 20));
        assert_eq!(
            key.to_string(),
            "Position(code='61000230',effectiveStartDate=datetime'2025-06-20T00:00:00')"
        );
    }

    #[test]
    fn parses_rendered_and_fractional_uris() {
        let parsed: EntityKey = "Position(code='80110794',effectiveStartDate=datetime'2025-07-01T05:41:40.096')"
            .parse()
            .expect("fractional timestamp parses");
        assert_eq!(parsed.code.as_str(), "80110794");
        assert_eq!(parsed.effective_start_date, date(2025, 7, 1));

        let key = EntityKey::position(PositionCode::from("A'B"), date(2024, 2, 29));
        let reparsed: EntityKey = key.to_string().parse().expect("rendered key parses");
        assert_eq!(reparsed, key);
    }

    #[test]
    fn rejects_foreign_uris() {
        for raw in [
            "EmpJob(code='1')",
            "Position(code='',effectiveStartDate=datetime'2025-01-01T00:00:00')",
            "Position(code='1',effectiveStartDate=datetime'soon')",
        ] {
            assert!(
                matches!(
                    raw.parse::<EntityKey>(),
                    Err(DataIntegrityError::MalformedEntityKey(_))
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn json_date_uses_utc_midnight_millis() {
        assert_eq!(json_date(date(1970, 1, 2)), "/Date(86400000)/");
        assert_eq!(json_date(date(2025, 7, 1)), "/Date(1751328000000)/");
    }
}
