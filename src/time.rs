// Time utility functions

use crate::error::HttpCacheError;
use crate::Result;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

// IMF-fixdate, the preferred HTTP-date format. Sun, 06 Nov 1994 08:49:37 GMT
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
// Obsolete RFC 850 format. Sunday, 06-Nov-94 08:49:37 GMT
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
// ANSI C asctime() format. Sun Nov  6 08:49:37 1994
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an HTTP-date as found in `Date`, `Expires` and `Last-Modified`
/// headers. All three formats recipients must accept are supported. Dates
/// are always GMT.
pub fn parse_http_date(date: &str) -> Result<DateTime<Utc>> {
    let date = date.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(date) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in [IMF_FIXDATE, RFC_850, ASCTIME] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(Utc.from_utc_datetime(&parsed));
        }
    }
    Err(HttpCacheError::TimeConversionError(format!(
        "Could not convert {} to an HTTP date",
        date
    ))
    .into())
}

pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format(IMF_FIXDATE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    #[test]
    fn test_parse_http_date_all_formats() {
        let test_table = vec![
            "Sun, 06 Nov 1994 08:49:37 GMT",
            "Sunday, 06-Nov-94 08:49:37 GMT",
            "Sun Nov  6 08:49:37 1994",
            "  Sun, 06 Nov 1994 08:49:37 GMT ",
        ];
        for input in test_table {
            let actual = parse_http_date(input).unwrap();
            assert_eq!(reference_date(), actual, "input: {}", input);
        }
    }

    #[test]
    fn test_parse_http_date_invalid_is_time_conversion_error() {
        for input in ["0", "-1", "", "yesterday"] {
            let result = parse_http_date(input);
            match result {
                Err(err) => match err.downcast_ref::<HttpCacheError>() {
                    Some(HttpCacheError::TimeConversionError(_)) => (),
                    _ => panic!("Expected TimeConversionError"),
                },
                _ => panic!("Expected TimeConversionError for {}", input),
            }
        }
    }

    #[test]
    fn test_format_http_date_is_imf_fixdate() {
        assert_eq!(
            "Sun, 06 Nov 1994 08:49:37 GMT",
            format_http_date(&reference_date())
        );
    }

    #[test]
    fn test_formatted_date_parses_back() {
        let date = Utc.with_ymd_and_hms(2024, 1, 13, 19, 50, 23).unwrap();
        assert_eq!(date, parse_http_date(&format_http_date(&date)).unwrap());
    }
}
