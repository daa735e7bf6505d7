use anyhow::{Result, bail};
use std::time::SystemTime;

/// UTC datetime without timezone complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTimeUtc {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTimeUtc {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub const fn from_ymd(year: u16, month: u8, day: u8) -> Self {
        Self::new(year, month, day, 0, 0, 0)
    }

    /// Parse from "YYYY-MM-DD" or "YYYY-MM-DDTHH:MM:SS" format.
    ///
    /// The wordpress REST API emits the latter without a timezone suffix;
    /// a trailing `Z` or offset is tolerated and ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();

        // Minimum: "YYYY-MM-DD" (10 chars)
        if bytes.len() < 10 {
            return None;
        }

        // Parse date part
        let year = parse_u16(&bytes[0..4])?;
        if bytes[4] != b'-' {
            return None;
        }
        let month = parse_u8(&bytes[5..7])?;
        if bytes[7] != b'-' {
            return None;
        }
        let day = parse_u8(&bytes[8..10])?;

        // Check for time part
        let (hour, minute, second) = if bytes.len() == 10 {
            (0, 0, 0)
        } else if bytes.len() >= 19 && (bytes[10] == b'T' || bytes[10] == b' ') {
            if bytes[13] != b':' || bytes[16] != b':' {
                return None;
            }
            (
                parse_u8(&bytes[11..13])?,
                parse_u8(&bytes[14..16])?,
                parse_u8(&bytes[17..19])?,
            )
        } else {
            return None;
        };

        let dt = Self::new(year, month, day, hour, minute, second);
        dt.validate().ok()?;
        Some(dt)
    }

    /// Current UTC date (midnight), from the system clock.
    pub fn today() -> Self {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        #[allow(clippy::cast_possible_wrap)] // Safe: seconds/86400 fits in i64
        let (year, month, day) = days_to_ymd(secs as i64 / 86400);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self::from_ymd(year as u16, month as u8, day as u8)
    }

    pub fn validate(&self) -> Result<()> {
        let Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        } = *self;

        if !(1..=12).contains(&month) {
            bail!("month is invalid: {month}");
        }

        let max_days = Self::days_in_month(year, month);
        if day == 0 || day > max_days {
            bail!("day is invalid: {day}");
        }
        if hour > 23 {
            bail!("hour is invalid: {hour}");
        }
        if minute > 59 {
            bail!("minute is invalid: {minute}");
        }
        if second > 59 {
            bail!("second is invalid: {second}");
        }

        Ok(())
    }

    #[inline]
    fn is_leap_year(year: u16) -> bool {
        year.is_multiple_of(4) && (!year.is_multiple_of(100) || year.is_multiple_of(400))
    }

    #[inline]
    fn days_in_month(year: u16, month: u8) -> u8 {
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 if Self::is_leap_year(year) => 29,
            2 => 28,
            _ => 0,
        }
    }

    /// The following calendar day (time-of-day reset to midnight).
    pub fn next_day(self) -> Self {
        let Self { year, month, day, .. } = self;
        if day < Self::days_in_month(year, month) {
            Self::from_ymd(year, month, day + 1)
        } else if month < 12 {
            Self::from_ymd(year, month + 1, 1)
        } else {
            Self::from_ymd(year + 1, 1, 1)
        }
    }

    /// "YYYY-MM-DD" form, the canonical document identifier.
    pub fn ymd_slug(self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn to_rfc2822(self) -> String {
        const WEEKDAYS: [&str; 7] = ["Sat", "Sun", "Mon", "Tue", "Wed", "Thu", "Fri"];
        const MONTHS: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];

        // Zeller's congruence for weekday calculation
        let weekday = self.weekday_index();

        format!(
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
            WEEKDAYS[weekday],
            self.day,
            MONTHS[(self.month - 1) as usize],
            self.year,
            self.hour,
            self.minute,
            self.second
        )
    }

    /// Human Spanish date: "lunes 8 de diciembre de 2025".
    pub fn spanish_human(self) -> String {
        const WEEKDAYS: [&str; 7] = [
            "sábado",
            "domingo",
            "lunes",
            "martes",
            "miércoles",
            "jueves",
            "viernes",
        ];
        const MONTHS: [&str; 12] = [
            "enero",
            "febrero",
            "marzo",
            "abril",
            "mayo",
            "junio",
            "julio",
            "agosto",
            "septiembre",
            "octubre",
            "noviembre",
            "diciembre",
        ];

        format!(
            "{} {} de {} de {}",
            WEEKDAYS[self.weekday_index()],
            self.day,
            MONTHS[(self.month - 1) as usize],
            self.year
        )
    }

    /// Page-header Spanish date: "LUNES 8 DE DICIEMBRE DE 2025".
    pub fn spanish_upper(self) -> String {
        self.spanish_human().to_uppercase()
    }

    #[inline]
    fn weekday_index(&self) -> usize {
        let (y, m) = if self.month < 3 {
            (self.year as i32 - 1, self.month as i32 + 12)
        } else {
            (self.year as i32, self.month as i32)
        };
        let d = self.day as i32;
        ((d + (13 * (m + 1)) / 5 + y + y / 4 - y / 100 + y / 400) % 7) as usize
    }
}

/// Parse 2-digit ASCII number
#[inline]
fn parse_u8(bytes: &[u8]) -> Option<u8> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = bytes[0].wrapping_sub(b'0');
    let d2 = bytes[1].wrapping_sub(b'0');
    if d1 > 9 || d2 > 9 {
        return None;
    }
    Some(d1 * 10 + d2)
}

/// Parse 4-digit ASCII number
#[inline]
fn parse_u16(bytes: &[u8]) -> Option<u16> {
    if bytes.len() != 4 {
        return None;
    }
    let mut result = 0u16;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        result = result * 10 + d as u16;
    }
    Some(result)
}

/// Convert days since UNIX epoch (1970-01-01) to (year, month, day).
///
/// Uses Howard Hinnant's date algorithms for efficient calendar calculations.
/// See: <http://howardhinnant.github.io/date_algorithms.html>
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    // Shift epoch from 1970-01-01 to 0000-03-01
    let z = days + 719_468;

    // Calculate era (400-year period)
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;

    // Day of era [0, 146096]
    let doe = (z - era * 146_097) as u32;

    // Year of era [0, 399]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;

    // Year
    let y = yoe as i64 + era * 400;

    // Day of year [0, 365]
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);

    // Month [0, 11] -> [3, 14]
    let mp = (5 * doy + 2) / 153;

    // Day [1, 31]
    let d = doy - (153 * mp + 2) / 5 + 1;

    // Month [1, 12]
    let m = if mp < 10 { mp + 3 } else { mp - 9 };

    // Adjust year for Jan/Feb
    let y = if m <= 2 { y + 1 } else { y };

    (y as i32, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_utc_new() {
        let dt = DateTimeUtc::new(2024, 6, 15, 14, 30, 45);
        assert_eq!(dt.year, 2024);
        assert_eq!(dt.month, 6);
        assert_eq!(dt.day, 15);
        assert_eq!(dt.hour, 14);
        assert_eq!(dt.minute, 30);
        assert_eq!(dt.second, 45);
    }

    #[test]
    fn test_parse_date_only() {
        let dt = DateTimeUtc::parse("2025-12-08").unwrap();
        assert_eq!((dt.year, dt.month, dt.day), (2025, 12, 8));
        assert_eq!((dt.hour, dt.minute, dt.second), (0, 0, 0));
    }

    #[test]
    fn test_parse_wordpress_iso() {
        // wordpress emits no timezone suffix
        let dt = DateTimeUtc::parse("2025-12-08T10:30:00").unwrap();
        assert_eq!((dt.year, dt.month, dt.day), (2025, 12, 8));
        assert_eq!((dt.hour, dt.minute, dt.second), (10, 30, 0));
    }

    #[test]
    fn test_parse_rfc3339_with_z() {
        let dt = DateTimeUtc::parse("2024-01-15T23:59:59Z").unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second), (23, 59, 59));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(DateTimeUtc::parse("").is_none());
        assert!(DateTimeUtc::parse("2024").is_none());
        assert!(DateTimeUtc::parse("2024/01/15").is_none());
        assert!(DateTimeUtc::parse("2024-13-01").is_none());
        assert!(DateTimeUtc::parse("2024-02-30").is_none());
        assert!(DateTimeUtc::parse("2024-01-15X10:00:00").is_none());
    }

    #[test]
    fn test_validate_leap_year() {
        assert!(DateTimeUtc::from_ymd(2024, 2, 29).validate().is_ok());
        assert!(DateTimeUtc::from_ymd(2000, 2, 29).validate().is_ok()); // divisible by 400
        assert!(DateTimeUtc::from_ymd(2023, 2, 29).validate().is_err());
        assert!(DateTimeUtc::from_ymd(1900, 2, 29).validate().is_err()); // divisible by 100 but not 400
    }

    #[test]
    fn test_validate_invalid_day() {
        assert!(DateTimeUtc::from_ymd(2024, 6, 0).validate().is_err());
        assert!(DateTimeUtc::from_ymd(2024, 4, 31).validate().is_err());
    }

    #[test]
    fn test_next_day_simple() {
        assert_eq!(
            DateTimeUtc::from_ymd(2025, 12, 8).next_day(),
            DateTimeUtc::from_ymd(2025, 12, 9)
        );
    }

    #[test]
    fn test_next_day_month_rollover() {
        assert_eq!(
            DateTimeUtc::from_ymd(2025, 11, 30).next_day(),
            DateTimeUtc::from_ymd(2025, 12, 1)
        );
        assert_eq!(
            DateTimeUtc::from_ymd(2024, 2, 29).next_day(),
            DateTimeUtc::from_ymd(2024, 3, 1)
        );
    }

    #[test]
    fn test_next_day_year_rollover() {
        assert_eq!(
            DateTimeUtc::from_ymd(2025, 12, 31).next_day(),
            DateTimeUtc::from_ymd(2026, 1, 1)
        );
    }

    #[test]
    fn test_ordering() {
        assert!(DateTimeUtc::from_ymd(2025, 12, 8) < DateTimeUtc::from_ymd(2025, 12, 9));
        assert!(DateTimeUtc::from_ymd(2025, 12, 8) < DateTimeUtc::new(2025, 12, 8, 0, 0, 1));
    }

    #[test]
    fn test_ymd_slug() {
        assert_eq!(DateTimeUtc::from_ymd(2025, 12, 8).ymd_slug(), "2025-12-08");
        assert_eq!(DateTimeUtc::from_ymd(800, 1, 2).ymd_slug(), "0800-01-02");
    }

    #[test]
    fn test_to_rfc2822() {
        let dt = DateTimeUtc::new(2024, 1, 15, 10, 30, 45);
        assert_eq!(dt.to_rfc2822(), "Mon, 15 Jan 2024 10:30:45 GMT");
    }

    #[test]
    fn test_spanish_human() {
        assert_eq!(
            DateTimeUtc::from_ymd(2025, 12, 8).spanish_human(),
            "lunes 8 de diciembre de 2025"
        );
        assert_eq!(
            DateTimeUtc::from_ymd(2025, 12, 10).spanish_human(),
            "miércoles 10 de diciembre de 2025"
        );
    }

    #[test]
    fn test_spanish_upper() {
        assert_eq!(
            DateTimeUtc::from_ymd(2025, 12, 8).spanish_upper(),
            "LUNES 8 DE DICIEMBRE DE 2025"
        );
        // accented characters uppercase correctly
        assert_eq!(
            DateTimeUtc::from_ymd(2025, 12, 13).spanish_upper(),
            "SÁBADO 13 DE DICIEMBRE DE 2025"
        );
    }

    #[test]
    fn test_days_to_ymd_unix_epoch() {
        assert_eq!(days_to_ymd(0), (1970, 1, 1));
    }

    #[test]
    fn test_days_to_ymd_2025() {
        assert_eq!(days_to_ymd(20089), (2025, 1, 1));
    }

    #[test]
    fn test_days_to_ymd_leap_year() {
        assert_eq!(days_to_ymd(730 + 31 + 28), (1972, 2, 29));
    }
}
