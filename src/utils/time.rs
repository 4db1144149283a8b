//! 日期时间工具
//!
//! 用户输入的日期、时间和 UTC 偏移都是字符串，这里统一做格式检查和转换。

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;

use crate::error::{AppError, AppResult};

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"))
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([01]\d|2[0-3]):([0-5]\d):([0-5]\d)$").expect("valid time regex")
    })
}

fn offset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+\-]\d{4}$").expect("valid offset regex"))
}

pub fn is_valid_date(s: &str) -> bool {
    date_re().is_match(s)
}

pub fn is_valid_time(s: &str) -> bool {
    time_re().is_match(s)
}

pub fn is_valid_utc_offset(s: &str) -> bool {
    offset_re().is_match(s)
}

/// 解析 `+0800` / `-0530` 形式的 UTC 偏移
pub fn parse_utc_offset(s: &str) -> AppResult<FixedOffset> {
    if !is_valid_utc_offset(s) {
        return Err(AppError::validation(format!("Invalid UTC offset '{s}'.")));
    }
    let sign = if s.starts_with('-') { -1 } else { 1 };
    let hours: i32 = s[1..3]
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid UTC offset '{s}'.")))?;
    let minutes: i32 = s[3..5]
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid UTC offset '{s}'.")))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| AppError::validation(format!("Invalid UTC offset '{s}'.")))
}

/// 把用户输入的日期、时间、偏移组合成带时区的时间
pub fn parse_local_datetime(date: &str, time: &str, offset: &str) -> AppResult<DateTime<FixedOffset>> {
    if !is_valid_date(date) || !is_valid_time(time) || !is_valid_utc_offset(offset) {
        return Err(AppError::validation(
            "Invalid date, time, or UTC offset format.",
        ));
    }
    let tz = parse_utc_offset(offset)?;
    let naive_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation("Could not parse date/time."))?;
    let naive_time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .map_err(|_| AppError::validation("Could not parse date/time."))?;
    tz.from_local_datetime(&NaiveDateTime::new(naive_date, naive_time))
        .single()
        .ok_or_else(|| AppError::validation("Could not parse date/time."))
}

/// 提交时间戳，按表单创建者的偏移显示：`2025/03/14 09:05:07 AM`
pub fn format_submission_timestamp(at: DateTime<Utc>, offset: &str) -> AppResult<String> {
    let tz = parse_utc_offset(offset)?;
    Ok(at.with_timezone(&tz).format("%Y/%m/%d %H:%M:%S %p").to_string())
}

/// 处理器登记时间：`2025/03/14 09:05 AM (UTC+0800)`，偏移无效时用 UTC
pub fn format_created_timestamp(at: DateTime<Utc>, offset: &str) -> String {
    match parse_utc_offset(offset) {
        Ok(tz) => format!(
            "{} (UTC{})",
            at.with_timezone(&tz).format("%Y/%m/%d %I:%M %p"),
            offset
        ),
        Err(_) => {
            tracing::warn!("UTC 偏移无效或缺失 ('{}')，使用 UTC 记录时间", offset);
            format!("{} (UTC)", at.format("%Y/%m/%d %I:%M %p"))
        }
    }
}

/// 作业描述中的截止日期：`2025/03/14`
pub fn format_due_date(due: DateTime<FixedOffset>) -> String {
    due.format("%Y/%m/%d").to_string()
}

/// 作业描述中的截止时间：`5:00 PM`
pub fn format_due_time(due: DateTime<FixedOffset>) -> String {
    due.format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+0800").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(
            parse_utc_offset("-0530").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert!(parse_utc_offset("0800").is_err());
        assert!(parse_utc_offset("+08:00").is_err());
    }

    #[test]
    fn test_parse_local_datetime() {
        let dt = parse_local_datetime("2030-05-01", "17:00:00", "+0800").unwrap();
        assert_eq!(
            dt.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2030, 5, 1, 9, 0, 0).unwrap()
        );
        assert!(parse_local_datetime("2030-5-1", "17:00:00", "+0800").is_err());
        assert!(parse_local_datetime("2030-05-01", "24:00:00", "+0800").is_err());
        assert!(parse_local_datetime("2030-02-30", "10:00:00", "+0800").is_err());
    }

    #[test]
    fn test_format_submission_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 1, 5, 7).unwrap();
        assert_eq!(
            format_submission_timestamp(at, "+0800").unwrap(),
            "2025/03/14 09:05:07 AM"
        );
        assert!(format_submission_timestamp(at, "bogus").is_err());
    }

    #[test]
    fn test_format_created_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 13, 5, 0).unwrap();
        assert_eq!(
            format_created_timestamp(at, "-0500"),
            "2025/03/14 08:05 AM (UTC-0500)"
        );
        assert_eq!(format_created_timestamp(at, ""), "2025/03/14 01:05 PM (UTC)");
    }

    #[test]
    fn test_due_formatting() {
        let due = parse_local_datetime("2030-05-01", "17:00:00", "+0800").unwrap();
        assert_eq!(format_due_date(due), "2030/05/01");
        assert_eq!(format_due_time(due), "5:00 PM");
    }
}
