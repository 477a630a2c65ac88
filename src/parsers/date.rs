/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Date-time parsing: RFC 2822 format, ANSI C `asctime`, and the broken
//! variants found in real mail (missing day-name comma, time before year,
//! alphabetic/military/quoted timezones, partial offsets).

use std::fmt;

use chrono::{Datelike, Timelike};

use crate::parsers::cursor::Cursor;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parsed RFC 2822 date-time with its timezone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DateTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub tz_before_gmt: bool,
    pub tz_hour: u32,
    pub tz_minute: u32,
}

impl DateTime {
    /// The current instant, in UTC.
    pub fn now() -> DateTime {
        let now = chrono::Utc::now();
        DateTime {
            year: now.year().max(0) as u32,
            month: now.month(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
            tz_before_gmt: false,
            tz_hour: 0,
            tz_minute: 0,
        }
    }

    pub fn to_iso8601(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            if self.tz_before_gmt { "-" } else { "+" },
            self.tz_hour,
            self.tz_minute
        )
    }

    /// Wire form for a Date header, e.g. `Tue, 1 Jul 2003 10:52:37 +0200`.
    pub fn to_rfc2822(&self) -> String {
        const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        const MONTHS: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        let weekday = chrono::NaiveDate::from_ymd_opt(
            self.year.min(i32::MAX as u32) as i32,
            self.month.clamp(1, 12),
            self.day.clamp(1, 31),
        )
        .map(|date| date.weekday().num_days_from_monday() as usize)
        .unwrap_or(0);
        format!(
            "{}, {} {} {:04} {:02}:{:02}:{:02} {}{:02}{:02}",
            DAYS[weekday],
            self.day,
            MONTHS[(self.month.clamp(1, 12) - 1) as usize],
            self.year,
            self.hour,
            self.minute,
            self.second,
            if self.tz_before_gmt { "-" } else { "+" },
            self.tz_hour,
            self.tz_minute
        )
    }

    /// Seconds since the Unix epoch, offset applied.
    pub fn to_timestamp(&self) -> i64 {
        let naive = chrono::NaiveDate::from_ymd_opt(
            self.year.min(i32::MAX as u32) as i32,
            self.month.clamp(1, 12),
            self.day.clamp(1, 31),
        )
        .and_then(|date| date.and_hms_opt(self.hour.min(23), self.minute.min(59), self.second.min(59)))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0);
        let offset = (self.tz_hour as i64 * 3600 + self.tz_minute as i64 * 60)
            * if self.tz_before_gmt { -1 } else { 1 };
        naive - offset
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.to_iso8601())
    }
}

impl PartialOrd for DateTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.to_timestamp().partial_cmp(&other.to_timestamp())
    }
}

/// Parses digits with overflow detection. Returns the value and the number of
/// digits consumed; zero digits is a failure.
fn parse_digits(cursor: &mut Cursor) -> Option<(u32, usize)> {
    let mut value = 0u32;
    let mut len = 0usize;
    while let Some(ch) = cursor.peek() {
        if !ch.is_ascii_digit() {
            break;
        }
        value = value
            .checked_mul(10)?
            .checked_add((ch - b'0') as u32)?;
        len += 1;
        cursor.advance(1);
    }
    if len == 0 {
        None
    } else {
        Some((value, len))
    }
}

fn parse_alpha(cursor: &mut Cursor) -> Option<String> {
    let start = cursor.pos();
    while cursor.peek().is_some_and(|ch| ch.is_ascii_alphabetic()) {
        cursor.advance(1);
    }
    if cursor.pos() == start {
        None
    } else {
        Some(
            String::from_utf8_lossy(cursor.slice(start, cursor.pos()))
                .to_ascii_lowercase(),
        )
    }
}

fn is_day_name(word: &str) -> bool {
    matches!(
        word,
        "mon" | "monday"
            | "tue" | "tues" | "tuesday"
            | "wed" | "wednesday"
            | "thu" | "thur" | "thurs" | "thursday"
            | "fri" | "friday"
            | "sat" | "saturday"
            | "sun" | "sunday"
    )
}

fn month_from_name(word: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = word.get(..3)?;
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

#[derive(Debug, PartialEq)]
enum Zone {
    NotPresent,
    Invalid,
    Offset {
        before_gmt: bool,
        hours: u32,
        minutes: u32,
    },
}

fn named_zone_offset(name: &str) -> (bool, u32) {
    // (before_gmt, minutes west/east)
    match name {
        "ut" | "utc" | "gmt" | "z" => (false, 0),
        "est" => (true, 300),
        "edt" => (true, 240),
        "cst" => (true, 360),
        "cdt" => (true, 300),
        "mst" => (true, 420),
        "mdt" => (true, 360),
        "pst" => (true, 480),
        "pdt" => (true, 420),
        _ => {
            // Unknown and military zones are treated as +0000 per RFC 2822
            // section 4.3.
            tracing::debug!(zone = name, "unknown timezone name");
            (false, 0)
        }
    }
}

/// After a numeric offset, only a delimiter may follow; `+02a` and `+02:`
/// style offsets are hard failures rather than partial results.
fn at_zone_boundary(cursor: &Cursor) -> bool {
    match cursor.peek() {
        None => true,
        Some(ch) => !(ch.is_ascii_alphanumeric() || ch == b':'),
    }
}

fn parse_zone(cursor: &mut Cursor) -> Zone {
    let start = cursor.pos();
    cursor.skip_cfws();
    let quoted = cursor.skip_byte(b'"');

    let zone = match cursor.peek() {
        Some(sign @ (b'+' | b'-')) => {
            cursor.advance(1);
            let Some((value, len)) = parse_digits(cursor) else {
                return Zone::Invalid;
            };
            let (mut hours, mut minutes) = match len {
                1 | 2 => (value, u32::MAX),
                3 | 4 => (value / 100, value % 100),
                _ => return Zone::Invalid,
            };
            if cursor.peek() == Some(b':') {
                if minutes != u32::MAX {
                    return Zone::Invalid;
                }
                cursor.advance(1);
                match parse_digits(cursor) {
                    Some((value, 1 | 2)) => minutes = value,
                    _ => return Zone::Invalid,
                }
            }
            if minutes == u32::MAX {
                minutes = 0;
            }
            if minutes > 59 || !at_zone_boundary(cursor) {
                return Zone::Invalid;
            }
            Zone::Offset {
                before_gmt: sign == b'-',
                hours,
                minutes,
            }
        }
        Some(ch) if ch.is_ascii_alphabetic() => {
            let name = parse_alpha(cursor).unwrap_or_default();
            let (before_gmt, total) = named_zone_offset(&name);
            Zone::Offset {
                before_gmt,
                hours: total / 60,
                minutes: total % 60,
            }
        }
        _ => {
            cursor.set_pos(start);
            return Zone::NotPresent;
        }
    };

    if quoted && !cursor.skip_byte(b'"') {
        return Zone::Invalid;
    }
    zone
}

/// Parses `HH:MM[:SS]`; fails on out-of-range fields.
fn parse_time(cursor: &mut Cursor) -> Option<(u32, u32, u32)> {
    let start = cursor.pos();
    let (hour, _) = parse_digits(cursor)?;
    if !cursor.skip_byte(b':') {
        cursor.set_pos(start);
        return None;
    }
    let Some((minute, _)) = parse_digits(cursor) else {
        cursor.set_pos(start);
        return None;
    };
    let second = if cursor.skip_byte(b':') {
        match parse_digits(cursor) {
            Some((second, _)) => second,
            None => {
                cursor.set_pos(start);
                return None;
            }
        }
    } else {
        0
    };
    if hour > 23 || minute > 59 || second > 60 {
        cursor.set_pos(start);
        return None;
    }
    Some((hour, minute, second))
}

/// RFC 2822 section 4.3 year windowing; years before 1900 are rejected by
/// the caller.
fn normalize_year(year: u32, digits: usize) -> u32 {
    if digits <= 2 && year < 50 {
        year + 2000
    } else if year < 1000 {
        year + 1900
    } else {
        year
    }
}

/// Parses a date header value. Returns `None` (never a partial result) when
/// the month, day of month or time is absent or out of range.
pub fn parse_date_time(raw: &[u8]) -> Option<DateTime> {
    let mut cursor = Cursor::new(raw);
    cursor.skip_cfws();

    // Optional day-of-week, with or without the comma.
    let save = cursor.pos();
    if let Some(word) = parse_alpha(&mut cursor) {
        if is_day_name(&word) {
            cursor.skip_cfws();
            cursor.skip_byte(b',');
        } else {
            cursor.set_pos(save);
        }
    }
    cursor.skip_cfws();

    let (day, month, year, hour, minute, second, zone);

    match cursor.peek() {
        Some(ch) if ch.is_ascii_digit() => {
            // RFC 2822 order: day month year time zone, tolerating the
            // time-before-year variant.
            let (d, _) = parse_digits(&mut cursor)?;
            day = d;
            cursor.skip_cfws();
            month = month_from_name(&parse_alpha(&mut cursor)?)?;
            cursor.skip_cfws();

            let digits_start = cursor.pos();
            let (value, len) = parse_digits(&mut cursor)?;
            if cursor.peek() == Some(b':') {
                // Time came before the year.
                cursor.set_pos(digits_start);
                let (h, m, s) = parse_time(&mut cursor)?;
                hour = h;
                minute = m;
                second = s;
                cursor.skip_cfws();
                match cursor.peek() {
                    Some(b'+' | b'-' | b'"') => {
                        zone = parse_zone(&mut cursor);
                        cursor.skip_cfws();
                        let (y, y_len) = parse_digits(&mut cursor)?;
                        year = normalize_year(y, y_len);
                    }
                    _ => {
                        // An alphabetic token here may be a zone name before
                        // the year (asctime style).
                        if let Some(word) = parse_alpha(&mut cursor) {
                            let (before_gmt, total) = named_zone_offset(&word);
                            zone = Zone::Offset {
                                before_gmt,
                                hours: total / 60,
                                minutes: total % 60,
                            };
                        } else {
                            zone = Zone::NotPresent;
                        }
                        cursor.skip_cfws();
                        let (y, y_len) = parse_digits(&mut cursor)?;
                        year = normalize_year(y, y_len);
                    }
                }
            } else {
                year = normalize_year(value, len);
                cursor.skip_cfws();
                let (h, m, s) = parse_time(&mut cursor)?;
                hour = h;
                minute = m;
                second = s;
                zone = parse_zone(&mut cursor);
            }
        }
        Some(ch) if ch.is_ascii_alphabetic() => {
            // asctime order: month day time [zone] year.
            month = month_from_name(&parse_alpha(&mut cursor)?)?;
            cursor.skip_cfws();
            let (d, _) = parse_digits(&mut cursor)?;
            day = d;
            cursor.skip_cfws();
            let (h, m, s) = parse_time(&mut cursor)?;
            hour = h;
            minute = m;
            second = s;
            cursor.skip_cfws();
            match cursor.peek() {
                Some(ch) if ch.is_ascii_digit() => {
                    let (y, y_len) = parse_digits(&mut cursor)?;
                    year = normalize_year(y, y_len);
                    zone = parse_zone(&mut cursor);
                }
                _ => {
                    zone = parse_zone(&mut cursor);
                    if zone == Zone::Invalid {
                        return None;
                    }
                    cursor.skip_cfws();
                    let (y, y_len) = parse_digits(&mut cursor)?;
                    year = normalize_year(y, y_len);
                }
            }
        }
        _ => return None,
    }

    let (tz_before_gmt, tz_hour, tz_minute) = match zone {
        Zone::Offset {
            before_gmt,
            hours,
            minutes,
        } => (before_gmt, hours, minutes),
        Zone::NotPresent => (false, 0, 0),
        Zone::Invalid => return None,
    };

    if year < 1900 || month == 0 || month > 12 || day == 0 || day > 31 {
        return None;
    }

    Some(DateTime {
        year,
        month,
        day,
        hour,
        minute,
        second,
        tz_before_gmt,
        tz_hour,
        tz_minute,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_date_time, DateTime};

    #[test]
    fn parse_dates() {
        let inputs = [
            (
                "Sat, 25 Apr 2015 12:10:48 +0000",
                "2015-04-25T12:10:48+00:00",
            ),
            (
                "Fri, 21 Nov 1997 09:55:06 -0600",
                "1997-11-21T09:55:06-06:00",
            ),
            // Missing day-name comma.
            (
                "Fri 24 Apr 2015 10:39:15 +02:23",
                "2015-04-24T10:39:15+02:23",
            ),
            // Folded with a trailing comment.
            (
                "Thu,\n   13\n  Feb\n    1969\n  23:32\n  -0330 (Newfoundland Time)",
                "1969-02-13T23:32:00-03:30",
            ),
            // Two-digit year windows.
            ("21 Nov 97 09:55:06 GMT", "1997-11-21T09:55:06+00:00"),
            ("21 Nov 03 09:55:06 GMT", "2003-11-21T09:55:06+00:00"),
            // Obsolete year and zone name.
            ("21 Nov 123 09:55:06 EST", "2023-11-21T09:55:06-05:00"),
            // asctime format.
            ("Sun Nov  6 08:49:37 1994", "1994-11-06T08:49:37+00:00"),
            // asctime with zone before the year.
            ("Wed Mar 31 10:21:49 CEST 2021", "2021-03-31T10:21:49+00:00"),
            // Time before year.
            ("24 Apr 10:39:15 2015", "2015-04-24T10:39:15+00:00"),
            // Quoted timezone.
            (
                "Sat, 25 Apr 2015 12:10:48 \"+0200\"",
                "2015-04-25T12:10:48+02:00",
            ),
            // Hour-only and single-digit-minute offsets.
            ("25 Apr 2015 12:10:48 +02", "2015-04-25T12:10:48+02:00"),
            ("25 Apr 2015 12:10:48 +02:5", "2015-04-25T12:10:48+02:05"),
            // Missing seconds.
            ("25 Apr 2015 12:10 +0000", "2015-04-25T12:10:00+00:00"),
            // Military zone letter.
            ("25 Apr 2015 12:10:48 K", "2015-04-25T12:10:48+00:00"),
        ];
        for (input, expected) in inputs {
            let parsed = parse_date_time(input.as_bytes());
            assert_eq!(
                parsed.map(|dt| dt.to_iso8601()).as_deref(),
                Some(expected),
                "{}",
                input
            );
        }
    }

    #[test]
    fn reject_invalid_dates() {
        let inputs = [
            // Broken offsets: trailing garbage, dangling colon, non-digits.
            "Fri 24 Apr 2015 10:39:15 +02a",
            "Fri 24 Apr 2015 10:39:15 +02:",
            "Fri 24 Apr 2015 10:39:15 +02:af",
            "Fri 24 Apr 2015 10:39:15 +in:af",
            // Missing pieces.
            "",
            "Sat, 25 Apr 2015",
            "25 2015 12:10:48 +0000",
            // Out-of-range fields.
            "32 Apr 2015 12:10:48 +0000",
            "25 Apr 2015 25:10:48 +0000",
            "25 Apr 2015 12:61:48 +0000",
            // Years before 1900 are rejected.
            "25 Apr 1899 12:10:48 +0000",
            "25 Apr 1000 12:10:48 +0000",
            // Overflowing digit runs must not wrap.
            "25 Apr 99999999999999999999 12:10:48 +0000",
        ];
        for input in inputs {
            assert_eq!(parse_date_time(input.as_bytes()), None, "{}", input);
        }
    }

    #[test]
    fn timestamps_and_wire_form() {
        let date = parse_date_time(b"Tue, 1 Jul 2003 10:52:37 +0200").unwrap();
        assert_eq!(date.to_rfc2822(), "Tue, 1 Jul 2003 10:52:37 +0200");
        // 2003-07-01T08:52:37Z
        assert_eq!(date.to_timestamp(), 1_057_049_557);

        let a = parse_date_time(b"1 Jul 2003 10:52:37 +0200").unwrap();
        let b = parse_date_time(b"1 Jul 2003 08:52:37 +0000").unwrap();
        assert_eq!(a.to_timestamp(), b.to_timestamp());
    }

    #[test]
    fn now_is_utc() {
        let now = DateTime::now();
        assert!(now.year >= 2024);
        assert_eq!(now.tz_hour, 0);
        assert_eq!(now.tz_minute, 0);
    }
}
