//! Display formatting of numeric cell values.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Format code of a built-in `numFmtId`.
pub fn builtin_format_code(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 | 13 => "General",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 | 38 => "#,##0 ;(#,##0)",
        39 | 40 => "#,##0.00;(#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// `General` rendering: integers without a fraction, others trimmed to
/// ten decimals.
pub(crate) fn general(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let s = format!("{n:.10}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Render `n` through an Excel number format code.
pub fn format_value(n: f64, code: &str) -> String {
    let section = first_section(code);
    let pattern = strip_literals(section);
    let lower = pattern.to_ascii_lowercase();

    if lower.is_empty() || lower == "general" || lower == "@" {
        return general(n);
    }
    if let Some(s) = format_date(n, &lower) {
        return s;
    }

    let percent = pattern.contains('%');
    let value = if percent { n * 100.0 } else { n };
    let decimals = pattern
        .split_once('.')
        .map(|(_, frac)| frac.chars().take_while(|c| matches!(c, '0' | '#')).count())
        .unwrap_or(0);

    if let Some(exp_at) = lower.find("e+").or_else(|| lower.find("e-")) {
        let decimals = pattern[..exp_at]
            .split_once('.')
            .map(|(_, f)| f.len())
            .unwrap_or(0);
        return scientific(value, decimals);
    }

    let grouped = pattern.contains(',') && pattern.contains(['0', '#']);
    let body = format!("{:.*}", decimals, value.abs());
    let body = if grouped { group_thousands(&body) } else { body };
    let negative = value < 0.0 && body.chars().any(|c| matches!(c, '1'..='9'));
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&body);
    if percent {
        out.push('%');
    }
    out
}

/// First `;`-separated section, ignoring separators inside quotes.
fn first_section(code: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in code.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return &code[..i],
            _ => {}
        }
    }
    code
}

/// Drop `[...]` modifiers, quoted literals, escapes and fill/padding directives.
fn strip_literals(section: &str) -> String {
    let mut out = String::new();
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
            }
            '"' => {
                for inner in chars.by_ref() {
                    if inner == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out.trim().to_string()
}

fn group_thousands(body: &str) -> String {
    let (int, frac) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    let mut grouped = String::new();
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(f) = frac {
        grouped.push('.');
        grouped.push_str(f);
    }
    grouped
}

fn scientific(value: f64, decimals: usize) -> String {
    let s = format!("{:.*e}", decimals, value);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exp.abs())
        }
        None => s,
    }
}

/// Dates render as `dd/mm/yyyy`, times as `HH:MM[:SS]`.
fn format_date(serial: f64, lower: &str) -> Option<String> {
    if lower.contains(['0', '#']) {
        return None;
    }
    let has_date = lower.contains(['d', 'y']) || (lower.contains('m') && !lower.contains(['h', 's']));
    let has_time = lower.contains(['h', 's']);
    if !has_date && !has_time {
        return None;
    }
    let dt = serial_to_datetime(serial)?;
    let time_fmt = if lower.contains('s') { "%H:%M:%S" } else { "%H:%M" };
    let fmt = match (has_date, has_time) {
        (true, true) => format!("%d/%m/%Y {time_fmt}"),
        (true, false) => "%d/%m/%Y".to_string(),
        _ => time_fmt.to_string(),
    };
    Some(dt.format(&fmt).to_string())
}

/// Convert a 1900-system serial to a timestamp. Serials before March 1900
/// account for the phantom 29 February 1900.
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.floor();
    let base = if days < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let seconds = ((serial - serial.floor()) * 86_400.0).round() as i64;
    let delta = TimeDelta::try_days(days as i64)? + TimeDelta::try_seconds(seconds)?;
    base.and_hms_opt(0, 0, 0)?.checked_add_signed(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_numbers() {
        assert_eq!(general(42.0), "42");
        assert_eq!(general(0.1 + 0.2), "0.3");
        assert_eq!(general(-2.5), "-2.5");
    }

    #[test]
    fn fixed_and_grouped() {
        assert_eq!(format_value(1234.5, "0.00"), "1234.50");
        assert_eq!(format_value(1234567.891, "#,##0.00"), "1,234,567.89");
        assert_eq!(format_value(-1234.0, "#,##0"), "-1,234");
        assert_eq!(format_value(2.4, "0"), "2");
    }

    #[test]
    fn percentages() {
        assert_eq!(format_value(0.125, "0.00%"), "12.50%");
        assert_eq!(format_value(0.5, "0%"), "50%");
    }

    #[test]
    fn scientific_notation() {
        assert_eq!(format_value(12340.0, "0.00E+00"), "1.23E+04");
    }

    #[test]
    fn dates_are_day_first() {
        // 45292 = 2024-01-01
        assert_eq!(format_value(45292.0, "mm-dd-yy"), "01/01/2024");
        assert_eq!(format_value(45292.5, "m/d/yy h:mm"), "01/01/2024 12:00");
        assert_eq!(format_value(0.75, "h:mm"), "18:00");
        assert_eq!(format_value(1.0, "d-mmm-yy"), "01/01/1900");
    }

    #[test]
    fn literals_and_sections() {
        assert_eq!(format_value(5.0, "\"Bs \"#,##0.00;[Red]-#,##0.00"), "5.00");
        assert_eq!(format_value(7.0, "@"), "7");
    }
}
