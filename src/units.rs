//! Length and colour normalisation.
//!
//! Every length that enters the canonical document is expressed in points,
//! every colour as a lowercase `#rrggbb` token.

use thiserror::Error;

/// CSS pixels per point as used by the office suites we import from.
pub const PX_PER_PT: f32 = 1.333;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot parse length {0:?}")]
pub struct UnitParseError(pub String);

pub fn twips_to_pts(twips: f32) -> f32 {
    twips / 20.0
}

/// Convert `value` expressed in `unit` to points.
///
/// Units other than `pt`, `px`, `in` and the twip spellings are taken
/// verbatim.
pub fn to_points(value: &str, unit: &str) -> Result<f32, UnitParseError> {
    let v: f32 = value
        .trim()
        .parse()
        .map_err(|_| UnitParseError(value.to_string()))?;
    if !v.is_finite() {
        return Err(UnitParseError(value.to_string()));
    }
    Ok(match unit.trim().to_ascii_lowercase().as_str() {
        "pt" => v,
        "px" => v / PX_PER_PT,
        "in" => v * 72.0,
        "dxa" | "twip" | "twips" => twips_to_pts(v),
        _ => v,
    })
}

/// Parse a CSS length such as `12.5pt`, `16px` or `1in` into points.
/// A bare number is returned as is.
pub fn parse_css_length(css: &str) -> Result<f32, UnitParseError> {
    let s = css.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    if num.is_empty() {
        return Err(UnitParseError(css.to_string()));
    }
    to_points(num, unit)
}

/// Format a point value with one decimal, e.g. `12.5pt`.
pub fn format_points(pt: f32) -> String {
    format!("{:.1}pt", pt)
}

/// Format a percentage with two decimals, e.g. `66.67%`.
pub fn format_percent(pct: f32) -> String {
    format!("{:.2}%", pct)
}

/// Normalise a colour token to `#rrggbb`.
///
/// `windowtext`, 3/6-digit hex (with or without `#`) and `rgb(r,g,b)` are
/// recognised. Anything else is returned unchanged; only an empty token
/// yields `None`.
pub fn normalize_color(token: &str) -> Option<String> {
    let t = token.trim();
    if t.is_empty() {
        return None;
    }
    if t.eq_ignore_ascii_case("windowtext") {
        return Some("#000000".to_string());
    }
    if let Some(rgb) = parse_hex_color(t).or_else(|| parse_rgb_function(t)) {
        return Some(format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]));
    }
    Some(t.to_string())
}

/// Parse `#rgb`, `#rrggbb`, `rgb` or `rrggbb` into components.
pub fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    let hex = val.strip_prefix('#').unwrap_or(val);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let d = c.to_digit(16)? as u8;
                out[i] = d * 17;
            }
            Some(out)
        }
        6 => Some([
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        ]),
        _ => None,
    }
}

fn parse_rgb_function(val: &str) -> Option<[u8; 3]> {
    let lower = val.to_ascii_lowercase();
    let inner = lower.strip_prefix("rgb(")?.strip_suffix(')')?;
    let parts: Vec<u8> = inner
        .split(',')
        .map(|p| p.trim().parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8))
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [r, g, b] => Some([*r, *g, *b]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inches_and_pixels() {
        assert_eq!(to_points("2", "in").unwrap(), 144.0);
        assert!((to_points("16", "px").unwrap() - 16.0 / 1.333).abs() < 1e-4);
        assert_eq!(to_points("7.5", "pt").unwrap(), 7.5);
        assert_eq!(to_points("240", "dxa").unwrap(), 12.0);
        assert_eq!(to_points("3", "em").unwrap(), 3.0);
    }

    #[test]
    fn non_numeric_length_fails() {
        assert!(to_points("wide", "pt").is_err());
        assert!(parse_css_length("auto").is_err());
    }

    #[test]
    fn css_lengths() {
        assert_eq!(parse_css_length("1in").unwrap(), 72.0);
        assert_eq!(parse_css_length(" 12.5pt ").unwrap(), 12.5);
        assert_eq!(parse_css_length("40").unwrap(), 40.0);
    }

    #[test]
    fn colors() {
        assert_eq!(normalize_color("windowtext").as_deref(), Some("#000000"));
        assert_eq!(normalize_color("0000FF").as_deref(), Some("#0000ff"));
        assert_eq!(normalize_color("#abc").as_deref(), Some("#aabbcc"));
        assert_eq!(normalize_color("rgb(255, 0, 16)").as_deref(), Some("#ff0010"));
        assert_eq!(normalize_color("teal").as_deref(), Some("teal"));
        assert_eq!(normalize_color("  "), None);
    }
}
