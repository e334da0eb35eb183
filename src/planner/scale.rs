use regex::Captures;

use crate::constants::RE_LEADING_QUANTITY;

fn vulgar_value(fraction: &str) -> Option<f64> {
    let value = match fraction {
        "½" => 1.0 / 2.0,
        "⅓" => 1.0 / 3.0,
        "⅔" => 2.0 / 3.0,
        "¼" => 1.0 / 4.0,
        "¾" => 3.0 / 4.0,
        "⅕" => 1.0 / 5.0,
        "⅖" => 2.0 / 5.0,
        "⅗" => 3.0 / 5.0,
        "⅘" => 4.0 / 5.0,
        "⅙" => 1.0 / 6.0,
        "⅚" => 5.0 / 6.0,
        "⅛" => 1.0 / 8.0,
        "⅜" => 3.0 / 8.0,
        "⅝" => 5.0 / 8.0,
        "⅞" => 7.0 / 8.0,
        _ => return None,
    };
    Some(value)
}

fn decimal(text: &str) -> Option<f64> {
    text.replace(',', ".").parse().ok()
}

fn fraction(numerator: &str, denominator: &str) -> Option<f64> {
    let denominator: f64 = denominator.parse().ok()?;
    if denominator == 0.0 {
        return None;
    }
    Some(numerator.parse::<f64>().ok()? / denominator)
}

/// At most two decimals, no trailing zeros, and a decimal comma when the source used one.
fn format_quantity(value: f64, decimal_comma: bool) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let text = if (rounded - rounded.round()).abs() < 1e-9 {
        format!("{}", rounded.round() as i64)
    } else {
        format!("{:.2}", rounded).trim_end_matches('0').to_string()
    };
    if decimal_comma {
        text.replace('.', ",")
    } else {
        text
    }
}

fn scaled_quantity(caps: &Captures<'_>, factor: f64) -> Option<String> {
    let text = |name: &str| caps.name(name).map(|m| m.as_str());
    let comma = caps.get(0).map_or(false, |m| m.as_str().contains(','));

    if let (Some(from), Some(to)) = (text("from"), text("to")) {
        return Some(format!(
            "{}-{}",
            format_quantity(decimal(from)? * factor, comma),
            format_quantity(decimal(to)? * factor, comma)
        ));
    }

    let value = if let (Some(whole), Some(num), Some(den)) = (text("whole"), text("num"), text("den")) {
        whole.parse::<f64>().ok()? + fraction(num, den)?
    } else if let Some(vulgar) = text("vulgar") {
        let whole = match text("vwhole") {
            Some(whole) => whole.parse::<f64>().ok()?,
            None => 0.0,
        };
        whole + vulgar_value(vulgar)?
    } else if let (Some(num), Some(den)) = (text("fnum"), text("fden")) {
        fraction(num, den)?
    } else {
        decimal(text("number")?)?
    };
    Some(format_quantity(value * factor, comma))
}

/// Multiply the quantity an ingredient line starts with, e.g. "1 1/2 cups flour" by 2
/// gives "3 cups flour". Lines without a leading quantity yield `None`.
pub(crate) fn scale_ingredient(line: &str, factor: f64) -> Option<String> {
    let caps = RE_LEADING_QUANTITY.captures(line)?;
    let matched = caps.get(0)?;
    let quantity = scaled_quantity(&caps, factor)?;
    Some(format!("{}{}", quantity, &line[matched.end()..]))
}

/// Scale every line, keeping lines without a quantity as they are.
pub(crate) fn scale_ingredients(lines: &[String], factor: f64) -> Vec<String> {
    lines
        .iter()
        .map(|line| scale_ingredient(line, factor).unwrap_or_else(|| line.clone()))
        .collect()
}
