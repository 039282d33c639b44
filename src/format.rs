use num_format::{Locale, ToFormattedString};

/// `$64,250.50` for prices of a dollar or more; sub-dollar prices keep up
/// to eight decimals so small caps stay readable.
pub fn format_price(price: f64) -> String {
    let decimals = if price.abs() >= 1.0 { 2 } else { 8 };
    let fixed = format!("{:.*}", decimals, price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, ""));

    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }

    let grouped = int_part
        .parse::<u64>()
        .map(|n| n.to_formatted_string(&Locale::en))
        .unwrap_or_else(|_| int_part.to_string());
    let sign = if price < 0.0 { "-" } else { "" };

    format!("{sign}${grouped}.{frac}")
}

pub fn format_market_cap(value: f64) -> String {
    if value >= 1e12 {
        format!("${:.2}T", value / 1e12)
    } else if value >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else {
        format!("${:.0}", value)
    }
}

pub fn format_volume(value: f64) -> String {
    format_market_cap(value)
}

pub fn format_percentage(pct: f64) -> String {
    let sign = if pct >= 0.0 { "+" } else { "" };
    format!("{sign}{pct:.2}%")
}
