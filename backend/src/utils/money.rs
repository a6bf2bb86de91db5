use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to pence, halves away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Line amount for `hours` at `rate`.
pub fn line_amount(hours: Decimal, rate: Decimal) -> Decimal {
    round_money(hours * rate)
}

/// "£1,234.50"
pub fn format_gbp(value: Decimal) -> String {
    let rounded = round_money(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}£{}.{}", if negative { "-" } else { "" }, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn line_amount_rounds_half_up() {
        assert_eq!(line_amount(dec("1.5"), dec("15.01")), dec("22.52"));
        assert_eq!(line_amount(dec("0.25"), dec("10.10")), dec("2.53"));
        assert_eq!(line_amount(dec("2"), dec("17.50")), dec("35.00"));
    }

    #[test]
    fn format_gbp_groups_thousands() {
        assert_eq!(format_gbp(dec("0")), "£0.00");
        assert_eq!(format_gbp(dec("45.5")), "£45.50");
        assert_eq!(format_gbp(dec("1234.5")), "£1,234.50");
        assert_eq!(format_gbp(dec("1234567.891")), "£1,234,567.89");
        assert_eq!(format_gbp(dec("-12")), "-£12.00");
    }
}
