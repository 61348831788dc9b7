//! Pure numeric helpers shared by the summary engine and the report renderer.

/// Percentage move from `reference` to `target`.
///
/// `None` ("no gain") when either side is missing or zero.
pub fn gain_percent(reference: Option<f64>, target: Option<f64>) -> Option<f64> {
    let reference = reference.filter(|v| *v != 0.0)?;
    let target = target.filter(|v| *v != 0.0)?;
    Some((target - reference) / reference * 100.0)
}

/// Sign-prefixed, one decimal. The "no gain" placeholder is the empty string.
pub fn format_gain(gain: Option<f64>) -> String {
    match gain {
        Some(g) if g >= 0.0 => format!("+{g:.1}%"),
        Some(g) => format!("{g:.1}%"),
        None => String::new(),
    }
}

/// True when any achieved value reaches `threshold`. Both sides must be present and positive.
pub fn is_hit(threshold: Option<f64>, achieved: &[Option<f64>]) -> bool {
    let Some(threshold) = threshold.filter(|t| *t > 0.0) else {
        return false;
    };
    achieved
        .iter()
        .flatten()
        .any(|v| *v > 0.0 && *v >= threshold)
}

/// Outcome classification of one realized value. Max dominates R1 dominates partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Max,
    R1,
    Partial,
    None,
}

pub fn classify_tier(
    entry: Option<f64>,
    target_r1: Option<f64>,
    target_max: Option<f64>,
    achieved: Option<f64>,
) -> Tier {
    if is_hit(target_max, &[achieved]) {
        return Tier::Max;
    }
    if is_hit(target_r1, &[achieved]) {
        return Tier::R1;
    }
    match (entry, achieved) {
        (Some(entry), Some(v)) if entry > 0.0 && v > entry => Tier::Partial,
        _ => Tier::None,
    }
}

/// `count / total * 100`, 0 when `total` is 0.
pub fn hit_rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

/// Thousands-grouped with up to three fraction digits; `-` when missing.
pub fn format_number(value: Option<f64>) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return "-".to_string();
    };

    let rounded = (v * 1000.0).round() / 1000.0;
    let fixed = format!("{:.3}", rounded.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_is_none_for_missing_or_zero_inputs() {
        assert_eq!(gain_percent(Some(0.0), Some(110.0)), None);
        assert_eq!(gain_percent(None, Some(110.0)), None);
        assert_eq!(gain_percent(Some(100.0), None), None);
        assert_eq!(gain_percent(Some(100.0), Some(0.0)), None);
        assert_eq!(format_gain(gain_percent(Some(0.0), Some(5.0))), "");
    }

    #[test]
    fn gain_formats_with_sign_and_one_decimal() {
        assert_eq!(format_gain(gain_percent(Some(100.0), Some(112.0))), "+12.0%");
        assert_eq!(format_gain(gain_percent(Some(100.0), Some(95.0))), "-5.0%");
        assert_eq!(format_gain(gain_percent(Some(100.0), Some(100.0))), "+0.0%");
        assert_eq!(format_gain(gain_percent(Some(3.0), Some(4.0))), "+33.3%");
    }

    #[test]
    fn hit_requires_positive_threshold_and_value() {
        assert!(is_hit(Some(110.0), &[Some(110.0)]));
        assert!(is_hit(Some(110.0), &[Some(100.0), Some(111.0)]));
        assert!(!is_hit(Some(110.0), &[Some(109.9), None]));
        assert!(!is_hit(None, &[Some(500.0)]));
        assert!(!is_hit(Some(0.0), &[Some(500.0)]));
        assert!(!is_hit(Some(110.0), &[None, None]));
    }

    #[test]
    fn max_tier_dominates_r1() {
        let entry = Some(100.0);
        assert_eq!(classify_tier(entry, Some(110.0), Some(120.0), Some(125.0)), Tier::Max);
        assert_eq!(classify_tier(entry, Some(110.0), Some(120.0), Some(115.0)), Tier::R1);
        assert_eq!(classify_tier(entry, Some(110.0), Some(120.0), Some(105.0)), Tier::Partial);
        assert_eq!(classify_tier(entry, Some(110.0), Some(120.0), Some(100.0)), Tier::None);
        assert_eq!(classify_tier(entry, Some(110.0), Some(120.0), None), Tier::None);
        // Without a Max target an R1 hit stays R1.
        assert_eq!(classify_tier(entry, Some(110.0), None, Some(500.0)), Tier::R1);
    }

    #[test]
    fn hit_rate_guards_zero_days() {
        assert_eq!(hit_rate(0, 0), 0.0);
        assert_eq!(hit_rate(2, 5), 40.0);
        assert!((hit_rate(2, 3) - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(None), "-");
        assert_eq!(format_number(Some(0.0)), "0");
        assert_eq!(format_number(Some(950.0)), "950");
        assert_eq!(format_number(Some(1234.0)), "1,234");
        assert_eq!(format_number(Some(1234567.5)), "1,234,567.5");
        assert_eq!(format_number(Some(12.34567)), "12.346");
        assert_eq!(format_number(Some(-4200.0)), "-4,200");
    }
}
