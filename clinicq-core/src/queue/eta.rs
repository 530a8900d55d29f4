use once_cell::sync::Lazy;
use regex::Regex;

use clinicq_model::CheckIn;

/// Longest consultation a hint may claim. Larger values are treated as
/// unparseable.
pub const MAX_ETA_MINUTES: u32 = 24 * 60;

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("digit regex should compile"));

/// Consultation length in minutes for `check_in`.
///
/// Takes the first run of digits in the ETA hint ("20", "~45 min",
/// "eta: 15"). Missing, unparseable, zero or implausibly long hints fall
/// back to `default_minutes`.
pub fn eta_minutes(check_in: &CheckIn, default_minutes: u32) -> u32 {
    check_in
        .eta_hint
        .as_deref()
        .and_then(parse_eta_hint)
        .unwrap_or(default_minutes)
}

pub fn parse_eta_hint(hint: &str) -> Option<u32> {
    LEADING_NUMBER
        .find(hint)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|minutes| (1..=MAX_ETA_MINUTES).contains(minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_numeric_portion() {
        assert_eq!(parse_eta_hint("20"), Some(20));
        assert_eq!(parse_eta_hint(" 45 min"), Some(45));
        assert_eq!(parse_eta_hint("about 15 minutes"), Some(15));
        assert_eq!(parse_eta_hint("7.5"), Some(7));
    }

    #[test]
    fn garbage_and_zero_fall_back() {
        assert_eq!(parse_eta_hint(""), None);
        assert_eq!(parse_eta_hint("soon"), None);
        assert_eq!(parse_eta_hint("0"), None);
        assert_eq!(parse_eta_hint("99999999999999999999"), None);
    }

    #[test]
    fn implausible_hints_use_the_default() {
        assert_eq!(parse_eta_hint("1440"), Some(MAX_ETA_MINUTES));
        assert_eq!(parse_eta_hint("1441"), None);
        assert_eq!(parse_eta_hint("4294967295"), None);

        let check_in = CheckIn::new(
            clinicq_model::ClinicID::new(),
            chrono::Utc::now(),
        )
        .with_eta_hint("4294967295");
        assert_eq!(eta_minutes(&check_in, 30), 30);
    }
}
