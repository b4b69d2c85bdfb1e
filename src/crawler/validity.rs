use regex::Regex;

/// Minimum trimmed length, in characters, of an acceptable product name.
pub const DEFAULT_MIN_NAME_LEN: usize = 6;

/// Badge, price and promotion text that shows up where names are expected:
/// currency signs, percentages and the catalog's (Thai) words for saving,
/// installments, gifts and discounts, plus their English counterparts.
pub const DEFAULT_REJECT_PATTERN: &str =
    r"(?i)(ประหยัด|฿|บาท|%|ผ่อน|ของแถม|แถม|ส่วนลด|\$|€|£|¥|\bdiscount\b|\bsave\b|\bbonus\b|\binstall?ments?\b)";

/// Decides whether a candidate text can be a product name.
#[derive(Debug, Clone)]
pub struct NamePolicy {
    min_len: usize,
    reject: Regex,
}

impl NamePolicy {
    pub fn new(min_len: usize, reject_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            min_len,
            reject: Regex::new(reject_pattern)?,
        })
    }

    pub fn with_min_len(min_len: usize) -> Self {
        Self {
            min_len,
            ..Self::default()
        }
    }

    pub fn is_valid_name(&self, candidate: &str) -> bool {
        let trimmed = candidate.trim();
        if trimmed.is_empty() || self.reject.is_match(trimmed) {
            return false;
        }
        trimmed.chars().count() >= self.min_len
    }
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_NAME_LEN,
            reject: Regex::new(DEFAULT_REJECT_PATTERN).expect("default name pattern is valid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_prices_and_promotions() {
        let policy = NamePolicy::default();
        for text in [
            "฿29,990",
            "ประหยัด 5,000.-",
            "ผ่อน 0% นาน 10 เดือน",
            "ของแถมมูลค่า 1,990 บาท",
            "ส่วนลดพิเศษสำหรับสมาชิก",
            "Save up to 30 percent",
            "Get a BONUS mouse today",
            "Installment plans available",
            "Now only $999 this week",
        ] {
            assert!(!policy.is_valid_name(text), "{text:?} should be rejected");
        }
    }

    #[test]
    fn rejects_blank_and_short_text() {
        let policy = NamePolicy::default();
        assert!(!policy.is_valid_name(""));
        assert!(!policy.is_valid_name("   \n\t"));
        assert!(!policy.is_valid_name("  NEW  "));
        assert!(!policy.is_valid_name("Acer"));
    }

    #[test]
    fn accepts_real_names_and_counts_characters_not_bytes() {
        let policy = NamePolicy::default();
        assert!(policy.is_valid_name("Acer Swift Go 14 OLED"));
        assert!(policy.is_valid_name("  ASUS Vivobook 15  "));
        assert!(policy.is_valid_name("โน้ตบุ๊ค"));
        assert!(!policy.is_valid_name("โน้ต"));
    }

    #[test]
    fn accepted_names_meet_the_length_threshold() {
        let policy = NamePolicy::with_min_len(10);
        for text in ["Lenovo", "Lenovo IdeaPad", " HP 15s ", "MacBook Air M3"] {
            if policy.is_valid_name(text) {
                assert!(text.trim().chars().count() >= 10);
            }
        }
        assert!(!policy.is_valid_name("Lenovo"));
    }

    #[test]
    fn custom_pattern_replaces_default() {
        let policy = NamePolicy::new(3, r"(?i)sold out").unwrap();
        assert!(policy.is_valid_name("฿ 100"));
        assert!(!policy.is_valid_name("SOLD OUT"));
    }
}
