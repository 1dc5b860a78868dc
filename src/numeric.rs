//! Numeric sub-entities: digit extraction with a spelled-number fallback.

use regex::Regex;
use std::sync::OnceLock;

/// Built-in numeric sub-types a composite can reference (`@number`, `@year`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericSubType {
    Number,
    Year,
}

static DIGITS: OnceLock<Regex> = OnceLock::new();
static YEAR: OnceLock<Regex> = OnceLock::new();
static SINGLE_DIGIT: OnceLock<Regex> = OnceLock::new();

impl NumericSubType {
    /// Resolve a tagged ref name (without the `@` marker) to a numeric type.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "number" => Some(NumericSubType::Number),
            "year" => Some(NumericSubType::Year),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NumericSubType::Number => "number",
            NumericSubType::Year => "year",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            NumericSubType::Number => {
                DIGITS.get_or_init(|| Regex::new(r"\d+").expect("valid digit pattern"))
            }
            NumericSubType::Year => {
                YEAR.get_or_init(|| Regex::new(r"\d{4}").expect("valid year pattern"))
            }
        }
    }

    /// Extract an integer from free text.
    ///
    /// The first regex match wins; without one the whole text is read as a
    /// spelled-out number. `None` when neither path yields a value.
    pub fn extract(&self, text: &str) -> Option<i64> {
        if let Some(m) = self.pattern().find(text) {
            // Overflowing digit runs are a miss, not a fallback case
            return digits_value(m.as_str());
        }
        parse_spelled_number(text)
    }
}

/// Integer value of a run of decimal digits from any script.
fn digits_value(digits: &str) -> Option<i64> {
    digits.chars().try_fold(0i64, |acc, c| {
        acc.checked_mul(10)?.checked_add(i64::from(digit_value(c)?))
    })
}

fn is_decimal_digit(c: char) -> bool {
    let pattern = SINGLE_DIGIT.get_or_init(|| Regex::new(r"^\d$").expect("valid digit pattern"));
    let mut buf = [0u8; 4];
    pattern.is_match(c.encode_utf8(&mut buf))
}

/// Value of a single decimal digit.
///
/// Unicode encodes decimal digits in contiguous runs starting at zero, so a
/// non-ASCII digit's value is its distance from the start of its run,
/// modulo ten (some runs hold several scripts back to back).
fn digit_value(c: char) -> Option<u32> {
    if let Some(value) = c.to_digit(10) {
        return Some(value);
    }
    if !is_decimal_digit(c) {
        return None;
    }

    let mut offset = 0u32;
    let mut code = c as u32;
    while let Some(prev) = code.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        offset += 1;
        code -= 1;
    }
    Some(offset % 10)
}

fn small_number(word: &str) -> Option<i64> {
    let value = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(value)
}

fn scale(word: &str) -> Option<i64> {
    match word {
        "thousand" => Some(1_000),
        "million" => Some(1_000_000),
        "billion" => Some(1_000_000_000),
        _ => None,
    }
}

/// Parse a spelled-out integer such as `"four pieces"` or
/// `"two thousand and nineteen"`.
///
/// Words that are not number words are ignored. Returns `None` when the text
/// contains no number words or the scale words are out of order.
pub fn parse_spelled_number(text: &str) -> Option<i64> {
    let lowered = text.to_lowercase();
    let words = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty());

    let mut total: i64 = 0;
    let mut current: i64 = 0;
    let mut last_scale: Option<i64> = None;
    let mut seen_hundred = false;
    let mut found = false;

    for word in words {
        if let Some(value) = small_number(word) {
            current = current.checked_add(value)?;
            found = true;
        } else if word == "hundred" {
            if seen_hundred {
                return None;
            }
            current = current.max(1).checked_mul(100)?;
            seen_hundred = true;
            found = true;
        } else if let Some(factor) = scale(word) {
            if last_scale.is_some_and(|last| factor >= last) {
                return None;
            }
            total = total.checked_add(current.max(1).checked_mul(factor)?)?;
            current = 0;
            seen_hundred = false;
            last_scale = Some(factor);
            found = true;
        }
    }

    if !found {
        return None;
    }
    total.checked_add(current)
}
