//! Lenient parsers for the numeric values people type into tags.

use crate::field::parse_decimal;

/// Where a rating value came from. Each tagging convention spreads its
/// ratings over a different numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatingConvention {
    /// 0-255 (`POPM`), with small values taken as plain star counts.
    #[default]
    Id3v2,
    /// 0-100.
    Ape,
    /// 0-99, as Windows Media Player writes it.
    Asf,
}

fn first_digit_run(value: &str) -> Option<&str> {
    let start = value.find(|c: char| c.is_ascii_digit())?;
    let rest = &value[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Track or disc number held in free text such as `"03"`, `"3/12"` or
/// `"Track 7"`. Returns 0 when there is no number or it does not fit.
pub fn extract_track_number(value: &str) -> u16 {
    first_digit_run(value.trim())
        .and_then(|digits| digits.parse::<u16>().ok())
        .unwrap_or(0)
}

/// Four-digit year held in a date-ish string, or `""`.
pub fn extract_str_year(value: &str) -> String {
    let value = value.trim();
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 4 {
        return String::new();
    }

    let all_digits = |slice: &[char]| slice.iter().all(|c| c.is_ascii_digit());
    if all_digits(&chars[..4]) {
        return chars[..4].iter().collect();
    }
    let tail = &chars[chars.len() - 4..];
    if all_digits(tail) {
        return tail.iter().collect();
    }

    chars
        .windows(4)
        .find(|w| all_digits(w))
        .map(|w| w.iter().collect())
        .unwrap_or_default()
}

/// Year held in a date-ish string; 0 when there is none.
pub fn extract_year(value: &str) -> i32 {
    extract_str_year(value).parse().unwrap_or(0)
}

/// Normalise a numeric rating to 0.0-1.0 (0 to 5 stars).
pub fn decode_popularity(rating: f64, convention: RatingConvention) -> f32 {
    if rating <= 0.0 {
        return 0.0;
    }
    let stars = match convention {
        RatingConvention::Asf => match rating {
            r if r < 1.0 => 0.0,
            r if r < 25.0 => 0.2,
            r if r < 50.0 => 0.4,
            r if r < 75.0 => 0.6,
            r if r < 99.0 => 0.8,
            _ => 1.0,
        },
        RatingConvention::Ape => match rating {
            r if r < 5.1 => rating / 5.0,
            r if r < 10.0 => 0.1,
            r if r < 20.0 => 0.2,
            r if r < 30.0 => 0.3,
            r if r < 40.0 => 0.4,
            r if r < 50.0 => 0.5,
            r if r < 60.0 => 0.6,
            r if r < 70.0 => 0.7,
            r if r < 80.0 => 0.8,
            r if r < 90.0 => 0.9,
            _ => 1.0,
        },
        RatingConvention::Id3v2 => match rating {
            r if r > 10.0 => match r {
                r if r < 54.0 => 0.1,
                r if r < 64.0 => 0.2,
                r if r < 118.0 => 0.4,
                r if r < 128.0 => 0.5,
                r if r < 186.0 => 0.6,
                r if r < 196.0 => 0.7,
                r if r < 242.0 => 0.8,
                r if r < 255.0 => 0.9,
                _ => 1.0,
            },
            r if r > 5.0 => r / 10.0,
            r => r / 5.0,
        },
    };
    (stars as f32).clamp(0.0, 1.0)
}

/// Normalise a rating written as text: a number, a single raw byte or a run
/// of `*` stars. Anything else is 0.
pub fn decode_popularity_str(value: &str, convention: RatingConvention) -> f32 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(rating) = parse_decimal(trimmed) {
        return decode_popularity(rating, convention);
    }

    let mut chars = trimmed.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return decode_popularity(f64::from(c as u32), convention);
    }

    let stars = trimmed.chars().take_while(|&c| c == '*').count();
    if stars > 0 {
        return (stars as f32 / 5.0).min(1.0);
    }
    0.0
}

/// Convert a star count (0-5, fractions allowed) to the raw value a
/// convention stores.
pub fn encode_popularity(stars: f64, convention: RatingConvention) -> u8 {
    match convention {
        RatingConvention::Asf => match stars {
            s if s < 1.0 => 0,
            s if s < 2.0 => 1,
            s if s < 3.0 => 25,
            s if s < 4.0 => 50,
            s if s < 5.0 => 75,
            _ => 99,
        },
        RatingConvention::Ape => (stars.clamp(0.0, 5.0) * 20.0).round() as u8,
        RatingConvention::Id3v2 => match stars {
            s if s < 0.5 => 0,
            s if s < 1.0 => 13,
            s if s < 1.5 => 1,
            s if s < 2.0 => 54,
            s if s < 2.5 => 64,
            s if s < 3.0 => 118,
            s if s < 3.5 => 128,
            s if s < 4.0 => 186,
            s if s < 4.5 => 196,
            s if s < 5.0 => 242,
            _ => 255,
        },
    }
}
