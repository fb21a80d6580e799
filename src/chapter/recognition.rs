//! Chapter number recognition from chapter names.
//!
//! Sources do not always report a chapter number. When they don't, the number is guessed
//! from the chapter name: either with a source-provided regex or with the default
//! heuristics below, tried in order until one yields a number.
//!
//! | Name                                              | Manga        | Number |
//! |---------------------------------------------------|--------------|--------|
//! | `Mokushiroku Alice Vol.1 Ch. 4: Misrepresentation` |              | 4      |
//! | `Bleach 567: Down With Snowwhite`                 | Bleach       | 567    |
//! | `Solanin 028 Vol. 2`                              | Solanin      | 28     |
//! | `Prison School 12 v.1 vol004 version1243`         | Prison School| 12     |
//! | `One Piece 12 special`                            | One Piece    | 12.97  |
//! | `Hunter x Hunter 345b`                            |              | 345.2  |
//!
//! ```rust
//! use hondana::chapter::recognition;
//!
//! assert_eq!(recognition::parse("Bleach 567: Down With Snowwhite", "Bleach", None), 567.0);
//! assert_eq!(recognition::parse("Oneshot", "Some Manga", None), -1.0);
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::model::UNRECOGNIZED_NUMBER;

/// `ch.xx` anywhere in the name
static BASIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ch\. *([0-9]+)(\.[0-9]+)?(\.?[a-z]+)?").expect("valid chapter regex")
});

/// Any number, with optional decimal and alpha suffix
static OCCURRENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]+)(\.[0-9]+)?(\.?[a-z]+)?").expect("valid occurrence regex")
});

/// A number at the very start, once the manga title is gone
static WITHOUT_MANGA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)(\.[0-9]+)?(\.?[a-z]+)?").expect("valid leading number regex")
});

/// Volume, version and season tags, not preceded by a letter
static UNWANTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^a-z])(?:v|ver|vol|version|volume|season|s).?[0-9]+")
        .expect("valid tag regex")
});

/// Whitespace in front of suffix words
static UNWANTED_WHITESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s(extra|special|omake)").expect("valid whitespace regex")
});

/// Returns the chapter number recognized in `name`, or `-1.0`.
///
/// With `source_regex` the first match of that regex on the raw name decides; otherwise
/// the default heuristics run on a normalized copy of the name, using `manga_title` to
/// strip the title before looking for a leading number.
pub fn parse(name: &str, manga_title: &str, source_regex: Option<&Regex>) -> f32 {
    match source_regex {
        Some(regex) if !regex.as_str().is_empty() => find_match(regex.captures(name)),
        _ => parse_default(name, manga_title),
    }
}

fn parse_default(name: &str, manga_title: &str) -> f32 {
    let name = name.to_lowercase().replace(',', ".");
    let name = UNWANTED_WHITESPACE.replace_all(&name, "$1");
    let name = UNWANTED.replace_all(&name, "$1");

    let number = find_match(BASIC.captures(&name));
    if number != UNRECOGNIZED_NUMBER {
        return number;
    }

    let mut occurrences = OCCURRENCE.captures_iter(&name);
    if let (Some(only), None) = (occurrences.next(), occurrences.next()) {
        let number = find_match(Some(only));
        if number != UNRECOGNIZED_NUMBER {
            return number;
        }
    }

    let title = manga_title.to_lowercase();
    let without_manga = if title.is_empty() {
        name.trim().to_string()
    } else {
        name.replace(&title, "").trim().to_string()
    };

    let number = find_match(WITHOUT_MANGA.captures(&without_manga));
    if number != UNRECOGNIZED_NUMBER {
        return number;
    }

    find_match(OCCURRENCE.captures(&without_manga))
}

fn find_match(captures: Option<Captures<'_>>) -> f32 {
    let Some(captures) = captures else {
        return UNRECOGNIZED_NUMBER;
    };
    let Some(initial) = captures
        .get(1)
        .and_then(|m| m.as_str().parse::<f32>().ok())
    else {
        return UNRECOGNIZED_NUMBER;
    };

    let decimal = captures.get(2).map(|m| m.as_str());
    let alpha = captures.get(3).map(|m| m.as_str());
    initial + decimal_part(decimal, alpha)
}

fn decimal_part(decimal: Option<&str>, alpha: Option<&str>) -> f32 {
    if let Some(decimal) = decimal.filter(|d| !d.is_empty()) {
        return format!("0{}", decimal).parse().unwrap_or(0.0);
    }

    match alpha.filter(|a| !a.is_empty()) {
        Some(alpha) if alpha.contains("extra") => 0.99,
        Some(alpha) if alpha.contains("omake") => 0.98,
        Some(alpha) if alpha.contains("special") => 0.97,
        Some(alpha) => alpha
            .trim_start_matches('.')
            .chars()
            .next()
            .map(alpha_postfix)
            .unwrap_or(0.0),
        None => 0.0,
    }
}

/// x.a -> x.1, x.b -> x.2, etc
fn alpha_postfix(alpha: char) -> f32 {
    let index = (alpha as u32).saturating_sub('a' as u32 - 1);
    format!("0.{}", index).parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_number(name: &str, manga: &str, expected: f32) {
        let actual = parse(name, manga, None);
        assert!(
            (actual - expected).abs() < 1e-4,
            "{:?} parsed as {}, expected {}",
            name,
            actual,
            expected
        );
    }

    #[test]
    fn test_basic_ch_prefix() {
        assert_number("Mokushiroku Alice Vol.1 Ch. 4: Misrepresentation", "Mokushiroku Alice", 4.0);
        assert_number("Vol.1 Ch. 4.5: Misrepresentation", "", 4.5);
    }

    #[test]
    fn test_single_occurrence() {
        assert_number("Bleach 567: Down With Snowwhite", "Bleach", 567.0);
        assert_number("Chapter 5,5", "", 5.5);
    }

    #[test]
    fn test_number_after_title() {
        assert_number("Solanin 028 Vol. 2", "Solanin", 28.0);
        assert_number("Prison School 12 v.1 vol004 version1243 volume64", "Prison School", 12.0);
    }

    #[test]
    fn test_alpha_suffixes() {
        assert_number("One Piece 12 special", "One Piece", 12.97);
        assert_number("Onepunch-Man Punch Ver002 028 extra", "Onepunch-Man", 28.99);
        assert_number("Kono Subarashii 12 omake", "Kono Subarashii", 12.98);
        assert_number("Hunter x Hunter 345b", "Hunter x Hunter", 345.2);
        assert_number("Hunter x Hunter 345.a", "Hunter x Hunter", 345.1);
    }

    #[test]
    fn test_unrecognized() {
        assert_number("Oneshot", "Some Manga", -1.0);
        assert_number("", "", -1.0);
    }

    #[test]
    fn test_source_regex_takes_precedence() {
        let regex = Regex::new(r"Episode (\d+)(\.\d+)?").unwrap();
        assert_eq!(parse("Season 2 Episode 14", "Show", Some(&regex)), 14.0);
        assert_eq!(parse("Bonus", "Show", Some(&regex)), -1.0);
    }
}
