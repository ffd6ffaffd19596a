//! Verification code extraction from decoded mail content

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// Length/alphabet class of a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeShape {
    SixDigit,
    FourDigit,
    EightDigit,
    /// 6 to 8 uppercase letters and digits
    Alphanumeric,
}

/// Where the labelling text sits relative to the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// `verification code: 123456`
    LabelBefore,
    /// `123456 is your verification code`
    LabelAfter,
    /// A free-standing number
    Bare,
}

/// Which cascade entry produced a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternKind {
    pub shape: CodeShape,
    pub placement: Placement,
}

/// A verification code found in a mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCode {
    pub code: String,
    pub pattern: PatternKind,
}

const LABEL_BEFORE: &str = r"(?i:验证码|verification code|verify code|code)[\s：:]*";
const LABEL_AFTER: &str =
    r"\s*(?i:is|为|是)\s*(?i:your|您的)?\s*(?i:verification|verify|验证)\s*(?i:code|码)";

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static DIGIT_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

/// The cascade, tried strictly in order; the first accepted candidate wins
static CASCADE: LazyLock<Vec<(PatternKind, Option<Regex>)>> = LazyLock::new(|| {
    let mut cascade = Vec::new();
    for (shape, class) in [
        (CodeShape::SixDigit, "[0-9]{6}"),
        (CodeShape::FourDigit, "[0-9]{4}"),
        (CodeShape::EightDigit, "[0-9]{8}"),
        (CodeShape::Alphanumeric, "[A-Z0-9]{6,8}"),
    ] {
        cascade.push((
            PatternKind {
                shape,
                placement: Placement::LabelBefore,
            },
            Some(Regex::new(&format!("{LABEL_BEFORE}({class})")).unwrap()),
        ));
        cascade.push((
            PatternKind {
                shape,
                placement: Placement::LabelAfter,
            },
            Some(Regex::new(&format!("({class}){LABEL_AFTER}")).unwrap()),
        ));
        if shape != CodeShape::Alphanumeric {
            cascade.push((
                PatternKind {
                    shape,
                    placement: Placement::Bare,
                },
                None,
            ));
        }
    }
    cascade
});

impl CodeShape {
    const fn digit_len(self) -> Option<usize> {
        match self {
            Self::SixDigit => Some(6),
            Self::FourDigit => Some(4),
            Self::EightDigit => Some(8),
            Self::Alphanumeric => None,
        }
    }

    /// Characters that would make a candidate part of a longer token
    fn continues_run(self, c: char) -> bool {
        match self {
            Self::Alphanumeric => c.is_ascii_digit() || c.is_ascii_uppercase(),
            _ => c.is_ascii_digit(),
        }
    }
}

impl ExtractedCode {
    /// Run the pattern cascade over a mail's text and html bodies
    #[must_use]
    pub fn extract(text: &str, html: &str) -> Option<Self> {
        let surface = search_surface(text, html);

        for (pattern, regex) in CASCADE.iter() {
            let found = regex.as_ref().map_or_else(
                || find_bare(&surface, pattern.shape),
                |regex| find_labelled(&surface, regex, *pattern),
            );
            if let Some(code) = found {
                debug!(code = %code, pattern = ?pattern, "Extracted verification code");
                return Some(Self {
                    code,
                    pattern: *pattern,
                });
            }
        }

        debug!("No verification code found");
        None
    }
}

/// Convenience wrapper returning only the code string
#[must_use]
pub fn extract_code(text: &str, html: &str) -> Option<String> {
    ExtractedCode::extract(text, html).map(|found| found.code)
}

/// Join text and html and strip markup into one plain search surface
#[must_use]
pub fn search_surface(text: &str, html: &str) -> String {
    let joined = format!("{text} {html}");
    TAG_REGEX
        .replace_all(&joined, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn find_labelled(surface: &str, regex: &Regex, pattern: PatternKind) -> Option<String> {
    regex.captures_iter(surface).find_map(|caps| {
        let m = caps.get(1)?;
        let standalone = match pattern.placement {
            Placement::LabelBefore => surface[m.end()..]
                .chars()
                .next()
                .is_none_or(|c| !pattern.shape.continues_run(c)),
            _ => surface[..m.start()]
                .chars()
                .next_back()
                .is_none_or(|c| !pattern.shape.continues_run(c)),
        };
        let candidate = m.as_str();
        (standalone && is_plausible_code(candidate)).then(|| candidate.to_string())
    })
}

fn find_bare(surface: &str, shape: CodeShape) -> Option<String> {
    let len = shape.digit_len()?;
    DIGIT_RUN_REGEX
        .find_iter(surface)
        .filter(|m| m.len() == len)
        .filter(|m| {
            !touches_token(&surface[..m.start()], true) && !touches_token(&surface[m.end()..], false)
        })
        .map(|m| m.as_str())
        .find(|candidate| is_plausible_code(candidate))
        .map(str::to_string)
}

/// Whether the text adjoining a digit run glues it into a larger token: a
/// letter or `@` right next to it, or a `.` joining it to another
/// alphanumeric character (versions, decimals, hostnames). A sentence-ending
/// period does not count.
fn touches_token(side: &str, before: bool) -> bool {
    let (next, beyond) = if before {
        let mut chars = side.chars().rev();
        (chars.next(), chars.next())
    } else {
        let mut chars = side.chars();
        (chars.next(), chars.next())
    };

    match next {
        Some(c) if c.is_ascii_alphabetic() || c == '@' => true,
        Some('.') => beyond.is_some_and(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// Reject digit strings that are more likely dates, timestamps or filler
/// than codes. Candidates containing letters always pass.
#[must_use]
pub fn is_plausible_code(candidate: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    if !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }

    if candidate.len() >= 10 {
        return false;
    }
    if candidate.bytes().all(|b| b == b'0') || candidate.bytes().all(|b| b == b'1') {
        return false;
    }

    match candidate.len() {
        4 => !is_year(candidate) && !is_month_day(candidate),
        8 => !(is_year(&candidate[..4]) && is_month_day(&candidate[4..])),
        _ => true,
    }
}

fn is_year(digits: &str) -> bool {
    digits
        .parse::<u32>()
        .is_ok_and(|year| (1900..=2099).contains(&year))
}

fn is_month_day(digits: &str) -> bool {
    let (month, day) = digits.split_at(2);
    matches!(
        (month.parse::<u32>(), day.parse::<u32>()),
        (Ok(1..=12), Ok(1..=31))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_order() {
        let kinds: Vec<PatternKind> = CASCADE.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds.len(), 11);
        assert_eq!(kinds[0].shape, CodeShape::SixDigit);
        assert_eq!(kinds[2].placement, Placement::Bare);
        assert_eq!(kinds[3].shape, CodeShape::FourDigit);
        assert_eq!(kinds[6].shape, CodeShape::EightDigit);
        assert_eq!(kinds[9].shape, CodeShape::Alphanumeric);
        assert_eq!(kinds[10].placement, Placement::LabelAfter);
    }

    #[test]
    fn test_touches_token() {
        assert!(touches_token("abc", true));
        assert!(touches_token("@mail.com", false));
        assert!(touches_token(".5", false));
        assert!(touches_token("v1.", true));
        assert!(!touches_token(". Do not share", false));
        assert!(!touches_token(".", false));
        assert!(!touches_token("code ", true));
        assert!(!touches_token("", false));
    }

    #[test]
    fn test_month_day() {
        assert!(is_month_day("0101"));
        assert!(is_month_day("1231"));
        assert!(!is_month_day("1301"));
        assert!(!is_month_day("0132"));
        assert!(!is_month_day("0000"));
    }
}
