//! Adversarial payload corpus for demon-mode input fuzzing.
//!
//! The table is compiled into the crate and versioned with it. It is not
//! configurable at run time: a seed only reproduces a run if the corpus it
//! drew from is the same.

use crate::rng::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadCategory {
    /// Script injection
    Xss,
    /// SQL-injection shaped strings
    Sql,
    /// Unicode edge cases
    Unicode,
    /// Overflow-length strings and numbers
    Overflow,
    /// Control characters
    Control,
    /// Special characters and empty-ish values
    Special,
    /// Path traversal
    Path,
    /// Format strings
    Format,
    /// Markup-breaking fragments
    Markup,
}

impl PayloadCategory {
    /// Every category, in corpus order
    pub const ALL: [Self; 9] = [
        Self::Xss,
        Self::Sql,
        Self::Unicode,
        Self::Overflow,
        Self::Control,
        Self::Special,
        Self::Path,
        Self::Format,
        Self::Markup,
    ];

    /// Short name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xss => "xss",
            Self::Sql => "sql",
            Self::Unicode => "unicode",
            Self::Overflow => "overflow",
            Self::Control => "control",
            Self::Special => "special",
            Self::Path => "path",
            Self::Format => "format",
            Self::Markup => "markup",
        }
    }

    /// Payloads in this category
    #[must_use]
    pub fn payloads(self) -> &'static [&'static str] {
        ADVERSARIAL_PAYLOADS
            .iter()
            .find(|(category, _)| *category == self)
            .map_or(&[], |(_, payloads)| *payloads)
    }
}

impl fmt::Display for PayloadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown payload category: {s}"))
    }
}

/// The corpus: category to literal payloads
pub const ADVERSARIAL_PAYLOADS: &[(PayloadCategory, &[&str])] = &[
    (
        PayloadCategory::Xss,
        &[
            "<script>alert('xss')</script>",
            "<img src=x onerror=alert(1)>",
            "<svg onload=alert(1)>",
            "javascript:alert(document.cookie)",
            "\"><script>alert(1)</script>",
            "'-alert(1)-'",
            "<iframe src=\"javascript:alert(1)\"></iframe>",
            "<body onload=alert(1)>",
            "{{constructor.constructor('alert(1)')()}}",
            "${alert(1)}",
        ],
    ),
    (
        PayloadCategory::Sql,
        &[
            "' OR '1'='1",
            "'; DROP TABLE users; --",
            "1; SELECT * FROM accounts",
            "\" OR \"\"=\"",
            "' UNION SELECT NULL, NULL --",
            "admin'--",
            "1' AND SLEEP(5)#",
            "%27%20OR%201=1",
        ],
    ),
    (
        PayloadCategory::Unicode,
        &[
            "\u{0000}",
            "\u{FEFF}BOM",
            "\u{202E}txet desrever",
            "\u{200B}\u{200B}\u{200B}",
            "Z\u{0351}\u{036B}\u{0343}\u{036A}\u{0302}\u{036B}a\u{0306}l\u{0352}g\u{0336}o",
            "😀😃😄😁😆😅🤣😂",
            "👨‍👩‍👧‍👦",
            "𝕿𝖍𝖊 𝖖𝖚𝖎𝖈𝖐",
            "ﷺ",
            "田中さんにあげて下さい",
            "\u{FFFD}\u{FFFF}",
            "\u{1F1FA}\u{1F1F8}",
        ],
    ),
    (
        PayloadCategory::Overflow,
        &[
            "99999999999999999999999999999999",
            "-99999999999999999999999999999999",
            "1e308",
            "-1e308",
            "1.7976931348623157e+309",
            "NaN",
            "Infinity",
            "-0",
            "0.1e-400",
            "2147483648",
            "-2147483649",
            "9007199254740993",
        ],
    ),
    (
        PayloadCategory::Control,
        &[
            "\r\n\r\n",
            "\t\t\t",
            "\u{0008}\u{0008}\u{0008}",
            "\u{001B}[31mred",
            "\u{0007}",
            "line1\nline2\nline3",
            "\u{000B}\u{000C}",
        ],
    ),
    (
        PayloadCategory::Special,
        &[
            "",
            " ",
            "null",
            "undefined",
            "true",
            "[]",
            "{}",
            "\\",
            "\"",
            "'",
            "`~!@#$%^&*()_+-=[]{}|;':\",./<>?",
            "$0.00",
            "-$1,000,000.00",
        ],
    ),
    (
        PayloadCategory::Path,
        &[
            "../../../etc/passwd",
            "..\\..\\..\\windows\\system32",
            "/dev/null",
            "file:///etc/hosts",
            "%2e%2e%2f%2e%2e%2f",
            "....//....//",
        ],
    ),
    (
        PayloadCategory::Format,
        &[
            "%s%s%s%s%s",
            "%n%n%n",
            "%x%x%x%x",
            "{0}{1}{2}",
            "%d %i %f",
            "{{7*7}}",
            "#{7*7}",
        ],
    ),
    (
        PayloadCategory::Markup,
        &[
            "</div></div></div>",
            "<!--",
            "]]>",
            "<![CDATA[x]]>",
            "<table><tr><td>",
            "&lt;&gt;&amp;&quot;",
            "<style>*{display:none}</style>",
            "<a href='#'",
        ],
    ),
];

/// One payload drawn from the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdversarialInput {
    /// Category the payload came from
    pub category: PayloadCategory,
    /// The literal payload
    pub payload: &'static str,
}

/// Pick a category (random when `None`) then a uniformly random payload from it
pub fn generate_adversarial_input(
    rng: &mut Rng,
    category: Option<PayloadCategory>,
) -> AdversarialInput {
    let category = match category {
        Some(category) => category,
        None => *rng
            .pick(&PayloadCategory::ALL)
            .unwrap_or(&PayloadCategory::Special),
    };
    let payload = rng.pick(category.payloads()).copied().unwrap_or("");
    AdversarialInput { category, payload }
}

/// Total number of payloads in the corpus
#[must_use]
pub fn corpus_size() -> usize {
    ADVERSARIAL_PAYLOADS.iter().map(|(_, p)| p.len()).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rng::Seed;

    #[test]
    fn test_every_category_has_payloads() {
        for category in PayloadCategory::ALL {
            assert!(
                !category.payloads().is_empty(),
                "{category} has no payloads"
            );
        }
        assert_eq!(ADVERSARIAL_PAYLOADS.len(), PayloadCategory::ALL.len());
    }

    #[test]
    fn test_category_roundtrip_names() {
        for category in PayloadCategory::ALL {
            assert_eq!(category.as_str().parse::<PayloadCategory>().unwrap(), category);
        }
        assert_eq!("XSS".parse::<PayloadCategory>().unwrap(), PayloadCategory::Xss);
        assert!("nope".parse::<PayloadCategory>().is_err());
    }

    #[test]
    fn test_forced_category() {
        let mut rng = Rng::new(Seed::from_u32(66666));
        for _ in 0..50 {
            let input = generate_adversarial_input(&mut rng, Some(PayloadCategory::Sql));
            assert_eq!(input.category, PayloadCategory::Sql);
            assert!(PayloadCategory::Sql.payloads().contains(&input.payload));
        }
    }

    #[test]
    fn test_random_category_is_deterministic() {
        let mut a = Rng::new(Seed::from_u32(66666));
        let mut b = Rng::new(Seed::from_u32(66666));
        for _ in 0..20 {
            assert_eq!(
                generate_adversarial_input(&mut a, None),
                generate_adversarial_input(&mut b, None)
            );
        }
    }

    #[test]
    fn test_random_draws_cover_categories() {
        let mut rng = Rng::new(Seed::from_u32(1));
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(generate_adversarial_input(&mut rng, None).category);
        }
        assert_eq!(seen.len(), PayloadCategory::ALL.len());
    }

    #[test]
    fn test_corpus_size() {
        assert!(corpus_size() > 60);
    }
}
