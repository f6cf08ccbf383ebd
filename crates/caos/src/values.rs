//! Type-aware values for benign form filling.
//!
//! Values are plausible for the field's declared type so they get past the
//! first layer of client-side validation and reach the application's own
//! handling. Field names refine the guess for untyped text inputs.

use crate::driver::ElementHandle;
use crate::rng::Rng;

/// Field category inferred from type and name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Numeric input
    Number,
    /// Email address
    Email,
    /// Calendar date
    Date,
    /// Phone number
    Phone,
    /// URL
    Url,
    /// Password
    Password,
    /// Monetary amount
    Amount,
    /// Anything else
    Text,
}

impl FieldKind {
    /// Classify an input element
    #[must_use]
    pub fn classify(element: &ElementHandle) -> Self {
        match element.input_type.as_deref() {
            Some("number" | "range") => return Self::Number,
            Some("email") => return Self::Email,
            Some("date" | "datetime-local" | "month") => return Self::Date,
            Some("tel") => return Self::Phone,
            Some("url") => return Self::Url,
            Some("password") => return Self::Password,
            _ => {}
        }
        let hint = element
            .name
            .as_deref()
            .or(element.label.as_deref())
            .unwrap_or_default()
            .to_lowercase();
        if ["amount", "price", "balance", "total", "cost"]
            .iter()
            .any(|k| hint.contains(k))
        {
            Self::Amount
        } else if hint.contains("email") {
            Self::Email
        } else if hint.contains("phone") {
            Self::Phone
        } else if hint.contains("date") {
            Self::Date
        } else {
            Self::Text
        }
    }
}

/// Generate a value suited to the element
pub fn value_for(element: &ElementHandle, rng: &mut Rng) -> String {
    match FieldKind::classify(element) {
        FieldKind::Number => rng.int(-1_000, 1_000_000).to_string(),
        FieldKind::Amount => format!("{}.{:02}", rng.int(0, 99_999), rng.int(0, 99)),
        FieldKind::Email => format!("{}@{}.com", rng.string(8), rng.string(6)),
        FieldKind::Date => format!(
            "{:04}-{:02}-{:02}",
            rng.int(1990, 2035),
            rng.int(1, 12),
            rng.int(1, 28)
        ),
        FieldKind::Phone => format!(
            "+1-{:03}-{:03}-{:04}",
            rng.int(200, 999),
            rng.int(200, 999),
            rng.int(0, 9999)
        ),
        FieldKind::Url => format!("https://{}.example.com/{}", rng.string(8), rng.string(5)),
        FieldKind::Password => format!("{}A1!", rng.string(12)),
        FieldKind::Text => {
            let len = rng.int(3, 16) as usize;
            rng.string(len)
        }
    }
}
