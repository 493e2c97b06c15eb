//! Locale-aware number formatting.
//!
//! Only the separators matter for the panel: the decimal mark and the
//! thousands grouping character of the user's language.

use std::str::FromStr;

use unic_langid::LanguageIdentifier;

/// Decimal and grouping separators for a locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLocale {
    /// Normalized BCP-47 tag, e.g. `de-DE`
    tag: String,
    /// Decimal mark
    decimal: char,
    /// Thousands separator
    group: char,
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self::english()
    }
}

impl NumberLocale {
    /// Plain English formatting (`1,013.5`).
    pub fn english() -> Self {
        Self {
            tag: "en".to_string(),
            decimal: '.',
            group: ',',
        }
    }

    /// Build from a locale tag as reported by the system or the user.
    ///
    /// Accepts POSIX style tags (`de_DE.UTF-8`) as well as BCP-47 ones.
    /// Unparseable tags and the `C`/`POSIX` locales fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        let normalized = normalize_tag(tag);
        let Ok(langid) = LanguageIdentifier::from_str(&normalized) else {
            tracing::debug!("Unrecognized locale tag '{}', using English", tag);
            return Self::english();
        };

        let language = langid.language.as_str();
        let region = langid.region.as_ref().map(|r| r.as_str());

        let (decimal, group) = match (language, region) {
            ("de" | "it" | "fr", Some("CH")) => ('.', '\u{2019}'),
            ("fr", _) => (',', '\u{202F}'),
            ("de" | "es" | "it" | "nl" | "pt" | "id" | "tr" | "da" | "el" | "ro" | "sl" | "hr" | "sr", _) => {
                (',', '.')
            }
            ("ru" | "uk" | "pl" | "cs" | "sk" | "sv" | "fi" | "nb" | "no" | "hu" | "bg" | "lt" | "lv" | "et", _) => {
                (',', '\u{00A0}')
            }
            _ => ('.', ','),
        };

        Self {
            tag: langid.to_string(),
            decimal,
            group,
        }
    }

    /// Locale of the running system, English when it cannot be determined.
    pub fn system() -> Self {
        sys_locale::get_locale()
            .map(|tag| Self::from_tag(&tag))
            .unwrap_or_else(Self::english)
    }

    /// Normalized locale tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Language subtag only (`de` for `de-DE`), as providers expect it.
    pub fn language(&self) -> &str {
        self.tag.split('-').next().unwrap_or("en")
    }

    /// Format a number with exactly `decimals` fractional digits.
    ///
    /// Negative values use the Unicode minus sign (U+2212).
    pub fn format(&self, value: f64, decimals: u8) -> String {
        let fixed = format!("{:.*}", decimals as usize, value.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (fixed.as_str(), None),
        };

        let mut out = String::with_capacity(fixed.len() + 4);
        // "-0.0" is printed as plain zero
        let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
        if value.is_sign_negative() && !is_zero {
            out.push('\u{2212}');
        }

        let digits = int_part.len();
        for (i, c) in int_part.chars().enumerate() {
            if i > 0 && (digits - i) % 3 == 0 {
                out.push(self.group);
            }
            out.push(c);
        }

        if let Some(frac) = frac_part {
            out.push(self.decimal);
            out.push_str(frac);
        }

        out
    }
}

/// Turn `de_DE.UTF-8@euro` into `de-DE`; map C/POSIX to English.
fn normalize_tag(tag: &str) -> String {
    let base = tag
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base.eq_ignore_ascii_case("c") || base.eq_ignore_ascii_case("posix") {
        return "en".to_string();
    }

    base.replace('_', "-")
}
