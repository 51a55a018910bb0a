//! FILENAME: core/analytics/src/normalize.rs
//! Category normalization for the free-text discipline field.
//!
//! Disciplines are stored as free text, and members of one hierarchical
//! family are encoded as `"<family>-<subcategory>"`. The string is parsed
//! once here into a [`Category`], so call sites never re-split it.

use crate::definition::FamilyRule;

/// A discipline label after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category<'a> {
    /// Missing or blank discipline.
    Unspecified,
    /// Any discipline outside the family, kept verbatim.
    Literal(&'a str),
    /// A family member; `sub` is its sub-category (never empty).
    Family { family: &'a str, sub: &'a str },
}

impl<'a> Category<'a> {
    /// Top-level grouping key. Family members collapse into the family label.
    pub fn key(&self, unspecified_label: &'a str) -> &'a str {
        match *self {
            Category::Unspecified => unspecified_label,
            Category::Literal(label) => label,
            Category::Family { family, .. } => family,
        }
    }

    pub fn is_family(&self) -> bool {
        matches!(self, Category::Family { .. })
    }

    /// Sub-category key, only for family members.
    pub fn sub_key(&self) -> Option<&'a str> {
        match *self {
            Category::Family { sub, .. } => Some(sub),
            _ => None,
        }
    }
}

/// Classifies a discipline label. Never fails: blank input is unspecified,
/// a family member without a sub-category gets the rule's fallback.
pub fn normalize<'a>(discipline: Option<&'a str>, rule: &'a FamilyRule) -> Category<'a> {
    let discipline = match discipline.map(str::trim) {
        Some(d) if !d.is_empty() => d,
        _ => return Category::Unspecified,
    };

    if rule.prefix.is_empty() || !discipline.starts_with(rule.prefix.as_str()) {
        return Category::Literal(discipline);
    }

    let sub = if rule.separator.is_empty() {
        None
    } else {
        discipline
            .split_once(rule.separator.as_str())
            .map(|(_, rest)| rest.trim())
            .filter(|rest| !rest.is_empty())
    };

    Category::Family {
        family: rule.prefix.as_str(),
        sub: sub.unwrap_or(rule.fallback_subcategory.as_str()),
    }
}
