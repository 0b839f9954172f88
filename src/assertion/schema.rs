//! Value schemas used to type assertion operands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Describes the shape of a claim value so assertion operands can be
/// converted before comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schema {
    /// Plain text, compared lexically.
    String,

    /// Decimal amount held as text (e.g. "123.00"), compared numerically.
    Decimal,

    /// Phone number, normalized to E.164 before comparison.
    PhoneNumber,

    /// ISO-8601 date, compared lexically.
    Date,

    /// JSON number.
    Number,

    /// JSON boolean.
    Boolean,

    /// Object with typed properties.
    Object {
        /// Schemas for the object's properties.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        properties: BTreeMap<String, Self>,
    },

    /// Untyped: operands are compared as given.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Schema {
    /// The schema of property `name`. Untyped when this is not an object
    /// schema or the property is not described.
    #[must_use]
    pub fn property(&self, name: &str) -> Self {
        match self {
            Self::Object { properties } => properties.get(name).cloned().unwrap_or_default(),
            _ => Self::Unknown,
        }
    }
}
