//! The end user's consent decision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ConsentError, Group};

/// The resolved value a user chose to release for a claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Selection {
    /// The user explicitly declined to release the claim. Serialized as -1.
    Declined,

    /// Zero-based position in the claim's resolved values.
    Index(usize),
}

impl Selection {
    /// The selected position, if not declined.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Declined => None,
            Self::Index(index) => Some(index),
        }
    }
}

impl TryFrom<i64> for Selection {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == -1 {
            return Ok(Self::Declined);
        }
        usize::try_from(value).map(Self::Index).map_err(|_| format!("index {value} is not valid"))
    }
}

impl From<Selection> for i64 {
    fn from(selection: Selection) -> Self {
        match selection {
            Selection::Declined => -1,
            Selection::Index(index) => Self::try_from(index).unwrap_or(Self::MAX),
        }
    }
}

/// Selections for one release target.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AcceptedGroup {
    /// Selected values for plain claims.
    #[serde(default)]
    pub claims: BTreeMap<String, Selection>,

    /// Selected assertion claims.
    #[serde(default)]
    pub assertions: BTreeMap<String, Selection>,
}

/// A consent decision.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Accepted {
    /// Selections for the ID token.
    pub id_token: AcceptedGroup,

    /// Selections for the userinfo endpoint.
    pub userinfo: AcceptedGroup,

    /// Scopes the user approved.
    pub approved_scopes: Vec<String>,

    /// When the decision was made.
    pub accepted_at: DateTime<Utc>,
}

impl Accepted {
    /// Create a decision made now.
    #[must_use]
    pub fn new(id_token: AcceptedGroup, userinfo: AcceptedGroup, approved_scopes: Vec<String>) -> Self {
        Self {
            id_token,
            userinfo,
            approved_scopes,
            accepted_at: Utc::now(),
        }
    }

    /// Parse and validate a consent decision submitted by the user agent.
    ///
    /// Each group holds `claims` and `assertions` maps of claim name to
    /// selected index (`-1` to decline). When a map is absent, the legacy
    /// `approved_claims` and `approved_assertions` name lists are used, each
    /// selecting the first value.
    ///
    /// # Errors
    ///
    /// Returns `ConsentError::Malformed` describing the first invalid
    /// element.
    pub fn from_value(value: &Value) -> Result<Self, ConsentError> {
        let Some(object) = value.as_object() else {
            return Err(malformed("decision must be an object".into()));
        };

        let id_token = group_object(object.get("id_token"), "id_token must be an object")?;
        let userinfo = group_object(object.get("userinfo"), "userinfo must be an object")?;
        let approved_scopes = match object.get("approved_scopes") {
            Some(scopes) => string_array(scopes, "approved_scopes")?,
            None => return Err(malformed("approved_scopes must be an array of strings".into())),
        };

        Ok(Self::new(
            AcceptedGroup::from_object(Group::IdToken, &id_token)?,
            AcceptedGroup::from_object(Group::Userinfo, &userinfo)?,
            approved_scopes,
        ))
    }

    /// Selections for `group`.
    #[must_use]
    pub const fn group(&self, group: Group) -> &AcceptedGroup {
        match group {
            Group::IdToken => &self.id_token,
            Group::Userinfo => &self.userinfo,
        }
    }
}

impl AcceptedGroup {
    fn from_object(at: Group, object: &Map<String, Value>) -> Result<Self, ConsentError> {
        let approved_claims = legacy(object.get("approved_claims"), "approved_claims")?;
        let approved_assertions = legacy(object.get("approved_assertions"), "approved_assertions")?;

        Ok(Self {
            claims: selections(object.get("claims"), "claims", at)?.unwrap_or(approved_claims),
            assertions: selections(object.get("assertions"), "assertions", at)?
                .unwrap_or(approved_assertions),
        })
    }
}

// An absent or null group is empty.
fn group_object(value: Option<&Value>, message: &str) -> Result<Map<String, Value>, ConsentError> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(object)) => Ok(object.clone()),
        Some(_) => Err(malformed(message.into())),
    }
}

fn legacy(value: Option<&Value>, field: &str) -> Result<BTreeMap<String, Selection>, ConsentError> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let names = string_array(value, field)?;
    Ok(names.into_iter().map(|name| (name, Selection::Index(0))).collect())
}

fn selections(
    value: Option<&Value>, field: &str, at: Group,
) -> Result<Option<BTreeMap<String, Selection>>, ConsentError> {
    let object = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(object)) => object,
        Some(_) => return Err(malformed(format!("{field} must be an object"))),
    };
    let kind = if field == "assertions" { "assertion claim" } else { "claim" };

    let mut selected = BTreeMap::new();
    for (key, index) in object {
        let Some(selection) = index.as_i64().and_then(|n| Selection::try_from(n).ok()) else {
            return Err(malformed(format!("index {index} is not valid for {key} {kind} at {at}")));
        };
        selected.insert(key.clone(), selection);
    }
    Ok(Some(selected))
}

fn string_array(value: &Value, field: &str) -> Result<Vec<String>, ConsentError> {
    let error = || malformed(format!("{field} must be an array of strings"));
    let Some(items) = value.as_array() else {
        return Err(error());
    };
    items.iter().map(|item| item.as_str().map(ToString::to_string).ok_or_else(error)).collect()
}

fn malformed(message: String) -> ConsentError {
    ConsentError::Malformed(message)
}
