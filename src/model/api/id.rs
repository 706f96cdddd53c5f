use std::{fmt, str::FromStr};

use mongodb::bson::oid::Error as OidError;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::model::mongodb::Id;

/// An answer sheet ID as clients see it: 24 hex digits.
///
/// [`Id`] itself serializes as `{"$oid": "..."}`, which is only meant for the
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetId(Id);

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SheetId {
    type Err = OidError;

    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        hex.parse().map(Self)
    }
}

impl From<Id> for SheetId {
    fn from(id: Id) -> Self {
        Self(id)
    }
}

impl From<SheetId> for Id {
    fn from(id: SheetId) -> Self {
        id.0
    }
}

impl Serialize for SheetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SheetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse()
            .map_err(|err| D::Error::custom(format!("invalid answer sheet ID `{hex}`: {err}")))
    }
}
