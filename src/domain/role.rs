use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Permission level granted on a spreadsheet. The lowercase form is what the
/// Drive permissions API expects.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[default]
    Writer,
    Reader,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Writer.to_string(), "writer");
        assert_eq!(Role::Reader.to_string(), "reader");
    }

    #[test]
    fn test_role_as_ref_matches_display() {
        for role in [Role::Writer, Role::Reader] {
            assert_eq!(role.as_ref(), role.to_string());
        }
        assert_eq!(Role::Reader.as_ref(), "reader");
    }

    #[test]
    fn test_role_from_str_is_case_insensitive() {
        assert_eq!(Role::from_str("WRITER").unwrap(), Role::Writer);
        assert_eq!(Role::from_str("reader").unwrap(), Role::Reader);
        assert!(Role::from_str("owner").is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Reader).unwrap();
        assert_eq!(json, "\"reader\"");
        let role: Role = serde_json::from_str("\"writer\"").unwrap();
        assert_eq!(role, Role::Writer);
    }
}
