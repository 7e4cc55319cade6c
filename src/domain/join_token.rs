use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// 22 characters from a 62-symbol alphabet is a little over 130 bits.
pub const TOKEN_LENGTH: usize = 22;

/// Opaque capability bound to one spreadsheet configuration.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JoinToken(String);

impl JoinToken {
    /// Accepts only well-formed tokens. Anything else can never have been
    /// issued, so callers treat `None` as "not found".
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed =
            raw.len() == TOKEN_LENGTH && raw.bytes().all(|b| b.is_ascii_alphanumeric());
        well_formed.then(|| JoinToken(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JoinToken {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        JoinToken::parse(&raw).ok_or_else(|| "malformed join token".to_string())
    }
}

impl From<JoinToken> for String {
    fn from(token: JoinToken) -> Self {
        token.0
    }
}

impl Display for JoinToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Tokens end up in logs through #[instrument]; only show a prefix there.
impl Debug for JoinToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "JoinToken({prefix}…)")
    }
}

pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> JoinToken;
}

/// Draws tokens from the thread-local CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> JoinToken {
        let raw: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        JoinToken(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_token_is_well_formed() {
        let token = RandomTokenGenerator.generate();
        assert_eq!(token.as_str().len(), TOKEN_LENGTH);
        assert_eq!(JoinToken::parse(token.as_str()), Some(token));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let tokens: HashSet<_> = (0..10_000).map(|_| RandomTokenGenerator.generate()).collect();
        assert_eq!(tokens.len(), 10_000);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(JoinToken::parse(""), None);
        assert_eq!(JoinToken::parse("nonexistent-token"), None);
        assert_eq!(JoinToken::parse("abcdefghijklmnopqrstu"), None); // 21 chars
        assert_eq!(JoinToken::parse("abcdefghijklmnopqrstu-"), None);
        assert_eq!(JoinToken::parse("abcdefghijklmnopqrstuvw"), None); // 23 chars
    }

    #[test]
    fn test_debug_hides_most_of_the_token() {
        let token = JoinToken::parse("AbCd567890123456789012").unwrap();
        assert_eq!(format!("{:?}", token), "JoinToken(AbCd…)");
    }

    #[test]
    fn test_debug_prefix_respects_char_boundaries() {
        assert_eq!(format!("{:?}", JoinToken("ab".into())), "JoinToken(ab…)");
        assert_eq!(format!("{:?}", JoinToken("ééééé".into())), "JoinToken(éééé…)");
    }

    #[test]
    fn test_deserialize_goes_through_parse() {
        let token: JoinToken = serde_json::from_str("\"AbCd567890123456789012\"").unwrap();
        assert_eq!(token.as_str(), "AbCd567890123456789012");
        assert_eq!(
            serde_json::to_string(&token).unwrap(),
            "\"AbCd567890123456789012\""
        );

        assert!(serde_json::from_str::<JoinToken>("\"ééééé\"").is_err());
        assert!(serde_json::from_str::<JoinToken>("\"short\"").is_err());
    }
}
