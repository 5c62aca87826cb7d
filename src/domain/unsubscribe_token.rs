use rand::Rng;

const TOKEN_LENGTH: usize = 32;

/// Opaque token printed in unsubscribe links. Issued once per subscriber and never rotated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct UnsubscribeToken(String);

impl UnsubscribeToken {
    pub fn generate() -> UnsubscribeToken {
        let mut rng = rand::thread_rng();

        let token = std::iter::repeat_with(|| rng.sample(rand::distributions::Alphanumeric))
            .map(char::from)
            .take(TOKEN_LENGTH)
            .collect();

        Self(token)
    }

    pub fn parse(token: String) -> Result<UnsubscribeToken, String> {
        let token = token.trim();

        if token.len() != TOKEN_LENGTH || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("unsubscribe token is malformed".to_string());
        }

        Ok(Self(token.to_string()))
    }
}

impl AsRef<str> for UnsubscribeToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
