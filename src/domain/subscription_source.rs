/// Where a subscription came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionSource {
    #[default]
    Website,
    Manual,
    Import,
    Api,
}

impl SubscriptionSource {
    pub fn parse(source: String) -> Result<SubscriptionSource, String> {
        match source.to_lowercase().as_str() {
            "website" => Ok(SubscriptionSource::Website),
            "manual" => Ok(SubscriptionSource::Manual),
            "import" => Ok(SubscriptionSource::Import),
            "api" => Ok(SubscriptionSource::Api),
            _ => Err(format!("{} is not a valid subscription source", source)),
        }
    }

    pub fn parse_optional(source: Option<String>) -> Result<SubscriptionSource, String> {
        source.map(Self::parse).unwrap_or(Ok(Self::default()))
    }
}

impl AsRef<str> for SubscriptionSource {
    fn as_ref(&self) -> &str {
        match self {
            SubscriptionSource::Website => "website",
            SubscriptionSource::Manual => "manual",
            SubscriptionSource::Import => "import",
            SubscriptionSource::Api => "api",
        }
    }
}
