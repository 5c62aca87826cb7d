use std::collections::BTreeSet;

/// Tag that selects every active subscriber regardless of interests.
pub const ALL_TAG: &str = "all";

const MAX_TAG_LENGTH: usize = 64;

/// Normalized set of interest tags attached to a subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Interests(BTreeSet<String>);

impl Interests {
    pub fn parse(tags: Vec<String>) -> Result<Interests, String> {
        let mut set = BTreeSet::new();

        for tag in tags {
            let tag = tag.trim().to_lowercase();

            if tag.is_empty() {
                continue;
            }
            if tag.len() > MAX_TAG_LENGTH || tag.chars().any(char::is_whitespace) {
                return Err(format!("{} is not a valid interest tag", tag));
            }

            set.insert(tag);
        }

        Ok(Self(set))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

/// Which subscribers a campaign targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AudienceSelector {
    #[default]
    All,
    Interests(Interests),
}

impl AudienceSelector {
    /// An empty tag list, or one containing `all`, selects everybody.
    pub fn parse(tags: Vec<String>) -> Result<AudienceSelector, String> {
        let interests = Interests::parse(tags)?;

        if interests.is_empty() || interests.contains(ALL_TAG) {
            return Ok(AudienceSelector::All);
        }

        Ok(AudienceSelector::Interests(interests))
    }

    pub fn matches(&self, interests: &Interests) -> bool {
        match self {
            AudienceSelector::All => true,
            AudienceSelector::Interests(wanted) => wanted.iter().any(|tag| interests.contains(tag)),
        }
    }

    pub fn tags(&self) -> Vec<String> {
        match self {
            AudienceSelector::All => vec![ALL_TAG.to_string()],
            AudienceSelector::Interests(interests) => interests.to_vec(),
        }
    }
}

impl serde::Serialize for AudienceSelector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.tags(), serializer)
    }
}
