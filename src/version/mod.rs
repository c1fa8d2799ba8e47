use std::fmt;

/// A translation release identifier of the form
/// `<targeted game version>-<translation version>-<build number>`,
/// e.g. `3.22.0-1.0-20240101`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionToken {
    targeted_game_version: String,
    version_number: String,
    build_number: String,
}

impl VersionToken {
    /// Parse a token. Surrounding whitespace is ignored; anything other than
    /// three non-empty `-`-separated parts is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.trim().split('-').collect();
        let [game, version, build] = parts.as_slice() else {
            return None;
        };
        if game.is_empty() || version.is_empty() || build.is_empty() {
            return None;
        }

        Some(Self {
            targeted_game_version: (*game).to_owned(),
            version_number: (*version).to_owned(),
            build_number: (*build).to_owned(),
        })
    }

    pub fn targeted_game_version(&self) -> &str {
        &self.targeted_game_version
    }

    pub fn version_number(&self) -> &str {
        &self.version_number
    }

    #[cfg(test)]
    pub fn build_number(&self) -> &str {
        &self.build_number
    }

    /// Ordering is decided by the build number alone. A build number that is
    /// not an integer never counts as newer.
    pub fn is_newer_than(&self, other: &VersionToken) -> bool {
        match (
            self.build_number.parse::<i64>(),
            other.build_number.parse::<i64>(),
        ) {
            (Ok(mine), Ok(theirs)) => mine > theirs,
            _ => false,
        }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.targeted_game_version, self.version_number, self.build_number
        )
    }
}
