use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Mvp,
    Feature,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Mvp => "mvp",
            Scope::Feature => "feature",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = crate::error::ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mvp" => Ok(Scope::Mvp),
            "feature" => Ok(Scope::Feature),
            _ => Err(crate::error::ForgeError::Validation(format!(
                "invalid scope '{s}': expected mvp or feature"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ScaleLevel
// ---------------------------------------------------------------------------

/// Controls which folder/template structure is built for a feature.
/// The file set at level N is always a superset of the set at level N-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScaleLevel {
    Sketch,
    Minimal,
    Standard,
    Extended,
    Full,
}

impl ScaleLevel {
    pub fn all() -> &'static [ScaleLevel] {
        &[
            ScaleLevel::Sketch,
            ScaleLevel::Minimal,
            ScaleLevel::Standard,
            ScaleLevel::Extended,
            ScaleLevel::Full,
        ]
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(n: u8) -> crate::error::Result<Self> {
        match n {
            0 => Ok(ScaleLevel::Sketch),
            1 => Ok(ScaleLevel::Minimal),
            2 => Ok(ScaleLevel::Standard),
            3 => Ok(ScaleLevel::Extended),
            4 => Ok(ScaleLevel::Full),
            _ => Err(crate::error::ForgeError::InvalidScaleLevel(n)),
        }
    }
}

impl TryFrom<u8> for ScaleLevel {
    type Error = crate::error::ForgeError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        ScaleLevel::from_u8(n)
    }
}

impl From<ScaleLevel> for u8 {
    fn from(level: ScaleLevel) -> u8 {
        level.as_u8()
    }
}

impl fmt::Display for ScaleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// FeatureStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Active,
    Completed,
    Archived,
}

impl FeatureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureStatus::Active => "active",
            FeatureStatus::Completed => "completed",
            FeatureStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeatureStatus {
    type Err = crate::error::ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(FeatureStatus::Active),
            "completed" => Ok(FeatureStatus::Completed),
            "archived" => Ok(FeatureStatus::Archived),
            _ => Err(crate::error::ForgeError::Validation(format!(
                "invalid feature status '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// StoryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl StoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StoryStatus::Todo => "todo",
            StoryStatus::InProgress => "in_progress",
            StoryStatus::Done => "done",
            StoryStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoryStatus {
    type Err = crate::error::ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(StoryStatus::Todo),
            "in_progress" => Ok(StoryStatus::InProgress),
            "done" => Ok(StoryStatus::Done),
            "blocked" => Ok(StoryStatus::Blocked),
            _ => Err(crate::error::ForgeError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// DocType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Prd,
    Architecture,
    Changelog,
    Readme,
    MigrationGuide,
    Epic,
    Story,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocType::Prd => "prd",
            DocType::Architecture => "architecture",
            DocType::Changelog => "changelog",
            DocType::Readme => "readme",
            DocType::MigrationGuide => "migration_guide",
            DocType::Epic => "epic",
            DocType::Story => "story",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocType {
    type Err = crate::error::ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prd" => Ok(DocType::Prd),
            "architecture" => Ok(DocType::Architecture),
            "changelog" => Ok(DocType::Changelog),
            "readme" => Ok(DocType::Readme),
            "migration_guide" => Ok(DocType::MigrationGuide),
            "epic" => Ok(DocType::Epic),
            "story" => Ok(DocType::Story),
            _ => Err(crate::error::ForgeError::Validation(format!(
                "invalid document type '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn scale_level_ordering() {
        assert!(ScaleLevel::Sketch < ScaleLevel::Minimal);
        assert!(ScaleLevel::Standard < ScaleLevel::Extended);
        assert!(ScaleLevel::Full > ScaleLevel::Sketch);
    }

    #[test]
    fn scale_level_from_u8_roundtrip() {
        for n in 0..=4u8 {
            let level = ScaleLevel::from_u8(n).unwrap();
            assert_eq!(level.as_u8(), n);
        }
    }

    #[test]
    fn scale_level_out_of_range() {
        assert!(ScaleLevel::from_u8(5).is_err());
        assert!(ScaleLevel::from_u8(255).is_err());
    }

    #[test]
    fn story_status_roundtrip() {
        for status in [
            StoryStatus::Todo,
            StoryStatus::InProgress,
            StoryStatus::Done,
            StoryStatus::Blocked,
        ] {
            let parsed = StoryStatus::from_str(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn story_status_rejects_unknown() {
        assert!(StoryStatus::from_str("cancelled").is_err());
    }

    #[test]
    fn scope_parse() {
        assert_eq!(Scope::from_str("mvp").unwrap(), Scope::Mvp);
        assert_eq!(Scope::from_str("feature").unwrap(), Scope::Feature);
        assert!(Scope::from_str("epic").is_err());
    }

    #[test]
    fn doc_type_roundtrip() {
        for dt in [
            DocType::Prd,
            DocType::Architecture,
            DocType::Changelog,
            DocType::Readme,
            DocType::MigrationGuide,
            DocType::Epic,
            DocType::Story,
        ] {
            assert_eq!(DocType::from_str(dt.as_str()).unwrap(), dt);
        }
    }
}
