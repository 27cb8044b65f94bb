use serde::{Deserialize, Serialize};

use crate::{Error, Heuristic};

/// Settings for a [`GlyphCacheRegion`](crate::GlyphCacheRegion).
///
/// Every field has a default, so a JSON document only needs the values it
/// changes:
///
/// ```
/// let options = glyph_packer::RegionOptions::from_json(r#"{ "width": 512 }"#).unwrap();
/// assert_eq!(options.width, 512);
/// assert_eq!(options.height, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionOptions {
    pub width: u32,
    pub height: u32,
    /// Lets the packer place glyph slots transposed.
    pub allow_rotations: bool,
    pub heuristic: Heuristic,
    /// Free list length above which the region asks to be compacted.
    pub compaction_threshold: usize,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            allow_rotations: false,
            heuristic: Heuristic::BottomLeftRule,
            compaction_threshold: 100,
        }
    }
}

impl RegionOptions {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let options = RegionOptions::from_json("{}").unwrap();
        assert_eq!(options, RegionOptions::default());
    }

    #[test]
    fn overrides_selected_fields() {
        let options = RegionOptions::from_json(
            r#"{
                "width": 256,
                "allow_rotations": true,
                "heuristic": "ContactPointRule",
                "compaction_threshold": 8
            }"#,
        )
        .unwrap();
        assert_eq!(options.width, 256);
        assert_eq!(options.height, 1024);
        assert!(options.allow_rotations);
        assert_eq!(options.heuristic, Heuristic::ContactPointRule);
        assert_eq!(options.compaction_threshold, 8);
    }

    #[test]
    fn rejects_unknown_heuristic() {
        let err = RegionOptions::from_json(r#"{ "heuristic": "Skyline" }"#).unwrap_err();
        assert!(matches!(err, Error::Options(_)));
    }
}
