//! CP category model.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One of the three tracked life dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Mind,
    Body,
    Soul,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 3] = [Category::Mind, Category::Body, Category::Soul];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mind => "mind",
            Self::Body => "body",
            Self::Soul => "soul",
        }
    }

    /// Parses a category label, case-insensitive and trimmed.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mind" => Some(Self::Mind),
            "body" => Some(Self::Body),
            "soul" => Some(Self::Soul),
            _ => None,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Category;

    #[test]
    fn parse_accepts_mixed_case_labels() {
        assert_eq!(Category::parse(" Mind "), Some(Category::Mind));
        assert_eq!(Category::parse("SOUL"), Some(Category::Soul));
        assert_eq!(Category::parse("spirit"), None);
    }

    #[test]
    fn labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
    }
}
