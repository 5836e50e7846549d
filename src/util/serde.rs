//! Shared serializable domain types.

use serde::{Deserialize, Serialize};

/// Dispatch priority band for submitted tasks.
///
/// Higher bands dispatch before lower ones whenever the queue is non-empty;
/// within a band, tasks dispatch in enqueue order. There is no aging: a
/// continuous stream of high-priority work starves lower bands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work that can wait behind everything else.
    Low = 0,
    /// Default band for ordinary submissions.
    #[default]
    Normal = 1,
    /// Urgent work dispatched ahead of both other bands.
    High = 2,
}

impl Priority {
    /// Number of bands.
    pub const COUNT: usize = 3;

    /// All bands, lowest first.
    pub const ALL: [Self; Self::COUNT] = [Self::Low, Self::Normal, Self::High];

    /// Stable index for per-band arrays.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
