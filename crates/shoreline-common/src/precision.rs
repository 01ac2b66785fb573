//! Channel precision of the float state textures.

use serde::{Deserialize, Serialize};

/// Bits per channel of the height and particle textures.
///
/// There is no implicit downgrade: a pipeline uses `Half` only when it is
/// requested directly or named as the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TexelPrecision {
    /// 32-bit float channels
    #[default]
    Full,
    /// 16-bit float channels
    Half,
}
