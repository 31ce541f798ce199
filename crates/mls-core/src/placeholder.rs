//! Placeholder rendering: a pure mapping from load state to visual output.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::request::LoadState;

/// Interim visual shown while an asset has not painted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderType {
    /// Blurred low-quality copy of the asset.
    Blur,
    /// Animated shimmer sweep.
    #[default]
    Shimmer,
    /// Static skeleton block.
    Skeleton,
    /// No interim visual at all.
    None,
}

/// What the host should paint for a request right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visual {
    /// Nothing yet and no placeholder configured.
    Empty,
    /// The configured placeholder.
    Placeholder(PlaceholderType),
    /// The loaded asset, cross-fading in over `fade` while the placeholder
    /// fades out. A zero duration means paint immediately with no animation.
    CrossFade { src: String, fade: Duration },
    /// The loaded asset, fully settled.
    Settled { src: String },
    /// Terminal failure: descriptive text, never a blank region.
    Error { description: String },
}

/// Renders the visual for a state. `active_src` is the source of the current
/// generation; `description` is the element's descriptive (alt) text.
pub fn render(
    state: LoadState,
    placeholder: PlaceholderType,
    fade_in: Duration,
    active_src: &str,
    description: &str,
) -> Visual {
    match state {
        LoadState::Pending
        | LoadState::Observing
        | LoadState::Loading
        | LoadState::Retrying
        | LoadState::Fallback => {
            if placeholder == PlaceholderType::None {
                Visual::Empty
            } else {
                Visual::Placeholder(placeholder)
            }
        }
        LoadState::Loaded => {
            if fade_in.is_zero() {
                // Reduced-motion: skip the animation entirely.
                Visual::Settled {
                    src: active_src.to_string(),
                }
            } else {
                Visual::CrossFade {
                    src: active_src.to_string(),
                    fade: fade_in,
                }
            }
        }
        LoadState::Failed => Visual::Error {
            description: description.to_string(),
        },
    }
}
