// SPDX-License-Identifier: GPL-3.0-only

//! Preview aspect ratio selection

use crate::constants::{RATIO_4_3_VALUE, RATIO_16_9_VALUE, resolution};
use serde::{Deserialize, Serialize};

/// The two aspect ratios the capture streams are configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 4:3
    Ratio4x3,
    /// 16:9
    Ratio16x9,
}

impl AspectRatio {
    /// Pick the supported ratio closest to the given screen dimensions
    ///
    /// Orientation does not matter: the long edge is always divided by the
    /// short edge. Ties go to 4:3. A zero dimension also yields 4:3.
    pub fn nearest(width: u32, height: u32) -> Self {
        let long = width.max(height);
        let short = width.min(height);
        if short == 0 {
            return AspectRatio::Ratio4x3;
        }

        let preview_ratio = long as f64 / short as f64;
        if (preview_ratio - RATIO_4_3_VALUE).abs() <= (preview_ratio - RATIO_16_9_VALUE).abs() {
            AspectRatio::Ratio4x3
        } else {
            AspectRatio::Ratio16x9
        }
    }

    /// Long edge divided by short edge
    pub fn value(&self) -> f64 {
        match self {
            AspectRatio::Ratio4x3 => RATIO_4_3_VALUE,
            AspectRatio::Ratio16x9 => RATIO_16_9_VALUE,
        }
    }

    /// Landscape capture resolution requested from the camera for this ratio
    pub fn target_resolution(&self) -> (u32, u32) {
        match self {
            AspectRatio::Ratio4x3 => resolution::TARGET_4_3,
            AspectRatio::Ratio16x9 => resolution::TARGET_16_9,
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AspectRatio::Ratio4x3 => write!(f, "4:3"),
            AspectRatio::Ratio16x9 => write!(f, "16:9"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portrait_phone_is_16_9() {
        assert_eq!(AspectRatio::nearest(1080, 1920), AspectRatio::Ratio16x9);
    }

    #[test]
    fn test_exact_4_3() {
        assert_eq!(AspectRatio::nearest(480, 640), AspectRatio::Ratio4x3);
        assert_eq!(AspectRatio::nearest(640, 480), AspectRatio::Ratio4x3);
    }

    #[test]
    fn test_symmetric_under_swap() {
        for (w, h) in [(1, 1), (720, 1280), (1440, 3120), (1536, 2048), (800, 1280), (3, 5)] {
            assert_eq!(AspectRatio::nearest(w, h), AspectRatio::nearest(h, w), "{}x{}", w, h);
        }
    }

    #[test]
    fn test_matches_distance_rule() {
        for w in (1..400).step_by(7) {
            for h in (1..400).step_by(11) {
                let ratio = w.max(h) as f64 / w.min(h) as f64;
                let expect_4_3 =
                    (ratio - RATIO_4_3_VALUE).abs() <= (ratio - RATIO_16_9_VALUE).abs();
                let expected = if expect_4_3 {
                    AspectRatio::Ratio4x3
                } else {
                    AspectRatio::Ratio16x9
                };
                assert_eq!(AspectRatio::nearest(w, h), expected, "{}x{}", w, h);
            }
        }
    }

    #[test]
    fn test_square_and_extreme_ratios() {
        // 1.0 is closer to 4:3, very wide panels are closer to 16:9
        assert_eq!(AspectRatio::nearest(500, 500), AspectRatio::Ratio4x3);
        assert_eq!(AspectRatio::nearest(3440, 1440), AspectRatio::Ratio16x9);
    }

    #[test]
    fn test_zero_dimension() {
        assert_eq!(AspectRatio::nearest(0, 1080), AspectRatio::Ratio4x3);
        assert_eq!(AspectRatio::nearest(0, 0), AspectRatio::Ratio4x3);
    }

    #[test]
    fn test_target_resolution_matches_ratio() {
        for ratio in [AspectRatio::Ratio4x3, AspectRatio::Ratio16x9] {
            let (w, h) = ratio.target_resolution();
            assert_eq!(AspectRatio::nearest(w, h), ratio);
        }
    }
}
