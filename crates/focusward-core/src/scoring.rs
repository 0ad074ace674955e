//! Session scoring.
//!
//! A deterministic, side-effect free evaluation of a finished focus
//! session. The score starts at 100 and is reduced by every tab switch,
//! every distracting visit and every minute spent on a distracting site.
//! Sessions that were never paused earn a bonus before clamping.
//!
//! ```text
//! score = clamp(100 - 5*switches - 10*visits - round(secs/60) + 10*!interrupted, 0, 100)
//! ```

use serde::{Deserialize, Serialize};

use crate::session::Session;

const BASE_SCORE: i64 = 100;
const TAB_SWITCH_PENALTY: i64 = 5;
const DISTRACTION_VISIT_PENALTY: i64 = 10;
const UNINTERRUPTED_BONUS: i64 = 10;

/// Quality band a score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityLabel {
    #[serde(rename = "Deep Work")]
    DeepWork,
    Focused,
    Fragmented,
    Distracted,
}

impl QualityLabel {
    /// Map a score to its tier, highest threshold first.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => QualityLabel::DeepWork,
            70..=89 => QualityLabel::Focused,
            40..=69 => QualityLabel::Fragmented,
            _ => QualityLabel::Distracted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::DeepWork => "Deep Work",
            QualityLabel::Focused => "Focused",
            QualityLabel::Fragmented => "Fragmented",
            QualityLabel::Distracted => "Distracted",
        }
    }
}

impl std::fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of scoring a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScore {
    pub score: u8,
    pub quality_label: QualityLabel,
}

/// Score a session from its accumulated metrics.
pub fn score(session: &Session) -> SessionScore {
    score_metrics(
        session.tab_switch_count,
        session.distraction_visits,
        session.distraction_seconds,
        session.interrupted,
    )
}

/// Score raw metrics. Exposed separately so callers holding only
/// counters (e.g. a preview in the presentation layer) can reuse it.
pub fn score_metrics(
    tab_switches: u64,
    distraction_visits: u64,
    distraction_seconds: u64,
    interrupted: bool,
) -> SessionScore {
    let switches = saturating_i64(tab_switches).saturating_mul(TAB_SWITCH_PENALTY);
    let visits = saturating_i64(distraction_visits).saturating_mul(DISTRACTION_VISIT_PENALTY);
    // Round half up, matching how minutes are displayed.
    let minutes = saturating_i64(distraction_seconds.saturating_add(30) / 60);
    let bonus = if interrupted { 0 } else { UNINTERRUPTED_BONUS };

    let raw = BASE_SCORE
        .saturating_sub(switches)
        .saturating_sub(visits)
        .saturating_sub(minutes)
        .saturating_add(bonus);
    let score = raw.clamp(0, 100) as u8;

    SessionScore {
        score,
        quality_label: QualityLabel::from_score(score),
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clean_uninterrupted_session_is_clamped_to_100() {
        let result = score_metrics(0, 0, 0, false);
        assert_eq!(result.score, 100);
        assert_eq!(result.quality_label, QualityLabel::DeepWork);
    }

    #[test]
    fn mixed_session_scores_77() {
        let result = score_metrics(2, 1, 180, true);
        assert_eq!(result.score, 77);
        assert_eq!(result.quality_label, QualityLabel::Focused);
    }

    #[test]
    fn distraction_minutes_round_half_up() {
        assert_eq!(score_metrics(0, 0, 89, true).score, 99);
        assert_eq!(score_metrics(0, 0, 90, true).score, 98);
        assert_eq!(score_metrics(0, 0, 29, true).score, 100);
    }

    #[test]
    fn tier_boundaries_are_exact() {
        assert_eq!(QualityLabel::from_score(100), QualityLabel::DeepWork);
        assert_eq!(QualityLabel::from_score(90), QualityLabel::DeepWork);
        assert_eq!(QualityLabel::from_score(89), QualityLabel::Focused);
        assert_eq!(QualityLabel::from_score(70), QualityLabel::Focused);
        assert_eq!(QualityLabel::from_score(69), QualityLabel::Fragmented);
        assert_eq!(QualityLabel::from_score(40), QualityLabel::Fragmented);
        assert_eq!(QualityLabel::from_score(39), QualityLabel::Distracted);
        assert_eq!(QualityLabel::from_score(0), QualityLabel::Distracted);
    }

    #[test]
    fn heavy_distraction_floors_at_zero() {
        let result = score_metrics(40, 40, 10_000, true);
        assert_eq!(result.score, 0);
        assert_eq!(result.quality_label, QualityLabel::Distracted);
    }

    #[test]
    fn huge_counters_do_not_overflow() {
        let result = score_metrics(u64::MAX, u64::MAX, u64::MAX, false);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn label_serializes_with_display_name() {
        let json = serde_json::to_string(&QualityLabel::DeepWork).unwrap();
        assert_eq!(json, "\"Deep Work\"");
        let back: QualityLabel = serde_json::from_str("\"Fragmented\"").unwrap();
        assert_eq!(back, QualityLabel::Fragmented);
    }

    proptest! {
        #[test]
        fn score_stays_in_range(
            switches in 0u64..1_000,
            visits in 0u64..1_000,
            secs in 0u64..1_000_000,
            interrupted in any::<bool>(),
        ) {
            let result = score_metrics(switches, visits, secs, interrupted);
            prop_assert!(result.score <= 100);
            prop_assert_eq!(result.quality_label, QualityLabel::from_score(result.score));
        }

        #[test]
        fn score_is_non_increasing_in_each_penalty(
            switches in 0u64..100,
            visits in 0u64..100,
            secs in 0u64..100_000,
            extra in 1u64..50,
            interrupted in any::<bool>(),
        ) {
            let base = score_metrics(switches, visits, secs, interrupted).score;
            prop_assert!(score_metrics(switches + extra, visits, secs, interrupted).score <= base);
            prop_assert!(score_metrics(switches, visits + extra, secs, interrupted).score <= base);
            prop_assert!(score_metrics(switches, visits, secs + extra * 60, interrupted).score <= base);
        }
    }
}
