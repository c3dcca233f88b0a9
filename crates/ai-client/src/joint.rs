//! Two-stage parser for joint-analysis responses: locate the literal
//! sentinel markers, then best-effort decode the machine-readable block
//! between them.

use analysis_core::RankedSignal;
use serde::{Deserialize, Serialize};

pub const JSON_DATA_START: &str = "### JSON_DATA_START";
pub const JSON_DATA_END: &str = "### JSON_DATA_END";

/// Parsed joint-analysis response. `Ranked` means the sentinel block
/// was present; its ranking list is empty when the inner payload did
/// not decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JointReport {
    Narrative { narrative: String },
    Ranked {
        narrative: String,
        ranking: Vec<RankedSignal>,
    },
}

impl JointReport {
    pub fn narrative(&self) -> &str {
        match self {
            JointReport::Narrative { narrative } => narrative,
            JointReport::Ranked { narrative, .. } => narrative,
        }
    }

    pub fn ranking(&self) -> &[RankedSignal] {
        match self {
            JointReport::Narrative { .. } => &[],
            JointReport::Ranked { ranking, .. } => ranking,
        }
    }
}

/// Split a joint response into narrative and embedded ranking. The
/// narrative is everything before the first sentinel (the whole text
/// when no sentinel pair is found); a ranking block that fails to
/// decode yields an empty list, never an error.
pub fn parse_joint_response(text: &str) -> JointReport {
    let Some(start) = text.find(JSON_DATA_START) else {
        return JointReport::Narrative {
            narrative: text.trim().to_string(),
        };
    };

    let inner_start = start + JSON_DATA_START.len();
    let Some(end_offset) = text[inner_start..].find(JSON_DATA_END) else {
        return JointReport::Narrative {
            narrative: text.trim().to_string(),
        };
    };

    let narrative = text[..start].trim().to_string();
    let inner = text[inner_start..inner_start + end_offset].trim();

    let ranking = match serde_json::from_str::<Vec<RankedSignal>>(inner) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Joint ranking block did not decode: {}", e);
            Vec::new()
        }
    };

    JointReport::Ranked { narrative, ranking }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_block_yields_narrative_and_ranking() {
        let text = "Summary text\n### JSON_DATA_START\n[{\"symbol\":\"X\",\"signal\":\"BUY\",\"score\":7}]\n### JSON_DATA_END";
        let report = parse_joint_response(text);

        assert_eq!(report.narrative(), "Summary text");
        assert_eq!(
            report.ranking(),
            &[RankedSignal {
                symbol: "X".to_string(),
                signal: "BUY".to_string(),
                score: 7,
            }]
        );
    }

    #[test]
    fn malformed_inner_block_keeps_the_narrative() {
        let text = "Summary text\n### JSON_DATA_START\nnot json at all\n### JSON_DATA_END";
        let report = parse_joint_response(text);

        assert_eq!(report.narrative(), "Summary text");
        assert!(report.ranking().is_empty());
        assert!(matches!(report, JointReport::Ranked { .. }));
    }

    #[test]
    fn missing_sentinels_mean_narrative_only() {
        let report = parse_joint_response("Just a plain strategy write-up.");
        assert_eq!(report.narrative(), "Just a plain strategy write-up.");
        assert!(matches!(report, JointReport::Narrative { .. }));
    }

    #[test]
    fn end_sentinel_before_start_is_treated_as_absent() {
        let text = "### JSON_DATA_END\nbody\n### JSON_DATA_START";
        let report = parse_joint_response(text);
        assert!(matches!(report, JointReport::Narrative { .. }));
    }

    #[test]
    fn trailing_whitespace_around_the_block_is_trimmed() {
        let text = "Narrative here.\n\n### JSON_DATA_START\n  []  \n### JSON_DATA_END\n";
        let report = parse_joint_response(text);
        assert_eq!(report.narrative(), "Narrative here.");
        assert!(report.ranking().is_empty());
    }
}
