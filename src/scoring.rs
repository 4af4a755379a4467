//! Deterministic severity scoring. No model calls.
//!
//! Each category scores 1..=10 from, in order: explicit figures, the model's
//! severity tag, keywords in the description. A category without a data block
//! has no score and is left out of the overall level.

use serde::Serialize;

use crate::impact::{Impact, ImpactCategory, ImpactData, ImpactKind, QuantitativeRecord, Severity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImpactScore {
    pub transport: Option<u8>,
    pub economy: Option<u8>,
    pub safety: Option<u8>,
    /// 1..=4, defined iff at least one category score is.
    pub overall: Option<u8>,
}

pub fn score(impact: &Impact) -> ImpactScore {
    let transport = category_score(ImpactKind::Transport, impact.transport.as_ref());
    let economy = category_score(ImpactKind::Economy, impact.economy.as_ref());
    let safety = category_score(ImpactKind::Safety, impact.safety.as_ref());
    ImpactScore {
        transport,
        economy,
        safety,
        overall: overall_level(&[transport, economy, safety]),
    }
}

pub fn category_score(kind: ImpactKind, category: Option<&ImpactCategory>) -> Option<u8> {
    match &category?.data {
        ImpactData::Absent => None,
        ImpactData::Numeric(record) => Some(numeric_score(kind, record)),
        ImpactData::Described {
            description,
            severity,
            ..
        } => Some(
            severity
                .map(severity_score)
                .unwrap_or_else(|| keyword_score(kind, description.as_deref().unwrap_or(""))),
        ),
    }
}

pub fn severity_score(severity: Severity) -> u8 {
    match severity {
        Severity::Extreme => 9,
        Severity::High => 7,
        Severity::Moderate => 5,
        Severity::Low => 2,
        Severity::VeryLow => 1,
    }
}

fn clamp(score: i64) -> u8 {
    score.clamp(1, 10) as u8
}

fn numeric_score(kind: ImpactKind, record: &QuantitativeRecord) -> u8 {
    match kind {
        ImpactKind::Transport => transport_score(record),
        ImpactKind::Economy => economy_score(record.loss_millions.unwrap_or(0.0)),
        ImpactKind::Safety => safety_score(record),
        ImpactKind::Response => 1,
    }
}

fn transport_score(record: &QuantitativeRecord) -> u8 {
    let mut score = match record.closed_roads {
        Some(n) if n >= 30 => 9,
        Some(n) if n >= 15 => 7,
        Some(n) if n >= 5 => 5,
        Some(n) if n >= 1 => 2,
        Some(_) => 1,
        None => 0,
    };
    score += match record.bridges_damaged {
        Some(n) if n >= 3 => 2,
        Some(n) if n >= 1 => 1,
        _ => 0,
    };
    clamp(score)
}

fn economy_score(loss_millions: f64) -> u8 {
    if loss_millions >= 50.0 {
        9
    } else if loss_millions >= 10.0 {
        7
    } else if loss_millions >= 1.0 {
        5
    } else if loss_millions >= 0.1 {
        2
    } else {
        1
    }
}

fn safety_score(record: &QuantitativeRecord) -> u8 {
    let casualties = record
        .injured
        .unwrap_or(0)
        .saturating_add(record.deaths.unwrap_or(0));
    let mut score = match casualties {
        n if n >= 20 => 9,
        n if n >= 5 => 7,
        n if n >= 1 => 4,
        _ => 1,
    };
    score += match record.evacuated {
        Some(n) if n >= 1000 => 2,
        Some(n) if n >= 200 => 1,
        _ => 0,
    };
    score += match record.houses_damaged {
        Some(n) if n >= 200 => 2,
        Some(n) if n >= 50 => 1,
        _ => 0,
    };
    clamp(score)
}

/// Keyword bands, strongest first. Anything unmatched scores 1.
fn keyword_score(kind: ImpactKind, description: &str) -> u8 {
    let bands: &[(&[&str], u8)] = match kind {
        ImpactKind::Transport => &[
            (&["severe", "extensive", "major", "massive"], 7),
            (&["some", "several", "moderate"], 5),
            (&["minor", "limited", "few"], 2),
        ],
        ImpactKind::Economy => &[
            (&["millions", "billions", "significant", "major"], 7),
            (&["thousands", "moderate", "some"], 5),
            (&["minor", "limited", "minimal"], 2),
        ],
        ImpactKind::Safety => &[
            (&["massive", "extensive", "hundreds of"], 7),
            (&["many", "dozens", "hundreds"], 5),
            (&["several", "a few", "some"], 2),
        ],
        ImpactKind::Response => &[],
    };
    let text = description.to_lowercase();
    bands
        .iter()
        .find(|(words, _)| words.iter().any(|w| text.contains(w)))
        .map(|(_, score)| *score)
        .unwrap_or(1)
}

/// Band the mean of the defined scores: <3 → 1, <6 → 2, <9 → 3, else 4.
pub fn overall_level(scores: &[Option<u8>]) -> Option<u8> {
    let defined: Vec<f64> = scores.iter().flatten().map(|s| f64::from(*s)).collect();
    if defined.is_empty() {
        return None;
    }
    Some(level_for_average(defined.iter().sum::<f64>() / defined.len() as f64))
}

pub fn level_for_average(average: f64) -> u8 {
    if average < 3.0 {
        1
    } else if average < 6.0 {
        2
    } else if average < 9.0 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn category(kind: ImpactKind, block: serde_json::Value) -> ImpactCategory {
        ImpactCategory {
            summary: None,
            details: Vec::new(),
            data: ImpactData::from_block(kind, Some(&block)),
        }
    }

    fn scored(kind: ImpactKind, block: serde_json::Value) -> Option<u8> {
        category_score(kind, Some(&category(kind, block)))
    }

    #[test]
    fn test_transport_bands() {
        assert_eq!(scored(ImpactKind::Transport, json!({"closed_roads": 20})), Some(7));
        assert_eq!(scored(ImpactKind::Transport, json!({"closed_roads": 30, "bridges_damaged": 3})), Some(10));
        assert_eq!(scored(ImpactKind::Transport, json!({"closed_roads": 0})), Some(1));
        assert_eq!(scored(ImpactKind::Transport, json!({"bridges_damaged": 1})), Some(1));
        assert_eq!(scored(ImpactKind::Transport, json!({"closed_roads": "5 roads", "bridges_damaged": 2})), Some(6));
    }

    #[test]
    fn test_severity_fallback() {
        assert_eq!(
            scored(ImpactKind::Transport, json!({"closed_roads": null, "severity_inference": "high"})),
            Some(7)
        );
        assert_eq!(scored(ImpactKind::Safety, json!({"severity_inference": "extreme"})), Some(9));
        assert_eq!(scored(ImpactKind::Economy, json!({"severity_inference": "very_low"})), Some(1));
    }

    #[test]
    fn test_keyword_fallback() {
        assert_eq!(scored(ImpactKind::Transport, json!({"description": "Major highway flooded"})), Some(7));
        assert_eq!(scored(ImpactKind::Economy, json!({"description": "Losses in the thousands"})), Some(5));
        assert_eq!(scored(ImpactKind::Safety, json!({"description": "Hundreds of people trapped"})), Some(7));
        assert_eq!(scored(ImpactKind::Safety, json!({"description": "A few injured"})), Some(2));
        assert_eq!(scored(ImpactKind::Safety, json!({"description": "No casualties reported"})), Some(1));
        assert_eq!(scored(ImpactKind::Transport, json!({"description": "unclear"})), Some(1));
    }

    #[test]
    fn test_economy_bands() {
        assert_eq!(scored(ImpactKind::Economy, json!({"estimated_loss": "1.5 billion EUR"})), Some(9));
        assert_eq!(scored(ImpactKind::Economy, json!({"estimated_loss": "12 million"})), Some(7));
        assert_eq!(scored(ImpactKind::Economy, json!({"estimated_loss": "2 million"})), Some(5));
        assert_eq!(scored(ImpactKind::Economy, json!({"estimated_loss": "200 thousand"})), Some(2));
        assert_eq!(scored(ImpactKind::Economy, json!({"estimated_loss": "50 thousand"})), Some(1));
    }

    #[test]
    fn test_safety_bonuses() {
        assert_eq!(scored(ImpactKind::Safety, json!({"injured": 3, "deaths": 2})), Some(7));
        assert_eq!(scored(ImpactKind::Safety, json!({"injured": 0, "evacuated": 1500})), Some(3));
        assert_eq!(
            scored(ImpactKind::Safety, json!({"deaths": 25, "evacuated": 300, "houses_damaged": 250})),
            Some(10)
        );
        assert_eq!(scored(ImpactKind::Safety, json!({"injured": 1, "houses_damaged": 60})), Some(5));
    }

    #[test]
    fn test_huge_casualty_counts_saturate() {
        assert_eq!(
            scored(ImpactKind::Safety, json!({"injured": i64::MAX, "deaths": i64::MAX})),
            Some(9)
        );
    }

    #[test]
    fn test_absent_category_is_excluded() {
        let impact = Impact {
            transport: None,
            economy: Some(category(ImpactKind::Economy, serde_json::Value::Null)),
            safety: Some(category(ImpactKind::Safety, json!({"injured": 6}))),
            response: None,
        };
        let result = score(&impact);
        assert_eq!(result.transport, None);
        assert_eq!(result.economy, None);
        assert_eq!(result.safety, Some(7));
        assert_eq!(result.overall, Some(3));

        assert_eq!(score(&Impact::default()), ImpactScore::default());
    }

    #[test]
    fn test_overall_boundaries() {
        assert_eq!(level_for_average(2.9), 1);
        assert_eq!(level_for_average(3.0), 2);
        assert_eq!(level_for_average(5.9), 2);
        assert_eq!(level_for_average(8.9), 3);
        assert_eq!(level_for_average(9.0), 4);
        assert_eq!(overall_level(&[Some(2), None, Some(4)]), Some(2));
        assert_eq!(overall_level(&[None, None, None]), None);
    }
}
