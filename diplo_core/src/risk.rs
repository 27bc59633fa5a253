//! Keyword-table risk classifier for transcript text.

use std::fmt;

use serde::Serialize;

pub const NO_TRANSCRIPT_REASON: &str = "No transcript available";
pub const STANDARD_COMMUNICATION_REASON: &str = "Standard diplomatic communication";

pub const HIGH_RISK_THRESHOLD: i32 = 6;
pub const MEDIUM_RISK_THRESHOLD: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Ordinal used when comparing levels from different sources.
    pub fn rank(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// Case-insensitive parse of producer labels. `moderate` reads as Medium.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" | "moderate" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub score: i32,
}

struct Indicator {
    keywords: &'static [&'static str],
    weight: i32,
    reason: &'static str,
}

const HIGH_RISK_INDICATORS: &[Indicator] = &[
    Indicator {
        keywords: &["threat", "warning", "warn ", "consequences"],
        weight: 3,
        reason: "Threatening or warning language",
    },
    Indicator {
        keywords: &["reject", "refuse", "unacceptable", "never accept", "categorically"],
        weight: 2,
        reason: "Strong rejection",
    },
    Indicator {
        keywords: &["sanction", "retaliat", "punish", "embargo", "countermeasure"],
        weight: 3,
        reason: "Sanctions or retaliation",
    },
    Indicator {
        keywords: &["withdraw", "walk away", "pull out", "suspend", "terminate"],
        weight: 2,
        reason: "Withdrawal language",
    },
    Indicator {
        keywords: &["deadline", "ultimatum", "final offer", "last chance"],
        weight: 2,
        reason: "Deadline or ultimatum",
    },
    Indicator {
        keywords: &["military", "escalat", "troops", "mobiliz", "armed"],
        weight: 3,
        reason: "Escalation or military language",
    },
    Indicator {
        keywords: &["outrage", "furious", "hostile", "betray", "humiliat"],
        weight: 2,
        reason: "Strong negative emotion",
    },
    Indicator {
        keywords: &["war", "conflict", "attack", "invasion", "aggression"],
        weight: 3,
        reason: "War or conflict terminology",
    },
];

const MEDIUM_RISK_INDICATORS: &[Indicator] = &[
    Indicator {
        keywords: &["concern", "worried", "worry", "troubling", "uneasy"],
        weight: 1,
        reason: "Expressions of concern",
    },
    Indicator {
        keywords: &["disagree", "oppose", "object to", "dispute", "contest"],
        weight: 2,
        reason: "Disagreement or opposition",
    },
    Indicator {
        keywords: &["disappoint", "frustrat", "regret", "dissatisf"],
        weight: 1,
        reason: "Disappointment or frustration",
    },
    Indicator {
        keywords: &["reconsider", "re-evaluate", "reassess", "review our position"],
        weight: 1,
        reason: "Reconsideration language",
    },
    Indicator {
        keywords: &["must", "demand", "insist", "pressure"],
        weight: 1,
        reason: "Coercive language",
    },
    Indicator {
        keywords: &["crisis", "emergency", "urgent", "critical"],
        weight: 2,
        reason: "Crisis or emergency language",
    },
];

const POSITIVE_INDICATORS: &[Indicator] = &[
    Indicator {
        keywords: &["cooperat", "collaborat", "partnership", "work together", "joint"],
        weight: -1,
        reason: "Cooperation",
    },
    Indicator {
        keywords: &["agreement", "consensus", "common ground", "aligned"],
        weight: -1,
        reason: "Agreement or consensus",
    },
    Indicator {
        keywords: &["peace", "diplomatic", "dialogue", "respect"],
        weight: -1,
        reason: "Peaceful or diplomatic tone",
    },
    Indicator {
        keywords: &["solution", "resolve", "compromise", "constructive", "progress"],
        weight: -1,
        reason: "Solution-oriented language",
    },
    Indicator {
        keywords: &["thank", "appreciat", "grateful", "welcome"],
        weight: -1,
        reason: "Gratitude or appreciation",
    },
];

/// Score a transcript against the fixed indicator tables.
///
/// Every table entry is evaluated; positive-sentiment entries lower the score
/// but never contribute a reason.
pub fn classify(transcript: &str) -> RiskAssessment {
    if transcript.trim().is_empty() {
        return RiskAssessment {
            level: RiskLevel::Low,
            reasons: vec![NO_TRANSCRIPT_REASON.to_string()],
            score: 0,
        };
    }

    let text = transcript.to_lowercase();
    let mut score = 0i32;
    let mut reasons = Vec::new();

    let tables = [
        HIGH_RISK_INDICATORS,
        MEDIUM_RISK_INDICATORS,
        POSITIVE_INDICATORS,
    ];
    for indicator in tables.iter().flat_map(|table| table.iter()) {
        let matched: Vec<&str> = indicator
            .keywords
            .iter()
            .copied()
            .filter(|keyword| text.contains(keyword))
            .collect();
        if matched.is_empty() {
            continue;
        }
        score += matched.len() as i32 * indicator.weight;
        if indicator.weight > 0 {
            reasons.push(format!(
                "{} ({})",
                indicator.reason,
                matched
                    .iter()
                    .map(|keyword| keyword.trim())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }

    let level = if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    if reasons.is_empty() {
        reasons.push(STANDARD_COMMUNICATION_REASON.to_string());
    }

    RiskAssessment {
        level,
        reasons,
        score,
    }
}
