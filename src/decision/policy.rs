use super::InteractionType;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ModelVerdict {
    Yes,
    No,
}

impl ModelVerdict {
    /// Lenient reading of a yes/no reply. Any mention of YES, a leading Y, or the
    /// interaction keyword itself counts as approval.
    pub fn parse(reply: &str, kind: InteractionType) -> Self {
        let upper = reply.trim().to_uppercase();
        if upper.starts_with("YES")
            || upper.starts_with('Y')
            || upper.contains("YES")
            || upper.contains(kind.keyword())
        {
            Self::Yes
        } else {
            Self::No
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Heuristics {
    pub game_match: bool,
    pub has_engagement: bool,
    pub is_question: bool,
    pub gaming_keyword: bool,
}

impl Heuristics {
    pub fn any(&self) -> bool {
        self.game_match || self.has_engagement || self.is_question || self.gaming_keyword
    }

    fn fired(&self) -> Vec<&'static str> {
        [
            (self.game_match, "known game"),
            (self.has_engagement, "existing engagement"),
            (self.is_question, "question"),
            (self.gaming_keyword, "gaming vocabulary"),
        ]
        .into_iter()
        .filter_map(|(hit, label)| hit.then_some(label))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyOutcome {
    pub should_interact: bool,
    pub override_applied: bool,
    pub reason: String,
}

/// The interaction policy as a decision table:
///
/// | verdict | spam flag | any heuristic | result                |
/// |---------|-----------|---------------|-----------------------|
/// | YES     | -         | -             | interact              |
/// | NO      | yes       | -             | skip                  |
/// | NO      | no        | yes           | interact (override)   |
/// | NO      | no        | no            | skip                  |
///
/// Spam markers only block the override. The override makes a NO close to
/// unreachable for gaming content.
pub fn decide(verdict: ModelVerdict, spam_flag: Option<&str>, heuristics: Heuristics) -> PolicyOutcome {
    match (verdict, spam_flag) {
        (ModelVerdict::Yes, _) => PolicyOutcome {
            should_interact: true,
            override_applied: false,
            reason: "model approved".to_string(),
        },
        (ModelVerdict::No, Some(marker)) => PolicyOutcome {
            should_interact: false,
            override_applied: false,
            reason: format!("model flagged post as {}", marker.to_lowercase()),
        },
        (ModelVerdict::No, None) if heuristics.any() => PolicyOutcome {
            should_interact: true,
            override_applied: true,
            reason: format!("override: {}", heuristics.fired().join(", ")),
        },
        (ModelVerdict::No, None) => PolicyOutcome {
            should_interact: false,
            override_applied: false,
            reason: "model declined".to_string(),
        },
    }
}
