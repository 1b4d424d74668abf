use rootscope_core::output::schema::{Severity, SeverityAssessment};
use rootscope_core::Fact;

const HIGH_CONFIDENCE: f64 = 0.8;
const CRITICAL_ISSUE_COUNT: usize = 3;

/// Grades the run from its issue-flagged facts.
pub fn assess_severity(facts: &[Fact]) -> SeverityAssessment {
    let issues: Vec<&Fact> = facts.iter().filter(|f| f.is_issue()).collect();
    let confident = issues
        .iter()
        .filter(|f| f.confidence >= HIGH_CONFIDENCE)
        .count();

    let (level, rationale) = if facts.is_empty() {
        (Severity::Unknown, "No evidence was gathered".to_string())
    } else if issues.is_empty() {
        (Severity::Low, "No facts were flagged as potential issues".to_string())
    } else if confident >= CRITICAL_ISSUE_COUNT {
        (
            Severity::Critical,
            format!("{} potential issues reported with high confidence", confident),
        )
    } else if confident > 0 {
        (
            Severity::High,
            format!(
                "{} of {} potential issues reported with high confidence",
                confident,
                issues.len()
            ),
        )
    } else {
        (
            Severity::Medium,
            format!("{} potential issues, none with high confidence", issues.len()),
        )
    };

    SeverityAssessment {
        level,
        rationale,
        issue_count: issues.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yare::parameterized;

    fn issue(confidence: f64) -> Fact {
        Fact::new("agent", "problem", confidence).with_metadata("potential_issue", json!(true))
    }

    #[parameterized(
        no_facts = { vec![], Severity::Unknown },
        no_issues = { vec![Fact::new("agent", "all good", 0.9)], Severity::Low },
        weak_issue = { vec![issue(0.6)], Severity::Medium },
        one_confident_issue = { vec![issue(0.6), issue(0.85)], Severity::High },
        many_confident_issues = { vec![issue(0.8), issue(0.9), issue(1.0)], Severity::Critical },
    )]
    fn test_severity_levels(facts: Vec<Fact>, expected: Severity) {
        assert_eq!(assess_severity(&facts).level, expected);
    }

    #[test]
    fn test_issue_count() {
        let facts = vec![issue(0.5), Fact::new("agent", "fine", 0.5), issue(0.9)];
        let assessment = assess_severity(&facts);
        assert_eq!(assessment.issue_count, 2);
        assert!(assessment.rationale.contains("1 of 2"));
    }
}
