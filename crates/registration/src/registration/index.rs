use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{EnrollmentRule, SessionOption};

/// Derived lookup of school -> grade -> eligible curricula.
///
/// Built fresh from the stored rules on each request; curricula keep feed
/// order and duplicates are not collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleIndex(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl RuleIndex {
    pub fn build(rules: &[EnrollmentRule]) -> Self {
        let mut index: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for rule in rules {
            index
                .entry(rule.school.clone())
                .or_default()
                .entry(rule.grade.clone())
                .or_default()
                .push(rule.curriculum.clone());
        }
        Self(index)
    }

    pub fn curricula(&self, school: &str, grade: &str) -> &[String] {
        self.0
            .get(school)
            .and_then(|grades| grades.get(grade))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn allows(&self, school: &str, grade: &str, curriculum: &str) -> bool {
        self.curricula(school, grade)
            .iter()
            .any(|candidate| candidate == curriculum)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Derived lookup of curriculum -> available session ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionIndex(BTreeMap<String, Vec<String>>);

impl SessionIndex {
    pub fn build(sessions: &[SessionOption]) -> Self {
        let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for session in sessions {
            index
                .entry(session.curriculum.clone())
                .or_default()
                .push(session.session_range.clone());
        }
        Self(index)
    }

    pub fn ranges(&self, curriculum: &str) -> &[String] {
        self.0
            .get(curriculum)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn allows(&self, curriculum: &str, session_range: &str) -> bool {
        self.ranges(curriculum)
            .iter()
            .any(|candidate| candidate == session_range)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(school: &str, curriculum: &str, grade: &str) -> EnrollmentRule {
        EnrollmentRule {
            school: school.to_string(),
            curriculum: curriculum.to_string(),
            grade: grade.to_string(),
            course_id: "course-A".to_string(),
        }
    }

    #[test]
    fn rule_index_groups_by_school_then_grade() {
        let rules = vec![
            rule("Lincoln High", "Math", "6"),
            rule("Lincoln High", "Science", "6"),
            rule("Lincoln High", "Math", "7"),
            rule("Jefferson Middle", "Math", "6"),
        ];
        let index = RuleIndex::build(&rules);

        assert_eq!(index.curricula("Lincoln High", "6"), ["Math", "Science"]);
        assert_eq!(index.curricula("Lincoln High", "7"), ["Math"]);
        assert_eq!(index.curricula("Jefferson Middle", "6"), ["Math"]);
        assert!(index.curricula("Lincoln High", "8").is_empty());
        assert!(index.allows("Lincoln High", "6", "Science"));
        assert!(!index.allows("Lincoln High", "7", "Science"));
    }

    #[test]
    fn rule_index_keeps_duplicates_in_feed_order() {
        let rules = vec![
            rule("Lincoln High", "Math", "6"),
            rule("Lincoln High", "Math", "6"),
        ];
        let index = RuleIndex::build(&rules);
        assert_eq!(index.curricula("Lincoln High", "6"), ["Math", "Math"]);
    }

    #[test]
    fn session_index_groups_by_curriculum() {
        let sessions = vec![
            SessionOption {
                curriculum: "Math".to_string(),
                session_range: "July 1-2".to_string(),
                course_id: "course-A".to_string(),
            },
            SessionOption {
                curriculum: "Math".to_string(),
                session_range: "July 8-9".to_string(),
                course_id: "course-A".to_string(),
            },
        ];
        let index = SessionIndex::build(&sessions);
        assert_eq!(index.ranges("Math"), ["July 1-2", "July 8-9"]);
        assert!(index.allows("Math", "July 8-9"));
        assert!(!index.allows("Math", "July 15-16"));
        assert!(index.ranges("Science").is_empty());
    }
}
