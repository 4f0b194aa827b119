//! Data models and structures
//!
//! Defines the homework analysis result, the complexity verdict and the chat
//! transcript types. Field names follow the camelCase JSON the web client and
//! the analysis prompts use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplexityVerdict {
    pub complexity: Complexity,
    #[serde(default, deserialize_with = "lenient::string")]
    pub reason: String,
}

impl ComplexityVerdict {
    /// Verdict used whenever the classifier cannot be trusted.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            complexity: Complexity::Complex,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedProblem {
    #[serde(default, deserialize_with = "lenient::number")]
    pub id: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub question: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub student_answer: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub correct_answer: String,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub is_correct: bool,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub error_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub step_by_step: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub visual_aid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FocusArea {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PracticeProblem {
    #[serde(default, deserialize_with = "lenient::number")]
    pub id: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub problem: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub answer: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub hint: String,
}

/// Full grading result returned to the client.
///
/// Counts and routing metadata are filled in server side; anything the model
/// reports for them is overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkAnalysis {
    #[serde(default = "default_subject", deserialize_with = "lenient::string")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub grade: Option<u32>,
    #[serde(default)]
    pub problems: Vec<AnalyzedProblem>,
    #[serde(default)]
    pub error_patterns: BTreeMap<String, u32>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub encouragement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_areas: Option<Vec<FocusArea>>,
    #[serde(default)]
    pub practice_problems: Vec<PracticeProblem>,
    #[serde(default)]
    pub total_problems: usize,
    #[serde(default)]
    pub correct_answers: usize,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub classify_reason: String,
    #[serde(default)]
    pub model_used: String,
}

fn default_subject() -> String {
    "Math".to_string()
}

impl HomeworkAnalysis {
    /// Re-derive every field the model cannot be trusted to compute.
    ///
    /// Ids become 1..n in order, correct problems lose their error details,
    /// and the counters and error histogram are rebuilt from `problems`.
    pub fn recompute_derived(&mut self) {
        let mut patterns = BTreeMap::new();

        for (index, problem) in self.problems.iter_mut().enumerate() {
            problem.id = index as u32 + 1;
            if problem.is_correct {
                problem.error_type = None;
                problem.root_cause = None;
                problem.visual_aid = None;
                problem.step_by_step.clear();
            } else if let Some(error_type) = problem.error_type.as_deref() {
                *patterns.entry(error_type.to_string()).or_insert(0) += 1;
            }
        }

        self.error_patterns = patterns;
        self.total_problems = self.problems.len();
        self.correct_answers = self.problems.iter().filter(|p| p.is_correct).count();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TutorReply {
    pub reply: String,
    pub solved: bool,
}

/// Deserializers that accept the loose typing models tend to produce
/// (numbers as strings, answers as numbers, `"true"` for `true`).
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn value_to_string(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    fn value_to_u32(value: &Value) -> Option<u32> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(value_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn optional_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(value_to_string(Value::deserialize(deserializer)?).filter(|s| !s.trim().is_empty()))
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        Ok(value_to_u32(&Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn optional_number<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        Ok(value_to_u32(&Value::deserialize(deserializer)?))
    }

    pub fn boolean<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
            Value::Number(n) => n.as_i64() == Some(1),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn problem(is_correct: bool, error_type: Option<&str>) -> AnalyzedProblem {
        AnalyzedProblem {
            question: "12 + 9".to_string(),
            is_correct,
            error_type: error_type.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_problem_accepts_loose_model_types() {
        let parsed: AnalyzedProblem = serde_json::from_value(serde_json::json!({
            "id": "2",
            "question": "7 x 8",
            "studentAnswer": 54,
            "correctAnswer": 56,
            "isCorrect": "false",
            "errorType": "Multiplication Facts",
            "rootCause": ""
        }))
        .unwrap();

        assert_eq!(parsed.id, 2);
        assert_eq!(parsed.student_answer, "54");
        assert_eq!(parsed.correct_answer, "56");
        assert!(!parsed.is_correct);
        assert_eq!(parsed.error_type.as_deref(), Some("Multiplication Facts"));
        assert_eq!(parsed.root_cause, None);
        assert!(parsed.step_by_step.is_empty());
    }

    #[test]
    fn test_analysis_serializes_camel_case() {
        let analysis = HomeworkAnalysis {
            grade: Some(2),
            problems: vec![problem(true, None)],
            ..Default::default()
        };
        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("practiceProblems").is_some());
        assert!(json.get("totalProblems").is_some());
        assert!(json.get("focusAreas").is_none());
        assert_eq!(json["problems"][0]["errorType"], serde_json::Value::Null);
        assert!(json["problems"][0].get("rootCause").is_none());
    }

    #[test]
    fn test_recompute_derived_ignores_model_counts() {
        let mut analysis = HomeworkAnalysis {
            problems: vec![
                problem(true, None),
                problem(true, None),
                problem(false, Some("Regrouping")),
                problem(true, None),
                problem(true, None),
            ],
            total_problems: 99,
            correct_answers: 0,
            ..Default::default()
        };

        analysis.recompute_derived();

        assert_eq!(analysis.total_problems, 5);
        assert_eq!(analysis.correct_answers, 4);
        assert_eq!(
            analysis.error_patterns,
            BTreeMap::from([("Regrouping".to_string(), 1)])
        );
        let ids: Vec<u32> = analysis.problems.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_recompute_derived_clears_details_on_correct_problems() {
        let mut analysis = HomeworkAnalysis {
            problems: vec![AnalyzedProblem {
                is_correct: true,
                error_type: Some("Borrowing".to_string()),
                root_cause: Some("n/a".to_string()),
                step_by_step: vec!["step".to_string()],
                visual_aid: Some("blocks".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        analysis.recompute_derived();

        let p = &analysis.problems[0];
        assert_eq!(p.error_type, None);
        assert_eq!(p.root_cause, None);
        assert_eq!(p.visual_aid, None);
        assert!(p.step_by_step.is_empty());
        assert!(analysis.error_patterns.is_empty());
    }

    #[test]
    fn test_chat_turn_roles() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"What is 3 + 4?"}"#).unwrap();
        assert_eq!(turn, ChatTurn::assistant("What is 3 + 4?"));
        assert!(serde_json::from_str::<ChatTurn>(r#"{"role":"system","content":"x"}"#).is_err());
    }
}
