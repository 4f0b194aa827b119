//! Turning free-form model output into structured results.
//!
//! Models wrap JSON in markdown fences, surround it with prose and get cut off
//! by their token budget. Recovery runs as an ordered chain of pure
//! strategies; the first one that yields an object wins:
//!
//! 1. strip fences and parse directly,
//! 2. cut back to the last complete array element (`},`) and close the
//!    document with a synthesized tail,
//! 3. walk the `"problems"` array and keep every element that parses on its
//!    own, then wrap them in a minimal analysis shell.

use crate::models::HomeworkAnalysis;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Appended after the last complete problem of a truncated response.
const TRUNCATION_TAIL: &str = r#"], "errorPatterns": {}, "encouragement": "Great effort!" }"#;

const PROBLEMS_KEY: &str = "\"problems\"";
const SALVAGED_ENCOURAGEMENT: &str = "Great effort! Let's look at these problems together.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    ClosedTruncation,
    SalvagedProblems,
}

const STRATEGIES: [(Strategy, fn(&str) -> Option<Value>); 3] = [
    (Strategy::Direct, parse_direct),
    (Strategy::ClosedTruncation, close_truncated),
    (Strategy::SalvagedProblems, salvage_problems),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The response was well-formed (possibly after fence stripping).
    Complete(HomeworkAnalysis),
    /// The response was damaged; `recovered` problems were rescued.
    Partial {
        analysis: HomeworkAnalysis,
        recovered: usize,
    },
    Failed(String),
}

impl ParseOutcome {
    pub fn into_result(self) -> Result<HomeworkAnalysis> {
        match self {
            ParseOutcome::Complete(analysis) | ParseOutcome::Partial { analysis, .. } => {
                Ok(analysis)
            }
            ParseOutcome::Failed(reason) => Err(Error::Unparseable(reason)),
        }
    }
}

/// Parse model output into a JSON object, repairing it if needed.
pub fn parse(raw: &str) -> Result<Value> {
    STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(raw))
        .ok_or_else(|| Error::Unparseable(format!("no JSON object in {} chars", raw.len())))
}

/// Parse a homework analysis, reporting whether repair was needed.
pub fn parse_analysis(raw: &str) -> ParseOutcome {
    for (strategy, attempt) in STRATEGIES {
        let Some(value) = attempt(raw) else {
            continue;
        };

        // A refusal or error object is JSON, but not an analysis.
        if !value.get("problems").is_some_and(Value::is_array) {
            tracing::debug!("{:?} produced an object without a problems array", strategy);
            continue;
        }

        match serde_json::from_value::<HomeworkAnalysis>(value) {
            Ok(analysis) if strategy == Strategy::Direct => {
                return ParseOutcome::Complete(analysis);
            }
            Ok(analysis) => {
                let recovered = analysis.problems.len();
                return ParseOutcome::Partial {
                    analysis,
                    recovered,
                };
            }
            Err(e) => {
                tracing::debug!("{:?} produced JSON that is not an analysis: {}", strategy, e);
            }
        }
    }

    ParseOutcome::Failed(format!(
        "no recovery strategy produced an analysis from {} chars",
        raw.len()
    ))
}

/// Remove a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Fence-stripped text starting at the first `{`.
fn json_body(raw: &str) -> Option<&str> {
    let stripped = strip_code_fence(raw);
    let start = stripped.find('{')?;
    Some(&stripped[start..])
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

fn parse_direct(raw: &str) -> Option<Value> {
    let body = json_body(raw)?;
    parse_object(body).or_else(|| {
        // Trailing prose after the object.
        let end = body.rfind('}')?;
        parse_object(&body[..=end])
    })
}

fn close_truncated(raw: &str) -> Option<Value> {
    let body = json_body(raw)?;
    let cut = body.rfind("},")?;
    parse_object(&format!("{}{}", &body[..=cut], TRUNCATION_TAIL))
}

fn salvage_problems(raw: &str) -> Option<Value> {
    let body = json_body(raw)?;
    let key = body.find(PROBLEMS_KEY)?;
    let array = body[key + PROBLEMS_KEY.len()..]
        .trim_start()
        .strip_prefix(':')?
        .trim_start()
        .strip_prefix('[')?;

    let problems: Vec<Value> = complete_objects(array)
        .into_iter()
        .filter_map(parse_object)
        .collect();

    if problems.is_empty() {
        return None;
    }

    let mut shell = salvage_header(&body[..key]).unwrap_or_default();
    shell.insert("problems".to_string(), Value::Array(problems));
    shell.insert("errorPatterns".to_string(), Value::Object(Map::new()));
    shell
        .entry("encouragement")
        .or_insert_with(|| Value::String(SALVAGED_ENCOURAGEMENT.to_string()));
    shell
        .entry("practiceProblems")
        .or_insert_with(|| Value::Array(Vec::new()));

    Some(Value::Object(shell))
}

/// Recover the fields preceding `"problems"` (subject, grade) when that
/// prefix is well-formed on its own.
fn salvage_header(prefix: &str) -> Option<Map<String, Value>> {
    let prefix = prefix.trim_end();
    let prefix = prefix.strip_suffix(',').unwrap_or(prefix);
    match parse_object(&format!("{}}}", prefix))? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Every syntactically closed top-level `{...}` in an array body.
///
/// Stops at the array's closing bracket or at end of input. Braces inside
/// string literals are ignored.
fn complete_objects(array: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (index, byte) in array.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        objects.push(&array[begin..=index]);
                    }
                }
            }
            b']' if depth == 0 => break,
            _ => {}
        }
    }

    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = r#"{
  "subject": "Math",
  "grade": 2,
  "problems": [
    {"id": 1, "question": "14 + 8", "studentAnswer": "22", "correctAnswer": "22", "isCorrect": true, "errorType": null},
    {"id": 2, "question": "31 - 7", "studentAnswer": "36", "correctAnswer": "24", "isCorrect": false, "errorType": "Borrowing"}
  ],
  "errorPatterns": {"Borrowing": 1},
  "encouragement": "Nice work!",
  "practiceProblems": [
    {"id": 1, "problem": "42 - 8", "answer": "34", "hint": "Borrow from the tens."},
    {"id": 2, "problem": "53 - 6", "answer": "47", "hint": "Borrow from the tens."},
    {"id": 3, "problem": "60 - 4", "answer": "56", "hint": "Borrow from the tens."}
  ]
}"#;

    fn complete(raw: &str) -> HomeworkAnalysis {
        match parse_analysis(raw) {
            ParseOutcome::Complete(analysis) => analysis,
            other => panic!("expected complete parse, got {:?}", other),
        }
    }

    fn partial(raw: &str) -> (HomeworkAnalysis, usize) {
        match parse_analysis(raw) {
            ParseOutcome::Partial {
                analysis,
                recovered,
            } => (analysis, recovered),
            other => panic!("expected partial parse, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_json_is_complete() {
        let analysis = complete(FULL);
        assert_eq!(analysis.subject, "Math");
        assert_eq!(analysis.grade, Some(2));
        assert_eq!(analysis.problems.len(), 2);
        assert_eq!(analysis.practice_problems.len(), 3);
    }

    #[test]
    fn test_fenced_json_matches_unfenced() {
        let fenced = format!("```json\n{}\n```", FULL);
        assert_eq!(complete(&fenced), complete(FULL));

        let bare_fence = format!("```\n{}\n```", FULL);
        assert_eq!(complete(&bare_fence), complete(FULL));
    }

    #[test]
    fn test_surrounding_prose_is_ignored() {
        let chatty = format!("Here is the analysis:\n{}\nLet me know if you need more!", FULL);
        assert_eq!(complete(&chatty), complete(FULL));
    }

    #[test]
    fn test_truncated_problem_list_keeps_complete_problems() {
        let raw = r#"```json
{"subject": "Math", "grade": 3, "problems": [
  {"id": 1, "question": "7 x 6", "studentAnswer": "42", "correctAnswer": "42", "isCorrect": true, "errorType": null},
  {"id": 2, "question": "8 x 7", "studentAnswer": "54", "correctAnswer": "56", "isCorrect": false, "errorType": "Math Facts"},
  {"id": 3, "question": "9 x 4", "studentAns"#;

        let (analysis, recovered) = partial(raw);
        assert_eq!(recovered, 2);
        assert_eq!(analysis.grade, Some(3));
        assert_eq!(analysis.problems[1].error_type.as_deref(), Some("Math Facts"));
        assert_eq!(analysis.encouragement, "Great effort!");
    }

    #[test]
    fn test_single_problem_without_trailing_comma_is_salvaged() {
        let raw = r#"{"subject": "Math", "grade": 1, "problems": [{"id": 1, "question": "3 + 4", "studentAnswer": "7", "correctAnswer": "7", "isCorrect": true}"#;

        let (analysis, recovered) = partial(raw);
        assert_eq!(recovered, 1);
        assert_eq!(analysis.subject, "Math");
        assert_eq!(analysis.grade, Some(1));
        assert!(analysis.practice_problems.is_empty());
    }

    #[test]
    fn test_salvage_skips_broken_elements() {
        let raw = r#"{"subject": "Math", "problems": [{"id": 1, "question": "2 + 2", "studentAnswer": "4", "correctAnswer": "4", "isCorrect": true},{"id": 2, "question": oops},{"id": 3, "question": "3 + 3", "studentAnswer": "5", "correctAnswer": "6", "isCorrect": false, "errorType": "Math Facts"}"#;

        let (analysis, recovered) = partial(raw);
        assert_eq!(recovered, 2);
        let questions: Vec<&str> = analysis
            .problems
            .iter()
            .map(|p| p.question.as_str())
            .collect();
        assert_eq!(questions, vec!["2 + 2", "3 + 3"]);
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_salvage() {
        let raw = r#"{"problems": [{"id": 1, "question": "Is {2} in the set?", "studentAnswer": "yes", "correctAnswer": "yes", "isCorrect": true},{"id": 2, "question": "sets {1}, {2"#;

        let (analysis, recovered) = partial(raw);
        assert_eq!(recovered, 1);
        assert_eq!(analysis.problems[0].question, "Is {2} in the set?");
    }

    #[test]
    fn test_garbage_fails() {
        let outcome = parse_analysis("I'm sorry, I can't read this image.");
        assert!(matches!(outcome, ParseOutcome::Failed(_)));
        assert!(matches!(
            outcome.into_result().unwrap_err(),
            Error::Unparseable(_)
        ));
    }

    #[test]
    fn test_object_without_problems_fails() {
        for raw in [
            r#"{"error": "The photo is too blurry to read."}"#,
            r#"```json
{"subject": "Math", "grade": 2}
```"#,
            r#"{"subject": "Math", "problems": "none found"}"#,
        ] {
            let outcome = parse_analysis(raw);
            assert!(
                matches!(outcome, ParseOutcome::Failed(_)),
                "expected failure for {}, got {:?}",
                raw,
                outcome
            );
        }
    }

    #[test]
    fn test_partial_analysis_has_no_practice_problems() {
        let raw = r#"{"subject": "Math", "problems": [{"id": 1, "question": "5 + 5", "studentAnswer": "10", "correctAnswer": "10", "isCorrect": true},{"id": 2, "quest"#;

        let (analysis, _) = partial(raw);
        assert!(analysis.practice_problems.is_empty());
    }

    #[test]
    fn test_truncated_before_any_problem_fails() {
        let outcome = parse_analysis(r#"{"subject": "Math", "grade": 2, "problems": [{"id": 1, "quest"#);
        assert!(matches!(outcome, ParseOutcome::Failed(_)));
    }

    #[test]
    fn test_generic_parse_reads_verdicts() {
        let value = parse("```json\n{\"complexity\": \"simple\", \"reason\": \"facts\"}\n```").unwrap();
        assert_eq!(value["complexity"], "simple");
    }

    #[test]
    fn test_generic_parse_rejects_non_objects() {
        assert!(matches!(parse("[1, 2, 3]"), Err(Error::Unparseable(_))));
        assert!(matches!(parse("simple"), Err(Error::Unparseable(_))));
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```json{}```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1"), "{\"a\": 1");
    }
}
