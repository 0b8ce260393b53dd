//! Comparator/scorer: turns one extraction plus the answer key into
//! per-question verdicts.
//!
//! Scoring is deterministic — the same extraction, key, and config always
//! produce identical verdicts.

use crate::error::EvalError;
use crate::model::{AnswerKey, ScoringConfig, ScoringMethod};
use crate::results::{CandidateAnswer, ExtractionResult, QuestionVerdict, VerdictStatus};
use crate::traits::{normalize_answer, token_overlap};

/// AiWeighted status cutoffs as fractions of the question's max score.
const AI_CORRECT_FRACTION: f64 = 0.9;
const AI_PARTIAL_FRACTION: f64 = 0.4;

/// Score one extraction against the answer key.
///
/// Alignment is positional by question index; a length mismatch between key
/// and extraction is fatal.
pub fn score(
    extraction: &ExtractionResult,
    key: &AnswerKey,
    config: &ScoringConfig,
) -> Result<Vec<QuestionVerdict>, EvalError> {
    if extraction.candidates.len() != key.entries.len() {
        return Err(EvalError::AlignmentError {
            expected: key.entries.len(),
            actual: extraction.candidates.len(),
        });
    }

    let mut candidates: Vec<&CandidateAnswer> = extraction.candidates.iter().collect();
    candidates.sort_by_key(|c| c.question_index);

    let verdicts = candidates
        .iter()
        .zip(key.entries.iter())
        .map(|(candidate, entry)| score_question(candidate, &entry.expected, entry.points, config))
        .collect();

    Ok(verdicts)
}

/// Score a single question under the configured policy.
///
/// A confidence of 0 (the strategy could not read the question) is always
/// Incorrect, regardless of policy.
fn score_question(
    candidate: &CandidateAnswer,
    expected: &str,
    points: f64,
    config: &ScoringConfig,
) -> QuestionVerdict {
    if candidate.confidence <= 0.0 {
        return QuestionVerdict {
            question_index: candidate.question_index,
            status: VerdictStatus::Incorrect,
            score: 0.0,
            max_score: points,
            confidence: 0.0,
            feedback: "no readable answer was extracted".to_string(),
        };
    }

    let exact = normalize_answer(&candidate.answer) == normalize_answer(expected);
    let similarity = if exact {
        1.0
    } else {
        token_overlap(&candidate.answer, expected)
    };

    let (status, score, feedback) = match config.method {
        ScoringMethod::Strict => {
            if exact {
                (
                    VerdictStatus::Correct,
                    points,
                    "matches the answer key".to_string(),
                )
            } else {
                (
                    VerdictStatus::Incorrect,
                    0.0,
                    "does not match the answer key".to_string(),
                )
            }
        }
        ScoringMethod::Partial => {
            if exact {
                (
                    VerdictStatus::Correct,
                    points,
                    "matches the answer key".to_string(),
                )
            } else if similarity >= config.partial_threshold {
                (
                    VerdictStatus::Partial,
                    round2(points * similarity),
                    format!(
                        "partial credit: {:.0}% overlap with the expected answer",
                        similarity * 100.0
                    ),
                )
            } else {
                (
                    VerdictStatus::Incorrect,
                    0.0,
                    "too little overlap with the expected answer".to_string(),
                )
            }
        }
        ScoringMethod::AiWeighted => {
            let weighted = (similarity * candidate.confidence).clamp(0.0, 1.0);
            let score = round2((points * weighted).clamp(0.0, points));
            let status = if score >= AI_CORRECT_FRACTION * points {
                VerdictStatus::Correct
            } else if score >= AI_PARTIAL_FRACTION * points {
                VerdictStatus::Partial
            } else {
                VerdictStatus::Incorrect
            };
            let feedback = format!(
                "weighted score from {:.0}% similarity at {:.0}% confidence",
                similarity * 100.0,
                candidate.confidence * 100.0
            );
            (status, score, feedback)
        }
    };

    QuestionVerdict {
        question_index: candidate.question_index,
        status,
        score,
        max_score: points,
        confidence: candidate.confidence,
        feedback,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use uuid::Uuid;

    fn extraction(answers: &[(&str, f64)]) -> ExtractionResult {
        ExtractionResult {
            job_id: Uuid::nil(),
            strategy: "test".into(),
            candidates: answers
                .iter()
                .enumerate()
                .map(|(i, (a, c))| CandidateAnswer::new(i + 1, *a, *c))
                .collect(),
            duration_ms: 0,
        }
    }

    fn key(expected: &[&str]) -> AnswerKey {
        AnswerKey::from_answers(
            &expected.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            100.0,
        )
    }

    fn config(method: ScoringMethod) -> ScoringConfig {
        ScoringConfig {
            method,
            ..Default::default()
        }
    }

    #[test]
    fn strict_exact_match_scores_full() {
        let ext = extraction(&[("42", 0.9), ("Paris", 0.8), ("O2", 0.95)]);
        let verdicts = score(&ext, &key(&["42", "Paris", "O2"]), &config(ScoringMethod::Strict))
            .unwrap();

        assert_eq!(verdicts.len(), 3);
        assert!(verdicts.iter().all(|v| v.status == VerdictStatus::Correct));
        assert_eq!(aggregate(&verdicts), 100.0);
    }

    #[test]
    fn strict_normalizes_case_and_whitespace() {
        let ext = extraction(&[("  PARIS ", 0.7)]);
        let verdicts = score(&ext, &key(&["paris"]), &config(ScoringMethod::Strict)).unwrap();
        assert_eq!(verdicts[0].status, VerdictStatus::Correct);
    }

    #[test]
    fn strict_is_idempotent() {
        let ext = extraction(&[("42", 0.9), ("Berlin", 0.8), ("O2", 0.95)]);
        let k = key(&["42", "Paris", "O2"]);
        let cfg = config(ScoringMethod::Strict);

        let first = score(&ext, &k, &cfg).unwrap();
        let second = score(&ext, &k, &cfg).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn alignment_mismatch_is_fatal() {
        let ext = extraction(&[("42", 0.9), ("Paris", 0.8)]);
        let err = score(&ext, &key(&["42", "Paris", "O2"]), &config(ScoringMethod::Strict))
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::AlignmentError {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn zero_confidence_is_incorrect_under_every_policy() {
        for method in [
            ScoringMethod::Strict,
            ScoringMethod::Partial,
            ScoringMethod::AiWeighted,
        ] {
            // The extracted text even matches the key; confidence 0 wins.
            let ext = extraction(&[("Paris", 0.0)]);
            let verdicts = score(&ext, &key(&["Paris"]), &config(method)).unwrap();
            assert_eq!(verdicts[0].status, VerdictStatus::Incorrect, "{method:?}");
            assert_eq!(verdicts[0].score, 0.0, "{method:?}");
        }
    }

    #[test]
    fn partial_awards_proportional_credit() {
        let ext = extraction(&[("kinetic energy", 0.9)]);
        let k = key(&["potential energy"]);
        let verdicts = score(&ext, &k, &config(ScoringMethod::Partial)).unwrap();

        assert_eq!(verdicts[0].status, VerdictStatus::Partial);
        assert!((verdicts[0].score - 50.0).abs() < 1e-9, "got {}", verdicts[0].score);
    }

    #[test]
    fn partial_below_threshold_is_incorrect() {
        let ext = extraction(&[("completely different words here", 0.9)]);
        let verdicts =
            score(&ext, &key(&["photosynthesis"]), &config(ScoringMethod::Partial)).unwrap();
        assert_eq!(verdicts[0].status, VerdictStatus::Incorrect);
        assert_eq!(verdicts[0].score, 0.0);
    }

    #[test]
    fn ai_weighted_scales_with_confidence() {
        // Exact answer at full confidence: Correct with full points.
        let ext = extraction(&[("mitosis", 1.0)]);
        let k = key(&["mitosis"]);
        let verdicts = score(&ext, &k, &config(ScoringMethod::AiWeighted)).unwrap();
        assert_eq!(verdicts[0].status, VerdictStatus::Correct);
        assert_eq!(verdicts[0].score, 100.0);

        // Same answer at half confidence drops to Partial.
        let ext = extraction(&[("mitosis", 0.5)]);
        let verdicts = score(&ext, &k, &config(ScoringMethod::AiWeighted)).unwrap();
        assert_eq!(verdicts[0].status, VerdictStatus::Partial);
        assert_eq!(verdicts[0].score, 50.0);

        // Low confidence falls through to Incorrect.
        let ext = extraction(&[("mitosis", 0.2)]);
        let verdicts = score(&ext, &k, &config(ScoringMethod::AiWeighted)).unwrap();
        assert_eq!(verdicts[0].status, VerdictStatus::Incorrect);
    }

    #[test]
    fn ai_weighted_never_exceeds_max() {
        let ext = extraction(&[("mitosis", 1.0)]);
        let verdicts =
            score(&ext, &key(&["mitosis"]), &config(ScoringMethod::AiWeighted)).unwrap();
        assert!(verdicts[0].score <= verdicts[0].max_score);
    }

    #[test]
    fn score_sum_never_exceeds_total_points() {
        let ext = extraction(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 1.0)]);
        let k = key(&["a", "b", "c", "d"]);
        for method in [
            ScoringMethod::Strict,
            ScoringMethod::Partial,
            ScoringMethod::AiWeighted,
        ] {
            let verdicts = score(&ext, &k, &config(method)).unwrap();
            let sum: f64 = verdicts.iter().map(|v| v.score).sum();
            assert!(sum <= 100.0 + 1e-9, "{method:?}: sum {sum}");
        }
    }
}
