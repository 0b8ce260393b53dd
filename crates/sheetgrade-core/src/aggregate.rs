//! Aggregation: overall scores, summary statistics, multi-strategy merging,
//! and recommendation text.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::error::EvalError;
use crate::model::AnswerKey;
use crate::results::{
    EvaluationResult, QuestionVerdict, SummaryStats, VerdictStatus, COMBINED_STRATEGY,
};

/// Overall percentage score: Σscore / Σmax × 100, rounded to one decimal.
pub fn aggregate(verdicts: &[QuestionVerdict]) -> f64 {
    let max: f64 = verdicts.iter().map(|v| v.max_score).sum();
    if max <= 0.0 {
        return 0.0;
    }
    let earned: f64 = verdicts.iter().map(|v| v.score).sum();
    (earned / max * 1000.0).round() / 10.0
}

/// Count verdicts by status and record whether the score cleared the pass
/// threshold.
pub fn summarize(
    verdicts: &[QuestionVerdict],
    overall_score: f64,
    pass_threshold: f64,
) -> SummaryStats {
    let mut stats = SummaryStats {
        total_questions: verdicts.len(),
        correct: 0,
        partial: 0,
        incorrect: 0,
        passed: overall_score >= pass_threshold,
    };
    for v in verdicts {
        match v.status {
            VerdictStatus::Correct => stats.correct += 1,
            VerdictStatus::Partial => stats.partial += 1,
            VerdictStatus::Incorrect => stats.incorrect += 1,
        }
    }
    stats
}

/// Merge several strategies' results for the same job into one consolidated
/// record.
///
/// Per question: majority vote on status; a tie goes to the status backed by
/// the single most confident verdict. The winning group's most confident
/// verdict supplies the score and feedback.
pub fn combine(
    results: &[EvaluationResult],
    pass_threshold: f64,
) -> Result<EvaluationResult, EvalError> {
    let Some(first) = results.first() else {
        return Err(EvalError::AllStrategiesFailed {
            reasons: "no results to combine".to_string(),
        });
    };

    let n = first.verdicts.len();
    for r in results {
        if r.verdicts.len() != n {
            return Err(EvalError::AlignmentError {
                expected: n,
                actual: r.verdicts.len(),
            });
        }
    }

    let mut verdicts = Vec::with_capacity(n);
    for i in 0..n {
        let group: Vec<&QuestionVerdict> = results.iter().map(|r| &r.verdicts[i]).collect();

        let mut votes: HashMap<VerdictStatus, usize> = HashMap::new();
        for v in &group {
            *votes.entry(v.status).or_default() += 1;
        }
        let top_count = votes.values().copied().max().unwrap_or(0);

        // Among the statuses tied at the top vote count, the one holding the
        // single most confident verdict wins.
        let winner = group
            .iter()
            .filter(|v| votes[&v.status] == top_count)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .expect("non-empty verdict group");

        verdicts.push((*winner).clone());
    }

    let overall_score = aggregate(&verdicts);
    let summary = summarize(&verdicts, overall_score, pass_threshold);

    Ok(EvaluationResult {
        id: Uuid::new_v4(),
        job_id: first.job_id,
        sheet_name: first.sheet_name.clone(),
        strategy: COMBINED_STRATEGY.to_string(),
        overall_score,
        verdicts,
        summary,
        recommendations: Vec::new(),
        warnings: Vec::new(),
        timing: Default::default(),
        created_at: Utc::now(),
    })
}

/// Human-readable improvement suggestions.
///
/// Questions whose score fraction fell below `partial_threshold` are grouped
/// by the key's subject tag when one is present.
pub fn recommendations(
    verdicts: &[QuestionVerdict],
    key: &AnswerKey,
    partial_threshold: f64,
) -> Vec<String> {
    let subject_of: HashMap<usize, &str> = key
        .entries
        .iter()
        .filter_map(|e| e.subject.as_deref().map(|s| (e.index, s)))
        .collect();

    let mut by_subject: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut general: Vec<usize> = Vec::new();

    for v in verdicts {
        if v.max_score <= 0.0 || v.score / v.max_score >= partial_threshold {
            continue;
        }
        match subject_of.get(&v.question_index) {
            Some(subject) => by_subject.entry(subject).or_default().push(v.question_index),
            None => general.push(v.question_index),
        }
    }

    let mut out: Vec<String> = by_subject
        .into_iter()
        .map(|(subject, questions)| {
            format!(
                "Review {subject}: question{} {} lost most of the available points",
                plural(questions.len()),
                join_indices(&questions)
            )
        })
        .collect();
    out.sort();

    if !general.is_empty() {
        out.push(format!(
            "Revisit question{} {}; the answers scored below the partial-credit bar",
            plural(general.len()),
            join_indices(&general)
        ));
    }

    out
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn join_indices(indices: &[usize]) -> String {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyEntry;
    use crate::results::TimingBreakdown;

    fn verdict(index: usize, status: VerdictStatus, score: f64, confidence: f64) -> QuestionVerdict {
        QuestionVerdict {
            question_index: index,
            status,
            score,
            max_score: 4.0,
            confidence,
            feedback: String::new(),
        }
    }

    fn result_with(verdicts: Vec<QuestionVerdict>, strategy: &str) -> EvaluationResult {
        let overall = aggregate(&verdicts);
        let summary = summarize(&verdicts, overall, 60.0);
        EvaluationResult {
            id: Uuid::new_v4(),
            job_id: Uuid::nil(),
            sheet_name: "sheet.png".into(),
            strategy: strategy.into(),
            overall_score: overall,
            verdicts,
            summary,
            recommendations: vec![],
            warnings: vec![],
            timing: TimingBreakdown::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn aggregate_rounds_to_one_decimal() {
        let verdicts = vec![
            verdict(1, VerdictStatus::Correct, 4.0, 0.9),
            verdict(2, VerdictStatus::Partial, 1.0, 0.9),
            verdict(3, VerdictStatus::Incorrect, 0.0, 0.9),
        ];
        // 5 / 12 = 41.666...%
        assert_eq!(aggregate(&verdicts), 41.7);
    }

    #[test]
    fn aggregate_empty_is_zero() {
        assert_eq!(aggregate(&[]), 0.0);
    }

    #[test]
    fn summarize_counts_and_pass() {
        let verdicts = vec![
            verdict(1, VerdictStatus::Correct, 4.0, 0.9),
            verdict(2, VerdictStatus::Correct, 4.0, 0.9),
            verdict(3, VerdictStatus::Partial, 2.0, 0.9),
            verdict(4, VerdictStatus::Incorrect, 0.0, 0.9),
        ];
        let overall = aggregate(&verdicts);
        let stats = summarize(&verdicts, overall, 60.0);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.partial, 1);
        assert_eq!(stats.incorrect, 1);
        assert!(stats.passed, "62.5% should pass at threshold 60");
    }

    #[test]
    fn combine_tie_breaks_on_confidence() {
        // Two strategies disagree on question 5; the Correct vote carries
        // confidence 0.9 against 0.3, so Correct wins the tie.
        let a = result_with(vec![verdict(5, VerdictStatus::Correct, 4.0, 0.9)], "pattern");
        let b = result_with(vec![verdict(5, VerdictStatus::Incorrect, 0.0, 0.3)], "visual");

        let combined = combine(&[a, b], 60.0).unwrap();
        assert_eq!(combined.strategy, COMBINED_STRATEGY);
        assert_eq!(combined.verdicts[0].status, VerdictStatus::Correct);
        assert_eq!(combined.verdicts[0].score, 4.0);
    }

    #[test]
    fn combine_majority_beats_lone_confidence() {
        let a = result_with(vec![verdict(1, VerdictStatus::Incorrect, 0.0, 0.6)], "pattern");
        let b = result_with(vec![verdict(1, VerdictStatus::Incorrect, 0.0, 0.5)], "visual");
        let c = result_with(vec![verdict(1, VerdictStatus::Correct, 4.0, 0.99)], "ocr");

        let combined = combine(&[a, b, c], 60.0).unwrap();
        assert_eq!(combined.verdicts[0].status, VerdictStatus::Incorrect);
    }

    #[test]
    fn combine_rejects_mismatched_lengths() {
        let a = result_with(
            vec![
                verdict(1, VerdictStatus::Correct, 4.0, 0.9),
                verdict(2, VerdictStatus::Correct, 4.0, 0.9),
            ],
            "pattern",
        );
        let b = result_with(vec![verdict(1, VerdictStatus::Correct, 4.0, 0.9)], "visual");
        assert!(matches!(
            combine(&[a, b], 60.0),
            Err(EvalError::AlignmentError { .. })
        ));
    }

    #[test]
    fn combine_empty_fails() {
        assert!(combine(&[], 60.0).is_err());
    }

    #[test]
    fn recommendations_group_by_subject() {
        let key = AnswerKey {
            entries: vec![
                KeyEntry {
                    index: 1,
                    expected: "a".into(),
                    points: 4.0,
                    subject: Some("algebra".into()),
                },
                KeyEntry {
                    index: 2,
                    expected: "b".into(),
                    points: 4.0,
                    subject: Some("algebra".into()),
                },
                KeyEntry {
                    index: 3,
                    expected: "c".into(),
                    points: 4.0,
                    subject: None,
                },
            ],
        };
        let verdicts = vec![
            verdict(1, VerdictStatus::Incorrect, 0.0, 0.9),
            verdict(2, VerdictStatus::Incorrect, 0.0, 0.9),
            verdict(3, VerdictStatus::Incorrect, 0.0, 0.9),
        ];

        let recs = recommendations(&verdicts, &key, 0.5);
        assert_eq!(recs.len(), 2);
        assert!(recs[0].contains("algebra"), "got: {:?}", recs);
        assert!(recs[0].contains("1, 2"), "got: {:?}", recs);
        assert!(recs[1].contains('3'), "got: {:?}", recs);
    }

    #[test]
    fn no_recommendations_for_a_clean_sheet() {
        let key = AnswerKey::from_answers(&["a".into(), "b".into()], 8.0);
        let verdicts = vec![
            verdict(1, VerdictStatus::Correct, 4.0, 0.9),
            verdict(2, VerdictStatus::Correct, 4.0, 0.9),
        ];
        assert!(recommendations(&verdicts, &key, 0.5).is_empty());
    }
}
