use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use verdict_harness::consistency::{ConsistencyChecker, ConsistencyConfig, ConsistencySample};
use verdict_harness::judge::{CacheMode, EvaluationSample, Judge, JudgeError, Judgment};

/// Returns scripted verdicts in order, cycling; records the cache mode used.
struct ScriptedJudge {
    script: Vec<(bool, f64)>,
    next: AtomicUsize,
    modes: Mutex<Vec<CacheMode>>,
}

impl ScriptedJudge {
    fn new(script: &[(bool, f64)]) -> Self {
        Self {
            script: script.to_vec(),
            next: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn try_evaluate(
        &self,
        _sample: &EvaluationSample,
        cache: CacheMode,
    ) -> Result<Judgment, JudgeError> {
        self.modes.lock().unwrap().push(cache);
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let (passed, confidence) = self.script[n % self.script.len()];
        Ok(Judgment::new(passed, confidence, "scripted"))
    }
}

/// Passes any output containing "ok"; flips on anything containing "flaky".
struct ContentJudge {
    calls: AtomicUsize,
}

#[async_trait]
impl Judge for ContentJudge {
    async fn try_evaluate(
        &self,
        sample: &EvaluationSample,
        _cache: CacheMode,
    ) -> Result<Judgment, JudgeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let passed = if sample.output.contains("flaky") {
            n % 2 == 0
        } else {
            sample.output.contains("ok")
        };
        Ok(Judgment::new(passed, 0.8, ""))
    }
}

#[tokio::test]
async fn unanimous_judge_is_fully_consistent() {
    let judge = Arc::new(ScriptedJudge::new(&[(true, 0.9)]));
    let checker = ConsistencyChecker::new(judge.clone());
    assert_eq!(checker.repetitions(), 3);

    let result = checker.check("What is 2+2?", "4", "correct").await;
    assert!(result.consistent);
    assert_eq!(result.agreement_rate, 1.0);
    assert_eq!(result.passed_ratio, 1.0);
    assert_eq!(result.confidence_variance, 0.0);
    assert!((result.mean_confidence - 0.9).abs() < 1e-12);
    assert_eq!(result.repetitions, 3);
    assert_eq!(result.judgments.len(), 3);
    assert_eq!(result.error_count, 0);
}

#[tokio::test]
async fn every_repetition_bypasses_the_cache() {
    let judge = Arc::new(ScriptedJudge::new(&[(true, 0.9)]));
    let checker = ConsistencyChecker::with_repetitions(judge.clone(), 4);
    checker.check("q", "a", "c").await;

    let modes = judge.modes.lock().unwrap().clone();
    assert_eq!(modes, vec![CacheMode::Bypass; 4]);
}

#[tokio::test]
async fn split_verdicts_report_majority_agreement() {
    let judge = Arc::new(ScriptedJudge::new(&[
        (true, 0.9),
        (false, 0.5),
        (true, 0.7),
        (true, 0.7),
    ]));
    let checker = ConsistencyChecker::with_config(judge, ConsistencyConfig { repetitions: 4 });

    let result = checker.check("q", "a", "c").await;
    assert!(!result.consistent);
    assert_eq!(result.agreement_rate, 0.75);
    assert_eq!(result.passed_ratio, 0.75);
    assert!((result.mean_confidence - 0.7).abs() < 1e-12);
    // deviations 0.2, -0.2, 0, 0 over n - 1 = 3
    assert!((result.confidence_variance - 0.08 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn zero_repetitions_are_raised_to_one() {
    let judge = Arc::new(ScriptedJudge::new(&[(false, 0.3)]));
    let checker = ConsistencyChecker::with_repetitions(judge, 0);
    let result = checker.check("q", "a", "c").await;
    assert_eq!(result.repetitions, 1);
    assert!(result.consistent);
    assert_eq!(result.confidence_variance, 0.0);
}

#[tokio::test]
async fn batch_lists_inconsistent_samples_by_index() {
    let judge = Arc::new(ContentJudge {
        calls: AtomicUsize::new(0),
    });
    let checker = ConsistencyChecker::new(judge);
    let samples = vec![
        ConsistencySample::new("q1", "ok answer"),
        ConsistencySample::new("q2", "flaky answer"),
        ConsistencySample::new("q3", "wrong answer"),
    ];

    let batch = checker.check_batch(&samples, "correct").await;
    assert_eq!(batch.total_samples, 3);
    assert_eq!(batch.consistent_samples, 2);
    assert!((batch.overall_consistency_rate - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(batch.inconsistent_samples.len(), 1);

    let flagged = &batch.inconsistent_samples[0];
    assert_eq!(flagged.index, 1);
    assert_eq!(flagged.output, "flaky answer");
    assert!(!flagged.result.consistent);
    assert!((flagged.result.agreement_rate - 2.0 / 3.0).abs() < 1e-12);

    let expected_mean = (1.0 + 2.0 / 3.0 + 1.0) / 3.0;
    assert!((batch.mean_agreement_rate - expected_mean).abs() < 1e-12);
    assert_eq!(batch.mean_confidence_variance, 0.0);
    assert!(!batch.insufficient_data);
}

#[tokio::test]
async fn empty_batch_is_flagged() {
    let checker = ConsistencyChecker::new(Arc::new(ScriptedJudge::new(&[(true, 1.0)])));
    let batch = checker.check_batch(&[], "correct").await;
    assert_eq!(batch.total_samples, 0);
    assert_eq!(batch.overall_consistency_rate, 0.0);
    assert!(batch.insufficient_data);
}
