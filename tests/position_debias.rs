use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use verdict_harness::judge::{CacheMode, EvaluationSample, Judge, JudgeError, Judgment};
use verdict_harness::pairwise::{
    ComparisonEvent, ComparisonObserver, ComparisonSample, ObserverError, PositionDebiaser,
    Winner,
};
use verdict_harness::prompts::{FIRST_RESPONSE_LABEL, SECOND_RESPONSE_LABEL};

/// Split a pairwise presentation back into (first shown, second shown).
fn shown(sample: &EvaluationSample) -> (String, String) {
    let body = sample
        .output
        .strip_prefix(FIRST_RESPONSE_LABEL)
        .unwrap_or(&sample.output);
    let (first, second) = body.split_once(SECOND_RESPONSE_LABEL).unwrap();
    (first.trim().to_string(), second.trim().to_string())
}

/// Prefers the output with the higher fixed quality, whatever the order.
struct QualityJudge {
    quality: HashMap<String, i32>,
    calls: AtomicUsize,
}

impl QualityJudge {
    fn new(pairs: &[(&str, i32)]) -> Self {
        Self {
            quality: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Judge for QualityJudge {
    async fn try_evaluate(
        &self,
        sample: &EvaluationSample,
        _cache: CacheMode,
    ) -> Result<Judgment, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (first, second) = shown(sample);
        let q = |s: &str| self.quality.get(s).copied().unwrap_or(0);
        Ok(Judgment::new(q(&first) > q(&second), 0.9, "by quality"))
    }
}

/// Always says the first-shown output is better.
struct FirstSlotJudge;

#[async_trait]
impl Judge for FirstSlotJudge {
    async fn try_evaluate(
        &self,
        _sample: &EvaluationSample,
        _cache: CacheMode,
    ) -> Result<Judgment, JudgeError> {
        Ok(Judgment::new(true, 0.8, "first looks better"))
    }
}

/// Always fails.
struct DownJudge;

#[async_trait]
impl Judge for DownJudge {
    async fn try_evaluate(
        &self,
        _sample: &EvaluationSample,
        _cache: CacheMode,
    ) -> Result<Judgment, JudgeError> {
        Err(JudgeError::Parse("garbage".into()))
    }
}

fn outputs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn compare_with_order_independent_judge_is_consistent() {
    let judge = Arc::new(QualityJudge::new(&[("good", 2), ("bad", 1)]));
    let debiaser = PositionDebiaser::new(judge.clone());

    let r = debiaser.compare("q", "good", "bad", "helpful").await;
    assert_eq!(r.winner, Winner::A);
    assert!(r.consistent);
    assert!(!r.position_bias_detected);
    assert!((r.confidence - 0.9).abs() < 1e-12);

    let r = debiaser.compare("q", "bad", "good", "helpful").await;
    assert_eq!(r.winner, Winner::B);
    assert!(r.consistent);

    assert_eq!(judge.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn compare_sample_matches_field_by_field_compare() {
    let judge = Arc::new(QualityJudge::new(&[("good", 2), ("bad", 1)]));
    let debiaser = PositionDebiaser::new(judge.clone());

    let sample = ComparisonSample::new("q", "bad", "good", "helpful");
    let from_sample = debiaser.compare_sample(&sample).await;
    let direct = debiaser.compare("q", "bad", "good", "helpful").await;

    assert_eq!(from_sample.winner, Winner::B);
    assert!(from_sample.consistent);
    assert_eq!(from_sample.winner, direct.winner);
    assert_eq!(from_sample.confidence, direct.confidence);
    assert_eq!(from_sample.reasoning, direct.reasoning);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn first_slot_preference_is_flagged_as_position_bias() {
    let debiaser = PositionDebiaser::new(Arc::new(FirstSlotJudge));
    let r = debiaser.compare("q", "x", "y", "helpful").await;
    assert_eq!(r.winner, Winner::Tie);
    assert!(!r.consistent);
    assert!(r.position_bias_detected);
    assert!((r.confidence - 0.4).abs() < 1e-12);
    assert!(r.reasoning.contains("first looks better"));
}

#[tokio::test]
async fn judge_failures_degrade_to_low_confidence_tie() {
    let debiaser = PositionDebiaser::new(Arc::new(DownJudge));
    let r = debiaser.compare("q", "x", "y", "helpful").await;
    assert_eq!(r.winner, Winner::Tie);
    assert_eq!(r.confidence, 0.0);
    assert!(r.forward_judgment.is_error());
    assert!(r.reverse_judgment.is_error());
}

#[tokio::test]
async fn rank_orders_a_transitive_tournament() {
    let judge = Arc::new(QualityJudge::new(&[("O1", 3), ("O2", 2), ("O3", 1)]));
    let debiaser = PositionDebiaser::new(judge.clone());

    let ranking = debiaser
        .rank("q", &outputs(&["O2", "O3", "O1"]), "quality")
        .await;

    let ordered: Vec<(&str, f64)> = ranking
        .entries
        .iter()
        .map(|e| (e.output.as_str(), e.score))
        .collect();
    assert_eq!(ordered, vec![("O1", 2.0), ("O2", 1.0), ("O3", 0.0)]);
    assert_eq!(ranking.order(), vec![2, 0, 1]);
    assert_eq!(ranking.total_comparisons, 3);
    assert_eq!(ranking.comparisons.len(), 3);
    assert_eq!(ranking.position_bias_count, 0);
    // Two judge calls per pair.
    assert_eq!(judge.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn tournament_scores_sum_to_pair_count() {
    let items = outputs(&["a", "b", "c", "d", "e"]);

    let ranking = PositionDebiaser::new(Arc::new(FirstSlotJudge))
        .rank("q", &items, "quality")
        .await;
    let total: f64 = ranking.entries.iter().map(|e| e.score).sum();
    assert_eq!(total, 10.0);
    assert_eq!(ranking.position_bias_count, 10);
    assert!((ranking.position_bias_rate() - 1.0).abs() < 1e-12);

    let judge = QualityJudge::new(&[("a", 1), ("b", 5), ("c", 3), ("d", 2), ("e", 4)]);
    let ranking = PositionDebiaser::new(Arc::new(judge))
        .rank("q", &items, "quality")
        .await;
    let total: f64 = ranking.entries.iter().map(|e| e.score).sum();
    assert_eq!(total, 10.0);
    let order: Vec<&str> = ranking.entries.iter().map(|e| e.output.as_str()).collect();
    assert_eq!(order, vec!["b", "e", "c", "d", "a"]);
}

#[tokio::test]
async fn rank_handles_trivial_inputs() {
    let debiaser = PositionDebiaser::new(Arc::new(FirstSlotJudge));

    let empty = debiaser.rank("q", &[], "quality").await;
    assert!(empty.entries.is_empty());
    assert_eq!(empty.total_comparisons, 0);
    assert_eq!(empty.position_bias_rate(), 0.0);

    let single = debiaser.rank("q", &outputs(&["only"]), "quality").await;
    assert_eq!(single.entries.len(), 1);
    assert_eq!(single.entries[0].score, 0.0);
}

struct RecordingObserver {
    events: Mutex<Vec<(usize, usize, usize, usize)>>,
    fail: bool,
}

#[async_trait]
impl ComparisonObserver for RecordingObserver {
    async fn on_comparison(&self, event: ComparisonEvent) -> Result<(), ObserverError> {
        self.events
            .lock()
            .unwrap()
            .push((event.i, event.j, event.completed, event.total));
        if self.fail {
            return Err(ObserverError::Message("store unavailable".into()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn observer_sees_every_comparison_and_cannot_abort_ranking() {
    for fail in [false, true] {
        let observer = Arc::new(RecordingObserver {
            events: Mutex::new(Vec::new()),
            fail,
        });
        let judge = Arc::new(QualityJudge::new(&[("O1", 3), ("O2", 2), ("O3", 1)]));
        let ranking = PositionDebiaser::new(judge)
            .with_observer(observer.clone())
            .rank("q", &outputs(&["O1", "O2", "O3"]), "quality")
            .await;

        assert_eq!(ranking.entries[0].output, "O1");
        let events = observer.events.lock().unwrap().clone();
        assert_eq!(events, vec![(0, 1, 1, 3), (0, 2, 2, 3), (1, 2, 3, 3)]);
    }
}
