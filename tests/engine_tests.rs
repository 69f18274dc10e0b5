//! Tests for the engine — extraction diagnosis from taste ratings and the
//! bounded per-equipment learning store.

use brew_coach::engine::*;
use proptest::prelude::*;
use rstest::rstest;

fn key() -> LearningKey {
    LearningKey::new("niche_zero", "espresso")
}

// ---------------------------------------------------------------------------
// Diagnosis
// ---------------------------------------------------------------------------

#[test]
fn test_sour_thin_cup_is_under() {
    let r = TasteRating::new()
        .with(TasteAttribute::Acidity, 2.0)
        .with(TasteAttribute::Sweetness, 2.0)
        .with(TasteAttribute::Flavor, 5.0)
        .with(TasteAttribute::Overall, 5.0);
    let d = diagnose(&r);
    assert_eq!(d.state, ExtractionState::Under);
    assert!((d.confidence - 1.62).abs() < 1e-9);
    assert_eq!(d.confidence_display(), "1.62");
}

#[test]
fn test_all_neutral_is_balanced_zero() {
    let mut r = TasteRating::new();
    for &attr in TasteAttribute::all() {
        r.set(attr, 5.0);
    }
    let d = diagnose(&r);
    assert_eq!(d.state, ExtractionState::Balanced);
    assert_eq!(d.confidence, 0.0);
}

#[test]
fn test_empty_ratings_balanced() {
    let d = diagnose(&TasteRating::new());
    assert_eq!(d.state, ExtractionState::Balanced);
    assert_eq!(d.confidence, 0.0);
    assert!(d.signals.is_empty());
}

#[test]
fn test_low_flavor_counts_toward_under() {
    // flavor has direction both: below neutral reads as under
    let d = diagnose(&TasteRating::new().with(TasteAttribute::Flavor, 1.0));
    assert_eq!(d.state, ExtractionState::Under);
}

#[test]
fn test_high_body_and_balance_read_as_over() {
    let r = TasteRating::new()
        .with(TasteAttribute::Body, 9.0)
        .with(TasteAttribute::Balance, 9.0);
    assert_eq!(diagnose(&r).state, ExtractionState::Over);
}

#[test]
fn test_high_acidity_is_not_over_signal() {
    // acidity only ever signals under-extraction
    let d = diagnose(&TasteRating::new().with(TasteAttribute::Acidity, 10.0));
    assert_eq!(d.state, ExtractionState::Balanced);
}

#[rstest]
#[case("", None)]
#[case("   ", None)]
#[case("abc", None)]
#[case("NaN", None)]
#[case("inf", None)]
#[case("7", Some(7.0))]
#[case("12", Some(10.0))]
#[case("-3", Some(0.0))]
fn test_parse_score_cases(#[case] raw: &str, #[case] expected: Option<f64>) {
    assert_eq!(parse_score(raw), expected);
}

#[test]
fn test_from_pairs_skips_unknown_and_malformed() {
    let r = TasteRating::from_pairs([("ACIDITY", "3"), ("crema", "9"), ("body", ""), ("flavor", "x")]);
    assert_eq!(r.len(), 1);
    assert_eq!(r.get(TasteAttribute::Acidity), Some(3.0));
}

proptest! {
    #[test]
    fn prop_confidence_never_negative(scores in proptest::collection::vec(proptest::option::of(0.0f64..=10.0), 8)) {
        let mut r = TasteRating::new();
        for (attr, score) in TasteAttribute::all().iter().zip(scores) {
            if let Some(s) = score {
                r.set(*attr, s);
            }
        }
        let d = diagnose(&r);
        prop_assert!(d.confidence >= 0.0);
        prop_assert!(d.confidence.is_finite());
    }

    #[test]
    fn prop_balanced_has_small_margin(scores in proptest::collection::vec(0.0f64..=10.0, 8)) {
        let mut r = TasteRating::new();
        for (attr, s) in TasteAttribute::all().iter().zip(scores) {
            r.set(*attr, s);
        }
        let d = diagnose(&r);
        if d.state != ExtractionState::Balanced {
            prop_assert!(d.confidence > 0.2);
        }
    }
}

// ---------------------------------------------------------------------------
// Learning
// ---------------------------------------------------------------------------

#[test]
fn test_three_under_updates_apply() {
    let mut store = LearningStore::new(LearningConfig::default());
    let d = ExtractionDiagnosis::new(ExtractionState::Under, 1.62);
    for _ in 0..3 {
        store.update(&key(), &d);
    }
    let rec = store.record(&key()).unwrap();
    assert_eq!(rec.sample_count, 3);
    assert!((rec.grind_offset + 0.81).abs() < 1e-9);
    assert!((rec.time_offset - 1.62).abs() < 1e-9);

    let adj = store.apply(&key(), 15.0, 28.0);
    assert!(adj.learning_applied);
    assert!((adj.grind - 14.19).abs() < 1e-9);
    assert_eq!(adj.reason, "learned from 3 samples");
}

#[test]
fn test_twenty_strong_under_updates_hit_bound() {
    let mut store = LearningStore::new(LearningConfig::default());
    let d = ExtractionDiagnosis::new(ExtractionState::Under, 3.0);
    for _ in 0..20 {
        store.update(&key(), &d);
    }
    let rec = store.record(&key()).unwrap();
    assert_eq!(rec.grind_offset, -4.0);
    assert_eq!(rec.time_offset, 12.0);
    assert_eq!(rec.sample_count, 20);
}

#[test]
fn test_gate_holds_below_min_samples() {
    let mut store = LearningStore::new(LearningConfig::default());
    let d = ExtractionDiagnosis::new(ExtractionState::Over, 3.0);
    store.update(&key(), &d);
    store.update(&key(), &d);
    let adj = store.apply(&key(), 10.0, 30.0);
    assert!(!adj.learning_applied);
    assert_eq!((adj.grind, adj.time), (10.0, 30.0));
    assert_eq!(adj.reason, "collecting feedback (2/3 samples)");
}

#[test]
fn test_weak_diagnosis_counts_sample_only() {
    let mut store = LearningStore::new(LearningConfig::default());
    let out = store.update(&key(), &ExtractionDiagnosis::new(ExtractionState::Under, 0.3));
    assert!(!out.offsets_moved);
    assert_eq!(out.record.grind_offset, 0.0);
    assert_eq!(out.record.sample_count, 1);
}

#[test]
fn test_keys_are_independent() {
    let mut store = LearningStore::new(LearningConfig::default());
    store.update(&key(), &ExtractionDiagnosis::new(ExtractionState::Under, 3.0));
    let other = LearningKey::new("niche_zero", "v60");
    assert!(store.record(&other).is_none());
    assert!(!store.apply(&other, 20.0, 180.0).learning_applied);
}

#[derive(Debug, Clone)]
enum Step {
    Update(ExtractionState, f64),
    Reset,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (prop_oneof![
            Just(ExtractionState::Under),
            Just(ExtractionState::Over),
            Just(ExtractionState::Balanced)
        ], 0.0f64..50.0)
            .prop_map(|(s, c)| Step::Update(s, c)),
        Just(Step::Reset),
    ]
}

proptest! {
    #[test]
    fn prop_offsets_stay_clamped(steps in proptest::collection::vec(step(), 0..60)) {
        let mut store = LearningStore::new(LearningConfig::default());
        for s in steps {
            match s {
                Step::Update(state, c) => { store.update(&key(), &ExtractionDiagnosis::new(state, c)); }
                Step::Reset => { store.reset(&key()); }
            }
            if let Some(rec) = store.record(&key()) {
                prop_assert!((-4.0..=4.0).contains(&rec.grind_offset));
                prop_assert!((-12.0..=12.0).contains(&rec.time_offset));
            }
        }
    }

    #[test]
    fn prop_apply_is_idempotent(n in 0usize..8, conf in 0.0f64..5.0, base in 0.0f64..40.0) {
        let mut store = LearningStore::new(LearningConfig::default());
        for _ in 0..n {
            store.update(&key(), &ExtractionDiagnosis::new(ExtractionState::Over, conf));
        }
        let a = store.apply(&key(), base, 30.0);
        let b = store.apply(&key(), base, 30.0);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_gate_never_applies_below_three(n in 0usize..3, conf in 0.0f64..10.0) {
        let mut store = LearningStore::new(LearningConfig::default());
        for _ in 0..n {
            store.update(&key(), &ExtractionDiagnosis::new(ExtractionState::Under, conf));
        }
        let adj = store.apply(&key(), 12.0, 28.0);
        prop_assert!(!adj.learning_applied);
        prop_assert_eq!(adj.grind, 12.0);
        prop_assert_eq!(adj.time, 28.0);
    }
}

#[test]
fn test_shared_store_across_threads() {
    let shared = new_shared_store(LearningConfig::default());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let s = shared.clone();
            std::thread::spawn(move || {
                shared_update(&s, &key(), &ExtractionDiagnosis::new(ExtractionState::Under, 3.0)).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let adj = shared_apply(&shared, &key(), 15.0, 28.0).unwrap();
    assert!(adj.learning_applied);
    assert_eq!(adj.reason, "learned from 4 samples");
}
