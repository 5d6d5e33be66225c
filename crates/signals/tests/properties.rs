use fieldmatch_protocol::FieldSignals;
use fieldmatch_signals::{field_signature, form_signature, profile_signature, HeuristicScorer};
use proptest::prelude::*;

fn arb_signals() -> impl Strategy<Value = FieldSignals> {
    (
        "[A-Za-z _:*-]{0,24}",
        "[A-Za-z_]{0,16}",
        "[A-Za-z ]{0,20}",
        "[A-Za-z ]{0,20}",
        prop_oneof![
            Just(String::new()),
            Just("text".to_string()),
            Just("email".to_string()),
            Just("tel".to_string()),
            Just("url".to_string()),
            Just("date".to_string()),
        ],
        "[a-z -]{0,20}",
        "[A-Za-z ]{0,40}",
    )
        .prop_map(
            |(label, name, placeholder, aria_label, input_type, autocomplete, proximity_text)| {
                FieldSignals {
                    label,
                    name,
                    placeholder,
                    aria_label,
                    input_type,
                    autocomplete,
                    proximity_text,
                    ..FieldSignals::default()
                }
            },
        )
}

proptest! {
    #[test]
    fn scores_stay_in_unit_range(signals in arb_signals()) {
        for scored in HeuristicScorer::default().score(&signals) {
            prop_assert!(scored.score > 0.0 && scored.score <= 1.0, "score {}", scored.score);
            prop_assert!(scored.confidence() <= 100);
        }
    }

    #[test]
    fn ranking_is_stable_and_sorted(signals in arb_signals()) {
        let scorer = HeuristicScorer::default();
        let first = scorer.score(&signals);
        let second = scorer.score(&signals.clone());
        prop_assert_eq!(&first, &second);
        for pair in first.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn field_signature_is_deterministic(signals in arb_signals()) {
        let sig = field_signature(&signals);
        prop_assert_eq!(&sig, &field_signature(&signals.clone()));
        prop_assert!(!sig.is_empty());
        prop_assert!(sig.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn field_signature_ignores_case(signals in arb_signals()) {
        let shouted = FieldSignals {
            label: signals.label.to_uppercase(),
            name: signals.name.to_uppercase(),
            placeholder: signals.placeholder.to_uppercase(),
            aria_label: signals.aria_label.to_uppercase(),
            input_type: signals.input_type.to_uppercase(),
            ..signals.clone()
        };
        prop_assert_eq!(field_signature(&signals), field_signature(&shouted));
    }

    #[test]
    fn form_signature_ignores_field_order(
        mut fields in proptest::collection::vec(arb_signals(), 1..6),
        now in 0u64..4_000_000_000_000,
    ) {
        let forward = form_signature(&fields, "https://forms.test/apply", now);
        fields.reverse();
        prop_assert_eq!(forward, form_signature(&fields, "https://forms.test/apply", now));
    }

    #[test]
    fn profile_signature_ignores_key_order(mut keys in proptest::collection::vec("[a-zA-Z_]{1,12}", 0..8)) {
        let forward = profile_signature(&keys);
        keys.reverse();
        prop_assert_eq!(forward, profile_signature(&keys));
    }
}

#[test]
fn signature_is_identical_across_runs() {
    // No per-process seeding: repeated calls agree.
    let signals = FieldSignals {
        label: "Email Address".into(),
        name: "email".into(),
        ..FieldSignals::default()
    };
    let expected = field_signature(&signals);
    for _ in 0..100 {
        assert_eq!(field_signature(&signals), expected);
    }
}
