//! Behavioural tests for `lodestar_filter`.

use std::collections::{BTreeMap, HashMap};

use lodestar_filter::{Filter, FilterErrorKind, Operand, PropertyLookup};
use proptest::prelude::*;

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Matching
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn object_class_with_ranking_filter() {
    let filter = Filter::parse("(&(objectClass=calc)(service.ranking>=5))").unwrap();

    assert!(filter.matches(&map(&[("objectClass", "calc"), ("service.ranking", "7")])));
    assert!(!filter.matches(&map(&[("objectClass", "calc"), ("service.ranking", "3")])));
    assert!(!filter.matches(&map(&[("objectClass", "other"), ("service.ranking", "7")])));
}

#[test]
fn every_operand_against_one_map() {
    let props = map(&[("name", "Lodestar Registry"), ("version", "2.1")]);

    let cases = [
        ("(name=Lodestar Registry)", true),
        ("(name~=registry)", true),
        ("(version>2.0)", true),
        ("(version>=2.1)", true),
        ("(version<2.1)", false),
        ("(version<=2.1)", true),
        ("(name=Lode*)", true),
        ("(name=*Reg*)", true),
        ("(name=*)", true),
        ("(missing=*)", false),
        ("(!(missing=*))", true),
        ("(|(missing=1)(version=2.1))", true),
        ("(&(missing=1)(version=2.1))", false),
    ];

    for (text, expected) in cases {
        let filter = Filter::parse(text).unwrap();
        assert_eq!(filter.matches(&props), expected, "{text}");
    }
}

#[test]
fn matches_against_std_hash_map_and_slices() {
    let filter = Filter::parse("(k=v)").unwrap();

    let hash: HashMap<&str, &str> = HashMap::from([("k", "v")]);
    assert!(filter.matches(&hash));

    let owned: HashMap<String, String> = HashMap::from([("k".to_owned(), "v".to_owned())]);
    assert!(filter.matches(&owned));

    let pairs = vec![("k", "v")];
    assert!(filter.matches(pairs.as_slice()));
}

struct CountingLookup {
    calls: core::cell::Cell<usize>,
}

impl PropertyLookup for CountingLookup {
    fn lookup(&self, _key: &str) -> Option<&str> {
        self.calls.set(self.calls.get() + 1);
        None
    }
}

#[test]
fn and_short_circuits_on_first_false_child() {
    let filter = Filter::parse("(&(a=1)(b=2)(c=3))").unwrap();
    let lookup = CountingLookup {
        calls: core::cell::Cell::new(0),
    };

    assert!(!filter.matches(&lookup));
    assert_eq!(lookup.calls.get(), 1);
}

#[test]
fn or_short_circuits_on_first_true_child() {
    let filter = Filter::parse("(|(!(a=1))(b=2))").unwrap();
    let lookup = CountingLookup {
        calls: core::cell::Cell::new(0),
    };

    assert!(filter.matches(&lookup));
    assert_eq!(lookup.calls.get(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction and errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn builders_produce_parsable_text() {
    let built = Filter::and([
        Filter::equal("objectClass", "calc"),
        Filter::not(Filter::present("disabled")),
        Filter::or([Filter::equal("mode", "fast"), Filter::equal("mode", "safe")]),
    ]);

    let text = built.to_string();
    assert_eq!(
        text,
        "(&(objectClass=calc)(!(disabled=*))(|(mode=fast)(mode=safe)))"
    );
    assert_eq!(Filter::parse(&text).unwrap(), built);
    assert_eq!(built.operand(), Operand::And);
    assert_eq!(built.children().len(), 3);
}

#[test]
fn error_reports_position_and_message() {
    let err = Filter::parse("(a=1)(b=2)").unwrap_err();
    assert_eq!(err.kind, FilterErrorKind::TrailingCharacters);
    assert_eq!(err.position, 5);
    assert_eq!(
        err.to_string(),
        "invalid filter at position 5: extraneous trailing characters"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

fn attribute() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9._]{0,8}"
}

fn value() -> impl Strategy<Value = String> {
    // Includes the characters that require escaping.
    "[a-z0-9 ()*\\\\]{1,8}"
}

fn leaf() -> impl Strategy<Value = Filter> {
    prop_oneof![
        (attribute(), value()).prop_map(|(a, v)| Filter::equal(a, v)),
        (attribute(), value()).prop_map(|(attribute, value)| Filter::Approx { attribute, value }),
        (attribute(), value()).prop_map(|(attribute, value)| Filter::Greater { attribute, value }),
        (attribute(), value()).prop_map(|(attribute, value)| Filter::LessEqual { attribute, value }),
        attribute().prop_map(Filter::present),
        (attribute(), prop::collection::vec("[a-z]{1,3}", 2..4)).prop_map(
            |(attribute, segments)| Filter::Substring {
                attribute,
                segments
            }
        ),
    ]
}

fn tree() -> impl Strategy<Value = Filter> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Filter::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Filter::Or),
            inner.prop_map(Filter::not),
        ]
    })
}

proptest! {
    #[test]
    fn rendered_filters_parse_back_to_the_same_tree(filter in tree()) {
        let text = filter.to_string();
        let parsed = Filter::parse(&text).unwrap();
        prop_assert_eq!(&parsed, &filter);
        prop_assert!(parsed.structurally_equal(&filter));
    }

    #[test]
    fn negation_inverts_every_match(filter in tree(), k in attribute(), v in value()) {
        let props = map(&[(k.as_str(), v.as_str())]);
        let negated = Filter::not(filter.clone());
        prop_assert_eq!(negated.matches(&props), !filter.matches(&props));
    }

    #[test]
    fn parser_never_panics_on_arbitrary_input(text in "[()&|!=<>~*a-c\\\\ ]{0,24}") {
        let _ = Filter::parse(&text);
    }
}
