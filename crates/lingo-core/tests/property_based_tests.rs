use lingo_core::{
    DefaultPluralRule, FallbackLocale, FallbackStrategy, MessageContext, MessageValue, PluralRule, ResolveOptions,
    Resolver, compile_source, fallback_chain, parse_path,
};
use proptest::prelude::*;
use serde_json::json;

/// Text without placeholder, plural or linked syntax, including `%` and newlines.
fn arb_plain_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => prop::string::string_regex("[a-zA-Z0-9 ,.!?'\"%\\n\\-]{1,8}").unwrap(),
            1 => Just("%%".to_string()),
            1 => Just("100%".to_string()),
            1 => Just("\n".to_string()),
        ],
        0..6,
    )
    .prop_map(|parts| parts.concat())
}

/// Text before a `{0}` placeholder; no `%`, which would turn it into `%{0}`.
fn arb_prefix() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ,.!?'\"\\-]{0,40}").unwrap()
}

fn arb_segment() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,8}").unwrap()
}

fn arb_locale() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::string::string_regex("[a-z]{2,3}|[A-Z]{2}").unwrap(), 1..4)
        .prop_map(|parts| parts.join("-"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn plain_text_renders_verbatim(text in arb_plain_text()) {
        let message = compile_source(&text).unwrap();
        prop_assert_eq!(message(&MessageContext::new("en")), text);
    }

    #[test]
    fn list_argument_is_interpolated(prefix in arb_prefix(), arg in arb_plain_text()) {
        let list = vec![json!(arg.clone())];
        let message = compile_source(&format!("{prefix}{{0}}")).unwrap();
        prop_assert_eq!(message(&MessageContext::new("en").with_list(&list)), format!("{prefix}{arg}"));
    }

    #[test]
    fn default_plural_rule_stays_in_range(choice in any::<i64>(), cases in 1usize..8) {
        prop_assert!(DefaultPluralRule.select(choice, cases) < cases);
    }

    #[test]
    fn dotted_paths_round_trip(segments in prop::collection::vec(arb_segment(), 1..5)) {
        let parsed = parse_path(&segments.join(".")).unwrap();
        prop_assert_eq!(parsed.iter().map(|segment| segment.to_string()).collect::<Vec<_>>(), segments);
    }

    #[test]
    fn set_message_then_resolve(segments in prop::collection::vec(arb_segment(), 1..4), text in "[a-z ]{1,20}") {
        let resolver = Resolver::default();
        let path = segments.join(".");
        resolver.set_message("en-US", &path, MessageValue::from(text.as_str())).unwrap();

        prop_assert_eq!(resolver.translate(&path, &ResolveOptions::new()).into_option(), Some(text));
    }

    #[test]
    fn fallback_chain_starts_with_locale_and_has_no_duplicates(
        locale in arb_locale(),
        fallbacks in prop::collection::vec(arb_locale(), 0..4),
        locale_chain in any::<bool>(),
    ) {
        let strategy = if locale_chain { FallbackStrategy::LocaleChain } else { FallbackStrategy::Simple };
        let chain = fallback_chain(&locale, &FallbackLocale::List(fallbacks), strategy);

        prop_assert_eq!(chain[0].as_str(), locale.as_str());
        let mut unique = chain.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), chain.len());
    }
}
