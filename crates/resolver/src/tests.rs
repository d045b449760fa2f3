use fbt_rule_model::{RuleKind, RuleRow, RuleTable};

use crate::explain::{explain, MatchType};
use crate::resolver::{resolve, resolve_with, Recommendation, ResolveOptions};

fn row(product: &str, target: &str, kind: RuleKind) -> RuleRow {
    RuleRow::new(product, target, kind)
}

fn helmet_table() -> RuleTable {
    RuleTable::from_rows(vec![
        row("helmet-001", "visor-x", RuleKind::Explicit).with_label("Visor"),
        row("helmet-001", "pinlock-y", RuleKind::Category).with_label("Pinlock"),
    ])
}

fn ids(recs: &[Recommendation]) -> Vec<&str> {
    recs.iter().map(|rec| rec.product_id.as_str()).collect()
}

#[test]
fn single_helmet_cart_keeps_table_order() {
    let recs = resolve(&["helmet-001"], &helmet_table(), 6);
    assert_eq!(ids(&recs), vec!["visor-x", "pinlock-y"]);
    assert_eq!(recs[0].kind, RuleKind::Explicit);
    assert_eq!(recs[0].matched_from, "helmet-001");
}

#[test]
fn cart_contents_are_never_recommended() {
    let recs = resolve(&["helmet-001", "visor-x"], &helmet_table(), 6);
    assert_eq!(ids(&recs), vec!["pinlock-y"]);
}

#[test]
fn empty_cart_yields_empty_result() {
    let cart: [&str; 0] = [];
    assert!(resolve(&cart, &helmet_table(), 6).is_empty());
}

#[test]
fn unknown_products_contribute_nothing() {
    let recs = resolve(&["mystery-item", "helmet-001"], &helmet_table(), 6);
    assert_eq!(ids(&recs), vec!["visor-x", "pinlock-y"]);
}

#[test]
fn limit_truncates_and_zero_limit_is_empty() {
    let table = helmet_table();
    assert_eq!(ids(&resolve(&["helmet-001"], &table, 1)), vec!["visor-x"]);
    assert!(resolve(&["helmet-001"], &table, 0).is_empty());
}

#[test]
fn cart_order_dominates_and_duplicates_keep_first() {
    let table = RuleTable::from_rows(vec![
        row("jacket-1", "gloves-1", RuleKind::Explicit).with_label("from jacket"),
        row("jacket-1", "back-protector", RuleKind::Explicit),
        row("pants-1", "boots-1", RuleKind::Explicit),
        row("pants-1", "gloves-1", RuleKind::Explicit).with_label("from pants"),
    ]);

    let recs = resolve(&["pants-1", "jacket-1"], &table, 6);
    assert_eq!(ids(&recs), vec!["boots-1", "gloves-1", "back-protector"]);
    assert_eq!(recs[1].label.as_deref(), Some("from pants"));
    assert_eq!(recs[1].matched_from, "pants-1");
}

#[test]
fn explicit_row_wins_over_category_row_for_same_target() {
    let table = RuleTable::from_rows(vec![
        row("helmet-001", "bag-z", RuleKind::Category).with_label("Generic bag"),
        row("helmet-001", "visor-x", RuleKind::Explicit),
        row("helmet-001", "bag-z", RuleKind::Explicit).with_label("Curated bag"),
    ]);

    let recs = resolve(&["helmet-001"], &table, 6);
    assert_eq!(ids(&recs), vec!["bag-z", "visor-x"]);
    assert_eq!(recs[0].label.as_deref(), Some("Curated bag"));
    assert_eq!(recs[0].kind, RuleKind::Explicit);
}

#[test]
fn duplicate_pairs_in_table_are_deduplicated() {
    let table = RuleTable::from_rows(vec![
        row("helmet-001", "visor-x", RuleKind::Explicit).with_label("first"),
        row("helmet-001", "visor-x", RuleKind::Explicit).with_label("second"),
    ]);
    let recs = resolve(&["helmet-001"], &table, 6);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].label.as_deref(), Some("first"));
}

#[test]
fn resolution_is_deterministic_and_bounded() {
    let table = RuleTable::from_rows(vec![
        row("a", "b", RuleKind::Explicit),
        row("a", "c", RuleKind::Category),
        row("b", "c", RuleKind::Explicit),
        row("b", "d", RuleKind::Category),
        row("c", "a", RuleKind::Explicit),
        row("c", "e", RuleKind::Explicit),
    ]);
    let carts: [&[&str]; 4] = [&["a"], &["a", "b"], &["c", "a"], &["b", "b"]];
    for cart in carts {
        for limit in 0..5 {
            let first = resolve(cart, &table, limit);
            let second = resolve(cart, &table, limit);
            assert_eq!(first, second);
            assert!(first.len() <= limit);
            for rec in &first {
                assert!(!cart.contains(&rec.product_id.as_str()));
            }
            let mut distinct: Vec<&str> = ids(&first);
            distinct.sort_unstable();
            distinct.dedup();
            assert_eq!(distinct.len(), first.len());
        }
    }
}

fn keyword_table() -> RuleTable {
    RuleTable::from_rows(vec![
        row("agv-k6-helmet", "agv-k6-visor", RuleKind::Explicit),
        row("[helmet | visor | shield] (any product)", "ogio-head-case-helmet-bag", RuleKind::Category)
            .with_label("Helmet bag"),
        row("[helmet | visor | shield] (any product)", "pinlock-earplug-set-w-case", RuleKind::Category),
        row("[boot | shoe]", "bel-ray-chain-lube", RuleKind::Category),
    ])
}

#[test]
fn keyword_fallback_is_opt_in() {
    let table = keyword_table();
    assert!(resolve(&["shoei-x-15-helmet"], &table, 6).is_empty());

    let options = ResolveOptions {
        limit: 6,
        category_fallback: true,
    };
    let recs = resolve_with(&["shoei-x-15-helmet"], &table, &options);
    assert_eq!(
        ids(&recs),
        vec!["ogio-head-case-helmet-bag", "pinlock-earplug-set-w-case"]
    );
}

#[test]
fn keyword_fallback_skips_products_with_own_rows() {
    let options = ResolveOptions {
        limit: 6,
        category_fallback: true,
    };
    let recs = resolve_with(&["agv-k6-helmet"], &keyword_table(), &options);
    assert_eq!(ids(&recs), vec!["agv-k6-visor"]);
}

#[test]
fn explain_reports_match_type() {
    let table = keyword_table();
    let options = ResolveOptions {
        limit: 6,
        category_fallback: true,
    };
    assert_eq!(
        explain("agv-k6-helmet", &table, &options).match_type,
        MatchType::Explicit
    );
    let fallback = explain("sidi-rex-boot", &table, &options);
    assert_eq!(fallback.match_type, MatchType::Category);
    assert_eq!(fallback.matched_rule.as_deref(), Some("boot | shoe"));
    assert_eq!(fallback.recommendations.len(), 1);
    assert_eq!(
        explain("garmin-watch", &table, &options).match_type,
        MatchType::None
    );
}

#[test]
fn recommendation_serializes_for_api_consumers() {
    let recs = resolve(&["helmet-001"], &helmet_table(), 1);
    let json = serde_json::to_value(&recs[0]).unwrap();
    assert_eq!(json["product_id"], "visor-x");
    assert_eq!(json["label"], "Visor");
    assert_eq!(json["kind"], "Explicit");
}
