use std::fs::File;

use fbt_compat_validator::{
    build_proofs_template, validate_file, write_proofs_template, Classification, ValidationMode,
    Validator,
};
use fbt_rule_model::parse_rules;

const RULES: &str = "\
Product ID,Recommended Product ID,Label,Type
shoei-x-15-helmet,shoei-cwr-1-shield,Shield,Explicit
jacket-9,pants-9,Pants,Explicit
";

#[test]
fn filled_worksheet_clears_strict_validation() {
    let dir = tempfile::tempdir().unwrap();
    let rules_path = dir.path().join("product_recommendations.csv");
    let proofs_path = dir.path().join("compatibility_proofs.csv");
    std::fs::write(&rules_path, RULES).unwrap();
    let validator = Validator::default();

    let before = validate_file(&rules_path, &validator, ValidationMode::Strict, None).unwrap();
    assert!(before.blocking());
    assert!(before.summary().missing_proof >= 1);

    let table = parse_rules(RULES).unwrap().into_table();
    let mut rows = build_proofs_template(&table, validator.rules(), None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].recommended_product_id, "shoei-cwr-1-shield");
    assert!(rows[0].verified.is_empty());

    rows[0].verified = "yes".into();
    rows[0].source = "https://shoei.example.com/fitment/x-15".into();
    write_proofs_template(&rows, File::create(&proofs_path).unwrap()).unwrap();

    let after = validate_file(
        &rules_path,
        &validator,
        ValidationMode::Strict,
        Some(&proofs_path),
    )
    .unwrap();
    assert!(after.proof_issues.is_empty());
    assert!(after
        .findings
        .iter()
        .filter(|finding| finding.recommended_product_id == "shoei-cwr-1-shield")
        .all(|finding| finding.classification == Classification::Verified));
    assert_eq!(after.summary().missing_proof, 0);
}
