use std::collections::BTreeSet;

use async_trait::async_trait;
use fbt_catalog_cache::{CatalogError, ListingProduct, ListingSource};
use fbt_compat_validator::{Classification, FitRules, ValidationMode, Validator};
use fbt_rule_model::{parse_rules, Priority, RuleKind, RuleRow, RuleTable, Verification};

use crate::errors::SyncError;
use crate::generate::{Generator, SyncOptions};
use crate::sync::sync_rules;

fn product(id: u64, slug: &str, price: f64, brand: Option<u64>, categories: &[u64]) -> ListingProduct {
    ListingProduct {
        id,
        slug: slug.to_string(),
        name: slug.replace('-', " "),
        price,
        brand_id: brand,
        categories: categories.iter().copied().collect::<BTreeSet<u64>>(),
        category_names: Vec::new(),
    }
}

fn gear() -> Vec<ListingProduct> {
    vec![
        product(1, "shoei-rf-1400-helmet", 629.0, Some(7), &[1]),
        product(2, "shoei-cwr-1-shield", 59.0, Some(7), &[2]),
        product(3, "arai-vas-v-pinlock-visor", 89.0, Some(8), &[2]),
        product(4, "shoei-rf-1400-pinlock-insert", 45.0, None, &[2]),
        product(5, "sena-50s-bluetooth", 329.0, Some(9), &[3]),
        product(6, "rev-it-tornado-jacket", 449.0, Some(10), &[4]),
        product(7, "rev-it-tornado-pants", 299.0, Some(10), &[4]),
        product(8, "alpinestars-gp-pro-gloves", 189.0, Some(11), &[5]),
        product(9, "garmin-zumo-xt", 499.0, Some(12), &[6]),
    ]
}

fn rows_for<'t>(table: &'t RuleTable, product: &str) -> Vec<&'t RuleRow> {
    table.rows_for(product).collect()
}

#[test]
fn helmet_gets_fitting_accessories_and_price_order() {
    let rules = FitRules::default();
    let table = Generator::new(&rules).generate(&gear(), &RuleTable::empty());

    let helmet = rows_for(&table, "shoei-rf-1400-helmet");
    let targets: Vec<&str> = helmet
        .iter()
        .map(|row| row.recommended_product_id.as_str())
        .collect();
    assert_eq!(
        targets,
        vec![
            "rev-it-tornado-jacket",
            "shoei-cwr-1-shield",
            "shoei-rf-1400-pinlock-insert"
        ]
    );
    assert!(!targets.contains(&"arai-vas-v-pinlock-visor"));

    let priorities: Vec<Option<Priority>> = helmet.iter().map(|row| row.priority).collect();
    assert_eq!(
        priorities,
        vec![
            Some(Priority::Primary),
            Some(Priority::Secondary),
            Some(Priority::Tertiary)
        ]
    );
    assert!(helmet
        .iter()
        .all(|row| row.kind == RuleKind::Explicit
            && row.label.as_deref() == Some("Complements your helmet")));
}

#[test]
fn generated_rules_have_no_definite_mismatch() {
    let rules = FitRules::default();
    let table = Generator::new(&rules).generate(&gear(), &RuleTable::empty());
    let findings = Validator::new(rules.clone()).validate(&table, ValidationMode::Heuristic);
    assert!(!findings.is_empty());
    assert!(findings
        .iter()
        .all(|finding| finding.classification != Classification::DefiniteMismatch));
}

#[test]
fn apparel_prefers_complementary_types_and_never_same_type() {
    let rules = FitRules::default();
    let table = Generator::new(&rules).generate(&gear(), &RuleTable::empty());
    let jacket = rows_for(&table, "rev-it-tornado-jacket");
    assert_eq!(jacket.len(), 3);
    assert_eq!(jacket[0].recommended_product_id, "shoei-rf-1400-helmet");
    assert!(jacket
        .iter()
        .any(|row| row.recommended_product_id == "rev-it-tornado-pants"));
    assert!(jacket
        .iter()
        .all(|row| rules.type_name(&row.recommended_product_id) != "jacket"));
}

#[test]
fn untyped_products_fall_back_to_priciest_items() {
    let rules = FitRules::default();
    let table = Generator::new(&rules).generate(&gear(), &RuleTable::empty());
    let gps = rows_for(&table, "garmin-zumo-xt");
    assert_eq!(gps[0].recommended_product_id, "shoei-rf-1400-helmet");
    assert_eq!(gps[0].label.as_deref(), Some("Recommended item"));
}

#[test]
fn per_product_limit_caps_rows_and_priorities() {
    let rules = FitRules::default();
    let table = Generator::new(&rules)
        .with_options(SyncOptions { per_product: 5 })
        .generate(&gear(), &RuleTable::empty());
    let gloves = rows_for(&table, "alpinestars-gp-pro-gloves");
    assert_eq!(gloves.len(), 5);
    assert_eq!(gloves[3].priority, None);

    let one = Generator::new(&rules)
        .with_options(SyncOptions { per_product: 1 })
        .generate(&gear(), &RuleTable::empty());
    assert_eq!(one.len(), gear().len());
}

#[test]
fn category_rows_and_reviews_survive_regeneration() {
    let rules = FitRules::default();
    let existing = RuleTable::from_rows(vec![
        RuleRow::new("[helmet] (any product)", "pinlock-120-insert", RuleKind::Category)
            .with_label("Fog-free riding"),
        RuleRow::new(
            "shoei-rf-1400-helmet",
            "shoei-cwr-1-shield",
            RuleKind::Explicit,
        )
        .with_verification(Verification::Verified {
            source: "shoei.com".into(),
        })
        .with_notes("CWR-1 fits RF-1400"),
        RuleRow::new("old-product", "older-product", RuleKind::Explicit),
    ]);
    let table = Generator::new(&rules).generate(&gear(), &existing);

    let last = table.rows().last().unwrap();
    assert_eq!(last.kind, RuleKind::Category);
    assert_eq!(last.label.as_deref(), Some("Fog-free riding"));
    assert!(table.rows_for("old-product").next().is_none());

    let shield = table
        .rows_for("shoei-rf-1400-helmet")
        .find(|row| row.recommended_product_id == "shoei-cwr-1-shield")
        .unwrap();
    assert!(shield.verification.is_verified());
    assert_eq!(shield.notes.as_deref(), Some("CWR-1 fits RF-1400"));
}

struct StubListing(Result<Vec<ListingProduct>, CatalogError>);

#[async_trait]
impl ListingSource for StubListing {
    async fn fetch_listing(&self) -> Result<Vec<ListingProduct>, CatalogError> {
        self.0.clone()
    }
}

const PREVIOUS: &str = "\
Product ID,Recommended Product ID,Label,Type
helmet-001,visor-x,Visor,Explicit
[helmet | visor] (any product),pinlock-120-insert,Pinlock,Category
";

#[tokio::test]
async fn sync_writes_prioritized_file_and_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product_recommendations.csv");
    std::fs::write(&path, PREVIOUS).unwrap();
    let rules = FitRules::default();
    let generator = Generator::new(&rules);

    let outcome = sync_rules(&StubListing(Ok(gear())), &generator, &path, false)
        .await
        .unwrap();
    let report = &outcome.report;
    assert_eq!(report.products, 9);
    assert_eq!(report.category_rows, 1);
    assert_eq!(report.explicit_rows, 27);
    assert_eq!(report.written.as_deref(), Some(path.as_path()));

    let backup = report.backup.clone().unwrap();
    assert_eq!(std::fs::read_to_string(backup).unwrap(), PREVIOUS);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Product ID,Recommended Product ID,Label,Type,Priority\n"));
    let parsed = parse_rules(&text).unwrap();
    assert!(parsed.warnings.is_empty());
    assert_eq!(parsed.rows.len(), 28);
    assert_eq!(parsed.rows[0].priority, Some(Priority::Primary));
    assert!(parsed.rows.iter().all(|row| row.product_id != "helmet-001"));
}

#[tokio::test]
async fn dry_run_and_empty_listing_leave_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.csv");
    std::fs::write(&path, PREVIOUS).unwrap();
    let rules = FitRules::default();
    let generator = Generator::new(&rules);

    let dry = sync_rules(&StubListing(Ok(gear())), &generator, &path, true)
        .await
        .unwrap();
    assert!(dry.report.dry_run);
    assert!(dry.report.written.is_none());
    assert_eq!(dry.table.len(), 28);

    let err = sync_rules(&StubListing(Ok(Vec::new())), &generator, &path, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::EmptyCatalog));

    let err = sync_rules(
        &StubListing(Err(CatalogError::Http("503".into()))),
        &generator,
        &path,
        false,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SyncError::Catalog(_)));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), PREVIOUS);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn missing_file_is_created_without_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.csv");
    let rules = FitRules::default();
    let outcome = sync_rules(&StubListing(Ok(gear())), &Generator::new(&rules), &path, false)
        .await
        .unwrap();
    assert!(outcome.report.backup.is_none());
    assert_eq!(outcome.report.category_rows, 0);
    assert!(path.exists());
}
