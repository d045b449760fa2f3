use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use fbt_catalog_cache::ListingProduct;
use fbt_compat_validator::fit::tokens;
use fbt_compat_validator::FitRules;
use fbt_rule_model::{Priority, RuleKind, RuleRow, RuleTable};
use tracing::debug;

pub const DEFAULT_PER_PRODUCT: usize = 3;
const RELEVANCE_POOL: usize = 30;
const OTHER_TYPE: &str = "other";
const HELMET_TYPE: &str = "helmet";
const ACCESSORY_TYPE: &str = "helmet_accessory";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Explicit rows per product; only the first three get a priority.
    pub per_product: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            per_product: DEFAULT_PER_PRODUCT,
        }
    }
}

/// Picks recommendations for every listed product.
///
/// Candidate sources, in order: helmet accessories sharing a brand or model
/// token (helmets only), complementary product types, shared categories, the
/// same brand, then the most expensive products of another type. A candidate
/// the fit rules call a definite mismatch is never picked. Picks are written
/// most expensive first.
pub struct Generator<'a> {
    rules: &'a FitRules,
    options: SyncOptions,
}

impl<'a> Generator<'a> {
    pub fn new(rules: &'a FitRules) -> Self {
        Self {
            rules,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Explicit rows in slug order, then `existing`'s category rows as they
    /// were. A regenerated pair keeps the proof state it had in `existing`.
    pub fn generate(&self, products: &[ListingProduct], existing: &RuleTable) -> RuleTable {
        let catalog = Catalog::index(products, self.rules);
        let reviewed: HashMap<(&str, &str), &RuleRow> = existing
            .rows()
            .iter()
            .filter(|row| row.kind == RuleKind::Explicit)
            .filter(|row| row.verification.is_set() || row.notes.is_some())
            .map(|row| {
                (
                    (row.product_id.as_str(), row.recommended_product_id.as_str()),
                    row,
                )
            })
            .collect();

        let mut sources = catalog.order.clone();
        sources.sort_by(|a, b| a.slug.cmp(&b.slug));

        let mut rows = Vec::new();
        for source in sources {
            let source_type = catalog.type_of(&source.slug);
            let mut picks = self.choose(source, source_type, &catalog);
            picks.sort_by(|a, b| by_price_desc(a, b));
            picks.truncate(self.options.per_product);

            let label = if source_type == OTHER_TYPE {
                "Recommended item".to_string()
            } else {
                format!("Complements your {source_type}")
            };
            for (rank, pick) in picks.into_iter().enumerate() {
                let mut row =
                    RuleRow::new(source.slug.clone(), pick.slug.clone(), RuleKind::Explicit)
                        .with_label(label.clone())
                        .with_priority(Priority::from_rank(rank));
                if let Some(previous) = reviewed.get(&(source.slug.as_str(), pick.slug.as_str())) {
                    row.verification = previous.verification.clone();
                    row.notes = previous.notes.clone();
                }
                rows.push(row);
            }
        }

        let explicit = rows.len();
        rows.extend(
            existing
                .rows()
                .iter()
                .filter(|row| row.kind == RuleKind::Category)
                .cloned(),
        );
        debug!(
            products = catalog.order.len(),
            explicit,
            category = rows.len() - explicit,
            "rules generated"
        );
        RuleTable::from_rows(rows)
    }

    fn choose<'p>(
        &self,
        source: &'p ListingProduct,
        source_type: &str,
        catalog: &Catalog<'p>,
    ) -> Vec<&'p ListingProduct> {
        let mut picks = Picks::new(source, self.rules, self.options.per_product);
        let other_type = |candidate: &&'p ListingProduct| catalog.type_of(&candidate.slug) != source_type;

        if source_type == HELMET_TYPE {
            let accessories = picks.fresh(catalog.of_type(ACCESSORY_TYPE));
            picks.take(self.fitting_accessories(source, accessories));
        }

        let complementary = picks.fresh(
            self.rules
                .allowed_targets(source_type)
                .iter()
                .flat_map(|target| catalog.of_type(target)),
        );
        picks.take(rank_candidates(source, complementary));

        let shared = picks.fresh(
            source
                .categories
                .iter()
                .flat_map(|category| catalog.in_category(*category))
                .filter(other_type),
        );
        picks.take(rank_candidates(source, shared));

        if source.brand_id.is_some() {
            let mut brand = picks.fresh(
                catalog
                    .order
                    .iter()
                    .copied()
                    .filter(|candidate| candidate.brand_id == source.brand_id)
                    .filter(other_type),
            );
            brand.sort_by(|a, b| by_price_desc(a, b));
            picks.take(brand);
        }

        let global = picks.fresh(catalog.by_price.iter().copied().filter(other_type));
        picks.take(global);

        // Same-type fill only for products nothing else describes.
        if source_type == OTHER_TYPE {
            let rest = picks.fresh(catalog.by_price.iter().copied());
            picks.take(rest);
        }
        picks.picked
    }

    /// Accessories sharing a brand or model token with the helmet: same brand
    /// first, then more shared tokens, then price.
    fn fitting_accessories<'p>(
        &self,
        source: &ListingProduct,
        candidates: Vec<&'p ListingProduct>,
    ) -> Vec<&'p ListingProduct> {
        let source_tokens = self.fit_tokens(source);
        let mut scored: Vec<(bool, usize, &'p ListingProduct)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let overlap = source_tokens
                    .intersection(&self.fit_tokens(candidate))
                    .count();
                let brand = same_brand(source, candidate);
                (brand || overlap > 0).then_some((brand, overlap, candidate))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(b.1.cmp(&a.1))
                .then_with(|| by_price_desc(a.2, b.2))
        });
        scored.into_iter().map(|(_, _, candidate)| candidate).collect()
    }

    fn fit_tokens(&self, product: &ListingProduct) -> BTreeSet<String> {
        let identity = self
            .rules
            .identity(&format!("{} {}", product.slug, product.name));
        identity.brands.into_iter().chain(identity.models).collect()
    }
}

#[derive(Default)]
struct Catalog<'p> {
    /// Listing order, first occurrence of each slug.
    order: Vec<&'p ListingProduct>,
    by_price: Vec<&'p ListingProduct>,
    by_category: HashMap<u64, Vec<&'p ListingProduct>>,
    by_type: HashMap<String, Vec<&'p ListingProduct>>,
    types: HashMap<&'p str, String>,
}

impl<'p> Catalog<'p> {
    fn index(products: &'p [ListingProduct], rules: &FitRules) -> Self {
        let mut catalog = Catalog::default();
        for product in products {
            if catalog.types.contains_key(product.slug.as_str()) {
                continue;
            }
            let product_type = detect_type(rules, product);
            catalog.order.push(product);
            for category in &product.categories {
                catalog.by_category.entry(*category).or_default().push(product);
            }
            catalog
                .by_type
                .entry(product_type.clone())
                .or_default()
                .push(product);
            catalog.types.insert(product.slug.as_str(), product_type);
        }
        catalog.by_price = catalog.order.clone();
        catalog.by_price.sort_by(|a, b| by_price_desc(a, b));
        catalog
    }

    fn type_of(&self, slug: &str) -> &str {
        self.types.get(slug).map(String::as_str).unwrap_or(OTHER_TYPE)
    }

    fn of_type<'s>(&'s self, product_type: &str) -> impl Iterator<Item = &'p ListingProduct> + 's {
        self.by_type.get(product_type).into_iter().flatten().copied()
    }

    fn in_category<'s>(&'s self, category: u64) -> impl Iterator<Item = &'p ListingProduct> + 's {
        self.by_category.get(&category).into_iter().flatten().copied()
    }
}

/// Slug and name decide first; category names only when they say nothing.
fn detect_type(rules: &FitRules, product: &ListingProduct) -> String {
    rules
        .detect_type(&format!("{} {}", product.slug, product.name))
        .or_else(|| rules.detect_type(&product.category_names.join(" ")))
        .unwrap_or(OTHER_TYPE)
        .to_string()
}

struct Picks<'p, 'r> {
    source: &'p ListingProduct,
    rules: &'r FitRules,
    limit: usize,
    seen: HashSet<&'p str>,
    picked: Vec<&'p ListingProduct>,
}

impl<'p, 'r> Picks<'p, 'r> {
    fn new(source: &'p ListingProduct, rules: &'r FitRules, limit: usize) -> Self {
        Self {
            source,
            rules,
            limit,
            seen: HashSet::from([source.slug.as_str()]),
            picked: Vec::new(),
        }
    }

    /// Distinct candidates not picked yet that are not a definite mismatch.
    fn fresh(
        &self,
        candidates: impl IntoIterator<Item = &'p ListingProduct>,
    ) -> Vec<&'p ListingProduct> {
        let mut distinct = HashSet::new();
        candidates
            .into_iter()
            .filter(|candidate| !self.seen.contains(candidate.slug.as_str()))
            .filter(|candidate| distinct.insert(candidate.slug.as_str()))
            .filter(|candidate| {
                self.rules
                    .mismatch(&self.source.slug, &candidate.slug)
                    .is_none()
            })
            .collect()
    }

    fn take(&mut self, ranked: Vec<&'p ListingProduct>) {
        for candidate in ranked {
            if self.picked.len() >= self.limit {
                return;
            }
            if self.seen.insert(candidate.slug.as_str()) {
                self.picked.push(candidate);
            }
        }
    }
}

/// Keeps the most relevant candidates (shared categories, then brand, then
/// price) and orders them by price.
fn rank_candidates<'p>(
    source: &ListingProduct,
    mut candidates: Vec<&'p ListingProduct>,
) -> Vec<&'p ListingProduct> {
    let relevance = |candidate: &ListingProduct| {
        (
            source.categories.intersection(&candidate.categories).count(),
            source.brand_id.is_some() && source.brand_id == candidate.brand_id,
        )
    };
    candidates.sort_by(|a, b| {
        relevance(b)
            .cmp(&relevance(a))
            .then_with(|| by_price_desc(a, b))
    });
    candidates.truncate(RELEVANCE_POOL);
    candidates.sort_by(|a, b| by_price_desc(a, b));
    candidates
}

fn same_brand(a: &ListingProduct, b: &ListingProduct) -> bool {
    if a.brand_id.is_some() && a.brand_id == b.brand_id {
        return true;
    }
    match (tokens(&a.slug).first(), tokens(&b.slug).first()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn by_price_desc(a: &ListingProduct, b: &ListingProduct) -> Ordering {
    b.price.total_cmp(&a.price)
}
