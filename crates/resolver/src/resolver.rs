use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use fbt_rule_model::{RuleKind, RuleRow, RuleTable};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 6;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendation {
    pub product_id: String,
    pub label: Option<String>,
    pub kind: RuleKind,
    /// Cart item whose rules produced this recommendation.
    pub matched_from: String,
}

impl Recommendation {
    fn from_row(row: &RuleRow, cart_id: &str) -> Self {
        Self {
            product_id: row.recommended_product_id.clone(),
            label: row.label.clone(),
            kind: row.kind,
            matched_from: cart_id.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveOptions {
    pub limit: usize,
    /// Let cart items without rows of their own match bracketed keyword rules.
    pub category_fallback: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            category_fallback: false,
        }
    }
}

impl ResolveOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// Resolves recommendations for the cart, at most `limit` of them.
pub fn resolve<S: AsRef<str>>(cart: &[S], table: &RuleTable, limit: usize) -> Vec<Recommendation> {
    resolve_with(cart, table, &ResolveOptions::with_limit(limit))
}

pub fn resolve_with<S: AsRef<str>>(
    cart: &[S],
    table: &RuleTable,
    options: &ResolveOptions,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if options.limit == 0 {
        return out;
    }

    let in_cart: HashSet<&str> = cart.iter().map(|id| id.as_ref()).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for cart_id in cart.iter().map(|id| id.as_ref()) {
        if cart_id.is_empty() {
            continue;
        }
        let rows = rows_for_cart_item(cart_id, table, options.category_fallback);
        for row in rank_rows(rows) {
            let target = row.recommended_product_id.as_str();
            if in_cart.contains(target) || !seen.insert(target) {
                continue;
            }
            out.push(Recommendation::from_row(row, cart_id));
            if out.len() >= options.limit {
                return out;
            }
        }
    }
    out
}

pub(crate) fn rows_for_cart_item<'t>(
    cart_id: &str,
    table: &'t RuleTable,
    category_fallback: bool,
) -> Vec<&'t RuleRow> {
    let direct: Vec<&RuleRow> = table.rows_for(cart_id).collect();
    if !direct.is_empty() || !category_fallback {
        return direct;
    }
    keyword_rows(cart_id, table)
        .map(|(_, rows)| rows)
        .unwrap_or_default()
}

/// First keyword rule (in table order) with a keyword contained in the id.
pub(crate) fn keyword_rows<'t>(
    cart_id: &str,
    table: &'t RuleTable,
) -> Option<(Vec<String>, Vec<&'t RuleRow>)> {
    let lowered = cart_id.to_ascii_lowercase();
    table
        .keyword_rules()
        .into_iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| lowered.contains(kw.as_str())))
}

/// Orders one cart item's rows: one entry per recommended id at the position
/// of its first occurrence, carried by the first Explicit row for that id if
/// there is one, else by its first row.
pub(crate) fn rank_rows<'t>(rows: Vec<&'t RuleRow>) -> Vec<&'t RuleRow> {
    let mut order: Vec<&str> = Vec::new();
    let mut chosen: HashMap<&str, &RuleRow> = HashMap::new();
    for row in rows {
        match chosen.entry(row.recommended_product_id.as_str()) {
            Entry::Vacant(slot) => {
                order.push(row.recommended_product_id.as_str());
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if slot.get().kind == RuleKind::Category && row.kind == RuleKind::Explicit {
                    slot.insert(row);
                }
            }
        }
    }
    order.into_iter().map(|id| chosen[id]).collect()
}
