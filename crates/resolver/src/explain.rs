use fbt_rule_model::RuleTable;
use serde::{Deserialize, Serialize};

use crate::resolver::{keyword_rows, resolve_with, Recommendation, ResolveOptions};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Explicit,
    Category,
    None,
}

/// How a single product resolves, for diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchExplanation {
    pub product_id: String,
    pub match_type: MatchType,
    pub matched_rule: Option<String>,
    pub recommendations: Vec<Recommendation>,
}

pub fn explain(product_id: &str, table: &RuleTable, options: &ResolveOptions) -> MatchExplanation {
    let (match_type, matched_rule) = if table.contains_product(product_id) {
        (MatchType::Explicit, Some(product_id.to_string()))
    } else if options.category_fallback {
        match keyword_rows(product_id, table) {
            Some((keywords, _)) => (MatchType::Category, Some(keywords.join(" | "))),
            None => (MatchType::None, None),
        }
    } else {
        (MatchType::None, None)
    };

    MatchExplanation {
        product_id: product_id.to_string(),
        match_type,
        matched_rule,
        recommendations: resolve_with(&[product_id], table, options),
    }
}
