//! Product-type and fit tables used by validation and autofix.
//!
//! Everything here works on product slugs (`shoei-rf-1400-helmet`). The
//! defaults cover the motorcycle gear catalog; a YAML file may replace any
//! table.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::CompatError;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("token regex"));

pub const UNKNOWN_TYPE: &str = "unknown";

const TYPE_TABLE: &[(&str, &[&str])] = &[
    (
        "helmet_accessory",
        &[
            "visor",
            "face shield",
            "faceshield",
            "shield",
            "pinlock",
            "cheek pad",
            "cheekpad",
            "cheekpads",
        ],
    ),
    ("helmet", &["helmet"]),
    ("jacket", &["jacket", "coat", "parka"]),
    ("pants", &["pant", "trouser", "bibs"]),
    ("gloves", &["glove", "gauntlet"]),
    ("boots", &["boot", "shoe"]),
    ("backpack", &["backpack", "bag", "pack", "luggage"]),
    (
        "communication",
        &[
            "communication",
            "intercom",
            "bluetooth",
            "headset",
            "sena",
            "cardo",
            "schuberth sc2",
        ],
    ),
    ("tire", &["tire", "tyre", "wheel"]),
    ("air_filter", &["air filter", "filter"]),
    (
        "oil",
        &["oil", "lubricant", "lube", "fork oil", "transmission oil"],
    ),
    ("brake", &["brake", "brake pad", "rotor"]),
    (
        "chain",
        &["chain", "sprocket", "degreaser", "chain lube", "chain wax"],
    ),
    (
        "protection",
        &["protector", "armor", "armour", "chest", "back protector"],
    ),
];

const COMPLEMENTARY_TABLE: &[(&str, &[&str])] = &[
    ("pants", &["jacket", "gloves", "boots", "protection", "backpack"]),
    ("jacket", &["pants", "gloves", "boots", "protection", "helmet"]),
    ("gloves", &["jacket", "pants", "boots", "helmet"]),
    ("boots", &["pants", "jacket", "gloves", "helmet"]),
    (
        "helmet",
        &["helmet_accessory", "communication", "backpack", "jacket", "gloves"],
    ),
    ("helmet_accessory", &["helmet", "communication", "backpack"]),
    ("communication", &["helmet", "backpack"]),
    ("tire", &["brake", "chain", "oil"]),
    ("air_filter", &["oil", "chain", "brake"]),
    ("oil", &["air_filter", "chain", "brake"]),
    ("chain", &["oil", "brake", "air_filter"]),
    ("brake", &["tire", "chain", "oil"]),
    ("backpack", &["helmet", "jacket", "gloves"]),
    ("protection", &["jacket", "pants", "gloves", "boots"]),
];

const CORE_TYPES: &[&str] = &["pants", "jacket", "gloves", "boots", "helmet"];

const HELMET_BRANDS: &[&str] = &[
    "shoei", "arai", "agv", "hjc", "bell", "scorpion", "ls2", "icon", "sedici", "shark",
    "schuberth", "suomy", "simpson", "nolan", "xlite", "caberg", "klim",
];

const FIT_SENSITIVE_TERMS: &[&str] = &[
    "visor",
    "visors",
    "shield",
    "shields",
    "faceshield",
    "faceshields",
    "face shield",
    "pinlock",
    "cheek",
    "cheek pad",
    "cheek pads",
    "cheekpad",
    "cheekpads",
    "peak",
    "spoiler",
];

const FIT_EXEMPT_TERMS: &[&str] = &["earplug", "earplugs"];

const MODEL_STOPWORDS: &[&str] = &[
    "helmet",
    "visor",
    "shield",
    "pinlock",
    "face",
    "clear",
    "dark",
    "smoke",
    "tinted",
    "replacement",
    "motorcycle",
    "racing",
    "race",
    "edition",
    "with",
    "for",
    "the",
    "and",
    "kit",
    "pack",
    "single",
    "dual",
    "v",
    "pro",
    "plus",
    "series",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Lowercases and turns separators into single spaces: `AGV-K6_S` -> `agv k6 s`.
pub fn normalize(text: &str) -> String {
    tokens(text).join(" ")
}

/// Lowercase alphanumeric runs of `text`.
pub fn tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeRule {
    pub name: String,
    pub keywords: Vec<String>,
}

/// How a definite mismatch is decided for a fit-sensitive pair.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MismatchRule {
    /// Both ids name helmet brands and no brand is shared.
    #[default]
    BrandConflict,
    /// Brand conflict, or same brand but an accessory marked "for" a model
    /// the helmet does not carry.
    BrandOrModelConflict,
}

/// Brand and model tokens extracted from a slug.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductIdentity {
    pub brands: BTreeSet<String>,
    pub models: BTreeSet<String>,
    pub for_marker: bool,
}

/// Shared brand/model tokens between a product and an accessory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overlap {
    pub brands: Vec<String>,
    pub models: Vec<String>,
}

impl Overlap {
    pub fn is_match(&self) -> bool {
        !self.brands.is_empty() || !self.models.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FitRules {
    /// Checked in order; the first rule with a keyword in the slug wins.
    pub types: Vec<TypeRule>,
    pub complementary: BTreeMap<String, Vec<String>>,
    pub core_types: Vec<String>,
    /// Source types whose fit-sensitive accessories need proof.
    pub proof_source_types: Vec<String>,
    pub helmet_brands: Vec<String>,
    pub fit_sensitive_terms: Vec<String>,
    pub fit_exempt_terms: Vec<String>,
    pub model_stopwords: Vec<String>,
    pub mismatch_rule: MismatchRule,
}

impl Default for FitRules {
    fn default() -> Self {
        Self {
            types: TYPE_TABLE
                .iter()
                .map(|(name, keywords)| TypeRule {
                    name: name.to_string(),
                    keywords: owned(keywords),
                })
                .collect(),
            complementary: COMPLEMENTARY_TABLE
                .iter()
                .map(|(name, allowed)| (name.to_string(), owned(allowed)))
                .collect(),
            core_types: owned(CORE_TYPES),
            proof_source_types: vec!["helmet".to_string()],
            helmet_brands: owned(HELMET_BRANDS),
            fit_sensitive_terms: owned(FIT_SENSITIVE_TERMS),
            fit_exempt_terms: owned(FIT_EXEMPT_TERMS),
            model_stopwords: owned(MODEL_STOPWORDS),
            mismatch_rule: MismatchRule::default(),
        }
    }
}

impl FitRules {
    /// Reads rules from YAML. Tables missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, CompatError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| CompatError::FitRules(format!("{}: {err}", path.display())))?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, CompatError> {
        serde_yaml::from_str(text).map_err(|err| CompatError::FitRules(err.to_string()))
    }

    pub fn detect_type(&self, product_id: &str) -> Option<&str> {
        let text = normalize(product_id);
        self.types
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|kw| text.contains(normalize(kw).as_str()))
            })
            .map(|rule| rule.name.as_str())
    }

    pub fn type_name(&self, product_id: &str) -> &str {
        self.detect_type(product_id).unwrap_or(UNKNOWN_TYPE)
    }

    pub fn is_core(&self, product_type: &str) -> bool {
        self.core_types.iter().any(|core| core == product_type)
    }

    /// Whether the complementary table allows recommending `target` types
    /// from `source` types. Sources with no entry allow nothing.
    pub fn is_complementary(&self, source: &str, target: &str) -> bool {
        self.complementary
            .get(source)
            .map(|allowed| allowed.iter().any(|t| t == target))
            .unwrap_or(false)
    }

    pub fn allowed_targets(&self, source: &str) -> &[String] {
        self.complementary
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn identity(&self, product_id: &str) -> ProductIdentity {
        let mut identity = ProductIdentity::default();
        for token in tokens(product_id) {
            if token == "for" {
                identity.for_marker = true;
            }
            if self.helmet_brands.iter().any(|brand| *brand == token) {
                identity.brands.insert(token);
            } else if token.len() >= 2 && !self.model_stopwords.iter().any(|w| *w == token) {
                identity.models.insert(token);
            }
        }
        identity
    }

    /// Whether `target_id` names an accessory whose fit depends on the exact
    /// helmet model. Matching is on whole tokens so `speakers` never reads
    /// as `peak`.
    pub fn is_fit_sensitive(&self, target_id: &str) -> bool {
        let padded = format!(" {} ", normalize(target_id));
        let has = |term: &String| {
            let term = normalize(term);
            !term.is_empty() && padded.contains(&format!(" {term} "))
        };
        !self.fit_exempt_terms.iter().any(&has) && self.fit_sensitive_terms.iter().any(&has)
    }

    /// True when compatibility of this pair must be proven before it can be
    /// trusted.
    pub fn requires_proof(&self, product_id: &str, target_id: &str) -> bool {
        let source_type = self.type_name(product_id);
        self.proof_source_types.iter().any(|t| t == source_type)
            && self.is_fit_sensitive(target_id)
    }

    pub fn overlap(&self, product_id: &str, target_id: &str) -> Overlap {
        let source = self.identity(product_id);
        let target = self.identity(target_id);
        Overlap {
            brands: source.brands.intersection(&target.brands).cloned().collect(),
            models: source.models.intersection(&target.models).cloned().collect(),
        }
    }

    /// Reason the pair is provably incompatible, if it is.
    pub fn mismatch(&self, product_id: &str, target_id: &str) -> Option<String> {
        if !self.requires_proof(product_id, target_id) {
            return None;
        }
        let source = self.identity(product_id);
        let target = self.identity(target_id);
        let brands_known = !source.brands.is_empty() && !target.brands.is_empty();
        if brands_known && source.brands.is_disjoint(&target.brands) {
            return Some(format!(
                "helmet brand {} does not match accessory brand {}",
                join(&source.brands),
                join(&target.brands)
            ));
        }
        if self.mismatch_rule == MismatchRule::BrandOrModelConflict
            && brands_known
            && target.for_marker
            && !source.models.is_empty()
            && !target.models.is_empty()
            && source.models.is_disjoint(&target.models)
        {
            return Some(format!(
                "accessory is for model {} but helmet is {}",
                join(&target.models),
                join(&source.models)
            ));
        }
        None
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join("/")
}
