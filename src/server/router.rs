use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use fbt_catalog_cache::CatalogItem;
use fbt_resolver::{explain, resolve_with, ResolveOptions};
use fbt_rule_model::{RuleKind, RuleTable};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tower_http::cors::{Any, CorsLayer};
use tracing::{instrument, warn};

use super::state::ServeState;

pub fn build_router() -> Router<ServeState> {
    Router::new()
        .route("/api/fbt", get(fbt_handler))
        .route("/api/health", get(health_handler))
        .route("/api/reload", post(reload_handler))
        .route("/api/catalog", get(catalog_handler))
        .route("/api/debug/product", get(debug_product_handler))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Splits `a, b,,c` into trimmed, non-empty ids.
fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
struct FbtQuery {
    products: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct FbtItem {
    id: String,
    label: Option<String>,
    kind: RuleKind,
}

#[instrument(name = "fbt.api.recommend", skip(state, query))]
async fn fbt_handler(
    State(state): State<ServeState>,
    Query(query): Query<FbtQuery>,
) -> impl IntoResponse {
    let cart = split_ids(query.products.as_deref());
    if cart.is_empty() {
        return Json(json!({
            "recommendations": [],
            "message": "No products in cart",
        }));
    }

    let options = ResolveOptions {
        limit: query.limit.unwrap_or(state.options.limit),
        ..state.options
    };
    let table = state.rules.current();
    let recommendations: Vec<FbtItem> = resolve_with(&cart, &table, &options)
        .into_iter()
        .map(|rec| FbtItem {
            id: rec.product_id,
            label: rec.label,
            kind: rec.kind,
        })
        .collect();
    Json(json!({
        "recommendations": recommendations,
        "cart_products": cart,
    }))
}

#[instrument(name = "fbt.api.health", skip(state))]
async fn health_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let rules = state.rules.health();
    let catalog = state.catalog.status();
    Json(json!({
        "status": "ok",
        "rules": rules,
        "catalog": catalog,
    }))
}

fn table_counts(table: &RuleTable) -> serde_json::Value {
    let explicit_rows = table
        .rows()
        .iter()
        .filter(|row| row.kind == RuleKind::Explicit)
        .count();
    json!({
        "source": table.source(),
        "products": table.product_count(),
        "rows": table.len(),
        "explicit_rows": explicit_rows,
        "category_rows": table.len() - explicit_rows,
        "category_rules": table.keyword_rules().len(),
        "row_warnings": table.warnings().len(),
    })
}

#[instrument(name = "fbt.api.reload", skip(state))]
async fn reload_handler(State(state): State<ServeState>) -> impl IntoResponse {
    match state.rules.refresh_now().await {
        Ok(table) => {
            let mut body = table_counts(&table);
            body["status"] = json!("ok");
            (StatusCode::OK, Json(body))
        }
        Err(err) => {
            warn!(%err, "manual reload failed");
            let mut body = table_counts(&state.rules.current());
            body["status"] = json!("error");
            body["error"] = json!(err.to_string());
            (StatusCode::BAD_GATEWAY, Json(body))
        }
    }
}

#[derive(Deserialize)]
struct CatalogQuery {
    ids: Option<String>,
}

#[derive(Serialize)]
struct CatalogResponse {
    items: BTreeMap<String, CatalogItem>,
}

#[instrument(name = "fbt.api.catalog", skip(state, query))]
async fn catalog_handler(
    State(state): State<ServeState>,
    Query(query): Query<CatalogQuery>,
) -> Json<CatalogResponse> {
    let ids = split_ids(query.ids.as_deref());
    if ids.is_empty() {
        return Json(CatalogResponse {
            items: BTreeMap::new(),
        });
    }
    Json(CatalogResponse {
        items: state.catalog.get_many(&ids).await,
    })
}

#[derive(Deserialize)]
struct DebugQuery {
    id: Option<String>,
}

#[instrument(name = "fbt.api.debug_product", skip(state, query))]
async fn debug_product_handler(
    State(state): State<ServeState>,
    Query(query): Query<DebugQuery>,
) -> impl IntoResponse {
    let product_id = query.id.as_deref().map(str::trim).unwrap_or_default();
    if product_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required query param: id" })),
        );
    }
    let table = state.rules.current();
    let explanation = explain(product_id, &table, &state.options);
    (StatusCode::OK, Json(json!(explanation)))
}
