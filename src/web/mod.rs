//! HTTP surface: the HTML form plus a small JSON API.

pub mod render;

use crate::collector::Selections;
use crate::config::PageConfig;
use crate::error::PredictError;
use crate::metrics::MetricsSnapshot;
use crate::predictor::Predictor;
use crate::schema::FeatureSpec;
use crate::types::report::PredictionReport;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use render::{render_page, PageView};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared, read-only request state.
pub struct AppState {
    pub predictor: Predictor,
    pub page: PageConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/api/schema", get(schema))
        .route("/api/predict", post(predict_json))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn page_response(
    state: &AppState,
    selections: &Selections,
    report: Option<&PredictionReport>,
    error: Option<&PredictError>,
) -> Html<String> {
    let registry = state.predictor.registry();
    Html(render_page(&PageView {
        page: &state.page,
        schema: registry.schema(),
        selections,
        load_failures: registry.failures(),
        report,
        error,
    }))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let selections = Selections::defaults(state.predictor.schema());
    page_response(&state, &selections, None, None)
}

async fn predict_form(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let schema = state.predictor.schema();
    match Selections::from_form(schema, fields) {
        Ok(selections) => {
            let report = state.predictor.predict(&selections).await;
            page_response(&state, &selections, Some(&report), None).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Rejected form submission");
            state.predictor.metrics().record_rejection();
            let selections = Selections::defaults(schema);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                page_response(&state, &selections, None, Some(&e)),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct SchemaResponse<'a> {
    features: &'a [FeatureSpec],
    placeholder: bool,
    models: Vec<String>,
    load_errors: Vec<String>,
}

async fn schema(State(state): State<Arc<AppState>>) -> Response {
    let registry = state.predictor.registry();
    let body = SchemaResponse {
        features: registry.schema().features(),
        placeholder: registry.schema().is_placeholder(),
        models: registry.model_labels(),
        load_errors: registry.failures().iter().map(|e| e.to_string()).collect(),
    };
    Json(body).into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

async fn predict_json(
    State(state): State<Arc<AppState>>,
    Json(values): Json<HashMap<String, i64>>,
) -> Response {
    match Selections::from_values(state.predictor.schema(), values) {
        Ok(selections) => Json(state.predictor.predict(&selections).await).into_response(),
        Err(e) => {
            warn!(error = %e, "Rejected prediction request");
            state.predictor.metrics().record_rejection();
            let body = ErrorBody {
                kind: e.kind(),
                message: e.to_string(),
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.predictor.metrics().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServiceMetrics;
    use crate::models::{LoadedModel, LogisticModel, ModelRegistry, Scorer};
    use crate::schema::DomainTable;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(models: Vec<LoadedModel>) -> Router {
        let registry = ModelRegistry::from_models(models, &DomainTable::survey(37));
        let predictor = Predictor::new(
            Arc::new(registry),
            Scorer::new(),
            Arc::new(ServiceMetrics::new()),
        );
        router(Arc::new(AppState {
            predictor,
            page: PageConfig::default(),
        }))
    }

    fn logistic_app() -> Router {
        let model = LogisticModel::new(
            vec!["Fruits".to_string(), "Milk".to_string()],
            vec![0.0, 0.0],
            0.0,
        );
        app(vec![LoadedModel::new(
            "Logistic Regression",
            "logistic_model.json",
            Arc::new(model),
        )])
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let response = logistic_app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert_eq!(html.matches("<select").count(), 2);
        assert!(html.contains("Fruits"));
    }

    #[tokio::test]
    async fn test_form_predict_keeps_selections() {
        let response = logistic_app()
            .oneshot(
                Request::post("/predict")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("Fruits=3&Milk=1"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("<option value=\"3\" selected>3</option>"));
        assert!(html.contains("<div class=\"score\">50</div>"));
    }

    #[tokio::test]
    async fn test_form_rejects_out_of_domain() {
        let response = logistic_app()
            .oneshot(
                Request::post("/predict")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("Fruits=3&Milk=99"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_string(response).await;
        assert!(html.contains("invalid selection for Milk"));
    }

    #[tokio::test]
    async fn test_json_predict() {
        let response = logistic_app()
            .oneshot(
                Request::post("/api/predict")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"Fruits": 3, "Milk": 1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(report["results"][0]["label"], "Logistic Regression");
        assert_eq!(report["results"][0]["score"], 50);
        assert_eq!(report["degraded"], false);
    }

    #[tokio::test]
    async fn test_json_predict_missing_answer_falls_back() {
        let response = logistic_app()
            .oneshot(
                Request::post("/api/predict")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"Fruits": 3}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let report: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(report["results"][0]["score"], 50);
        assert_eq!(report["results"][0]["fallback"]["kind"], "schema_mismatch");
        assert_eq!(report["degraded"], true);
    }

    #[tokio::test]
    async fn test_schema_for_placeholder_registry() {
        let response = app(Vec::new())
            .oneshot(Request::get("/api/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let schema: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(schema["placeholder"], true);
        assert_eq!(schema["features"].as_array().unwrap().len(), 10);
        assert_eq!(schema["features"][0]["name"], "Feature_0");
        assert_eq!(schema["features"][0]["domain"].as_array().unwrap().len(), 38);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = logistic_app();

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "ok");

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let metrics: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(metrics["predictions"], 0);
    }
}
