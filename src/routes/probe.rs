//! Connectivity probe endpoint
//!
//! `GET /?dbType=<selector>` (and the configured probe path) runs the probes
//! named by the selector one after another and answers with a single text
//! line. Probe failures are part of a 200 answer; only an unknown selector
//! produces a 500.

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue},
    routing::get,
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::config::{CUSTOM_HEADER_NAME, PROBE_CONTENT_TYPE};
use crate::models::{AppState, ProbeQuery, ProbeResponse};
use crate::probes::{probe_documentdb, probe_postgres, PgEndpoint, ProbeReport};
use crate::types::{AppResult, DbType};

/// Body returned when the selector is `none`
pub const NOTHING_EXECUTED_BODY: &str = "No se ejecuto nada.";

pub fn router(state: AppState) -> Router {
    let probe_path = state.config.server.probe_path.clone();

    let mut router = Router::new().route("/", get(probe));
    if probe_path != "/" {
        router = router.route(&probe_path, get(probe));
    }

    router
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_TYPE,
            HeaderValue::from_static(PROBE_CONTENT_TYPE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(CUSTOM_HEADER_NAME),
            HeaderValue::from_static(PROBE_CONTENT_TYPE),
        ))
        .with_state(state)
}

async fn probe(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<ProbeResponse> {
    let query = ProbeQuery::from(pairs);
    handle_probe(&state, query.db_type.as_deref()).await
}

/// Resolve the selector, run the matching probes in order and build the body.
pub async fn handle_probe(state: &AppState, raw_db_type: Option<&str>) -> AppResult<ProbeResponse> {
    info!(db_type = ?raw_db_type, "Received probe request");

    let db_type = DbType::resolve(raw_db_type)?;
    if db_type == DbType::None {
        return Ok(ProbeResponse::ok(NOTHING_EXECUTED_BODY));
    }

    let config = &state.config;
    let connectors = &state.connectors;
    let mut reports = Vec::with_capacity(3);

    if db_type.includes_postgres() {
        reports.push(probe_postgres(connectors.sql.as_ref(), &config.postgres, PgEndpoint::Direct).await);
    }
    if db_type.includes_postgres_proxy() {
        reports.push(probe_postgres(connectors.sql.as_ref(), &config.postgres, PgEndpoint::Proxy).await);
    }
    if db_type.includes_documentdb() {
        reports.push(probe_documentdb(connectors.document.as_ref(), &config.documentdb).await);
    }

    let succeeded = reports.iter().filter(|r| r.is_success()).count();
    info!(%db_type, probes = reports.len(), succeeded, "Probes finished");

    Ok(ProbeResponse::ok(format_body(
        raw_db_type.unwrap_or("all"),
        &reports,
    )))
}

/// `dbType: <raw>, Resultado de <label>: <result>, ...`
fn format_body(raw_db_type: &str, reports: &[ProbeReport]) -> String {
    let mut body = format!("dbType: {raw_db_type}");
    for report in reports {
        body.push_str(&format!(", Resultado de {}: {}", report.backend.label(), report));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::probes::mock::*;
    use crate::routes::create_router;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use std::collections::HashMap;
    use tower::ServiceExt;

    const PG_VERSION: &str = "PostgreSQL 16.2 on x86_64-pc-linux-gnu";

    fn test_config(extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = [
            ("PG_HOST", "db.internal"),
            ("PG_PROXY_ENDPOINT", "proxy.internal"),
            ("PG_USER", "probe"),
            ("PG_PASSWORD", "secret"),
            ("DOCDB_HOST", "docdb.internal"),
            ("DOCDB_USER", "probe"),
            ("DOCDB_PASSWORD", "secret"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    fn state(log: &CallLog, sql: SqlBehavior, doc: DocBehavior) -> AppState {
        AppState::new(test_config(&[]), connectors(log, sql, doc))
    }

    fn healthy(log: &CallLog) -> AppState {
        state(log, SqlBehavior::Version(PG_VERSION), DocBehavior::Healthy)
    }

    async fn send(state: AppState, uri: &str) -> Response {
        create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn assert_fixed_headers(response: &Response) {
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers()["x-custom-header"], "application/json");
    }

    #[tokio::test]
    async fn test_none_runs_nothing() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/hello?dbType=none").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_fixed_headers(&response);
        assert_eq!(body_text(response).await, "No se ejecuto nada.");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_postgres_only() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/hello?dbType=postgres").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_fixed_headers(&response);
        assert_eq!(
            body_text(response).await,
            format!("dbType: postgres, Resultado de PostgreSQL: Versión de PostgreSQL: {PG_VERSION}")
        );
        assert_eq!(log.count("sql-connect:db.internal"), 1);
        assert_eq!(log.count("sql-connect:proxy.internal"), 0);
        assert_eq!(log.count("doc-"), 0);
    }

    #[tokio::test]
    async fn test_selector_is_case_insensitive_and_echoed_as_given() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/?dbType=Postgres-Proxy").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            format!("dbType: Postgres-Proxy, Resultado de PostgreSQL-proxy: Versión de PostgreSQL: {PG_VERSION}")
        );
        assert_eq!(log.entries(), vec!["sql-connect:proxy.internal", "sql-query", "sql-close"]);
    }

    #[tokio::test]
    async fn test_documentdb_only() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/hello?dbType=documentdb").await;

        assert_eq!(
            body_text(response).await,
            r#"dbType: documentdb, Resultado de DocumentDB: DocumentDB buildInfo: {"version":"5.0.0","ok":1.0}"#
        );
        assert_eq!(log.count("sql-"), 0);
    }

    #[tokio::test]
    async fn test_all_reports_every_backend_in_order_even_on_failure() {
        let log = CallLog::default();
        let state = state(
            &log,
            SqlBehavior::RefuseConnect("connection refused"),
            DocBehavior::FailPing("Authentication failed."),
        );
        let response = send(state, "/hello?dbType=all").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_fixed_headers(&response);
        assert_eq!(
            body_text(response).await,
            "dbType: all, \
             Resultado de PostgreSQL: Error al conectar: connection refused, \
             Resultado de PostgreSQL-proxy: Error al conectar: connection refused, \
             Resultado de DocumentDB: Error conectando a DocumentDB: Authentication failed."
        );
        assert_eq!(log.count("doc-close"), 1);
    }

    #[tokio::test]
    async fn test_missing_selector_means_all() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/hello").await;
        let body = body_text(response).await;

        assert!(body.starts_with("dbType: all, Resultado de PostgreSQL: "));
        let pg = body.find("Resultado de PostgreSQL:").unwrap();
        let proxy = body.find("Resultado de PostgreSQL-proxy:").unwrap();
        let doc = body.find("Resultado de DocumentDB:").unwrap();
        assert!(pg < proxy && proxy < doc);
        assert_eq!(
            log.entries(),
            vec![
                "sql-connect:db.internal",
                "sql-query",
                "sql-close",
                "sql-connect:proxy.internal",
                "sql-query",
                "sql-close",
                "doc-connect:admin",
                "doc-ping",
                "doc-buildinfo",
                "doc-close",
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_selector_is_500() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/hello?dbType=bogus").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_fixed_headers(&response);
        assert_eq!(body_text(response).await, "dbType not supported.");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_selector_uses_last_value() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/hello?dbType=none&dbType=postgres").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_fixed_headers(&response);
        assert_eq!(
            body_text(response).await,
            format!("dbType: postgres, Resultado de PostgreSQL: Versión de PostgreSQL: {PG_VERSION}")
        );
        assert_eq!(log.entries(), vec!["sql-connect:db.internal", "sql-query", "sql-close"]);
    }

    #[tokio::test]
    async fn test_repeated_selector_ending_unknown_is_500() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/?dbType=postgres&dbType=bogus&other=1").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_fixed_headers(&response);
        assert_eq!(body_text(response).await, "dbType not supported.");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_empty_selector_is_unsupported() {
        let log = CallLog::default();
        let response = send(healthy(&log), "/hello?dbType=").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_closes_connection() {
        let log = CallLog::default();
        let state = state(&log, SqlBehavior::FailQuery("canceling statement"), DocBehavior::Healthy);
        let response = send(state, "/hello?dbType=postgres").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "dbType: postgres, Resultado de PostgreSQL: Error al conectar: canceling statement"
        );
        assert_eq!(log.entries(), vec!["sql-connect:db.internal", "sql-query", "sql-close"]);
    }

    #[tokio::test]
    async fn test_repeated_requests_give_the_same_answer() {
        let log = CallLog::default();
        let state = healthy(&log);

        let first = handle_probe(&state, Some("all")).await.unwrap();
        let second = handle_probe(&state, Some("all")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(log.count("sql-close"), 4);
        assert_eq!(log.count("doc-close"), 2);
    }

    #[tokio::test]
    async fn test_handle_probe_maps_unsupported_to_fixed_response() {
        let log = CallLog::default();
        let err = handle_probe(&healthy(&log), Some("mysql")).await.unwrap_err();
        let response = ProbeResponse::from(err);

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body, "dbType not supported.");
    }

    #[tokio::test]
    async fn test_custom_probe_path() {
        let log = CallLog::default();
        let state = AppState::new(
            test_config(&[("PROBE_PATH", "/dbcheck")]),
            connectors(&log, SqlBehavior::Version(PG_VERSION), DocBehavior::Healthy),
        );

        let response = send(state, "/dbcheck?dbType=none").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_fixed_headers(&response);
    }
}
