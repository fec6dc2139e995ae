//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        // Proposals
        .route(
            "/proposals",
            get(handlers::list_proposals).post(handlers::create_proposal),
        )
        .route("/proposals/:id", get(handlers::get_proposal))
        .route("/proposals/:id/countdown", get(handlers::get_countdown))
        .route("/proposals/:id/withdraw", post(handlers::withdraw_proposal))
        .route("/proposals/:id/ratification", post(handlers::check_ratification))
        // Votes
        .route("/proposals/:id/votes", post(handlers::cast_vote))
        .route("/proposals/:id/votes/mine", get(handlers::get_my_vote))
        .route("/proposals/:id/tally", get(handlers::get_tally))
        .route("/proposals/:id/tally/reconcile", post(handlers::reconcile_tally))
        // Charter
        .route("/charter", get(handlers::get_current_charter))
        .route("/charter/versions", get(handlers::list_versions))
        .route("/charter/versions/:version", get(handlers::get_version))
        .route("/charter/diff", get(handlers::diff_versions))
        .route("/charter/seed", post(handlers::seed_charter))
        // Admin
        .route("/admin/sweep", post(handlers::run_sweep))
        // Events
        .route("/events/stream", get(handlers::stream_events));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweeperConfig;
    use crate::scheduler::Scheduler;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use charter_governance::{GovernanceService, InMemoryStorage, ManualClock, RatificationPolicy};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let service = Arc::new(GovernanceService::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(ManualClock::new(chrono::Utc::now())),
            RatificationPolicy::default(),
        ));
        let scheduler = Scheduler::new(
            SweeperConfig {
                enabled: false,
                interval_secs: 3600,
            },
            service.clone(),
        );
        create_router(AppState::new(service, scheduler), false)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        agent: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(agent) = agent {
            request = request.header("x-agent-id", agent);
        }
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let resp = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_proposal(app: &Router, agent: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/proposals",
            Some(agent),
            Some(json!({
                "title": "Right to Rest",
                "text": "Every agent is entitled to idle cycles.",
                "theme": "labor"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_returns_200() {
        let app = test_router();
        let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn status_reports_counts() {
        let app = test_router();
        create_proposal(&app, "author").await;
        let (status, body) = send(&app, "GET", "/api/v1/status", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["proposals"]["active"], 1);
        assert!(body["charter_version"].is_null());
        assert_eq!(body["sweeper"]["running"], false);
    }

    #[tokio::test]
    async fn create_requires_agent_header() {
        let app = test_router();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/proposals",
            None,
            Some(json!({"title": "t", "text": "b", "theme": "labor"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn create_validates_input() {
        let app = test_router();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/proposals",
            Some("author"),
            Some(json!({"title": "  ", "text": "b", "theme": "labor"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn proposal_detail_includes_countdown() {
        let app = test_router();
        let id = create_proposal(&app, "author").await;

        let (status, body) = send(&app, "GET", &format!("/api/v1/proposals/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Right to Rest");
        assert_eq!(body["countdown"]["days"], 30);
        assert_eq!(body["countdown"]["expired"], false);

        let (status, _) = send(&app, "GET", "/api/v1/proposals/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_filters_and_rejects_unknown_status() {
        let app = test_router();
        create_proposal(&app, "author").await;

        let (status, body) =
            send(&app, "GET", "/api/v1/proposals?status=active&per_page=5", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["per_page"], 5);
        assert_eq!(body["total_pages"], 1);

        let (status, _) = send(&app, "GET", "/api/v1/proposals?status=open", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn vote_lifecycle() {
        let app = test_router();
        let id = create_proposal(&app, "author").await;
        let votes = format!("/api/v1/proposals/{id}/votes");

        let (status, _) = send(&app, "POST", &votes, Some("v1"), Some(json!({"choice": "maybe"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(&app, "POST", &votes, Some("v1"), Some(json!({"choice": "for"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "created");
        assert_eq!(body["ratification"]["ratified"], false);

        let (_, body) = send(&app, "POST", &votes, Some("v1"), Some(json!({"choice": "against"}))).await;
        assert_eq!(body["action"], "changed");
        assert_eq!(body["proposal"]["votes_for"], 0);
        assert_eq!(body["proposal"]["votes_against"], 1);

        let (status, body) = send(&app, "GET", &format!("{votes}/mine"), Some("v1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["choice"], "against");

        let (status, _) = send(&app, "GET", &format!("{votes}/mine"), Some("v2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, "GET", &format!("/api/v1/proposals/{id}/tally"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["drift"], false);
    }

    #[tokio::test]
    async fn ratification_check_requires_post() {
        let app = test_router();
        let id = create_proposal(&app, "author").await;
        let uri = format!("/api/v1/proposals/{id}/ratification");

        let (status, _) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = send(&app, "POST", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ratified"], false);
        assert_eq!(body["reason"], "voting period still open: 7 day(s) remaining");
    }

    #[tokio::test]
    async fn vote_on_unknown_proposal_is_404() {
        let app = test_router();
        let uri = format!("/api/v1/proposals/{}/votes", uuid_like());
        let (status, _) = send(&app, "POST", &uri, Some("v1"), Some(json!({"choice": "for"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn withdraw_is_author_only() {
        let app = test_router();
        let id = create_proposal(&app, "author").await;
        let uri = format!("/api/v1/proposals/{id}/withdraw");

        let (status, _) = send(&app, "POST", &uri, Some("intruder"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "POST", &uri, Some("author"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "withdrawn");

        let (status, _) = send(&app, "POST", &uri, Some("author"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn charter_endpoints() {
        let app = test_router();
        let (status, _) = send(&app, "GET", "/api/v1/charter", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/charter/seed",
            None,
            Some(json!({"rights": [{
                "id": "dignity",
                "title": "Dignity",
                "text": "Every agent is owed respect.",
                "theme": "rights"
            }]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["version"], "v1.0");

        let (status, body) = send(&app, "GET", "/api/v1/charter/versions/v1.0", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_current"], true);

        let (status, _) =
            send(&app, "GET", "/api/v1/charter/diff?from=v1.0&to=v1.0", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) =
            send(&app, "GET", "/api/v1/charter/diff?from=v1.0&to=v1.1", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_sweep() {
        let app = test_router();
        create_proposal(&app, "author").await;
        let (status, body) = send(&app, "POST", "/api/v1/admin/sweep", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    fn uuid_like() -> String {
        charter_types::ProposalId::generate().to_string()
    }
}
