//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .nest("/api/v1/service", api::service::router())
        .nest("/api/v1/admin", api::admin::router())
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::hash_secret;
    use crate::config::runtime::{AdminConfig, ServerConfig, ServiceConfig, SharedConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use compact_str::CompactString;
    use leadx_core::config::{ConfigStore, EngineConfig};
    use leadx_core::events::{EventReceivers, engine_channels};
    use leadx_core::processors::AuctionCoordinator;
    use leadx_core::store::MemoryStore;
    use leadx_core::utils::SystemClock;
    use leadx_sdk::objects::{
        AuctionResponse, AuctionState, AuditEventResponse, ClaimDecision, ClaimResponse,
        ClaimSubmission, CommissionResponse, MarketReportResponse, RegisterCandidate,
        RejectionReason, RequirementIntake, VerificationStatus,
    };
    use leadx_sdk::signature::{ADMIN_AUTH_HEADER, SIGNATURE_HEADER, Signature, SignedObject};
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;
    use uuid::Uuid;

    const ADMIN_SECRET: &str = "admin-secret";
    const SERVICE_SECRET: &[u8] = b"service-secret";

    fn app() -> (Router, EventReceivers) {
        let (senders, receivers) = engine_channels();
        let coordinator = Arc::new(AuctionCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            ConfigStore::new(EngineConfig::default()),
            senders,
        ));
        let config = SharedConfig {
            server: Arc::new(RwLock::new(ServerConfig {
                listen: "127.0.0.1:0".parse().unwrap(),
            })),
            admin: Arc::new(RwLock::new(AdminConfig::new(
                hash_secret(ADMIN_SECRET).unwrap(),
            ))),
            service: Arc::new(RwLock::new(ServiceConfig::new(SERVICE_SECRET.into()))),
        };
        (build_router(AppState::new(coordinator, config)), receivers)
    }

    fn signed<T: Signature>(uri: &str, body: T, key: &[u8]) -> Request<Body> {
        let signed = SignedObject::new(body, key).unwrap();
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(Body::from(signed.json))
            .unwrap()
    }

    fn admin(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ADMIN_AUTH_HEADER, ADMIN_SECRET);
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn intake(location: &str) -> RequirementIntake {
        RequirementIntake {
            requirement_id: Some(Uuid::now_v7()),
            location: location.into(),
            category: "rental".into(),
            budget_min: None,
            budget_max: Some(Decimal::from(100_000)),
            bedrooms: Some(2),
            client_ref: None,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _rx) = app();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_auction_over_http() {
        let (router, _rx) = app();

        let register = RegisterCandidate {
            candidate_id: "agent-a".into(),
            name: "Agent A".into(),
            service_areas: vec!["Marina".into()],
            categories: vec![],
            status: Some(VerificationStatus::Verified),
        };
        let (status, _) = call(
            &router,
            admin(
                "POST",
                "/api/v1/admin/candidates",
                Some(serde_json::to_value(&register).unwrap()),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            &router,
            signed(
                "/api/v1/service/requirements",
                intake("Marina"),
                SERVICE_SECRET,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let auction: AuctionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(auction.state, AuctionState::Broadcast);
        assert_eq!(auction.invited, vec![CompactString::from("agent-a")]);

        let claim = |candidate: &str| ClaimSubmission {
            auction_id: auction.auction_id,
            candidate_id: candidate.into(),
        };
        let (status, body) = call(
            &router,
            signed("/api/v1/service/claims", claim("agent-a"), SERVICE_SECRET),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let won: ClaimResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(won.decision, ClaimDecision::Winning);
        assert_eq!(won.auction_state, Some(AuctionState::Closed));
        assert!(won.response_time_secs.is_some_and(|secs| secs >= 0.0));

        let (_, body) = call(
            &router,
            signed("/api/v1/service/claims", claim("agent-z"), SERVICE_SECRET),
        )
        .await;
        let late: ClaimResponse = serde_json::from_slice(&body).unwrap();
        assert!(matches!(late.decision, ClaimDecision::Rejected { .. }));

        let uri = format!(
            "/api/v1/admin/requirements/{}/commissions",
            auction.requirement_id
        );
        let (status, body) = call(&router, admin("GET", &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        let commissions: Vec<CommissionResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].amount, Decimal::from(5_000));

        let uri = format!("/api/v1/admin/auctions/{}/audit", auction.auction_id);
        let (_, body) = call(&router, admin("GET", &uri, None)).await;
        let audit: Vec<AuditEventResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(audit[0].kind, "AUCTION_OPENED");
        assert!(audit.iter().any(|e| e.kind == "AUCTION_CLOSED"));
        let accepted = audit.iter().find(|e| e.kind == "CLAIM_ACCEPTED").unwrap();
        assert!(accepted.detail["response_time_secs"].is_number());

        let (status, body) = call(
            &router,
            admin("GET", "/api/v1/admin/market?location=marina", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let report: MarketReportResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.location, "marina");
        assert_eq!(report.verified_candidates, 1);
        assert_eq!(report.recent_deals, 1);
        assert_eq!(report.average_budget, Some(Decimal::from(100_000)));
        assert!(report.avg_response_time_secs.is_some());
    }

    #[tokio::test]
    async fn test_claim_on_unknown_auction_is_rejected_not_failed() {
        let (router, _rx) = app();
        let claim = ClaimSubmission {
            auction_id: Uuid::now_v7(),
            candidate_id: "agent-a".into(),
        };
        let (status, body) = call(
            &router,
            signed("/api/v1/service/claims", claim, SERVICE_SECRET),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let response: ClaimResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            response.decision,
            ClaimDecision::Rejected {
                reason: RejectionReason::AuctionNotFound
            }
        );
    }

    #[tokio::test]
    async fn test_service_api_rejects_bad_signature() {
        let (router, _rx) = app();
        let (status, _) = call(
            &router,
            signed(
                "/api/v1/service/requirements",
                intake("Marina"),
                b"wrong-secret",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let unsigned = Request::builder()
            .method("POST")
            .uri("/api/v1/service/requirements")
            .body(Body::from(serde_json::to_string(&intake("Marina")).unwrap()))
            .unwrap();
        let (status, _) = call(&router, unsigned).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_api_requires_secret() {
        let (router, _rx) = app();
        let request = Request::get("/api/v1/admin/candidates")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::get("/api/v1/admin/candidates")
            .header(ADMIN_AUTH_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (router, _rx) = app();

        let mut bad = intake("Marina");
        bad.budget_max = Some(Decimal::from(-1));
        let (status, _) = call(
            &router,
            signed("/api/v1/service/requirements", bad, SERVICE_SECRET),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let uri = format!("/api/v1/admin/auctions/{}", Uuid::now_v7());
        let (status, _) = call(&router, admin("GET", &uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let command = serde_json::json!({
            "command": "cancel_auction",
            "requirement_id": Uuid::now_v7(),
        });
        let (status, _) = call(&router, admin("POST", "/api/v1/admin/commands", Some(command))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &router,
            admin(
                "POST",
                "/api/v1/admin/candidates/nobody/status",
                Some(serde_json::json!({ "status": "verified" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
