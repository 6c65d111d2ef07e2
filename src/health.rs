use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::state::AppState;

/// Aggregate health for monitoring and load balancers. The store is a hard
/// dependency (503 when unreachable); the mail transport is reported but
/// non-fatal.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut overall_healthy = true;
    let mut checks = serde_json::Map::new();

    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => {
            checks.insert(
                "database".into(),
                json!({ "status": "healthy", "message": "Database connection is working" }),
            );
        }
        Err(e) => {
            overall_healthy = false;
            error!(error = %e, "database health check failed");
            checks.insert(
                "database".into(),
                json!({ "status": "unhealthy", "message": format!("Database connection failed: {e}") }),
            );
        }
    }

    match state.mailer.check_transport().await {
        Ok(()) => {
            checks.insert(
                "email".into(),
                json!({ "status": "healthy", "message": "Mail transport is reachable" }),
            );
        }
        Err(e) => {
            // Outbound mail being down does not fail the service.
            warn!(error = %e, "mail transport health check failed");
            checks.insert(
                "email".into(),
                json!({ "status": "unhealthy", "message": format!("Mail transport check failed: {e}") }),
            );
        }
    }

    let status = if overall_healthy { "healthy" } else { "unhealthy" };
    let body = json!({
        "status": status,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": checks,
    });

    let code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}
