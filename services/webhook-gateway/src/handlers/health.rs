use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthBody {
        status: "ok",
        service: "webhook-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn ready(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(HealthBody {
            status: "ready",
            service: "webhook-gateway",
            version: env!("CARGO_PKG_VERSION"),
        }),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed: database unreachable");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unready",
                "error": "database unreachable",
            }))
        }
    }
}
