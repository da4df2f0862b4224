use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthBody {
        status: "ok",
        service: "realtime-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// No external store to probe here — this binary carries no domain
/// database — so readiness mirrors liveness.
pub async fn ready() -> HttpResponse {
    HttpResponse::Ok().json(HealthBody {
        status: "ready",
        service: "realtime-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}
