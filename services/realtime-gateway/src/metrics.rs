//! Prometheus exposition for realtime-gateway, matching
//! `order_service::metrics::serve_metrics`.

use actix_web::HttpResponse;
use prometheus::{Encoder, TextEncoder};

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok().content_type(encoder.format_type()).body(buffer)
}
