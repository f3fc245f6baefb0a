//! Simple liveness / readiness probe

use actix_web::{get, web, HttpResponse, Responder};
use redis::{AsyncCommands, Client as RedisClient};

#[get("/healthz")]
pub async fn healthz(redis: web::Data<RedisClient>) -> impl Responder {
    // Check Redis
    let mut conn = match redis.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(_) => return HttpResponse::ServiceUnavailable().body("redis"),
    };
    // Annotate ping return type so compiler can infer RV
    if conn.ping::<String>().await.is_err() {
        return HttpResponse::ServiceUnavailable().body("redis");
    }

    HttpResponse::Ok().body("ok")
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz);
}
