use actix_web::{middleware::Logger, web, App, HttpServer};
use redis::Client as RedisClient;
use skirmish_server::{http, metrics, ws};
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    // Configuration
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
    let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());

    // Redis client
    let redis_client = RedisClient::open(redis_url.as_str()).expect("Invalid REDIS_URL");

    // Start HTTP + WS server
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(metrics::METRICS.clone())
            .app_data(web::Data::new(redis_client.clone()))
            .configure(http::routes::init_routes)
            .configure(ws::routes::init_routes)
    })
    .bind(&server_addr)?
    .run()
    .await
}
