use std::io;

use actix_web::{middleware::Logger, web, App, HttpServer};

mod auth;
mod config;
mod errors;
mod handlers;
mod models;
mod schema;
mod store;

use auth::{AcceptAny, Access};
use config::Config;
use store::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config =
        Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let store = Store::open(&config.database_url)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    log::info!("opened annotation store at {}", config.database_url);
    if config.enforce_ownership {
        log::info!("updates and deletes are restricted to the annotation owner");
    }

    let store = web::Data::new(store);
    let access = web::Data::new(Access::new(AcceptAny, config.enforce_ownership));
    let prefix = config.prefix.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(access.clone())
            .wrap(handlers::cors())
            .wrap(Logger::default())
            .service(web::scope(&prefix).configure(handlers::annotation::routes))
            .route("/", web::get().to(handlers::index))
    })
    .bind((config.host.as_str(), config.port))?;

    for addr in server.addrs() {
        log::info!("Services API server is listening at http://{addr}{}", config.prefix);
    }

    server.run().await
}
