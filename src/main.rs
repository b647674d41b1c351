use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, middleware, web};

use portal_import::config::AppConfig;
use portal_import::db;
use portal_import::handlers::import_handlers::{self, ImportSettings};
use portal_import::portable::HandlerRegistry;
use portal_import::portable::html::HtmlTextContent;
use portal_import::store::PgStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let pool = db::init_pool(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;
    db::run_migrations(&pool).await.map_err(std::io::Error::other)?;

    let mut registry = HandlerRegistry::new();
    HtmlTextContent::register(&mut registry, pool.clone());
    log::info!("Registered {} content handler(s)", registry.len());

    let store = web::Data::new(PgStore::new(pool, config.files_root.clone()));
    let registry = web::Data::new(registry);
    let settings = web::Data::new(ImportSettings {
        access_denied_url: config.access_denied_url.clone(),
        default_return_url: config.default_return_url.clone(),
        max_document_bytes: config.import_max_bytes,
    });
    let secret_key = config.session_key();

    log::info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(
            CookieSessionStore::default(),
            secret_key.clone(),
        )
        .cookie_secure(false)
        .cookie_http_only(true)
        .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(store.clone())
            .app_data(registry.clone())
            .app_data(settings.clone())
            .configure(import_handlers::configure::<PgStore>)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
