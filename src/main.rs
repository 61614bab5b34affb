use actix_cors::Cors;
use actix_files::Files;
use actix_web::{
    error::JsonPayloadError,
    middleware::Logger,
    web::{self, JsonConfig},
    App, HttpResponse, HttpServer, Responder,
};
use std::sync::Arc;

mod backup;
mod cli;
mod config;
mod db;
mod handlers;
mod logging;
mod middleware;
mod models;
mod routes;
mod seed;
mod time;
mod types;
mod validation;

use backup::BackupManager;
use cli::Cli;
use db::Database;

/// API info route, mounted at /api/.
async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "name": "ParkPro API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// JSON error handler for better error messages
fn json_error_handler(err: JsonPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    use types::ErrorResponse;
    let error_response =
        ErrorResponse::new("json_parse_error", format!("Invalid JSON: {}", err));
    let body = HttpResponse::BadRequest().json(error_response);
    actix_web::error::InternalError::from_response(err, body).into()
}

fn open_database(cfg: &config::AppConfig) -> Database {
    Database::new(&cfg.sled_path).expect("Failed to open database")
}

fn run_add_admin(cfg: &config::AppConfig, args: &cli::AddAdminArgs) {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
    use rand_core::OsRng;

    let email = args.email.trim().to_lowercase();
    if let Err(problem) = validation::validate_email_strict(&email) {
        eprintln!("Error: {}", problem);
        std::process::exit(2);
    }
    if let Err(problem) = validation::password_strength(&args.password) {
        eprintln!("Error: {}", problem);
        std::process::exit(2);
    }

    let db = open_database(cfg);
    let users: Vec<models::user::UserRecord> = db.list("users").unwrap_or_default();
    if users.iter().any(|u| u.email == email) {
        eprintln!("Error: User with email '{}' already exists", email);
        std::process::exit(2);
    }

    // Fall back to the email local part when no display name was given
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| email.split('@').next().unwrap_or("admin").to_string());

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(args.password.as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string();

    let admin = models::user::UserRecord::new_admin(&name, &email, hash);
    db.insert("users", &admin.id, &admin)
        .expect("Failed to insert admin user");

    println!("✓ Admin user created: {}", email);
    println!("  ID: {}", admin.id);
    println!("  Name: {}", admin.name);
}

fn run_db_command(cfg: &config::AppConfig, action: &cli::DbCommands) {
    use cli::DbCommands;

    match action {
        DbCommands::Test => {
            logging::log_command_start("db test", "open the database and count records");
            let started = std::time::Instant::now();
            let db = open_database(cfg);
            for collection in db::COLLECTIONS {
                match db.count(collection) {
                    Ok(n) => println!("  {:<10} {} records", collection, n),
                    Err(e) => println!("  {:<10} error: {}", collection, e),
                }
            }
            logging::log_command_complete("db test", true, started.elapsed());
        }
        DbCommands::Seed { force } => {
            logging::log_command_start("db seed", "populate collections with demo data");
            let started = std::time::Instant::now();
            let db = open_database(cfg);
            match seed::seed_demo_data(&db, *force) {
                Ok(()) => logging::log_command_complete("db seed", true, started.elapsed()),
                Err(e) => {
                    logging::log_error(&format!("Seeding failed: {}", e));
                    logging::log_command_complete("db seed", false, started.elapsed());
                    std::process::exit(1);
                }
            }
        }
        DbCommands::Dump { output } => {
            logging::log_command_start("db dump", "export all collections as JSON");
            let started = std::time::Instant::now();
            let db = open_database(cfg);
            let doc = match db.export_json() {
                Ok(doc) => doc,
                Err(e) => {
                    logging::log_error(&format!("Export failed: {}", e));
                    std::process::exit(1);
                }
            };
            let pretty = serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string());
            if let Err(e) = std::fs::write(output, pretty) {
                logging::log_error(&format!("Failed to write {}: {}", output, e));
                std::process::exit(1);
            }
            logging::log_collection_operation("dump", "all", None, true);
            logging::log_command_complete("db dump", true, started.elapsed());
            println!("✓ Database exported to {}", output);
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse_args();

    logging::init_logging(cli.verbose).expect("Failed to initialize logging");
    logging::print_build_info();

    let mut cfg = config::load_config_from_file(&cli.config);
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }
    if let Some(host) = &cli.host {
        cfg.server.host = host.clone();
    }

    if let Some(command) = &cli.command {
        match command {
            cli::Commands::Serve { .. } => {} // handled below
            cli::Commands::User { action } => {
                let cli::UserCommands::AddAdmin(args) = action;
                run_add_admin(&cfg, args);
                return Ok(());
            }
            cli::Commands::Db { action } => {
                run_db_command(&cfg, action);
                return Ok(());
            }
        }
    }

    // Restore must run before sled opens the path, opening creates files
    let backup_manager = Arc::new(BackupManager::new(
        &cfg.sled_path,
        &cfg.backup_dir,
        &cfg.backup_name_template,
    ));
    match backup_manager.restore_from_latest().await {
        Ok(true) => log::info!("Database restored from latest backup"),
        Ok(false) => {}
        Err(e) => log::warn!("Backup restore check failed: {}", e),
    }

    let database = open_database(&cfg);

    if cli.should_seed_on_startup() {
        if let Err(e) = seed::seed_demo_data(&database, false) {
            logging::log_error(&format!("Startup seeding failed: {}", e));
        }
    }

    if let Some(interval) = cfg.backup_interval {
        let backup_mgr = backup_manager.clone();
        let retention = cfg.backup_retention;
        tokio::spawn(async move {
            backup_mgr.run(interval, retention).await;
        });
        log::info!(
            "Periodic backups enabled: interval={:?}, retention={}",
            interval,
            retention
        );
    }

    let bind_address = format!("{}:{}", cfg.server.host, cfg.server.port);
    logging::log_server_startup(&cfg.server.name, &cfg.server.host, cfg.server.port);
    log::info!("Database path: {}", cfg.sled_path);
    log::info!("Backup path: {}", cfg.backup_dir);

    let db_data = web::Data::new(database.clone());
    let cfg_data = web::Data::new(cfg.clone());
    let cors_rules = cfg.cors_rules.clone();

    HttpServer::new(move || {
        let rules_clone = cors_rules.clone();
        let mut cors = Cors::default()
            .allowed_origin_fn(move |origin, _req| {
                let origin_str = origin.to_str().unwrap_or("");
                config::is_origin_allowed(&rules_clone, origin_str)
            })
            .supports_credentials()
            .max_age(3600);
        cors = match config::allowed_methods(&cors_rules) {
            Some(methods) => cors.allowed_methods(methods.iter().map(String::as_str)),
            None => cors.allow_any_method(),
        };
        cors = match config::allowed_headers(&cors_rules) {
            Some(headers) => cors.allowed_headers(headers.iter().map(String::as_str)),
            None => cors.allow_any_header(),
        };

        App::new()
            .app_data(
                JsonConfig::default()
                    .limit(1024 * 1024) // 1MB limit
                    .error_handler(json_error_handler),
            )
            .app_data(db_data.clone())
            .app_data(cfg_data.clone())
            .wrap(middleware::security::SecurityHeaders)
            .wrap(cors)
            .wrap(Logger::default())
            .service(routes::health::healthz)
            .service(routes::health::health)
            .service(
                web::scope("/api")
                    .route("/", web::get().to(index))
                    // Auth routes (public)
                    .service(
                        web::scope("/auth")
                            .service(handlers::auth::register)
                            .service(handlers::auth::login)
                            .service(handlers::auth::logout)
                            .service(handlers::auth::refresh)
                            .service(handlers::auth::me),
                    )
                    // Everything below requires a valid session
                    .service(
                        web::scope("")
                            .wrap(actix_web::middleware::from_fn(handlers::auth::guard_api))
                            .service(handlers::users::list_users)
                            .service(handlers::users::get_user)
                            .service(handlers::users::update_user_role)
                            .service(handlers::users::delete_user)
                            .service(handlers::vehicles::list_vehicles)
                            .service(handlers::vehicles::create_vehicle)
                            .service(handlers::vehicles::get_vehicle)
                            .service(handlers::vehicles::update_vehicle)
                            .service(handlers::vehicles::delete_vehicle)
                            .service(handlers::slots::list_slots)
                            .service(handlers::slots::create_slot)
                            .service(handlers::slots::get_slot)
                            .service(handlers::slots::update_slot_status)
                            .service(handlers::requests::list_requests)
                            .service(handlers::requests::create_request)
                            .service(handlers::requests::approve_request)
                            .service(handlers::requests::reject_request)
                            .service(handlers::requests::cancel_request)
                            .service(handlers::logs::list_logs)
                            .service(handlers::dashboard::dashboard_stats),
                    ),
            )
            // Static files and SPA fallback (must be last)
            .service(
                Files::new("/", "./static")
                    .index_file("index.html")
                    .default_handler(web::to(routes::static_files::spa_fallback)),
            )
    })
    .bind(&bind_address)?
    .run()
    .await?;

    // The id counter tree is not flushed on every bump, settle it before exit
    if let Err(e) = database.flush() {
        log::warn!("Final database flush failed: {}", e);
    }
    Ok(())
}
