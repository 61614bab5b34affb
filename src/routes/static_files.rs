// SPA fallback for the console frontend
use actix_files::NamedFile;
use actix_web::{HttpRequest, Result};

/// Serve index.html for non-API paths so HTML5 history routing works.
pub async fn spa_fallback(req: HttpRequest) -> Result<NamedFile> {
    let path = req.path();

    // API calls and asset requests must 404 honestly
    if path.starts_with("/api/") || path.starts_with("/assets/") {
        return Err(actix_web::error::ErrorNotFound("Not found"));
    }

    NamedFile::open_async("./static/index.html")
        .await
        .map_err(actix_web::error::ErrorInternalServerError)
}
