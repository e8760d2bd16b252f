use actix_web::{http::header, web, HttpResponse};
use std::path::Path;

use crate::{api::failed, config::settings, services::storage_service::read_local};

/// Serves images written by the local image store.
#[utoipa::path(
    get,
    path = "/uploads/{name}",
    tag = "Uploads",
    params(("name" = String, Path, description = "Stored file name")),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "Not found")
    )
)]
pub async fn serve_upload(path: web::Path<String>) -> HttpResponse {
    let dir = Path::new(&settings().upload_dir);

    match read_local(dir, &path).await {
        Ok((bytes, content_type)) => HttpResponse::Ok()
            .content_type(content_type)
            .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
            .body(bytes),
        Err(e) => failed("GET /uploads/{name}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_traversal_is_rejected() {
        let app = test::init_service(App::new().route("/uploads/{name}", web::get().to(serve_upload))).await;

        let req = test::TestRequest::get().uri("/uploads/..%2F.env").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/uploads/missing-file.png").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
