use actix_web::{web, HttpResponse};

use crate::{
    api::{failed, path_id},
    database::MongoDB,
    models::ClientResponse,
    services::client_service::{self, ClientQuery},
};

#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    params(ClientQuery),
    responses((status = 200, description = "Active showcase clients", body = [ClientResponse]))
)]
pub async fn list_clients(db: web::Data<MongoDB>, query: web::Query<ClientQuery>) -> HttpResponse {
    match client_service::list_clients(&db, &query).await {
        Ok(clients) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "clients": clients
        })),
        Err(e) => failed("GET /clients", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client details", body = ClientResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_client(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let id = match path_id(&path, "client") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match client_service::get_client(&db, &id).await {
        Ok(client) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "client": client
        })),
        Err(e) => failed("GET /clients/{id}", e),
    }
}
