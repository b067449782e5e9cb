use actix_web::{middleware::from_fn, web, HttpResponse};
use serde_json::Value;

use crate::{
    auth::{authorize, Access, AnnotationToken},
    errors::ServerError,
    models::annotation::{self, AnnotationList, Document},
    store::Store,
};

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .wrap(from_fn(authorize))
            .service(
                web::resource(["", "/"])
                    .route(web::get().to(list))
                    .route(web::post().to(create)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::put().to(update))
                    .route(web::delete().to(delete)),
            ),
    );
}

/// An empty body is an empty annotation; anything else must be a JSON object.
fn parse_body(body: &[u8]) -> Result<Document, ServerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::new());
    }

    match serde_json::from_slice(body) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(ServerError::BadRequest(
            "request body must be a JSON object".to_owned(),
        )),
        Err(e) => Err(ServerError::BadRequest(e.to_string())),
    }
}

pub async fn list(
    token: web::ReqData<AnnotationToken>,
    store: web::Data<Store>,
) -> Result<HttpResponse, ServerError> {
    let token = token.into_inner();
    let rows = web::block(move || store.find_by_owner(token.as_str())).await??;
    let rows = rows.into_iter().map(annotation::present).collect();

    Ok(HttpResponse::Ok().json(AnnotationList::new(rows)))
}

pub async fn create(
    token: web::ReqData<AnnotationToken>,
    body: web::Bytes,
    store: web::Data<Store>,
) -> Result<HttpResponse, ServerError> {
    let doc = annotation::stamp_create(parse_body(&body)?, token.as_str());
    let inserted = web::block(move || store.insert(doc)).await??;
    log::debug!("created annotation {}", inserted[annotation::ID]);

    Ok(HttpResponse::Created().json(annotation::present(inserted)))
}

pub async fn update(
    annotation_id: web::Path<String>,
    token: web::ReqData<AnnotationToken>,
    body: web::Bytes,
    store: web::Data<Store>,
    access: web::Data<Access>,
) -> Result<HttpResponse, ServerError> {
    let annotation_id = annotation_id.into_inner();
    let token = token.into_inner();
    let stamped = annotation::stamp_update(parse_body(&body)?, token.as_str());
    let (set, insert_only) = annotation::split_insert_only(stamped);

    let updated = web::block(move || {
        store.upsert(&annotation_id, set, insert_only, access.owner_guard(&token))?;
        store
            .find_one(&annotation_id)?
            .ok_or_else(|| ServerError::NotFound(annotation_id.clone()))
    })
    .await??;

    Ok(HttpResponse::Ok().json(annotation::present(updated)))
}

pub async fn delete(
    annotation_id: web::Path<String>,
    token: web::ReqData<AnnotationToken>,
    store: web::Data<Store>,
    access: web::Data<Access>,
) -> Result<HttpResponse, ServerError> {
    let annotation_id = annotation_id.into_inner();
    let token = token.into_inner();

    let removed =
        web::block(move || store.remove(&annotation_id, access.owner_guard(&token))).await??;
    log::debug!("removed {removed} annotation(s)");

    Ok(HttpResponse::NoContent().finish())
}
