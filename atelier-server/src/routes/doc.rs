use crate::routes::{generation, health, sessions};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "atelier-server",
    description = "Conversational image generation API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(sessions::SessionApi::openapi());
    root.merge(generation::GenerationApi::openapi());
    root
}
