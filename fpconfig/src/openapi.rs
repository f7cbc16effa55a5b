use utoipa::OpenApi;

/// OpenAPI document for `/api/config`
#[derive(OpenApi)]
#[openapi(
    info(
        title = "FilterPlay Configuration API",
        version = "0.1.0",
        description = "Lecture et écriture de la configuration YAML de FilterPlay",
    ),
    paths(
        crate::api::get_full_config,
        crate::api::get_config_value,
        crate::api::update_config_value,
    ),
    components(schemas(crate::api::ConfigEntry, crate::api::UpdateConfigResponse)),
    tags((name = "config", description = "Configuration tree access"))
)]
pub struct ApiDoc;
