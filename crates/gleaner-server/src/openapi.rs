use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gleaner API",
        version = "0.1.0",
        description = "Scrapes every detail page linked from a listing page into tabular records."
    ),
    paths(
        crate::routes::get_run,
        crate::routes::start_run,
        crate::routes::cancel_run,
        crate::routes::run_events,
        crate::routes::export_run,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::StartRunRequest,
        crate::dto::RunStateResponse,
        crate::dto::RecordResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "run", description = "Scrape run control, progress and export"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Admin token. Set via GLEANER_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
