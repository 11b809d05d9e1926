use gleaner_core::CoordinatorHandle;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    /// Token protecting the run commands (None = commands disabled).
    pub admin_token: Option<String>,
}
