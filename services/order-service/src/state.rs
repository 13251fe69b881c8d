use read_model::OrderCache;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<OrderCache>,
    pub static_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(cache: Arc<OrderCache>, static_dir: PathBuf) -> Self {
        Self {
            cache,
            static_dir: Arc::new(static_dir),
        }
    }
}
