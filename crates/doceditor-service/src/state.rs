//! Service wiring shared by every front end.

use std::sync::Arc;

use tracing::info;

use doceditor_core::config::AppConfig;
use doceditor_core::error::AppError;
use doceditor_core::result::AppResult;
use doceditor_core::traits::storage::StorageProvider;
use doceditor_database::DatabasePool;
use doceditor_database::migration::run_migrations;
use doceditor_database::repositories::{
    AnnotationLayerRepository, AuditLogRepository, FileRepository,
};
use doceditor_storage::{BlobStore, LocalStorageProvider};

use crate::annotation::AnnotationService;
use crate::audit::AuditService;
use crate::document::DocumentService;
use crate::version::VersionManager;

/// Every long-lived handle, built once at startup.
///
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// SQLite connection pool.
    pub db: DatabasePool,
    /// Version chain of every file.
    pub versions: Arc<VersionManager>,
    /// Audit trail.
    pub audit: Arc<AuditService>,
    /// Annotation layers.
    pub annotations: Arc<AnnotationService>,
    /// Document operations.
    pub documents: Arc<DocumentService>,
}

impl AppState {
    /// Connect to the database, apply migrations when
    /// `database.auto_migrate` is set, open the blob store and wire the
    /// services together.
    pub async fn build(config: AppConfig) -> AppResult<Self> {
        let db = DatabasePool::connect(&config.database).await?;
        if config.database.auto_migrate {
            run_migrations(db.pool()).await?;
        }

        let provider = LocalStorageProvider::new(&config.storage.root_path).await?;
        if !provider.health_check().await? {
            return Err(AppError::storage(format!(
                "Storage root {} is not usable",
                config.storage.root_path
            )));
        }
        info!(
            provider = provider.provider_type(),
            root = %config.storage.root_path,
            "Blob store ready"
        );
        let blobs = Arc::new(BlobStore::new(Arc::new(provider)));

        let file_repo = Arc::new(FileRepository::new(db.pool().clone()));
        let audit_repo = Arc::new(AuditLogRepository::new(db.pool().clone()));
        let layer_repo = Arc::new(AnnotationLayerRepository::new(db.pool().clone()));

        let versions = Arc::new(VersionManager::new(file_repo, blobs));
        let audit = Arc::new(AuditService::new(
            audit_repo,
            config.editor.audit_default_limit,
        ));
        let annotations = Arc::new(AnnotationService::new(
            layer_repo,
            Arc::clone(&versions),
            Arc::clone(&audit),
        ));
        let documents = Arc::new(DocumentService::new(
            config.editor.clone(),
            config.storage.max_upload_size_bytes,
            Arc::clone(&versions),
            Arc::clone(&annotations),
            Arc::clone(&audit),
        ));

        Ok(Self {
            config: Arc::new(config),
            db,
            versions,
            audit,
            annotations,
            documents,
        })
    }
}
