use tracing::{debug, warn};

use super::{Dispatcher, StageResult};
use crate::models::FileRecord;
use crate::services::adapters::ServiceError;

pub(super) async fn run(d: &Dispatcher, file: &FileRecord) -> StageResult {
    let Some(thumbnailer) = d.adapters.thumbnailer.as_ref() else {
        debug!("No thumbnailer configured");
        return Ok(());
    };

    match thumbnailer.generate(file).await {
        Ok(Some(path)) => {
            d.store.update_thumbnail(&file.id, &path).await?;
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(ServiceError::NotConfigured(what)) => {
            warn!("Skipping thumbnail: {} unavailable", what);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
