use crate::{
    EngineError, ResultEngine,
    notifications::{self, Notification},
};

use super::Engine;

/// Upper bound for a single notifications page.
pub const MAX_NOTIFICATIONS: u64 = 500;

impl Engine {
    /// Latest notifications stored by the [`DatabaseNotifier`], newest first.
    ///
    /// [`DatabaseNotifier`]: crate::DatabaseNotifier
    pub async fn list_notifications(&self, limit: u64) -> ResultEngine<Vec<Notification>> {
        if limit == 0 || limit > MAX_NOTIFICATIONS {
            return Err(EngineError::Validation(format!(
                "limit must be between 1 and {MAX_NOTIFICATIONS}"
            )));
        }
        notifications::latest(&self.database, limit).await
    }
}
