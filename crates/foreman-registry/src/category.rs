use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// A work category; its time unit scales every deadline for orders in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub description: String,
    /// Reference duration in seconds for one unit of work in this category.
    pub time_unit_secs: i64,
}

/// Directory of work categories, keyed by a small integer id.
pub struct CategoryDirectory {
    categories: Arc<RwLock<HashMap<u64, Category>>>,
    next_id: AtomicU64,
}

impl Default for CategoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryDirectory {
    pub fn new() -> Self {
        Self {
            categories: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn register(&self, description: &str, time_unit_secs: i64) -> Result<u64> {
        if time_unit_secs <= 0 {
            return Err(RegistryError::InvalidParameter(format!(
                "category time unit must be positive, got {}",
                time_unit_secs
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut categories = self.categories.write().await;
        categories.insert(
            id,
            Category {
                id,
                description: description.to_string(),
                time_unit_secs,
            },
        );

        info!(
            category = id,
            description = description,
            time_unit_secs = time_unit_secs,
            "🗂️ Category registered"
        );
        Ok(id)
    }

    pub async fn get(&self, id: u64) -> Result<Category> {
        let categories = self.categories.read().await;
        categories
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownCategory(id))
    }

    /// Reference time unit for the category, in seconds.
    pub async fn time_unit(&self, id: u64) -> Result<i64> {
        Ok(self.get(id).await?.time_unit_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_time_unit() {
        let directory = CategoryDirectory::new();
        let id = directory.register("short compute", 300).await.unwrap();
        assert_eq!(directory.time_unit(id).await.unwrap(), 300);
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let directory = CategoryDirectory::new();
        assert!(matches!(
            directory.time_unit(42).await,
            Err(RegistryError::UnknownCategory(42))
        ));
    }

    #[tokio::test]
    async fn test_rejects_nonpositive_time_unit() {
        let directory = CategoryDirectory::new();
        assert!(directory.register("broken", 0).await.is_err());
        assert!(directory.register("broken", -5).await.is_err());
    }
}
