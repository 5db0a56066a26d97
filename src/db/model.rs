use crate::db::StoreError;
use crate::model::{QueueItem, QueueStatus, Quote, ReactionCounts};

/// Raw queue row as stored: status string plus JSON columns.
#[derive(Debug, Clone)]
pub struct QueueRow {
    pub date_key: String,
    pub status: String,
    pub content: Option<String>,
    pub reactions: String,
}

impl QueueRow {
    /// Decode a raw row into a domain [`QueueItem`].
    pub fn decode(self) -> Result<QueueItem, StoreError> {
        let status = QueueStatus::parse_status(&self.status).unwrap_or(QueueStatus::Empty);
        let content = match &self.content {
            Some(json) => Some(serde_json::from_str::<Quote>(json).map_err(|source| {
                StoreError::Decode {
                    date: self.date_key.clone(),
                    source,
                }
            })?),
            None => None,
        };
        let reactions = serde_json::from_str::<ReactionCounts>(&self.reactions).map_err(
            |source| StoreError::Decode {
                date: self.date_key.clone(),
                source,
            },
        )?;
        Ok(QueueItem {
            date: self.date_key,
            status,
            content,
            reactions,
        })
    }
}
