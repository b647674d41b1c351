use std::future::Future;

use serde_json::Value;

use crate::store::StoreResult;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub user_id: i64,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub details: Value,
}

pub trait AuditLog: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Record an audit entry. A failed write is logged and otherwise ignored so
/// that an import which already succeeded is still reported as a success.
pub async fn log<A: AuditLog>(
    sink: &A,
    user_id: i64,
    action: &str,
    target_type: &str,
    target_id: i64,
    details: Value,
) {
    let entry = AuditEntry {
        user_id,
        action: action.to_string(),
        target_type: target_type.to_string(),
        target_id,
        details,
    };
    if let Err(e) = sink.record(&entry).await {
        log::error!("Failed to write audit entry '{action}' for {target_type} {target_id}: {e}");
    }
}
