use chrono::Utc;
use corrmon_common::types::AlertSnapshot;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities::alert::{self, Column, Entity};
use crate::error::Result;
use crate::store::Store;

fn to_snapshot(m: alert::Model) -> AlertSnapshot {
    AlertSnapshot {
        id: m.id,
        tenant_id: m.tenant_id,
        fingerprint: m.fingerprint,
        event_json: m.event_json,
        received_at: m.received_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn insert_alert(&self, snap: &AlertSnapshot) -> Result<AlertSnapshot> {
        let am = alert::ActiveModel {
            id: Set(snap.id.clone()),
            tenant_id: Set(snap.tenant_id.clone()),
            fingerprint: Set(snap.fingerprint.clone()),
            event_json: Set(snap.event_json.clone()),
            received_at: Set(snap.received_at.fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_snapshot(model))
    }

    /// 返回租户最近的告警，按接收时间倒序，最多 `limit` 条。
    pub async fn last_alerts(&self, tenant_id: &str, limit: usize) -> Result<Vec<AlertSnapshot>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by(Column::ReceivedAt, Order::Desc)
            .limit(limit as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_snapshot).collect())
    }

    pub async fn count_alerts(&self, tenant_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .count(self.db())
            .await?)
    }
}
