use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};

use crate::entities::incident::{self, Column, Entity};
use crate::error::Result;
use crate::store::Store;

/// 事件数据行（规则触发产生的 incident）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRow {
    pub id: String,
    pub tenant_id: String,
    pub rule_id: String,
    pub alert_count: i64,
    pub started_at: DateTime<Utc>,
}

/// 按分钟聚合的事件数量桶，用于规则列表的分布图。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionBucket {
    /// 形如 `2026-08-29 13:05` 的分钟键
    pub minute: String,
    pub count: i64,
}

fn to_row(m: incident::Model) -> IncidentRow {
    IncidentRow {
        id: m.id,
        tenant_id: m.tenant_id,
        rule_id: m.rule_id,
        alert_count: m.alert_count,
        started_at: m.started_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn insert_incident(&self, row: &IncidentRow) -> Result<IncidentRow> {
        let am = incident::ActiveModel {
            id: Set(row.id.clone()),
            tenant_id: Set(row.tenant_id.clone()),
            rule_id: Set(row.rule_id.clone()),
            alert_count: Set(row.alert_count),
            started_at: Set(row.started_at.fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    /// 每条规则的历史事件总数。
    pub async fn incident_counts(&self, tenant_id: &str) -> Result<HashMap<String, u64>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .all(self.db())
            .await?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for m in rows {
            *counts.entry(m.rule_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// 自 `since` 以来每条规则按分钟聚合的事件分布。
    ///
    /// 桶按分钟键升序排列。
    pub async fn incident_distribution(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<DistributionBucket>>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::StartedAt.gte(since.fixed_offset()))
            .all(self.db())
            .await?;

        let mut per_rule: HashMap<String, BTreeMap<String, i64>> = HashMap::new();
        for m in rows {
            let minute = m
                .started_at
                .with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M")
                .to_string();
            *per_rule
                .entry(m.rule_id)
                .or_default()
                .entry(minute)
                .or_insert(0) += 1;
        }

        Ok(per_rule
            .into_iter()
            .map(|(rule_id, buckets)| {
                let buckets = buckets
                    .into_iter()
                    .map(|(minute, count)| DistributionBucket { minute, count })
                    .collect();
                (rule_id, buckets)
            })
            .collect())
    }
}
