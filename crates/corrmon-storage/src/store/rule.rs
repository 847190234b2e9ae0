use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::rule::{self, Column, Entity};
use crate::error::Result;
use crate::store::Store;

/// 关联规则数据行（来自 rules 表）。
///
/// `definition_sql` 与 `grouping_criteria` 在库中以 JSON 文本存储，
/// 行类型上暴露为解析后的结构。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// `{"sql": ..., "params": ...}`
    pub definition_sql: serde_json::Value,
    pub definition_cel: String,
    pub timeframe_secs: i64,
    pub time_unit: String,
    pub grouping_criteria: Vec<String>,
    pub group_description: Option<String>,
    pub require_approve: bool,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: rule::Model) -> Result<RuleRow> {
    Ok(RuleRow {
        definition_sql: serde_json::from_str(&m.definition_sql)?,
        grouping_criteria: serde_json::from_str(&m.grouping_criteria)?,
        id: m.id,
        tenant_id: m.tenant_id,
        name: m.name,
        definition_cel: m.definition_cel,
        timeframe_secs: m.timeframe_secs,
        time_unit: m.time_unit,
        group_description: m.group_description,
        require_approve: m.require_approve,
        created_by: m.created_by,
        updated_by: m.updated_by,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl Store {
    pub async fn insert_rule(&self, row: &RuleRow) -> Result<RuleRow> {
        let now = Utc::now().fixed_offset();
        let am = rule::ActiveModel {
            id: Set(row.id.clone()),
            tenant_id: Set(row.tenant_id.clone()),
            name: Set(row.name.clone()),
            definition_sql: Set(serde_json::to_string(&row.definition_sql)?),
            definition_cel: Set(row.definition_cel.clone()),
            timeframe_secs: Set(row.timeframe_secs),
            time_unit: Set(row.time_unit.clone()),
            grouping_criteria: Set(serde_json::to_string(&row.grouping_criteria)?),
            group_description: Set(row.group_description.clone()),
            require_approve: Set(row.require_approve),
            created_by: Set(row.created_by.clone()),
            updated_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_row(model)
    }

    pub async fn get_rule_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<RuleRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db())
            .await?;
        model.map(to_row).transpose()
    }

    /// 按创建时间倒序分页返回租户的规则。
    pub async fn list_rules(
        &self,
        tenant_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RuleRow>> {
        let rows = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn count_rules(&self, tenant_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .count(self.db())
            .await?)
    }

    /// 整行更新规则；不存在时返回 `Ok(None)`。
    pub async fn update_rule(
        &self,
        tenant_id: &str,
        id: &str,
        row: &RuleRow,
    ) -> Result<Option<RuleRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db())
            .await?;
        if let Some(m) = model {
            let now = Utc::now().fixed_offset();
            let mut am: rule::ActiveModel = m.into();
            am.name = Set(row.name.clone());
            am.definition_sql = Set(serde_json::to_string(&row.definition_sql)?);
            am.definition_cel = Set(row.definition_cel.clone());
            am.timeframe_secs = Set(row.timeframe_secs);
            am.time_unit = Set(row.time_unit.clone());
            am.grouping_criteria = Set(serde_json::to_string(&row.grouping_criteria)?);
            am.group_description = Set(row.group_description.clone());
            am.require_approve = Set(row.require_approve);
            am.updated_by = Set(row.updated_by.clone());
            am.updated_at = Set(now);
            let updated = am.update(self.db()).await?;
            to_row(updated).map(Some)
        } else {
            Ok(None)
        }
    }

    pub async fn delete_rule(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let res = Entity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::TenantId.eq(tenant_id))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }
}
