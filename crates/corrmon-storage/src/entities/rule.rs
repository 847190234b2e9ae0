use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// JSON 文本：`{"sql": ..., "params": ...}`
    pub definition_sql: String,
    pub definition_cel: String,
    pub timeframe_secs: i64,
    pub time_unit: String,
    /// JSON 数组文本，如 `["labels.host"]`
    pub grouping_criteria: String,
    pub group_description: Option<String>,
    pub require_approve: bool,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
