use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};

use corrmon_common::id;

use crate::entities::user::{self, Column, Entity};
use crate::error::Result;
use crate::store::Store;

/// 用户数据行（不含明文密码）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub tenant_id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: user::Model) -> UserRow {
    UserRow {
        id: m.id,
        tenant_id: m.tenant_id,
        username: m.username,
        password_hash: m.password_hash,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn create_user(
        &self,
        tenant_id: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        let now = Utc::now().fixed_offset();
        let am = user::ActiveModel {
            id: Set(id::next_id()),
            tenant_id: Set(tenant_id.to_string()),
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        let model = Entity::find()
            .filter(Column::Username.eq(username))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn count_users(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }
}
