use async_trait::async_trait;
use sqlx::PgPool;

use super::{RideStore, StoreError};
use crate::models::{Group, Member, NewGroup, NewMember, NewUser, User};

// 成员人数由子查询实时统计
const GROUP_COLUMNS: &str = r#"
    g.id, g.group_name, g.start_location, g.end_location, g.total_cost,
    g.time_range_start, g.time_range_end,
    (SELECT COUNT(*) FROM ride_members m WHERE m.group_id = g.id) AS number_of_members,
    g.created_at
"#;

const MEMBER_COLUMNS: &str =
    "id, group_id, member_name, member_email, user_id, contribution, joined_at";

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, created_at";

// Postgres 错误码
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const GROUP_FOREIGN_KEY: &str = "ride_members_group_id_fkey";
const USER_FOREIGN_KEY: &str = "ride_members_user_id_fkey";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn fetch_group(&self, group_id: i64) -> Result<Option<Group>, StoreError> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM ride_groups g WHERE g.id = $1");
        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(group)
    }
}

fn db_error_code(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

#[async_trait]
impl RideStore for PgStore {
    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError> {
        let sql = format!(
            r#"
            WITH g AS (
                INSERT INTO ride_groups (
                    group_name, start_location, end_location, total_cost,
                    time_range_start, time_range_end
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {GROUP_COLUMNS} FROM g
            "#
        );
        // 新建群组还没有成员，子查询在 CTE 中看不到新行也不影响
        let created = sqlx::query_as::<_, Group>(&sql)
            .bind(&group.group_name)
            .bind(&group.start_location)
            .bind(&group.end_location)
            .bind(group.total_cost)
            .bind(group.time_range_start)
            .bind(group.time_range_end)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!("Created ride group {}", created.id);
        Ok(created)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM ride_groups g ORDER BY g.id");
        let groups = sqlx::query_as::<_, Group>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<Group>, StoreError> {
        self.fetch_group(group_id).await
    }

    async fn update_group_price(
        &self,
        group_id: i64,
        total_cost: f64,
    ) -> Result<Group, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE ride_groups
            SET total_cost = $2
            WHERE id = $1 AND total_cost > $2
            "#,
        )
        .bind(group_id)
        .bind(total_cost)
        .execute(&self.pool)
        .await?;

        let group = self.fetch_group(group_id).await?.ok_or(StoreError::NotFound)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::PriceNotLower {
                current: group.total_cost,
            });
        }
        Ok(group)
    }

    async fn delete_group(&self, group_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM ride_groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn add_member(&self, member: NewMember) -> Result<(Member, bool), StoreError> {
        let sql = format!(
            r#"
            INSERT INTO ride_members (group_id, member_name, member_email, user_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id, user_id) WHERE user_id IS NOT NULL DO NOTHING
            RETURNING {MEMBER_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, Member>(&sql)
            .bind(member.group_id)
            .bind(&member.member_name)
            .bind(&member.member_email)
            .bind(member.user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if db_error_code(&e).as_deref() != Some(FOREIGN_KEY_VIOLATION) {
                    return StoreError::Database(e);
                }
                match e.as_database_error().and_then(|db| db.constraint()) {
                    Some(GROUP_FOREIGN_KEY) => StoreError::NotFound,
                    Some(USER_FOREIGN_KEY) => StoreError::UnknownUser,
                    _ => StoreError::Database(e),
                }
            })?;

        if let Some(inserted) = inserted {
            return Ok((inserted, true));
        }

        // 冲突：该用户已在群组中，返回已有记录
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM ride_members WHERE group_id = $1 AND user_id = $2"
        );
        let existing = sqlx::query_as::<_, Member>(&sql)
            .bind(member.group_id)
            .bind(member.user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok((existing, false))
    }

    async fn remove_member(&self, group_id: i64, user_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM ride_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn remove_member_by_id(&self, member_id: i64) -> Result<Member, StoreError> {
        let sql = format!("DELETE FROM ride_members WHERE id = $1 RETURNING {MEMBER_COLUMNS}");
        sqlx::query_as::<_, Member>(&sql)
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn list_members(&self, group_id: i64) -> Result<Vec<Member>, StoreError> {
        let sql =
            format!("SELECT {MEMBER_COLUMNS} FROM ride_members WHERE group_id = $1 ORDER BY id");
        let members = sqlx::query_as::<_, Member>(&sql)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    async fn count_members(&self, group_id: i64) -> Result<i64, StoreError> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM ride_members m WHERE m.group_id = g.id)
            FROM ride_groups g
            WHERE g.id = $1
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        count.ok_or(StoreError::NotFound)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, phone, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match db_error_code(&e).as_deref() {
                Some(UNIQUE_VIOLATION) => StoreError::Conflict,
                _ => StoreError::Database(e),
            })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
