use super::{SubscriptionRepository, Upserted};
use crate::entities::subscription_entity as subs;
use crate::error::{AppError, AppResult};
use crate::models::{NewSubscription, Subscription, TotalFilter};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, IntoActiveModel, Order, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    Statement, TransactionTrait, Value,
};
use uuid::Uuid;

const INSERT_SQL: &str = r#"
    INSERT INTO subscriptions (id, user_id, service_name, price, start_date, end_date)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (user_id, service_name) DO NOTHING
    RETURNING id, user_id, service_name, price, start_date, end_date, created_at, updated_at"#;

const UPSERT_SQL: &str = r#"
    INSERT INTO subscriptions (id, user_id, service_name, price, start_date, end_date)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (user_id, service_name) DO UPDATE SET
        price = EXCLUDED.price,
        start_date = EXCLUDED.start_date,
        end_date = EXCLUDED.end_date,
        updated_at = NOW()
    RETURNING id, user_id, service_name, price, start_date, end_date,
              created_at, updated_at, (xmax = 0) AS inserted"#;

pub struct PgSubscriptionRepository {
    db: DatabaseConnection,
}

impl PgSubscriptionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct UpsertRow {
    id: Uuid,
    user_id: Uuid,
    service_name: String,
    price: i32,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    inserted: bool,
}

#[derive(Debug, FromQueryResult)]
struct TotalRow {
    total: Option<i64>,
}

fn by_key(user_id: Uuid, service_name: &str) -> Condition {
    Condition::all()
        .add(subs::Column::UserId.eq(user_id))
        .add(subs::Column::ServiceName.eq(service_name))
}

/// Case-insensitive sort key, mirrored by the in-memory store.
fn service_name_ci() -> SimpleExpr {
    Func::lower(Expr::col(subs::Column::ServiceName)).into()
}

/// `SELECT SUM(price)` over records whose active interval overlaps the filter period.
fn total_query(filter: &TotalFilter) -> Select<subs::Entity> {
    let mut cond = Condition::all()
        .add(subs::Column::StartDate.lte(filter.end_month.first_day()))
        .add(
            Condition::any()
                .add(subs::Column::EndDate.is_null())
                .add(subs::Column::EndDate.gte(filter.start_month.first_day())),
        );
    if let Some(user_id) = filter.user_id {
        cond = cond.add(subs::Column::UserId.eq(user_id));
    }
    if let Some(service_name) = filter.service_name.as_deref() {
        cond = cond.add(subs::Column::ServiceName.eq(service_name));
    }

    subs::Entity::find()
        .select_only()
        .column_as(Expr::col(subs::Column::Price).sum(), "total")
        .filter(cond)
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn insert(&self, record: NewSubscription) -> AppResult<Subscription> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            INSERT_SQL,
            [
                Value::from(Uuid::new_v4()),
                Value::from(record.user_id),
                Value::from(record.service_name),
                Value::from(record.price),
                Value::from(record.period.start.first_day()),
                Value::from(record.period.end.map(|m| m.first_day())),
            ],
        );

        // no row back means the (user, service) pair already exists
        match subs::Entity::find().from_raw_sql(stmt).one(&self.db).await? {
            Some(m) => Subscription::try_from(m),
            None => Err(AppError::Conflict("Subscription already exists".to_string())),
        }
    }

    async fn update(&self, record: NewSubscription) -> AppResult<Option<Subscription>> {
        let txn = self.db.begin().await?;
        let Some(existing) = subs::Entity::find()
            .filter(by_key(record.user_id, &record.service_name))
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };

        let mut am = existing.into_active_model();
        am.price = Set(record.price);
        am.start_date = Set(record.period.start.first_day());
        am.end_date = Set(record.period.end.map(|m| m.first_day()));
        am.updated_at = Set(Some(Utc::now()));
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        Subscription::try_from(updated).map(Some)
    }

    async fn upsert(&self, record: NewSubscription) -> AppResult<Upserted> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            UPSERT_SQL,
            [
                Value::from(Uuid::new_v4()),
                Value::from(record.user_id),
                Value::from(record.service_name),
                Value::from(record.price),
                Value::from(record.period.start.first_day()),
                Value::from(record.period.end.map(|m| m.first_day())),
            ],
        );
        let row = UpsertRow::find_by_statement(stmt)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::InternalError("upsert returned no row".to_string()))?;

        let inserted = row.inserted;
        let subscription = Subscription::try_from(subs::Model {
            id: row.id,
            user_id: row.user_id,
            service_name: row.service_name,
            price: row.price,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })?;

        Ok(if inserted {
            Upserted::Created(subscription)
        } else {
            Upserted::Replaced(subscription)
        })
    }

    async fn find(&self, user_id: Uuid, service_name: &str) -> AppResult<Option<Subscription>> {
        subs::Entity::find()
            .filter(by_key(user_id, service_name))
            .one(&self.db)
            .await?
            .map(Subscription::try_from)
            .transpose()
    }

    async fn delete(&self, user_id: Uuid, service_name: &str) -> AppResult<bool> {
        let res = subs::Entity::delete_many()
            .filter(by_key(user_id, service_name))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        subs::Entity::find()
            .filter(subs::Column::UserId.eq(user_id))
            .order_by(service_name_ci(), Order::Asc)
            .order_by_asc(subs::Column::ServiceName)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Subscription::try_from)
            .collect()
    }

    async fn sum_active(&self, filter: &TotalFilter) -> AppResult<i64> {
        let total = total_query(filter)
            .into_model::<TotalRow>()
            .one(&self.db)
            .await?
            .and_then(|r| r.total)
            .unwrap_or(0);
        Ok(total)
    }
}
