use chrono::{Duration, Utc};
use sqlx::{MySql, Pool};
use uuid::Uuid;

use super::model::{Feature, Plan, Subscription, SubscriptionStatus};

pub struct PlanCrud {
    pool: Pool<MySql>,
}

impl PlanCrud {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    pub async fn list(&self, billing_period: Option<&str>) -> Result<Vec<Plan>, sqlx::Error> {
        match billing_period {
            Some(period) => {
                sqlx::query_as::<_, Plan>(
                    "SELECT * FROM plans WHERE is_active = TRUE AND billing_period = ? ORDER BY price",
                )
                .bind(period)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE is_active = TRUE ORDER BY price")
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Plan>, sqlx::Error> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ? AND is_active = TRUE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn features_for(&self, plan_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT f.text FROM features f
            JOIN plan_features pf ON pf.feature_id = f.id
            WHERE pf.plan_id = ?
            ORDER BY f.text
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(text,)| text).collect())
    }

    pub async fn list_features(&self) -> Result<Vec<Feature>, sqlx::Error> {
        sqlx::query_as::<_, Feature>("SELECT * FROM features ORDER BY text")
            .fetch_all(&self.pool)
            .await
    }
}

pub struct SubscriptionCrud {
    pool: Pool<MySql>,
}

impl SubscriptionCrud {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    pub async fn current_for_user(&self, user_id: &str) -> Result<Option<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE user_id = ? AND status = 'active' AND end_date > ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a new period and refresh the snapshot on the user row; the
    /// snapshot is what token-authenticated requests read without a join.
    pub async fn activate(
        &self,
        user_id: &str,
        plan: &Plan,
        payment_id: Option<&str>,
        auto_renew: bool,
    ) -> Result<Subscription, sqlx::Error> {
        let now = Utc::now();
        let end_date = now + Duration::days(plan.duration_days());

        let subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active.as_str().to_string(),
            start_date: now,
            end_date,
            auto_renew,
            payment_id: payment_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, plan_id, status, start_date, end_date, auto_renew, payment_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&subscription.id)
        .bind(&subscription.user_id)
        .bind(&subscription.plan_id)
        .bind(&subscription.status)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.auto_renew)
        .bind(&subscription.payment_id)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET subscription_plan = ?, subscription_status = ?, subscription_start = ?,
                subscription_end = ?, subscription_auto_renew = ?, subscription_payment_id = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&subscription.plan_id)
        .bind(&subscription.status)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.auto_renew)
        .bind(&subscription.payment_id)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Cancellation keeps the period running until its end date; it only
    /// stops renewal and marks the status.
    pub async fn cancel(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE subscriptions SET status = 'cancelled', auto_renew = FALSE, updated_at = ?
            WHERE user_id = ? AND status = 'active'
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET subscription_status = 'cancelled', subscription_auto_renew = FALSE, updated_at = ?
            WHERE id = ? AND subscription_plan IS NOT NULL
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
