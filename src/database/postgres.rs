//! PostgreSQL implementation of the relational store gateway.
//!
//! Queries are runtime-checked (`sqlx::query_as::<_, T>`) so the crate builds
//! without a live database. Column lists are shared constants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::store::{
    LifecycleStore, LifecycleTransaction, PickerChange, ServiceChanges, StoreError, StoreResult,
};
use crate::models::{
    ChatRoom, Inquiry, NewInquiry, NewService, Payment, Service, ServiceParties, User,
};
use crate::projection::ProjectedStatus;
use crate::state_machine::{CancelCause, InquiryState, ServiceState};

const USER_COLUMNS: &str =
    "user_id, user_uuid, username, role, balance, push_topic, created_at";

const INQUIRY_COLUMNS: &str = "\
    inquiry_id, inquiry_uuid, inquirer_id, picker_id, budget, service_type, \
    appointment_time, duration_minutes, address, inquiry_status, \
    created_at, updated_at, expired_at";

const SERVICE_COLUMNS: &str = "\
    service_id, service_uuid, customer_id, provider_id, inquiry_id, price, \
    duration_minutes, appointment_time, service_status, start_time, end_time, \
    cancel_cause, booked_at, created_at, updated_at";

const CHAT_ROOM_COLUMNS: &str = "chat_room_id, channel_uuid, inquiry_id, created_at, deleted_at";

const PAYMENT_COLUMNS: &str =
    "payment_id, payer_id, service_id, amount, refunded_at, created_at";

const ACTIVE_INQUIRY_STATES: [InquiryState; 4] = [
    InquiryState::Inquiring,
    InquiryState::Asking,
    InquiryState::WaitForInquirerApprove,
    InquiryState::Chatting,
];

/// Joins a service with both parties' push topics for reconciliation scans
const SERVICE_PARTIES_SELECT: &str = "\
    SELECT s.service_id, s.service_uuid, \
           customer.push_topic AS customer_topic, provider.push_topic AS provider_topic \
    FROM services s \
    LEFT JOIN users customer ON customer.user_id = s.customer_id \
    LEFT JOIN users provider ON provider.user_id = s.provider_id";

/// Map unique and check violations to a typed constraint error
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() || db_err.is_check_violation() {
            return StoreError::ConstraintViolation {
                constraint: db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string()),
            };
        }
    }
    StoreError::Database(err)
}

/// Relational gateway over a shared connection pool
#[derive(Clone)]
pub struct PgLifecycleStore {
    pool: PgPool,
}

impl std::fmt::Debug for PgLifecycleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgLifecycleStore")
            .field("pool", &format!("PgPool(size={})", self.pool.size()))
            .finish()
    }
}

impl PgLifecycleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn select_service_parties(
        &self,
        status: ServiceState,
        predicate: &str,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>> {
        let query = format!(
            "{SERVICE_PARTIES_SELECT} WHERE s.service_status = $1 AND {predicate} <= $2 \
             ORDER BY s.service_id"
        );
        let rows = sqlx::query_as::<_, ServiceParties>(&query)
            .bind(status.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl LifecycleStore for PgLifecycleStore {
    async fn begin(&self) -> StoreResult<Box<dyn LifecycleTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLifecycleTransaction { tx }))
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_uuid(&self, user_uuid: Uuid) -> StoreResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE user_uuid = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(user_uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_inquiry_by_uuid(&self, inquiry_uuid: Uuid) -> StoreResult<Option<Inquiry>> {
        let query = format!("SELECT {INQUIRY_COLUMNS} FROM inquiries WHERE inquiry_uuid = $1");
        Ok(sqlx::query_as::<_, Inquiry>(&query)
            .bind(inquiry_uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_service_by_uuid(&self, service_uuid: Uuid) -> StoreResult<Option<Service>> {
        let query = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE service_uuid = $1");
        Ok(sqlx::query_as::<_, Service>(&query)
            .bind(service_uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_service_by_inquiry(&self, inquiry_id: i64) -> StoreResult<Option<Service>> {
        let query = format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE inquiry_id = $1 \
             ORDER BY service_id DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Service>(&query)
            .bind(inquiry_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_open_chat_room(&self, inquiry_id: i64) -> StoreResult<Option<ChatRoom>> {
        let query = format!(
            "SELECT {CHAT_ROOM_COLUMNS} FROM chat_rooms \
             WHERE inquiry_id = $1 AND deleted_at IS NULL \
             ORDER BY chat_room_id DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, ChatRoom>(&query)
            .bind(inquiry_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn select_expired_inquiries(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inquiry>> {
        let query = format!(
            "SELECT {INQUIRY_COLUMNS} FROM inquiries \
             WHERE inquiry_status = $1 AND expired_at <= $2 \
             ORDER BY inquiry_id"
        );
        Ok(sqlx::query_as::<_, Inquiry>(&query)
            .bind(InquiryState::Inquiring.as_str())
            .bind(now)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn select_unpaid_expired_services(
        &self,
        booked_before: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>> {
        self.select_service_parties(ServiceState::Unpaid, "s.booked_at", booked_before)
            .await
    }

    async fn select_unstarted_services(
        &self,
        started_before: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>> {
        self.select_service_parties(ServiceState::ToBeFulfilled, "s.start_time", started_before)
            .await
    }

    async fn select_finished_services(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ServiceParties>> {
        self.select_service_parties(ServiceState::Fulfilling, "s.end_time", now)
            .await
    }

    async fn select_unmirrored_inquiries(&self, status: InquiryState) -> StoreResult<Vec<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT inquiry_uuid FROM inquiries \
             WHERE inquiry_status = $1 AND projected_status IS DISTINCT FROM inquiry_status \
             ORDER BY inquiry_id",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn select_unmirrored_services(&self, status: ServiceState) -> StoreResult<Vec<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT service_uuid FROM services \
             WHERE service_status = $1 AND projected_status IS DISTINCT FROM service_status \
             ORDER BY service_id",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_projected(
        &self,
        entity_uuids: &[Uuid],
        status: ProjectedStatus,
    ) -> StoreResult<()> {
        if entity_uuids.is_empty() {
            return Ok(());
        }
        let query = match status {
            ProjectedStatus::Inquiry(_) => {
                "UPDATE inquiries SET projected_status = $2 WHERE inquiry_uuid = ANY($1)"
            }
            ProjectedStatus::Service(_) => {
                "UPDATE services SET projected_status = $2 WHERE service_uuid = ANY($1)"
            }
        };
        sqlx::query(query)
            .bind(entity_uuids)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// One open PostgreSQL transaction
pub struct PgLifecycleTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LifecycleTransaction for PgLifecycleTransaction {
    async fn has_active_inquiry(&mut self, inquirer_id: i64) -> StoreResult<bool> {
        let active: Vec<&str> = ACTIVE_INQUIRY_STATES.iter().map(|s| s.as_str()).collect();
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                 SELECT 1 FROM inquiries \
                 WHERE inquirer_id = $1 AND inquiry_status = ANY($2) \
                 FOR UPDATE \
             )",
        )
        .bind(inquirer_id)
        .bind(&active)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_inquiry(
        &mut self,
        inquirer_id: i64,
        new_inquiry: &NewInquiry,
        created_at: DateTime<Utc>,
        expired_at: DateTime<Utc>,
    ) -> StoreResult<Inquiry> {
        let query = format!(
            "INSERT INTO inquiries ( \
                 inquiry_uuid, inquirer_id, budget, service_type, appointment_time, \
                 duration_minutes, address, inquiry_status, created_at, updated_at, expired_at \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10) \
             RETURNING {INQUIRY_COLUMNS}"
        );
        sqlx::query_as::<_, Inquiry>(&query)
            .bind(Uuid::new_v4())
            .bind(inquirer_id)
            .bind(new_inquiry.budget)
            .bind(&new_inquiry.service_type)
            .bind(new_inquiry.appointment_time)
            .bind(new_inquiry.duration_minutes)
            .bind(&new_inquiry.address)
            .bind(InquiryState::Inquiring.as_str())
            .bind(created_at)
            .bind(expired_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn update_inquiry_status(
        &mut self,
        inquiry_id: i64,
        from: InquiryState,
        to: InquiryState,
        picker: PickerChange,
        expired_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Inquiry> {
        let (change_picker, picker_id) = match picker {
            PickerChange::Keep => (false, None),
            PickerChange::Set(id) => (true, Some(id)),
            PickerChange::Clear => (true, None),
        };

        let query = format!(
            "UPDATE inquiries \
             SET inquiry_status = $3, \
                 picker_id = CASE WHEN $4 THEN $5 ELSE picker_id END, \
                 expired_at = COALESCE($6, expired_at), \
                 updated_at = NOW() \
             WHERE inquiry_id = $1 AND inquiry_status = $2 \
             RETURNING {INQUIRY_COLUMNS}"
        );
        sqlx::query_as::<_, Inquiry>(&query)
            .bind(inquiry_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(change_picker)
            .bind(picker_id)
            .bind(expired_at)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)?
            .ok_or_else(|| StoreError::concurrent("inquiry", inquiry_id))
    }

    async fn bulk_transition_inquiries(
        &mut self,
        inquiry_ids: &[i64],
        from: InquiryState,
        to: InquiryState,
    ) -> StoreResult<Vec<Uuid>> {
        if inquiry_ids.is_empty() {
            return Ok(Vec::new());
        }
        let moved = sqlx::query_scalar::<_, Uuid>(
            "UPDATE inquiries \
             SET inquiry_status = $3, updated_at = NOW() \
             WHERE inquiry_id = ANY($1) AND inquiry_status = $2 \
             RETURNING inquiry_uuid",
        )
        .bind(inquiry_ids)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(moved)
    }

    async fn insert_chat_room(
        &mut self,
        inquiry_id: i64,
        channel_uuid: Uuid,
        member_ids: &[i64],
    ) -> StoreResult<ChatRoom> {
        let query = format!(
            "INSERT INTO chat_rooms (channel_uuid, inquiry_id) VALUES ($1, $2) \
             RETURNING {CHAT_ROOM_COLUMNS}"
        );
        let room = sqlx::query_as::<_, ChatRoom>(&query)
            .bind(channel_uuid)
            .bind(inquiry_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)?;

        sqlx::query(
            "INSERT INTO chat_room_members (chat_room_id, user_id) \
             SELECT $1, member FROM UNNEST($2::BIGINT[]) AS member",
        )
        .bind(room.chat_room_id)
        .bind(member_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(room)
    }

    async fn close_chat_room(&mut self, inquiry_id: i64) -> StoreResult<Option<ChatRoom>> {
        let query = format!(
            "UPDATE chat_rooms SET deleted_at = NOW() \
             WHERE inquiry_id = $1 AND deleted_at IS NULL \
             RETURNING {CHAT_ROOM_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, ChatRoom>(&query)
            .bind(inquiry_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_service(&mut self, new_service: &NewService) -> StoreResult<Service> {
        let query = format!(
            "INSERT INTO services ( \
                 service_uuid, customer_id, provider_id, inquiry_id, \
                 duration_minutes, appointment_time, service_status \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {SERVICE_COLUMNS}"
        );
        sqlx::query_as::<_, Service>(&query)
            .bind(Uuid::new_v4())
            .bind(new_service.customer_id)
            .bind(new_service.provider_id)
            .bind(new_service.inquiry_id)
            .bind(new_service.duration_minutes)
            .bind(new_service.appointment_time)
            .bind(new_service.service_status.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn update_service_status(
        &mut self,
        service_id: i64,
        from: ServiceState,
        to: ServiceState,
        changes: &ServiceChanges,
    ) -> StoreResult<Service> {
        let query = format!(
            "UPDATE services \
             SET service_status = $3, \
                 price = COALESCE($4, price), \
                 appointment_time = COALESCE($5, appointment_time), \
                 duration_minutes = COALESCE($6, duration_minutes), \
                 start_time = COALESCE($7, start_time), \
                 end_time = COALESCE($8, end_time), \
                 cancel_cause = COALESCE($9, cancel_cause), \
                 booked_at = COALESCE($10, booked_at), \
                 updated_at = NOW() \
             WHERE service_id = $1 AND service_status = $2 \
             RETURNING {SERVICE_COLUMNS}"
        );
        sqlx::query_as::<_, Service>(&query)
            .bind(service_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(changes.price)
            .bind(changes.appointment_time)
            .bind(changes.duration_minutes)
            .bind(changes.start_time)
            .bind(changes.end_time)
            .bind(changes.cancel_cause.map(|cause| cause.as_str()))
            .bind(changes.booked_at)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)?
            .ok_or_else(|| StoreError::concurrent("service", service_id))
    }

    async fn bulk_transition_services(
        &mut self,
        service_ids: &[i64],
        from: ServiceState,
        to: ServiceState,
        cancel_cause: Option<CancelCause>,
    ) -> StoreResult<Vec<Uuid>> {
        if service_ids.is_empty() {
            return Ok(Vec::new());
        }
        let moved = sqlx::query_scalar::<_, Uuid>(
            "UPDATE services \
             SET service_status = $3, \
                 cancel_cause = COALESCE($4, cancel_cause), \
                 updated_at = NOW() \
             WHERE service_id = ANY($1) AND service_status = $2 \
             RETURNING service_uuid",
        )
        .bind(service_ids)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(cancel_cause.map(|cause| cause.as_str()))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(moved)
    }

    async fn debit_balance(&mut self, user_id: i64, amount: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET balance = balance - $2 WHERE user_id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn credit_balance(&mut self, user_id: i64, amount: i64) -> StoreResult<i64> {
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET balance = balance + $2 WHERE user_id = $1 RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::InvalidRow(format!("user {user_id} does not exist")))?;
        Ok(balance)
    }

    async fn insert_payment(
        &mut self,
        payer_id: i64,
        service_id: i64,
        amount: i64,
    ) -> StoreResult<Payment> {
        let query = format!(
            "INSERT INTO payments (payer_id, service_id, amount) VALUES ($1, $2, $3) \
             RETURNING {PAYMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(payer_id)
            .bind(service_id)
            .bind(amount)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn find_payment_for_update(&mut self, service_id: i64) -> StoreResult<Option<Payment>> {
        let query =
            format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE service_id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, Payment>(&query)
            .bind(service_id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn mark_payment_refunded(
        &mut self,
        payment_id: i64,
        refunded_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET refunded_at = $2 WHERE payment_id = $1 AND refunded_at IS NULL",
        )
        .bind(payment_id)
        .bind(refunded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
