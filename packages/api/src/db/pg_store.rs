use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use store::*;
use uuid::Uuid;

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(error))
}

/// Maps a unique violation on `users.email` to [`StoreError::Conflict`].
fn user_write_error(error: sqlx::Error, email: Option<&str>) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(format!(
            "email {} is already registered",
            email.unwrap_or_default()
        )),
        _ => backend(error),
    }
}

/// Maps a foreign key violation on `notifications` to [`StoreError::Missing`].
fn notification_write_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            let message = match db.constraint() {
                Some(c) if c.contains("resident") => "Resident not found",
                Some(c) if c.contains("visit") => "Visit not found",
                Some(c) if c.contains("report") => "Report not found",
                _ => "User not found",
            };
            StoreError::Missing(message.into())
        }
        _ => backend(error),
    }
}

/// [`CareStore`] over PostgreSQL. Referential rules live in the schema's foreign keys.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(backend)
    }

    async fn users_in(&self, ids: HashSet<Uuid>) -> StoreResult<HashMap<Uuid, User>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = ids.into_iter().collect();
        let users: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    async fn residents_in(&self, ids: HashSet<Uuid>) -> StoreResult<HashMap<Uuid, Resident>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = ids.into_iter().collect();
        let residents: Vec<Resident> = sqlx::query_as("SELECT * FROM residents WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(residents.into_iter().map(|r| (r.id, r)).collect())
    }

    async fn report_images(&self, report_ids: Vec<Uuid>) -> StoreResult<Vec<Image>> {
        sqlx::query_as("SELECT * FROM images WHERE report_id = ANY($1) ORDER BY created_at")
            .bind(report_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn message_images(&self, message_ids: Vec<Uuid>) -> StoreResult<Vec<Image>> {
        sqlx::query_as("SELECT * FROM images WHERE message_id = ANY($1) ORDER BY created_at")
            .bind(message_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn report_details(&self, reports: Vec<DailyReport>) -> StoreResult<Vec<ReportDetail>> {
        let staff = self
            .users_in(reports.iter().filter_map(|r| r.staff_id).collect())
            .await?;
        let images = self
            .report_images(reports.iter().map(|r| r.id).collect())
            .await?;
        Ok(reports
            .into_iter()
            .map(|report| ReportDetail {
                staff: report.staff_id.and_then(|id| staff.get(&id).cloned()),
                images: images
                    .iter()
                    .filter(|i| i.report_id == Some(report.id))
                    .cloned()
                    .collect(),
                report,
            })
            .collect())
    }

    async fn message_details(&self, messages: Vec<Message>) -> StoreResult<Vec<MessageDetail>> {
        let users = self
            .users_in(
                messages
                    .iter()
                    .flat_map(|m| [m.sender_id, m.recipient_id])
                    .collect(),
            )
            .await?;
        let images = self
            .message_images(messages.iter().map(|m| m.id).collect())
            .await?;
        Ok(messages
            .into_iter()
            .map(|message| MessageDetail {
                sender: users.get(&message.sender_id).cloned(),
                recipient: users.get(&message.recipient_id).cloned(),
                images: images
                    .iter()
                    .filter(|i| i.message_id == Some(message.id))
                    .cloned()
                    .collect(),
                message,
            })
            .collect())
    }

    async fn visit_details(&self, visits: Vec<Visit>) -> StoreResult<Vec<VisitDetail>> {
        let residents = self
            .residents_in(visits.iter().map(|v| v.resident_id).collect())
            .await?;
        let users = self
            .users_in(
                visits
                    .iter()
                    .flat_map(|v| std::iter::once(v.requested_by_id).chain(v.scheduled_by_id))
                    .collect(),
            )
            .await?;
        Ok(visits
            .into_iter()
            .map(|visit| VisitDetail {
                resident: residents.get(&visit.resident_id).cloned(),
                requested_by: users.get(&visit.requested_by_id).cloned(),
                scheduled_by: visit.scheduled_by_id.and_then(|id| users.get(&id).cloned()),
                visit,
            })
            .collect())
    }
}

#[async_trait]
impl CareStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as(
            "INSERT INTO users (id, name, email, password_hash, role, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| user_write_error(e, Some(&user.email)))
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        sqlx::query_as(
            "SELECT * FROM users WHERE $1::TEXT IS NULL OR role = $1 ORDER BY created_at",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        sqlx::query_as(
            "UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                created_by = COALESCE($6, created_by),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(changes.role)
        .bind(changes.created_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| user_write_error(e, changes.email.as_deref()))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)
    }

    async fn insert_resident(&self, resident: NewResident) -> StoreResult<Resident> {
        let mut tx = self.begin().await?;
        let record: Resident = sqlx::query_as(
            "INSERT INTO residents (id, name, photo, room, care_plan, medical_info, admitted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&resident.name)
        .bind(&resident.photo)
        .bind(&resident.room)
        .bind(&resident.care_plan)
        .bind(&resident.medical_info)
        .bind(resident.admitted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        if let Some(user_id) = resident.family {
            sqlx::query("INSERT INTO family_residents (resident_id, user_id) VALUES ($1, $2)")
                .bind(record.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(record)
    }

    async fn resident_by_id(&self, id: Uuid) -> StoreResult<Option<Resident>> {
        sqlx::query_as("SELECT * FROM residents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn list_residents(&self) -> StoreResult<Vec<Resident>> {
        sqlx::query_as("SELECT * FROM residents ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn update_resident(
        &self,
        id: Uuid,
        changes: ResidentChanges,
    ) -> StoreResult<Option<Resident>> {
        sqlx::query_as(
            "UPDATE residents SET
                name = COALESCE($2, name),
                photo = COALESCE($3, photo),
                room = COALESCE($4, room),
                care_plan = COALESCE($5, care_plan),
                medical_info = COALESCE($6, medical_info),
                discharged_at = COALESCE($7, discharged_at),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.photo)
        .bind(&changes.room)
        .bind(&changes.care_plan)
        .bind(&changes.medical_info)
        .bind(changes.discharged_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    async fn delete_resident(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM residents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn residents_of_family(&self, user_id: Uuid) -> StoreResult<Vec<Resident>> {
        sqlx::query_as(
            "SELECT r.* FROM residents r
             JOIN family_residents f ON f.resident_id = r.id
             WHERE f.user_id = $1
             ORDER BY r.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn family_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<User>> {
        sqlx::query_as(
            "SELECT u.* FROM users u
             JOIN family_residents f ON f.user_id = u.id
             WHERE f.resident_id = $1
             ORDER BY u.created_at",
        )
        .bind(resident_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn is_family_member(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM family_residents WHERE resident_id = $1 AND user_id = $2
             )",
        )
        .bind(resident_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)
    }

    async fn link_family(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO family_residents (resident_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(resident_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn unlink_family(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM family_residents WHERE resident_id = $1 AND user_id = $2")
                .bind(resident_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_assignment(&self, assignment: NewAssignment) -> StoreResult<Assignment> {
        sqlx::query_as(
            "INSERT INTO resident_facility_assignments (id, resident_id, facility_id, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(assignment.resident_id)
        .bind(assignment.facility_id)
        .bind(assignment.start_date)
        .bind(assignment.end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)
    }

    async fn assignments_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<Assignment>> {
        sqlx::query_as(
            "SELECT * FROM resident_facility_assignments
             WHERE resident_id = $1
             ORDER BY start_date DESC",
        )
        .bind(resident_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn residents_at_facility(
        &self,
        facility_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<Resident>> {
        sqlx::query_as(
            "SELECT r.* FROM residents r
             JOIN resident_facility_assignments a ON a.resident_id = r.id
             WHERE a.facility_id = $1
               AND a.start_date <= $2
               AND (a.end_date IS NULL OR a.end_date >= $2)",
        )
        .bind(facility_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn list_facilities(&self) -> StoreResult<Vec<Facility>> {
        sqlx::query_as("SELECT * FROM facilities ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn facility_by_id(&self, id: Uuid) -> StoreResult<Option<Facility>> {
        sqlx::query_as("SELECT * FROM facilities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn insert_facility(&self, facility: NewFacility) -> StoreResult<Facility> {
        sqlx::query_as(
            "INSERT INTO facilities (id, name, address, contact_person, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&facility.name)
        .bind(&facility.address)
        .bind(&facility.contact_person)
        .bind(facility.status)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)
    }

    async fn update_facility(
        &self,
        id: Uuid,
        changes: FacilityChanges,
    ) -> StoreResult<Option<Facility>> {
        sqlx::query_as(
            "UPDATE facilities SET
                name = COALESCE($2, name),
                address = COALESCE($3, address),
                contact_person = COALESCE($4, contact_person),
                status = COALESCE($5, status),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.address)
        .bind(&changes.contact_person)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    async fn insert_report(&self, report: NewReport) -> StoreResult<DailyReport> {
        let mut tx = self.begin().await?;
        let record: DailyReport = sqlx::query_as(
            "INSERT INTO daily_reports (id, resident_id, staff_id, date, vitals, mood, meals, activities, notes)
             VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(report.resident_id)
        .bind(report.staff_id)
        .bind(&report.vitals)
        .bind(&report.mood)
        .bind(&report.meals)
        .bind(&report.activities)
        .bind(&report.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        if !report.images.is_empty() {
            sqlx::query("UPDATE images SET report_id = $1 WHERE id = ANY($2)")
                .bind(record.id)
                .bind(&report.images)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(record)
    }

    async fn reports_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<ReportDetail>> {
        let reports: Vec<DailyReport> = sqlx::query_as(
            "SELECT * FROM daily_reports WHERE resident_id = $1 ORDER BY date DESC",
        )
        .bind(resident_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.report_details(reports).await
    }

    async fn report_by_id(&self, id: Uuid) -> StoreResult<Option<ReportDetail>> {
        let report: Option<DailyReport> = sqlx::query_as("SELECT * FROM daily_reports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match report {
            Some(report) => Ok(self.report_details(vec![report]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_report(
        &self,
        id: Uuid,
        changes: ReportChanges,
    ) -> StoreResult<Option<DailyReport>> {
        let mut tx = self.begin().await?;
        let record: Option<DailyReport> = sqlx::query_as(
            "UPDATE daily_reports SET
                vitals = COALESCE($2, vitals),
                mood = COALESCE($3, mood),
                meals = COALESCE($4, meals),
                activities = COALESCE($5, activities),
                notes = COALESCE($6, notes),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&changes.vitals)
        .bind(&changes.mood)
        .bind(&changes.meals)
        .bind(&changes.activities)
        .bind(&changes.notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(record) = record else {
            return Ok(None);
        };
        if let Some(images) = &changes.images {
            sqlx::query("UPDATE images SET report_id = NULL WHERE report_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            sqlx::query("UPDATE images SET report_id = $1 WHERE id = ANY($2)")
                .bind(id)
                .bind(images)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(Some(record))
    }

    async fn delete_report(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM daily_reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_images(&self, images: Vec<NewImage>) -> StoreResult<Vec<Image>> {
        let mut tx = self.begin().await?;
        let mut records = Vec::with_capacity(images.len());
        for image in images {
            let record: Image = sqlx::query_as(
                "INSERT INTO images (id, url, tag, uploaded_by_id, resident_id)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(&image.url)
            .bind(&image.tag)
            .bind(image.uploaded_by_id)
            .bind(image.resident_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
            records.push(record);
        }
        tx.commit().await.map_err(backend)?;
        Ok(records)
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<MessageDetail> {
        let mut tx = self.begin().await?;
        let record: Message = sqlx::query_as(
            "INSERT INTO messages (id, resident_id, sender_id, recipient_id, content)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(message.resident_id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        if !message.images.is_empty() {
            sqlx::query("UPDATE images SET message_id = $1 WHERE id = ANY($2)")
                .bind(record.id)
                .bind(&message.images)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        let mut details = self.message_details(vec![record]).await?;
        details
            .pop()
            .ok_or_else(|| backend(sqlx::Error::RowNotFound))
    }

    async fn messages_of_resident_for(
        &self,
        resident_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<MessageDetail>> {
        let messages: Vec<Message> = sqlx::query_as(
            "SELECT * FROM messages
             WHERE resident_id = $1 AND (sender_id = $2 OR recipient_id = $2)
             ORDER BY created_at",
        )
        .bind(resident_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.message_details(messages).await
    }

    async fn insert_visit(&self, visit: NewVisit) -> StoreResult<VisitDetail> {
        let record: Visit = sqlx::query_as(
            "INSERT INTO visits (id, resident_id, requested_by_id, visit_date, status, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(visit.resident_id)
        .bind(visit.requested_by_id)
        .bind(visit.visit_date)
        .bind(VisitStatus::Requested)
        .bind(&visit.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        let mut details = self.visit_details(vec![record]).await?;
        details
            .pop()
            .ok_or_else(|| backend(sqlx::Error::RowNotFound))
    }

    async fn visit_by_id(&self, id: Uuid) -> StoreResult<Option<Visit>> {
        sqlx::query_as("SELECT * FROM visits WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn visits_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<VisitDetail>> {
        let visits: Vec<Visit> =
            sqlx::query_as("SELECT * FROM visits WHERE resident_id = $1 ORDER BY visit_date")
                .bind(resident_id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        self.visit_details(visits).await
    }

    async fn update_visit(
        &self,
        id: Uuid,
        changes: VisitChanges,
    ) -> StoreResult<Option<VisitDetail>> {
        let record: Option<Visit> = sqlx::query_as(
            "UPDATE visits SET
                status = COALESCE($2, status),
                visit_date = COALESCE($3, visit_date),
                notes = COALESCE($4, notes),
                scheduled_by_id = COALESCE($5, scheduled_by_id),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(changes.status)
        .bind(changes.visit_date)
        .bind(&changes.notes)
        .bind(changes.scheduled_by_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match record {
            Some(visit) => Ok(self.visit_details(vec![visit]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_visit(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM visits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        sqlx::query_as(
            "INSERT INTO notifications (id, user_id, kind, message, resident_id, visit_id, report_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.message)
        .bind(notification.resident_id)
        .bind(notification.visit_id)
        .bind(notification.report_id)
        .fetch_one(&self.pool)
        .await
        .map_err(notification_write_error)
    }

    async fn notifications_of_user(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Notification>> {
        sqlx::query_as(
            "UPDATE notifications SET read = TRUE
             WHERE id = $1 AND user_id = $2
             RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }
}
