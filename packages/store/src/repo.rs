//! # CareStore: the persistence seam of the care coordination service
//!
//! Every handler in the `api` crate talks to storage through the [`CareStore`] trait,
//! so the same route logic runs against PostgreSQL in production (`api::db::PgStore`)
//! and against [`crate::MemoryStore`] in tests and local demos.
//!
//! ## Conventions
//!
//! - Lookups return `Ok(None)` for a missing row; only backend failures are errors.
//! - Updates take a `*Changes` struct where `None` leaves a column untouched and return
//!   `Ok(None)` when the row does not exist.
//! - Deletes return whether a row was removed.
//! - Inserting a user whose email is taken fails with [`StoreError::Conflict`].
//! - Inserting a notification that points at a missing resident, visit or report
//!   fails with [`StoreError::Missing`].
//! - Both implementations apply the same referential rules when residents, users,
//!   reports, visits and facilities are deleted.
//!
//! ## Ordering
//!
//! | Method | Order |
//! |--------|-------|
//! | [`reports_of_resident`](CareStore::reports_of_resident) | newest report `date` first |
//! | [`messages_of_resident_for`](CareStore::messages_of_resident_for) | oldest message first |
//! | [`visits_of_resident`](CareStore::visits_of_resident) | earliest `visit_date` first |
//! | [`notifications_of_user`](CareStore::notifications_of_user) | newest first |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

/// Errors a [`CareStore`] can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// The write names a row that does not exist.
    #[error("{0}")]
    Missing(String),

    #[error("store backend failed: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CareStore: Send + Sync {
    // Users
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// All users, or only those with `role`, oldest account first.
    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
    async fn count_users(&self) -> StoreResult<i64>;

    // Residents and their families
    async fn insert_resident(&self, resident: NewResident) -> StoreResult<Resident>;
    async fn resident_by_id(&self, id: Uuid) -> StoreResult<Option<Resident>>;
    async fn list_residents(&self) -> StoreResult<Vec<Resident>>;
    async fn update_resident(
        &self,
        id: Uuid,
        changes: ResidentChanges,
    ) -> StoreResult<Option<Resident>>;
    async fn delete_resident(&self, id: Uuid) -> StoreResult<bool>;
    async fn residents_of_family(&self, user_id: Uuid) -> StoreResult<Vec<Resident>>;
    async fn family_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<User>>;
    async fn is_family_member(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    /// Idempotent.
    async fn link_family(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    async fn unlink_family(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    // Facility placement
    async fn insert_assignment(&self, assignment: NewAssignment) -> StoreResult<Assignment>;
    async fn assignments_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<Assignment>>;
    /// Residents whose placement at `facility_id` covers `at`.
    async fn residents_at_facility(
        &self,
        facility_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<Resident>>;

    // Facilities
    async fn list_facilities(&self) -> StoreResult<Vec<Facility>>;
    async fn facility_by_id(&self, id: Uuid) -> StoreResult<Option<Facility>>;
    async fn insert_facility(&self, facility: NewFacility) -> StoreResult<Facility>;
    async fn update_facility(
        &self,
        id: Uuid,
        changes: FacilityChanges,
    ) -> StoreResult<Option<Facility>>;

    // Daily reports
    async fn insert_report(&self, report: NewReport) -> StoreResult<DailyReport>;
    async fn reports_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<ReportDetail>>;
    async fn report_by_id(&self, id: Uuid) -> StoreResult<Option<ReportDetail>>;
    async fn update_report(
        &self,
        id: Uuid,
        changes: ReportChanges,
    ) -> StoreResult<Option<DailyReport>>;
    async fn delete_report(&self, id: Uuid) -> StoreResult<bool>;

    // Images
    /// Records every image or none of them.
    async fn insert_images(&self, images: Vec<NewImage>) -> StoreResult<Vec<Image>>;

    // Messages
    async fn insert_message(&self, message: NewMessage) -> StoreResult<MessageDetail>;
    /// Messages about `resident_id` that `user_id` sent or received.
    async fn messages_of_resident_for(
        &self,
        resident_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<MessageDetail>>;

    // Visits
    async fn insert_visit(&self, visit: NewVisit) -> StoreResult<VisitDetail>;
    async fn visit_by_id(&self, id: Uuid) -> StoreResult<Option<Visit>>;
    async fn visits_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<VisitDetail>>;
    async fn update_visit(&self, id: Uuid, changes: VisitChanges)
        -> StoreResult<Option<VisitDetail>>;
    async fn delete_visit(&self, id: Uuid) -> StoreResult<bool>;

    // Notifications
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification>;
    async fn notifications_of_user(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;
    /// Marks the notification read if it belongs to `user_id`.
    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Notification>>;
}
