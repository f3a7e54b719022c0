//! # Domain models for residents, their families and the care team
//!
//! Every record the care coordination service persists is defined here, together with
//! the "insert" and "changes" shapes the [`crate::CareStore`] accepts. All types are
//! `Serialize` with camelCase field names so handlers can return them unchanged.
//!
//! ## Records
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`User`] | An account. The password hash is never serialized. |
//! | [`Resident`] | A person in care; the hub every other record points at. |
//! | [`Facility`] | A care home. Residents are placed in one through an [`Assignment`]. |
//! | [`Assignment`] | A dated placement of a resident in a facility. |
//! | [`DailyReport`] | A staff-authored note about a resident's day. |
//! | [`Image`] | An uploaded picture, optionally attached to a report or message. |
//! | [`Message`] | A note between two users about one resident. |
//! | [`Visit`] | A requested or scheduled in-person visit. |
//! | [`Notification`] | A polled inbox entry for one user. |
//!
//! The `*Detail` structs flatten a record together with the related rows a handler
//! needs to render it (report author and pictures, message parties, visit people).
//!
//! ## Enumerations
//!
//! [`Role`], [`VisitStatus`] and [`FacilityStatus`] round-trip through their wire
//! strings via [`FromStr`] / [`Role::as_str`]; the same strings are stored in the
//! database `TEXT` columns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a wire string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Account role. Determines which routes a token may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Family,
    FacilityStaff,
    SystemAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Family, Role::FacilityStaff, Role::SystemAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Family => "family",
            Role::FacilityStaff => "facility_staff",
            Role::SystemAdmin => "system_admin",
        }
    }

    /// Staff and administrators see every resident.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::FacilityStaff | Role::SystemAdmin)
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a visit is in its lifecycle.
///
/// `REQUESTED` moves to `SCHEDULED` or `DECLINED`; a scheduled visit ends up
/// `COMPLETED` or `CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    Requested,
    Scheduled,
    Declined,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 5] = [
        VisitStatus::Requested,
        VisitStatus::Scheduled,
        VisitStatus::Declined,
        VisitStatus::Completed,
        VisitStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Requested => "REQUESTED",
            VisitStatus::Scheduled => "SCHEDULED",
            VisitStatus::Declined => "DECLINED",
            VisitStatus::Completed => "COMPLETED",
            VisitStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for VisitStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisitStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "visit status",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilityStatus {
    #[default]
    Active,
    Inactive,
}

impl FacilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityStatus::Active => "ACTIVE",
            FacilityStatus::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for FacilityStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(FacilityStatus::Active),
            "INACTIVE" => Ok(FacilityStatus::Inactive),
            _ => Err(ParseEnumError {
                kind: "facility status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FacilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    /// The staff member or administrator who opened this account, if any.
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// Name and role only; what the feed and calendar show about people.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_by: Option<Uuid>,
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
    pub room: Option<String>,
    pub care_plan: Option<String>,
    pub medical_info: Option<String>,
    pub admitted_at: Option<DateTime<Utc>>,
    pub discharged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewResident {
    pub name: String,
    pub photo: Option<String>,
    pub room: Option<String>,
    pub care_plan: Option<String>,
    pub medical_info: Option<String>,
    pub admitted_at: Option<DateTime<Utc>>,
    /// Family user to link in the same operation.
    pub family: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ResidentChanges {
    pub name: Option<String>,
    pub photo: Option<String>,
    pub room: Option<String>,
    pub care_plan: Option<String>,
    pub medical_info: Option<String>,
    pub discharged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub status: FacilityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewFacility {
    pub name: String,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub status: FacilityStatus,
}

#[derive(Debug, Clone, Default)]
pub struct FacilityChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub status: Option<FacilityStatus>,
}

/// Placement of a resident in a facility. An open `end_date` means "until further notice".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub facility_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// Whether the placement covers the instant `at`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && self.end_date.map_or(true, |end| end >= at)
    }
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub resident_id: Uuid,
    pub facility_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    /// Free-form vitals as sent by the client (blood pressure, pulse, ...).
    pub vitals: Option<serde_json::Value>,
    pub mood: Option<String>,
    pub meals: Option<String>,
    pub activities: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: DailyReport,
    pub staff: Option<User>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default)]
pub struct NewReport {
    pub resident_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub vitals: Option<serde_json::Value>,
    pub mood: Option<String>,
    pub meals: Option<String>,
    pub activities: Option<String>,
    pub notes: Option<String>,
    pub images: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportChanges {
    pub vitals: Option<serde_json::Value>,
    pub mood: Option<String>,
    pub meals: Option<String>,
    pub activities: Option<String>,
    pub notes: Option<String>,
    /// Replaces the attached set when present.
    pub images: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: Uuid,
    pub url: String,
    pub tag: Option<String>,
    pub date: DateTime<Utc>,
    pub uploaded_by_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub report_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub url: String,
    pub tag: Option<String>,
    pub uploaded_by_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<User>,
    pub recipient: Option<User>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub resident_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub images: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub requested_by_id: Uuid,
    pub scheduled_by_id: Option<Uuid>,
    pub visit_date: DateTime<Utc>,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitDetail {
    #[serde(flatten)]
    pub visit: Visit,
    pub resident: Option<Resident>,
    pub requested_by: Option<User>,
    pub scheduled_by: Option<User>,
}

#[derive(Debug, Clone)]
pub struct NewVisit {
    pub resident_id: Uuid,
    pub requested_by_id: Uuid,
    pub visit_date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VisitChanges {
    pub status: Option<VisitStatus>,
    pub visit_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub scheduled_by_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub resident_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub report_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: String,
    pub message: String,
    pub resident_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub report_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_wire_strings() {
        assert_eq!("facility_staff".parse::<Role>(), Ok(Role::FacilityStaff));
        assert_eq!(Role::SystemAdmin.to_string(), "system_admin");
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(
            serde_json::to_value(Role::Family).unwrap(),
            serde_json::json!("family")
        );
    }

    #[test]
    fn test_visit_status_parsing() {
        assert_eq!("CANCELLED".parse::<VisitStatus>(), Ok(VisitStatus::Cancelled));
        let err = "cancelled".parse::<VisitStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown visit status: cancelled");
    }

    #[test]
    fn test_user_never_serializes_password_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Family,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["createdBy"], serde_json::Value::Null);
    }

    #[test]
    fn test_notification_kind_serializes_as_type() {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: "MESSAGE".into(),
            message: "New message".into(),
            resident_id: None,
            visit_id: None,
            report_id: None,
            read: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "MESSAGE");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_assignment_window() {
        let now = Utc::now();
        let mut assignment = Assignment {
            id: Uuid::new_v4(),
            resident_id: Uuid::new_v4(),
            facility_id: Uuid::new_v4(),
            start_date: now - Duration::days(3),
            end_date: None,
            created_at: now,
        };
        assert!(assignment.is_active_at(now));

        assignment.end_date = Some(now - Duration::days(1));
        assert!(!assignment.is_active_at(now));

        assignment.start_date = now + Duration::days(1);
        assignment.end_date = None;
        assert!(!assignment.is_active_at(now));
    }
}
