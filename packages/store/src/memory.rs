use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::*;
use crate::repo::{CareStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    residents: Vec<Resident>,
    /// (resident_id, user_id)
    family: HashSet<(Uuid, Uuid)>,
    assignments: Vec<Assignment>,
    facilities: Vec<Facility>,
    reports: Vec<DailyReport>,
    images: Vec<Image>,
    messages: Vec<Message>,
    visits: Vec<Visit>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn user(&self, id: Option<Uuid>) -> Option<User> {
        let id = id?;
        self.users.iter().find(|u| u.id == id).cloned()
    }

    fn images_where(&self, matches: impl Fn(&Image) -> bool) -> Vec<Image> {
        self.images.iter().filter(|i| matches(i)).cloned().collect()
    }

    fn report_detail(&self, report: &DailyReport) -> ReportDetail {
        ReportDetail {
            report: report.clone(),
            staff: self.user(report.staff_id),
            images: self.images_where(|i| i.report_id == Some(report.id)),
        }
    }

    fn message_detail(&self, message: &Message) -> MessageDetail {
        MessageDetail {
            message: message.clone(),
            sender: self.user(Some(message.sender_id)),
            recipient: self.user(Some(message.recipient_id)),
            images: self.images_where(|i| i.message_id == Some(message.id)),
        }
    }

    fn visit_detail(&self, visit: &Visit) -> VisitDetail {
        VisitDetail {
            visit: visit.clone(),
            resident: self
                .residents
                .iter()
                .find(|r| r.id == visit.resident_id)
                .cloned(),
            requested_by: self.user(Some(visit.requested_by_id)),
            scheduled_by: self.user(visit.scheduled_by_id),
        }
    }

    fn attach_images(&mut self, ids: &[Uuid], attach: impl Fn(&mut Image)) {
        for image in self.images.iter_mut().filter(|i| ids.contains(&i.id)) {
            attach(image);
        }
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// In-memory [`CareStore`] for tests and local demos.
///
/// Applies the same cascade rules as the PostgreSQL schema.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[async_trait]
impl CareStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables();
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_by: user.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables().user(Some(id)))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> StoreResult<Vec<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .filter(|u| role.map_or(true, |role| u.role == role))
            .cloned()
            .collect())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut tables = self.tables();
        if let Some(email) = &changes.email {
            if tables.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict(format!(
                    "email {email} is already registered"
                )));
            }
        }
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        set(&mut user.name, changes.name);
        set(&mut user.email, changes.email);
        set(&mut user.password_hash, changes.password_hash);
        set(&mut user.role, changes.role);
        set_opt(&mut user.created_by, changes.created_by);
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.family.retain(|(_, user_id)| *user_id != id);
        tables
            .messages
            .retain(|m| m.sender_id != id && m.recipient_id != id);
        tables.visits.retain(|v| v.requested_by_id != id);
        tables.notifications.retain(|n| n.user_id != id);
        for user in tables.users.iter_mut().filter(|u| u.created_by == Some(id)) {
            user.created_by = None;
        }
        for report in tables.reports.iter_mut().filter(|r| r.staff_id == Some(id)) {
            report.staff_id = None;
        }
        for visit in tables
            .visits
            .iter_mut()
            .filter(|v| v.scheduled_by_id == Some(id))
        {
            visit.scheduled_by_id = None;
        }
        let live_visits: HashSet<Uuid> = tables.visits.iter().map(|v| v.id).collect();
        for notification in tables.notifications.iter_mut() {
            if notification.visit_id.is_some_and(|v| !live_visits.contains(&v)) {
                notification.visit_id = None;
            }
        }
        let live_messages: HashSet<Uuid> = tables.messages.iter().map(|m| m.id).collect();
        for image in tables.images.iter_mut() {
            if image.uploaded_by_id == Some(id) {
                image.uploaded_by_id = None;
            }
            if image.message_id.is_some_and(|m| !live_messages.contains(&m)) {
                image.message_id = None;
            }
        }
        Ok(true)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.tables().users.len() as i64)
    }

    async fn insert_resident(&self, resident: NewResident) -> StoreResult<Resident> {
        let mut tables = self.tables();
        let now = Utc::now();
        let record = Resident {
            id: Uuid::new_v4(),
            name: resident.name,
            photo: resident.photo,
            room: resident.room,
            care_plan: resident.care_plan,
            medical_info: resident.medical_info,
            admitted_at: resident.admitted_at,
            discharged_at: None,
            created_at: now,
            updated_at: now,
        };
        if let Some(user_id) = resident.family {
            tables.family.insert((record.id, user_id));
        }
        tables.residents.push(record.clone());
        Ok(record)
    }

    async fn resident_by_id(&self, id: Uuid) -> StoreResult<Option<Resident>> {
        Ok(self.tables().residents.iter().find(|r| r.id == id).cloned())
    }

    async fn list_residents(&self) -> StoreResult<Vec<Resident>> {
        Ok(self.tables().residents.clone())
    }

    async fn update_resident(
        &self,
        id: Uuid,
        changes: ResidentChanges,
    ) -> StoreResult<Option<Resident>> {
        let mut tables = self.tables();
        let Some(resident) = tables.residents.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        set(&mut resident.name, changes.name);
        set_opt(&mut resident.photo, changes.photo);
        set_opt(&mut resident.room, changes.room);
        set_opt(&mut resident.care_plan, changes.care_plan);
        set_opt(&mut resident.medical_info, changes.medical_info);
        set_opt(&mut resident.discharged_at, changes.discharged_at);
        resident.updated_at = Utc::now();
        Ok(Some(resident.clone()))
    }

    async fn delete_resident(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables();
        let before = tables.residents.len();
        tables.residents.retain(|r| r.id != id);
        if tables.residents.len() == before {
            return Ok(false);
        }
        tables.family.retain(|(resident_id, _)| *resident_id != id);
        tables.assignments.retain(|a| a.resident_id != id);
        tables.reports.retain(|r| r.resident_id != id);
        tables.messages.retain(|m| m.resident_id != id);
        tables.visits.retain(|v| v.resident_id != id);
        tables.images.retain(|i| i.resident_id != Some(id));

        let reports: HashSet<Uuid> = tables.reports.iter().map(|r| r.id).collect();
        let messages: HashSet<Uuid> = tables.messages.iter().map(|m| m.id).collect();
        let visits: HashSet<Uuid> = tables.visits.iter().map(|v| v.id).collect();
        for image in tables.images.iter_mut() {
            if image.report_id.is_some_and(|r| !reports.contains(&r)) {
                image.report_id = None;
            }
            if image.message_id.is_some_and(|m| !messages.contains(&m)) {
                image.message_id = None;
            }
        }
        for notification in tables.notifications.iter_mut() {
            if notification.resident_id == Some(id) {
                notification.resident_id = None;
            }
            if notification.report_id.is_some_and(|r| !reports.contains(&r)) {
                notification.report_id = None;
            }
            if notification.visit_id.is_some_and(|v| !visits.contains(&v)) {
                notification.visit_id = None;
            }
        }
        Ok(true)
    }

    async fn residents_of_family(&self, user_id: Uuid) -> StoreResult<Vec<Resident>> {
        let tables = self.tables();
        Ok(tables
            .residents
            .iter()
            .filter(|r| tables.family.contains(&(r.id, user_id)))
            .cloned()
            .collect())
    }

    async fn family_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables();
        Ok(tables
            .users
            .iter()
            .filter(|u| tables.family.contains(&(resident_id, u.id)))
            .cloned()
            .collect())
    }

    async fn is_family_member(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.tables().family.contains(&(resident_id, user_id)))
    }

    async fn link_family(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.tables().family.insert((resident_id, user_id));
        Ok(())
    }

    async fn unlink_family(&self, resident_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.tables().family.remove(&(resident_id, user_id)))
    }

    async fn insert_assignment(&self, assignment: NewAssignment) -> StoreResult<Assignment> {
        let record = Assignment {
            id: Uuid::new_v4(),
            resident_id: assignment.resident_id,
            facility_id: assignment.facility_id,
            start_date: assignment.start_date,
            end_date: assignment.end_date,
            created_at: Utc::now(),
        };
        self.tables().assignments.push(record.clone());
        Ok(record)
    }

    async fn assignments_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<Assignment>> {
        let mut assignments: Vec<Assignment> = self
            .tables()
            .assignments
            .iter()
            .filter(|a| a.resident_id == resident_id)
            .cloned()
            .collect();
        assignments.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(assignments)
    }

    async fn residents_at_facility(
        &self,
        facility_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<Resident>> {
        let tables = self.tables();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.facility_id == facility_id && a.is_active_at(at))
            .filter_map(|a| tables.residents.iter().find(|r| r.id == a.resident_id))
            .cloned()
            .collect())
    }

    async fn list_facilities(&self) -> StoreResult<Vec<Facility>> {
        Ok(self.tables().facilities.clone())
    }

    async fn facility_by_id(&self, id: Uuid) -> StoreResult<Option<Facility>> {
        Ok(self.tables().facilities.iter().find(|f| f.id == id).cloned())
    }

    async fn insert_facility(&self, facility: NewFacility) -> StoreResult<Facility> {
        let now = Utc::now();
        let record = Facility {
            id: Uuid::new_v4(),
            name: facility.name,
            address: facility.address,
            contact_person: facility.contact_person,
            status: facility.status,
            created_at: now,
            updated_at: now,
        };
        self.tables().facilities.push(record.clone());
        Ok(record)
    }

    async fn update_facility(
        &self,
        id: Uuid,
        changes: FacilityChanges,
    ) -> StoreResult<Option<Facility>> {
        let mut tables = self.tables();
        let Some(facility) = tables.facilities.iter_mut().find(|f| f.id == id) else {
            return Ok(None);
        };
        set(&mut facility.name, changes.name);
        set_opt(&mut facility.address, changes.address);
        set_opt(&mut facility.contact_person, changes.contact_person);
        set(&mut facility.status, changes.status);
        facility.updated_at = Utc::now();
        Ok(Some(facility.clone()))
    }

    async fn insert_report(&self, report: NewReport) -> StoreResult<DailyReport> {
        let mut tables = self.tables();
        let now = Utc::now();
        let record = DailyReport {
            id: Uuid::new_v4(),
            resident_id: report.resident_id,
            staff_id: report.staff_id,
            date: now,
            vitals: report.vitals,
            mood: report.mood,
            meals: report.meals,
            activities: report.activities,
            notes: report.notes,
            created_at: now,
            updated_at: now,
        };
        tables.attach_images(&report.images, |i| i.report_id = Some(record.id));
        tables.reports.push(record.clone());
        Ok(record)
    }

    async fn reports_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<ReportDetail>> {
        let tables = self.tables();
        let mut reports: Vec<&DailyReport> = tables
            .reports
            .iter()
            .filter(|r| r.resident_id == resident_id)
            .collect();
        reports.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(reports.into_iter().map(|r| tables.report_detail(r)).collect())
    }

    async fn report_by_id(&self, id: Uuid) -> StoreResult<Option<ReportDetail>> {
        let tables = self.tables();
        Ok(tables
            .reports
            .iter()
            .find(|r| r.id == id)
            .map(|r| tables.report_detail(r)))
    }

    async fn update_report(
        &self,
        id: Uuid,
        changes: ReportChanges,
    ) -> StoreResult<Option<DailyReport>> {
        let mut tables = self.tables();
        let Some(report) = tables.reports.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        set_opt(&mut report.vitals, changes.vitals);
        set_opt(&mut report.mood, changes.mood);
        set_opt(&mut report.meals, changes.meals);
        set_opt(&mut report.activities, changes.activities);
        set_opt(&mut report.notes, changes.notes);
        report.updated_at = Utc::now();
        let updated = report.clone();

        if let Some(images) = changes.images {
            for image in tables.images.iter_mut() {
                if image.report_id == Some(id) {
                    image.report_id = None;
                }
            }
            tables.attach_images(&images, |i| i.report_id = Some(id));
        }
        Ok(Some(updated))
    }

    async fn delete_report(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables();
        let before = tables.reports.len();
        tables.reports.retain(|r| r.id != id);
        if tables.reports.len() == before {
            return Ok(false);
        }
        for image in tables.images.iter_mut().filter(|i| i.report_id == Some(id)) {
            image.report_id = None;
        }
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.report_id == Some(id))
        {
            notification.report_id = None;
        }
        Ok(true)
    }

    async fn insert_images(&self, images: Vec<NewImage>) -> StoreResult<Vec<Image>> {
        let now = Utc::now();
        let records: Vec<Image> = images
            .into_iter()
            .map(|image| Image {
                id: Uuid::new_v4(),
                url: image.url,
                tag: image.tag,
                date: now,
                uploaded_by_id: image.uploaded_by_id,
                resident_id: image.resident_id,
                report_id: None,
                message_id: None,
                created_at: now,
            })
            .collect();
        self.tables().images.extend(records.iter().cloned());
        Ok(records)
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<MessageDetail> {
        let mut tables = self.tables();
        let record = Message {
            id: Uuid::new_v4(),
            resident_id: message.resident_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            content: message.content,
            created_at: Utc::now(),
        };
        tables.attach_images(&message.images, |i| i.message_id = Some(record.id));
        tables.messages.push(record.clone());
        Ok(tables.message_detail(&record))
    }

    async fn messages_of_resident_for(
        &self,
        resident_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<MessageDetail>> {
        let tables = self.tables();
        let mut messages: Vec<&Message> = tables
            .messages
            .iter()
            .filter(|m| m.resident_id == resident_id)
            .filter(|m| m.sender_id == user_id || m.recipient_id == user_id)
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages
            .into_iter()
            .map(|m| tables.message_detail(m))
            .collect())
    }

    async fn insert_visit(&self, visit: NewVisit) -> StoreResult<VisitDetail> {
        let mut tables = self.tables();
        let now = Utc::now();
        let record = Visit {
            id: Uuid::new_v4(),
            resident_id: visit.resident_id,
            requested_by_id: visit.requested_by_id,
            scheduled_by_id: None,
            visit_date: visit.visit_date,
            status: VisitStatus::Requested,
            notes: visit.notes,
            created_at: now,
            updated_at: now,
        };
        tables.visits.push(record.clone());
        Ok(tables.visit_detail(&record))
    }

    async fn visit_by_id(&self, id: Uuid) -> StoreResult<Option<Visit>> {
        Ok(self.tables().visits.iter().find(|v| v.id == id).cloned())
    }

    async fn visits_of_resident(&self, resident_id: Uuid) -> StoreResult<Vec<VisitDetail>> {
        let tables = self.tables();
        let mut visits: Vec<&Visit> = tables
            .visits
            .iter()
            .filter(|v| v.resident_id == resident_id)
            .collect();
        visits.sort_by(|a, b| a.visit_date.cmp(&b.visit_date));
        Ok(visits.into_iter().map(|v| tables.visit_detail(v)).collect())
    }

    async fn update_visit(
        &self,
        id: Uuid,
        changes: VisitChanges,
    ) -> StoreResult<Option<VisitDetail>> {
        let mut tables = self.tables();
        let Some(visit) = tables.visits.iter_mut().find(|v| v.id == id) else {
            return Ok(None);
        };
        set(&mut visit.status, changes.status);
        set(&mut visit.visit_date, changes.visit_date);
        set_opt(&mut visit.notes, changes.notes);
        set_opt(&mut visit.scheduled_by_id, changes.scheduled_by_id);
        visit.updated_at = Utc::now();
        let updated = visit.clone();
        Ok(Some(tables.visit_detail(&updated)))
    }

    async fn delete_visit(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables();
        let before = tables.visits.len();
        tables.visits.retain(|v| v.id != id);
        if tables.visits.len() == before {
            return Ok(false);
        }
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.visit_id == Some(id))
        {
            notification.visit_id = None;
        }
        Ok(true)
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        let mut tables = self.tables();
        if !tables.users.iter().any(|u| u.id == notification.user_id) {
            return Err(StoreError::Missing("User not found".into()));
        }
        if let Some(id) = notification.resident_id {
            if !tables.residents.iter().any(|r| r.id == id) {
                return Err(StoreError::Missing("Resident not found".into()));
            }
        }
        if let Some(id) = notification.visit_id {
            if !tables.visits.iter().any(|v| v.id == id) {
                return Err(StoreError::Missing("Visit not found".into()));
            }
        }
        if let Some(id) = notification.report_id {
            if !tables.reports.iter().any(|r| r.id == id) {
                return Err(StoreError::Missing("Report not found".into()));
            }
        }
        let record = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message,
            resident_id: notification.resident_id,
            visit_id: notification.visit_id,
            report_id: notification.report_id,
            read: false,
            created_at: Utc::now(),
        };
        tables.notifications.push(record.clone());
        Ok(record)
    }

    async fn notifications_of_user(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .tables()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Notification>> {
        let mut tables = self.tables();
        let Some(notification) = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        else {
            return Ok(None);
        };
        notification.read = true;
        Ok(Some(notification.clone()))
    }
}
