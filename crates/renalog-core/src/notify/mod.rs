//! Medication reminder scheduling.
//!
//! The data layer never talks to an OS notification service directly. It
//! defines the scheduler seam and a coordinator that keeps one medication's
//! registrations consistent: cancel whatever is registered, re-register from
//! the current row, persist the new handles. Re-running the coordinator is
//! therefore always safe and never stacks duplicate reminders.

use chrono::NaiveTime;

use crate::db::{Database, LibSqlMedicationsRepository, MedicationsRepository};
use crate::error::{Error, Result};
use crate::models::{Medication, RecordId};

/// Opaque token identifying one scheduled reminder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(pub String);

impl ScheduleHandle {
    /// String form of the handle
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Platform seam for registering daily reminders.
///
/// Implementations wrap whatever the platform offers (local notifications,
/// cron, a test recorder) and hand back one handle per registered time.
pub trait ReminderScheduler {
    /// Register a daily reminder for each time, labelled for display
    fn schedule(
        &self,
        medication_id: &RecordId,
        times: &[NaiveTime],
        label: &str,
    ) -> Result<Vec<ScheduleHandle>>;

    /// Cancel previously registered reminders. Unknown handles are ignored.
    fn cancel(&self, handles: &[ScheduleHandle]) -> Result<()>;
}

/// Scheduler that registers nothing, for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScheduler;

impl ReminderScheduler for NullScheduler {
    fn schedule(
        &self,
        _medication_id: &RecordId,
        _times: &[NaiveTime],
        _label: &str,
    ) -> Result<Vec<ScheduleHandle>> {
        Ok(Vec::new())
    }

    fn cancel(&self, _handles: &[ScheduleHandle]) -> Result<()> {
        Ok(())
    }
}

/// Keeps a medication's OS registrations in step with its stored row
pub struct ReminderCoordinator<'a, S: ReminderScheduler> {
    db: &'a Database,
    scheduler: &'a S,
}

impl<'a, S: ReminderScheduler> ReminderCoordinator<'a, S> {
    /// Create a coordinator over the given database and scheduler
    pub const fn new(db: &'a Database, scheduler: &'a S) -> Self {
        Self { db, scheduler }
    }

    /// Reconcile one medication's registrations with its current row.
    ///
    /// Existing handles are cancelled first, so dose-time or enablement
    /// changes replace the old registrations instead of adding to them.
    pub async fn refresh(&self, id: &RecordId) -> Result<()> {
        let medications = LibSqlMedicationsRepository::new(self.db);
        let medication = medications
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("medication {id}")))?;

        self.cancel_stored(&medication)?;

        let handles = if medication.active && medication.reminder_enabled {
            self.scheduler.schedule(
                &medication.id,
                &medication.times_of_day,
                &medication.name,
            )?
        } else {
            Vec::new()
        };

        let raw: Vec<String> = handles.into_iter().map(|handle| handle.0).collect();
        medications.set_reminder_handles(id, &raw).await?;
        Ok(())
    }

    /// Cancel a medication's registrations without re-registering.
    ///
    /// Takes the record rather than an id so it can run after the row is
    /// already deleted.
    pub fn cancel_stored(&self, medication: &Medication) -> Result<()> {
        if medication.reminder_handles.is_empty() {
            return Ok(());
        }
        let handles: Vec<ScheduleHandle> = medication
            .reminder_handles
            .iter()
            .cloned()
            .map(ScheduleHandle)
            .collect();
        self.scheduler.cancel(&handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users_repository::{LibSqlUsersRepository, UsersRepository};
    use crate::models::{
        Frequency, IntakeStatus, MedicationUpdate, NewMedication, NewMedicationLog, NewUser,
    };
    use crate::util::now;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Scheduler double that records registrations and cancellations
    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<(RecordId, NaiveTime, String)>>,
        cancelled: Mutex<Vec<ScheduleHandle>>,
        counter: Mutex<u64>,
    }

    impl ReminderScheduler for RecordingScheduler {
        fn schedule(
            &self,
            medication_id: &RecordId,
            times: &[NaiveTime],
            label: &str,
        ) -> Result<Vec<ScheduleHandle>> {
            let mut scheduled = self.scheduled.lock().unwrap();
            let mut counter = self.counter.lock().unwrap();
            let mut handles = Vec::new();
            for time in times {
                *counter += 1;
                scheduled.push((*medication_id, *time, label.to_string()));
                handles.push(ScheduleHandle(format!("handle-{}", *counter)));
            }
            Ok(handles)
        }

        fn cancel(&self, handles: &[ScheduleHandle]) -> Result<()> {
            self.cancelled.lock().unwrap().extend_from_slice(handles);
            Ok(())
        }
    }

    async fn setup() -> (Database, RecordId) {
        let db = Database::open_in_memory().await.unwrap();
        let user = LibSqlUsersRepository::new(&db)
            .sign_up(
                NewUser {
                    email: "pat@example.com".to_string(),
                    ..NewUser::default()
                },
                "hunter2hunter2",
            )
            .await
            .unwrap();
        let id = user.id;
        (db, id)
    }

    fn lisinopril() -> NewMedication {
        NewMedication {
            name: "Lisinopril".to_string(),
            dosage: "10mg".to_string(),
            frequency: Frequency::OnceDaily,
            times_of_day: vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap()],
            start_date: "2025-06-01".parse().unwrap(),
            end_date: None,
            instructions: None,
            reminder_enabled: true,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn daily_medication_registers_one_reminder_and_counts_adherence() {
        let (db, user) = setup().await;
        let medications = LibSqlMedicationsRepository::new(&db);
        let scheduler = RecordingScheduler::default();
        let coordinator = ReminderCoordinator::new(&db, &scheduler);

        let medication = medications.create(&user, lisinopril()).await.unwrap();
        coordinator.refresh(&medication.id).await.unwrap();

        {
            let scheduled = scheduler.scheduled.lock().unwrap();
            assert_eq!(scheduled.len(), 1);
            assert_eq!(scheduled[0].1, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
            assert_eq!(scheduled[0].2, "Lisinopril");
        }
        let stored = medications.get(&medication.id).await.unwrap().unwrap();
        assert_eq!(stored.reminder_handles, vec!["handle-1".to_string()]);

        medications
            .log_intake(
                &user,
                NewMedicationLog {
                    medication_id: medication.id,
                    status: IntakeStatus::Taken,
                    scheduled_time: now(),
                    actual_time: Some(now()),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let summary = medications.adherence(&user, 7).await.unwrap();
        assert_eq!(summary.total_doses, 1);
        assert_eq!(summary.taken_doses, 1);
        assert_eq!(summary.missed_doses, 0);
        assert!((summary.adherence_rate - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_replaces_rather_than_stacks_registrations() {
        let (db, user) = setup().await;
        let medications = LibSqlMedicationsRepository::new(&db);
        let scheduler = RecordingScheduler::default();
        let coordinator = ReminderCoordinator::new(&db, &scheduler);

        let medication = medications.create(&user, lisinopril()).await.unwrap();
        coordinator.refresh(&medication.id).await.unwrap();

        medications
            .update(
                &medication.id,
                MedicationUpdate {
                    times_of_day: Some(vec![
                        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                        NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
                    ]),
                    ..MedicationUpdate::default()
                },
            )
            .await
            .unwrap();
        coordinator.refresh(&medication.id).await.unwrap();

        // The first registration was cancelled before the two new ones.
        assert_eq!(
            scheduler.cancelled.lock().unwrap().as_slice(),
            &[ScheduleHandle("handle-1".to_string())]
        );
        let stored = medications.get(&medication.id).await.unwrap().unwrap();
        assert_eq!(
            stored.reminder_handles,
            vec!["handle-2".to_string(), "handle-3".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_reminders_clear_registrations() {
        let (db, user) = setup().await;
        let medications = LibSqlMedicationsRepository::new(&db);
        let scheduler = RecordingScheduler::default();
        let coordinator = ReminderCoordinator::new(&db, &scheduler);

        let medication = medications.create(&user, lisinopril()).await.unwrap();
        coordinator.refresh(&medication.id).await.unwrap();

        medications
            .update(
                &medication.id,
                MedicationUpdate {
                    reminder_enabled: Some(false),
                    ..MedicationUpdate::default()
                },
            )
            .await
            .unwrap();
        coordinator.refresh(&medication.id).await.unwrap();

        assert_eq!(scheduler.cancelled.lock().unwrap().len(), 1);
        let stored = medications.get(&medication.id).await.unwrap().unwrap();
        assert!(stored.reminder_handles.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_stored_works_after_delete() {
        let (db, user) = setup().await;
        let medications = LibSqlMedicationsRepository::new(&db);
        let scheduler = RecordingScheduler::default();
        let coordinator = ReminderCoordinator::new(&db, &scheduler);

        let medication = medications.create(&user, lisinopril()).await.unwrap();
        coordinator.refresh(&medication.id).await.unwrap();
        let stored = medications.get(&medication.id).await.unwrap().unwrap();

        medications.delete(&medication.id).await.unwrap();
        coordinator.cancel_stored(&stored).unwrap();

        assert_eq!(scheduler.cancelled.lock().unwrap().len(), 1);
    }
}
