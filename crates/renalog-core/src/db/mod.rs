//! Embedded storage: connection management, migrations, and repositories.
//!
//! Every repository borrows the shared [`Database`] handle; writes that need
//! to pair a row mutation with a sync-queue entry run inside
//! [`Database::with_transaction`].

mod alerts_repository;
mod connection;
mod dialysis_repository;
mod food_repository;
mod labs_repository;
mod medications_repository;
pub(crate) mod migrations;
mod settings_repository;
mod sharing_repository;
mod subscriptions_repository;
pub(crate) mod sync_repository;
mod update;
pub(crate) mod users_repository;
mod vitals_repository;

pub use alerts_repository::{AlertsRepository, LibSqlAlertsRepository};
pub use connection::Database;
pub use dialysis_repository::{DialysisRepository, LibSqlDialysisRepository};
pub use food_repository::{FoodRepository, LibSqlFoodRepository};
pub use labs_repository::{LabsRepository, LibSqlLabsRepository};
pub use medications_repository::{LibSqlMedicationsRepository, MedicationsRepository};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
pub use sharing_repository::{LibSqlSharingRepository, SharingRepository};
pub use subscriptions_repository::{LibSqlSubscriptionsRepository, SubscriptionsRepository};
pub use sync_repository::{LibSqlSyncQueueRepository, SyncQueueRepository};
pub use users_repository::{LibSqlUsersRepository, ProfileUpdate, UsersRepository};
pub use vitals_repository::{LibSqlVitalsRepository, VitalsRepository};

/// Rows returned by a list call when the caller passes a limit of zero
pub const DEFAULT_LIST_LIMIT: usize = 30;
