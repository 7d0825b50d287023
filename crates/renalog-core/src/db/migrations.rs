//! Database migrations

use libsql::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity.

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Users: password_hash is NULL for provider accounts
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            password_hash TEXT,
            auth_provider TEXT,
            provider_subject TEXT,
            full_name TEXT,
            date_of_birth TEXT,
            dialysis_modality TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        // Daily vital observations
        "CREATE TABLE IF NOT EXISTS vitals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            weight_kg REAL,
            systolic INTEGER,
            diastolic INTEGER,
            heart_rate INTEGER,
            spo2 INTEGER,
            fluid_intake_ml REAL,
            fluid_output_ml REAL,
            temperature_c REAL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_vitals_user_date ON vitals(user_id, date DESC)",
        "CREATE INDEX IF NOT EXISTS idx_vitals_synced ON vitals(synced)",
        // Lab reports
        "CREATE TABLE IF NOT EXISTS lab_reports (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            creatinine REAL,
            egfr REAL,
            bun REAL,
            potassium REAL,
            phosphorus REAL,
            calcium REAL,
            albumin REAL,
            hemoglobin REAL,
            document_ref TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_lab_reports_user_date ON lab_reports(user_id, date DESC)",
        "CREATE INDEX IF NOT EXISTS idx_lab_reports_synced ON lab_reports(synced)",
        // Dialysis sessions
        "CREATE TABLE IF NOT EXISTS dialysis_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            duration_minutes INTEGER,
            pre_weight_kg REAL,
            post_weight_kg REAL,
            pre_systolic INTEGER,
            pre_diastolic INTEGER,
            post_systolic INTEGER,
            post_diastolic INTEGER,
            uf_goal_ml REAL,
            uf_removed_ml REAL,
            blood_flow_rate INTEGER,
            dialysate_flow_rate INTEGER,
            symptoms TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_dialysis_sessions_user_date
            ON dialysis_sessions(user_id, date DESC)",
        "CREATE INDEX IF NOT EXISTS idx_dialysis_sessions_synced ON dialysis_sessions(synced)",
        // Food log
        "CREATE TABLE IF NOT EXISTS food_entries (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            meal_type TEXT NOT NULL,
            date TEXT NOT NULL,
            calories REAL,
            protein_g REAL,
            carbs_g REAL,
            fat_g REAL,
            sodium_mg REAL,
            potassium_mg REAL,
            phosphorus_mg REAL,
            fluid_ml REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_food_entries_user_date ON food_entries(user_id, date DESC)",
        "CREATE INDEX IF NOT EXISTS idx_food_entries_synced ON food_entries(synced)",
        // Medications
        "CREATE TABLE IF NOT EXISTS medications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            dosage TEXT NOT NULL,
            frequency TEXT NOT NULL,
            times_of_day TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            instructions TEXT,
            reminder_enabled INTEGER NOT NULL DEFAULT 0,
            reminder_handles TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_medications_user_active ON medications(user_id, active)",
        "CREATE INDEX IF NOT EXISTS idx_medications_synced ON medications(synced)",
        // Intake logs, cascade-deleted with their medication
        "CREATE TABLE IF NOT EXISTS medication_logs (
            id TEXT PRIMARY KEY,
            medication_id TEXT NOT NULL REFERENCES medications(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            scheduled_time TEXT NOT NULL,
            actual_time TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_medication_logs_med_time
            ON medication_logs(medication_id, scheduled_time DESC)",
        "CREATE INDEX IF NOT EXISTS idx_medication_logs_synced ON medication_logs(synced)",
        // Alerts
        "CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            category TEXT NOT NULL,
            severity TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT,
            read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_alerts_user_read
            ON alerts(user_id, read, created_at DESC)",
        // Shared-access grants
        "CREATE TABLE IF NOT EXISTS shared_access (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            grantee_email TEXT NOT NULL,
            grantee_role TEXT NOT NULL,
            permissions TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_shared_access_patient ON shared_access(patient_id)",
        // Per-user settings (device-local, not synced)
        "CREATE TABLE IF NOT EXISTS app_settings (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            settings TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        // Subscriptions
        "CREATE TABLE IF NOT EXISTS subscriptions (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            plan TEXT NOT NULL,
            status TEXT NOT NULL,
            platform TEXT,
            expires_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        // Pending local mutations awaiting remote confirmation
        "CREATE TABLE IF NOT EXISTS sync_queue (
            id TEXT PRIMARY KEY,
            table_name TEXT NOT NULL,
            record_id TEXT NOT NULL,
            operation TEXT NOT NULL,
            payload TEXT,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt TEXT,
            last_error TEXT,
            created_at TEXT NOT NULL
        )",
        // Replay order is creation order, oldest first
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_created ON sync_queue(created_at ASC)",
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_record ON sync_queue(table_name, record_id)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
