pub const SCHEMA: &str = r#"
-- Identities known to the local auth service
CREATE TABLE IF NOT EXISTS auth_users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT,           -- NULL until an invited user sets one
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

-- Issued sessions; only digests of the tokens are stored
CREATE TABLE IF NOT EXISTS auth_sessions (
    access_digest TEXT PRIMARY KEY,
    refresh_digest TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL REFERENCES auth_users(id) ON DELETE CASCADE,
    expires_at TEXT NOT NULL,
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_auth_sessions_user ON auth_sessions(user_id);

CREATE TABLE IF NOT EXISTS t_user_profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    telephone TEXT,
    company_name TEXT,
    company_description TEXT,
    source_app TEXT,
    country TEXT,
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

-- Reference catalog; rowid keeps ingestion order
CREATE TABLE IF NOT EXISTS t_cpv_codes (
    "CODE" TEXT NOT NULL UNIQUE,
    "EN" TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS t_user_profile_cpv_codes (
    user_profile_id INTEGER NOT NULL REFERENCES t_user_profiles(id) ON DELETE CASCADE,
    cpv_code TEXT NOT NULL,
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    PRIMARY KEY (user_profile_id, cpv_code)
);

CREATE TABLE IF NOT EXISTS t_trial_subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    telephone TEXT,
    company_name TEXT,
    company_description TEXT,
    country TEXT,
    source_app TEXT,
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    start_date TEXT DEFAULT (date('now')),
    end_date TEXT DEFAULT (date('now', '+14 days'))
);

-- Write-only from the application's point of view
CREATE TABLE IF NOT EXISTS t_contact_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    message TEXT NOT NULL,
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

-- Populated by the ingestion pipeline
CREATE TABLE IF NOT EXISTS t_user_notices (
    email TEXT NOT NULL,
    notice_id TEXT NOT NULL,
    PRIMARY KEY (email, notice_id)
);

CREATE TABLE IF NOT EXISTS notice_summaries (
    notice_id TEXT PRIMARY KEY,
    created_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    summary TEXT
);

CREATE TABLE IF NOT EXISTS ted_manifest (
    notice_id TEXT PRIMARY KEY,
    storage_path TEXT,
    pdf_path TEXT,
    cpv_prefix TEXT
);
"#;

/// Tables reachable through the data API. Auth tables are not.
pub const DATA_TABLES: &[&str] = &[
    "t_user_profiles",
    "t_cpv_codes",
    "t_user_profile_cpv_codes",
    "t_trial_subscriptions",
    "t_contact_requests",
    "t_user_notices",
    "notice_summaries",
    "ted_manifest",
];
