pub const SCHEMA_VERSION: i32 = 2;

/// Timestamps are stored as fixed-width RFC 3339 UTC strings
/// (`YYYY-MM-DDTHH:MM:SS.ffffffZ`) so that text comparison orders them.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    phone_number TEXT UNIQUE,
    is_superuser INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (created_by) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS project_memberships (
    project_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK(role IN ('admin', 'caller', 'contact')),
    created_at TEXT NOT NULL,
    PRIMARY KEY (project_id, user_id),
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_membership_role ON project_memberships(project_id, role);

CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    full_name TEXT NOT NULL,
    phone TEXT NOT NULL,
    assigned_caller TEXT,
    call_status TEXT NOT NULL DEFAULT 'pending',
    is_special INTEGER NOT NULL DEFAULT 0,
    last_call_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (project_id, phone),
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (assigned_caller) REFERENCES users(id) ON DELETE SET NULL,
    FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_contact_pool ON contacts(project_id, assigned_caller, call_status);
CREATE INDEX IF NOT EXISTS idx_contact_updated ON contacts(updated_at);
CREATE INDEX IF NOT EXISTS idx_contact_special ON contacts(is_special);

CREATE TABLE IF NOT EXISTS contact_logs (
    id TEXT PRIMARY KEY,
    contact_id TEXT NOT NULL,
    action TEXT NOT NULL,
    performed_by TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE,
    FOREIGN KEY (performed_by) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_contact_log_contact ON contact_logs(contact_id);

CREATE TABLE IF NOT EXISTS calls (
    id TEXT PRIMARY KEY,
    contact_id TEXT NOT NULL,
    caller_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    result TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    duration INTEGER,
    notes TEXT,
    follow_up_required INTEGER NOT NULL DEFAULT 0,
    follow_up_date TEXT,
    call_date TEXT NOT NULL,
    is_editable INTEGER NOT NULL DEFAULT 1,
    edited_at TEXT,
    edited_by TEXT,
    edit_reason TEXT,
    original_data TEXT,
    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE,
    FOREIGN KEY (caller_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (edited_by) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_call_contact ON calls(contact_id);

CREATE TABLE IF NOT EXISTS call_edits (
    id TEXT PRIMARY KEY,
    call_id TEXT NOT NULL,
    edited_by TEXT NOT NULL,
    field_name TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    edit_reason TEXT,
    edited_at TEXT NOT NULL,
    FOREIGN KEY (call_id) REFERENCES calls(id) ON DELETE CASCADE,
    FOREIGN KEY (edited_by) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_call_edit_call ON call_edits(call_id);
"#;

/// V2 migration: key/value settings overriding the built-in configuration
pub const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS app_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
