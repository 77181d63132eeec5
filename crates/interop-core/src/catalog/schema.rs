//! Job Catalog DDL. Run once at `JobCatalog::connect` time via plain
//! `CREATE TABLE IF NOT EXISTS` statements rather than a migrations
//! directory, since the catalog is a single embedded sqlite file rather
//! than a server-mode database with a migration history to track.

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS mapping_jobs (
    job_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    source_schema TEXT NOT NULL,
    target_schema TEXT NOT NULL,
    ai_mappings TEXT NOT NULL DEFAULT '[]',
    approved_mappings TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL,
    target_resource_type TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingestion_jobs (
    job_id TEXT PRIMARY KEY,
    config TEXT NOT NULL,
    status TEXT NOT NULL,
    metrics TEXT NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Reserved per spec.md §4.2/§6: the NL-to-query chat subsystem is out of
-- core scope, but the catalog schema still carries its table shapes.
CREATE TABLE IF NOT EXISTS chat_conversations (
    conversation_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    message_id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS person_id_cache (
    namespace TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    PRIMARY KEY (namespace, natural_key)
);

CREATE TABLE IF NOT EXISTS concept_approvals (
    job_id TEXT,
    field TEXT NOT NULL,
    source_value TEXT NOT NULL,
    concept_id INTEGER NOT NULL,
    PRIMARY KEY (job_id, field, source_value)
);

CREATE INDEX IF NOT EXISTS idx_ingestion_jobs_status ON ingestion_jobs(status);

CREATE TABLE IF NOT EXISTS audit_log (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    action TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource_id TEXT,
    changes TEXT,
    ip_address TEXT,
    user_agent TEXT,
    timestamp TEXT NOT NULL,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_log_resource ON audit_log(resource_type, resource_id);
CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_id);
"#;
