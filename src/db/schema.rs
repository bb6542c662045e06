/// Schema for the owned collection.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS owned_records (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    height INTEGER NOT NULL,
    weight INTEGER NOT NULL,
    hp INTEGER NOT NULL,
    attack INTEGER NOT NULL,
    defense INTEGER NOT NULL,
    special_attack INTEGER NOT NULL,
    special_defense INTEGER NOT NULL,
    speed INTEGER NOT NULL,
    -- Self-contained data URI, or the remote URI when embedding failed
    image TEXT NOT NULL,
    captured_at TEXT NOT NULL,
    note TEXT
);

-- Category tags, one row per tag (multi-valued indexed field)
CREATE TABLE IF NOT EXISTS owned_record_types (
    id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    type_name TEXT NOT NULL,
    PRIMARY KEY (id, position),
    FOREIGN KEY (id) REFERENCES owned_records(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_owned_record_types_name
    ON owned_record_types(type_name);
"#;
