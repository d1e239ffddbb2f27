//! Canonical SQLite schema for the trellis store.
//!
//! - `journals` holds the classification forest as parent pointers; the
//!   self-reference is `ON DELETE RESTRICT` so a node with live children can
//!   never be removed by a stray statement
//! - `partners`, `goods`, `tax_codes` are the opaque entities links point at
//! - `journal_partner_links` / `journal_good_links` are the two-way links,
//!   keyed by their natural composite keys
//! - `journal_partner_good_links` attaches a good to a two-way partner link
//! - `store_meta` tracks the applied schema version

/// Migration v1: entity, hierarchy and link tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS journals (
    journal_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    parent_id TEXT REFERENCES journals(journal_id) ON DELETE RESTRICT,
    is_terminal INTEGER NOT NULL DEFAULT 1 CHECK (is_terminal IN (0, 1)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (parent_id IS NULL OR parent_id <> journal_id)
);

CREATE TABLE IF NOT EXISTS partners (
    partner_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tax_codes (
    tax_code_id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS goods (
    good_id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    default_tax_code_id TEXT REFERENCES tax_codes(tax_code_id) ON DELETE SET NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS journal_partner_links (
    link_id INTEGER PRIMARY KEY AUTOINCREMENT,
    journal_id TEXT NOT NULL REFERENCES journals(journal_id) ON DELETE CASCADE,
    partner_id TEXT NOT NULL REFERENCES partners(partner_id) ON DELETE RESTRICT,
    partnership_type TEXT NOT NULL CHECK (length(trim(partnership_type)) > 0),
    created_at_us INTEGER NOT NULL,
    UNIQUE (journal_id, partner_id, partnership_type)
);

CREATE TABLE IF NOT EXISTS journal_good_links (
    link_id INTEGER PRIMARY KEY AUTOINCREMENT,
    journal_id TEXT NOT NULL REFERENCES journals(journal_id) ON DELETE CASCADE,
    good_id TEXT NOT NULL REFERENCES goods(good_id) ON DELETE RESTRICT,
    created_at_us INTEGER NOT NULL,
    UNIQUE (journal_id, good_id)
);

CREATE TABLE IF NOT EXISTS journal_partner_good_links (
    link_id INTEGER PRIMARY KEY AUTOINCREMENT,
    partner_link_id INTEGER NOT NULL
        REFERENCES journal_partner_links(link_id) ON DELETE CASCADE,
    good_id TEXT NOT NULL REFERENCES goods(good_id) ON DELETE RESTRICT,
    descriptive_text TEXT,
    tax_code_id TEXT REFERENCES tax_codes(tax_code_id) ON DELETE RESTRICT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (partner_link_id, good_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, 0);
"#;

/// Migration v2: read-path indexes for closure and intersection queries.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_journals_parent
    ON journals(parent_id);

CREATE INDEX IF NOT EXISTS idx_partner_links_partner_journal
    ON journal_partner_links(partner_id, journal_id);

CREATE INDEX IF NOT EXISTS idx_good_links_good_journal
    ON journal_good_links(good_id, journal_id);

CREATE INDEX IF NOT EXISTS idx_full_links_good_partner_link
    ON journal_partner_good_links(good_id, partner_link_id);

CREATE INDEX IF NOT EXISTS idx_goods_label
    ON goods(label, good_id);

CREATE INDEX IF NOT EXISTS idx_partners_name
    ON partners(name, partner_id);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
"#;

/// Indexes expected by the closure and intersection query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_journals_parent",
    "idx_partner_links_partner_journal",
    "idx_good_links_good_journal",
    "idx_full_links_good_partner_link",
    "idx_goods_label",
    "idx_partners_name",
];

#[cfg(test)]
mod tests {
    use crate::db::migrations;
    use rusqlite::{Connection, params};

    fn migrated() -> anyhow::Result<Connection> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::migrate(&mut conn)?;
        Ok(conn)
    }

    fn insert_journal(conn: &Connection, id: &str, parent: Option<&str>) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO journals (journal_id, name, parent_id, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, 1, 1)",
            params![id, format!("Journal {id}"), parent],
        )
    }

    #[test]
    fn parent_with_children_cannot_be_deleted() -> anyhow::Result<()> {
        let conn = migrated()?;
        insert_journal(&conn, "1", None)?;
        insert_journal(&conn, "10", Some("1"))?;

        let result = conn.execute("DELETE FROM journals WHERE journal_id = '1'", []);
        assert!(result.is_err(), "restrict must block deleting a live parent");
        Ok(())
    }

    #[test]
    fn self_parent_is_rejected() -> anyhow::Result<()> {
        let conn = migrated()?;
        insert_journal(&conn, "1", None)?;
        let result = conn.execute("UPDATE journals SET parent_id = '1' WHERE journal_id = '1'", []);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn partner_link_key_allows_multiple_types() -> anyhow::Result<()> {
        let conn = migrated()?;
        insert_journal(&conn, "1", None)?;
        conn.execute(
            "INSERT INTO partners (partner_id, name, created_at_us) VALUES ('P1', 'Acme', 1)",
            [],
        )?;
        for kind in ["STANDARD", "SUPPLIER"] {
            conn.execute(
                "INSERT INTO journal_partner_links (journal_id, partner_id, partnership_type, created_at_us)
                 VALUES ('1', 'P1', ?1, 1)",
                params![kind],
            )?;
        }
        let dup = conn.execute(
            "INSERT INTO journal_partner_links (journal_id, partner_id, partnership_type, created_at_us)
             VALUES ('1', 'P1', 'STANDARD', 1)",
            [],
        );
        assert!(dup.is_err());
        Ok(())
    }

    #[test]
    fn deleting_journal_cascades_to_full_links() -> anyhow::Result<()> {
        let conn = migrated()?;
        insert_journal(&conn, "1", None)?;
        conn.execute(
            "INSERT INTO partners (partner_id, name, created_at_us) VALUES ('P1', 'Acme', 1)",
            [],
        )?;
        conn.execute(
            "INSERT INTO goods (good_id, label, created_at_us) VALUES ('G1', 'Bolt', 1)",
            [],
        )?;
        conn.execute(
            "INSERT INTO journal_partner_links (journal_id, partner_id, partnership_type, created_at_us)
             VALUES ('1', 'P1', 'STANDARD', 1)",
            [],
        )?;
        conn.execute(
            "INSERT INTO journal_partner_good_links
             (partner_link_id, good_id, created_at_us, updated_at_us)
             VALUES (1, 'G1', 1, 1)",
            [],
        )?;

        conn.execute("DELETE FROM journals WHERE journal_id = '1'", [])?;

        let remaining: i64 = conn.query_row(
            "SELECT COUNT(*) FROM journal_partner_good_links",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(remaining, 0);
        Ok(())
    }
}
