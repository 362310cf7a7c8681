use crate::error::WeightError;
use crate::weights::{CategoryRecord, ItemRecord, SetupItemKind};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS gradebooks(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_categories(
            id INTEGER PRIMARY KEY,
            gradebook_id INTEGER NOT NULL,
            parent_id INTEGER,
            name TEXT NOT NULL,
            weight REAL,
            extra_credit INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(gradebook_id) REFERENCES gradebooks(id),
            FOREIGN KEY(parent_id) REFERENCES grade_categories(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_categories_gradebook ON grade_categories(gradebook_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_items(
            id INTEGER PRIMARY KEY,
            gradebook_id INTEGER NOT NULL,
            category_id INTEGER,
            name TEXT NOT NULL,
            weight REAL,
            max_grade REAL NOT NULL DEFAULT 100,
            extra_credit INTEGER NOT NULL DEFAULT 0,
            activity_module_type TEXT,
            activity_module_name TEXT,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(gradebook_id) REFERENCES gradebooks(id),
            FOREIGN KEY(category_id) REFERENCES grade_categories(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_items_gradebook ON grade_items(gradebook_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_items_category ON grade_items(category_id)",
        [],
    )?;

    Ok(conn)
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn gradebook_exists(conn: &Connection, gradebook_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM gradebooks WHERE id = ?",
        [gradebook_id],
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

pub fn create_gradebook(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO gradebooks(name, created_at) VALUES(?, ?)",
        (name, now_stamp()),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_gradebooks(conn: &Connection) -> rusqlite::Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare("SELECT id, name FROM gradebooks ORDER BY id")?;
    let rows: Vec<(i64, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All categories of a gradebook, with child id lists filled in.
pub fn load_categories(
    conn: &Connection,
    gradebook_id: i64,
) -> rusqlite::Result<Vec<CategoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, parent_id, name, weight, extra_credit
         FROM grade_categories
         WHERE gradebook_id = ?
         ORDER BY sort_order, id",
    )?;
    let mut categories = stmt
        .query_map([gradebook_id], |r| {
            Ok(CategoryRecord {
                id: r.get(0)?,
                parent: r.get(1)?,
                name: r.get(2)?,
                weight: r.get(3)?,
                extra_credit: r.get::<_, i64>(4)? != 0,
                subcategory_ids: Vec::new(),
                item_ids: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut item_stmt = conn.prepare(
        "SELECT id, category_id FROM grade_items
         WHERE gradebook_id = ? AND category_id IS NOT NULL
         ORDER BY sort_order, id",
    )?;
    let item_links = item_stmt
        .query_map([gradebook_id], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let pos: HashMap<i64, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();
    let child_links: Vec<(i64, i64)> = categories
        .iter()
        .filter_map(|c| c.parent.map(|p| (p, c.id)))
        .collect();
    for (parent, child) in child_links {
        if let Some(&i) = pos.get(&parent) {
            categories[i].subcategory_ids.push(child);
        }
    }
    for (item_id, cat_id) in item_links {
        if let Some(&i) = pos.get(&cat_id) {
            categories[i].item_ids.push(item_id);
        }
    }

    Ok(categories)
}

pub fn load_items(conn: &Connection, gradebook_id: i64) -> rusqlite::Result<Vec<ItemRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, category_id, name, weight, max_grade, extra_credit,
                activity_module_type, activity_module_name
         FROM grade_items
         WHERE gradebook_id = ?
         ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([gradebook_id], |r| {
            let module_type: Option<String> = r.get(6)?;
            Ok(ItemRecord {
                id: r.get(0)?,
                category: r.get(1)?,
                name: r.get(2)?,
                weight: r.get(3)?,
                max_grade: r.get(4)?,
                extra_credit: r.get::<_, i64>(5)? != 0,
                activity_module_type: module_type.as_deref().and_then(SetupItemKind::parse),
                activity_module_name: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn category_in_gradebook(
    conn: &Connection,
    gradebook_id: i64,
    category_id: i64,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM grade_categories WHERE id = ? AND gradebook_id = ?",
        (category_id, gradebook_id),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

pub struct NewCategory<'a> {
    pub parent_id: Option<i64>,
    pub name: &'a str,
    pub weight: Option<f64>,
    pub extra_credit: bool,
}

pub fn insert_category(
    conn: &Connection,
    gradebook_id: i64,
    c: &NewCategory<'_>,
) -> rusqlite::Result<i64> {
    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM grade_categories WHERE gradebook_id = ?",
        [gradebook_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO grade_categories(gradebook_id, parent_id, name, weight, extra_credit, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            gradebook_id,
            c.parent_id,
            c.name,
            c.weight,
            c.extra_credit as i64,
            sort_order,
            now_stamp(),
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rejects a new parent that is the category itself or lies below it.
pub fn check_reparent(
    conn: &Connection,
    gradebook_id: i64,
    category_id: i64,
    new_parent: Option<i64>,
) -> anyhow::Result<()> {
    let Some(mut cursor) = new_parent else {
        return Ok(());
    };
    let parents: HashMap<i64, Option<i64>> = load_categories(conn, gradebook_id)?
        .into_iter()
        .map(|c| (c.id, c.parent))
        .collect();

    let mut steps = 0_usize;
    loop {
        if cursor == category_id {
            return Err(WeightError::CyclicCategory { category_id }.into());
        }
        steps += 1;
        if steps > parents.len() {
            // Existing data already loops; refuse to make it worse.
            return Err(WeightError::CyclicCategory { category_id }.into());
        }
        match parents.get(&cursor).copied().flatten() {
            Some(p) => cursor = p,
            None => return Ok(()),
        }
    }
}

pub fn category_child_count(conn: &Connection, category_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT
           (SELECT COUNT(*) FROM grade_categories WHERE parent_id = ?1) +
           (SELECT COUNT(*) FROM grade_items WHERE category_id = ?1)",
        [category_id],
        |r| r.get(0),
    )
}

pub struct NewItem<'a> {
    pub category_id: Option<i64>,
    pub name: &'a str,
    pub weight: Option<f64>,
    pub max_grade: f64,
    pub extra_credit: bool,
    pub activity_module_type: Option<SetupItemKind>,
    pub activity_module_name: Option<&'a str>,
}

pub fn insert_item(conn: &Connection, gradebook_id: i64, i: &NewItem<'_>) -> rusqlite::Result<i64> {
    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM grade_items WHERE gradebook_id = ?",
        [gradebook_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO grade_items(gradebook_id, category_id, name, weight, max_grade, extra_credit,
                                 activity_module_type, activity_module_name, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            gradebook_id,
            i.category_id,
            i.name,
            i.weight,
            i.max_grade,
            i.extra_credit as i64,
            i.activity_module_type.map(|k| k.as_str()),
            i.activity_module_name,
            sort_order,
            now_stamp(),
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn stamp_updated(conn: &Connection, table: &str, id: i64) -> rusqlite::Result<()> {
    let sql = format!("UPDATE {} SET updated_at = ? WHERE id = ?", table);
    conn.execute(&sql, (now_stamp(), id))?;
    Ok(())
}
