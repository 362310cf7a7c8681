use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::weights::{build_setup_tree, validate_gradebook_weights, ROOT_LEVEL};
use rusqlite::Connection;
use serde_json::Value;
use tracing::info;

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_name(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let Some(s) = params.get(key).and_then(|v| v.as_str()) else {
        return Err(HandlerErr::new("bad_params", format!("missing {}", key)));
    };
    parse_name(s, key)
}

pub fn parse_name(s: &str, key: &str) -> Result<String, HandlerErr> {
    let t = s.trim();
    if t.is_empty() {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must not be empty", key),
        ));
    }
    Ok(t.to_string())
}

/// `None` when absent, `Some(None)` for explicit null, `Some(Some(w))` for a number in [0,100].
pub fn parse_weight(v: Option<&Value>, key: &str) -> Result<Option<Option<f64>>, HandlerErr> {
    let Some(v) = v else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(Some(None));
    }
    let Some(n) = v.as_f64() else {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must be a number or null", key),
        ));
    };
    if !(0.0..=100.0).contains(&n) {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must be between 0 and 100", key),
        ));
    }
    Ok(Some(Some(n)))
}

/// Same shape as `parse_weight`, for nullable id references.
pub fn parse_ref(v: Option<&Value>, key: &str) -> Result<Option<Option<i64>>, HandlerErr> {
    let Some(v) = v else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(Some(None));
    }
    v.as_i64().map(|n| Some(Some(n))).ok_or_else(|| {
        HandlerErr::new("bad_params", format!("{} must be an integer or null", key))
    })
}

pub fn parse_bool(v: Option<&Value>, key: &str) -> Result<Option<bool>, HandlerErr> {
    match v {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a boolean", key))),
    }
}

pub fn require_gradebook(conn: &Connection, gradebook_id: i64) -> Result<(), HandlerErr> {
    match db::gradebook_exists(conn, gradebook_id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(HandlerErr::new("not_found", "gradebook not found")),
        Err(e) => Err(HandlerErr::query(e)),
    }
}

pub fn require_category(
    conn: &Connection,
    gradebook_id: i64,
    category_id: i64,
) -> Result<(), HandlerErr> {
    match db::category_in_gradebook(conn, gradebook_id, category_id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(HandlerErr::new("not_found", "category not found")),
        Err(e) => Err(HandlerErr::query(e)),
    }
}

/// Applies `mutate` and re-validates the whole gradebook in one transaction.
/// Any weight violation rolls the mutation back.
pub fn guarded_mutation<F>(
    conn: &Connection,
    gradebook_id: i64,
    error_prefix: &str,
    mutate: F,
) -> Result<Value, HandlerErr>
where
    F: FnOnce(&Connection) -> Result<Value, HandlerErr>,
{
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    let out = match mutate(&*tx) {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.rollback();
            return Err(e);
        }
    };

    let loaded = db::load_categories(&tx, gradebook_id)
        .and_then(|cats| db::load_items(&tx, gradebook_id).map(|items| (cats, items)));
    let (categories, items) = match loaded {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.rollback();
            return Err(HandlerErr::query(e));
        }
    };

    let tree = build_setup_tree(&categories, &items);
    if let Err(e) = validate_gradebook_weights(&tree, ROOT_LEVEL, error_prefix) {
        let _ = tx.rollback();
        info!(gradebook_id, prefix = error_prefix, error = %e, "rejected mutation");
        return Err(e.into());
    }

    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(out)
}

pub fn respond(id: &str, r: Result<Value, HandlerErr>) -> Value {
    match r {
        Ok(v) => crate::ipc::error::ok(id, v),
        Err(e) => e.response(id),
    }
}
