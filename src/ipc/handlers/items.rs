use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_i64, get_name, guarded_mutation, parse_bool, parse_name, parse_ref, parse_weight,
    require_category, require_db, require_gradebook, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::weights::SetupItemKind;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{json, Value};

fn item_exists(conn: &Connection, gradebook_id: i64, item_id: i64) -> Result<(), HandlerErr> {
    let found = conn
        .query_row(
            "SELECT 1 FROM grade_items WHERE id = ? AND gradebook_id = ?",
            (item_id, gradebook_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    match found {
        Some(_) => Ok(()),
        None => Err(HandlerErr::new("not_found", "item not found")),
    }
}

fn parse_max_grade(v: Option<&Value>) -> Result<Option<f64>, HandlerErr> {
    let Some(v) = v else {
        return Ok(None);
    };
    match v.as_f64() {
        Some(n) if n >= 0.0 => Ok(Some(n)),
        _ => Err(HandlerErr::new(
            "bad_params",
            "maxGrade must be a non-negative number",
        )),
    }
}

fn parse_module_type(v: Option<&Value>) -> Result<Option<SetupItemKind>, HandlerErr> {
    let Some(v) = v else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    match v.as_str().and_then(SetupItemKind::parse) {
        Some(k) if !k.is_category() => Ok(Some(k)),
        _ => Err(HandlerErr::new(
            "bad_params",
            "activityModuleType must be one of manual_item, page, whiteboard, assignment, quiz, discussion",
        )),
    }
}

/// `None` when absent, `Some(None)` for null or blank, `Some(Some(name))` otherwise.
fn parse_module_name(v: Option<&Value>) -> Result<Option<Option<String>>, HandlerErr> {
    let Some(v) = v else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(Some(None));
    }
    let Some(s) = v.as_str() else {
        return Err(HandlerErr::new(
            "bad_params",
            "activityModuleName must be a string or null",
        ));
    };
    let t = s.trim();
    Ok(Some((!t.is_empty()).then(|| t.to_string())))
}

fn list_items(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    require_gradebook(conn, gradebook_id)?;

    let items = db::load_items(conn, gradebook_id).map_err(HandlerErr::query)?;
    Ok(json!({ "items": items }))
}

fn create_item(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    let name = get_name(&req.params, "name")?;
    let category_id = parse_ref(req.params.get("categoryId"), "categoryId")?.flatten();
    let weight = parse_weight(req.params.get("weight"), "weight")?.flatten();
    let max_grade = parse_max_grade(req.params.get("maxGrade"))?.unwrap_or(100.0);
    let extra_credit = parse_bool(req.params.get("extraCredit"), "extraCredit")?.unwrap_or(false);
    let module_type = parse_module_type(req.params.get("activityModuleType"))?;
    let module_name = parse_module_name(req.params.get("activityModuleName"))?.flatten();

    require_gradebook(conn, gradebook_id)?;
    if let Some(c) = category_id {
        require_category(conn, gradebook_id, c)?;
    }

    guarded_mutation(conn, gradebook_id, "Cannot create item", |tx| {
        let item_id = db::insert_item(
            tx,
            gradebook_id,
            &db::NewItem {
                category_id,
                name: &name,
                weight,
                max_grade,
                extra_credit,
                activity_module_type: module_type,
                activity_module_name: module_name.as_deref(),
            },
        )
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "grade_items" }))
        })?;
        Ok(json!({ "itemId": item_id }))
    })
}

fn update_item(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    let item_id = get_i64(&req.params, "itemId")?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::new("bad_params", "missing/invalid patch"));
    };

    require_gradebook(conn, gradebook_id)?;
    item_exists(conn, gradebook_id, item_id)?;

    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<SqlValue> = Vec::new();

    if let Some(v) = patch.get("name") {
        let Some(s) = v.as_str() else {
            return Err(HandlerErr::new("bad_params", "patch.name must be a string"));
        };
        set_parts.push("name = ?");
        bind_values.push(SqlValue::Text(parse_name(s, "name")?));
    }
    if let Some(w) = parse_weight(patch.get("weight"), "patch.weight")? {
        set_parts.push("weight = ?");
        bind_values.push(w.map(SqlValue::Real).unwrap_or(SqlValue::Null));
    }
    if let Some(m) = parse_max_grade(patch.get("maxGrade"))? {
        set_parts.push("max_grade = ?");
        bind_values.push(SqlValue::Real(m));
    }
    if let Some(b) = parse_bool(patch.get("extraCredit"), "patch.extraCredit")? {
        set_parts.push("extra_credit = ?");
        bind_values.push(SqlValue::Integer(b as i64));
    }
    if patch.contains_key("activityModuleType") {
        let kind = parse_module_type(patch.get("activityModuleType"))?;
        set_parts.push("activity_module_type = ?");
        bind_values.push(
            kind.map(|k| SqlValue::Text(k.as_str().to_string()))
                .unwrap_or(SqlValue::Null),
        );
    }
    if let Some(n) = parse_module_name(patch.get("activityModuleName"))? {
        set_parts.push("activity_module_name = ?");
        bind_values.push(n.map(SqlValue::Text).unwrap_or(SqlValue::Null));
    }
    if let Some(category) = parse_ref(patch.get("categoryId"), "patch.categoryId")? {
        if let Some(c) = category {
            require_category(conn, gradebook_id, c)?;
        }
        set_parts.push("category_id = ?");
        bind_values.push(category.map(SqlValue::Integer).unwrap_or(SqlValue::Null));
    }

    if set_parts.is_empty() {
        return Err(HandlerErr::new(
            "bad_params",
            "patch must include at least one field",
        ));
    }

    let sql = format!(
        "UPDATE grade_items SET {} WHERE id = ? AND gradebook_id = ?",
        set_parts.join(", ")
    );
    bind_values.push(SqlValue::Integer(item_id));
    bind_values.push(SqlValue::Integer(gradebook_id));

    guarded_mutation(conn, gradebook_id, "Cannot update item", |tx| {
        let changed = tx
            .execute(&sql, params_from_iter(bind_values))
            .map_err(|e| {
                HandlerErr::new("db_update_failed", e.to_string())
                    .with_details(json!({ "table": "grade_items" }))
            })?;
        if changed == 0 {
            return Err(HandlerErr::new("not_found", "item not found"));
        }
        db::stamp_updated(tx, "grade_items", item_id).map_err(HandlerErr::query)?;
        Ok(json!({ "ok": true }))
    })
}

fn delete_item(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    let item_id = get_i64(&req.params, "itemId")?;

    require_gradebook(conn, gradebook_id)?;
    item_exists(conn, gradebook_id, item_id)?;

    guarded_mutation(conn, gradebook_id, "Cannot delete item", |tx| {
        let changed = tx
            .execute(
                "DELETE FROM grade_items WHERE id = ? AND gradebook_id = ?",
                (item_id, gradebook_id),
            )
            .map_err(|e| {
                HandlerErr::new("db_delete_failed", e.to_string())
                    .with_details(json!({ "table": "grade_items" }))
            })?;
        if changed == 0 {
            return Err(HandlerErr::new("not_found", "item not found"));
        }
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let r = match req.method.as_str() {
        "items.list" => list_items(state, req),
        "items.create" => create_item(state, req),
        "items.update" => update_item(state, req),
        "items.delete" => delete_item(state, req),
        _ => return None,
    };
    Some(respond(&req.id, r))
}
