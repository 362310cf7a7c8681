use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_i64, get_name, guarded_mutation, parse_bool, parse_name, parse_ref, parse_weight,
    require_category, require_db, require_gradebook, respond,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value as SqlValue;
use rusqlite::params_from_iter;
use serde_json::{json, Value};

fn list_categories(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    require_gradebook(conn, gradebook_id)?;

    let categories = db::load_categories(conn, gradebook_id).map_err(HandlerErr::query)?;
    Ok(json!({ "categories": categories }))
}

fn create_category(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    let name = get_name(&req.params, "name")?;
    let parent_id = parse_ref(req.params.get("parentId"), "parentId")?.flatten();
    let weight = parse_weight(req.params.get("weight"), "weight")?.flatten();
    let extra_credit = parse_bool(req.params.get("extraCredit"), "extraCredit")?.unwrap_or(false);

    require_gradebook(conn, gradebook_id)?;
    if let Some(p) = parent_id {
        require_category(conn, gradebook_id, p)?;
    }

    guarded_mutation(conn, gradebook_id, "Cannot create category", |tx| {
        let category_id = db::insert_category(
            tx,
            gradebook_id,
            &db::NewCategory {
                parent_id,
                name: &name,
                weight,
                extra_credit,
            },
        )
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "grade_categories" }))
        })?;
        Ok(json!({ "categoryId": category_id }))
    })
}

fn update_category(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    let category_id = get_i64(&req.params, "categoryId")?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::new("bad_params", "missing/invalid patch"));
    };

    require_gradebook(conn, gradebook_id)?;
    require_category(conn, gradebook_id, category_id)?;

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
    if let Some(b) = parse_bool(patch.get("extraCredit"), "patch.extraCredit")? {
        set_parts.push("extra_credit = ?");
        bind_values.push(SqlValue::Integer(b as i64));
    }
    if let Some(parent) = parse_ref(patch.get("parentId"), "patch.parentId")? {
        if let Some(p) = parent {
            require_category(conn, gradebook_id, p)?;
        }
        db::check_reparent(conn, gradebook_id, category_id, parent)
            .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
        set_parts.push("parent_id = ?");
        bind_values.push(parent.map(SqlValue::Integer).unwrap_or(SqlValue::Null));
    }

    if set_parts.is_empty() {
        return Err(HandlerErr::new(
            "bad_params",
            "patch must include at least one field",
        ));
    }

    let sql = format!(
        "UPDATE grade_categories SET {} WHERE id = ? AND gradebook_id = ?",
        set_parts.join(", ")
    );
    bind_values.push(SqlValue::Integer(category_id));
    bind_values.push(SqlValue::Integer(gradebook_id));

    guarded_mutation(conn, gradebook_id, "Cannot update category", |tx| {
        let changed = tx
            .execute(&sql, params_from_iter(bind_values))
            .map_err(|e| {
                HandlerErr::new("db_update_failed", e.to_string())
                    .with_details(json!({ "table": "grade_categories" }))
            })?;
        if changed == 0 {
            return Err(HandlerErr::new("not_found", "category not found"));
        }
        db::stamp_updated(tx, "grade_categories", category_id).map_err(HandlerErr::query)?;
        Ok(json!({ "ok": true }))
    })
}

fn delete_category(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    let category_id = get_i64(&req.params, "categoryId")?;

    require_gradebook(conn, gradebook_id)?;
    require_category(conn, gradebook_id, category_id)?;

    let children = db::category_child_count(conn, category_id).map_err(HandlerErr::query)?;
    if children > 0 {
        return Err(HandlerErr::new(
            "not_empty",
            "move or delete the category's items and subcategories first",
        )
        .with_details(json!({ "children": children })));
    }

    guarded_mutation(conn, gradebook_id, "Cannot delete category", |tx| {
        let changed = tx
            .execute(
                "DELETE FROM grade_categories WHERE id = ? AND gradebook_id = ?",
                (category_id, gradebook_id),
            )
            .map_err(|e| {
                HandlerErr::new("db_delete_failed", e.to_string())
                    .with_details(json!({ "table": "grade_categories" }))
            })?;
        if changed == 0 {
            return Err(HandlerErr::new("not_found", "category not found"));
        }
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let r = match req.method.as_str() {
        "categories.list" => list_categories(state, req),
        "categories.create" => create_category(state, req),
        "categories.update" => update_category(state, req),
        "categories.delete" => delete_category(state, req),
        _ => return None,
    };
    Some(respond(&req.id, r))
}
