use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_i64, require_db, require_gradebook, respond};
use crate::ipc::types::{AppState, Request};
use crate::weights::{
    self, build_setup_tree, validate_gradebook_weights, CategoryRecord, ItemRecord, ROOT_LEVEL,
};
use rusqlite::Connection;
use serde_json::{json, Value};

fn load_records(
    state: &AppState,
    req: &Request,
) -> Result<(Vec<CategoryRecord>, Vec<ItemRecord>), HandlerErr> {
    let conn: &Connection = require_db(state)?;
    let gradebook_id = get_i64(&req.params, "gradebookId")?;
    require_gradebook(conn, gradebook_id)?;

    let categories = db::load_categories(conn, gradebook_id).map_err(HandlerErr::query)?;
    let items = db::load_items(conn, gradebook_id).map_err(HandlerErr::query)?;
    Ok((categories, items))
}

fn setup(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (categories, items) = load_records(state, req)?;
    let setup = weights::gradebook_setup(&categories, &items);
    Ok(json!({ "gradebookSetup": setup }))
}

fn setup_for_ui(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (categories, items) = load_records(state, req)?;
    let (setup, totals) = weights::gradebook_setup_for_ui(&categories, &items);
    Ok(json!({
        "gradebookSetupForUi": setup,
        "totals": totals,
    }))
}

fn validate(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (categories, items) = load_records(state, req)?;
    let tree = build_setup_tree(&categories, &items);
    validate_gradebook_weights(&tree, ROOT_LEVEL, "Invalid gradebook")?;
    Ok(json!({ "valid": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let r = match req.method.as_str() {
        "gradebook.setup" => setup(state, req),
        "gradebook.setupForUi" => setup_for_ui(state, req),
        "gradebook.validate" => validate(state, req),
        _ => return None,
    };
    Some(respond(&req.id, r))
}
