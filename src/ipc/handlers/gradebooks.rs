use crate::db;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_name, require_db, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_gradebooks_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "gradebooks": [] }));
    };
    let r = db::list_gradebooks(conn)
        .map(|rows| {
            let gradebooks: Vec<Value> = rows
                .into_iter()
                .map(|(id, name)| json!({ "id": id, "name": name }))
                .collect();
            json!({ "gradebooks": gradebooks })
        })
        .map_err(HandlerErr::query);
    respond(&req.id, r)
}

fn create_gradebook(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let name = get_name(&req.params, "name")?;
    let id = db::create_gradebook(conn, &name).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string())
            .with_details(json!({ "table": "gradebooks" }))
    })?;
    Ok(json!({ "gradebookId": id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "gradebooks.list" => Some(handle_gradebooks_list(state, req)),
        "gradebooks.create" => Some(respond(&req.id, create_gradebook(state, req))),
        _ => None,
    }
}
