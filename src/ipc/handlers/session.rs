use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_opt_parsed, get_opt_str, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::session::{self, Registration};
use serde_json::json;

fn session_register(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let reg = Registration {
        user_id: get_opt_str(params, "userId")?,
        email: get_opt_str(params, "email")?.unwrap_or_default(),
        first_name: get_opt_str(params, "firstName")?.unwrap_or_default(),
        last_name: get_opt_str(params, "lastName")?.unwrap_or_default(),
        role: get_opt_parsed(params, "role")?,
    };
    let user_id = session::register(conn, &reg)?;
    Ok(json!({ "userId": user_id }))
}

fn session_sign_in(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let signed_in = session::sign_in(require_db(state)?, &user_id)?;
    // A new identity never inherits the previous user's attendance view.
    state.end_session();
    let result = json!({
        "session": signed_in,
        "views": signed_in.views(),
    });
    state.session = Some(signed_in);
    Ok(result)
}

fn session_sign_out(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if let Some(s) = state.session.as_ref() {
        tracing::info!(user_id = %s.user_id, "signed out");
    }
    state.end_session();
    Ok(json!({ "ok": true }))
}

fn session_current(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "session": state.session }))
}

fn session_views(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let views = state.session.as_ref().map(|s| s.views()).unwrap_or_default();
    Ok(json!({
        "role": state.session.as_ref().and_then(|s| s.role),
        "views": views,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "session.register" => session_register(state, &req.params),
        "session.signIn" => session_sign_in(state, &req.params),
        "session.signOut" => session_sign_out(state),
        "session.current" => session_current(state),
        "session.views" => session_views(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
