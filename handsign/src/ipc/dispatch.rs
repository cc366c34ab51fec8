//! IPC message dispatch: parse s-expressions and route to handlers.

use std::path::Path;

use lexpr::Value;
use tracing::{debug, warn};

use crate::landmark::{Landmark, Pose};
use crate::persist;
use crate::session::Session;

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns the response s-expression.
pub fn handle_message(session: &mut Session, raw: &str) -> String {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("malformed s-expression: {}", e);
            return error_response(0, &format!("malformed s-expression: {e}"));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);
    debug!(msg_id, msg_type = ?msg_type, "dispatch");

    match msg_type.as_deref() {
        Some("ping") => ok_response(msg_id),
        Some("status") => handle_status(session, msg_id),
        Some("config") => handle_config(session, msg_id, &value),
        Some("normalize") => handle_normalize(session, msg_id, &value),
        Some("record") => handle_record(session, msg_id, &value),
        Some("classify") => handle_classify(session, msg_id, &value),
        Some("samples") => handle_samples(session, msg_id),
        Some("export") => handle_export(session, msg_id, &value),
        Some("load") => handle_load(session, msg_id, &value),
        Some("reset") => handle_reset(session, msg_id),
        Some(other) => error_response(msg_id, &format!("unknown message type: {other}")),
        None => error_response(msg_id, "missing :type field"),
    }
}

// ── Handlers ────────────────────────────────────────────────

fn handle_status(session: &mut Session, msg_id: i64) -> String {
    format!(
        "(:type :response :id {} :status :ok :matcher {})",
        msg_id,
        session.status_sexp()
    )
}

fn handle_config(session: &mut Session, msg_id: i64, value: &Value) -> String {
    if let Some(threshold) = get_float(value, "threshold") {
        let threshold_f32 = threshold as f32;
        if !threshold_f32.is_finite() || threshold_f32 < 0.0 {
            return error_response(msg_id, &format!("invalid :threshold {threshold}"));
        }
        session.matcher.config.threshold = threshold_f32;
    }
    format!(
        "(:type :response :id {} :status :ok :config {})",
        msg_id,
        session.matcher.config_sexp()
    )
}

fn handle_normalize(session: &mut Session, msg_id: i64, value: &Value) -> String {
    let pose = match get_pose(value) {
        Ok(p) => p,
        Err(reason) => return error_response(msg_id, &reason),
    };
    match session.normalize(&pose) {
        Ok(descriptor) => {
            let values: Vec<String> = descriptor.values().iter().map(|v| format!("{:.6}", v)).collect();
            format!(
                "(:type :response :id {} :status :ok :descriptor ({}))",
                msg_id,
                values.join(" ")
            )
        }
        Err(e) => error_response(msg_id, &e.to_string()),
    }
}

fn handle_record(session: &mut Session, msg_id: i64, value: &Value) -> String {
    let label = match get_string(value, "label") {
        Some(l) => l,
        None => return error_response(msg_id, "missing :label"),
    };
    let pose = match get_pose(value) {
        Ok(p) => p,
        Err(reason) => return error_response(msg_id, &reason),
    };
    match session.record(&label, &pose) {
        Ok(count) => format!(
            "(:type :response :id {} :status :ok :label \"{}\" :count {})",
            msg_id,
            escape_string(&label),
            count
        ),
        Err(e) => error_response(msg_id, &e.to_string()),
    }
}

fn handle_classify(session: &mut Session, msg_id: i64, value: &Value) -> String {
    let pose = match get_pose(value) {
        Ok(p) => p,
        Err(reason) => return error_response(msg_id, &reason),
    };
    match session.classify(&pose) {
        Ok(Some(m)) => format!(
            "(:type :response :id {} :status :ok :label \"{}\" :distance {:.4})",
            msg_id, m.label, m.distance
        ),
        Ok(None) => format!("(:type :response :id {} :status :ok :label nil)", msg_id),
        Err(e) => error_response(msg_id, &e.to_string()),
    }
}

fn handle_samples(session: &mut Session, msg_id: i64) -> String {
    format!(
        "(:type :response :id {} :status :ok :samples {})",
        msg_id,
        session.samples_sexp()
    )
}

fn handle_export(session: &mut Session, msg_id: i64, value: &Value) -> String {
    // Save before consuming the samples so a failed write loses nothing.
    if let Some(path) = get_string(value, "path") {
        let preview = session.samples().build_reference_set();
        if let Err(e) = persist::save_reference_set(Path::new(&path), &preview) {
            return error_response(msg_id, &e.to_string());
        }
    }

    let set = session.export();
    let labels: Vec<String> = set.labels().map(|l| format!("\"{}\"", l)).collect();
    let activate = get_bool(value, "activate").unwrap_or(false);
    if activate {
        session.load_reference(set);
    }
    format!(
        "(:type :response :id {} :status :ok :labels ({}) :active {})",
        msg_id,
        labels.join(" "),
        if activate { "t" } else { "nil" }
    )
}

fn handle_load(session: &mut Session, msg_id: i64, value: &Value) -> String {
    let path = match get_string(value, "path") {
        Some(p) => p,
        None => return error_response(msg_id, "missing :path"),
    };
    match persist::load_reference_set(Path::new(&path)) {
        Ok(set) => {
            let count = set.len();
            session.load_reference(set);
            format!(
                "(:type :response :id {} :status :ok :templates {})",
                msg_id, count
            )
        }
        Err(e) => error_response(msg_id, &e.to_string()),
    }
}

fn handle_reset(session: &mut Session, msg_id: i64) -> String {
    session.reset();
    ok_response(msg_id)
}

// ── Helpers ─────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Find the value following `:key` in an s-expression plist.
/// Handles both `Value::Keyword("key")` (elisp parser) and
/// `Value::Symbol(":key")` (default parser) forms.
fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Extract a keyword value from an s-expression plist as a string.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = get_value(value, key)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => (if *b { "t" } else { "nil" }).to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    })
}

/// Extract an integer value from an s-expression plist.
fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from an s-expression plist.
fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a boolean value from an s-expression plist.
/// Treats "t" as true, "nil" as false.
fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| s != "nil")
}

/// Extract a floating-point value from an s-expression plist.
fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Elements of a proper list, or `None` for anything else.
fn list_items(value: &Value) -> Option<Vec<&Value>> {
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            Value::Null => return Some(items),
            _ => return None,
        }
    }
}

fn as_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        _ => None,
    }
}

/// Parse `:landmarks ((x y z) ...)` into a validated pose.
fn get_pose(value: &Value) -> Result<Pose, String> {
    let raw = get_value(value, "landmarks").ok_or("missing :landmarks")?;
    let items = list_items(raw).ok_or(":landmarks must be a list")?;

    let mut landmarks = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let coords: Option<Vec<f32>> = list_items(item)
            .filter(|c| c.len() == 3)
            .and_then(|c| c.into_iter().map(as_f32).collect());
        match coords {
            Some(c) => landmarks.push(Landmark::new(c[0], c[1], c[2])),
            None => return Err(format!("landmark {i}: expected (x y z)")),
        }
    }
    Pose::from_landmarks(landmarks).map_err(|e| e.to_string())
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
fn landmarks_sexp(pose: &Pose) -> String {
    let items: Vec<String> = pose
        .landmarks()
        .iter()
        .map(|l| format!("({} {} {})", l.x, l.y, l.z))
        .collect();
    format!("({})", items.join(" "))
}
