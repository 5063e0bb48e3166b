//! Route handlers, grouped by resource.

pub(crate) mod library;
pub(crate) mod memories;
pub(crate) mod naming;
pub(crate) mod waitlist;

use serde_json::{json, Value};

pub(crate) fn success() -> Value {
    json!({ "success": true })
}
