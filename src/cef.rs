//! CEF audit lines for receipt activity. Lines go through `tracing` under
//! the `cef` target so deployments can route them to a dedicated appender.

use tracing::info;

use crate::constants::{CEF_PRODUCT, CEF_VENDOR};

pub(crate) const SIG_VERIFY: &str = "RECEIPT_VERIFY";
pub(crate) const SIG_SIGN: &str = "RECEIPT_SIGN";

pub(crate) fn emit(
    signature: &str,
    name: &str,
    severity: u8,
    app_id: Option<i64>,
    reason: Option<&str>,
) {
    info!(target: "cef", "{}", format_line(signature, name, severity, app_id, reason));
}

/// `CEF:0|vendor|product|version|signature|name|severity|extensions`.
fn format_line(
    signature: &str,
    name: &str,
    severity: u8,
    app_id: Option<i64>,
    reason: Option<&str>,
) -> String {
    let mut line = format!(
        "CEF:0|{CEF_VENDOR}|{CEF_PRODUCT}|{}|{signature}|{name}|{severity}|",
        env!("CARGO_PKG_VERSION"),
    );
    let mut extensions = Vec::new();
    if let Some(app_id) = app_id {
        extensions.push(format!("cs1Label=receiptAppId cs1={app_id}"));
    }
    match reason {
        Some(reason) if !reason.is_empty() => extensions.push(format!("msg={reason}")),
        _ => {}
    }
    line.push_str(&extensions.join(" "));
    line
}
