//! User-Agent string for transfer HTTP clients.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://www.frostwire.com";

/// Default User-Agent for transfer requests.
#[must_use]
pub(crate) fn default_transfer_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("fw-transfers/{version} (+{PROJECT_UA_URL})")
}
