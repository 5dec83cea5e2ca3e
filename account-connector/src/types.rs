use account_oauth::credentials::Credentials;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One credential field in a connector's schema.
///
/// Hosts use the schema to render account forms and validate stored values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountField {
    /// Field name in the host's credential map
    pub key: String,

    pub title: String,

    /// Regular expression a valid value matches
    pub regexp: String,

    /// Filled by the interactive authorization flow rather than typed by the user
    pub interaction: bool,

    /// `regexp`, compiled on first use. `None` when the pattern is invalid.
    #[serde(skip)]
    compiled: OnceLock<Option<Regex>>,
}

impl AccountField {
    pub fn new(key: &str, title: &str, regexp: &str, interaction: bool) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            regexp: regexp.to_string(),
            interaction,
            compiled: OnceLock::new(),
        }
    }

    /// Whether `value` matches this field's pattern. An invalid pattern
    /// matches nothing.
    pub fn validate(&self, value: &str) -> bool {
        self.compiled
            .get_or_init(|| Regex::new(&self.regexp).ok())
            .as_ref()
            .is_some_and(|re| re.is_match(value))
    }
}

/// Balance of one currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    /// Confirmed amount, exactly as the provider reported it
    pub confirmed: String,
}

/// Balances keyed by lowercase currency code.
pub type Balances = BTreeMap<String, BalanceEntry>;

/// Query parameters of an interactive authorization request.
///
/// The first request carries none of these; the provider's callback carries
/// `code` and `state`, or `error` when the user declined.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct InteractionRequest {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl InteractionRequest {
    pub fn callback(code: &str, state: Option<&str>) -> Self {
        Self {
            code: Some(code.to_string()),
            state: state.map(str::to_string),
            ..Self::default()
        }
    }
}

/// Outcome of an interaction step.
#[derive(Clone, Debug)]
pub enum Interaction {
    /// Send the user to the provider; no fields yet
    Redirect { url: String },
    /// Authorization finished; these fields should be stored
    Complete(Credentials),
}

impl Interaction {
    pub fn is_pending(&self) -> bool {
        matches!(self, Interaction::Redirect { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_validation() {
        let field = AccountField::new("access_token_expires", "Expires", "^[0-9]+$", false);
        assert!(field.validate("1772366400"));
        assert!(!field.validate("soon"));
        assert!(!field.validate(""));
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        let field = AccountField::new("broken", "Broken", "(", false);
        assert!(!field.validate("anything"));
    }

    #[test]
    fn test_deserialized_field_validates() {
        let field: AccountField = serde_json::from_str(
            r#"{"key":"access_token","title":"Token","regexp":"^[^\\s]+$","interaction":false}"#,
        )
        .unwrap();
        assert!(field.validate("abc"));
        assert!(!field.validate("a b"));

        let copy = field.clone();
        assert!(copy.validate("abc"));
        assert!(!copy.validate(""));
    }

    #[test]
    fn test_balances_serialization() {
        let mut balances = Balances::new();
        balances.insert(
            "btc".to_string(),
            BalanceEntry {
                confirmed: "1.5".to_string(),
            },
        );

        let json = serde_json::to_string(&balances).unwrap();
        assert_eq!(json, r#"{"btc":{"confirmed":"1.5"}}"#);
    }

    #[test]
    fn test_interaction_request_deserialization() {
        // Callback
        let query = "code=auth_code_123&state=csrf_state_456";
        let request: InteractionRequest = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(request.code.as_deref(), Some("auth_code_123"));
        assert_eq!(request.state.as_deref(), Some("csrf_state_456"));
        assert!(request.error.is_none());

        // Declined
        let query = "error=access_denied&error_description=User+cancelled";
        let request: InteractionRequest = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(request.error.as_deref(), Some("access_denied"));
        assert_eq!(request.error_description.as_deref(), Some("User cancelled"));
        assert!(request.code.is_none());

        // First step
        let request: InteractionRequest = serde_urlencoded::from_str("").unwrap();
        assert!(request.code.is_none() && request.state.is_none());
    }
}
