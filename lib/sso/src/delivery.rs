//! Handing the login result back to the browser.
//!
//! Compatibility mode redirects the whole page to the frontend. Standard
//! mode assumes the flow runs in a popup and posts the result to the
//! opener window before closing itself.

use crate::callback::CallbackMode;
use serde_json::json;
use url::form_urlencoded;

/// The value a callback produces.
#[derive(Clone, PartialEq, Eq)]
pub enum DeliveredValue {
    /// The external identifier, for linking an existing account.
    SsoId(String),
    /// A session token.
    Token(String),
}

impl std::fmt::Debug for DeliveredValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SsoId(id) => f.debug_tuple("SsoId").field(id).finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

impl DeliveredValue {
    /// Returns the JSON key and query parameter name for this value.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::SsoId(_) => "sso_id",
            Self::Token(_) => "token",
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::SsoId(v) | Self::Token(v) => v,
        }
    }

    fn frontend_path(&self) -> &'static str {
        match self {
            Self::SsoId(_) => "/@manage",
            Self::Token(_) => "/@login",
        }
    }
}

/// How the result reaches the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// 302 to `location`.
    Redirect { location: String },
    /// 200 `text/html` page that messages the opener window.
    Page { html: String },
}

/// Renders `value` for the given callback mode.
#[must_use]
pub fn render(value: &DeliveredValue, mode: CallbackMode, api_base: &str) -> Delivery {
    match mode {
        CallbackMode::Compatibility => Delivery::Redirect {
            location: redirect_location(value, api_base),
        },
        CallbackMode::Standard => Delivery::Page {
            html: popup_page(value),
        },
    }
}

fn redirect_location(value: &DeliveredValue, api_base: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair(value.key(), value.value())
        .finish();
    format!(
        "{}{}?{query}",
        api_base.trim_end_matches('/'),
        value.frontend_path()
    )
}

/// Serializes the postMessage payload so it is safe inside `<script>`.
#[must_use]
pub fn script_payload(value: &DeliveredValue) -> String {
    let mut payload = serde_json::Map::new();
    payload.insert(value.key().to_string(), json!(value.value()));
    serde_json::Value::Object(payload)
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn popup_page(value: &DeliveredValue) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n<script>\nwindow.opener.postMessage({}, \"*\");\nwindow.close();\n</script>\n</body>\n</html>\n",
        script_payload(value)
    )
}
