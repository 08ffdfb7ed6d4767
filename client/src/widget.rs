//! Telegram login widget adapter.
//!
//! The widget reports a login by calling a globally registered function.
//! This module is the only place that knows that function's name; it turns
//! each callback payload into a typed [`AssertionReceived`] event on a
//! channel, so the rest of the client never touches the global hook.

#[cfg(test)]
#[path = "widget_test.rs"]
mod widget_test;

use std::fmt::Write as _;

use tokio::sync::mpsc;

use crate::net::types::IdentityAssertion;

/// Global function the widget invokes on successful authorization.
pub const CALLBACK_NAME: &str = "handleTelegramLogin";
pub const WIDGET_SCRIPT_URL: &str = "https://telegram.org/js/telegram-widget.js?22";

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("widget payload is not a valid identity assertion: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("widget payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("widget callback is no longer registered")]
    Unregistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonSize {
    #[default]
    Large,
    Medium,
    Small,
}

impl ButtonSize {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Large => "large",
            Self::Medium => "medium",
            Self::Small => "small",
        }
    }
}

/// Presentation options for the embedded login button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub bot_name: String,
    pub size: ButtonSize,
    pub corner_radius: u8,
    /// Ask for permission to message the user.
    pub request_access: bool,
    pub show_user_photo: bool,
}

impl WidgetConfig {
    #[must_use]
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            size: ButtonSize::default(),
            corner_radius: 4,
            request_access: true,
            show_user_photo: true,
        }
    }

    /// `data-*` attributes for the widget `<script>` tag, in emission order.
    #[must_use]
    pub fn script_attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("data-telegram-login", self.bot_name.clone()),
            ("data-size", self.size.as_str().to_owned()),
            ("data-radius", self.corner_radius.to_string()),
            ("data-request-access", (if self.request_access { "write" } else { "read" }).to_owned()),
            ("data-userpic", self.show_user_photo.to_string()),
            ("data-onauth", format!("window.{CALLBACK_NAME}(user)")),
        ]
    }

    /// The `<script>` tag that renders the login button.
    #[must_use]
    pub fn embed_html(&self) -> String {
        let mut html = format!("<script async src=\"{}\"", escape_attr(WIDGET_SCRIPT_URL));
        for (name, value) in self.script_attributes() {
            let _ = write!(html, " {name}=\"{}\"", escape_attr(&value));
        }
        html.push_str("></script>");
        html
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// A login reported by the widget. Unverified until the backend checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionReceived {
    pub assertion: IdentityAssertion,
}

/// Registered callback handle. Dropping it unregisters the callback and
/// ends the event stream.
pub struct TelegramWidget {
    tx: mpsc::UnboundedSender<AssertionReceived>,
}

/// Register the widget callback and return the event stream it feeds.
#[must_use]
pub fn register() -> (TelegramWidget, mpsc::UnboundedReceiver<AssertionReceived>) {
    let (tx, rx) = mpsc::unbounded_channel();
    tracing::debug!(callback = CALLBACK_NAME, "widget callback registered");
    (TelegramWidget { tx }, rx)
}

impl TelegramWidget {
    #[must_use]
    pub fn callback_name(&self) -> &'static str {
        CALLBACK_NAME
    }

    /// Entry point for the widget's `user` object, as raw JSON.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Malformed`] / [`WidgetError::MissingField`] for a bad
    /// payload, [`WidgetError::Unregistered`] when nobody is listening.
    pub fn on_callback(&self, raw_json: &str) -> Result<(), WidgetError> {
        let assertion: IdentityAssertion = serde_json::from_str(raw_json)?;
        assertion.check_shape().map_err(WidgetError::MissingField)?;
        tracing::debug!(telegram_id = assertion.id, "widget reported login");
        self.tx
            .send(AssertionReceived { assertion })
            .map_err(|_| WidgetError::Unregistered)
    }
}
