use super::*;

const PAYLOAD: &str = r#"{"id":42,"first_name":"Alice","username":"alice","auth_date":1700000000,"hash":"abc"}"#;

#[test]
fn script_attributes_follow_widget_contract() {
    let attrs = WidgetConfig::new("copytrade_bot").script_attributes();
    let get = |name: &str| attrs.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str());
    assert_eq!(get("data-telegram-login"), Some("copytrade_bot"));
    assert_eq!(get("data-size"), Some("large"));
    assert_eq!(get("data-radius"), Some("4"));
    assert_eq!(get("data-request-access"), Some("write"));
    assert_eq!(get("data-userpic"), Some("true"));
    assert_eq!(get("data-onauth"), Some("window.handleTelegramLogin(user)"));
}

#[test]
fn read_only_access_and_small_button() {
    let config = WidgetConfig {
        size: ButtonSize::Small,
        request_access: false,
        show_user_photo: false,
        ..WidgetConfig::new("bot")
    };
    let attrs = config.script_attributes();
    assert!(attrs.contains(&("data-size", "small".to_owned())));
    assert!(attrs.contains(&("data-request-access", "read".to_owned())));
    assert!(attrs.contains(&("data-userpic", "false".to_owned())));
}

#[test]
fn embed_html_escapes_attribute_values() {
    let html = WidgetConfig::new("bad\"bot<").embed_html();
    assert!(html.starts_with("<script async src=\"https://telegram.org/js/telegram-widget.js?22\""));
    assert!(html.contains("data-telegram-login=\"bad&quot;bot&lt;\""));
    assert!(html.ends_with("></script>"));
}

#[tokio::test]
async fn callback_payload_becomes_typed_event() {
    let (widget, mut rx) = register();
    assert_eq!(widget.callback_name(), "handleTelegramLogin");
    widget.on_callback(PAYLOAD).unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.assertion.id, 42);
    assert_eq!(event.assertion.username.as_deref(), Some("alice"));
    assert_eq!(event.assertion.hash, "abc");
}

#[test]
fn malformed_payload_is_rejected() {
    let (widget, _rx) = register();
    assert!(matches!(widget.on_callback("{\"id\":"), Err(WidgetError::Malformed(_))));
    let missing_hash = r#"{"id":42,"first_name":"Alice","auth_date":1700000000,"hash":""}"#;
    assert!(matches!(widget.on_callback(missing_hash), Err(WidgetError::MissingField("hash"))));
}

#[tokio::test]
async fn dropping_widget_ends_stream() {
    let (widget, mut rx) = register();
    drop(widget);
    assert!(rx.recv().await.is_none());
}

#[test]
fn callback_after_receiver_dropped_is_unregistered() {
    let (widget, rx) = register();
    drop(rx);
    assert!(matches!(widget.on_callback(PAYLOAD), Err(WidgetError::Unregistered)));
}
