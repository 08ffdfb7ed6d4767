use super::*;
use crate::net::types::UserProfile;

fn alice() -> UserProfile {
    UserProfile {
        id: "u1".to_owned(),
        telegram_id: 1,
        first_name: "Alice".to_owned(),
        last_name: None,
        username: None,
        photo_url: None,
    }
}

#[test]
fn should_redirect_unauth_when_not_loading_and_user_missing() {
    let state = SessionState { user: None, is_loading: false };
    assert!(should_redirect_unauth(&state));
}

#[test]
fn should_not_redirect_while_loading() {
    let state = SessionState { user: None, is_loading: true };
    assert!(!should_redirect_unauth(&state));
}

#[test]
fn should_not_redirect_when_user_exists() {
    let state = SessionState { user: Some(alice()), is_loading: false };
    assert!(!should_redirect_unauth(&state));
}

#[test]
fn public_paths_match_exactly_modulo_slash_and_query() {
    let routes = ClientRoutes::default();
    assert!(routes.is_public("/"));
    assert!(routes.is_public("/login"));
    assert!(routes.is_public("/login/"));
    assert!(routes.is_public("/login?next=%2Fdashboard"));
    assert!(!routes.is_public("/login/extra"));
    assert!(!routes.is_public("/dashboard"));
    assert!(!routes.is_public("/loginx"));
}

#[test]
fn redirect_at_skips_public_paths() {
    let routes = ClientRoutes::default();
    let anon = SessionState::signed_out();
    assert!(should_redirect_unauth_at(&anon, "/dashboard", &routes));
    assert!(!should_redirect_unauth_at(&anon, "/login", &routes));
    assert!(!should_redirect_unauth_at(&SessionState::loading(), "/dashboard", &routes));
}

#[test]
fn default_routes_point_at_login_and_dashboard() {
    let routes = ClientRoutes::default();
    assert_eq!(routes.login_path, "/login");
    assert_eq!(routes.landing_path, "/dashboard");
    assert_eq!(routes.public_paths, vec!["/".to_owned(), "/login".to_owned()]);
}
