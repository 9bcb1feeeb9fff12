use crate::handlers::{
    add_group_member, admin_login, admin_messages, admin_revenue, admin_test_sms, admin_users,
    admin_verify, create_contact, create_contacts_bulk, create_group, dashboard_stats,
    delete_contact, delete_group, get_app_settings, get_message, health_check,
    list_contacts, list_group_contacts, list_groups, list_messages, register,
    remove_group_member, root, send_sms, statistics, update_app_settings, update_contact,
    update_group, verify_otp, AppState,
};
use crate::middleware::{require_admin, require_user};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    let public = Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/admin/login", post(admin_login))
        .route("/admin/app-settings", get(get_app_settings));

    let user = Router::new()
        .route("/send-sms", post(send_sms))
        // Contacts
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/bulk", post(create_contacts_bulk))
        .route("/contacts/:id", put(update_contact).delete(delete_contact))
        // Groups
        .route("/contact-groups", get(list_groups).post(create_group))
        .route("/contact-groups/:id", put(update_group).delete(delete_group))
        .route("/contact-groups/:id/contacts", get(list_group_contacts))
        .route(
            "/contact-groups/:id/contacts/:contact_id",
            post(add_group_member).delete(remove_group_member),
        )
        // History
        .route("/messages", get(list_messages))
        .route("/messages/:id", get(get_message))
        .route("/statistics", get(statistics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let admin = Router::new()
        .route("/admin/auth/verify", get(admin_verify))
        .route("/admin/dashboard-stats", get(dashboard_stats))
        .route("/admin/users", get(admin_users))
        .route("/admin/messages", get(admin_messages))
        .route("/admin/revenue", get(admin_revenue))
        .route("/admin/app-settings", put(update_app_settings))
        .route("/admin/test-sms", post(admin_test_sms))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/auth", public.merge(user).merge(admin))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
