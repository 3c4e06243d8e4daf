use actix_web::{web, HttpResponse, Responder};

use super::activities::activities_handlers;
use super::admin::admin_handlers;
use super::associations::associations_handlers;
use super::contacts::contacts_handlers;
use super::groups::groups_handlers;
use super::import::import_handlers;
use super::login::login_handlers;
use super::municipalities::municipalities_handlers;
use super::notes::notes_handlers;
use super::tags::tags_handlers;
use super::tasks::tasks_handlers;

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn health_configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health)).route("/health", web::get().to(health));
}

pub fn admin_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/sessions/reset", web::post().to(admin_handlers::session_reset))
            .route("/users", web::get().to(admin_handlers::list_users))
            .route("/users/{id}/role", web::put().to(admin_handlers::update_role)),
    );
}

pub fn login_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-login")
            .route("/register", web::post().to(login_handlers::register))
            .route("/login", web::post().to(login_handlers::login))
            .route("/logout", web::post().to(login_handlers::logout))
            .route("/session", web::get().to(login_handlers::session)),
    );
}

pub fn associations_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-associations")
            .route("", web::get().to(associations_handlers::list_associations))
            .route("", web::post().to(associations_handlers::create_association))
            .route("/{id}", web::get().to(associations_handlers::get_association))
            .route("/{id}", web::put().to(associations_handlers::update_association))
            .route("/{id}", web::delete().to(associations_handlers::delete_association)),
    );
}

pub fn contacts_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-contacts")
            .route("", web::get().to(contacts_handlers::list_contacts))
            .route("", web::post().to(contacts_handlers::create_contact))
            .route("/{id}", web::put().to(contacts_handlers::update_contact))
            .route("/{id}", web::delete().to(contacts_handlers::delete_contact)),
    );
}

pub fn tags_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-tags")
            .route("", web::get().to(tags_handlers::list_tags))
            .route("", web::post().to(tags_handlers::create_tag))
            .route("/attach", web::post().to(tags_handlers::attach_tag))
            .route("/detach", web::post().to(tags_handlers::detach_tag)),
    );
}

pub fn groups_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-groups")
            .route("", web::get().to(groups_handlers::list_groups))
            .route("", web::post().to(groups_handlers::create_group))
            .route("/{id}/members", web::post().to(groups_handlers::add_member))
            .route("/{id}/members/{association_id}", web::delete().to(groups_handlers::remove_member)),
    );
}

pub fn notes_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-notes")
            .route("", web::get().to(notes_handlers::list_notes))
            .route("", web::post().to(notes_handlers::create_note)),
    );
}

pub fn tasks_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-tasks")
            .route("", web::get().to(tasks_handlers::list_tasks))
            .route("", web::post().to(tasks_handlers::create_task))
            .route("/{id}/complete", web::put().to(tasks_handlers::complete_task)),
    );
}

pub fn activities_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api-activities").route("", web::get().to(activities_handlers::list_activities)));
}

pub fn municipalities_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-municipalities")
            .route("", web::get().to(municipalities_handlers::list_municipalities))
            .route("/{id}", web::get().to(municipalities_handlers::get_municipality))
            .route("/{id}/scrape-runs", web::get().to(municipalities_handlers::list_scrape_runs))
            .route("/{id}/import-batches", web::get().to(municipalities_handlers::list_import_batches)),
    );
}

pub fn import_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api-import")
            .route("", web::post().to(import_handlers::import))
            .route("/check", web::post().to(import_handlers::check)),
    );
}

// Everything the HTTP server exposes
pub fn configure_all(cfg: &mut web::ServiceConfig) {
    cfg.configure(health_configure)
        .configure(login_configure)
        .configure(admin_configure)
        .configure(associations_configure)
        .configure(contacts_configure)
        .configure(tags_configure)
        .configure(groups_configure)
        .configure(notes_configure)
        .configure(tasks_configure)
        .configure(activities_configure)
        .configure(municipalities_configure)
        .configure(import_configure);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use sqlx::mysql::MySqlPoolOptions;

    #[actix_web::test]
    async fn health_answers_without_a_database() {
        let app = test::init_service(App::new().configure(health_configure)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }

    // A lazy pool never connects, so requests rejected before any query still work
    #[actix_web::test]
    async fn protected_routes_require_a_session_cookie() {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .configure(associations_configure)
                .configure(tags_configure),
        )
        .await;

        for uri in ["/api-associations", "/api-tags"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn unknown_scope_is_not_found() {
        let app = test::init_service(App::new().configure(health_configure)).await;
        let req = test::TestRequest::get().uri("/api-projects").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
