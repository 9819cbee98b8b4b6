use actix_web::web;

pub mod attendance;
pub mod auth;
pub mod compliance;
pub mod employees;
pub mod exits;
pub mod leave;
pub mod org;
pub mod payroll;
pub mod performance;
pub mod recruitment;
pub mod tenants;
pub mod training;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::admin_login_handler)
        .service(auth::login_handler)
        .service(auth::me_handler)
        .service(auth::change_password_handler)
        .service(auth::list_users_handler)
        .service(auth::create_user_handler)
        .service(auth::update_user_handler)
        // master registry
        .service(tenants::onboard_tenant_handler)
        .service(tenants::list_tenants_handler)
        .service(tenants::get_tenant_handler)
        .service(tenants::update_tenant_handler)
        .service(tenants::audit_logs_handler)
        .service(tenants::error_logs_handler)
        // organization
        .service(org::list_departments_handler)
        .service(org::get_department_handler)
        .service(org::create_department_handler)
        .service(org::update_department_handler)
        .service(org::delete_department_handler)
        .service(org::list_shifts_handler)
        .service(org::get_shift_handler)
        .service(org::create_shift_handler)
        .service(org::update_shift_handler)
        .service(org::delete_shift_handler)
        .service(org::list_roster_handler)
        .service(org::assign_roster_handler)
        .service(org::delete_roster_handler)
        .service(org::list_holidays_handler)
        .service(org::create_holiday_handler)
        .service(org::delete_holiday_handler)
        // employees
        .service(employees::list_employees_handler)
        .service(employees::get_employee_handler)
        .service(employees::create_employee_handler)
        .service(employees::update_employee_handler)
        .service(employees::delete_employee_handler)
        .service(employees::upload_document_handler)
        .service(employees::list_documents_handler)
        .service(employees::download_document_handler)
        .service(employees::delete_document_handler)
        .configure(employees::configure_satellites)
        // attendance
        .service(attendance::punch_in_handler)
        .service(attendance::punch_out_handler)
        .service(attendance::attendance_summary_handler)
        .service(attendance::list_attendance_handler)
        .service(attendance::regularize_handler)
        // leave
        .service(leave::list_leave_types_handler)
        .service(leave::create_leave_type_handler)
        .service(leave::update_leave_type_handler)
        .service(leave::delete_leave_type_handler)
        .service(leave::list_balances_handler)
        .service(leave::set_balance_handler)
        .service(leave::list_applications_handler)
        .service(leave::get_application_handler)
        .service(leave::apply_leave_handler)
        .service(leave::approve_leave_handler)
        .service(leave::reject_leave_handler)
        .service(leave::cancel_leave_handler)
        // payroll
        .service(payroll::get_structure_handler)
        .service(payroll::upsert_structure_handler)
        .service(payroll::list_adjustments_handler)
        .service(payroll::create_adjustment_handler)
        .service(payroll::delete_adjustment_handler)
        .service(payroll::run_payroll_handler)
        .service(payroll::list_runs_handler)
        .service(payroll::get_run_handler)
        .service(payroll::payslip_handler)
        .service(payroll::email_payslip_handler)
        // recruitment
        .service(recruitment::list_jobs_handler)
        .service(recruitment::get_job_handler)
        .service(recruitment::create_job_handler)
        .service(recruitment::update_job_handler)
        .service(recruitment::delete_job_handler)
        .service(recruitment::list_candidates_handler)
        .service(recruitment::create_candidate_handler)
        .service(recruitment::get_candidate_handler)
        .service(recruitment::change_stage_handler)
        .service(recruitment::hire_candidate_handler)
        .service(recruitment::list_interviews_handler)
        .service(recruitment::schedule_interview_handler)
        .service(recruitment::interview_feedback_handler)
        // training
        .service(training::list_programs_handler)
        .service(training::get_program_handler)
        .service(training::create_program_handler)
        .service(training::update_program_handler)
        .service(training::delete_program_handler)
        .service(training::list_enrollments_handler)
        .service(training::enroll_handler)
        .service(training::complete_enrollment_handler)
        .service(training::drop_enrollment_handler)
        // performance
        .service(performance::list_goals_handler)
        .service(performance::create_goal_handler)
        .service(performance::update_progress_handler)
        .service(performance::delete_goal_handler)
        .service(performance::list_reviews_handler)
        .service(performance::create_review_handler)
        .service(performance::update_review_handler)
        .service(performance::submit_review_handler)
        .service(performance::acknowledge_review_handler)
        .service(performance::performance_summary_handler)
        // exits
        .service(exits::list_exits_handler)
        .service(exits::get_exit_handler)
        .service(exits::resign_handler)
        .service(exits::approve_exit_handler)
        .service(exits::withdraw_exit_handler)
        .service(exits::complete_exit_handler)
        // compliance
        .service(compliance::statutory_summary_handler)
        .service(compliance::statutory_report_handler)
        .service(compliance::list_filings_handler)
        .service(compliance::create_filing_handler)
        .service(compliance::delete_filing_handler);
}

#[cfg(test)]
mod tests {
    use actix_web::{
        http::StatusCode,
        middleware,
        test::{self, TestRequest},
        web::{self, Data},
        App, HttpResponse,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::configure;
    use crate::{auth::Role, config::Config, errors::AppError, tenancy::TENANT_HEADER, AppState};

    const ROOT_EMAIL: &str = "root@example.com";
    const ROOT_PASSWORD: &str = "Sup3r$ecretPass";
    const TENANT_PASSWORD: &str = "Adm1n#Password";

    async fn app_state() -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init(Config::for_tests(dir.path())).await.unwrap();
        (dir, state)
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::new($state.clone()))
                    .app_data(crate::json_config())
                    .configure(configure),
            )
            .await
        };
    }

    macro_rules! bearer {
        ($app:expr, $uri:expr, $body:expr) => {{
            let req = TestRequest::post().uri($uri).set_json($body).to_request();
            let res: Value = test::call_and_read_body_json(&$app, req).await;
            format!("Bearer {}", res["access_token"].as_str().unwrap())
        }};
    }

    /// Onboards `$name` as the root admin and returns the tenant admin's bearer token.
    macro_rules! onboard {
        ($app:expr, $name:expr) => {{
            let root = bearer!(
                $app,
                "/admin/login",
                json!({ "email": ROOT_EMAIL, "password": ROOT_PASSWORD })
            );
            let req = TestRequest::post()
                .uri("/tenants")
                .insert_header(("Authorization", root.clone()))
                .set_json(json!({
                    "name": $name,
                    "display_name": "Acme Industries",
                    "admin_email": format!("admin@{}.test", $name),
                    "admin_password": TENANT_PASSWORD,
                }))
                .to_request();
            let res = test::call_service(&$app, req).await;
            assert_eq!(res.status(), StatusCode::CREATED);
            let admin = bearer!(
                $app,
                "/auth/login",
                json!({
                    "tenant": $name,
                    "email": format!("admin@{}.test", $name),
                    "password": TENANT_PASSWORD,
                })
            );
            (root, admin)
        }};
    }

    #[actix_web::test]
    async fn department_is_listed_once_after_create() {
        let (_dir, state) = app_state().await;
        let app = test_app!(state);
        let (_, admin) = onboard!(app, "acme");

        let req = TestRequest::post()
            .uri("/departments")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({ "name": "Engineering", "code": "ENG" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created["name"], "Engineering");

        let req = TestRequest::get()
            .uri("/departments")
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let listed: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        let matches = listed.iter().filter(|d| d["name"] == "Engineering").count();
        assert_eq!(matches, 1);

        let req = TestRequest::get()
            .uri("/audit-logs?entity=department")
            .insert_header(("Authorization", admin))
            .to_request();
        let logs: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["tenant"], "acme");
        assert_eq!(logs[0]["action"], "create");
    }

    #[actix_web::test]
    async fn deleted_employee_is_gone() {
        let (_dir, state) = app_state().await;
        let app = test_app!(state);
        let (_, admin) = onboard!(app, "acme");

        let req = TestRequest::post()
            .uri("/employees")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({
                "employee_code": "E001",
                "first_name": "Asha",
                "last_name": "Rao",
                "email": "asha@acme.test",
                "date_of_joining": "2024-04-01",
            }))
            .to_request();
        let employee: Value = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/employees/{}", employee["id"]);

        let req = TestRequest::post()
            .uri(&format!("{uri}/skills"))
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({ "name": "Rust", "proficiency": "Expert" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = TestRequest::delete()
            .uri(&uri)
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = TestRequest::get()
            .uri(&uri)
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = TestRequest::get()
            .uri(&format!("{uri}/skills"))
            .insert_header(("Authorization", admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn leave_over_balance_is_rejected() {
        let (_dir, state) = app_state().await;
        let app = test_app!(state);
        let (_, admin) = onboard!(app, "acme");

        let req = TestRequest::post()
            .uri("/employees")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({
                "employee_code": "E002",
                "first_name": "Ravi",
                "last_name": "Kumar",
                "email": "ravi@acme.test",
                "date_of_joining": "2024-01-15",
            }))
            .to_request();
        let employee: Value = test::call_and_read_body_json(&app, req).await;

        let req = TestRequest::post()
            .uri("/leave/types")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({ "name": "Casual", "code": "CL", "annual_quota": 12.0 }))
            .to_request();
        let leave_type: Value = test::call_and_read_body_json(&app, req).await;

        let req = TestRequest::put()
            .uri("/leave/balances")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({
                "employee_id": employee["id"],
                "leave_type_id": leave_type["id"],
                "year": 2025,
                "allocated": 2.0,
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        // Monday to Wednesday: three chargeable days against two allocated.
        let req = TestRequest::post()
            .uri("/leave/applications")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({
                "employee_id": employee["id"],
                "leave_type_id": leave_type["id"],
                "start_date": "2025-03-03",
                "end_date": "2025-03-05",
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = TestRequest::get()
            .uri(&format!("/leave/balances?employee_id={}&year=2025", employee["id"]))
            .insert_header(("Authorization", admin))
            .to_request();
        let balances: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0]["allocated"], 2.0);
        assert_eq!(balances[0]["used"], 0.0);
    }

    #[actix_web::test]
    async fn tenant_header_rules() {
        let (_dir, state) = app_state().await;
        let app = test_app!(state);
        let (root, admin) = onboard!(app, "acme");

        let req = TestRequest::get()
            .uri("/departments")
            .insert_header(("Authorization", root.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = TestRequest::get()
            .uri("/departments")
            .insert_header(("Authorization", root.clone()))
            .insert_header((TENANT_HEADER, "acme"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = TestRequest::get()
            .uri("/departments")
            .insert_header(("Authorization", admin.clone()))
            .insert_header((TENANT_HEADER, "globex"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::get()
            .uri("/tenants")
            .insert_header(("Authorization", admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::get().uri("/departments").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    /// Creates a tenant user with `$role` and returns (user id, bearer token).
    macro_rules! tenant_user {
        ($app:expr, $admin:expr, $email:expr, $role:expr) => {{
            let req = TestRequest::post()
                .uri("/users")
                .insert_header(("Authorization", $admin.clone()))
                .set_json(json!({ "email": $email, "password": TENANT_PASSWORD, "role": $role }))
                .to_request();
            let user: Value = test::call_and_read_body_json(&$app, req).await;
            let token = bearer!(
                $app,
                "/auth/login",
                json!({ "tenant": "acme", "email": $email, "password": TENANT_PASSWORD })
            );
            (user["id"].as_i64().unwrap(), token)
        }};
    }

    #[actix_web::test]
    async fn demoted_user_loses_rights_on_old_token() {
        let (_dir, state) = app_state().await;
        let app = test_app!(state);
        let (_, admin) = onboard!(app, "acme");
        let (hr_id, hr) = tenant_user!(app, admin, "hr@acme.test", "hr");

        let req = TestRequest::post()
            .uri("/departments")
            .insert_header(("Authorization", hr.clone()))
            .set_json(json!({ "name": "Finance" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = TestRequest::put()
            .uri(&format!("/users/{hr_id}"))
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({ "role": "employee" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = TestRequest::post()
            .uri("/departments")
            .insert_header(("Authorization", hr.clone()))
            .set_json(json!({ "name": "Legal" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::get()
            .uri("/auth/me")
            .insert_header(("Authorization", hr))
            .to_request();
        let me: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(me["role"], "employee");
    }

    #[actix_web::test]
    async fn disabled_account_is_refused_on_token_routes() {
        let (_dir, state) = app_state().await;
        let app = test_app!(state);
        let (_, admin) = onboard!(app, "acme");
        let (other_id, other) = tenant_user!(app, admin, "ops@acme.test", "admin");

        let req = TestRequest::get()
            .uri("/audit-logs")
            .insert_header(("Authorization", other.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = TestRequest::put()
            .uri(&format!("/users/{other_id}"))
            .insert_header(("Authorization", admin))
            .set_json(json!({ "is_active": false }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = TestRequest::get()
            .uri("/audit-logs")
            .insert_header(("Authorization", other.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = TestRequest::post()
            .uri("/auth/change-password")
            .insert_header(("Authorization", other))
            .set_json(json!({
                "current_password": TENANT_PASSWORD,
                "new_password": "N3w#Password!",
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn server_errors_land_in_error_log() {
        let (_dir, state) = app_state().await;
        let app = test::init_service(
            App::new()
                .wrap(middleware::from_fn(crate::audit::error_log_middleware))
                .app_data(Data::new(state.clone()))
                .app_data(crate::json_config())
                .configure(configure)
                .route(
                    "/boom",
                    web::get().to(|| async { Err::<HttpResponse, AppError>(AppError::InternalServerError) }),
                ),
        )
        .await;

        let req = TestRequest::get()
            .uri("/boom")
            .insert_header((TENANT_HEADER, "acme"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let req = TestRequest::get().uri("/departments").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let root = bearer!(
            app,
            "/admin/login",
            json!({ "email": ROOT_EMAIL, "password": ROOT_PASSWORD })
        );
        let req = TestRequest::get()
            .uri("/error-logs")
            .insert_header(("Authorization", root))
            .to_request();
        let logs: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["path"], "/boom");
        assert_eq!(logs[0]["method"], "GET");
        assert_eq!(logs[0]["status"], 500);
        assert_eq!(logs[0]["tenant"], "acme");
        assert_eq!(logs[0]["message"], "Internal server error");
    }

    #[actix_web::test]
    async fn failed_onboarding_leaves_no_tenant_behind() {
        let (dir, state) = app_state().await;
        let app = test_app!(state);

        // A stale database already holding the admin account makes onboarding fail midway.
        let stale = state.tenants.provision("tenant_acme").await.unwrap();
        crate::db::users::create_user(&stale, "admin@acme.test", TENANT_PASSWORD, Role::Admin, None)
            .await
            .unwrap();

        let root = bearer!(
            app,
            "/admin/login",
            json!({ "email": ROOT_EMAIL, "password": ROOT_PASSWORD })
        );
        let req = TestRequest::post()
            .uri("/tenants")
            .insert_header(("Authorization", root.clone()))
            .set_json(json!({
                "name": "acme",
                "display_name": "Acme Industries",
                "admin_email": "admin@acme.test",
                "admin_password": TENANT_PASSWORD,
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = TestRequest::get()
            .uri("/tenants")
            .insert_header(("Authorization", root))
            .to_request();
        let tenants: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert!(tenants.is_empty());
        assert!(!dir.path().join("tenants/tenant_acme.db").exists());

        let (_, admin) = onboard!(app, "acme");
        let req = TestRequest::get()
            .uri("/users")
            .insert_header(("Authorization", admin))
            .to_request();
        let users: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(users.len(), 1);
    }

    #[actix_web::test]
    async fn duplicate_tenant_is_a_conflict() {
        let (_dir, state) = app_state().await;
        let app = test_app!(state);
        let (root, _) = onboard!(app, "acme");

        let req = TestRequest::post()
            .uri("/tenants")
            .insert_header(("Authorization", root))
            .set_json(json!({
                "name": "acme",
                "display_name": "Acme Again",
                "admin_email": "other@acme.test",
                "admin_password": TENANT_PASSWORD,
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
    }
}
