use actix_web::{http::header, HttpResponse};
use tera::{Context, Tera};

use crate::errors::AppError;

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_templates(vec![
            ("payslip.html", include_str!("../templates/payslip.html")),
            (
                "compliance_report.html",
                include_str!("../templates/compliance_report.html"),
            ),
            ("welcome_email.html", include_str!("../templates/welcome_email.html")),
            (
                "leave_decision_email.html",
                include_str!("../templates/leave_decision_email.html"),
            ),
        ]) {
            log::error!("Parsing error(s): {}", e);
            ::std::process::exit(1);
        }
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

pub fn render(template: &str, context: &Context) -> Result<String, AppError> {
    TEMPLATES.render(template, context).map_err(|e| {
        log::error!("Failed to render template {}: {}", template, e);
        AppError::TemplateError(e)
    })
}

/// HTML report served as a file download.
pub fn html_attachment(html: String, file_name: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ))
        .body(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_parse() {
        let names: Vec<_> = TEMPLATES.get_template_names().collect();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn welcome_mail_escapes_input() {
        let mut context = Context::new();
        context.insert(
            "tenant",
            &serde_json::json!({ "display_name": "<b>Acme</b>", "name": "acme" }),
        );
        context.insert("admin_email", "admin@acme.test");
        let html = render("welcome_email.html", &context).unwrap();
        assert!(html.contains("&lt;b&gt;Acme&lt;&#x2F;b&gt;"));
        assert!(html.contains("admin@acme.test"));
    }
}
