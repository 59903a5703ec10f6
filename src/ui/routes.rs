//! # Web Server Routes for the Translator UI
//!
//! One page with an input box, a "Translate" button and an output box. The
//! button posts the form back to `/translate`, which re-renders the page with
//! the translation filled in, or with an error dialog when the input is empty.
//! `/api/translate` offers the same action as JSON.

use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer};
use html_escape::encode_text;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::error::TranslatorError;
use crate::text_generator::Translator;

pub const WINDOW_TITLE: &str = "Language Translator";

#[derive(Deserialize, Serialize, Debug)]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum TranslateResponse {
    Translation { translation: String },
    Error { error: String },
}

/// Renders the whole page.
///
/// `input` and `output` go into the two text boxes; `error`, when present,
/// becomes a modal dialog shown on load. All three are HTML-escaped.
pub fn render_page(input: &str, output: &str, error: Option<&str>) -> String {
    let dialog = match error {
        Some(message) => format!(
            r#"<dialog id="error-dialog"><h2>Error</h2><p>{}</p><form method="dialog"><button>OK</button></form></dialog>
    <script>document.getElementById("error-dialog").showModal();</script>"#,
            encode_text(message)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        body {{ width: 500px; margin: 0 auto; font-family: sans-serif; text-align: center; }}
        label, textarea, button {{ display: block; margin: 5px auto; }}
    </style>
</head>
<body>
    <form method="post" action="/translate">
        <label for="input-text">Enter English Sentence:</label>
        <textarea id="input-text" name="text" rows="5" cols="50">{input}</textarea>
        <button type="submit">Translate</button>
    </form>
    <label for="output-text">Translated Portuguese Sentence:</label>
    <textarea id="output-text" rows="5" cols="50">{output}</textarea>
    {dialog}
</body>
</html>
"#,
        title = WINDOW_TITLE,
        input = encode_text(input),
        output = encode_text(output),
        dialog = dialog,
    )
}

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status).content_type("text/html; charset=utf-8").body(body)
}

fn status_for(err: &TranslatorError) -> StatusCode {
    match err {
        TranslatorError::EmptyInput => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `GET /`: the empty window.
pub async fn index() -> HttpResponse {
    html(StatusCode::OK, render_page("", "", None))
}

/// `POST /translate`: the "Translate" button.
pub async fn translate_form(translator: web::Data<Translator>, form: web::Form<TranslateRequest>) -> HttpResponse {
    let text = form.into_inner().text;
    match translator.translate(&text) {
        Ok(translation) => html(StatusCode::OK, render_page(&text, &translation, None)),
        Err(e) => {
            if !matches!(e, TranslatorError::EmptyInput) {
                error!("Translation failed for '{}': {}", text, e);
            }
            html(status_for(&e), render_page(&text, "", Some(&e.to_string())))
        }
    }
}

/// `POST /api/translate`: JSON variant of the button.
pub async fn translate_api(translator: web::Data<Translator>, body: web::Json<TranslateRequest>) -> HttpResponse {
    match translator.translate(&body.text) {
        Ok(translation) => HttpResponse::Ok().json(TranslateResponse::Translation { translation }),
        Err(e) => {
            if !matches!(e, TranslatorError::EmptyInput) {
                error!("Translation failed for '{}': {}", body.text, e);
            }
            HttpResponse::build(status_for(&e)).json(TranslateResponse::Error { error: e.to_string() })
        }
    }
}

/// Registers every route. Shared by [`run_server`] and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/translate", web::post().to(translate_form))
        .route("/api/translate", web::post().to(translate_api));
}

/// Initializes and runs the Actix web server until it is stopped.
///
/// # Returns
/// `Err` if binding to `host:port` fails or the server stops with an IO error.
pub async fn run_server(translator: Translator, config: &ServerConfig) -> std::io::Result<()> {
    let translator = web::Data::new(translator);
    info!("Starting server at http://{}:{}/", config.host, config.port);

    HttpServer::new(move || App::new().app_data(translator.clone()).configure(configure))
        .workers(config.workers.max(1))
        .bind((config.host.as_str(), config.port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, TrainingConfig, TranslatorConfig};
    use crate::dataset::{PreparedCorpus, SentencePair};
    use actix_web::test as actix_test;

    fn translator() -> Translator {
        let pairs = vec![SentencePair::new("hello", "olá"), SentencePair::new("good night", "boa noite")];
        let config = TranslatorConfig {
            model: ModelConfig { embedding_dim: 4, hidden_dim: 8 },
            training: TrainingConfig { epochs: 1, ..TrainingConfig::default() },
            ..TranslatorConfig::default()
        };
        Translator::train(PreparedCorpus::build(&pairs).unwrap(), &config).unwrap().0
    }

    #[test]
    fn test_render_page_escapes_text() {
        let page = render_page("<b>hi</b> & bye", "", None);
        assert!(page.contains("&lt;b&gt;hi&lt;/b&gt; &amp; bye"));
        assert!(!page.contains("<b>hi</b>"));
        assert!(!page.contains("<dialog"));
    }

    #[test]
    fn test_render_page_has_all_widgets() {
        let page = render_page("", "", Some("boom"));
        assert!(page.contains("<title>Language Translator</title>"));
        assert!(page.contains("Enter English Sentence:"));
        assert!(page.contains("Translated Portuguese Sentence:"));
        assert!(page.contains(">Translate</button>"));
        assert!(page.contains("<dialog id=\"error-dialog\">"));
        assert!(page.contains("boom"));
    }

    #[actix_rt::test]
    async fn test_index_serves_page() {
        let app = actix_test::init_service(App::new().app_data(web::Data::new(translator())).configure(configure)).await;
        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = actix_test::read_body(resp).await;
        let body_str = std::str::from_utf8(&body).unwrap();
        assert!(body_str.contains("Enter English Sentence:"));
    }

    #[actix_rt::test]
    async fn test_translate_form_empty_input_shows_dialog() {
        let app = actix_test::init_service(App::new().app_data(web::Data::new(translator())).configure(configure)).await;
        let req = actix_test::TestRequest::post().uri("/translate").set_form([("text", "   ")]).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = actix_test::read_body(resp).await;
        let body_str = std::str::from_utf8(&body).unwrap();
        assert!(body_str.contains("<dialog id=\"error-dialog\">"));
        assert!(body_str.contains("Please enter a sentence to translate."));
    }

    #[actix_rt::test]
    async fn test_translate_form_fills_output_box() {
        let translator = translator();
        let expected = translator.translate("hello").unwrap();
        let app = actix_test::init_service(App::new().app_data(web::Data::new(translator)).configure(configure)).await;

        let req = actix_test::TestRequest::post().uri("/translate").set_form([("text", "hello")]).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = actix_test::read_body(resp).await;
        let body_str = std::str::from_utf8(&body).unwrap();
        let output_box = format!("<textarea id=\"output-text\" rows=\"5\" cols=\"50\">{}</textarea>", encode_text(&expected));
        assert!(body_str.contains(&output_box), "missing output box in {}", body_str);
        assert!(!body_str.contains("<dialog"));
    }

    #[actix_rt::test]
    async fn test_translate_api() {
        let app = actix_test::init_service(App::new().app_data(web::Data::new(translator())).configure(configure)).await;

        let req = actix_test::TestRequest::post().uri("/api/translate").set_json(TranslateRequest { text: "".to_string() }).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: TranslateResponse = actix_test::read_body_json(resp).await;
        assert_eq!(body, TranslateResponse::Error { error: "Please enter a sentence to translate.".to_string() });

        let req = actix_test::TestRequest::post()
            .uri("/api/translate")
            .set_json(TranslateRequest { text: "good night".to_string() })
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: TranslateResponse = actix_test::read_body_json(resp).await;
        assert!(matches!(body, TranslateResponse::Translation { .. }));
    }
}
