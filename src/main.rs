use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use serde::Serialize;

mod config;
mod error;
mod generator;
mod qr;

use config::Config;
use error::ApiError;
use generator::{GenerationRequest, GeneratorService};
use qr::ErrorCorrectionLevel;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Длинный текст должен дойти до кодировщика, а не упереться в лимит тела
const JSON_BODY_LIMIT: usize = 1 << 20;

#[derive(Serialize)]
struct ServerInfo {
    message: String,
    status: String,
    version: String,
    size_presets: Vec<u32>,
    default_size: u32,
    min_size: u32,
    max_size: u32,
    error_correction_levels: Vec<ErrorCorrectionLevel>,
    default_error_correction_level: ErrorCorrectionLevel,
}

// Страница генератора
async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn info(generator: web::Data<GeneratorService>) -> HttpResponse {
    let qr = &generator.config().qr;
    HttpResponse::Ok().json(ServerInfo {
        message: "QR Generator Rust API Server 🦀".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        size_presets: qr.size_presets.clone(),
        default_size: qr.default_size,
        min_size: qr.min_size,
        max_size: qr.max_size,
        error_correction_levels: ErrorCorrectionLevel::ALL.to_vec(),
        default_error_correction_level: ErrorCorrectionLevel::default(),
    })
}

// Сгенерировать QR код
async fn generate_qr(
    generator: web::Data<GeneratorService>,
    req: web::Json<GenerationRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = req.into_inner();
    log::info!(
        "Generating QR code: size={:?}, level={:?}",
        request.size,
        request.error_correction_level
    );

    // Кодирование и PNG нагружают CPU, уводим с воркера
    let generator = generator.clone();
    let result = web::block(move || generator.generate(&request))
        .await
        .map_err(|e| {
            log::error!("QR code generation task failed: {}", e);
            ApiError::Blocking
        })?;

    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(ApiError::GenerationFailed(cause)) => {
            log::error!("QR code generation error: {}", cause);
            Err(ApiError::GenerationFailed(cause))
        }
        Err(e) => {
            log::warn!("Rejected QR request: {}", e);
            Err(e)
        }
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            log::warn!("Invalid JSON body: {}", err);
            ApiError::InvalidBody.into()
        })
}

fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                .route("/info", web::get().to(info))
                .route("/generator", web::post().to(generate_qr)),
        );
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("🦀 Starting QR Generator Server...");

    let config = Config::load().map_err(|e| {
        log::error!("Failed to load config: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let generator = web::Data::new(GeneratorService::new(config.clone()));

    let host = config.server.host.clone();
    let port = config.server.port;

    println!("🚀 Server starting on http://{}:{}", host, port);
    println!(
        "📐 Sizes: {}..={}px, default {}px",
        config.qr.min_size, config.qr.max_size, config.qr.default_size
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
        App::new()
            .app_data(generator.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::test_support::*;
    use actix_web::http::{header, StatusCode};
    use actix_web::test;
    use image::GenericImageView;
    use serde_json::{json, Value};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(GeneratorService::new(Config::default())))
                    .configure(configure),
            )
            .await
        };
    }

    fn generate_request(body: Value) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/generator")
            .set_json(body)
    }

    #[actix_web::test]
    async fn generates_for_every_preset() {
        let app = app!();
        for size in [128, 256, 512, 1024] {
            let resp = test::call_service(
                &app,
                generate_request(json!({ "text": "hello world", "size": size })).to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);

            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["size"], size);
            assert_eq!(body["text"], "hello world");
            assert!(body["qrDataUrl"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,"));
        }
    }

    #[actix_web::test]
    async fn example_url_renders_256_square() {
        let app = app!();
        let resp = test::call_service(
            &app,
            generate_request(json!({ "text": "https://example.com", "size": 256 })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["size"], 256);
        let img = decode_data_url(body["qrDataUrl"].as_str().unwrap());
        assert_eq!(img.dimensions(), (256, 256));
        assert_image_encodes(&img, "https://example.com", ErrorCorrectionLevel::M, 1);
    }

    #[actix_web::test]
    async fn string_size_is_parsed_as_integer() {
        let app = app!();
        let resp = test::call_service(
            &app,
            generate_request(json!({ "text": "abc", "size": "512px" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["size"], 512);
    }

    #[actix_web::test]
    async fn blank_text_returns_400() {
        let app = app!();
        for body in [json!({ "text": "  " }), json!({ "text": "" }), json!({})] {
            let resp = test::call_service(&app, generate_request(body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body, json!({ "error": "Text is required" }));
        }
    }

    #[actix_web::test]
    async fn encoder_failure_returns_500() {
        let app = app!();
        let text = "z".repeat(6000);
        let resp =
            test::call_service(&app, generate_request(json!({ "text": text })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "QR code generation failed" }));
    }

    #[actix_web::test]
    async fn body_above_32kb_reaches_encoder() {
        let app = app!();
        let text = "q".repeat(40 * 1024);
        let resp =
            test::call_service(&app, generate_request(json!({ "text": text })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "QR code generation failed" }));
    }

    #[actix_web::test]
    async fn body_above_limit_is_rejected() {
        let app = app!();
        let text = "q".repeat(JSON_BODY_LIMIT + 1);
        let resp =
            test::call_service(&app, generate_request(json!({ "text": text })).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid JSON body");
    }

    #[actix_web::test]
    async fn invalid_options_return_400() {
        let app = app!();

        let resp = test::call_service(
            &app,
            generate_request(json!({ "text": "a", "size": 10 })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid size");

        let resp = test::call_service(
            &app,
            generate_request(json!({ "text": "a", "errorCorrectionLevel": "X" })).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid error correction level");
    }

    #[actix_web::test]
    async fn malformed_json_returns_400() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/generator")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid JSON body");
    }

    #[actix_web::test]
    async fn index_serves_generator_page() {
        let app = app!();
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let body = test::read_body(resp).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("/api/generator"));
    }

    #[actix_web::test]
    async fn info_lists_presets() {
        let app = app!();
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/api/info").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["size_presets"], json!([128, 256, 512, 1024]));
        assert_eq!(body["default_size"], 256);
        assert_eq!(body["error_correction_levels"], json!(["L", "M", "Q", "H"]));
        assert_eq!(body["default_error_correction_level"], "M");
    }
}
