pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod response;
pub mod router;

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use image::{DynamicImage, Luma};
    use tower::ServiceExt;

    use crate::api::routes::create_router;
    use crate::api::state::testing::test_state;
    use crate::processing::encode_png;

    const BOUNDARY: &str = "scriptor-test-boundary";

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn page_png() -> Vec<u8> {
        let page = image::GrayImage::from_fn(64, 32, |x, _| {
            if (20..44).contains(&x) {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        encode_png(&DynamicImage::ImageLuma8(page)).unwrap()
    }

    fn multipart_request(uri: &str, fields: &[(&str, &str)], file: Option<&[u8]>) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"page.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = create_router(test_state(vec!["secret".to_string()]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["tesseract"]["status"], "ok");
        assert_eq!(json["data"]["trocr"]["status"], "idle");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn openapi_json_is_public_and_valid() {
        let app = create_router(test_state(vec!["secret".to_string()]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let version = json["openapi"]
            .as_str()
            .expect("openapi field should be a string");
        assert!(
            version.starts_with('3'),
            "OpenAPI version should start with 3, got: {version}"
        );
        assert!(json["paths"]["/api/v1/ocr/extract"].is_object());
        assert!(json["paths"]["/api/v1/models/cache"]["delete"].is_object());
    }

    #[tokio::test]
    async fn admin_route_requires_auth() {
        let app = create_router(test_state(vec!["test-key".to_string()]));

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/models/download",
                r#"{"model_type":"small-printed"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "unauthorized");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn tesseract_extraction_returns_text() {
        let app = create_router(test_state(vec![]));
        let png = page_png();

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr/extract",
                &[("engine", "tesseract"), ("processing_speed", "fast")],
                Some(&png),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["text"], "printed words");
        assert_eq!(json["data"]["engine"], "tesseract");
        assert_eq!(json["data"]["engine_used"], "primary");
        let confidence = json["data"]["confidence"].as_f64().unwrap();
        assert!((confidence - 0.88).abs() < 1e-6);
    }

    #[tokio::test]
    async fn neural_extraction_falls_back_when_model_is_missing() {
        let app = create_router(test_state(vec![]));
        let png = page_png();

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr/extract",
                &[("engine", "trocr"), ("model_type", "small-handwritten")],
                Some(&png),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["text"], "printed words");
        assert_eq!(json["data"]["engine"], "tesseract");
        assert_eq!(json["data"]["engine_used"], "fallback");
        let reason = json["data"]["fallback_reason"].as_str().unwrap();
        assert!(reason.contains("small-handwritten"), "{reason}");
    }

    #[tokio::test]
    async fn extraction_without_file_is_rejected() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr/extract",
                &[("engine", "tesseract")],
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn malformed_multipart_body_is_reported() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ocr/extract")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from("no boundary anywhere in this body"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        let message = json["error"]["message"].as_str().unwrap();
        assert!(message.contains("Malformed multipart body"), "{message}");
    }

    #[tokio::test]
    async fn undecodable_upload_is_rejected() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr/extract",
                &[("engine", "tesseract")],
                Some(b"definitely not an image"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn even_block_size_is_rejected() {
        let app = create_router(test_state(vec![]));
        let png = page_png();

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr/extract",
                &[
                    ("engine", "tesseract"),
                    ("threshold_method", "adaptive_gaussian"),
                    ("block_size", "10"),
                ],
                Some(&png),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        let message = json["error"]["message"].as_str().unwrap();
        assert!(message.contains("block_size"), "{message}");
    }

    #[tokio::test]
    async fn extreme_c_value_is_rejected() {
        let app = create_router(test_state(vec![]));
        let png = page_png();

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr/extract",
                &[
                    ("engine", "tesseract"),
                    ("threshold_method", "adaptive_mean"),
                    ("c_value", "-2147483648"),
                ],
                Some(&png),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid_request");
        let message = json["error"]["message"].as_str().unwrap();
        assert!(message.contains("c_value"), "{message}");
    }

    #[tokio::test]
    async fn preprocess_returns_png_data_url() {
        let app = create_router(test_state(vec![]));
        let png = page_png();

        let response = app
            .oneshot(multipart_request(
                "/api/v1/ocr/preprocess",
                &[("threshold_method", "otsu"), ("blur_kernel", "4")],
                Some(&png),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let url = json["data"]["data_url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(json["data"]["params"]["threshold_method"], "otsu");
        assert_eq!(json["data"]["params"]["blur_kernel"], 4);
    }

    #[tokio::test]
    async fn available_models_lists_catalog() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/models/available")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["meta"]["total"], 6);
        assert_eq!(json["data"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn ocr_status_reports_engines_and_catalog() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ocr/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["tesseract_ready"], true);
        assert_eq!(json["data"]["trocr_ready"], false);
        assert_eq!(json["data"]["available_models"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn clearing_absent_cache_is_not_an_error() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(json_request(
                "DELETE",
                "/api/v1/models/cache",
                r#"{"model_type":"base-printed"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["message"], "No cache to clear");
        assert_eq!(json["data"]["model"]["loaded"], false);
    }

    #[tokio::test]
    async fn unknown_model_type_is_rejected() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(json_request(
                "DELETE",
                "/api/v1/models/cache",
                r#"{"model_type":"enormous-printed"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn missing_body_field_uses_error_envelope() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(json_request("POST", "/api/v1/models/force-reload", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(
            json["error"]["message"],
            "Missing required field: model_type"
        );
    }

    #[tokio::test]
    async fn failed_download_reports_cause() {
        let app = create_router(test_state(vec![]));

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/models/download",
                r#"{"model_type":"small-printed"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        let message = json["error"]["message"].as_str().unwrap();
        assert!(message.contains("offline"), "{message}");
    }
}
