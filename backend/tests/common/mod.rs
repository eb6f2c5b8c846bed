#![allow(dead_code)]

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tempfile::TempDir;

use litscan::config::AppConfig;
use litscan::db;
use litscan::detection::preprocess::ImageTensor;
use litscan::detection::{Classifier, ClassifierError, PredictionSource};
use litscan::Services;

pub const BOUNDARY: &str = "----litscan-test-boundary";

pub struct FixedClassifier(pub f32);

impl Classifier for FixedClassifier {
    fn predict(&self, _input: &ImageTensor) -> Result<f32, ClassifierError> {
        Ok(self.0)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct UnavailableClassifier;

impl Classifier for UnavailableClassifier {
    fn predict(&self, _input: &ImageTensor) -> Result<f32, ClassifierError> {
        Err(ClassifierError::Unavailable("model file missing".into()))
    }
}

pub struct TestEnv {
    pub services: Services,
    pub upload_dir: TempDir,
}

pub async fn test_env(source: PredictionSource) -> TestEnv {
    let upload_dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig {
        database_url: "sqlite::memory:".to_string(),
        upload_dir: upload_dir.path().to_path_buf(),
        jwt_secret: "test-secret".to_string(),
        password_iterations: 1_000,
        ..AppConfig::default()
    };
    let pool = db::connect(&config.database_url).await.expect("database");
    TestEnv {
        services: Services::new(&config, pool, source),
        upload_dir,
    }
}

pub fn image_bytes(format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::ImageBuffer::from_fn(48, 32, |x, y| {
        image::Rgb([(x * 5) as u8, (y * 7) as u8, 200])
    }));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("encode test image");
    buf.into_inner()
}

/// Builds a `multipart/form-data` body with an optional subject field and
/// an optional image part.
pub fn multipart_body(subject: Option<&str>, image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(subject) = subject {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"subject_name\"\r\n\r\n{subject}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
