pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No file was uploaded")]
    MissingFile,
    #[error("File type not allowed: {0}")]
    ExtensionNotAllowed(String),
    #[error("Uploaded file is empty")]
    EmptyFile,
    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: usize, limit: usize },
    #[error("Subject name is required")]
    MissingSubjectName,
}

/// Returns the normalized extension when the filename ends in an allowed
/// image type. Anything without a dot, or with an unknown suffix, fails.
pub fn validate_filename(filename: &str) -> Result<&'static str, ValidationError> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(ValidationError::MissingFile);
    }
    let (_, ext) = filename
        .rsplit_once('.')
        .ok_or_else(|| ValidationError::ExtensionNotAllowed(String::new()))?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .copied()
        .ok_or(ValidationError::ExtensionNotAllowed(ext))
}

pub fn is_allowed(filename: &str) -> bool {
    validate_filename(filename).is_ok()
}

pub fn validate_size(data: &[u8], limit: usize) -> Result<(), ValidationError> {
    if data.is_empty() {
        return Err(ValidationError::EmptyFile);
    }
    if data.len() > limit {
        return Err(ValidationError::FileTooLarge {
            size: data.len(),
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_extensions_in_any_case() {
        for name in ["a.png", "scan.JPG", "photo.Jpeg", "my.child.writing.jpg"] {
            assert!(is_allowed(name), "{name} should pass");
        }
        assert_eq!(validate_filename("x.JPEG").unwrap(), "jpeg");
    }

    #[test]
    fn rejects_everything_else() {
        for name in ["a.gif", "a.bmp", "noext", "png", "a.png.exe", ".", "a."] {
            assert!(!is_allowed(name), "{name} should fail");
        }
        assert_eq!(validate_filename("  "), Err(ValidationError::MissingFile));
        assert_eq!(
            validate_filename("a.gif"),
            Err(ValidationError::ExtensionNotAllowed("gif".into()))
        );
    }

    #[test]
    fn size_limits() {
        assert_eq!(validate_size(&[], 10), Err(ValidationError::EmptyFile));
        assert!(validate_size(&[0u8; 10], 10).is_ok());
        assert_eq!(
            validate_size(&[0u8; 11], 10),
            Err(ValidationError::FileTooLarge { size: 11, limit: 10 })
        );
    }
}
