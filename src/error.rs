/// Main error type for the library.
#[derive(Debug)]
pub enum UpsampleError {
    /// An operation was requested on a grid or upsampler before it was configured.
    Unconfigured,
    /// Used when the user pass a logical invalid parameter to a function,
    /// like images with mismatching dimensions.
    InvalidParameter(String),
    Io(std::io::Error),
    Image(image::ImageError),
    Parser(String),
}

pub type Result<T> = std::result::Result<T, UpsampleError>;

impl std::fmt::Display for UpsampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            UpsampleError::Unconfigured => write!(f, "Used before configuration"),
            UpsampleError::InvalidParameter(err) => write!(f, "Parameter error: {}", err),
            UpsampleError::Io(err) => write!(f, "IO error: {}", err),
            UpsampleError::Image(err) => write!(f, "Image error: {}", err),
            UpsampleError::Parser(err) => write!(f, "Parser error: {}", err),
        }
    }
}

impl UpsampleError {
    /// Create a error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        UpsampleError::InvalidParameter(msg.to_string())
    }

    /// Checks that two `(height, width)` pairs match.
    pub(crate) fn check_dims(
        what: &str,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Result<()> {
        if expected != found {
            Err(Self::invalid_parameter(format!(
                "{what}: expected {}x{} (w x h), found {}x{}",
                expected.1, expected.0, found.1, found.0
            )))
        } else {
            Ok(())
        }
    }
}

impl std::error::Error for UpsampleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UpsampleError::Io(err) => Some(err),
            UpsampleError::Image(err) => Some(err),
            UpsampleError::Unconfigured
            | UpsampleError::InvalidParameter(_)
            | UpsampleError::Parser(_) => None,
        }
    }
}

impl From<std::io::Error> for UpsampleError {
    fn from(err: std::io::Error) -> Self {
        UpsampleError::Io(err)
    }
}

impl From<image::ImageError> for UpsampleError {
    fn from(err: image::ImageError) -> Self {
        UpsampleError::Image(err)
    }
}

impl From<serde_json::Error> for UpsampleError {
    fn from(err: serde_json::Error) -> Self {
        UpsampleError::Parser(err.to_string())
    }
}
