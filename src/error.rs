pub type YavResult<T> = Result<T, YavError>;

#[derive(thiserror::Error, Debug)]
pub enum YavError {
    /// Every candidate device path was tried and none could be opened.
    #[error("unable to open any {0} device")]
    NoDevice(&'static str),

    /// A device control call was rejected by the driver.
    #[error("{op} failed: {source}")]
    Hardware {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The display cannot present recognizable color.
    #[error("format error: {0}")]
    Format(String),

    /// The display pipeline lacks a usable connector, mode or controller.
    #[error("display error: {0}")]
    Display(String),

    /// Malformed user input (color literal, device descriptor, flags).
    #[error("invalid input: {0}")]
    Input(String),

    /// The image file could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl YavError {
    pub fn hardware(op: &'static str, source: std::io::Error) -> Self {
        Self::Hardware { op, source }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(YavError::format("x").to_string().contains("format error:"));
        assert!(YavError::input("x").to_string().contains("invalid input:"));
        assert!(YavError::decode("x").to_string().contains("decode error:"));
    }

    #[test]
    fn hardware_names_operation_and_code() {
        let err = YavError::hardware(
            "FBIOGET_VSCREENINFO",
            std::io::Error::from_raw_os_error(libc::EINVAL),
        );
        let msg = err.to_string();
        assert!(msg.contains("FBIOGET_VSCREENINFO"));
    }
}
