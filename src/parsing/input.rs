use std::convert::TryFrom;
use std::path::Path;

/// A source buffer to be parsed, together with the label under which it is
/// reported in error messages (typically a filename).
pub struct Input {
    pub text: String,
    pub source: Option<String>,
}

impl Input {
    pub fn from_string(input: impl Into<String>) -> Input {
        Input {
            text: input.into(),
            source: None,
        }
    }

    /// An in-memory input with a synthetic label such as `<eval>`, used when
    /// re-parsing serialized sub-expressions.
    pub fn with_label(input: impl Into<String>, label: impl Into<String>) -> Input {
        Input {
            text: input.into(),
            source: Some(label.into()),
        }
    }

    pub fn from_file(file: &Path) -> std::io::Result<Input> {
        let s = std::fs::read_to_string(file)?;
        Ok(Input {
            text: s,
            source: Some(file.display().to_string()),
        })
    }

    /// Label used in error locations when no filename is known.
    pub fn label(&self) -> &str {
        self.source.as_deref().unwrap_or("<input>")
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::from_string(s)
    }
}

impl TryFrom<&Path> for Input {
    type Error = std::io::Error;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        Input::from_file(path)
    }
}
