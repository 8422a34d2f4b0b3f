use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod book;
pub mod content;
pub mod layout;

pub use book::{BookService, BookTarget};
pub use content::{Block, BlockKind, FileMarkdownSource, MarkdownSource, render_markdown};
pub use layout::{LayoutSummary, PageSide, PageSurface, TextMetrics, layout_pages};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("page {path} ({language}) could not be fetched: {message}")]
    Fetch {
        language: Language,
        path: String,
        message: String,
    },
    #[error("page surface of {model} has no slot at {path:?}")]
    MissingSurface { model: String, path: Vec<usize> },
    #[error("unknown language {0}")]
    UnknownLanguage(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Portuguese,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Portuguese => "portuguese",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Language::English => Language::Portuguese,
            Language::Portuguese => Language::English,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "english" => Ok(Language::English),
            "portuguese" => Ok(Language::Portuguese),
            _ => Err(PageError::UnknownLanguage(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_names() {
        assert_eq!("Portuguese".parse::<Language>(), Ok(Language::Portuguese));
        assert!("klingon".parse::<Language>().is_err());
        assert_eq!(Language::English.toggled(), Language::Portuguese);
        assert_eq!(Language::Portuguese.to_string(), "portuguese");
    }
}
