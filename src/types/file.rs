use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, ErrorDetails};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum FileKind {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    WebP,
    #[serde(rename = "application/pdf")]
    Pdf,
}

impl FileKind {
    pub fn is_image(&self) -> bool {
        match self {
            FileKind::Jpeg | FileKind::Png | FileKind::WebP => true,
            FileKind::Pdf => false,
        }
    }
}

impl TryFrom<&str> for FileKind {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let extension = value.rsplit('.').next().ok_or_else(|| {
            Error::new(ErrorDetails::InvalidMessage {
                message: format!("File name `{value}` has no extension"),
            })
        })?;
        match extension {
            "jpg" | "jpeg" => Ok(FileKind::Jpeg),
            "png" => Ok(FileKind::Png),
            "webp" => Ok(FileKind::WebP),
            "pdf" => Ok(FileKind::Pdf),
            _ => Err(Error::new(ErrorDetails::InvalidMessage {
                message: format!("Unsupported file extension `{extension}`"),
            })),
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Jpeg => write!(f, "image/jpeg"),
            FileKind::Png => write!(f, "image/png"),
            FileKind::WebP => write!(f, "image/webp"),
            FileKind::Pdf => write!(f, "application/pdf"),
        }
    }
}

/// A file input content block. The gateway fetches `Url` files itself;
/// `Base64` files carry the encoded bytes inline.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum File {
    Url {
        url: Url,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<FileKind>,
    },
    Base64 {
        mime_type: FileKind,
        data: String,
    },
}
