//! Error taxonomy for the build pipeline.
//!
//! Each failure domain gets its own enum so callers can route them
//! differently: [`CodecError`] and [`ParseError`] are user-input problems,
//! [`TreeLoadError`] is a fatal startup condition, [`ExternalRenderError`]
//! is a dependency failure surfaced per item.

/// Failure while turning a build string into XML text or back.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("invalid base64 in build string: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid compressed stream in build string: {0}")]
    Inflate(std::io::Error),

    #[error("failed to compress build XML: {0}")]
    Deflate(std::io::Error),

    #[error("build string does not decode to UTF-8 text: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Structurally invalid or internally inconsistent build XML.
///
/// Any `ParseError` aborts the whole parse; no partial build model is
/// ever returned.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("malformed build XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("missing element <{0}>")]
    MissingElement(String),

    #[error("missing attribute '{attribute}' on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    #[error("invalid value '{value}' for '{attribute}' on <{element}>")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("unknown equipment slot '{0}'")]
    UnknownSlot(String),

    #[error("cannot resolve display name for gem '{0}'")]
    UnknownGem(String),

    #[error("item id {item_id} referenced by {context} does not resolve")]
    UnresolvedItem { item_id: u32, context: String },

    #[error("malformed item text: {0}")]
    ItemText(String),

    #[error("invalid tree URL: {0}")]
    TreeUrl(String),

    #[error(transparent)]
    Render(#[from] ExternalRenderError),
}

impl ParseError {
    pub fn missing_element(name: impl Into<String>) -> Self {
        Self::MissingElement(name.into())
    }

    pub fn missing_attr(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    pub fn invalid_attr(
        element: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            element: element.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn item_text(msg: impl Into<String>) -> Self {
        Self::ItemText(msg.into())
    }

    pub fn tree_url(msg: impl Into<String>) -> Self {
        Self::TreeUrl(msg.into())
    }
}

/// Corrupt or incomplete static tree dataset. Fatal at startup, never a
/// per-request error.
#[derive(thiserror::Error, Debug)]
pub enum TreeLoadError {
    #[error("failed to read tree dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed tree dataset: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tree dataset is inconsistent: {0}")]
    Structure(String),

    #[error("ascendancy '{0}' has nodes but no start node")]
    MissingAscendancyStart(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TreeLoadError {
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure(msg.into())
    }
}

/// The external item-tooltip renderer was unreachable or rejected its input.
#[derive(thiserror::Error, Debug)]
pub enum ExternalRenderError {
    #[error("item renderer unavailable: {0}")]
    Unavailable(String),

    #[error("item renderer rejected input: {0}")]
    Rejected(String),
}

impl ExternalRenderError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
