use derive_more::Display;

pub mod pages;
pub mod server;
pub mod util;

#[derive(Debug, Display)]
pub enum WebError {
    Store(crate::store::StoreError),
    Form(crate::form::FormError),
    Ddns(crate::ddns::DdnsError),
    Io(std::io::Error),
    #[display(fmt = "missing field '{}'", _0)]
    MissingField(&'static str),
    Serialization(serde_json::Error),
    Template(handlebars::RenderError),
    InvalidRequest,
    NotFound,
}

impl WebError {
    pub fn status_code(&self) -> u16 {
        match self {
            WebError::NotFound => 404,
            WebError::MissingField(_)
            | WebError::InvalidRequest
            | WebError::Serialization(_)
            | WebError::Ddns(_) => 400,
            WebError::Store(_) => 502,
            WebError::Form(_) | WebError::Io(_) | WebError::Template(_) => 500,
        }
    }
}

impl From<crate::store::StoreError> for WebError {
    fn from(err: crate::store::StoreError) -> Self {
        WebError::Store(err)
    }
}

impl From<crate::form::FormError> for WebError {
    fn from(err: crate::form::FormError) -> Self {
        WebError::Form(err)
    }
}

impl From<crate::ddns::DdnsError> for WebError {
    fn from(err: crate::ddns::DdnsError) -> Self {
        WebError::Ddns(err)
    }
}

impl From<std::io::Error> for WebError {
    fn from(err: std::io::Error) -> Self {
        WebError::Io(err)
    }
}

impl From<serde_json::Error> for WebError {
    fn from(err: serde_json::Error) -> Self {
        WebError::Serialization(err)
    }
}

impl From<handlebars::RenderError> for WebError {
    fn from(err: handlebars::RenderError) -> Self {
        WebError::Template(err)
    }
}

impl std::error::Error for WebError {}

pub type Result<T> = std::result::Result<T, WebError>;

#[cfg(test)]
mod pages_test;
