//! Request router
//!
//! Maps method + path onto the handful of endpoints the server exposes.

use hyper::Method;

/// Resolved endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `GET /health`
    Health,
    /// `POST <upload path>`
    Upload,
    /// Known path, wrong method
    MethodNotAllowed { allow: &'static str },
    NotFound,
}

/// Path-based router
#[derive(Debug, Clone)]
pub struct Router {
    upload_path: String,
}

impl Router {
    /// Create a router that accepts uploads at `upload_path`
    pub fn new(upload_path: &str) -> Self {
        Self {
            upload_path: normalize(upload_path).to_string(),
        }
    }

    /// Resolve a request
    pub fn route(&self, method: &Method, path: &str) -> Route {
        let path = normalize(path);

        if path == self.upload_path {
            return if method == Method::POST {
                Route::Upload
            } else {
                Route::MethodNotAllowed { allow: "POST" }
            };
        }

        if path == "/health" {
            return if method == Method::GET || method == Method::HEAD {
                Route::Health
            } else {
                Route::MethodNotAllowed { allow: "GET, HEAD" }
            };
        }

        Route::NotFound
    }
}

/// Drop trailing slashes, keeping a bare "/"
fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
