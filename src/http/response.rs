//! Response construction for the HTTP dispatcher.
//!
//! # Design Decisions
//! - Every path produces a complete response; nothing writes to the
//!   connection directly
//! - Route-level headers are applied to success and error responses alike

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::codec::Encoded;
use crate::http::options::ResolvedOptions;

/// Successful response from an encoded body.
pub fn success(encoded: Encoded, options: &ResolvedOptions) -> Response {
    let mut response = Response::new(Body::from(encoded.body));
    *response.status_mut() = options.success_status();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, encoded.content_type);
    options.apply_headers(&mut response);
    response
}

/// `308 Permanent Redirect` to `path`, keeping the query string.
pub fn redirect(path: &str, original: &Uri) -> Response {
    let location = match original.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    match HeaderValue::from_str(&location) {
        Ok(location) => (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
