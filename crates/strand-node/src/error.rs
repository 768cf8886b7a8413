use axum::http::StatusCode;

use strand_core::http_status_for_code;

/// Map a taxonomy code onto its canonical HTTP status. The mapping itself
/// lives in strand-core; this just lifts the u16 into axum's type.
pub fn status_for_code(code: &str) -> StatusCode {
    StatusCode::from_u16(http_status_for_code(code)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_mapping() {
        assert_eq!(status_for_code("ValidationFailed"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_code("AlreadyExists"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_code("Unauthorized"), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for_code("OriginNotAllowed"), StatusCode::FORBIDDEN);
        assert_eq!(status_for_code("NotFound"), StatusCode::NOT_FOUND);
        assert_eq!(status_for_code("BackendUnavailable"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for_code("RequestTimeout"), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
