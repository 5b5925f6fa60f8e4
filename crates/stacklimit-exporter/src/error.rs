use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use stacklimit_common::ExporterError;

pub struct ScrapeError(pub ExporterError);

impl ScrapeError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ExporterError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ExporterError::Upstream {
                timed_out: true, ..
            } => StatusCode::GATEWAY_TIMEOUT,
            ExporterError::Authentication(_)
            | ExporterError::Upstream { .. }
            | ExporterError::MalformedReport(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = format!("{}\n", self.0.to_string().replace('\n', " "));

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

impl From<ExporterError> for ScrapeError {
    fn from(err: ExporterError) -> Self {
        ScrapeError(err)
    }
}
