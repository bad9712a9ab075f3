use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use super::error::FetchError;
use crate::models::{Recommendation, RecommendRequest, SheetDetail, SheetSummary};

/// The three calls the screens make against the API. Screens only depend on
/// this trait, which lets tests swap in canned data. Implementations are
/// shared with background fetch threads, hence `Send + Sync`.
pub trait SheetSource: Send + Sync {
    fn list_sheets(&self) -> Result<Vec<SheetSummary>, FetchError>;
    fn fetch_sheet(&self, id: i64) -> Result<SheetDetail, FetchError>;
    fn recommend(&self, id: i64, count: usize) -> Result<Vec<Recommendation>, FetchError>;
}

/// `reqwest` implementation of [`SheetSource`].
pub struct HttpSheetClient {
    http: Client,
    api_base: String,
}

impl HttpSheetClient {
    /// Build a client rooted at `api_base`. A trailing slash on the base is
    /// ignored.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::from_transport)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, FetchError> {
        response.json::<T>().map_err(|err| {
            error!(%url, error = %err, "failed to decode response body");
            FetchError::from_transport(err)
        })
    }
}

/// Map a non-success status into the error taxonomy. `sheet_id` is only set
/// for the single-record lookup, where 404 means "no such sheet".
pub(crate) fn status_error(status: StatusCode, sheet_id: Option<i64>) -> FetchError {
    match (status, sheet_id) {
        (StatusCode::NOT_FOUND, Some(id)) => FetchError::NotFound(id),
        _ => FetchError::Status(status.as_u16()),
    }
}

impl SheetSource for HttpSheetClient {
    fn list_sheets(&self) -> Result<Vec<SheetSummary>, FetchError> {
        let url = self.endpoint("partituras");
        debug!(%url, "fetching sheet listing");
        let response = self.http.get(&url).send().map_err(|err| {
            error!(%url, error = %err, "sheet listing request failed");
            FetchError::from_transport(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "sheet listing returned an error status");
            return Err(status_error(status, None));
        }
        Self::decode(&url, response)
    }

    fn fetch_sheet(&self, id: i64) -> Result<SheetDetail, FetchError> {
        let url = self.endpoint(&format!("partituras/{id}"));
        debug!(%url, "fetching sheet detail");
        let response = self.http.get(&url).send().map_err(|err| {
            error!(%url, error = %err, "sheet detail request failed");
            FetchError::from_transport(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, sheet_id = id, "sheet not found");
            return Err(status_error(status, Some(id)));
        }
        Self::decode(&url, response)
    }

    fn recommend(&self, id: i64, count: usize) -> Result<Vec<Recommendation>, FetchError> {
        let url = self.endpoint("recomendar");
        let body = RecommendRequest {
            id_cancion: id,
            num_recomendaciones: count,
        };
        debug!(%url, sheet_id = id, count, "requesting recommendations");
        let response = self.http.post(&url).json(&body).send().map_err(|err| {
            error!(%url, error = %err, "recommendation request failed");
            FetchError::from_transport(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, sheet_id = id, "recommendation request rejected");
            return Err(status_error(status, None));
        }
        Self::decode(&url, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpSheetClient {
        HttpSheetClient::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(
            client("http://localhost:5000/").endpoint("partituras"),
            "http://localhost:5000/partituras"
        );
        assert_eq!(
            client("http://localhost:5000").endpoint("/partituras/4"),
            "http://localhost:5000/partituras/4"
        );
    }

    #[test]
    fn test_status_error_only_maps_404_on_single_lookup() {
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, Some(9)),
            FetchError::NotFound(9)
        );
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, None),
            FetchError::Status(404)
        );
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, Some(9)),
            FetchError::Status(500)
        );
    }
}
