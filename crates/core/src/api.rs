//! Transport-agnostic handlers for the public player API.
//!
//! Each method corresponds to one route; the caller resolves the player
//! identity and the HTTP plumbing, then serialises the returned
//! [`ApiResponse`].

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::{
    airline::Airline,
    catalog,
    error::{EngineError, ErrorKind},
    store::PlayerStore,
};

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body; message responses are JSON strings.
    pub body: Value,
}

impl ApiResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn message(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, Value::String(message.into()))
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text when it is a message.
    pub fn message_text(&self) -> Option<&str> {
        self.body.as_str()
    }
}

#[derive(Debug, Default, Deserialize)]
struct CityPurchaseRequest {
    city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlanePurchaseRequest {
    plane: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DepartRequest {
    #[serde(default)]
    loaded_jobs: Vec<String>,
    destination_city_id: Option<String>,
}

fn parse_body<T: for<'de> Deserialize<'de> + Default>(body: &Value) -> Result<T, ApiResponse> {
    if body.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(body.clone())
        .map_err(|err| ApiResponse::message(400, format!("Malformed request body: {err}")))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, EngineError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(EngineError::MissingField(field))
}

/// Map an engine error to a response; `not_found_status` is used for absent
/// player-scoped data on read routes.
fn error_response(err: EngineError, not_found_status: u16) -> ApiResponse {
    let status = match err.kind() {
        ErrorKind::NotFound if matches!(err, EngineError::PlayerNotFound(_)) => not_found_status,
        ErrorKind::Internal => 500,
        _ => 400,
    };
    if status >= 500 {
        error!(%err, "request failed");
    } else {
        debug!(%err, status, "request rejected");
    }
    ApiResponse::message(status, err.to_string())
}

/// Route handlers over an [`Airline`].
pub struct Api<S> {
    airline: Airline<S>,
}

impl<S: PlayerStore> Api<S> {
    /// Serve `airline`.
    pub fn new(airline: Airline<S>) -> Self {
        Self { airline }
    }

    /// Engine behind the handlers.
    pub fn airline(&self) -> &Airline<S> {
        &self.airline
    }

    /// `GET /v1/player`
    pub fn get_player(&self, player_id: &str) -> ApiResponse {
        match self.airline.player(player_id) {
            Ok(player) => ApiResponse::new(
                200,
                json!({ "player_id": player.player_id, "balance": player.balance }),
            ),
            Err(err) => error_response(err, 404),
        }
    }

    /// `POST /v1/player`
    pub fn post_player(&self, player_id: &str) -> ApiResponse {
        match self.airline.create_player(player_id) {
            Ok(balance) => {
                debug!(player_id, balance, "player created");
                ApiResponse::message(201, "Player created")
            }
            Err(err) => error_response(err, 400),
        }
    }

    /// `GET /v1/cities`
    pub fn get_cities(&self, player_id: &str) -> ApiResponse {
        match self.airline.cities(player_id) {
            Ok(cities) => ApiResponse::new(200, json!({ "cities": cities })),
            Err(err) => error_response(err, 404),
        }
    }

    /// `POST /v1/cities` with `{"city": id}`
    pub fn post_cities(&self, player_id: &str, body: &Value) -> ApiResponse {
        let request: CityPurchaseRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let result = required(request.city, "city")
            .and_then(|city_id| self.airline.purchase_city(player_id, &city_id));
        match result {
            Ok(balance) => ApiResponse::new(201, json!({ "balance": balance })),
            Err(err) => error_response(err, 400),
        }
    }

    /// `GET /v1/cities/{id}/jobs`
    pub fn get_city_jobs(&self, player_id: &str, city_id: &str) -> ApiResponse {
        match self.airline.city_jobs(player_id, city_id) {
            Ok(board) => ApiResponse::new(
                200,
                json!({ "jobs": board.jobs, "jobs_expire": board.jobs_expire }),
            ),
            Err(err) => error_response(err, 400),
        }
    }

    /// `GET /v1/planes`
    pub fn get_planes(&self, player_id: &str) -> ApiResponse {
        match self.airline.planes(player_id) {
            Ok(planes) => ApiResponse::new(200, json!({ "planes": planes })),
            Err(err) => error_response(err, 404),
        }
    }

    /// `POST /v1/planes` with `{"plane": model_id, "city": city_id}`
    pub fn post_planes(&self, player_id: &str, body: &Value) -> ApiResponse {
        let request: PlanePurchaseRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let result = required(request.plane, "plane").and_then(|plane| {
            let city = required(request.city, "city")?;
            self.airline.purchase_plane(player_id, &plane, &city)
        });
        match result {
            Ok(bought) => ApiResponse::new(
                201,
                json!({ "balance": bought.balance, "plane_id": bought.plane_id }),
            ),
            Err(err) => error_response(err, 400),
        }
    }

    /// `PUT /v1/planes/{id}/depart` with `{"loaded_jobs": [ids], "destination_city_id": id}`
    pub fn put_depart(&self, player_id: &str, plane_id: &str, body: &Value) -> ApiResponse {
        let request: DepartRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let result = required(request.destination_city_id, "destination_city_id").and_then(
            |destination| {
                self.airline
                    .load_and_depart(player_id, plane_id, &request.loaded_jobs, &destination)
            },
        );
        match result {
            Ok(_) => ApiResponse::new(200, Value::Null),
            Err(err) => error_response(err, 400),
        }
    }

    /// `PUT /v1/planes/{id}/arrive`
    pub fn put_arrive(&self, player_id: &str, plane_id: &str) -> ApiResponse {
        match self.airline.arrive(player_id, plane_id) {
            Ok(settlement) => ApiResponse::new(200, json!({ "balance": settlement.balance })),
            Err(err) => error_response(err, 400),
        }
    }

    /// `GET /v1/market/cities`
    pub fn get_market_cities(&self) -> ApiResponse {
        let cities: Vec<_> = catalog::cities().collect();
        ApiResponse::new(200, json!({ "cities": cities }))
    }

    /// `GET /v1/market/planes`
    pub fn get_market_planes(&self) -> ApiResponse {
        let planes: Vec<_> = catalog::planes().collect();
        ApiResponse::new(200, json!({ "planes": planes }))
    }
}
