//! Custom `warp` rejections and the recovery function that turns them into JSON errors.

use eth2::types::ErrorMessage;
use std::convert::Infallible;
use warp::{http::StatusCode, reject::Reject, Rejection};

/// A named resource (strategy uid, epoch, ...) does not exist.
#[derive(Debug)]
pub struct CustomNotFound(pub String);

/// The request was well-formed JSON but its content was rejected.
#[derive(Debug)]
pub struct CustomBadRequest(pub String);

#[derive(Debug)]
pub struct CustomServerError(pub String);

/// The beacon node could not be reached or returned an error while serving a proxied request.
#[derive(Debug)]
pub struct BeaconNodeError(pub String);

impl Reject for CustomNotFound {}
impl Reject for CustomBadRequest {}
impl Reject for CustomServerError {}
impl Reject for BeaconNodeError {}

pub fn custom_not_found(msg: String) -> Rejection {
    warp::reject::custom(CustomNotFound(msg))
}

pub fn custom_bad_request(msg: String) -> Rejection {
    warp::reject::custom(CustomBadRequest(msg))
}

pub fn custom_server_error(msg: String) -> Rejection {
    warp::reject::custom(CustomServerError(msg))
}

pub fn beacon_node_error(msg: String) -> Rejection {
    warp::reject::custom(BeaconNodeError(msg))
}

fn classify(err: &Rejection) -> (StatusCode, String) {
    if err.is_not_found() {
        return (StatusCode::NOT_FOUND, "NOT_FOUND".into());
    }
    if let Some(e) = err.find::<CustomNotFound>() {
        return (StatusCode::NOT_FOUND, format!("NOT_FOUND: {}", e.0));
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return (
            StatusCode::BAD_REQUEST,
            format!("BAD_REQUEST: body deserialize error: {}", e),
        );
    }
    if let Some(e) = err.find::<CustomBadRequest>() {
        return (StatusCode::BAD_REQUEST, format!("BAD_REQUEST: {}", e.0));
    }
    if let Some(e) = err.find::<BeaconNodeError>() {
        return (
            StatusCode::BAD_GATEWAY,
            format!("BAD_GATEWAY: beacon node request failed: {}", e.0),
        );
    }
    if let Some(e) = err.find::<CustomServerError>() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("INTERNAL_SERVER_ERROR: {}", e.0),
        );
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED".into());
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "UNHANDLED_REJECTION".into(),
    )
}

/// Converts any rejection into an `ErrorMessage` reply with a matching status code.
pub async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = classify(&err);
    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
        stacktraces: vec![],
    });
    Ok(warp::reply::with_status(json, code))
}
