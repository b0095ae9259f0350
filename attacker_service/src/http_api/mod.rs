//! The HTTP server validator clients call into.
//!
//! Hook handlers run on blocking threads so that a delay action can hold its request open for as
//! long as it needs without stalling the executor.


use crate::backend::BeaconBackend;
use crate::dispatcher::HookRequest;
use crate::hook::HookName;
use crate::metrics;
use crate::strategy::Strategy;
use crate::AttackerService;
use eth2::types::GenericResponse;
use serde::{Deserialize, Serialize};
use slog::{info, Logger};
use slot_clock::SlotClock;
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use types::Epoch;
use warp::Filter;

#[derive(Debug)]
pub enum Error {
    Warp(warp::Error),
    Other(String),
}

impl From<warp::Error> for Error {
    fn from(e: warp::Error) -> Self {
        Error::Warp(e)
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

/// A wrapper around all the items required to spawn the HTTP server.
pub struct Context<T: SlotClock, B: BeaconBackend> {
    pub service: Arc<AttackerService<T, B>>,
    pub config: Config,
    pub log: Logger,
}

/// Configuration for the HTTP server.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_addr: IpAddr,
    pub listen_port: u16,
    pub allow_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            listen_port: crate::config::DEFAULT_HTTP_PORT,
            allow_origin: None,
        }
    }
}

/// Returned by `POST /v1/update-strategy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledStrategy {
    pub uid: String,
}

/// Creates a server that will serve requests using information from `ctx`.
///
/// The server will shut down gracefully when the `shutdown` future resolves.
///
/// ## Returns
///
/// This function will bind the server to the provided address and then return a tuple of:
///
/// - `SocketAddr`: the address that the HTTP server will listen on.
/// - `Future`: the actual server future that will need to be awaited.
pub fn serve<T: SlotClock + 'static, B: BeaconBackend>(
    ctx: Arc<Context<T, B>>,
    shutdown: impl Future<Output = ()> + Send + Sync + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), Error> {
    let config = &ctx.config;

    let cors_builder = {
        let builder = warp::cors()
            .allow_methods(vec!["GET", "POST"])
            .allow_headers(vec!["Content-Type"]);

        warp_utils::cors::set_builder_origins(
            builder,
            config.allow_origin.as_deref(),
            (config.listen_addr, config.listen_port),
        )?
    };

    let routes = routes(ctx.service.clone()).with(cors_builder.build());

    let (listening_socket, server) = warp::serve(routes).try_bind_with_graceful_shutdown(
        SocketAddr::new(config.listen_addr, config.listen_port),
        async {
            shutdown.await;
        },
    )?;

    info!(
        ctx.log,
        "HTTP API started";
        "listen_address" => listening_socket.to_string(),
    );

    Ok((listening_socket, server))
}

/// Every route served by the API, with rejections already mapped to responses.
pub fn routes<T: SlotClock + 'static, B: BeaconBackend>(
    service: Arc<AttackerService<T, B>>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    let service_filter = warp::any().map(move || service.clone());

    // GET v1/strategy
    let get_strategy = warp::path("v1")
        .and(warp::path("strategy"))
        .and(warp::path::end())
        .and(service_filter.clone())
        .and_then(|service: Arc<AttackerService<T, B>>| {
            warp_utils::task::blocking_json_task(move || {
                let rule_set = service.strategy();
                let mut strategy = rule_set.strategy.clone();
                if !rule_set.uid.is_empty() {
                    strategy.uid = Some(rule_set.uid.clone());
                }
                Ok(strategy)
            })
        });

    // POST v1/update-strategy
    let post_update_strategy = warp::path("v1")
        .and(warp::path("update-strategy"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(service_filter.clone())
        .and_then(|strategy: Strategy, service: Arc<AttackerService<T, B>>| {
            warp_utils::task::blocking_json_task(move || {
                service
                    .install_strategy(strategy)
                    .map(|rule_set| InstalledStrategy {
                        uid: rule_set.uid.clone(),
                    })
                    .map_err(|e| warp_utils::reject::custom_bad_request(e.to_string()))
            })
        });

    // GET v1/duties/{epoch}
    let get_duties = warp::path("v1")
        .and(warp::path("duties"))
        .and(warp::path::param::<Epoch>())
        .and(warp::path::end())
        .and(service_filter.clone())
        .and_then(|epoch: Epoch, service: Arc<AttackerService<T, B>>| {
            warp_utils::task::blocking_json_task(move || {
                service
                    .backend()
                    .proposer_duties(epoch)
                    .map(GenericResponse::from)
                    .map_err(|e| warp_utils::reject::beacon_node_error(format!("{:?}", e)))
            })
        });

    // GET v1/feedback/{uid}
    let get_feedback = warp::path("v1")
        .and(warp::path("feedback"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(service_filter.clone())
        .and_then(|uid: String, service: Arc<AttackerService<T, B>>| {
            warp_utils::task::blocking_json_task(move || {
                service.feedback().completed(&uid).ok_or_else(|| {
                    warp_utils::reject::custom_not_found(format!(
                        "strategy {} has not completed",
                        uid
                    ))
                })
            })
        });

    // POST v1/hook/{hook_name}
    let post_hook = warp::path("v1")
        .and(warp::path("hook"))
        .and(warp::path::param::<HookName>())
        .and(warp::path::end())
        .and(warp::body::json())
        .and(service_filter.clone())
        .and_then(
            |hook: HookName, request: HookRequest, service: Arc<AttackerService<T, B>>| {
                warp_utils::task::blocking_json_task(move || {
                    Ok(service.dispatch(
                        hook,
                        request.slot,
                        &request.pubkey,
                        request.payload.as_deref(),
                    ))
                })
            },
        );

    // POST v1/block/broadcast-delay
    let post_block_broadcast_delay = warp::path("v1")
        .and(warp::path("block"))
        .and(warp::path("broadcast-delay"))
        .and(warp::path::end())
        .and(service_filter.clone())
        .and_then(|service: Arc<AttackerService<T, B>>| {
            warp_utils::task::blocking_json_task(move || Ok(service.block_broadcast_delay()))
        });

    // POST v1/attest/broadcast-delay
    let post_attest_broadcast_delay = warp::path("v1")
        .and(warp::path("attest"))
        .and(warp::path("broadcast-delay"))
        .and(warp::path::end())
        .and(service_filter.clone())
        .and_then(|service: Arc<AttackerService<T, B>>| {
            warp_utils::task::blocking_json_task(move || Ok(service.attest_broadcast_delay()))
        });

    // POST v1/attest/modify
    let post_attest_modify = warp::path("v1")
        .and(warp::path("attest"))
        .and(warp::path("modify"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(service_filter.clone())
        .and_then(
            |request: HookRequest, service: Arc<AttackerService<T, B>>| {
                warp_utils::task::blocking_json_task(move || {
                    Ok(service.modify_attestation(
                        request.slot,
                        &request.pubkey,
                        request.payload.as_deref(),
                    ))
                })
            },
        );

    // GET metrics
    let get_metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(service_filter)
        .and_then(|service: Arc<AttackerService<T, B>>| {
            warp_utils::task::blocking_task(move || {
                metrics::set_gauge(
                    &metrics::KNOWN_VALIDATORS,
                    service.validators().num_validators() as i64,
                );
                metrics::set_gauge(
                    &metrics::POOLED_ATTESTATIONS,
                    service.validators().pool_len() as i64,
                );
                metrics::set_gauge(
                    &metrics::STRATEGIES_PENDING,
                    service.feedback().pending_count() as i64,
                );
                metrics::encode_text().map_err(warp_utils::reject::custom_server_error)
            })
        })
        .map(|text: String| warp::reply::with_header(text, "Content-Type", "text/plain"));

    warp::get()
        .and(get_strategy.or(get_duties).or(get_feedback).or(get_metrics))
        .or(warp::post().and(
            post_update_strategy
                .or(post_hook)
                .or(post_block_broadcast_delay)
                .or(post_attest_broadcast_delay)
                .or(post_attest_modify),
        ))
        .recover(warp_utils::reject::handle_rejection)
}
