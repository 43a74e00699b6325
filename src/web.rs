use poem::listener::TcpListener;
use poem::middleware::{CatchPanic, Tracing};
use poem::{get, post, Endpoint, EndpointExt, Route, Server};

use crate::announce::Announcement;
use crate::artifacts::Model;
use crate::opts::ServeOpts;
use crate::prelude::*;
use crate::relay::ThingSpeak;
use crate::web::middleware::{ErrorMiddleware, SentryMiddleware};
use crate::web::state::State;

mod middleware;
mod state;
mod views;

/// Grace period for in-flight requests on shutdown.
const SHUTDOWN_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Runs the inference server until interrupted.
pub async fn run(opts: ServeOpts) -> Result {
    let model = match Model::load(&opts.artifacts) {
        Ok(model) => Some(Arc::new(model)),
        Err(error) => {
            error!("every request will be rejected: {:#}", error);
            None
        }
    };
    let state = State {
        model,
        relay: Arc::new(ThingSpeak::new(&opts.thingspeak)?),
        buzzer_strategy: opts.buzzer_strategy,
    };
    info!(channel_id = opts.thingspeak.channel_id.as_str(), buzzer_strategy = ?opts.buzzer_strategy);

    let announcement = if opts.no_mdns {
        None
    } else {
        Announcement::register(opts.port)
            .map_err(|error| error!("serving without the mDNS record: {:#}", error))
            .ok()
    };

    info!(host = %opts.host, port = opts.port, "listening…");
    let result = Server::new(TcpListener::bind((opts.host, opts.port)))
        .run_with_graceful_shutdown(create_app(state), shutdown_signal(), Some(SHUTDOWN_TIMEOUT))
        .await
        .context("the server has failed");

    if let Some(announcement) = announcement {
        if let Err(error) = announcement.unregister() {
            warn!("{:#}", error);
        }
    }
    result
}

pub fn create_app(state: State) -> impl Endpoint {
    Route::new()
        .at("/biodrying_data", post(views::biodrying::post_biodrying_data))
        .at("/health", get(views::health::get_health))
        .data(state)
        .with(Tracing)
        .with(CatchPanic::new())
        .with(ErrorMiddleware)
        .with(SentryMiddleware)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(_) => info!("shutting down…"),
        Err(error) => {
            error!("failed to listen for the interrupt signal: {:#}", error);
            std::future::pending::<()>().await;
        }
    }
}
