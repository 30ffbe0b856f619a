//! [`Rover`] – wires the relay link to the dispatcher.
//!
//! Tokens flow from the [`ConnectionManager`] straight into
//! [`Dispatcher::dispatch`] on one task, so commands are applied strictly in
//! arrival order.  When the link is given up the vehicle idles with its
//! motors in their last state until the shutdown signal arrives.  On
//! shutdown both motors are stopped.

use std::future::{Future, pending};

use rover_kernel::Dispatcher;
use rover_middleware::{ConnectionManager, RelayTransport};
use rover_types::{CommandToken, ConnectionState};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// The running vehicle.
pub struct Rover<T> {
    dispatcher: Dispatcher,
    connection: ConnectionManager<T>,
}

impl<T: RelayTransport> Rover<T> {
    pub fn new(dispatcher: Dispatcher, connection: ConnectionManager<T>) -> Self {
        Self {
            dispatcher,
            connection,
        }
    }

    /// Observe the relay connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for Ctrl-C; running until killed");
                pending::<()>().await;
            }
        })
        .await;
    }

    /// Run until `shutdown` completes, then stop the motors.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut dispatcher,
            mut connection,
        } = self;

        info!(endpoint = %connection.config().endpoint, "rover starting");
        {
            let mut sink = |token: CommandToken| {
                dispatcher.dispatch(&token);
            };
            let drive = async {
                connection.run(&mut sink).await;
                warn!("relay link given up; idling until shutdown");
                pending::<()>().await;
            };

            tokio::select! {
                () = drive => {}
                () = shutdown => info!("shutdown signal received"),
            }
        }

        dispatcher.stop_motors();
        info!("rover stopped");
    }
}
