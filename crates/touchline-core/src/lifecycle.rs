//! Session creation and shutdown.
//!
//! [`Session::create`] dials the authority, joins a team and returns a live
//! session that has not yet consumed any snapshot. Nothing is retried: a
//! failed dial or a refused join is reported once and the half-built session
//! is torn down. Shutdown lives on [`Session::stop`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    config::SessionConfig,
    error::SessionError,
    service::{GameService, RemoteGame},
    session::Session,
    transport::{Transport, TransportConnection},
};

impl<C: TransportConnection> Session<C> {
    /// Connect to the authority and join a team.
    ///
    /// Returns the session lifetime token alongside the session. The token is
    /// cancelled exactly when the session ends, whether through
    /// [`Session::stop`] or because the snapshot stream closed or failed.
    ///
    /// The join exchange is bounded by `config.handshake_timeout`; dialing is
    /// bounded only by the transport.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Connection`] if the authority cannot be reached
    /// - [`SessionError::Handshake`] if the join is refused, breaks down, or
    ///   times out. The connection is closed before returning.
    pub async fn create<T>(
        transport: &T,
        config: &SessionConfig,
    ) -> Result<(CancellationToken, Self), SessionError>
    where
        T: Transport<Connection = C>,
    {
        let connection = transport.connect(&config.authority_addr).await.map_err(|source| {
            SessionError::Connection { addr: config.authority_addr.clone(), source }
        })?;
        let connection = Arc::new(connection);
        let game = RemoteGame::new(Arc::clone(&connection));

        let joined =
            tokio::time::timeout(config.handshake_timeout, game.join_a_team(config.join_request()))
                .await
                .unwrap_or_else(|_| {
                    Err(SessionError::Handshake {
                        reason: format!(
                            "no answer to join within {:?}",
                            config.handshake_timeout
                        ),
                    })
                });

        let stream = match joined {
            Ok(stream) => stream,
            Err(err) => {
                if let Err(close_err) = connection.close(1, "join failed") {
                    tracing::warn!(
                        addr = %config.authority_addr,
                        error = %close_err,
                        "failed to close connection after join failure"
                    );
                }
                return Err(err);
            },
        };

        tracing::info!(
            addr = %config.authority_addr,
            number = config.number,
            side = ?config.team_side,
            "joined match"
        );

        let lifetime = CancellationToken::new();
        let service: Arc<dyn GameService> = Arc::new(game);
        let session = Session::from_parts(connection, service, stream, lifetime.clone());
        Ok((lifetime, session))
    }
}
