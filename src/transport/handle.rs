//! Cross-thread send handle.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::core::{TransportError, TransportResult};
use crate::protocol::{ConnectionId, DeliveryMode};

/// Work queued by a [`SendHandle`] for the next poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Send {
        connection: ConnectionId,
        payload: Vec<u8>,
        mode: DeliveryMode,
    },
    Close {
        connection: ConnectionId,
    },
}

/// Handle for sending from other threads or tasks.
///
/// Commands are queued and applied at the start of the owner's next
/// `poll()`. Errors that only show up then (such as a closed connection)
/// are logged and dropped.
pub struct SendHandle {
    connection: Option<ConnectionId>,
    tx: mpsc::Sender<Command>,
}

impl SendHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>, connection: Option<ConnectionId>) -> Self {
        Self { connection, tx }
    }

    /// Queue a payload for the bound connection.
    pub fn send(&self, payload: impl Into<Vec<u8>>, mode: DeliveryMode) -> TransportResult<()> {
        let connection = self.connection.ok_or_else(|| {
            TransportError::InvalidSend("handle is not bound to a connection".into())
        })?;
        self.send_to(connection, payload, mode)
    }

    /// Queue a payload for `connection`.
    pub fn send_to(
        &self,
        connection: ConnectionId,
        payload: impl Into<Vec<u8>>,
        mode: DeliveryMode,
    ) -> TransportResult<()> {
        self.push(Command::Send {
            connection,
            payload: payload.into(),
            mode,
        })
    }

    /// Queue a close of `connection`.
    pub fn close(&self, connection: ConnectionId) -> TransportResult<()> {
        self.push(Command::Close { connection })
    }

    /// Bound connection, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Same channel, bound to `connection`.
    pub fn bind_to(&self, connection: ConnectionId) -> Self {
        Self {
            connection: Some(connection),
            tx: self.tx.clone(),
        }
    }

    fn push(&self, command: Command) -> TransportResult<()> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Congestion,
            TrySendError::Closed(_) => TransportError::ConnectionClosed,
        })
    }
}

impl Clone for SendHandle {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection,
            tx: self.tx.clone(),
        }
    }
}

impl std::fmt::Debug for SendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendHandle")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_handle_needs_target() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = SendHandle::new(tx, None);

        let err = handle.send(b"x".to_vec(), DeliveryMode::Reliable).unwrap_err();
        assert!(matches!(err, TransportError::InvalidSend(_)));

        handle
            .send_to(ConnectionId::new(3), b"x".to_vec(), DeliveryMode::Reliable)
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            Command::Send {
                connection: ConnectionId::new(3),
                payload: b"x".to_vec(),
                mode: DeliveryMode::Reliable,
            }
        );
    }

    #[test]
    fn test_full_channel_is_congestion() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = SendHandle::new(tx, Some(ConnectionId::new(1)));

        handle.send(vec![1], DeliveryMode::Unreliable).unwrap();
        let err = handle.send(vec![2], DeliveryMode::Unreliable).unwrap_err();
        assert!(matches!(err, TransportError::Congestion));
    }

    #[test]
    fn test_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        let handle = SendHandle::new(tx, Some(ConnectionId::new(1)));
        drop(rx);

        let err = handle.close(ConnectionId::new(1)).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[test]
    fn test_bind_to_shares_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = SendHandle::new(tx, None).bind_to(ConnectionId::new(7));
        assert_eq!(handle.connection(), Some(ConnectionId::new(7)));

        handle.clone().send(b"hi".to_vec(), DeliveryMode::Notify).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            Command::Send { connection, .. } if connection == ConnectionId::new(7)
        ));
    }
}
