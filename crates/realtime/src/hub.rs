//! Subscriber hub (C9): `{campaign_id: {user_id: connection}}`.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

type Room = DashMap<Uuid, mpsc::UnboundedSender<String>>;

/// Holds one outbound channel per connected (campaign, user) pair.
/// Connecting replaces any existing connection for the same pair —
/// dropping the old sender ends that connection's write task.
pub struct Hub {
    rooms: DashMap<Uuid, Room>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Registers a connection, returning the replaced sender (if any)
    /// so the caller can close the superseded socket.
    pub fn connect(
        &self,
        campaign_id: Uuid,
        user_id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    ) -> Option<mpsc::UnboundedSender<String>> {
        let room = self.rooms.entry(campaign_id).or_insert_with(DashMap::new);
        let previous = room.insert(user_id, sender);
        info!(%campaign_id, %user_id, room_size = room.len(), "websocket connected");
        previous
    }

    pub fn disconnect(&self, campaign_id: Uuid, user_id: Uuid) {
        if let Some(room) = self.rooms.get(&campaign_id) {
            room.remove(&user_id);
            let is_empty = room.is_empty();
            drop(room);
            if is_empty {
                self.rooms.remove(&campaign_id);
            }
        }
        info!(%campaign_id, %user_id, "websocket disconnected");
    }

    /// Best-effort: dropped if the user has no open connection.
    pub fn send_to_user(&self, campaign_id: Uuid, user_id: Uuid, message: &str) -> bool {
        match self.rooms.get(&campaign_id) {
            Some(room) => match room.get(&user_id) {
                Some(sender) => sender.send(message.to_string()).is_ok(),
                None => false,
            },
            None => false,
        }
    }

    /// Snapshots the room's senders, then releases the lock before
    /// fanning out — a slow/dead connection must not block the room.
    pub fn broadcast(&self, campaign_id: Uuid, message: &str) -> usize {
        let Some(room) = self.rooms.get(&campaign_id) else {
            return 0;
        };
        let senders: Vec<_> = room.iter().map(|e| (*e.key(), e.value().clone())).collect();
        drop(room);

        let mut sent = 0;
        let mut dead = Vec::new();
        for (user_id, sender) in senders {
            if sender.send(message.to_string()).is_ok() {
                sent += 1;
            } else {
                dead.push(user_id);
            }
        }

        for user_id in dead {
            self.disconnect(campaign_id, user_id);
        }

        sent
    }

    pub fn active_campaigns(&self) -> Vec<Uuid> {
        self.rooms.iter().map(|e| *e.key()).collect()
    }

    pub fn connected_users(&self, campaign_id: Uuid) -> Vec<Uuid> {
        match self.rooms.get(&campaign_id) {
            Some(room) => room.iter().map(|e| *e.key()).collect(),
            None => Vec::new(),
        }
    }

    pub fn room_size(&self, campaign_id: Uuid) -> usize {
        self.rooms.get(&campaign_id).map(|r| r.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn connect_then_disconnect_cleans_up_empty_room() {
        let hub = Hub::new();
        let campaign_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let (tx, _rx) = unbounded_channel();

        hub.connect(campaign_id, user_id, tx);
        assert_eq!(hub.room_size(campaign_id), 1);

        hub.disconnect(campaign_id, user_id);
        assert_eq!(hub.room_size(campaign_id), 0);
        assert!(hub.active_campaigns().is_empty());
    }

    #[test]
    fn reconnect_replaces_existing_connection() {
        let hub = Hub::new();
        let campaign_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let (tx1, rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();

        hub.connect(campaign_id, user_id, tx1);
        let replaced = hub.connect(campaign_id, user_id, tx2);
        assert!(replaced.is_some());
        assert_eq!(hub.room_size(campaign_id), 1);

        // old sender still works until its receiver is dropped, but
        // the hub no longer routes to it
        drop(rx1);
    }

    #[test]
    fn broadcast_counts_live_connections_and_prunes_dead_ones() {
        let hub = Hub::new();
        let campaign_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let (tx, rx) = unbounded_channel();
        hub.connect(campaign_id, user_id, tx);
        drop(rx);

        let sent = hub.broadcast(campaign_id, "hello");
        assert_eq!(sent, 0);
        assert_eq!(hub.room_size(campaign_id), 0);
    }
}
