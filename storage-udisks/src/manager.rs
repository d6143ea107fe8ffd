// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use storage_contracts::{StorageError, StorageEventListener, StorageEventSource, SubscriptionId};
use storage_types::{Disk, Volume};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zbus::{Connection, MatchRule, MessageStream, zvariant};
use zbus_macros::proxy;

use crate::error::DiskError;
use crate::inventory::{Inventory, ManagedObjects};

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2",
    interface = "org.freedesktop.DBus.ObjectManager"
)]
pub trait UDisks2ObjectManager {
    fn get_managed_objects(&self) -> zbus::Result<ManagedObjects>;

    #[zbus(signal)]
    fn interfaces_added(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces_and_properties: HashMap<String, HashMap<String, zvariant::OwnedValue>>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    fn interfaces_removed(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces: Vec<String>,
    ) -> zbus::Result<()>;
}

async fn read_inventory(connection: &Connection) -> Result<Inventory, DiskError> {
    let object_manager = UDisks2ObjectManagerProxy::new(connection).await?;
    let objects = object_manager.get_managed_objects().await?;
    Ok(Inventory::from_managed_objects(&objects))
}

/// Storage event source backed by UDisks2 on the system bus.
#[derive(Clone)]
pub struct UdisksEventSource {
    connection: Connection,
    subscriptions: Arc<Mutex<HashMap<SubscriptionId, JoinHandle<()>>>>,
}

impl UdisksEventSource {
    pub async fn new() -> Result<Self, DiskError> {
        let connection = Connection::system()
            .await
            .map_err(|e| DiskError::ConnectionFailed(e.to_string()))?;
        Ok(Self::with_connection(connection))
    }

    pub fn with_connection(connection: Connection) -> Self {
        Self {
            connection,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a reference to the D-Bus connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub async fn inventory(&self) -> Result<Inventory, DiskError> {
        read_inventory(&self.connection).await
    }

    fn subscriptions(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, JoinHandle<()>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageEventSource for UdisksEventSource {
    async fn list_disks(&self) -> Result<Vec<Disk>, StorageError> {
        Ok(self.inventory().await?.disks())
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>, StorageError> {
        Ok(self.inventory().await?.volumes())
    }

    /// Watch UDisks2 object and property signals and deliver inventory changes.
    ///
    /// All three signal streams feed one task, so the listener sees events serially.
    async fn subscribe(
        &self,
        listener: Arc<dyn StorageEventListener>,
    ) -> Result<SubscriptionId, StorageError> {
        let connection = self.connection.clone();
        let mut current = read_inventory(&connection).await?;

        let object_manager = UDisks2ObjectManagerProxy::new(&connection)
            .await
            .map_err(DiskError::from)?;
        let mut added_stream = object_manager
            .receive_interfaces_added()
            .await
            .map_err(DiskError::from)?;
        let mut removed_stream = object_manager
            .receive_interfaces_removed()
            .await
            .map_err(DiskError::from)?;

        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender("org.freedesktop.UDisks2")
            .and_then(|b| b.interface("org.freedesktop.DBus.Properties"))
            .and_then(|b| b.member("PropertiesChanged"))
            .and_then(|b| b.path_namespace("/org/freedesktop/UDisks2"))
            .map_err(DiskError::from)?
            .build();
        let mut changed_stream = MessageStream::for_match_rule(rule, &connection, Some(64))
            .await
            .map_err(DiskError::from)?;

        let id = SubscriptionId::new();
        let handle = tokio::spawn(async move {
            loop {
                let keep_going = tokio::select! {
                    signal = added_stream.next() => signal.is_some(),
                    signal = removed_stream.next() => signal.is_some(),
                    message = changed_stream.next() => match message {
                        Some(Ok(_)) => true,
                        Some(Err(e)) => {
                            warn!("Failed to read PropertiesChanged signal: {e}");
                            true
                        }
                        None => false,
                    },
                };
                if !keep_going {
                    break;
                }

                let next = match read_inventory(&connection).await {
                    Ok(inventory) => inventory,
                    Err(e) => {
                        warn!("Failed to refresh UDisks2 inventory: {e}");
                        continue;
                    }
                };

                for event in current.diff(&next) {
                    debug!("Delivering {} event", event.kind());
                    listener.dispatch(&event);
                }
                current = next;
            }

            debug!("UDisks2 signal streams closed ({id})");
        });

        self.subscriptions().insert(id, handle);
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StorageError> {
        match self.subscriptions().remove(&id) {
            Some(handle) => {
                handle.abort();
                Ok(())
            }
            None => Err(StorageError::not_found(format!("subscription {id}"))),
        }
    }
}
