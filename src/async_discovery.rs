//! AsyncDiscovery node.

use crate::{
    common::Node,
    discovery::{ActorMessage, Discovery, DiscoveryWasShutdown},
    explorer::Info,
};

impl Discovery {
    /// Return an async version of the Discovery node.
    pub fn as_async(self) -> AsyncDiscovery {
        AsyncDiscovery(self)
    }
}

#[derive(Debug, Clone)]
/// Async version of the Discovery node.
pub struct AsyncDiscovery(Discovery);

impl AsyncDiscovery {
    // === Getters ===

    /// Information and statistics about this node.
    pub async fn info(&self) -> Result<Info, DiscoveryWasShutdown> {
        let (sender, receiver) = flume::bounded::<Info>(1);

        self.0
             .0
            .send(ActorMessage::Info(sender))
            .map_err(|_| DiscoveryWasShutdown)?;

        receiver.recv_async().await.map_err(|_| DiscoveryWasShutdown)
    }

    /// Snapshot of the nodes currently considered alive.
    pub async fn get_nodes(&self) -> Result<Vec<Node>, DiscoveryWasShutdown> {
        let (sender, receiver) = flume::bounded::<Vec<Node>>(1);

        self.0
             .0
            .send(ActorMessage::Nodes(sender))
            .map_err(|_| DiscoveryWasShutdown)?;

        receiver.recv_async().await.map_err(|_| DiscoveryWasShutdown)
    }

    // === Public Methods ===

    /// Shutdown the actor thread loop.
    pub async fn shutdown(&mut self) {
        let (sender, receiver) = flume::bounded::<()>(1);

        let _ = self.0 .0.send(ActorMessage::Shutdown(sender));
        let _ = receiver.recv_async().await;
    }
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr};

    use futures::executor;

    use super::*;

    #[test]
    fn shutdown() {
        async fn test() {
            let mut discovery = Discovery::builder()
                .bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
                .port(0)
                .build()
                .unwrap()
                .as_async();

            let info = discovery.info().await.unwrap();
            assert!(info.local_addr().port() != 0);

            assert!(discovery.get_nodes().await.unwrap().is_empty());

            discovery.shutdown().await;

            assert!(discovery.info().await.is_err());
        }

        executor::block_on(test());
    }
}
