//! Liveness challenges settling contested distance table slots.
//!
//! When a bucket is full, the newcomer (challenger) only gets in if the least recently seen
//! occupant (challenged) fails to answer a ping. The challenge is keyed by that ping's message id.

use std::collections::hash_map::{Entry, HashMap};

use tracing::debug;

use crate::common::{MessageId, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    /// Waiting for the challenged node to answer.
    Pending,
    /// The challenged node answered, the challenger is discarded.
    OccupantAlive,
    /// The liveness ping expired, the challenged node goes through the retry and eviction path.
    Expired,
}

#[derive(Debug, Clone)]
pub struct NodeChallenge {
    pub challenged: Node,
    pub challenger: Node,
    pub id: MessageId,
    pub state: ChallengeState,
}

#[derive(Debug, Default)]
pub struct ChallengeManager {
    challenges: HashMap<MessageId, NodeChallenge>,
}

impl ChallengeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending challenge keyed by the id of the ping sent to `challenged`.
    ///
    /// Pings are sent once per address, so a later challenger of the same occupant
    /// shares that id. The first challenge stands and is returned, the later challenger is dropped.
    pub fn start(&mut self, challenged: Node, challenger: Node, ping_id: MessageId) -> NodeChallenge {
        match self.challenges.entry(ping_id) {
            Entry::Occupied(entry) => {
                debug!(
                    challenged = %challenged.id,
                    challenger = %challenger.id,
                    pending_challenger = %entry.get().challenger.id,
                    "Challenge already pending, dropping challenger"
                );

                entry.get().clone()
            }
            Entry::Vacant(entry) => entry
                .insert(NodeChallenge {
                    challenged,
                    challenger,
                    id: ping_id,
                    state: ChallengeState::Pending,
                })
                .clone(),
        }
    }

    /// Remove the challenge settled by a pong to its ping.
    pub fn resolve(&mut self, challenge_id: &MessageId) -> Option<NodeChallenge> {
        self.finish(challenge_id, ChallengeState::OccupantAlive)
    }

    /// Remove the challenge abandoned because its ping expired.
    pub fn expire(&mut self, challenge_id: &MessageId) -> Option<NodeChallenge> {
        self.finish(challenge_id, ChallengeState::Expired)
    }

    pub fn get(&self, challenge_id: &MessageId) -> Option<&NodeChallenge> {
        self.challenges.get(challenge_id)
    }

    pub fn count(&self) -> usize {
        self.challenges.len()
    }

    fn finish(&mut self, challenge_id: &MessageId, state: ChallengeState) -> Option<NodeChallenge> {
        let mut challenge = self.challenges.remove(challenge_id)?;
        challenge.state = state;

        Some(challenge)
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use super::*;

    fn node(port: u16) -> Node {
        Node::random(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn resolve() {
        let mut challenges = ChallengeManager::new();
        let id = MessageId::random();

        let challenge = challenges.start(node(1), node(2), id);

        assert_eq!(challenge.state, ChallengeState::Pending);
        assert_eq!(challenges.count(), 1);

        let resolved = challenges.resolve(&id).unwrap();

        assert_eq!(resolved.state, ChallengeState::OccupantAlive);
        assert_eq!(resolved.challenged, challenge.challenged);
        assert_eq!(challenges.count(), 0);
        assert!(challenges.resolve(&id).is_none());
    }

    #[test]
    fn expire() {
        let mut challenges = ChallengeManager::new();
        let id = MessageId::random();

        challenges.start(node(1), node(2), id);

        assert!(challenges.expire(&MessageId::random()).is_none());
        assert_eq!(challenges.count(), 1);

        assert_eq!(challenges.expire(&id).unwrap().state, ChallengeState::Expired);
        assert_eq!(challenges.count(), 0);
    }

    #[test]
    fn first_challenger_stands() {
        let mut challenges = ChallengeManager::new();
        let id = MessageId::random();
        let occupant = node(1);
        let first = node(2);

        challenges.start(occupant, first, id);
        let challenge = challenges.start(occupant, node(3), id);

        assert_eq!(challenge.challenger, first);
        assert_eq!(challenges.count(), 1);
        assert_eq!(challenges.get(&id).unwrap().challenger, first);
    }
}
