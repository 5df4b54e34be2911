//! Typed notifications between components.
//!
//! Components that need to react to each other (the scheduler waiting for the store, a CLI
//! reporting progress) subscribe to a [`Topic`] on a shared [`EventBus`]. The bus is handed to
//! constructors explicitly; there is no global instance.
//!
//! # Examples
//!
//! ```
//! use shelf::event::{Event, EventBus, Topic};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::default();
//! let mut store_events = bus.subscribe(Topic::Store);
//!
//! bus.publish(Event::StoreReady);
//! assert_eq!(store_events.recv().await, Some(Event::StoreReady));
//! # }
//! ```

use tokio::sync::broadcast::{self, error::RecvError};

use super::*;

/// Default number of buffered events per subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Event categories a subscriber can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
  /// Record store lifecycle
  Store,
  /// Records written or removed
  Entities,
  /// Scheduled rescrape cycles
  Rescrape,
}

/// A notification published on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// The record store finished initializing and accepts operations
  StoreReady,
  /// Records were persisted
  EntitiesUpdated {
    /// Ids of the persisted records
    ids: Vec<Uuid>,
  },
  /// Records were removed
  EntitiesDeleted {
    /// Ids of the removed records
    ids: Vec<Uuid>,
  },
  /// A scheduled rescrape cycle persisted `count` records
  RescrapeFinished {
    /// Number of records persisted by the cycle
    count: usize,
  },
}

impl Event {
  /// The topic this event is delivered under.
  pub fn topic(&self) -> Topic {
    match self {
      Event::StoreReady => Topic::Store,
      Event::EntitiesUpdated { .. } | Event::EntitiesDeleted { .. } => Topic::Entities,
      Event::RescrapeFinished { .. } => Topic::Rescrape,
    }
  }
}

/// Broadcast bus for [`Event`]s. Cloning yields another handle to the same bus.
#[derive(Debug, Clone)]
pub struct EventBus {
  sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl EventBus {
  /// Creates a bus buffering up to `capacity` events per subscriber.
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  /// Publishes an event. Having no subscribers is not an error.
  pub fn publish(&self, event: Event) {
    trace!(?event, "Publishing event");
    let _ = self.sender.send(event);
  }

  /// Subscribes to every event of `topic` published from now on.
  pub fn subscribe(&self, topic: Topic) -> Subscription {
    Subscription { topic, receiver: self.sender.subscribe() }
  }
}

/// A receiver yielding the events of one topic.
#[derive(Debug)]
pub struct Subscription {
  topic:    Topic,
  receiver: broadcast::Receiver<Event>,
}

impl Subscription {
  /// The topic this subscription filters on.
  pub fn topic(&self) -> Topic { self.topic }

  /// Waits for the next event of the topic. Returns `None` once the bus is gone.
  ///
  /// A subscriber that falls behind skips the events it missed and keeps receiving.
  pub async fn recv(&mut self) -> Option<Event> {
    loop {
      match self.receiver.recv().await {
        Ok(event) if event.topic() == self.topic => return Some(event),
        Ok(_) => continue,
        Err(RecvError::Lagged(skipped)) => {
          warn!(skipped, topic = ?self.topic, "Subscriber lagged behind the event bus");
          continue;
        },
        Err(RecvError::Closed) => return None,
      }
    }
  }
}
