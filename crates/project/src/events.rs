use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::error::LifecycleError;
use crate::path::NormalizedPath;

/// Identity or existence change of a path, caused by an explicit user action.
/// 由使用者操作（刪除、改名、移動）造成的路徑生命週期變化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    FileDeleted {
        path: NormalizedPath,
    },
    FileRenamed {
        from: NormalizedPath,
        to: NormalizedPath,
    },
    FolderDeleted {
        path: NormalizedPath,
    },
    FolderRenamed {
        from: NormalizedPath,
        to: NormalizedPath,
    },
}

impl LifecycleEvent {
    /// Directories whose listing changed because of this event.
    pub fn affected_directories(&self) -> Vec<NormalizedPath> {
        let mut dirs = Vec::with_capacity(2);
        let mut push_parent = |path: &NormalizedPath| {
            if let Some(parent) = path.parent() {
                if !dirs.contains(&parent) {
                    dirs.push(parent);
                }
            }
        };
        match self {
            LifecycleEvent::FileDeleted { path } | LifecycleEvent::FolderDeleted { path } => {
                push_parent(path)
            }
            LifecycleEvent::FileRenamed { from, to } | LifecycleEvent::FolderRenamed { from, to } => {
                push_parent(from);
                push_parent(to);
            }
        }
        dirs
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::FileDeleted { path } => write!(f, "file deleted: {path}"),
            LifecycleEvent::FileRenamed { from, to } => write!(f, "file renamed: {from} -> {to}"),
            LifecycleEvent::FolderDeleted { path } => write!(f, "folder deleted: {path}"),
            LifecycleEvent::FolderRenamed { from, to } => {
                write!(f, "folder renamed: {from} -> {to}")
            }
        }
    }
}

/// Receives lifecycle events synchronously.
pub trait LifecycleSubscriber {
    fn on_lifecycle(&mut self, event: &LifecycleEvent) -> Result<(), LifecycleError>;
}

/// Handle returned by [`LifecycleEventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Synchronous, ordered publish/subscribe channel for lifecycle events.
/// 同步且依訂閱順序派送的生命週期事件匯流排。
///
/// Subscribers are held weakly: the bus never keeps a registry alive, and a
/// dropped subscriber simply stops receiving events. Delivery stops at the
/// first failing handler and the error goes back to the publisher; handlers
/// that already ran keep their changes.
#[derive(Default)]
pub struct LifecycleEventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Weak<RefCell<dyn LifecycleSubscriber>>)>,
}

impl LifecycleEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<S>(&mut self, subscriber: &Rc<RefCell<S>>) -> SubscriptionId
    where
        S: LifecycleSubscriber + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let strong: Rc<RefCell<dyn LifecycleSubscriber>> = subscriber.clone();
        let weak = Rc::downgrade(&strong);
        self.subscribers.push((id, weak));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every live subscriber in subscription order.
    /// Returns how many handlers ran.
    pub fn publish(&mut self, event: &LifecycleEvent) -> Result<usize, LifecycleError> {
        self.subscribers.retain(|(_, weak)| weak.strong_count() > 0);
        let targets: Vec<_> = self
            .subscribers
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|strong| (*id, strong)))
            .collect();

        debug!("publishing {event} to {} subscriber(s)", targets.len());
        let mut delivered = 0;
        for (id, subscriber) in targets {
            let mut handler = subscriber
                .try_borrow_mut()
                .map_err(|_| LifecycleError::SubscriberBusy(id))?;
            if let Err(err) = handler.on_lifecycle(event) {
                warn!("delivery of {event} stopped at subscriber {id}: {err}");
                return Err(err);
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl fmt::Debug for LifecycleEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEventBus")
            .field("subscribers", &self.len())
            .finish()
    }
}
