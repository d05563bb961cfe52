//! Presence and navigation core.
//!
//! Acquires the user's own position, publishes it to a shared presence
//! backend, polls the other participants, keeps a walking route to a chosen
//! participant fresh, and mediates the map camera between automatic moves and
//! user interaction.
//!
//! Every background activity (position watch, publish refresh, roster poll,
//! route refresh, follow mode) is owned through a [`runtime::TaskHandle`], so
//! stopping a feature or dropping the [`PresenceWidget`] releases it.

use std::future::Future;
use std::pin::Pin;

pub mod backend;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod navigation;
pub mod notice;
pub mod poller;
pub mod protocol;
pub mod publisher;
pub mod routing;
pub mod view;
pub mod widget;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::*;
pub use config::*;
pub use error::*;
pub use geolocation::*;
pub use model::*;
pub use navigation::*;
pub use notice::*;
pub use poller::*;
pub use protocol::*;
pub use publisher::*;
pub use routing::*;
pub use view::*;
pub use widget::*;

/// Boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
