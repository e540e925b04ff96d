//! Live meeting session synchronizer.
//!
//! Keeps the locally displayed agenda page and meeting instance consistent
//! across a server push feed that may arrive late or out of order, optimistic
//! local mutations that must show instantly, and multiple attendees who follow
//! a designated leader.
//!
//! Data flows leaf-first: [`clock`] and push ticks feed the
//! [`optimistic`] fields owned by [`session`], the [`follow`] synchronizer
//! picks the effective page, and [`timer`] derives durations for display.
//! [`controller`] drives a session against an async request transport.

pub mod agenda;
pub mod clock;
pub mod config;
pub mod controller;
pub mod follow;
pub mod model;
pub mod optimistic;
pub mod request;
pub mod session;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::SyncConfig;
pub use controller::{MeetingTransport, SessionController, TransportError};
pub use follow::{FollowMode, LeaderHandOff};
pub use model::{AgendaPage, CurrentUser, MeetingInstance, PageTimer, PageType, PushError, PushTick};
pub use request::MeetingRequest;
pub use session::{MeetingSession, NavigationBlock, NavigationStatus, Notification, SessionError, SessionView};
pub use timer::{MeetingClock, PageClock, RemainingDisplay};
