//! callroom-meeting – Adapter fuer den externen Video-Meeting-Provider
//!
//! Der Provider liefert echte Media-Raeume. Ist er nicht erreichbar oder
//! nicht konfiguriert, erzeugt der [`MeetingAdapter`] lokal einen
//! deterministischen Ersatz-Raum. Das Anlegen eines Anrufs scheitert daher
//! nie allein am Provider.

pub mod adapter;
pub mod error;
pub mod fallback;
pub mod http;
pub mod provider;

pub use adapter::{MeetingAdapter, RaumKoordinaten};
pub use error::{ProviderError, ProviderResult};
pub use http::{HttpMeetingProvider, HttpProviderKonfig};
pub use provider::{MeetingProvider, ProviderRaum};
