//! Command dispatch and status tracking for VoxMap
//!
//! Owns the bounded command log, routes each intent to its kind-specific
//! handler, and tracks the `Pending → Processing → {Completed | Failed}`
//! lifecycle. Handlers call external collaborators through the injected
//! trait objects in `collab`; in-memory mock collaborators live in
//! `mock` for tests and the demo binary.

pub mod collab;
pub mod dispatcher;
pub mod log;
pub mod mock;
pub mod record;

pub use collab::{
    CollabError, Collaborators, GeocodeResult, GeocodingClient, LatLng, LayerDescriptor,
    LayerRegistry, LocationProvider, MapControl, PoiClient, PoiResult,
};
pub use dispatcher::{CommandDispatcher, CommandError, CommandEvent};
pub use log::CommandLog;
pub use record::{CommandRecord, CommandSource, CommandStatus};
