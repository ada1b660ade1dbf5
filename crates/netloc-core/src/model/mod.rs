// ── Domain model ──
//
// Plain value types shared by every stage of the settle pipeline.

pub mod profile;
pub mod proxy;
pub mod snapshot;

pub use profile::{LocationProfile, LocationSet};
pub use proxy::{ProxyDirective, ProxyEndpoint, ProxyKind, ProxySpec, ResolvedProxy};
pub use snapshot::{Fingerprint, NetworkSnapshot};
