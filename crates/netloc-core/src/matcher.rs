//! Location matching.
//!
//! Profiles are tried in configured order. A profile matches when its
//! SSID set contains the snapshot's SSID **or** its domain set shares at
//! least one entry with the snapshot's search domains. A profile with no
//! criteria at all is a wildcard. The default profile is never tried in
//! the loop; it is what remains when nothing else matched, so its
//! position in the list does not shadow the profiles after it.

use std::sync::Arc;

use tracing::debug;

use crate::model::{LocationProfile, LocationSet, NetworkSnapshot};

/// Select the profile for `snapshot`. Always returns exactly one profile.
pub fn match_location(snapshot: &NetworkSnapshot, locations: &LocationSet) -> Arc<LocationProfile> {
    for profile in locations.profiles() {
        if locations.is_default(profile) {
            continue;
        }
        if let Some(reason) = match_reason(snapshot, profile) {
            debug!(location = %profile.name, reason, "location matched");
            return Arc::clone(profile);
        }
    }

    let fallback = locations.default_profile();
    debug!(location = %fallback.name, "no location matched, using default");
    Arc::clone(fallback)
}

/// Why `profile` matches `snapshot`, or `None` if it does not.
pub fn match_reason(snapshot: &NetworkSnapshot, profile: &LocationProfile) -> Option<&'static str> {
    if profile.is_wildcard() {
        return Some("wildcard");
    }

    if let Some(ssid) = snapshot.ssid.as_deref() {
        if profile.ssids.contains(ssid) {
            return Some("ssid");
        }
    }

    if profile
        .dns_search_domains
        .iter()
        .any(|d| snapshot.dns_search_domains.contains(d))
    {
        return Some("dns_search_domain");
    }

    None
}
