//! Maps `(domain, title, type)` to an article URL and a header set, ready
//! to hand to the Renderer.
//!
//! `domain` is a caller-supplied wiki host (e.g. `en.wikipedia.org`); it is
//! not interpreted further beyond the `type`-dependent host transform
//! below. `domain`/host legality (scheme, user-info, deny-list) is the
//! renderer's job via the §4.7 allow-rule, not this helper's.

use docrender_ports::DeviceProfile;
use std::collections::BTreeMap;

/// An article URL plus the header set to send alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRequest {
    /// The fully composed `https://` article URL.
    pub url: String,
    /// Header overrides for this request. Empty by default: per-job header
    /// overrides are a renderer-configuration concern, not something this
    /// helper derives from `(domain, title, type)`.
    pub headers: BTreeMap<String, String>,
}

/// Build the article URL for `domain`/`title` under the given device type.
///
/// `title` is taken post-percent-decoding (as an HTTP router hands it over)
/// and re-encoded with spaces mapped to underscores, MediaWiki's own
/// canonical `/wiki/{title}` convention. `device_profile` selects the host:
/// `Mobile` prefixes the domain's first label with `m.` (mirroring
/// Wikipedia's `en.wikipedia.org` → `en.m.wikipedia.org` convention) unless
/// it is already so prefixed; `Desktop` leaves the domain unchanged.
#[must_use]
pub fn build_article_request(
    domain: &str,
    title: &str,
    device_profile: DeviceProfile,
) -> ArticleRequest {
    let host = mobile_host(domain, device_profile);
    let path_title = title.trim().replace(' ', "_");
    let url = format!("https://{host}/wiki/{path_title}");

    ArticleRequest {
        url,
        headers: BTreeMap::new(),
    }
}

fn mobile_host(domain: &str, device_profile: DeviceProfile) -> String {
    match device_profile {
        DeviceProfile::Desktop => domain.to_string(),
        DeviceProfile::Mobile => {
            if domain.starts_with("m.") || domain.split('.').nth(1) == Some("m") {
                domain.to_string()
            } else {
                match domain.split_once('.') {
                    Some((first_label, rest)) => format!("{first_label}.m.{rest}"),
                    None => format!("m.{domain}"),
                }
            }
        },
    }
}
