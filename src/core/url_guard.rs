//! Boundary check applied by front-ends before a URL reaches the fetcher.
//!
//! The fetcher accepts any absolute http(s) URL so it can be reused in
//! trusted contexts. User-supplied input goes through [`check_target_url`]
//! first, which additionally refuses local targets.

use std::net::IpAddr;
use url::{Host, Url};

use super::error::UrlRejected;

pub fn check_target_url(raw: &str) -> Result<Url, UrlRejected> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlRejected::Empty);
    }

    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("file:") {
        return Err(UrlRejected::Scheme("file".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| UrlRejected::Unparseable(format!("{raw} ({e})")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlRejected::Scheme(url.scheme().to_string()));
    }

    match url.host() {
        None => return Err(UrlRejected::Unparseable(raw.to_string())),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                return Err(UrlRejected::LocalHost(domain));
            }
        }
        Some(Host::Ipv4(ip)) => reject_local_ip(IpAddr::V4(ip))?,
        Some(Host::Ipv6(ip)) => reject_local_ip(IpAddr::V6(ip))?,
    }

    Ok(url)
}

fn reject_local_ip(ip: IpAddr) -> Result<(), UrlRejected> {
    // `::ffff:127.0.0.1` is loopback only once unmapped.
    let ip = ip.to_canonical();
    if ip.is_loopback() || ip.is_unspecified() {
        return Err(UrlRejected::LocalHost(ip.to_string()));
    }
    Ok(())
}
