//! Local address resolution.

use std::net::{IpAddr, Ipv4Addr};

use local_ip_address::list_afinet_netifas;

/// The first non-loopback IPv4 address bound to a local interface.
///
/// Returns `None` when interfaces cannot be listed or only loopback is up.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match list_afinet_netifas() {
        Ok(ifaces) => ifaces,
        Err(e) => {
            tracing::warn!(error = %e, "failed to enumerate network interfaces");
            return None;
        }
    };
    let found = first_usable_ipv4(interfaces.iter().map(|(_, ip)| *ip));
    match found {
        Some(ip) => tracing::debug!(%ip, "resolved local address"),
        None => tracing::warn!("no non-loopback IPv4 interface found"),
    }
    found
}

fn first_usable_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Some(v4),
        _ => None,
    })
}
