use log::{debug, error, info, warn};

use crate::models::interface::InterfaceInfo;
use crate::utils::error::{AppError, AppResult};

/// Name prefixes of interfaces that are never worth monitoring by default:
/// loopback, tunnels/VPNs, bridges, overlays and container/VM plumbing.
const SKIP_PREFIXES: &[&str] = &[
    // Loopback
    "lo", "lo0",
    // Virtual/tunnel
    "utun", "anpi", "stf", "gif", "tun", "tap", "ipsec", "ppp", "sit", "ip6tnl", "gre",
    "erspan", "ip6gre", "dummy", "teql",
    // Bridges
    "bridge", "br-", "virbr",
    // P2P/VPN overlays
    "p2p", "wg", "tailscale", "zt",
    // VM/container
    "vmnet", "veth", "docker",
    // Others
    "ham",
];

/// Name prefixes of physical links: wired Ethernet, WiFi, cellular.
const PREFERRED_PREFIXES: &[&str] = &[
    // macOS/BSD
    "en",
    // Linux Ethernet
    "eth", "ens", "enp", "enx", "em",
    // WiFi
    "wlan", "wlp", "wl", "wlx", "wifi",
    // Mobile/WWAN
    "wwan", "wwp",
];

fn has_prefix(name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| name.starts_with(p))
}

/// Choose which interfaces to monitor.
///
/// First non-empty tier wins: preferred physical links with a non-loopback
/// address, then any other interface with a non-loopback address, then every
/// interface that is not on the skip list, then the input unchanged. The
/// result is therefore never empty for a non-empty input.
pub fn select_interfaces(all: &[InterfaceInfo]) -> Vec<InterfaceInfo> {
    let mut preferred = Vec::new();
    let mut active = Vec::new();
    let mut not_skipped = Vec::new();

    for iface in all {
        let name = iface.name.to_lowercase();

        if has_prefix(&name, SKIP_PREFIXES) {
            debug!("Skipping virtual/loopback interface {}", iface.name);
            continue;
        }

        not_skipped.push(iface.clone());

        if !iface.has_non_loopback_address() {
            continue;
        }

        if has_prefix(&name, PREFERRED_PREFIXES) {
            preferred.push(iface.clone());
        } else {
            active.push(iface.clone());
        }
    }

    if !preferred.is_empty() {
        return preferred;
    }
    if !active.is_empty() {
        return active;
    }
    if !not_skipped.is_empty() {
        return not_skipped;
    }
    all.to_vec()
}

/// List the system's network interfaces.
///
/// pcap's device list is authoritative because that is what capture handles
/// are opened against; pnet_datalink is the fallback when libpcap cannot
/// enumerate devices.
pub fn discover_interfaces() -> AppResult<Vec<InterfaceInfo>> {
    info!("Fetching network interface information");

    let interfaces: Vec<InterfaceInfo> = match pcap::Device::list() {
        Ok(devices) => devices.into_iter().map(InterfaceInfo::from).collect(),
        Err(e) => {
            error!("Failed to get interfaces from pcap: {}", e);
            warn!("Falling back to pnet_datalink interface listing");
            pnet_datalink::interfaces()
                .into_iter()
                .map(InterfaceInfo::from)
                .collect()
        }
    };

    if interfaces.is_empty() {
        return Err(AppError::NoInterfaces);
    }

    info!("Found {} interfaces", interfaces.len());
    Ok(interfaces)
}

/// Resolve the interfaces to capture on: explicitly requested names when
/// given, otherwise the selector's choice.
pub fn resolve_interfaces(
    all: &[InterfaceInfo],
    requested: &[String],
) -> AppResult<Vec<InterfaceInfo>> {
    if requested.is_empty() {
        let selected = select_interfaces(all);
        if selected.is_empty() {
            return Err(AppError::NoInterfaces);
        }
        return Ok(selected);
    }

    let mut chosen = Vec::with_capacity(requested.len());
    for name in requested {
        match all.iter().find(|iface| &iface.name == name) {
            Some(iface) => chosen.push(iface.clone()),
            None => {
                // The provider may still be able to open it, e.g. "any" on Linux.
                warn!("Interface {} not in the device list, trying it anyway", name);
                chosen.push(InterfaceInfo::new(name.clone()));
            }
        }
    }
    Ok(chosen)
}
