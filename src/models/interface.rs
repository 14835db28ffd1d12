use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A network interface as reported by the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Device system name (used for capture operations)
    pub name: String,

    /// Interface description, if the provider has one
    pub description: Option<String>,

    /// Addresses bound to the interface
    pub addresses: Vec<IpAddr>,
}

impl InterfaceInfo {
    /// Create a new interface info with just the device name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            addresses: Vec::new(),
        }
    }

    /// Set the bound addresses
    pub fn with_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    /// True when at least one bound address is not a loopback address
    pub fn has_non_loopback_address(&self) -> bool {
        self.addresses.iter().any(|ip| !ip.is_loopback())
    }

    /// Name plus addresses, for listings
    pub fn formatted_display(&self) -> String {
        let mut out = self.name.clone();
        if !self.addresses.is_empty() {
            let addrs: Vec<String> = self.addresses.iter().map(|a| a.to_string()).collect();
            out.push_str(&format!(" ({})", addrs.join(", ")));
        }
        if let Some(desc) = &self.description {
            out.push_str(&format!(" - {}", desc));
        }
        out
    }
}

impl From<pcap::Device> for InterfaceInfo {
    fn from(device: pcap::Device) -> Self {
        let addresses = device.addresses.iter().map(|a| a.addr).collect();
        InterfaceInfo::new(device.name)
            .with_addresses(addresses)
            .with_description(device.desc)
    }
}

impl From<pnet_datalink::NetworkInterface> for InterfaceInfo {
    fn from(iface: pnet_datalink::NetworkInterface) -> Self {
        let addresses = iface.ips.iter().map(|net| net.ip()).collect();
        InterfaceInfo::new(iface.name.clone())
            .with_addresses(addresses)
            .with_description(Some(iface.description))
    }
}
