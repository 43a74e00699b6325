//! mDNS advertisement of the inference server on the local network.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use mdns_sd::{ServiceDaemon, ServiceInfo};

use crate::prelude::*;

const SERVICE_TYPE: &str = "_http._tcp.local.";
const INSTANCE_NAME: &str = "biodrying-server";
const HOST_NAME: &str = "biodrying-server.local.";

/// Registered service record, dropped from the network on [`Announcement::unregister`].
pub struct Announcement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Announcement {
    #[instrument(skip_all, fields(port = port))]
    pub fn register(port: u16) -> Result<Self> {
        let ip = local_ip().to_string();
        let daemon = ServiceDaemon::new().context("failed to start the mDNS daemon")?;
        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            INSTANCE_NAME,
            HOST_NAME,
            ip.as_str(),
            port,
            HashMap::<String, String>::new(),
        )
        .context("invalid service info")?;
        let fullname = service_info.get_fullname().to_string();
        daemon
            .register(service_info)
            .context("failed to register the service")?;
        info!(fullname = fullname.as_str(), ip = ip.as_str(), port, "registered");
        Ok(Self { daemon, fullname })
    }

    #[instrument(skip_all, fields(fullname = self.fullname.as_str()))]
    pub fn unregister(self) -> Result {
        self.daemon
            .unregister(&self.fullname)
            .context("failed to unregister the service")?;
        self.daemon
            .shutdown()
            .context("failed to shut the daemon down")?;
        info!("unregistered");
        Ok(())
    }
}

/// Outbound-facing address of this machine, loopback if there is no route.
///
/// Connecting a UDP socket sends nothing, it only makes the OS pick the interface.
pub fn local_ip() -> IpAddr {
    route_local_ip("8.8.8.8:80").unwrap_or_else(|error| {
        warn!("falling back to the loopback address: {:#}", error);
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    })
}

fn route_local_ip(remote_addr: &str) -> Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect(remote_addr)?;
    Ok(socket.local_addr()?.ip())
}
