use relaydns_domain::{Config, DomainError};
use relaydns_infrastructure::dns::{
    CachingServer, DnsListener, ListenerSettings, NetworkTransport, QueryContextPool,
    ResolverEngine, ResolverSettings,
};
use relaydns_reactor::Dispatcher;
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

/// Load the resolver engine and the UDP/TCP listener onto `dispatcher`.
///
/// Returns the address the listener is bound to.
pub fn start_dns_server(dispatcher: &Dispatcher, config: &Config) -> anyhow::Result<SocketAddr> {
    let settings = ResolverSettings::from_config(&config.dns)?;
    let bind_ip: IpAddr = config.server.bind_address.parse()?;
    let listener_settings = ListenerSettings {
        bind: SocketAddr::new(bind_ip, config.server.dns_port),
        tcp_idle_timeout: Duration::from_secs(config.server.tcp_idle_timeout_secs),
    };
    let server_config = config.server.clone();

    info!(bind_address = %listener_settings.bind, "Starting DNS server");

    let addr = dispatcher.call(move |reactor| -> Result<SocketAddr, DomainError> {
        let engine = ResolverEngine::new(settings, Rc::new(NetworkTransport::new()));
        reactor.load_runnable(Rc::new(engine.clone()))?;

        let server = CachingServer::new(
            engine,
            QueryContextPool::new(server_config.context_pool_size),
            server_config.recursion_available,
            server_config.max_udp_payload,
        );
        let listener = Rc::new(DnsListener::new(listener_settings, Rc::new(server)));
        reactor.load_runnable(listener.clone())?;

        listener
            .local_addr()
            .ok_or_else(|| DomainError::StartFailed("DNS listener is not bound".into()))
    })??;

    info!(addr = %addr, "DNS server ready to accept queries");
    Ok(addr)
}
