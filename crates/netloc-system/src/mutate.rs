// ── macOS mutation provider ──
//
// Writes host settings with networksetup, lpadmin, and systemsetup.
// Network settings target the configurable service (see
// `query::configurable_service`), looked up fresh on every call because
// the primary service can change between settles.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use netloc_core::{CoreError, ProxyKind, SystemMutator, SystemProxy};
use tracing::{info, warn};

use crate::command::{CommandLine, Exec};
use crate::query::configurable_service;

/// Argument networksetup uses to clear a list setting.
const EMPTY: &str = "Empty";

/// Every proxy state switch networksetup exposes.
const PROXY_STATES: &[&str] = &[
    "-setautoproxystate",
    "-setwebproxystate",
    "-setsecurewebproxystate",
    "-setsocksfirewallproxystate",
];

#[derive(Clone)]
pub struct MacSystemMutator {
    exec: Arc<dyn Exec>,
    sudo: bool,
}

impl MacSystemMutator {
    /// `sudo` prefixes privileged commands with `sudo -n`; leave it off
    /// when already running as root.
    pub fn new(exec: Arc<dyn Exec>, sudo: bool) -> Self {
        Self { exec, sudo }
    }

    async fn service(&self, setting: &str) -> Result<String, CoreError> {
        configurable_service(self.exec.as_ref())
            .await
            .map_err(|e| e.into_mutation(setting))
    }

    async fn networksetup<I, S>(&self, setting: &str, args: I) -> Result<String, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmd = CommandLine::new("networksetup").args(args).privileged(self.sudo);
        self.exec.run(&cmd).await.map_err(|e| e.into_mutation(setting))
    }

    async fn disable_proxies(&self, service: &str, keep: Option<&str>) -> Result<(), CoreError> {
        for state in PROXY_STATES.iter().filter(|s| Some(**s) != keep) {
            self.networksetup("proxy", [*state, service, "off"]).await?;
        }
        Ok(())
    }
}

fn list_or_empty(items: Vec<String>) -> Vec<String> {
    if items.is_empty() { vec![EMPTY.to_owned()] } else { items }
}

#[async_trait]
impl SystemMutator for MacSystemMutator {
    async fn set_dns_servers(&self, servers: &[IpAddr]) -> Result<(), CoreError> {
        let service = self.service("dns_servers").await?;
        info!(%service, ?servers, "setting DNS servers");

        let mut args = vec!["-setdnsservers".to_owned(), service];
        args.extend(list_or_empty(servers.iter().map(ToString::to_string).collect()));
        self.networksetup("dns_servers", args).await?;
        Ok(())
    }

    async fn set_search_domains(&self, domains: &[String]) -> Result<(), CoreError> {
        let service = self.service("search_domains").await?;
        info!(%service, count = domains.len(), "setting search domains");

        let mut args = vec!["-setsearchdomains".to_owned(), service];
        args.extend(list_or_empty(domains.to_vec()));
        self.networksetup("search_domains", args).await?;
        Ok(())
    }

    async fn set_proxy(&self, proxy: &SystemProxy) -> Result<(), CoreError> {
        let service = self.service("proxy").await?;

        match proxy {
            SystemProxy::Disabled => {
                info!(%service, "disabling all proxies");
                self.disable_proxies(&service, None).await
            }
            SystemProxy::AutoConfig(url) => {
                info!(%service, %url, "setting auto-proxy URL");
                self.disable_proxies(&service, Some("-setautoproxystate")).await?;
                self.networksetup("proxy", ["-setautoproxyurl", service.as_str(), url.as_str()])
                    .await?;
                Ok(())
            }
            SystemProxy::Manual(endpoint) => {
                let (set, state) = match endpoint.kind {
                    ProxyKind::Http => ("-setwebproxy", "-setwebproxystate"),
                    ProxyKind::Https => ("-setsecurewebproxy", "-setsecurewebproxystate"),
                    ProxyKind::Socks => ("-setsocksfirewallproxy", "-setsocksfirewallproxystate"),
                    ProxyKind::None => return self.disable_proxies(&service, None).await,
                };
                info!(%service, %endpoint, "setting manual proxy");
                self.disable_proxies(&service, Some(state)).await?;
                let port = endpoint.port.to_string();
                self.networksetup("proxy", [set, service.as_str(), endpoint.host.as_str(), port.as_str()])
                    .await?;
                Ok(())
            }
        }
    }

    async fn set_default_printer(&self, printer: &str) -> Result<(), CoreError> {
        info!(%printer, "setting default printer");
        self.exec
            .run(&CommandLine::new("lpadmin").args(["-d", printer]))
            .await
            .map_err(|e| e.into_mutation("printer"))?;
        Ok(())
    }

    async fn set_ntp_server(&self, server: &str) -> Result<(), CoreError> {
        info!(%server, "setting NTP server");
        // Cycling network time off and on clears a stuck timed state.
        for args in [
            ["-setusingnetworktime", "off"],
            ["-setnetworktimeserver", server],
            ["-setusingnetworktime", "on"],
        ] {
            let cmd = CommandLine::new("systemsetup").args(args).privileged(self.sudo);
            self.exec.run(&cmd).await.map_err(|e| e.into_mutation("ntp_server"))?;
        }

        // An immediate sync is best effort; the server is configured
        // either way and timed picks it up when the network allows.
        let sync = CommandLine::new("sntp").args(["-t", "3", "-sS", server]).privileged(self.sudo);
        if let Err(e) = self.exec.run(&sync).await {
            warn!(error = %e, %server, "immediate time sync failed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use netloc_core::ProxyEndpoint;

    use super::*;
    use crate::command::scripted::ScriptedExec;

    const PRIMARY: &str = "<dictionary> {\n  PrimaryInterface : en5\n  PrimaryService : SVC-1\n}\n";
    const SERVICE: &str = "<dictionary> {\n  UserDefinedName : USB 10/100/1000 LAN\n}\n";

    fn mutator(sudo: bool) -> (Arc<ScriptedExec>, MacSystemMutator) {
        let exec = Arc::new(
            ScriptedExec::new()
                .with("scutil <<< show State:", Ok(PRIMARY))
                .with("scutil <<< show Setup:", Ok(SERVICE)),
        );
        (Arc::clone(&exec), MacSystemMutator::new(exec, sudo))
    }

    /// Calls other than the service lookup.
    fn writes(exec: &ScriptedExec) -> Vec<String> {
        exec.calls().into_iter().filter(|c| !c.starts_with("scutil")).collect()
    }

    #[tokio::test]
    async fn dns_and_domains_target_the_service() {
        let (exec, m) = mutator(true);

        m.set_dns_servers(&["10.0.0.53".parse().unwrap(), "10.0.0.54".parse().unwrap()])
            .await
            .unwrap();
        m.set_search_domains(&[]).await.unwrap();

        assert_eq!(
            writes(&exec),
            [
                "sudo -n networksetup -setdnsservers 'USB 10/100/1000 LAN' 10.0.0.53 10.0.0.54",
                "sudo -n networksetup -setsearchdomains 'USB 10/100/1000 LAN' Empty",
            ]
        );
    }

    #[tokio::test]
    async fn manual_proxy_turns_off_the_others() {
        let (exec, m) = mutator(false);
        let endpoint = ProxyEndpoint {
            kind: ProxyKind::Socks,
            host: "gw.corp".into(),
            port: 1080,
        };

        m.set_proxy(&SystemProxy::Manual(endpoint)).await.unwrap();

        let calls = writes(&exec);
        assert_eq!(calls.len(), 4);
        assert!(calls[..3].iter().all(|c| c.ends_with(" off")));
        assert!(!calls.iter().any(|c| c.contains("-setsocksfirewallproxystate")));
        assert_eq!(
            calls[3],
            "networksetup -setsocksfirewallproxy 'USB 10/100/1000 LAN' gw.corp 1080"
        );
    }

    #[tokio::test]
    async fn auto_config_and_disable() {
        let (exec, m) = mutator(false);

        let url = "http://wpad.corp/wpad.dat".parse().unwrap();
        m.set_proxy(&SystemProxy::AutoConfig(url)).await.unwrap();
        assert_eq!(
            writes(&exec).last().unwrap(),
            "networksetup -setautoproxyurl 'USB 10/100/1000 LAN' http://wpad.corp/wpad.dat"
        );

        let (exec, m) = mutator(false);
        m.set_proxy(&SystemProxy::Disabled).await.unwrap();
        assert_eq!(writes(&exec).len(), PROXY_STATES.len());
    }

    #[tokio::test]
    async fn command_failure_is_a_mutation_error() {
        let (exec, m) = mutator(true);
        exec.respond("sudo -n networksetup -setdnsservers", Err("sudo: a password is required"));

        let err = m.set_dns_servers(&["10.0.0.53".parse().unwrap()]).await.unwrap_err();
        assert!(matches!(err, CoreError::MutationFailed { ref setting, .. } if setting == "dns_servers"));
        assert!(err.to_string().contains("password is required"));
    }

    #[tokio::test]
    async fn ntp_sync_failure_is_not_fatal() {
        let (exec, m) = mutator(false);
        exec.respond("sntp", Err("sntp: timed out"));

        m.set_ntp_server("ntp.corp.example.com").await.unwrap();
        assert_eq!(
            writes(&exec),
            [
                "systemsetup -setusingnetworktime off",
                "systemsetup -setnetworktimeserver ntp.corp.example.com",
                "systemsetup -setusingnetworktime on",
                "sntp -t 3 -sS ntp.corp.example.com",
            ]
        );
    }

    #[tokio::test]
    async fn printer_runs_unprivileged() {
        let (exec, m) = mutator(true);
        m.set_default_printer("Office_Laser").await.unwrap();
        assert_eq!(writes(&exec), ["lpadmin -d Office_Laser"]);
    }
}
