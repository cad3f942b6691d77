//! HTTP provisioning portal
//!
//! A thin stand-in for the platform's provisioning service: one dark-themed
//! form collecting the WiFi selection and the four broker fields. It runs as
//! its own task and talks to the rest of the system only through the portal
//! event channel, so the cooperative loop never waits on it.

use super::{PortalError, PortalEvent, PortalSubmission, ProvisioningPortal};
use crate::store::BrokerConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use warp::Filter;

const SAVED_PAGE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Saved</title>
<style>body{background:#151515;color:#ddd;font-family:sans-serif;margin:3em}</style>
</head><body><h2>Parameters saved</h2>
<p>The device is applying the new configuration.</p></body></html>
"#;

pub struct HttpPortal {
    listen: String,
    device_name: String,
    events: mpsc::Sender<PortalEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HttpPortal {
    pub fn new(listen: String, device_name: String, events: mpsc::Sender<PortalEvent>) -> Self {
        Self {
            listen,
            device_name,
            events,
            shutdown: None,
            handle: None,
        }
    }
}

#[async_trait]
impl ProvisioningPortal for HttpPortal {
    async fn open(&mut self, defaults: &BrokerConfig) -> Result<(), PortalError> {
        if self.shutdown.is_some() {
            return Ok(());
        }

        let addr: SocketAddr =
            self.listen
                .parse()
                .map_err(|source| PortalError::InvalidListenAddr {
                    addr: self.listen.clone(),
                    source,
                })?;

        let page = render_form(&self.device_name, defaults);
        let index = warp::get()
            .and(warp::path::end())
            .map(move || warp::reply::html(page.clone()));

        let events = self.events.clone();
        let save = warp::post()
            .and(warp::path("save"))
            .and(warp::body::form())
            .map(move |form: HashMap<String, String>| {
                let submission = PortalSubmission {
                    wifi_ssid: field(&form, "ssid"),
                    wifi_psk: field(&form, "psk"),
                    broker_address: field(&form, "broker"),
                    broker_port: field(&form, "port"),
                    broker_user: field(&form, "user"),
                    broker_pass: field(&form, "pass"),
                };
                if events
                    .try_send(PortalEvent::ConfigSubmitted(submission))
                    .is_err()
                {
                    warn!("dropping portal submission, event queue full");
                }
                warp::reply::html(SAVED_PAGE.to_string())
            });

        let (tx, rx) = oneshot::channel();
        let (bound, server) = warp::serve(index.or(save)).try_bind_with_graceful_shutdown(
            addr,
            async {
                rx.await.ok();
            },
        )?;

        self.handle = Some(tokio::spawn(server));
        self.shutdown = Some(tx);
        info!(addr = %bound, device = %self.device_name, "provisioning portal listening");
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    fn is_open(&self) -> bool {
        self.shutdown.is_some()
    }
}

fn field(form: &HashMap<String, String>, name: &str) -> String {
    form.get(name).cloned().unwrap_or_default()
}

fn render_form(device_name: &str, defaults: &BrokerConfig) -> String {
    let address = if defaults.broker_address.is_empty() {
        "192.168.0.10"
    } else {
        &defaults.broker_address
    };
    format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><title>{device_name} setup</title>
<style>
body{{background:#151515;color:#ddd;font-family:sans-serif;margin:3em;max-width:28em}}
input{{display:block;width:100%;margin:.3em 0 1em;padding:.4em;background:#222;color:#ddd;border:1px solid #444}}
button{{padding:.5em 2em;background:#2a6;color:#fff;border:none}}
</style></head><body>
<h2>{device_name}</h2>
<form method="post" action="/save">
<label>WiFi network</label><input name="ssid">
<label>WiFi passphrase</label><input name="psk" type="password">
<label>mqtt server</label><input name="broker" value="{address}" maxlength="15">
<label>mqtt port</label><input name="port" value="{port}" maxlength="5">
<label>mqtt user</label><input name="user" value="{user}" maxlength="9">
<label>mqtt pass</label><input name="pass" type="password" maxlength="9">
<button type="submit">Save</button>
</form></body></html>
"#,
        port = defaults.broker_port,
        user = defaults.broker_user,
    )
}
