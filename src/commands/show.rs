//! Read-only lookups of remote resources

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use serde::Serialize;

use crate::Context;
use crate::cli::ShowCommand;
use crate::config::FlyformConfig;
use crate::ui;
use flyapi::{AppDetails, Certificate, Client, IpAddress, Volume};

pub fn run(ctx: &Context, cmd: ShowCommand) -> Result<()> {
    let client = client(ctx)?;

    match cmd {
        ShowCommand::App { name, json } => {
            let app = client
                .get_app_details(&name)
                .with_context(|| format!("Failed to look up app {}", name))?;
            output(&app, json, print_app)
        }
        ShowCommand::Cert {
            app,
            hostname,
            json,
        } => {
            let cert = client
                .get_certificate(&app, &hostname)
                .with_context(|| format!("Failed to look up certificate {} of {}", hostname, app))?;
            output(&cert, json, print_cert)
        }
        ShowCommand::Ip { app, address, json } => {
            let ip = client
                .get_ip(&app, &address)
                .with_context(|| format!("Failed to look up IP {} of {}", address, app))?;
            output(&ip, json, print_ip)
        }
        ShowCommand::Volume {
            app,
            internal_id,
            json,
        } => {
            let volume = client
                .get_volume(&app, &internal_id)
                .with_context(|| format!("Failed to look up volume {} of {}", internal_id, app))?;
            output(&volume, json, print_volume)
        }
    }
}

/// Client from the declaration file, or from the environment alone when
/// there is none
fn client(ctx: &Context) -> Result<Client> {
    let config = if ctx.config.exists() {
        FlyformConfig::load(&ctx.config)?
    } else {
        log::debug!("No config at {}, using environment", ctx.config.display());
        FlyformConfig::default()
    };
    Ok(Client::new(config.client_config()?))
}

fn output<T: Serialize>(value: &T, json: bool, print: fn(&T)) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
        println!("{}", rendered);
    } else {
        print(value);
    }
    Ok(())
}

fn print_app(app: &AppDetails) {
    ui::header(&format!("App {}", app.name));
    ui::kv("ID", &app.id);
    ui::kv("Status", &app.status);
    ui::kv("Deployed", if app.deployed { "yes" } else { "no" });
    ui::kv("URL", app.app_url.as_deref().unwrap_or("-"));
    ui::kv("Hostname", app.hostname.as_deref().unwrap_or("-"));
    ui::kv("Release", app.current_release.as_deref().unwrap_or("-"));

    if !app.ip_addresses.is_empty() {
        ui::section("IP Addresses");
        for ip in &app.ip_addresses {
            println!("  • {}", ip);
        }
    }
    if !app.health_checks.is_empty() {
        ui::section("Health Checks");
        for check in &app.health_checks {
            let symbol = if check.status == "passing" {
                "✓".green()
            } else {
                "✗".red()
            };
            println!("  {} {}", symbol, check);
        }
    }
}

fn print_cert(cert: &Certificate) {
    ui::header(&format!("Certificate {}", cert.hostname));
    ui::kv("ID", &cert.id);
    ui::kv("DNS configured", if cert.check { "yes" } else { "no" });
    if !cert.check {
        ui::section("DNS Validation");
        ui::kv("Record", &cert.dns_validation_hostname);
        ui::kv("Target", &cert.dns_validation_target);
        if !cert.dns_validation_instructions.is_empty() {
            ui::dim(&cert.dns_validation_instructions);
        }
    }
}

fn print_ip(ip: &IpAddress) {
    ui::header(&format!("IP {}", ip.address));
    ui::kv("ID", &ip.id);
    ui::kv("Type", ip.address_type.as_str());
    ui::kv("Region", &ip.region);
}

fn print_volume(volume: &Volume) {
    ui::header(&format!("Volume {}", volume.name));
    ui::kv("ID", &volume.id);
    ui::kv("Internal ID", &volume.internal_id);
    ui::kv("Region", &volume.region);
    ui::kv("Size", &format!("{} GB", volume.size_gb));
}
