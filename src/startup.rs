use crate::config::Config;
use anyhow::{Context, Result};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ValidationReport {
    pub configuration: bool,
    pub gateway: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.configuration && self.gateway
    }

    pub fn print(&self, config: &Config) {
        println!("\n=== Startup Validation Report ===");
        println!("Server Port:           {}", config.server_port);
        println!("Gateway URL:           {}", config.gateway.base_url);
        println!("Sandbox Mode:          {}", config.gateway.sandbox_mode);
        println!("Callback URL:          {}", config.gateway.callback_url);
        println!("Configuration:         {}", status(self.configuration));
        println!("Gateway Reachability:  {}", status(self.gateway));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        configuration: true,
        gateway: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_config(config) {
        report.configuration = false;
        report.errors.push(format!("Configuration: {:#}", e));
    }

    if let Err(e) = probe_gateway(&config.gateway.base_url).await {
        report.gateway = false;
        report.errors.push(format!("Gateway: {:#}", e));
    }

    report
}

fn validate_config(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    config.gateway.validate()?;
    Ok(())
}

/// Any HTTP answer counts as reachable; only transport failures fail the probe.
async fn probe_gateway(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;

    let response = client
        .get(base_url)
        .send()
        .await
        .context("Failed to connect to payment gateway")?;

    tracing::debug!(status = response.status().as_u16(), "gateway probe answered");
    Ok(())
}
