// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `codegate load` - load a module file through a gate built from the
//! active configuration and report the bound protection domain.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use codegate_core::application::{GateBuilder, LoadRequest};
use codegate_core::domain::code_source::{CodeSource, Signer};
use codegate_core::domain::config::GateConfig;
use codegate_core::domain::events::GateEvent;
use codegate_core::domain::loaded_unit::LoadedUnit;
use codegate_core::domain::protection_domain::ProtectionDomain;
use codegate_core::infrastructure::EventBus;

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// WebAssembly module file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Unit name (dot-separated, e.g. app.Main)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Origin URL (default: file:// URL of FILE)
    #[arg(long, conflicts_with = "anonymous")]
    pub location: Option<String>,

    /// Signer of the origin as [SUBJECT=]SHA256_FINGERPRINT (repeatable)
    #[arg(long = "signer", value_name = "SIGNER", conflicts_with = "anonymous")]
    pub signers: Vec<String>,

    /// Load without an origin; no protection domain is bound
    #[arg(long)]
    pub anonymous: bool,

    /// Start of the module within FILE
    #[arg(long, requires = "length")]
    pub offset: Option<usize>,

    /// Length of the module within FILE
    #[arg(long, requires = "offset")]
    pub length: Option<usize>,

    /// Skip structural verification beyond the header
    #[arg(long)]
    pub preverified: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Also print the gate events raised by the load
    #[arg(long)]
    pub events: bool,
}

#[derive(Serialize)]
struct LoadReport<'a> {
    unit: &'a LoadedUnit,
    protection_domain: Option<&'a ProtectionDomain>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<GateEvent>,
}

pub async fn execute(args: LoadArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = GateConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read module {:?}", args.file))?;
    let request = build_request(&args, bytes)?;

    let bus = EventBus::new(config.spec.events.capacity);
    let mut receiver = bus.subscribe();
    let gate = GateBuilder::from_config(&config)?
        .observer(Arc::new(bus.clone()))
        .build()
        .context("Failed to initialize loader gate")?;

    let result = if args.preverified {
        gate.load_preverified(request).await
    } else {
        gate.load(request).await
    };

    let mut events = Vec::new();
    if args.events {
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
    }

    let unit = match result {
        Ok(unit) => unit,
        Err(e) => {
            if !args.json {
                print_events(&events);
            }
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to load {}", args.file.display())));
        }
    };

    if args.json {
        let report = LoadReport {
            unit: &unit,
            protection_domain: unit.protection_domain().map(|d| d.as_ref()),
            events,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_unit(&unit);
    print_events(&events);
    Ok(())
}

/// Turn CLI arguments and file contents into a gate request.
pub fn build_request(args: &LoadArgs, bytes: Vec<u8>) -> Result<LoadRequest> {
    let mut request = LoadRequest::new(bytes);
    if let Some(name) = &args.name {
        request = request.named(name.clone());
    }
    if let (Some(offset), Some(length)) = (args.offset, args.length) {
        request = request.with_range(offset, length);
    }
    if !args.anonymous {
        request = request.from_source(code_source(args)?);
    }
    Ok(request)
}

fn code_source(args: &LoadArgs) -> Result<CodeSource> {
    let signers = args
        .signers
        .iter()
        .map(|s| parse_signer(s))
        .collect::<Result<Vec<_>>>()?;

    let location = match &args.location {
        Some(location) => Url::parse(location)
            .with_context(|| format!("Invalid --location '{}'", location))?,
        None => file_url(&args.file)?,
    };
    Ok(CodeSource::new(location, signers))
}

fn file_url(path: &Path) -> Result<Url> {
    let absolute = std::fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {:?}", path))?;
    Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("Cannot express {:?} as a file URL", absolute))
}

/// Parse `[SUBJECT=]FINGERPRINT`. Without a subject the short fingerprint
/// is used for display.
pub fn parse_signer(value: &str) -> Result<Signer> {
    let (subject, fingerprint) = value.split_once('=').unwrap_or(("", value));
    let subject = if subject.is_empty() {
        fingerprint.get(..16).unwrap_or(fingerprint)
    } else {
        subject
    };
    Signer::from_fingerprint(subject, fingerprint)
        .with_context(|| format!("Invalid --signer '{}'", value))
}

fn print_unit(unit: &LoadedUnit) {
    println!("{}", "✓ Unit defined".green());
    println!("  ID: {}", unit.id());
    println!("  Name: {}", unit.name().unwrap_or("(anonymous)"));
    println!("  Digest: {}", unit.digest());
    println!("  Size: {} bytes", unit.code().len());
    match unit.section_count() {
        Some(count) => println!("  Verified: yes ({} sections)", count),
        None => println!("  Verified: {}", "no (preverified)".yellow()),
    }

    let Some(domain) = unit.protection_domain() else {
        println!("  Protection domain: {}", "(none)".dimmed());
        return;
    };
    println!("{}", "Protection domain:".bold());
    println!("  ID: {}", domain.id());
    println!("  Location: {}", domain.code_source().location());
    for signer in domain.code_source().signers() {
        println!("  Signer: {} ({})", signer.subject, signer.fingerprint());
    }
    if domain.capabilities().is_empty() {
        println!("  Capabilities: {}", "(none)".dimmed());
    } else {
        println!("  Capabilities:");
        for capability in domain.capabilities().iter() {
            println!("    - {}", capability);
        }
    }
}

fn print_events(events: &[GateEvent]) {
    if events.is_empty() {
        return;
    }
    println!("{}", "Events:".bold());
    for event in events {
        match serde_json::to_string(event) {
            Ok(line) => println!("  {}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize gate event"),
        }
    }
}
