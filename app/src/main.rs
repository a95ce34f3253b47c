//! Thin process entry point: parse CLI, load config/accounts/contacts/uuid, build the
//! registry and a [`UaGroupLayer`]-routed endpoint, then drive the interactive command
//! loop alongside every account's registration/call event loop until `quit` or signal.
//!
//! Runs on a current-thread runtime: `event_bus::EventBus` is explicitly
//! single-threaded (`Arc<EventBus>` is neither `Send` nor `Sync`), so nothing here may
//! hand a bus-touching future to `tokio::spawn` -- see DESIGN.md.

mod cli;
mod commands;
mod config;

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use event_bus::{Event, EventBus, EventSink, UaId};
use registry::Registry;
use sip_core::EndpointBuilder;
use sip_core::transport::udp::Udp;
use sip_ua::dialog::DialogLayer;
use sip_ua::invite::InviteLayer;
use tokio::io::{AsyncBufReadExt, BufReader};
use ua::{Ua, UaGroupLayer};

use cli::Cli;
use commands::Command;

const EXIT_OK: u8 = 0;
const EXIT_USAGE: u8 = 254; // -2 as u8
const EXIT_ERROR: u8 = 1;

struct Logger;

impl EventSink for Logger {
    fn handle(&self, event: &Event) {
        log::info!("event: {event:?}");
    }
}

fn config_dir(cli: &Cli) -> PathBuf {
    if let Some(dir) = &cli.config_dir {
        return dir.clone();
    }

    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".callforge"))
        .unwrap_or_else(|| PathBuf::from(".callforge"))
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    builder.format_timestamp(if cli.timestamps {
        Some(env_logger::fmt::TimestampPrecision::Seconds)
    } else {
        None
    });
    builder.write_style(if cli.no_color {
        env_logger::WriteStyle::Never
    } else {
        env_logger::WriteStyle::Auto
    });
    let _ = builder.try_init();
}

fn local_media_addr() -> IpAddr {
    local_ip_address::local_ip().unwrap_or(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    init_logging(&cli);
    log::info!("callforge starting");

    let dir = config_dir(&cli);
    if let Err(e) = config::ensure_dir(&dir) {
        log::error!("{e}");
        return ExitCode::from(EXIT_ERROR);
    }

    let accounts = match config::load_accounts(&dir) {
        Ok(accounts) => accounts,
        Err(e) => {
            log::error!("failed to load accounts: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let _settings = match config::load_config(&dir) {
        Ok(config) => config,
        Err(e) => {
            log::error!("failed to load config: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let _contacts = match config::load_contacts(&dir) {
        Ok(contacts) => contacts,
        Err(e) => {
            log::error!("failed to load contacts: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let instance_id = match config::load_or_create_uuid(&dir) {
        Ok(id) => id,
        Err(e) => {
            log::error!("failed to load/create uuid: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    log::info!("instance id: {instance_id}");

    let mut registry = Registry::with_builtins();
    if let Err(e) = registry.load_module(mod_echo::descriptor()) {
        log::warn!("failed to load echo module: {e}");
    }
    if let Err(e) = registry.load_module(mod_vumeter::descriptor()) {
        log::warn!("failed to load vumeter module: {e}");
    }
    let registry = Arc::new(registry);

    let bus = Arc::new(EventBus::new());
    let _logger = std::rc::Rc::new(Logger);
    bus.subscribe(std::rc::Rc::downgrade(&_logger) as std::rc::Weak<dyn EventSink>);
    let _echo = mod_echo::EchoModule::install(&bus);
    let _vumeter = mod_vumeter::VumeterModule::install(&bus);

    let mut endpoint_builder = EndpointBuilder::new();
    if let Err(e) = Udp::spawn(&mut endpoint_builder, "0.0.0.0:5060").await {
        log::error!("failed to bind SIP UDP transport: {e}");
        return ExitCode::from(EXIT_ERROR);
    }

    endpoint_builder.add_layer(DialogLayer::default());
    endpoint_builder.add_layer(InviteLayer::default());
    endpoint_builder.add_layer(UaGroupLayer::new());

    let endpoint = endpoint_builder.build();
    let ua_group_layer = endpoint.layer::<UaGroupLayer>();
    let local_addr = local_media_addr();

    let mut uas = Vec::new();
    for (index, account) in accounts.into_iter().enumerate() {
        let id = UaId(index as u64);
        match ua::spawn_ua(
            id,
            account,
            endpoint.clone(),
            registry.clone(),
            bus.clone(),
            local_addr,
            index == 0,
            ua_group_layer,
        )
        .await
        {
            Ok(ua) => uas.push(ua),
            Err(e) => log::warn!("failed to build ua: {e}"),
        }
    }

    for ua in &mut uas {
        if let Err(e) = ua.register().await {
            log::warn!("ua {:?} failed to register: {e}", ua.id());
        }
    }

    for cmd in &cli.exec {
        if let Some(command) = commands::parse(cmd) {
            dispatch(&mut uas, command).await;
        }
    }

    let quit_after = cli.quit_after.map(Duration::from_secs);
    run_event_loop(uas, quit_after).await;

    registry_unload(registry);
    ExitCode::from(EXIT_OK)
}

fn registry_unload(registry: Arc<Registry>) {
    if let Ok(mut registry) = Arc::try_unwrap(registry).map_err(|_| ()) {
        registry.unload_all_modules();
    }
}

async fn dispatch(uas: &mut [Ua], command: Command) {
    match command {
        Command::Dial { ua, target } => {
            let Some(ua) = uas.iter_mut().find(|u| u.id() == ua) else {
                log::warn!("no such ua");
                return;
            };
            let Ok(target) = target.parse() else {
                log::warn!("invalid target uri: {target}");
                return;
            };
            if let Err(e) = ua.connect(target).await {
                log::warn!("dial failed: {e}");
            }
        }
        Command::Answer { call } => {
            for ua in uas.iter_mut() {
                if ua.answer(call).await.is_ok() {
                    return;
                }
            }
            log::warn!("no pending call {call:?}");
        }
        Command::Hangup { call } => {
            for ua in uas.iter_mut() {
                if ua.hangup(call).await.is_ok() {
                    return;
                }
            }
            log::warn!("no active call {call:?}");
        }
        Command::Reginfo => {
            for ua in uas.iter_mut() {
                log::info!(
                    "ua {:?} ({}): registered={}",
                    ua.id(),
                    ua.account().aor,
                    ua.is_registered()
                );
            }
        }
        Command::Uastat => {
            log::info!("{} ua(s) loaded", uas.len());
        }
        Command::Quit => {}
        Command::Unknown(line) => log::warn!("unknown command: {line}"),
    }
}

/// Drives stdin command intake and every `Ua`'s event loop together, on this task,
/// until `quit`, EOF, or the optional `-t` deadline.
async fn run_event_loop(mut uas: Vec<Ua>, quit_after: Option<Duration>) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    let mut deadline = quit_after.map(|d| Box::pin(tokio::time::sleep(d)));

    loop {
        let mut ua_futs: Vec<_> = uas
            .iter_mut()
            .map(|ua| Box::pin(async move { (ua.id(), ua.run().await) }))
            .collect();
        let has_uas = !ua_futs.is_empty();

        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(command) = commands::parse(&line) {
                            if command == Command::Quit {
                                return;
                            }
                            dispatch(&mut uas, command).await;
                        }
                    }
                    _ => return,
                }
            }
            _ = async { match deadline.as_mut() { Some(d) => d.await, None => std::future::pending().await } }, if deadline.is_some() => {
                log::info!("quitting after configured timeout");
                return;
            }
            (id, result) = select_first(ua_futs), if has_uas => {
                if let Err(e) = result {
                    log::warn!("ua {id:?} event loop error: {e}");
                }
            }
        }
    }
}

type UaRunFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = (UaId, Result<ua::UaEvent, ua::UaError>)> + 'a>>;

async fn select_first(futs: Vec<UaRunFuture<'_>>) -> (UaId, Result<ua::UaEvent, ua::UaError>) {
    let (result, _index, _rest) = futures_util::future::select_all(futs).await;
    result
}
