//! Purpose: Hold top-level CLI command dispatch for `bakehouse`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every successful command emits exactly one JSON value (or raw bytes for `--raw`).
//! Invariants: Remote commands go through `ProviderHandle`; only `make-pool` and `serve` touch files.

use std::io::Write;
use std::net::SocketAddr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bakehouse::api::{
    Client, Executor, PoolOptions, Provider, ProviderHandle, RegionId, Runtime, TargetId,
    make_pool,
};
use bakehouse::serve::{self, ServeConfig};

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::MakePool {
            path,
            size,
            mode,
            max_regions,
        } => {
            let mut options = PoolOptions::new(parse_size(&size)?).with_mode(parse_mode(&mode)?);
            if let Some(max_regions) = max_regions {
                options = options.with_max_regions(max_regions);
            }
            let target = make_pool(&path, options)?;
            emit_json(target_info_json(&target.info()));
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => run_serve(args),
        Command::Probe { remote, max } => {
            let targets = connect(&remote)?.probe(max)?;
            emit_json(json!({ "targets": ids_json(&targets) }));
            Ok(RunOutcome::ok())
        }
        Command::Shutdown { address, timeout } => {
            client(timeout.as_deref())?.shutdown_service(&address)?;
            emit_json(json!({ "ok": true }));
            Ok(RunOutcome::ok())
        }
        Command::Target { command } => dispatch_target(command),
        Command::Region { command } => dispatch_region(command),
    }
}

fn run_serve(args: ServeArgs) -> Result<RunOutcome, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("invalid bind address '{}'", args.bind))
            .with_hint("Use host:port, for example 127.0.0.1:9800.")
            .with_source(err)
    })?;
    let config = ServeConfig {
        bind,
        allow_non_loopback: args.allow_non_loopback,
        enable_remote_shutdown: args.enable_remote_shutdown,
        max_body_bytes: parse_size(&args.max_body_bytes)?,
    };
    serve::validate_config(&config)?;
    let create_targets = args
        .create_targets
        .iter()
        .map(|arg| parse_create_target(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })?;
    let runtime = Runtime::new();
    let provider = Provider::register(
        &runtime,
        args.provider_id,
        Executor::Blocking(tokio_runtime.handle().clone()),
    )?;
    for path in &args.targets {
        provider.attach_target(path)?;
    }
    for (path, size) in &create_targets {
        provider.ensure_target(path, *size)?;
    }
    tokio_runtime.block_on(serve::serve(config, runtime))?;
    Ok(RunOutcome::ok())
}

fn dispatch_target(command: TargetCommand) -> Result<RunOutcome, Error> {
    match command {
        TargetCommand::Attach { remote, path } => {
            let target = connect(&remote)?.attach_target(&path)?;
            emit_json(json!({ "target": target.to_string() }));
        }
        TargetCommand::Create { remote, path, size } => {
            let target = connect(&remote)?.create_target(&path, parse_size(&size)?)?;
            emit_json(json!({ "target": target.to_string() }));
        }
        TargetCommand::Detach { remote, target } => {
            let target = parse_target(&target)?;
            connect(&remote)?.detach_target(target)?;
            emit_json(json!({ "ok": true, "target": target.to_string() }));
        }
        TargetCommand::List { remote } => {
            let handle = connect(&remote)?;
            let targets = handle.probe(0)?;
            emit_json(json!({ "count": targets.len(), "targets": ids_json(&targets) }));
        }
        TargetCommand::Migrate {
            remote,
            target,
            dest,
            dest_root,
        } => {
            let migrated = connect(&remote)?.migrate_target(
                parse_target(&target)?,
                dest.remove_source,
                &dest.dest_address,
                dest.dest_provider_id,
                &dest_root,
            )?;
            let value = serde_json::to_value(&migrated).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode migration result")
                    .with_source(err)
            })?;
            emit_json(value);
        }
    }
    Ok(RunOutcome::ok())
}

fn dispatch_region(command: RegionCommand) -> Result<RunOutcome, Error> {
    match command {
        RegionCommand::Create {
            remote,
            target,
            size,
        } => {
            let size = parse_size(&size)?;
            let region = connect(&remote)?.create(parse_target(&target)?, size)?;
            emit_json(json!({ "region": region.to_string(), "size": size }));
        }
        RegionCommand::Put {
            remote,
            target,
            data,
            file,
        } => {
            let target = parse_target(&target)?;
            let bytes = read_input(data, file)?;
            let region = connect(&remote)?.create_write_persist(target, &bytes)?;
            emit_json(json!({ "region": region.to_string(), "size": bytes.len() }));
        }
        RegionCommand::Get {
            remote,
            target,
            region,
            offset,
            size,
            raw,
        } => {
            let handle = connect(&remote)?;
            let target = parse_target(&target)?;
            let region = parse_region(&region)?;
            let size = match size {
                Some(size) => parse_size(&size)?,
                None => handle.get_size(target, &region)?.saturating_sub(offset),
            };
            let data = handle.read(target, &region, offset, size)?;
            if raw {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(&data)
                    .and_then(|()| stdout.flush())
                    .map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write region bytes")
                            .with_source(err)
                    })?;
            } else {
                emit_json(json!({
                    "region": region.to_string(),
                    "offset": offset,
                    "size": data.len(),
                    "data": STANDARD.encode(&data),
                }));
            }
        }
        RegionCommand::Size {
            remote,
            target,
            region,
        } => {
            let size = connect(&remote)?.get_size(parse_target(&target)?, &parse_region(&region)?)?;
            emit_json(json!({ "size": size }));
        }
        RegionCommand::Remove {
            remote,
            target,
            region,
        } => {
            connect(&remote)?.remove(parse_target(&target)?, &parse_region(&region)?)?;
            emit_json(json!({ "ok": true }));
        }
        RegionCommand::List { remote, target } => {
            let regions = connect(&remote)?.list_regions(parse_target(&target)?)?;
            let regions: Vec<String> = regions.iter().map(ToString::to_string).collect();
            emit_json(json!({ "regions": regions }));
        }
        RegionCommand::Migrate {
            remote,
            target,
            region,
            dest,
            dest_target,
        } => {
            let dest_target = parse_target(&dest_target)?;
            let moved = connect(&remote)?.migrate_region(
                parse_target(&target)?,
                &parse_region(&region)?,
                0,
                dest.remove_source,
                &dest.dest_address,
                dest.dest_provider_id,
                dest_target,
            )?;
            emit_json(json!({
                "region": moved.to_string(),
                "dest_target": dest_target.to_string(),
            }));
        }
    }
    Ok(RunOutcome::ok())
}

fn client(timeout: Option<&str>) -> Result<Client, Error> {
    let client = Client::init();
    match timeout {
        Some(timeout) => Ok(client.with_timeout(parse_duration(timeout)?)),
        None => Ok(client),
    }
}

fn connect(remote: &RemoteArgs) -> Result<ProviderHandle, Error> {
    client(remote.timeout.as_deref())?.provider_handle(&remote.address, remote.provider_id)
}

fn parse_target(input: &str) -> Result<TargetId, Error> {
    input
        .parse()
        .map_err(|err: Error| err.with_hint("Use the target id printed by make-pool or probe."))
}

fn parse_region(input: &str) -> Result<RegionId, Error> {
    input
        .parse()
        .map_err(|err: Error| err.with_hint("Use the region id printed by region put/create."))
}

fn ids_json(ids: &[TargetId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}
