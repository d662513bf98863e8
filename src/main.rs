mod attendance;
mod codegen;
mod config;
mod db;
mod ipc;
mod model;
mod notes;
mod recommend;
mod reports;
mod risk;
mod roster;
mod store;
mod workspace;

use chrono::Utc;
use crossbeam_channel::{select, tick, unbounded};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::thread;

fn write_response(stdout: &mut io::Stdout, resp: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
    let _ = stdout.flush();
}

fn main() {
    // stdout carries the protocol, so logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cfg = config::DaemonConfig::from_env();
    let sweep_interval = cfg.sweep_interval;
    let mut state = ipc::AppState::new(cfg);

    if let Some(path) = state.config.workspace.clone() {
        match workspace::Workspace::open(&path, state.config.rng_seed) {
            Ok(ws) => state.workspace = Some(ws),
            Err(e) => log::error!("could not open workspace {}: {e:#}", path.display()),
        }
    }

    // Reads happen on their own thread; every request and every sweep runs
    // on this one, so they never interleave.
    let (line_tx, line_rx) = unbounded::<String>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });
    let ticker = tick(sweep_interval);
    let mut stdout = io::stdout();
    log::info!("rollcalld ready (sweep every {:?})", sweep_interval);

    loop {
        select! {
            recv(line_rx) -> msg => {
                let Ok(line) = msg else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let req: ipc::Request = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        // Can't reply without id.
                        write_response(
                            &mut stdout,
                            &json!({
                                "ok": false,
                                "error": { "code": "bad_json", "message": e.to_string() }
                            }),
                        );
                        continue;
                    }
                };
                let resp = ipc::handle_request(&mut state, req);
                write_response(&mut stdout, &resp);
            }
            recv(ticker) -> _ => {
                ipc::sweep_tick(&mut state, Utc::now());
            }
        }
    }
    log::info!("stdin closed, shutting down");
}
