use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::daemon::{Daemon, DaemonClient, DaemonRequest, DaemonResponse};
use crate::relay::Relay;

#[derive(Subcommand)]
pub enum DaemonCommands {
    /// Run the daemon (in foreground)
    Run,

    /// Start the daemon in the background
    Start,

    /// Stop the daemon
    Stop,

    /// Check daemon status
    Status,
}

fn log_file_path() -> PathBuf {
    let log_dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    log_dir.join("chatprobe-daemon.log")
}

/// Poll for the socket to appear after spawning the background daemon
fn wait_until_running() -> bool {
    for i in 0..10 {
        std::thread::sleep(Duration::from_millis(500));
        if Daemon::is_running() {
            return true;
        }
        if i == 0 {
            std::thread::sleep(Duration::from_millis(1500));
        }
    }
    false
}

fn report_start(started: bool, log_file: &std::path::Path) {
    if started {
        println!("Daemon started successfully");
        println!("Log file: {}", log_file.display());
    } else {
        eprintln!(
            "Failed to start daemon. Check log file: {}",
            log_file.display()
        );
    }
}

pub async fn handle_daemon(
    command: DaemonCommands,
    config: &Config,
    config_path: Option<PathBuf>,
) -> Result<()> {
    match command {
        DaemonCommands::Run => {
            if Daemon::is_running() {
                println!("Daemon is already running");
            } else {
                println!("Starting daemon for DevTools port {}...", config.port);
                let daemon = Daemon::new(Relay::new(config.clone()));
                daemon.start().await?;
            }
        }
        DaemonCommands::Start => {
            if Daemon::is_running() {
                println!("Daemon is already running");
                return Ok(());
            }
            println!("Starting daemon in background...");

            let log_file = log_file_path();
            // Pin the child to the port this process resolved
            let mut args = vec!["--port".to_string(), config.port.to_string()];
            if let Some(path) = &config_path {
                args.push("--config".to_string());
                args.push(path.display().to_string());
            }
            args.push("daemon".to_string());
            args.push("run".to_string());

            #[cfg(unix)]
            {
                use nix::unistd::{ForkResult, fork, setsid};
                use std::os::unix::io::AsRawFd;
                use std::os::unix::process::CommandExt;

                match unsafe { fork() } {
                    Ok(ForkResult::Parent { .. }) => {
                        report_start(wait_until_running(), &log_file);
                    }
                    Ok(ForkResult::Child) => {
                        let _ = setsid();

                        let log_fd = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(&log_file)?;
                        let log_fd = log_fd.as_raw_fd();
                        nix::unistd::dup2(log_fd, 1)?;
                        nix::unistd::dup2(log_fd, 2)?;
                        nix::unistd::close(0)?;

                        // Fresh process, so no inherited Tokio runtime state
                        let exe_path = std::env::current_exe()?;
                        let _ = std::process::Command::new(exe_path).args(&args).exec();

                        std::process::exit(1);
                    }
                    Err(e) => {
                        eprintln!("Fork failed: {}", e);
                    }
                }
            }

            #[cfg(not(unix))]
            {
                use std::process::Command;
                let exe_path = std::env::current_exe()?;

                let child = Command::new(&exe_path)
                    .args(&args)
                    .stdin(std::process::Stdio::null())
                    .stdout(std::fs::File::create(&log_file)?)
                    .stderr(std::fs::File::create(&log_file)?)
                    .spawn()?;
                std::mem::forget(child);

                report_start(wait_until_running(), &log_file);
            }
        }
        DaemonCommands::Stop => {
            if DaemonClient::is_daemon_running() {
                match DaemonClient::send_request(DaemonRequest::Shutdown) {
                    Ok(_) => println!("Daemon stopped"),
                    Err(e) => println!("Failed to stop daemon: {}", e),
                }
            } else {
                println!("Daemon is not running");
            }
        }
        DaemonCommands::Status => {
            if DaemonClient::is_daemon_running() {
                match DaemonClient::send_request(DaemonRequest::Ping) {
                    Ok(DaemonResponse::Pong { port }) => {
                        println!("Daemon is running (DevTools port {})", port)
                    }
                    _ => println!("Daemon is not responding properly"),
                }
            } else {
                println!("Daemon is not running");
            }
        }
    }
    Ok(())
}
