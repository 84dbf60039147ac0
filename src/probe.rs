//! Device reachability probe.
//!
//! Runs the host `ping` utility and counts echo replies in its output. Used before
//! connecting to a networked sensor; it has no interaction with queue state.
//!
//! The probe MUST NOT:
//! - Pass the address through a shell
//! - Accept addresses that could be parsed as `ping` options

use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

/// Extra echo requests sent beyond `required_successes`, so a single lost packet on a
/// healthy link does not fail the probe.
const EXTRA_ATTEMPTS: u32 = 1;
/// Process startup and DNS slack on top of the per-reply timeouts.
const PROCESS_SLACK: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn reply_regex() -> &'static regex::Regex {
    // Both iputils ("ttl=64") and Windows ("TTL=128") print a TTL only on a real echo reply.
    static REPLY_RE: OnceLock<regex::Regex> = OnceLock::new();
    REPLY_RE.get_or_init(|| regex::Regex::new(r"(?im)^.*\bttl[=:]\s*\d+").unwrap())
}

fn address_regex() -> &'static regex::Regex {
    static ADDRESS_RE: OnceLock<regex::Regex> = OnceLock::new();
    ADDRESS_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.:%_-]{0,252}$").unwrap())
}

/// Number of echo replies in `ping` output.
pub fn count_replies(output: &str) -> usize {
    reply_regex().find_iter(output).count()
}

/// True if `address` looks like a hostname or IPv4/IPv6 literal.
pub fn is_valid_address(address: &str) -> bool {
    address_regex().is_match(address)
}

/// Upper bound on `required_successes`; larger requests are clamped.
pub const MAX_REQUIRED_SUCCESSES: u32 = 64;

/// Ping `address` and report whether at least `required_successes` replies arrived.
///
/// `timeout_ms` bounds the wait for each reply. Failures are logged, never returned.
pub fn is_reachable(address: &str, required_successes: u32, timeout_ms: u32) -> bool {
    check_reachable(Command::new("ping"), address, required_successes, timeout_ms)
}

fn check_reachable(
    base: Command,
    address: &str,
    required_successes: u32,
    timeout_ms: u32,
) -> bool {
    if !is_valid_address(address) {
        log::warn!("probe: refusing malformed address {:?}", address);
        return false;
    }
    let required = required_successes.clamp(1, MAX_REQUIRED_SUCCESSES);
    let attempts = required.saturating_add(EXTRA_ATTEMPTS);

    let output = match run_ping(base, address, attempts, timeout_ms) {
        Ok(output) => output,
        Err(e) => {
            log::warn!("probe: ping {} failed: {}", address, e);
            return false;
        }
    };

    let replies = count_replies(&output);
    if replies < required as usize {
        log::warn!(
            "probe: {} answered {}/{} echo requests, {} required",
            address,
            replies,
            attempts,
            required
        );
        return false;
    }
    log::debug!("probe: {} reachable ({}/{} replies)", address, replies, attempts);
    true
}

fn add_ping_args(cmd: &mut Command, address: &str, attempts: u32, timeout_ms: u32) {
    if cfg!(target_os = "windows") {
        cmd.arg("-n")
            .arg(attempts.to_string())
            .arg("-w")
            .arg(timeout_ms.to_string());
    } else if cfg!(target_os = "macos") {
        cmd.arg("-c")
            .arg(attempts.to_string())
            .arg("-W")
            .arg(timeout_ms.to_string());
    } else {
        // iputils takes whole seconds.
        let secs = timeout_ms.div_ceil(1000).max(1);
        cmd.arg("-c")
            .arg(attempts.to_string())
            .arg("-W")
            .arg(secs.to_string());
    }
    cmd.arg(address);
}

fn run_ping(
    mut cmd: Command,
    address: &str,
    attempts: u32,
    timeout_ms: u32,
) -> io::Result<String> {
    add_ping_args(&mut cmd, address, attempts, timeout_ms);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    // Drain stdout while waiting, or a chatty ping stalls on a full pipe.
    let mut pipe = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "ping stdout was not captured"))?;
    let reader = thread::spawn(move || -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    });

    // One second between echo requests plus the reply timeout for each.
    let budget = Duration::from_millis(u64::from(timeout_ms) + 1000)
        .saturating_mul(attempts)
        .saturating_add(PROCESS_SLACK);
    let deadline = Instant::now().checked_add(budget);
    loop {
        if child.try_wait()?.is_some() {
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = reader.join();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("ping did not finish within {:?}", budget),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }

    let stdout = reader
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "ping stdout reader panicked"))??;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}
