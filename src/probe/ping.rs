//! External ping invocation and latency extraction.

use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use tokio::process::Command;

use super::ProbeError;

/// One ping attempt against a resolved IP literal.
///
/// The ~3 second ceiling per attempt is enforced through the tool's own
/// timeout flag. A non-zero exit status discards the sample.
pub(super) async fn ping_once(addr: &str) -> Result<f64, ProbeError> {
    let start = Instant::now();

    let output = ping_command(addr)
        .output()
        .await
        .map_err(|e| ProbeError::Command(format!("failed to execute ping: {}", e)))?;

    if !output.status.success() {
        return Err(ProbeError::Command(format!(
            "ping exited with {} for {}",
            output.status, addr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Some(ms) = parse_ping_output(&stdout) {
        return Ok(ms);
    }

    // Exit status says the host answered but no time field was found: keep
    // the wall-clock duration as a noisy approximation rather than dropping
    // the sample.
    Ok(start.elapsed().as_millis() as f64)
}

#[cfg(not(windows))]
fn ping_command(addr: &str) -> Command {
    let mut cmd = if addr.contains(':') {
        Command::new("ping6")
    } else {
        Command::new("ping")
    };
    cmd.args(["-c", "1", "-W", "3", addr]);
    cmd
}

#[cfg(windows)]
fn ping_command(addr: &str) -> Command {
    let family = if addr.contains(':') { "-6" } else { "-4" };
    let mut cmd = Command::new("ping");
    cmd.args([family, "-n", "1", "-w", "3000", addr]);
    cmd
}

/// Extract the round-trip time in milliseconds from ping output.
///
/// Handles `time=12.3 ms`, the localized `时间=12ms` rendering, and the
/// sub-millisecond `time<1ms` form, which normalizes to 1.0 through the
/// `[=<]` capture. Returns None when no time field is present.
fn parse_ping_output(output: &str) -> Option<f64> {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIME_RE.get_or_init(|| Regex::new(r"(?i)time[=<]([0-9.]+)\s*ms").unwrap());

    if let Some(caps) = re.captures(output) {
        if let Ok(ms) = caps[1].parse::<f64>() {
            if ms > 0.0 {
                return Some(ms);
            }
        }
    }

    static LOCALIZED_RE: OnceLock<Regex> = OnceLock::new();
    let re = LOCALIZED_RE.get_or_init(|| Regex::new(r"时间[=<](\d+)\s*ms").unwrap());

    if let Some(caps) = re.captures(output) {
        if let Ok(ms) = caps[1].parse::<f64>() {
            if ms > 0.0 {
                return Some(ms);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_time_field() {
        let output = "64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.3 ms";
        assert_eq!(parse_ping_output(output), Some(12.3));
    }

    #[test]
    fn parses_time_without_space_before_ms() {
        let output = "Reply from 8.8.8.8: bytes=32 time=8ms TTL=117";
        assert_eq!(parse_ping_output(output), Some(8.0));
    }

    #[test]
    fn sub_millisecond_marker_normalizes_to_one() {
        let output = "Reply from 192.168.1.1: bytes=32 time<1ms TTL=64";
        assert_eq!(parse_ping_output(output), Some(1.0));
    }

    #[test]
    fn parses_localized_time_label() {
        let output = "来自 192.168.1.1 的回复: 字节=32 时间=3ms TTL=64";
        assert_eq!(parse_ping_output(output), Some(3.0));

        let sub_ms = "来自 192.168.1.1 的回复: 字节=32 时间<1ms TTL=64";
        assert_eq!(parse_ping_output(sub_ms), Some(1.0));
    }

    #[test]
    fn unparseable_output_yields_none() {
        assert_eq!(parse_ping_output("Request timed out."), None);
        assert_eq!(parse_ping_output(""), None);
    }

    #[test]
    fn ping_command_selects_address_family() {
        let v4 = ping_command("192.0.2.1");
        let v6 = ping_command("2001:db8::1");
        // Programs differ (or carry a family flag) between the two paths.
        assert_ne!(
            format!("{:?}", v4.as_std()),
            format!("{:?}", v6.as_std())
        );
    }
}
